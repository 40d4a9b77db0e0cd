//! The library code for the `acorn` static blog generator. The architecture
//! can be generally broken down into three distinct steps:
//!
//! 1. Parsing posts from source files on disk ([`crate::post`]), each a YAML
//!    header followed by a Markdown body ([`crate::markup`])
//! 2. Filing the posts by tag and by author ([`crate::index`])
//! 3. Rendering post, tag, author, index, archive, and feed pages to disk
//!    ([`crate::build`])
//!
//! Output locations and URLs are derived by the pure functions in
//! [`crate::paths`]. Templates see a fresh context per page
//! ([`crate::context`]) and are rendered through the [`render::Renderer`]
//! trait, so the template engine can be swapped out (the tests record
//! contexts this way).

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod config;
pub mod context;
pub mod feed;
pub mod index;
pub mod markup;
pub mod paths;
pub mod post;
pub mod render;
