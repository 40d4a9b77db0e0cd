//! Exports the [`SiteBuilder`], which stitches together the high-level steps
//! of generating the site, and [`build_site`], which wires it to the
//! [`TemplateSet`] renderer and the default body processors.
//!
//! The stages run strictly in this order, because each reads state the
//! previous ones produced:
//!
//! 1. parse every post in the content directory ([`crate::post`]);
//! 2. file the posts by tag and by author ([`crate::index`]);
//! 3. render the post pages;
//! 4. render the tag list and every tag page;
//! 5. render the author list and every author page;
//! 6. copy the static assets, then the layout's own on top;
//! 7. render the index, which sets `blog.last_updated`;
//! 8. render the feed, if enabled (it reads `blog.last_updated`);
//! 9. render the archive.
//!
//! Any failure aborts the run; nothing is skipped silently.

use crate::config::{self, Config};
use crate::context::{Overlay, SiteContext};
use crate::feed::{self, FeedConfig};
use crate::index::{AuthorIndex, TagIndex};
use crate::markup::Registry;
use crate::paths;
use crate::post::{self, Parser as PostParser, Post};
use crate::render::{self, Renderer, TemplateSet};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Builds the site described by `config` with the layout's templates and the
/// default body processors.
pub fn build_site(config: &Config) -> Result<()> {
    info!("Using '{}' as layout.", config.layout);
    let layout_directory = config.layout_directory();
    debug!("Loader path: {}", layout_directory.display());
    let templates = TemplateSet::load(
        &layout_directory,
        &config.templates.partials,
        &config.templates.names(),
    )?;
    let processors = Registry::default();
    SiteBuilder::new(config, &templates, &processors).generate()
}

/// Generates a site in one run. A builder owns the posts and the tag and
/// author indexes for the duration of [`SiteBuilder::generate`], which
/// consumes it; every run needs a fresh builder.
pub struct SiteBuilder<'a> {
    config: &'a Config,
    renderer: &'a dyn Renderer,
    processors: &'a Registry,
    context: SiteContext,
    base_url: String,
    posts: Vec<Rc<Post>>,
    tags: TagIndex,
    authors: AuthorIndex,
}

impl<'a> SiteBuilder<'a> {
    pub fn new(
        config: &'a Config,
        renderer: &'a dyn Renderer,
        processors: &'a Registry,
    ) -> SiteBuilder<'a> {
        let base_url = config.base_url();
        SiteBuilder {
            config,
            renderer,
            processors,
            context: SiteContext::new(config),
            posts: Vec::new(),
            tags: TagIndex::new(&base_url, &config.output_directory, &config.tags_prefix),
            authors: AuthorIndex::new(
                &base_url,
                &config.output_directory,
                &config.authors_prefix,
            ),
            base_url,
        }
    }

    /// Runs every stage in order.
    pub fn generate(mut self) -> Result<()> {
        self.parse_posts()?;
        self.index_posts();
        self.write_posts()?;
        self.write_tags()?;
        self.write_authors()?;
        self.copy_statics()?;
        self.write_index()?;
        // The feed must come after the index: it reads `blog.last_updated`.
        if self.config.generate_feed {
            self.write_feed()?;
        }
        self.write_archive()?;
        info!(
            "Generated {} posts, {} tags, {} authors in {}",
            self.posts.len(),
            self.tags.len(),
            self.authors.len(),
            self.config.output_directory.display()
        );
        Ok(())
    }

    fn parse_posts(&mut self) -> Result<()> {
        info!(
            "Using {} as source of content.",
            self.config.content_directory.display()
        );
        let parser = PostParser {
            base_url: &self.base_url,
            output_directory: &self.config.output_directory,
            defaults: &self.config.post_defaults,
            processors: self.processors,
        };
        self.posts = parser
            .parse_posts(&self.config.content_directory, &self.config.extension)?
            .into_iter()
            .map(Rc::new)
            .collect();
        Ok(())
    }

    fn index_posts(&mut self) {
        for post in &self.posts {
            for tag in &post.metadata.tags {
                self.tags.register(post, tag);
            }
            self.authors.register(post, &post.metadata.author);
        }
    }

    fn write_posts(&self) -> Result<()> {
        info!("Rendering posts...");
        let mut seen_dirs: HashSet<PathBuf> = HashSet::new();
        for post in &self.posts {
            if let Some(dir) = post.output_path.parent() {
                if seen_dirs.insert(dir.to_owned()) {
                    create_dir(dir)?;
                }
            }
            self.write_page(&self.config.templates.post, &Overlay::Post(post), &post.output_path)?;
        }
        Ok(())
    }

    fn write_tags(&self) -> Result<()> {
        create_dir(&self.tags.directory())?;
        self.write_page(
            &self.config.templates.taglist,
            &Overlay::Tags(&self.tags),
            &self.page_path(&self.config.pages.taglist),
        )?;
        for tag in self.tags.groups() {
            info!("Generating tag page for {} in {}", tag.name, tag.output_path.display());
            self.write_page(&self.config.templates.tag, &Overlay::Tag(tag), &tag.output_path)?;
        }
        Ok(())
    }

    fn write_authors(&self) -> Result<()> {
        create_dir(&self.authors.directory())?;
        self.write_page(
            &self.config.templates.authorlist,
            &Overlay::Authors(&self.authors),
            &self.page_path(&self.config.pages.authorlist),
        )?;
        for author in self.authors.groups() {
            info!(
                "Generating author page for {} in {}",
                author.name,
                author.output_path.display()
            );
            self.write_page(
                &self.config.templates.author,
                &Overlay::Author(author),
                &author.output_path,
            )?;
        }
        Ok(())
    }

    /// Copies the static directory into the output, then overlays the
    /// layout's own static directory, if it has one.
    fn copy_statics(&self) -> Result<()> {
        let destination = self.config.static_output_directory();
        debug!("Using '{}' as static output path", destination.display());
        if self.config.static_directory.is_dir() {
            copy_dir(&self.config.static_directory, &destination)?;
        } else {
            warn!(
                "Static directory '{}' not found, skipping",
                self.config.static_directory.display()
            );
        }

        let layout_static = self.config.layout_static_directory();
        debug!("Using '{}' as layout static path", layout_static.display());
        if layout_static.is_dir() {
            copy_dir(&layout_static, &destination)?;
        }
        Ok(())
    }

    fn write_index(&mut self) -> Result<()> {
        self.posts
            .sort_by(|a, b| a.metadata.pub_date.cmp(&b.metadata.pub_date));
        // Taken before any reversal: always the earliest publication date.
        if let Some(first) = self.posts.first() {
            self.context
                .set_last_updated(first.metadata.pub_date.clone());
        }
        if self.config.sort_reverse {
            self.posts.reverse();
        }
        let count = self.config.max_posts.min(self.posts.len());
        let path = self.page_path(&self.config.pages.index);
        info!("Generating index page at {}", path.display());
        self.write_page(
            &self.config.templates.index,
            &Overlay::Posts(&self.posts[..count]),
            &path,
        )
    }

    fn write_feed(&self) -> Result<()> {
        let path = self.page_path(&self.config.pages.feed);
        info!("Generating feed at {}", path.display());
        match &self.config.templates.feed {
            Some(template) => self.write_page(template, &Overlay::Posts(&self.posts), &path),
            None => {
                let feed_url = paths::absolute_url(&self.config.pages.feed, &self.base_url);
                let mut out = Vec::new();
                feed::write_feed(
                    &FeedConfig {
                        title: &self.config.title,
                        id: self.context.feed_id(),
                        author: &self.config.author,
                        home_page: &self.base_url,
                        feed_url: &feed_url,
                        updated: self.context.last_updated(),
                    },
                    &self.posts,
                    &mut out,
                )?;
                write_file(&path, &out)
            }
        }
    }

    fn write_archive(&self) -> Result<()> {
        let path = self.page_path(&self.config.pages.archive);
        info!("Generating archive page at {}", path.display());
        self.write_page(&self.config.templates.archive, &Overlay::Posts(&self.posts), &path)
    }

    fn page_path(&self, page: &str) -> PathBuf {
        paths::page_path(&self.config.output_directory, page.trim_start_matches('/'))
    }

    /// Renders `template` against the site context plus `overlay` and writes
    /// the result to `path`.
    fn write_page(&self, template: &str, overlay: &Overlay, path: &Path) -> Result<()> {
        let output = self.renderer.render(template, self.context.with(overlay))?;
        write_file(path, output.as_bytes())
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        debug!("Output directory {} not found, creating", dir.display());
        std::fs::create_dir_all(dir).map_err(|err| Error::Io {
            path: dir.to_owned(),
            err,
        })?;
    }
    Ok(())
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    debug!("Writing to file '{}'", path.display());
    if let Some(dir) = path.parent() {
        create_dir(dir)?;
    }
    std::fs::write(path, contents).map_err(|err| Error::Io {
        path: path.to_owned(),
        err,
    })
}

// Later copies win on name collisions.
fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    for result in WalkDir::new(src) {
        let entry = result?;
        // strip_prefix() should never fail; every entry lives under `src`.
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            create_dir(&target)?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|err| Error::Io {
                path: target.clone(),
                err,
            })?;
        }
    }
    Ok(())
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Errors can be during configuration,
/// parsing, rendering, feed generation, and other I/O.
#[derive(Debug)]
pub enum Error {
    /// Returned when the configuration is missing or invalid.
    Config(config::Error),

    /// Returned for errors during parsing.
    Parse(post::Error),

    /// Returned for errors loading or rendering templates.
    Render(render::Error),

    /// Returned for errors writing the built-in feed.
    Feed(feed::Error),

    /// Returned when an output file or directory can't be written.
    Io { path: PathBuf, err: std::io::Error },

    /// Returned when the static directories can't be walked.
    WalkDir(walkdir::Error),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Config(err) => err.fmt(f),
            Error::Parse(err) => err.fmt(f),
            Error::Render(err) => err.fmt(f),
            Error::Feed(err) => err.fmt(f),
            Error::Io { path, err } => {
                write!(f, "Writing '{}': {}", path.display(), err)
            }
            Error::WalkDir(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(err) => Some(err),
            Error::Parse(err) => Some(err),
            Error::Render(err) => Some(err),
            Error::Feed(err) => Some(err),
            Error::Io { path: _, err } => Some(err),
            Error::WalkDir(err) => Some(err),
        }
    }
}

impl From<config::Error> for Error {
    /// Converts [`config::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: config::Error) -> Error {
        Error::Config(err)
    }
}

impl From<post::Error> for Error {
    /// Converts [`post::Error`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: post::Error) -> Error {
        Error::Parse(err)
    }
}

impl From<render::Error> for Error {
    /// Converts [`render::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: render::Error) -> Error {
        Error::Render(err)
    }
}

impl From<feed::Error> for Error {
    /// Converts [`feed::Error`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: feed::Error) -> Error {
        Error::Feed(err)
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}
