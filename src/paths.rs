//! Pure functions mapping a slug, tag, author, or page name onto its output
//! file path and its public URL. Nothing in here touches the file system.
//!
//! Posts land at `{output}/{year}/{month}/{slug}.html`, where `year` and
//! `month` are the first two dash-separated components of the slug (e.g.,
//! `2023-01-05-hello` lives at `{output}/2023/01/2023-01-05-hello.html`).
//! Tags and authors land at `{output}/{prefix}/{name}.html`.

use std::fmt;
use std::path::{Path, PathBuf};

const HTML_EXTENSION: &str = "html";

/// Splits a slug into its `(year, month)` components.
pub fn split_slug(slug: &str) -> Result<(&str, &str), MalformedSlugError> {
    let mut components = slug.split('-');
    match (components.next(), components.next()) {
        (Some(year), Some(month)) if !year.is_empty() && !month.is_empty() => {
            Ok((year, month))
        }
        _ => Err(MalformedSlugError(slug.to_owned())),
    }
}

/// The output file for the post identified by `slug`.
pub fn post_path(
    slug: &str,
    output_root: &Path,
) -> Result<PathBuf, MalformedSlugError> {
    let (year, month) = split_slug(slug)?;
    Ok(output_root
        .join(year)
        .join(month)
        .join(format!("{}.{}", slug, HTML_EXTENSION)))
}

/// The public URL for the post identified by `slug`.
pub fn post_url(slug: &str, base_url: &str) -> Result<String, MalformedSlugError> {
    let (year, month) = split_slug(slug)?;
    Ok(format!(
        "{}/{}/{}/{}.{}",
        base_url.trim_end_matches('/'),
        year,
        month,
        slug,
        HTML_EXTENSION
    ))
}

/// The output file for a group page (`{output_root}/{prefix}/{name}.html`),
/// or the group directory itself when `name` is `None`.
pub fn group_path(output_root: &Path, prefix: &str, name: Option<&str>) -> PathBuf {
    let dir = output_root.join(prefix);
    match name {
        Some(name) => dir.join(format!("{}.{}", name, HTML_EXTENSION)),
        None => dir,
    }
}

/// The public URL for a group page: `{base_url}/{prefix}/{name}.html`.
pub fn group_url(base_url: &str, prefix: &str, name: &str) -> String {
    absolute_url(&format!("{}/{}.{}", prefix, name, HTML_EXTENSION), base_url)
}

pub fn tag_path(output_root: &Path, tags_prefix: &str, name: Option<&str>) -> PathBuf {
    group_path(output_root, tags_prefix, name)
}

pub fn tag_url(base_url: &str, tags_prefix: &str, name: &str) -> String {
    group_url(base_url, tags_prefix, name)
}

pub fn author_path(
    output_root: &Path,
    authors_prefix: &str,
    name: Option<&str>,
) -> PathBuf {
    group_path(output_root, authors_prefix, name)
}

pub fn author_url(base_url: &str, authors_prefix: &str, name: &str) -> String {
    group_url(base_url, authors_prefix, name)
}

/// The output file for a site-level page such as `index.html`.
pub fn page_path(output_root: &Path, page: &str) -> PathBuf {
    output_root.join(page)
}

/// Root-relative paths (leading `/`) are returned untouched; anything else is
/// joined onto `base_url`.
pub fn absolute_url(path: &str, base_url: &str) -> String {
    if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), path)
    }
}

/// Returned when a slug does not start with `{year}-{month}-`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedSlugError(pub String);

impl fmt::Display for MalformedSlugError {
    /// Displays a [`MalformedSlugError`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "malformed slug `{}`: expected `YYYY-MM-...` with a year and a month",
            &self.0
        )
    }
}

impl std::error::Error for MalformedSlugError {}
