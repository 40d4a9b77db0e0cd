//! Loads the site configuration from a YAML settings file. See [`Config`].
//!
//! A minimal settings file:
//!
//! ```yaml
//! blog:
//!   title: My blog
//!   domain: example.org
//! author:
//!   name: Alice
//! templates:
//!   index: index.tmpl
//!   archive: archive.tmpl
//!   post: post.tmpl
//!   tag: tag.tmpl
//!   taglist: tags.tmpl
//!   author: author.tmpl
//!   authorlist: authors.tmpl
//! ```
//!
//! Every other key has a default; relative paths are resolved against the
//! directory holding the settings file.

use serde::Deserialize;
use serde_yaml::{Mapping, Value as Yaml};
use std::fmt;
use std::fs::File;
use std::path::{Component, Path, PathBuf};

#[derive(Deserialize)]
struct Settings {
    blog: Blog,
    author: Author,
    #[serde(default)]
    url_paths: UrlPaths,
    #[serde(default)]
    physical_paths: PhysicalPaths,
    #[serde(default)]
    pages: Pages,
    templates: Templates,
    #[serde(default)]
    posts: Posts,
}

#[derive(Deserialize)]
struct Blog {
    title: String,
    domain: String,
    #[serde(default)]
    license_text: String,
    #[serde(default = "default_layout")]
    default_layout: String,
    #[serde(default = "default_true")]
    generate_feed: bool,
}

/// The blog's author, used as the feed author and as the default post
/// author.
#[derive(Deserialize, Clone, Debug)]
pub struct Author {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Deserialize)]
#[serde(default)]
struct UrlPaths {
    base_path: String,
    tags: String,
    authors: String,
}

impl Default for UrlPaths {
    fn default() -> Self {
        UrlPaths {
            base_path: String::new(),
            tags: "tags".to_owned(),
            authors: "authors".to_owned(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct PhysicalPaths {
    content: PathBuf,
    output: PathBuf,
    #[serde(rename = "static")]
    static_: String,
    layouts: PathBuf,
}

impl Default for PhysicalPaths {
    fn default() -> Self {
        PhysicalPaths {
            content: PathBuf::from("content"),
            output: PathBuf::from("site"),
            static_: "static".to_owned(),
            layouts: PathBuf::from("layouts"),
        }
    }
}

/// Page names, relative to the output directory (and to the base URL for
/// links). `css` is only ever linked, never written.
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Pages {
    pub index: String,
    pub archive: String,
    pub taglist: String,
    pub authorlist: String,
    pub feed: String,
    pub css: String,
}

impl Default for Pages {
    fn default() -> Self {
        Pages {
            index: "index.html".to_owned(),
            archive: "archive.html".to_owned(),
            taglist: "tags.html".to_owned(),
            authorlist: "authors.html".to_owned(),
            feed: "atom.xml".to_owned(),
            css: "static/css/style.css".to_owned(),
        }
    }
}

/// Template file names inside the active layout directory.
#[derive(Deserialize, Clone, Debug)]
pub struct Templates {
    /// Files prepended to every template (e.g., shared `define` blocks).
    #[serde(default)]
    pub partials: Vec<String>,
    pub index: String,
    pub archive: String,
    pub post: String,
    pub tag: String,
    pub taglist: String,
    pub author: String,
    pub authorlist: String,
    /// When absent, the built-in Atom writer produces the feed.
    #[serde(default)]
    pub feed: Option<String>,
}

impl Templates {
    /// Every configured template name, partials excluded.
    pub fn names(&self) -> Vec<&str> {
        let mut names = vec![
            self.index.as_str(),
            self.archive.as_str(),
            self.post.as_str(),
            self.tag.as_str(),
            self.taglist.as_str(),
            self.author.as_str(),
            self.authorlist.as_str(),
        ];
        if let Some(feed) = &self.feed {
            names.push(feed);
        }
        names
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct Posts {
    extension: String,
    pagination: Pagination,
    default_info: Mapping,
}

impl Default for Posts {
    fn default() -> Self {
        Posts {
            extension: "md".to_owned(),
            pagination: Pagination::default(),
            default_info: Mapping::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct Pagination {
    max_posts: usize,
    sort_reverse: bool,
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination {
            max_posts: 10,
            sort_reverse: true,
        }
    }
}

fn default_layout() -> String {
    "default".to_owned()
}

fn default_true() -> bool {
    true
}

/// The resolved site configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub title: String,

    /// The domain the blog is served from, optionally with a scheme.
    pub domain: String,

    /// The path below the domain the blog is served from (may be empty).
    pub base_path: String,

    pub license_text: String,

    pub author: Author,

    /// The name of the active layout directory inside `layouts_directory`.
    pub layout: String,

    pub generate_feed: bool,

    /// URL (and output directory) prefix for tag pages.
    pub tags_prefix: String,

    /// URL (and output directory) prefix for author pages.
    pub authors_prefix: String,

    pub content_directory: PathBuf,

    pub output_directory: PathBuf,

    /// The static assets directory.
    pub static_directory: PathBuf,

    /// Where the static assets land below the output directory (and below
    /// the layout directory for its own assets): the configured relative
    /// path, or the last component of an absolute one.
    pub static_path: PathBuf,

    pub layouts_directory: PathBuf,

    pub pages: Pages,

    pub templates: Templates,

    /// The extension (without the dot) of post source files.
    pub extension: String,

    /// The number of posts on the index page.
    pub max_posts: usize,

    /// Whether the index lists the newest post first.
    pub sort_reverse: bool,

    /// The metadata every post starts from.
    pub post_defaults: Mapping,
}

impl Config {
    /// Loads the settings file at `path`.
    pub fn from_file(path: &Path) -> Result<Config> {
        let file = File::open(path).map_err(|err| Error::Open {
            path: path.to_owned(),
            err,
        })?;
        let settings: Settings = serde_yaml::from_reader(file).map_err(|err| Error::Parse {
            path: path.to_owned(),
            err,
        })?;
        let root = match path.parent() {
            Some(parent) => parent.to_owned(),
            None => PathBuf::new(),
        };
        Config::from_settings(settings, &root)
    }

    /// Parses settings from a YAML string, resolving relative paths against
    /// `root`.
    pub fn parse(input: &str, root: &Path) -> Result<Config> {
        let settings: Settings = serde_yaml::from_str(input).map_err(|err| Error::Parse {
            path: root.to_owned(),
            err,
        })?;
        Config::from_settings(settings, root)
    }

    fn from_settings(settings: Settings, root: &Path) -> Result<Config> {
        require("blog.title", &settings.blog.title)?;
        require("blog.domain", &settings.blog.domain)?;
        require("author.name", &settings.author.name)?;
        require("blog.default_layout", &settings.blog.default_layout)?;
        require("templates.index", &settings.templates.index)?;
        require("templates.archive", &settings.templates.archive)?;
        require("templates.post", &settings.templates.post)?;
        require("templates.tag", &settings.templates.tag)?;
        require("templates.taglist", &settings.templates.taglist)?;
        require("templates.author", &settings.templates.author)?;
        require("templates.authorlist", &settings.templates.authorlist)?;
        require("posts.extension", &settings.posts.extension)?;

        let mut post_defaults = Mapping::new();
        post_defaults.insert(
            Yaml::String("title".to_owned()),
            Yaml::String("Post title".to_owned()),
        );
        post_defaults.insert(
            Yaml::String("author".to_owned()),
            Yaml::String(settings.author.name.clone()),
        );
        post_defaults.insert(Yaml::String("tags".to_owned()), Yaml::Sequence(Vec::new()));
        for (key, value) in settings.posts.default_info {
            post_defaults.insert(key, value);
        }

        let static_path = static_path(Path::new(&settings.physical_paths.static_));

        Ok(Config {
            title: settings.blog.title,
            domain: settings.blog.domain,
            base_path: settings.url_paths.base_path,
            license_text: settings.blog.license_text,
            author: settings.author,
            layout: settings.blog.default_layout,
            generate_feed: settings.blog.generate_feed,
            tags_prefix: settings.url_paths.tags,
            authors_prefix: settings.url_paths.authors,
            content_directory: root.join(settings.physical_paths.content),
            output_directory: root.join(settings.physical_paths.output),
            static_directory: root.join(&settings.physical_paths.static_),
            static_path,
            layouts_directory: root.join(settings.physical_paths.layouts),
            pages: settings.pages,
            templates: settings.templates,
            extension: settings.posts.extension.trim_start_matches('.').to_owned(),
            max_posts: settings.posts.pagination.max_posts,
            sort_reverse: settings.posts.pagination.sort_reverse,
            post_defaults,
        })
    }

    /// Overrides the active layout.
    pub fn with_layout(mut self, layout: &str) -> Config {
        self.layout = layout.to_owned();
        self
    }

    /// Overrides the output directory. The path is used as given.
    pub fn with_destination(mut self, destination: &Path) -> Config {
        self.output_directory = destination.to_owned();
        self
    }

    /// `http://{domain}[/{base_path}]`, without a trailing slash. A domain
    /// that already carries a scheme keeps it.
    pub fn base_url(&self) -> String {
        let domain = self.domain.trim_matches('/');
        let domain = if domain.contains("://") {
            domain.to_owned()
        } else {
            format!("http://{}", domain)
        };
        match self.base_path.trim_matches('/') {
            "" => domain,
            base_path => format!("{}/{}", domain, base_path),
        }
    }

    /// The directory holding the active layout's templates.
    pub fn layout_directory(&self) -> PathBuf {
        self.layouts_directory.join(&self.layout)
    }

    /// Where static assets are copied to.
    pub fn static_output_directory(&self) -> PathBuf {
        self.output_directory.join(&self.static_path)
    }

    /// The static assets shipped with the active layout, overlaid on top of
    /// the site's own.
    pub fn layout_static_directory(&self) -> PathBuf {
        self.layout_directory().join(&self.static_path)
    }
}

// Paths that would land outside the output directory keep only their last
// component.
fn static_path(configured: &Path) -> PathBuf {
    let escapes = configured
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    match configured.file_name() {
        Some(_) if !escapes => configured.to_owned(),
        Some(name) => PathBuf::from(name),
        None => PathBuf::from("static"),
    }
}

fn require(key: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::Missing(key))
    } else {
        Ok(())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem loading the configuration.
#[derive(Debug)]
pub enum Error {
    /// Returned when the settings file can't be opened.
    Open { path: PathBuf, err: std::io::Error },

    /// Returned when the settings file isn't valid YAML or lacks a required
    /// section.
    Parse {
        path: PathBuf,
        err: serde_yaml::Error,
    },

    /// Returned when a required setting is empty.
    Missing(&'static str),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Open { path, err } => {
                write!(f, "Opening settings file `{}`: {}", path.display(), err)
            }
            Error::Parse { path, err } => {
                write!(f, "Loading settings from `{}`: {}", path.display(), err)
            }
            Error::Missing(key) => write!(f, "Missing required setting `{}`", key),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Open { path: _, err } => Some(err),
            Error::Parse { path: _, err } => Some(err),
            Error::Missing(_) => None,
        }
    }
}
