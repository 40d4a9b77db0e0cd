//! Defines the [`Post`], [`Metadata`], [`PubDate`], [`Parser`], and [`Error`]
//! types, and the logic for parsing post source files from the file system
//! into memory.
//!
//! A post source file looks like this:
//!
//! ```md
//! ---
//! title: Hello, world!
//! author: Alice
//! pub_date: 2023-01-05 09:30:00
//! tags: [greet, meta]
//! ---
//! # Hello
//!
//! World
//! ```
//!
//! Its file name (less the extension) is the post's slug and must begin with
//! `{year}-{month}-`; see [`crate::paths`].

use crate::markup::{self, Markup, Registry};
use crate::paths::{self, MalformedSlugError};
use chrono::{NaiveDate, NaiveDateTime};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_yaml::{Mapping, Value as Yaml};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::read_dir;
use std::path::{Path, PathBuf};
use tracing::info;
use url::Url;

/// Opens and closes the metadata header.
pub const HEADER_DELIMITER: &str = "---";

/// The pattern behind `pub_date_long` in templates.
pub const LONG_DATE: &str = "%B %-d, %Y";

/// The pattern behind `pub_date_short` in templates.
pub const SHORT_DATE: &str = "%b %-d, %Y";

/// Marks the end of a post's summary within its body.
const FOLD_TAG: &str = "<!-- more -->";

/// A post parsed from a source file.
#[derive(Debug, Clone)]
pub struct Post {
    /// The source file name less its extension (e.g., `2023-01-05-hello`).
    pub slug: String,

    /// The header merged over the configured defaults.
    pub metadata: Metadata,

    /// The body exactly as it appears in the source file.
    pub raw: String,

    /// The body converted to HTML.
    pub body: String,

    /// Where the rendered post is written.
    pub output_path: PathBuf,

    /// The public URL of the rendered post.
    pub url: String,

    /// A globally unique, stable identifier for feed entries. See
    /// [`post_id`].
    pub id: String,
}

impl Post {
    /// Returns the part of the body before the `<!-- more -->` marker and
    /// whether the marker was found. Without a marker the summary is the whole
    /// body.
    ///
    /// A marker inside a paragraph (`intro <!-- more --> rest`) cuts the
    /// paragraph short; the summary then gets the closing `</p>` it would
    /// otherwise lack.
    pub fn summary(&self) -> (Cow<'_, str>, bool) {
        match self.body.find(FOLD_TAG) {
            Some(i) => {
                let summary = &self.body[..i];
                let open = summary.rfind("<p>").or_else(|| summary.rfind("<p "));
                match open {
                    Some(open) if !summary[open..].contains("</p>") => {
                        (Cow::Owned(format!("{}</p>", summary.trim_end())), true)
                    }
                    _ => (Cow::Borrowed(summary), true),
                }
            }
            None => (Cow::Borrowed(&self.body), false),
        }
    }
}

/// A post's metadata header after merging it over the configured defaults.
#[derive(Deserialize, Debug, Clone)]
pub struct Metadata {
    #[serde(deserialize_with = "scalar")]
    pub title: String,

    #[serde(deserialize_with = "scalar")]
    pub author: String,

    pub pub_date: PubDate,

    #[serde(default, deserialize_with = "scalars")]
    pub tags: Vec<String>,

    /// Selects the body processor.
    #[serde(default)]
    pub markup: Markup,

    /// Every other key from the defaults or the header (e.g., `layout`).
    #[serde(flatten)]
    pub extra: BTreeMap<String, Yaml>,
}

// Headers are hand-written, so `title: 1.0` or `tags: [rust, 2023]` are
// taken as text rather than rejected.
fn scalar<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Yaml::deserialize(deserializer)?;
    scalar_to_string(&value)
        .ok_or_else(|| D::Error::custom("expected a string, number, or boolean"))
}

fn scalars<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = match Yaml::deserialize(deserializer)? {
        Yaml::Null => return Ok(Vec::new()),
        Yaml::Sequence(values) => values,
        value => vec![value],
    };
    values
        .iter()
        .map(|value| {
            scalar_to_string(value)
                .ok_or_else(|| D::Error::custom("expected a list of strings, numbers, or booleans"))
        })
        .collect()
}

fn scalar_to_string(value: &Yaml) -> Option<String> {
    match value {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Number(n) => Some(n.to_string()),
        Yaml::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A publication date. Keeps the text as authored for display and orders by
/// the parsed timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubDate {
    text: String,
    timestamp: NaiveDateTime,
}

impl PubDate {
    /// Parses `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD HH:MM`,
    /// or `YYYY-MM-DD` (midnight).
    pub fn parse(text: &str) -> Option<PubDate> {
        let trimmed = text.trim();
        let timestamp = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            })?;
        Some(PubDate {
            text: trimmed.to_owned(),
            timestamp,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// RFC 3339 (`2023-01-05T09:30:00Z`), as Atom feeds want it. Dates carry
    /// no timezone and are taken to be UTC.
    pub fn to_rfc3339(&self) -> String {
        self.format("%Y-%m-%dT%H:%M:%SZ")
    }

    /// Formats the timestamp with a [`chrono::format::strftime`] pattern.
    pub fn format(&self, pattern: &str) -> String {
        self.timestamp.format(pattern).to_string()
    }
}

impl Ord for PubDate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.text.cmp(&other.text))
    }
}

impl PartialOrd for PubDate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PubDate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for PubDate {
    fn deserialize<D>(deserializer: D) -> std::result::Result<PubDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        PubDate::parse(&text).ok_or_else(|| {
            D::Error::custom(format!(
                "invalid pub_date `{}`: expected `YYYY-MM-DD[ HH:MM:SS]`",
                text
            ))
        })
    }
}

/// Builds the identifier for a post: an RFC 4151 tag URI of the form
/// `tag:{host},{YYYY-MM-DD}:{path}` composed from the post's URL and its
/// publication date. It does not change when a post is regenerated, and two
/// posts can only share it if they share a URL.
pub fn post_id(url: &str, pub_date: &PubDate) -> Result<String> {
    let url = Url::parse(url)?;
    Ok(format!(
        "tag:{},{}:{}",
        url.host_str().unwrap_or_default(),
        pub_date.timestamp().format("%Y-%m-%d"),
        url.path()
    ))
}

/// Splits a source file into its metadata block and its body. The text must
/// start with [`HEADER_DELIMITER`]; the metadata block runs up to the next
/// occurrence of the delimiter and the body is everything after it.
pub fn split_header(input: &str) -> Result<(&str, &str)> {
    if !input.starts_with(HEADER_DELIMITER) {
        return Err(Error::MissingHeader);
    }
    let rest = &input[HEADER_DELIMITER.len()..];
    match rest.find(HEADER_DELIMITER) {
        None => Err(Error::MalformedHeader(format!(
            "missing closing `{}`",
            HEADER_DELIMITER
        ))),
        Some(offset) => Ok((&rest[..offset], &rest[offset + HEADER_DELIMITER.len()..])),
    }
}

/// Parses the metadata block and merges it over `defaults`: defaults first,
/// header values win.
pub fn parse_metadata(block: &str, defaults: &Mapping) -> Result<Metadata> {
    if block.trim().is_empty() {
        return Ok(serde_yaml::from_value(Yaml::Mapping(defaults.clone()))?);
    }
    let header = match serde_yaml::from_str::<Yaml>(block)? {
        Yaml::Mapping(mapping) => mapping,
        Yaml::Null => Mapping::new(),
        _ => {
            return Err(Error::MalformedHeader(
                "the header is not a key/value mapping".to_owned(),
            ))
        }
    };

    let mut merged = defaults.clone();
    for (key, value) in header {
        merged.insert(key, value);
    }
    Ok(serde_yaml::from_value(Yaml::Mapping(merged))?)
}

/// Parses [`Post`] objects from source files.
pub struct Parser<'a> {
    /// The site's base URL, prefixed onto post URLs
    /// (`{base_url}/{year}/{month}/{slug}.html`).
    pub base_url: &'a str,

    /// The root output directory. Post pages are written beneath it.
    pub output_directory: &'a Path,

    /// The metadata every post starts from before its header is merged in.
    pub defaults: &'a Mapping,

    /// The body processors, looked up by each post's [`Markup`].
    pub processors: &'a Registry,
}

impl<'a> Parser<'a> {
    /// Parses the post at `path`. Errors are annotated with the path.
    pub fn parse_post(&self, path: &Path) -> Result<Post> {
        self._parse_post(path)
            .map_err(|e| Error::Annotated(format!("parsing post `{}`", path.display()), Box::new(e)))
    }

    fn _parse_post(&self, path: &Path) -> Result<Post> {
        let input = std::fs::read_to_string(path).map_err(|err| Error::Unreadable {
            path: path.to_owned(),
            err,
        })?;

        let slug = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| Error::InvalidFileName(path.to_owned()))?
            .to_owned();

        let (block, raw) = split_header(&input)?;
        let metadata = parse_metadata(block, self.defaults)?;
        let body = self.processors.get(&metadata.markup)?.process(raw)?;

        let output_path = paths::post_path(&slug, self.output_directory)?;
        let url = paths::post_url(&slug, self.base_url)?;
        let id = post_id(&url, &metadata.pub_date)?;

        Ok(Post {
            slug,
            metadata,
            raw: raw.to_owned(),
            body,
            output_path,
            url,
            id,
        })
    }

    /// Parses every file in `source_directory` whose extension is
    /// `extension`, in the order the directory lists them. The first post
    /// that fails to parse aborts the whole operation.
    pub fn parse_posts(&self, source_directory: &Path, extension: &str) -> Result<Vec<Post>> {
        let mut posts = Vec::new();
        for result in read_dir(source_directory)? {
            let entry = result?;
            let path = entry.path();
            if entry.file_type()?.is_file()
                && path.extension().map_or(false, |ext| ext == extension)
            {
                info!("Processing {}...", path.display());
                posts.push(self.parse_post(&path)?);
            }
        }
        Ok(posts)
    }
}

/// Represents the result of a [`Post`]-parse operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error parsing a [`Post`] object.
#[derive(Debug)]
pub enum Error {
    /// Returned when a source file can't be opened or isn't valid UTF-8.
    Unreadable { path: PathBuf, err: std::io::Error },

    /// Returned when a source file doesn't begin with the header delimiter.
    MissingHeader,

    /// Returned when the header is not closed or is not a mapping.
    MalformedHeader(String),

    /// Returned when the header isn't valid YAML or lacks a required field.
    DeserializeYaml(serde_yaml::Error),

    /// Returned when the file name doesn't yield a year and a month.
    MalformedSlug(MalformedSlugError),

    /// Returned when the file name isn't valid UTF-8.
    InvalidFileName(PathBuf),

    /// Returned when the body can't be processed.
    Markup(markup::Error),

    /// Returned when the post URL can't be parsed to build its id.
    UrlParse(url::ParseError),

    /// Returned for I/O errors listing the source directory.
    Io(std::io::Error),

    /// An error with an annotation.
    Annotated(String, Box<Error>),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Unreadable { path, err } => write!(
                f,
                "unable to read `{}` (is it UTF-8 encoded?): {}",
                path.display(),
                err
            ),
            Error::MissingHeader => write!(
                f,
                "no header found: a post must begin with `{}`",
                HEADER_DELIMITER
            ),
            Error::MalformedHeader(reason) => write!(f, "malformed header: {}", reason),
            Error::DeserializeYaml(err) => write!(f, "invalid header: {}", err),
            Error::MalformedSlug(err) => err.fmt(f),
            Error::InvalidFileName(path) => {
                write!(f, "invalid file name: {:?}", path)
            }
            Error::Markup(err) => err.fmt(f),
            Error::UrlParse(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
            Error::Annotated(annotation, err) => {
                write!(f, "{}: {}", &annotation, err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Unreadable { path: _, err } => Some(err),
            Error::MissingHeader => None,
            Error::MalformedHeader(_) => None,
            Error::DeserializeYaml(err) => Some(err),
            Error::MalformedSlug(err) => Some(err),
            Error::InvalidFileName(_) => None,
            Error::Markup(err) => Some(err),
            Error::UrlParse(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Annotated(_, err) => Some(err),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    /// Converts a [`serde_yaml::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for [`serde_yaml`] deserialization functions.
    fn from(err: serde_yaml::Error) -> Error {
        Error::DeserializeYaml(err)
    }
}

impl From<MalformedSlugError> for Error {
    fn from(err: MalformedSlugError) -> Error {
        Error::MalformedSlug(err)
    }
}

impl From<markup::Error> for Error {
    fn from(err: markup::Error) -> Error {
        Error::Markup(err)
    }
}

impl From<url::ParseError> for Error {
    /// Converts a [`url::ParseError`] into an [`Error`]. It allows us to use
    /// the `?` operator for URL parsing functions.
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}

impl From<std::io::Error> for Error {
    /// Converts a [`std::io::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator for fallible I/O functions.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::markup::Processor;
    use std::io::Write;

    struct Shout;

    impl Processor for Shout {
        fn process(&self, raw: &str) -> markup::Result<String> {
            Ok(raw.trim().to_uppercase())
        }
    }

    fn defaults() -> Mapping {
        serde_yaml::from_str("title: Post title\nauthor: Marcos\nlayout: post\ntags: []\n")
            .unwrap()
    }

    fn fixture(file_name: &str, contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(file_name);
        std::fs::File::create(&path)
            .unwrap()
            .write_all(contents.as_bytes())
            .unwrap();
        (dir, path)
    }

    fn parse(file_name: &str, contents: &str) -> Result<Post> {
        let (dir, path) = fixture(file_name, contents);
        let defaults = defaults();
        let processors = Registry::empty().register(Markup::Markdown, Box::new(Shout));
        let parser = Parser {
            base_url: "http://example.org/blog",
            output_directory: &dir.path().join("site"),
            defaults: &defaults,
            processors: &processors,
        };
        parser.parse_post(&path)
    }

    fn root_cause(err: &Error) -> &Error {
        match err {
            Error::Annotated(_, inner) => root_cause(inner),
            _ => err,
        }
    }

    #[test]
    fn test_parse_post() -> Result<()> {
        let post = parse(
            "2023-01-05-hello.md",
            "---\ntitle: Hello\nauthor: Alice\npub_date: 2023-01-05 09:30:00\ntags: [x, y]\n---\nhi --- there\n",
        )?;
        assert_eq!("2023-01-05-hello", post.slug);
        assert_eq!("Hello", post.metadata.title);
        assert_eq!("Alice", post.metadata.author);
        assert_eq!(vec!["x".to_owned(), "y".to_owned()], post.metadata.tags);
        assert_eq!("2023-01-05 09:30:00", post.metadata.pub_date.as_str());
        assert_eq!("\nhi --- there\n", post.raw);
        assert_eq!("HI --- THERE", post.body);
        assert!(post.output_path.ends_with("site/2023/01/2023-01-05-hello.html"));
        assert_eq!("http://example.org/blog/2023/01/2023-01-05-hello.html", post.url);
        assert_eq!(
            "tag:example.org,2023-01-05:/blog/2023/01/2023-01-05-hello.html",
            post.id
        );
        Ok(())
    }

    #[test]
    fn test_defaults_are_merged() -> Result<()> {
        let post = parse("2023-02-10-world.md", "---\npub_date: 2023-02-10\n---\nbody")?;
        assert_eq!("Marcos", post.metadata.author);
        assert_eq!("Post title", post.metadata.title);
        assert!(post.metadata.tags.is_empty());
        assert_eq!(Some(&Yaml::String("post".to_owned())), post.metadata.extra.get("layout"));

        let post = parse(
            "2023-02-10-world.md",
            "---\nauthor: Bob\nlayout: page\npub_date: 2023-02-10\n---\nbody",
        )?;
        assert_eq!("Bob", post.metadata.author);
        assert_eq!(Some(&Yaml::String("page".to_owned())), post.metadata.extra.get("layout"));
        Ok(())
    }

    #[test]
    fn test_missing_header() {
        let err = parse("2023-01-05-hello.md", "title: Hello\n").unwrap_err();
        assert!(matches!(root_cause(&err), Error::MissingHeader), "{}", err);
    }

    #[test]
    fn test_unclosed_header() {
        let err = parse("2023-01-05-hello.md", "---\ntitle: Hello\n").unwrap_err();
        assert!(matches!(root_cause(&err), Error::MalformedHeader(_)), "{}", err);
    }

    #[test]
    fn test_malformed_slug() {
        let err = parse("hello.md", "---\npub_date: 2023-01-05\n---\nbody").unwrap_err();
        assert!(matches!(root_cause(&err), Error::MalformedSlug(_)), "{}", err);
    }

    #[test]
    fn test_missing_pub_date() {
        let err = parse("2023-01-05-hello.md", "---\ntitle: Hello\n---\nbody").unwrap_err();
        assert!(matches!(root_cause(&err), Error::DeserializeYaml(_)), "{}", err);
    }

    #[test]
    fn test_unsupported_markup() {
        let err = parse(
            "2023-01-05-hello.md",
            "---\npub_date: 2023-01-05\nmarkup: html\n---\nbody",
        )
        .unwrap_err();
        assert!(
            matches!(root_cause(&err), Error::Markup(markup::Error::UnsupportedMarkup(Markup::Html))),
            "{}",
            err
        );
    }

    #[test]
    fn test_undeclared_markup() {
        let err = parse(
            "2023-01-05-hello.md",
            "---\npub_date: 2023-01-05\nmarkup: textile\n---\nbody",
        )
        .unwrap_err();
        match root_cause(&err) {
            Error::Markup(markup::Error::UnsupportedMarkup(Markup::Other(name))) => {
                assert_eq!("textile", name)
            }
            _ => panic!("unexpected error: {}", err),
        }
    }

    #[test]
    fn test_numeric_scalars() -> Result<()> {
        let metadata = parse_metadata(
            "\ntitle: 1.5\nauthor: 42\npub_date: 2023-01-05\ntags: [rust, 2023, true]\n",
            &defaults(),
        )?;
        assert_eq!("1.5", metadata.title);
        assert_eq!("42", metadata.author);
        assert_eq!(vec!["rust", "2023", "true"], metadata.tags);

        let post = parse(
            "2023-01-05-hello.md",
            "---\ntitle: 2023\npub_date: 2023-01-05\ntags: [2023]\n---\nbody",
        )?;
        assert_eq!("2023", post.metadata.title);
        assert_eq!(vec!["2023"], post.metadata.tags);
        Ok(())
    }

    #[test]
    fn test_nested_title_is_rejected() {
        let err =
            parse_metadata("\ntitle: [a, b]\npub_date: 2023-01-05\n", &defaults()).unwrap_err();
        assert!(matches!(err, Error::DeserializeYaml(_)), "{}", err);
    }

    #[test]
    fn test_undecodable_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2023-01-05-hello.md");
        std::fs::write(&path, b"---\ntitle: caf\xff\npub_date: 2023-01-05\n---\nbody").unwrap();
        let defaults = defaults();
        let processors = Registry::default();
        let parser = Parser {
            base_url: "http://example.org",
            output_directory: dir.path(),
            defaults: &defaults,
            processors: &processors,
        };
        let err = parser.parse_post(&path).unwrap_err();
        assert!(matches!(root_cause(&err), Error::Unreadable { .. }), "{}", err);
    }

    #[test]
    fn test_unreadable_source() {
        let err = parse_missing().unwrap_err();
        assert!(matches!(root_cause(&err), Error::Unreadable { .. }), "{}", err);
    }

    fn parse_missing() -> Result<Post> {
        let defaults = defaults();
        let processors = Registry::default();
        let parser = Parser {
            base_url: "http://example.org",
            output_directory: Path::new("site"),
            defaults: &defaults,
            processors: &processors,
        };
        parser.parse_post(Path::new("/nonexistent/2023-01-05-hello.md"))
    }

    #[test]
    fn test_pub_date_ordering() {
        let midnight = PubDate::parse("2023-01-05").unwrap();
        let morning = PubDate::parse("2023-01-05 09:30:00").unwrap();
        let later = PubDate::parse("2023-01-05T10:00:00").unwrap();
        assert!(midnight < morning);
        assert!(morning < later);
        assert!(PubDate::parse("yesterday").is_none());
    }

    #[test]
    fn test_pub_date_formats() {
        let date = PubDate::parse("2023-01-05 09:30").unwrap();
        assert_eq!("2023-01-05 09:30", date.to_string());
        assert_eq!("2023-01-05T09:30:00Z", date.to_rfc3339());
        assert_eq!("January 5, 2023", date.format(LONG_DATE));
        assert_eq!("Jan 5, 2023", date.format(SHORT_DATE));
    }

    #[test]
    fn test_summary() -> Result<()> {
        let mut post = parse("2023-01-05-hello.md", "---\npub_date: 2023-01-05\n---\nbody")?;
        post.body = "<p>intro</p><!-- more --><p>rest</p>".to_owned();
        let (summary, summarized) = post.summary();
        assert_eq!("<p>intro</p>", summary);
        assert!(summarized);

        post.body = "<p>all</p>".to_owned();
        let (summary, summarized) = post.summary();
        assert_eq!("<p>all</p>", summary);
        assert!(!summarized);
        Ok(())
    }

    #[test]
    fn test_inline_summary_marker() -> Result<()> {
        let mut post = parse("2023-01-05-hello.md", "---\npub_date: 2023-01-05\n---\nbody")?;
        post.body = "<p>first</p>\n<p>intro <!-- more --> rest</p>\n".to_owned();
        let (summary, summarized) = post.summary();
        assert_eq!("<p>first</p>\n<p>intro</p>", summary);
        assert!(summarized);
        Ok(())
    }
}
