//! Support for creating Atom feeds from a list of posts. This is the built-in
//! feed writer, used when the layout doesn't supply a feed template.

use crate::config::Author;
use crate::post::{Post, PubDate};
use atom_syndication::{Category, Content, Entry, Error as AtomError, Feed, Link, Person};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use std::fmt;
use std::io::Write;
use std::rc::Rc;

/// Bundled configuration for creating a feed.
pub struct FeedConfig<'a> {
    pub title: &'a str,

    /// The feed's own id (the blog id).
    pub id: &'a str,

    pub author: &'a Author,

    /// The blog's home page, linked as the feed's `alternate`.
    pub home_page: &'a str,

    /// The feed's URL, linked as the feed's `self`.
    pub feed_url: &'a str,

    /// The feed's `updated` timestamp, normally the blog's `last_updated`.
    pub updated: Option<&'a PubDate>,
}

/// Creates a feed from some configuration ([`FeedConfig`]) and a list of
/// [`Post`]s and writes the result to a [`std::io::Write`].
pub fn write_feed<W: Write>(config: &FeedConfig, posts: &[Rc<Post>], w: W) -> Result<()> {
    feed(config, posts).write_to(w)?;
    Ok(())
}

fn feed(config: &FeedConfig, posts: &[Rc<Post>]) -> Feed {
    let mut feed = Feed::default();
    feed.set_title(config.title.to_owned());
    feed.set_id(config.id.to_owned());
    feed.set_updated(match config.updated {
        Some(date) => to_datetime(date),
        // No posts: fall back to a fixed instant so the output is stable.
        None => epoch(),
    });
    feed.set_authors(vec![person(&config.author.name, config.author.email.clone())]);
    feed.set_links(vec![
        link(config.home_page, "alternate"),
        link(config.feed_url, "self"),
    ]);
    feed.set_entries(posts.iter().map(|post| entry(post)).collect::<Vec<Entry>>());
    feed
}

fn entry(post: &Post) -> Entry {
    let date = to_datetime(&post.metadata.pub_date);

    let mut content = Content::default();
    content.set_content_type("html".to_owned());
    content.set_value(post.body.clone());

    let mut entry = Entry::default();
    entry.set_id(post.id.clone());
    entry.set_title(post.metadata.title.clone());
    entry.set_updated(date);
    entry.set_published(Some(date));
    entry.set_authors(vec![person(&post.metadata.author, None)]);
    entry.set_links(vec![link(&post.url, "alternate")]);
    entry.set_categories(
        post.metadata
            .tags
            .iter()
            .map(|tag| {
                let mut category = Category::default();
                category.set_term(tag.clone());
                category
            })
            .collect::<Vec<Category>>(),
    );
    entry.set_content(Some(content));
    entry
}

fn person(name: &str, email: Option<String>) -> Person {
    let mut person = Person::default();
    person.set_name(name.to_owned());
    person.set_email(email);
    person
}

fn link(href: &str, rel: &str) -> Link {
    let mut link = Link::default();
    link.set_href(href.to_owned());
    link.set_rel(rel.to_owned());
    link
}

// Publication dates carry no timezone; they are taken to be UTC.
fn to_datetime(date: &PubDate) -> DateTime<FixedOffset> {
    Utc.from_utc_datetime(&date.timestamp()).into()
}

fn epoch() -> DateTime<FixedOffset> {
    match NaiveDate::from_ymd_opt(1970, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0)) {
        Some(naive) => Utc.from_utc_datetime(&naive).into(),
        None => Utc::now().into(),
    }
}

type Result<T> = std::result::Result<T, Error>;

/// Represents a problem writing a feed.
#[derive(Debug)]
pub enum Error {
    /// Returned when there is an Atom-related error.
    Atom(AtomError),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Atom(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Atom(err) => Some(err),
        }
    }
}

impl From<AtomError> for Error {
    /// Converts [`AtomError`]s into [`Error`]. This allows us to use the `?`
    /// operator in fallible feed operations.
    fn from(err: AtomError) -> Error {
        Error::Atom(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::post::Metadata;
    use std::path::PathBuf;

    fn post(slug: &str, date: &str, tags: &[&str]) -> Rc<Post> {
        let url = format!("http://example.org/2023/01/{}.html", slug);
        Rc::new(Post {
            slug: slug.to_owned(),
            metadata: Metadata {
                title: format!("Title of {}", slug),
                author: "Alice".to_owned(),
                pub_date: PubDate::parse(date).unwrap(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                markup: Default::default(),
                extra: Default::default(),
            },
            raw: String::new(),
            body: "<p>Hi & bye</p>".to_owned(),
            output_path: PathBuf::new(),
            id: format!("tag:example.org,{}:/2023/01/{}.html", &date[..10], slug),
            url,
        })
    }

    fn render(updated: Option<&PubDate>, posts: &[Rc<Post>]) -> String {
        let author = Author {
            name: "Marcos".to_owned(),
            email: Some("marcos@example.org".to_owned()),
        };
        let config = FeedConfig {
            title: "Test blog",
            id: "http://example.org/atom.xml",
            author: &author,
            home_page: "http://example.org",
            feed_url: "http://example.org/atom.xml",
            updated,
        };
        let mut out = Vec::new();
        write_feed(&config, posts, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_feed() {
        let posts = vec![post("2023-01-05-hello", "2023-01-05", &["x"])];
        let updated = PubDate::parse("2023-01-05").unwrap();
        let xml = render(Some(&updated), &posts);
        assert!(xml.contains("<id>http://example.org/atom.xml</id>"), "{}", xml);
        assert!(xml.contains("<title>Test blog</title>"), "{}", xml);
        assert!(xml.contains("2023-01-05T00:00:00+00:00"), "{}", xml);
        assert!(
            xml.contains("<id>tag:example.org,2023-01-05:/2023/01/2023-01-05-hello.html</id>"),
            "{}",
            xml
        );
        assert!(xml.contains("term=\"x\""), "{}", xml);
        assert!(xml.contains("Hi &amp; bye"), "{}", xml);
    }

    #[test]
    fn test_feed_is_stable() {
        let posts = vec![
            post("2023-01-05-hello", "2023-01-05", &["x"]),
            post("2023-02-10-world", "2023-02-10 08:00:00", &["x", "y"]),
        ];
        assert_eq!(render(None, &posts), render(None, &posts));
        assert!(render(None, &[]).contains("1970-01-01T00:00:00+00:00"));
    }
}
