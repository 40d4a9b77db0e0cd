//! The template context. A [`SiteContext`] holds the blog-wide values every
//! page sees; each render call gets a fresh [`Value`] built from it plus
//! exactly one [`Overlay`] (`post`, `tag`, `tags`, `author`, `authors`, or
//! `posts`), so no page can see another page's data.
//!
//! The values templates see:
//!
//! * `blog`: `title`, `url`, `id`, `last_updated` (and `last_updated_iso`),
//!   `author`, `email`
//! * `license_text`
//! * `links`: `site`, `index`, `taglist`, `archive`, `authorlist`, `feed`,
//!   and `css`
//! * the overlay key, see [`Overlay`]

use crate::config::Config;
use crate::index::{Group, Index};
use crate::paths;
use crate::post::{self, Post, PubDate};
use gtmpl::Value;
use serde_yaml::Value as Yaml;
use std::collections::HashMap;
use std::rc::Rc;

/// The page-specific part of a template context.
pub enum Overlay<'a> {
    /// A single post page: `post`.
    Post(&'a Post),

    /// A single tag page: `tag`, with its `posts`.
    Tag(&'a Group),

    /// The tag list page: `tags`, in name order.
    Tags(&'a Index),

    /// A single author page: `author`, with its `posts`.
    Author(&'a Group),

    /// The author list page: `authors`, in name order.
    Authors(&'a Index),

    /// The index, archive, and feed: `posts`.
    Posts(&'a [Rc<Post>]),
}

impl Overlay<'_> {
    /// The context key the overlay is exposed under.
    pub fn key(&self) -> &'static str {
        match self {
            Overlay::Post(_) => "post",
            Overlay::Tag(_) => "tag",
            Overlay::Tags(_) => "tags",
            Overlay::Author(_) => "author",
            Overlay::Authors(_) => "authors",
            Overlay::Posts(_) => "posts",
        }
    }
}

/// The blog-wide template values.
#[derive(Debug, Clone)]
pub struct SiteContext {
    title: String,
    base_url: String,
    feed_id: String,
    last_updated: Option<PubDate>,
    author: String,
    email: Option<String>,
    license_text: String,
    links: Vec<(&'static str, String)>,
    tags_prefix: String,
    authors_prefix: String,
}

impl SiteContext {
    pub fn new(config: &Config) -> SiteContext {
        let base_url = config.base_url();
        let link = |page: &str| paths::absolute_url(page, &base_url);
        SiteContext {
            title: config.title.clone(),
            feed_id: link("atom.xml"),
            last_updated: None,
            author: config.author.name.clone(),
            email: config.author.email.clone(),
            license_text: config.license_text.clone(),
            links: vec![
                ("site", base_url.clone()),
                ("index", link(&config.pages.index)),
                ("taglist", link(&config.pages.taglist)),
                ("archive", link(&config.pages.archive)),
                ("authorlist", link(&config.pages.authorlist)),
                ("feed", link(&config.pages.feed)),
                ("css", link(&config.pages.css)),
            ],
            tags_prefix: config.tags_prefix.clone(),
            authors_prefix: config.authors_prefix.clone(),
            base_url,
        }
    }

    /// The blog's feed id (`{base_url}/atom.xml`).
    pub fn feed_id(&self) -> &str {
        &self.feed_id
    }

    pub fn last_updated(&self) -> Option<&PubDate> {
        self.last_updated.as_ref()
    }

    /// Sets `blog.last_updated` for every render from now on.
    pub fn set_last_updated(&mut self, date: PubDate) {
        self.last_updated = Some(date);
    }

    /// Builds the context for one render: the blog-wide values plus
    /// `overlay` under its key.
    pub fn with(&self, overlay: &Overlay) -> Value {
        let mut m = self.base();
        let value = match overlay {
            Overlay::Post(post) => self.post_value(post),
            Overlay::Tag(group) | Overlay::Author(group) => self.group_value(group),
            Overlay::Tags(index) | Overlay::Authors(index) => {
                Value::Array(index.groups().map(|g| self.group_value(g)).collect())
            }
            Overlay::Posts(posts) => self.posts_value(posts),
        };
        m.insert(overlay.key().to_owned(), value);
        Value::Object(m)
    }

    fn base(&self) -> HashMap<String, Value> {
        let mut blog: HashMap<String, Value> = HashMap::new();
        blog.insert("title".to_owned(), Value::String(self.title.clone()));
        blog.insert("url".to_owned(), Value::String(self.base_url.clone()));
        blog.insert("id".to_owned(), Value::String(self.feed_id.clone()));
        let (last_updated, last_updated_iso) = match &self.last_updated {
            Some(date) => (
                Value::String(date.to_string()),
                Value::String(date.to_rfc3339()),
            ),
            None => (Value::Nil, Value::Nil),
        };
        blog.insert("last_updated".to_owned(), last_updated);
        blog.insert("last_updated_iso".to_owned(), last_updated_iso);
        blog.insert("author".to_owned(), Value::String(self.author.clone()));
        blog.insert(
            "email".to_owned(),
            match &self.email {
                Some(email) => Value::String(email.clone()),
                None => Value::Nil,
            },
        );

        let links = self
            .links
            .iter()
            .map(|(key, url)| (key.to_string(), Value::String(url.clone())))
            .collect();

        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("blog".to_owned(), Value::Object(blog));
        m.insert(
            "license_text".to_owned(),
            Value::String(self.license_text.clone()),
        );
        m.insert("links".to_owned(), Value::Object(links));
        m
    }

    fn posts_value(&self, posts: &[Rc<Post>]) -> Value {
        Value::Array(posts.iter().map(|p| self.post_value(p)).collect())
    }

    /// Converts a [`Post`] into a [`Value`] with fields `slug`, `title`,
    /// `author`, `author_url`, `pub_date` (as authored, plus `pub_date_iso`,
    /// `pub_date_long`, and `pub_date_short`), `tags` (each with `name` and
    /// `url`), `body`, `summary`, `summarized`, `url`, `id`, and `metadata`
    /// (every header key, defaults included).
    fn post_value(&self, post: &Post) -> Value {
        let (summary, summarized) = post.summary();
        let tags = post
            .metadata
            .tags
            .iter()
            .map(|tag| {
                let mut t: HashMap<String, Value> = HashMap::new();
                t.insert("name".to_owned(), Value::String(tag.clone()));
                t.insert(
                    "url".to_owned(),
                    Value::String(paths::tag_url(&self.base_url, &self.tags_prefix, tag)),
                );
                Value::Object(t)
            })
            .collect::<Vec<Value>>();

        let mut metadata: HashMap<String, Value> = post
            .metadata
            .extra
            .iter()
            .map(|(key, value)| (key.clone(), yaml_to_value(value)))
            .collect();
        metadata.insert("title".to_owned(), Value::String(post.metadata.title.clone()));
        metadata.insert("author".to_owned(), Value::String(post.metadata.author.clone()));
        metadata.insert(
            "pub_date".to_owned(),
            Value::String(post.metadata.pub_date.to_string()),
        );
        metadata.insert("tags".to_owned(), Value::Array(tags.clone()));
        metadata.insert(
            "markup".to_owned(),
            Value::String(post.metadata.markup.to_string()),
        );

        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("slug".to_owned(), Value::String(post.slug.clone()));
        m.insert("title".to_owned(), Value::String(post.metadata.title.clone()));
        m.insert("author".to_owned(), Value::String(post.metadata.author.clone()));
        m.insert(
            "author_url".to_owned(),
            Value::String(paths::author_url(
                &self.base_url,
                &self.authors_prefix,
                &post.metadata.author,
            )),
        );
        let pub_date = &post.metadata.pub_date;
        m.insert("pub_date".to_owned(), Value::String(pub_date.to_string()));
        m.insert("pub_date_iso".to_owned(), Value::String(pub_date.to_rfc3339()));
        m.insert(
            "pub_date_long".to_owned(),
            Value::String(pub_date.format(post::LONG_DATE)),
        );
        m.insert(
            "pub_date_short".to_owned(),
            Value::String(pub_date.format(post::SHORT_DATE)),
        );
        m.insert("tags".to_owned(), Value::Array(tags));
        m.insert("body".to_owned(), Value::String(post.body.clone()));
        m.insert("summary".to_owned(), Value::String(summary.into_owned()));
        m.insert("summarized".to_owned(), Value::Bool(summarized));
        m.insert("url".to_owned(), Value::String(post.url.clone()));
        m.insert("id".to_owned(), Value::String(post.id.clone()));
        m.insert("metadata".to_owned(), Value::Object(metadata));
        Value::Object(m)
    }

    fn group_value(&self, group: &Group) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("name".to_owned(), Value::String(group.name.clone()));
        m.insert("url".to_owned(), Value::String(group.url.clone()));
        m.insert(
            "path".to_owned(),
            Value::String(group.output_path.to_string_lossy().into_owned()),
        );
        m.insert("count".to_owned(), Value::from(group.posts.len() as u64));
        m.insert("posts".to_owned(), self.posts_value(&group.posts));
        Value::Object(m)
    }
}

/// Converts a YAML header value into a template [`Value`]. Mapping keys that
/// aren't scalars are dropped.
fn yaml_to_value(yaml: &Yaml) -> Value {
    match yaml {
        Yaml::Null => Value::Nil,
        Yaml::Bool(b) => Value::Bool(*b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                Value::from(n.as_f64().unwrap_or_default())
            }
        }
        Yaml::String(s) => Value::String(s.clone()),
        Yaml::Sequence(items) => Value::Array(items.iter().map(yaml_to_value).collect()),
        Yaml::Mapping(mapping) => Value::Object(
            mapping
                .iter()
                .filter_map(|(key, value)| {
                    let key = match key {
                        Yaml::String(s) => s.clone(),
                        Yaml::Number(n) => n.to_string(),
                        Yaml::Bool(b) => b.to_string(),
                        _ => return None,
                    };
                    Some((key, yaml_to_value(value)))
                })
                .collect(),
        ),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::post::Metadata;
    use std::path::{Path, PathBuf};

    const SETTINGS: &str = "
blog:
  title: Test blog
  domain: example.org
  license_text: CC-BY
author:
  name: Marcos
  email: marcos@example.org
pages:
  feed: /feeds/atom.xml
templates:
  index: index.tmpl
  archive: archive.tmpl
  post: post.tmpl
  tag: tag.tmpl
  taglist: tags.tmpl
  author: author.tmpl
  authorlist: authors.tmpl
";

    fn context() -> SiteContext {
        SiteContext::new(&Config::parse(SETTINGS, Path::new(".")).unwrap())
    }

    fn post() -> Post {
        let mut extra = std::collections::BTreeMap::new();
        extra.insert("layout".to_owned(), Yaml::String("post".to_owned()));
        Post {
            slug: "2023-01-05-hello".to_owned(),
            metadata: Metadata {
                title: "Hello".to_owned(),
                author: "Alice".to_owned(),
                pub_date: PubDate::parse("2023-01-05").unwrap(),
                tags: vec!["x".to_owned()],
                markup: Default::default(),
                extra,
            },
            raw: "Hi".to_owned(),
            body: "<p>Hi</p>".to_owned(),
            output_path: PathBuf::from("site/2023/01/2023-01-05-hello.html"),
            url: "http://example.org/2023/01/2023-01-05-hello.html".to_owned(),
            id: "tag:example.org,2023-01-05:/2023/01/2023-01-05-hello.html".to_owned(),
        }
    }

    fn object(value: &Value) -> &HashMap<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected an object"),
        }
    }

    fn string<'a>(value: &'a Value, path: &[&str]) -> &'a str {
        let mut current = value;
        for key in path {
            current = &object(current)[*key];
        }
        match current {
            Value::String(s) => s,
            _ => panic!("expected a string at {:?}", path),
        }
    }

    #[test]
    fn test_base_values() {
        let value = context().with(&Overlay::Posts(&[]));
        assert_eq!("Test blog", string(&value, &["blog", "title"]));
        assert_eq!("http://example.org", string(&value, &["blog", "url"]));
        assert_eq!("http://example.org/atom.xml", string(&value, &["blog", "id"]));
        assert_eq!("marcos@example.org", string(&value, &["blog", "email"]));
        assert_eq!("CC-BY", string(&value, &["license_text"]));
        assert_eq!("http://example.org/tags.html", string(&value, &["links", "taglist"]));
        assert_eq!("/feeds/atom.xml", string(&value, &["links", "feed"]));
        assert!(matches!(object(&object(&value)["blog"])["last_updated"], Value::Nil));
    }

    #[test]
    fn test_overlay_is_isolated() {
        let post = post();
        let context = context();
        let first = context.with(&Overlay::Post(&post));
        let second = context.with(&Overlay::Posts(&[]));
        assert!(object(&first).contains_key("post"));
        assert!(!object(&first).contains_key("posts"));
        assert!(object(&second).contains_key("posts"));
        assert!(!object(&second).contains_key("post"));
    }

    #[test]
    fn test_post_value() {
        let value = context().with(&Overlay::Post(&post()));
        assert_eq!("Hello", string(&value, &["post", "title"]));
        assert_eq!("<p>Hi</p>", string(&value, &["post", "body"]));
        assert_eq!("2023-01-05", string(&value, &["post", "pub_date"]));
        assert_eq!("2023-01-05T00:00:00Z", string(&value, &["post", "pub_date_iso"]));
        assert_eq!("January 5, 2023", string(&value, &["post", "pub_date_long"]));
        assert_eq!("post", string(&value, &["post", "metadata", "layout"]));
        assert_eq!("Alice", string(&value, &["post", "metadata", "author"]));
        assert_eq!(
            "http://example.org/authors/Alice.html",
            string(&value, &["post", "author_url"])
        );
        match &object(&object(&value)["post"])["tags"] {
            Value::Array(tags) => {
                assert_eq!(1, tags.len());
                assert_eq!("http://example.org/tags/x.html", string(&tags[0], &["url"]));
            }
            _ => panic!("expected an array"),
        }
    }

    #[test]
    fn test_last_updated() {
        let mut context = context();
        context.set_last_updated(PubDate::parse("2023-01-05 10:00:00").unwrap());
        let value = context.with(&Overlay::Posts(&[]));
        assert_eq!("2023-01-05 10:00:00", string(&value, &["blog", "last_updated"]));
        assert_eq!("2023-01-05T10:00:00Z", string(&value, &["blog", "last_updated_iso"]));
    }
}
