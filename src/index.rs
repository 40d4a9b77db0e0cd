//! Groups posts by tag and by author. An [`Index`] accumulates posts into
//! [`Group`]s as they are discovered; both the tag index and the author index
//! are instances of it, differing only in their URL prefix.

use crate::paths;
use crate::post::Post;
use std::collections::btree_map::{self, BTreeMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// A tag or an author together with every post filed under it.
#[derive(Debug, Clone)]
pub struct Group {
    /// The tag or author name, exactly as authored.
    pub name: String,

    /// The public URL of the group's page.
    pub url: String,

    /// Where the group's page is written.
    pub output_path: PathBuf,

    /// The group's posts in discovery order. These are shared with the
    /// builder's post list and with every other group the post belongs to.
    pub posts: Vec<Rc<Post>>,
}

/// A collection of [`Group`]s keyed by name. Iteration is in key order.
pub struct Index {
    base_url: String,
    output_directory: PathBuf,
    prefix: String,
    groups: BTreeMap<String, Group>,
}

/// Groups posts by tag.
pub type TagIndex = Index;

/// Groups posts by author.
pub type AuthorIndex = Index;

impl Index {
    /// Creates an empty index whose group pages live at
    /// `{output_directory}/{prefix}/{name}.html` and
    /// `{base_url}/{prefix}/{name}.html`.
    pub fn new(base_url: &str, output_directory: &Path, prefix: &str) -> Index {
        Index {
            base_url: base_url.to_owned(),
            output_directory: output_directory.to_owned(),
            prefix: prefix.to_owned(),
            groups: BTreeMap::new(),
        }
    }

    /// Files `post` under `key`, creating the group on first sight.
    pub fn register(&mut self, post: &Rc<Post>, key: &str) {
        match self.groups.get_mut(key) {
            Some(group) => group.posts.push(Rc::clone(post)),
            None => {
                let group = Group {
                    name: key.to_owned(),
                    url: paths::group_url(&self.base_url, &self.prefix, key),
                    output_path: paths::group_path(
                        &self.output_directory,
                        &self.prefix,
                        Some(key),
                    ),
                    posts: vec![Rc::clone(post)],
                };
                self.groups.insert(key.to_owned(), group);
            }
        }
    }

    /// The directory holding every group page.
    pub fn directory(&self) -> PathBuf {
        paths::group_path(&self.output_directory, &self.prefix, None)
    }

    pub fn get(&self, key: &str) -> Option<&Group> {
        self.groups.get(key)
    }

    pub fn groups(&self) -> btree_map::Values<'_, String, Group> {
        self.groups.values()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::post::{Metadata, PubDate};

    fn post(slug: &str, author: &str, tags: &[&str]) -> Rc<Post> {
        Rc::new(Post {
            slug: slug.to_owned(),
            metadata: Metadata {
                title: slug.to_owned(),
                author: author.to_owned(),
                pub_date: PubDate::parse("2023-01-05").unwrap(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                markup: Default::default(),
                extra: Default::default(),
            },
            raw: String::new(),
            body: String::new(),
            output_path: PathBuf::new(),
            url: String::new(),
            id: String::new(),
        })
    }

    fn tag_index(posts: &[Rc<Post>]) -> TagIndex {
        let mut index = TagIndex::new("http://example.org", Path::new("site"), "tags");
        for post in posts {
            for tag in &post.metadata.tags {
                index.register(post, tag);
            }
        }
        index
    }

    fn slugs(group: &Group) -> Vec<&str> {
        group.posts.iter().map(|p| p.slug.as_str()).collect()
    }

    #[test]
    fn test_register_preserves_discovery_order() {
        // Discovery order, not date order.
        let posts = vec![post("2023-02-01-p1", "Alice", &["a", "b"]), post("2023-01-01-p2", "Bob", &["b"])];
        let index = tag_index(&posts);
        assert_eq!(2, index.len());
        assert_eq!(vec!["2023-02-01-p1"], slugs(index.get("a").unwrap()));
        assert_eq!(vec!["2023-02-01-p1", "2023-01-01-p2"], slugs(index.get("b").unwrap()));
    }

    #[test]
    fn test_register_shares_posts() {
        let posts = vec![post("2023-01-01-p1", "Alice", &["a", "b"])];
        let index = tag_index(&posts);
        assert!(Rc::ptr_eq(&posts[0], &index.get("a").unwrap().posts[0]));
        assert!(Rc::ptr_eq(&posts[0], &index.get("b").unwrap().posts[0]));
    }

    #[test]
    fn test_group_locations() {
        let posts = vec![post("2023-01-01-p1", "Alice", &["Rust"])];
        let mut authors = AuthorIndex::new("http://example.org", Path::new("site"), "authors");
        authors.register(&posts[0], &posts[0].metadata.author);

        let alice = authors.get("Alice").unwrap();
        assert_eq!("http://example.org/authors/Alice.html", alice.url);
        assert_eq!(PathBuf::from("site/authors/Alice.html"), alice.output_path);
        assert_eq!(PathBuf::from("site/authors"), authors.directory());

        // Case is kept as authored.
        let tags = tag_index(&posts);
        assert!(tags.get("rust").is_none());
        assert_eq!("http://example.org/tags/Rust.html", tags.get("Rust").unwrap().url);
    }

    #[test]
    fn test_groups_iterate_in_key_order() {
        let posts = vec![post("2023-01-01-p1", "Alice", &["zeta", "alpha", "mu"])];
        let index = tag_index(&posts);
        let names: Vec<&str> = index.groups().map(|g| g.name.as_str()).collect();
        assert_eq!(vec!["alpha", "mu", "zeta"], names);
    }
}
