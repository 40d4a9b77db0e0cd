//! Body processors: the capability that turns a post's raw body into HTML.
//! Which processor runs is chosen per post by the `markup` key in its header
//! (see [`Markup`]), looked up in a [`Registry`].

use pulldown_cmark::escape::escape_html;
use pulldown_cmark::{html, Options, Parser};
use regex::{Captures, Regex};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt;

/// The markup language a post body is written in. Names are matched without
/// regard to case; a name with no variant of its own is kept as [`Markup::Other`]
/// so the [`Registry`] can report it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Markup {
    /// Markdown with `[sourcecode:LANG]` blocks. This is the default.
    Markdown,

    /// Raw HTML, passed through untouched.
    Html,

    /// Any other declared markup, e.g. `textile`.
    Other(String),
}

impl Markup {
    pub fn from_name(name: &str) -> Markup {
        let name = name.trim().to_lowercase();
        match name.as_str() {
            "markdown" => Markup::Markdown,
            "html" => Markup::Html,
            _ => Markup::Other(name),
        }
    }
}

impl Default for Markup {
    fn default() -> Self {
        Markup::Markdown
    }
}

impl fmt::Display for Markup {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Markup::Markdown => write!(f, "markdown"),
            Markup::Html => write!(f, "html"),
            Markup::Other(name) => f.write_str(name),
        }
    }
}

impl<'de> Deserialize<'de> for Markup {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Markup, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(|name| Markup::from_name(&name))
    }
}

/// Converts a raw post body into HTML.
pub trait Processor {
    fn process(&self, raw: &str) -> Result<String>;
}

/// Maps each [`Markup`] onto the [`Processor`] that handles it.
pub struct Registry {
    processors: HashMap<Markup, Box<dyn Processor>>,
}

impl Registry {
    /// A registry with no processors at all.
    pub fn empty() -> Registry {
        Registry {
            processors: HashMap::new(),
        }
    }

    /// Registers `processor` for `markup`, replacing any previous one.
    pub fn register(mut self, markup: Markup, processor: Box<dyn Processor>) -> Registry {
        self.processors.insert(markup, processor);
        self
    }

    pub fn get(&self, markup: &Markup) -> Result<&dyn Processor> {
        self.processors
            .get(markup)
            .map(|p| p.as_ref())
            .ok_or_else(|| Error::UnsupportedMarkup(markup.clone()))
    }
}

impl Default for Registry {
    /// Registers [`MarkdownProcessor`] and [`HtmlProcessor`].
    fn default() -> Registry {
        Registry::empty()
            .register(Markup::Markdown, Box::new(MarkdownProcessor::new()))
            .register(Markup::Html, Box::new(HtmlProcessor))
    }
}

/// Converts Markdown to HTML. Before the Markdown pass, every
/// `[sourcecode:LANG] ... [/sourcecode]` block is replaced by a
/// `<pre class="sourcecode"><code class="language-LANG">` block holding the
/// escaped code, so the stylesheet (or a client-side highlighter) can color
/// it by language.
pub struct MarkdownProcessor {
    sourcecode: Regex,
}

impl MarkdownProcessor {
    pub fn new() -> MarkdownProcessor {
        MarkdownProcessor {
            // The pattern is a literal; it always compiles.
            sourcecode: Regex::new(r"(?s)\[sourcecode:(.+?)\](.+?)\[/sourcecode\]")
                .unwrap(),
        }
    }

    fn expand_sourcecode(&self, raw: &str) -> Result<String> {
        let mut failure = None;
        let expanded = self.sourcecode.replace_all(raw, |caps: &Captures| {
            let mut block = String::new();
            if let Err(e) = sourcecode_block(&mut block, caps[1].trim(), &caps[2]) {
                failure = Some(e);
            }
            block
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(expanded.into_owned()),
        }
    }
}

impl Default for MarkdownProcessor {
    fn default() -> Self {
        MarkdownProcessor::new()
    }
}

impl Processor for MarkdownProcessor {
    fn process(&self, raw: &str) -> Result<String> {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_SMART_PUNCTUATION);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_TASKLISTS);

        let expanded = self.expand_sourcecode(raw)?;
        let mut out = String::with_capacity(expanded.len() * 3 / 2);
        html::push_html(&mut out, Parser::new_ext(&expanded, options));
        Ok(out)
    }
}

// The block must start its own line with `<pre` so Markdown treats it as a raw
// HTML block that only ends at `</pre>`, blank lines in the code included.
fn sourcecode_block(out: &mut String, language: &str, code: &str) -> Result<()> {
    out.push_str("\n\n<pre class=\"sourcecode\"><code class=\"language-");
    escape_html(&mut *out, language)?;
    out.push_str("\">");
    escape_html(&mut *out, code.trim_matches('\n'))?;
    out.push_str("</code></pre>\n\n");
    Ok(())
}

/// Passes HTML bodies through unchanged.
pub struct HtmlProcessor;

impl Processor for HtmlProcessor {
    fn process(&self, raw: &str) -> Result<String> {
        Ok(raw.to_owned())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error converting a post body to HTML.
#[derive(Debug)]
pub enum Error {
    /// Returned when no processor is registered for the post's markup.
    UnsupportedMarkup(Markup),

    /// Returned when writing the HTML output fails.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::UnsupportedMarkup(markup) => {
                write!(f, "no processor registered for markup `{}`", markup)
            }
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::UnsupportedMarkup(_) => None,
            Error::Io(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    /// Converts a [`std::io::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator with [`pulldown_cmark::escape`] functions.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}
