//! Defines the [`Renderer`] trait, the seam between the site builder and the
//! template engine, and [`TemplateSet`], its implementation on top of
//! [`gtmpl`] (Go-style `{{ .post.title }}` templates).

use gtmpl::{Context, Template, Value};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Renders a named template against a context.
pub trait Renderer {
    fn render(&self, template: &str, context: Value) -> Result<String>;
}

/// Every configured template of a layout, parsed up front.
pub struct TemplateSet {
    templates: HashMap<String, Template>,
}

impl TemplateSet {
    /// Loads and parses each of `names` from `directory`. The `partials` are
    /// prepended to every template so that blocks they `define` can be used
    /// anywhere.
    pub fn load<S: AsRef<str>>(
        directory: &Path,
        partials: &[S],
        names: &[&str],
    ) -> Result<TemplateSet> {
        let mut prelude = String::new();
        for partial in partials {
            read_template(&directory.join(partial.as_ref()), &mut prelude)?;
            prelude.push(' ');
        }

        let mut templates = HashMap::new();
        for name in names {
            if templates.contains_key(*name) {
                continue;
            }
            let mut contents = prelude.clone();
            read_template(&directory.join(name), &mut contents)?;
            templates.insert(name.to_string(), parse_template(name, &contents)?);
            debug!("Loaded template `{}`", name);
        }
        Ok(TemplateSet { templates })
    }
}

impl Renderer for TemplateSet {
    fn render(&self, template: &str, context: Value) -> Result<String> {
        self.templates
            .get(template)
            .ok_or_else(|| Error::UnknownTemplate(template.to_owned()))?
            .render(&Context::from(context))
            .map_err(|err| Error::Execute {
                name: template.to_owned(),
                err: err.to_string(),
            })
    }
}

fn read_template(path: &Path, contents: &mut String) -> Result<()> {
    File::open(path)
        .and_then(|mut file| file.read_to_string(contents))
        .map_err(|err| Error::OpenTemplateFile {
            path: path.to_owned(),
            err,
        })?;
    Ok(())
}

fn parse_template(name: &str, contents: &str) -> Result<Template> {
    let mut template = Template::default();
    template.parse(contents).map_err(|err| Error::ParseTemplate {
        name: name.to_owned(),
        err: err.to_string(),
    })?;
    Ok(template)
}

pub type Result<T> = std::result::Result<T, Error>;

/// Represents a template loading or rendering failure.
#[derive(Debug)]
pub enum Error {
    /// Returned for I/O problems while opening template files.
    OpenTemplateFile { path: PathBuf, err: std::io::Error },

    /// Returned for errors parsing template files.
    ParseTemplate { name: String, err: String },

    /// Returned when asked for a template that was never loaded.
    UnknownTemplate(String),

    /// Returned when executing a template fails.
    Execute { name: String, err: String },
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::OpenTemplateFile { path, err } => {
                write!(f, "Opening template file '{}': {}", path.display(), err)
            }
            Error::ParseTemplate { name, err } => {
                write!(f, "Parsing template '{}': {}", name, err)
            }
            Error::UnknownTemplate(name) => write!(f, "Unknown template '{}'", name),
            Error::Execute { name, err } => {
                write!(f, "Rendering template '{}': {}", name, err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::OpenTemplateFile { path: _, err } => Some(err),
            _ => None,
        }
    }
}
