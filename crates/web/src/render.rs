//! Response body rendering: structured formats and templates.

use std::path::Path;

use bytes::Bytes;
use minijinja::Environment;
use serde::Serialize;
use thiserror::Error;

const APPLICATION_JSON: &str = "application/json";
const APPLICATION_XML_UTF_8: &str = "application/xml; charset=utf-8";
const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("json serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("xml serialization failed: {0}")]
    Xml(String),

    #[error("failed to render template `{name}`: {source}")]
    Template {
        name: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("template directory `{0}` does not exist")]
    TemplateDir(String),

    #[error("no template renderer configured")]
    NoTemplates,

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),
}

/// The structured output formats a handler can answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Xml,
}

impl Format {
    pub fn content_type(&self) -> &'static str {
        match self {
            Format::Json => APPLICATION_JSON,
            Format::Xml => APPLICATION_XML_UTF_8,
        }
    }

    /// Serializes `value`. XML documents start with a declaration and use the
    /// type name of `value` as root element. Empty elements are written as an
    /// open and close tag pair.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Bytes, RenderError> {
        match self {
            Format::Json => Ok(Bytes::from(serde_json::to_vec(value)?)),
            Format::Xml => {
                let mut body = format!("{XML_DECLARATION}\n");
                let mut serializer = quick_xml::se::Serializer::new(&mut body);
                serializer.expand_empty_elements(true);
                value.serialize(serializer).map_err(|e| RenderError::Xml(e.to_string()))?;
                Ok(Bytes::from(body))
            }
        }
    }
}

/// Renders named templates to HTML.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, name: &str, data: &serde_json::Value) -> Result<String, RenderError>;
}

/// [`TemplateRenderer`] backed by a minijinja environment.
pub struct MiniJinjaTemplates {
    env: Environment<'static>,
}

impl MiniJinjaTemplates {
    /// Loads templates lazily from `dir`, a template named `login.html` is the
    /// file `dir/login.html`.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self, RenderError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(RenderError::TemplateDir(dir.display().to_string()));
        }

        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(dir));
        Ok(Self { env })
    }

    /// Builds an environment from in-memory sources.
    pub fn from_sources<I, N, S>(sources: I) -> Result<Self, RenderError>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: Into<String>,
    {
        let mut env = Environment::new();
        for (name, source) in sources {
            let name = name.into();
            env.add_template_owned(name.clone(), source.into())
                .map_err(|source| RenderError::Template { name, source })?;
        }
        Ok(Self { env })
    }
}

impl TemplateRenderer for MiniJinjaTemplates {
    fn render(&self, name: &str, data: &serde_json::Value) -> Result<String, RenderError> {
        let template_error = |source| RenderError::Template { name: name.to_owned(), source };

        let template = self.env.get_template(name).map_err(template_error)?;
        template.render(data).map_err(template_error)
    }
}
