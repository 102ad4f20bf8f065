//! The per-request context handed to handlers.
//!
//! A [`RequestContext`] owns the request and is moved down the middleware
//! chain into the handler. Every render method takes `self`, so a context is
//! turned into exactly one response.

use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, LOCATION};
use http::request::Parts;
use http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode, Uri, Version};
use mime::Mime;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::cookie::{CookieError, find_cookie};
use crate::handler::HandlerError;
use crate::params::PathParams;
use crate::render::{Format, RenderError, TemplateRenderer};

const TEXT_PLAIN_UTF_8: &str = "text/plain; charset=utf-8";
const TEXT_HTML_UTF_8: &str = "text/html; charset=utf-8";

pub struct RequestContext {
    head: Parts,
    body: Bytes,
    params: PathParams,
    templates: Option<Arc<dyn TemplateRenderer>>,
}

impl RequestContext {
    pub fn new(request: Request<Bytes>, params: PathParams, templates: Option<Arc<dyn TemplateRenderer>>) -> Self {
        let (head, body) = request.into_parts();
        Self { head, body, params, templates }
    }

    /// A context without path parameters or templates
    pub fn from_request(request: Request<Bytes>) -> Self {
        Self::new(request, PathParams::empty(), None)
    }

    pub fn method(&self) -> &Method {
        &self.head.method
    }

    pub fn uri(&self) -> &Uri {
        &self.head.uri
    }

    pub fn path(&self) -> &str {
        self.head.uri.path()
    }

    pub fn version(&self) -> Version {
        self.head.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn path_params(&self) -> &PathParams {
        &self.params
    }

    pub fn cookie(&self, name: &str) -> Result<Option<&str>, CookieError> {
        find_cookie(&self.head.headers, name)
    }

    /// Submitted parameters: the urlencoded body first, then the query string.
    pub fn form(&self) -> Result<Vec<(String, String)>, HandlerError> {
        let mut pairs = if self.is_urlencoded() {
            serde_urlencoded::from_bytes::<Vec<(String, String)>>(&self.body).map_err(HandlerError::bad_request)?
        } else {
            Vec::new()
        };

        if let Some(query) = self.head.uri.query() {
            pairs.extend(serde_urlencoded::from_str::<Vec<(String, String)>>(query).map_err(HandlerError::bad_request)?);
        }

        Ok(pairs)
    }

    /// Deserializes the urlencoded body into `T`. A request without a body
    /// deserializes its query string instead.
    pub fn form_as<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        if self.body.is_empty() {
            let query = self.head.uri.query().unwrap_or_default();
            return serde_urlencoded::from_str(query).map_err(HandlerError::bad_request);
        }

        if !self.is_urlencoded() {
            return Err(HandlerError::bad_request("expected an application/x-www-form-urlencoded body"));
        }
        serde_urlencoded::from_bytes(&self.body).map_err(HandlerError::bad_request)
    }

    fn is_urlencoded(&self) -> bool {
        self.head
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<Mime>().ok())
            .is_some_and(|mime| mime.type_() == mime::APPLICATION && mime.subtype() == mime::WWW_FORM_URLENCODED)
    }

    pub fn render_text<S: Into<String>>(self, text: S) -> Response<Bytes> {
        response(StatusCode::OK, TEXT_PLAIN_UTF_8, Bytes::from(text.into()))
    }

    pub fn render(self, format: Format, value: &impl Serialize) -> Result<Response<Bytes>, RenderError> {
        let body = format.encode(value)?;
        Ok(response(StatusCode::OK, format.content_type(), body))
    }

    pub fn render_json(self, value: &impl Serialize) -> Result<Response<Bytes>, RenderError> {
        self.render(Format::Json, value)
    }

    pub fn render_xml(self, value: &impl Serialize) -> Result<Response<Bytes>, RenderError> {
        self.render(Format::Xml, value)
    }

    pub fn render_template(self, name: &str, data: &impl Serialize) -> Result<Response<Bytes>, RenderError> {
        let templates = self.templates.as_ref().ok_or(RenderError::NoTemplates)?;
        let data = serde_json::to_value(data)?;
        let html = templates.render(name, &data)?;
        Ok(response(StatusCode::OK, TEXT_HTML_UTF_8, Bytes::from(html)))
    }

    /// `303 See Other` to `location`.
    pub fn redirect(self, location: &str) -> Result<Response<Bytes>, RenderError> {
        let location = HeaderValue::try_from(location)?;
        let mut response = response(StatusCode::SEE_OTHER, TEXT_PLAIN_UTF_8, Bytes::new());
        response.headers_mut().insert(LOCATION, location);
        Ok(response)
    }

    /// Answers with `status` and its reason phrase. `err` is logged, never sent.
    pub fn render_error(self, status: StatusCode, err: &dyn Display) -> Response<Bytes> {
        if status.is_server_error() {
            error!(method = %self.head.method, path = %self.head.uri.path(), status = status.as_u16(), cause = %err, "request failed");
        } else {
            debug!(method = %self.head.method, path = %self.head.uri.path(), status = status.as_u16(), cause = %err, "request rejected");
        }
        error_response(status)
    }
}

/// A response with `status` whose body is the canonical reason phrase.
pub fn error_response(status: StatusCode) -> Response<Bytes> {
    let reason = status.canonical_reason().unwrap_or("Unknown Status");
    response(status, TEXT_PLAIN_UTF_8, Bytes::from(reason))
}

fn response(status: StatusCode, content_type: &'static str, body: Bytes) -> Response<Bytes> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
