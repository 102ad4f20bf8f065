//! The route table.
//!
//! Patterns are `/`-separated segments, a segment starting with `:` binds a
//! parameter: `/users/:user_id/addresses/:address_id`. Routes are kept in one
//! segment tree per method. While resolving, a literal child is always tried
//! before the parameter child of the same node and the search backtracks, so
//! `/users/new` beats `/users/:id` no matter which was registered first, and
//! `/users/new/edit` still reaches `/users/:id/edit` when the literal branch
//! has no such route.

use std::collections::HashMap;

use http::Method;
use thiserror::Error;

use crate::handler::{BoxedHandler, RequestHandler};
use crate::params::PathParams;

const PARAM_MARKER: char = ':';

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route {method} {pattern} conflicts with {method} {existing}")]
    Duplicate { method: Method, pattern: String, existing: String },

    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: &'static str },

    #[error("no route for {method} {path}")]
    NotFound { method: Method, path: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Default)]
struct Node {
    literals: HashMap<String, Node>,
    param: Option<Box<Node>>,
    endpoint: Option<Endpoint>,
}

struct Endpoint {
    pattern: String,
    param_names: Vec<String>,
    handler: BoxedHandler,
}

/// Maps `(method, path)` to a handler plus the parameters bound on the way.
///
/// Built once at startup; lookups only need `&self`.
#[derive(Default)]
pub struct Router {
    trees: HashMap<Method, Node>,
}

/// A resolved route: the handler and its bound parameters.
pub struct RouteMatch<'router> {
    handler: &'router dyn RequestHandler,
    pattern: &'router str,
    params: PathParams,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `method` and `pattern`.
    ///
    /// Two patterns with the same shape conflict even if their parameter
    /// names differ: `/users/:id` and `/users/:user_id` could never be told apart.
    pub fn insert(&mut self, method: Method, pattern: &str, handler: BoxedHandler) -> Result<(), RouteError> {
        let segments = parse_pattern(pattern)?;

        let mut node = self.trees.entry(method.clone()).or_default();
        let mut param_names = Vec::new();
        for segment in segments {
            node = match segment {
                Segment::Literal(literal) => node.literals.entry(literal).or_default(),
                Segment::Param(name) => {
                    param_names.push(name);
                    node.param.get_or_insert_with(Box::default).as_mut()
                }
            };
        }

        match &node.endpoint {
            Some(existing) => {
                Err(RouteError::Duplicate { method, pattern: pattern.to_owned(), existing: existing.pattern.clone() })
            }
            None => {
                node.endpoint = Some(Endpoint { pattern: pattern.to_owned(), param_names, handler });
                Ok(())
            }
        }
    }

    /// Resolves a request path.
    ///
    /// `path` is matched as given; percent-decoding is left to whoever built the URI.
    pub fn at(&self, method: &Method, path: &str) -> Result<RouteMatch<'_>, RouteError> {
        let not_found = || RouteError::NotFound { method: method.clone(), path: path.to_owned() };

        let tree = self.trees.get(method).ok_or_else(not_found)?;
        let segments = path.strip_prefix('/').ok_or_else(not_found)?.split('/').collect::<Vec<_>>();

        let mut values = Vec::new();
        let endpoint = tree.lookup(&segments, &mut values).ok_or_else(not_found)?;

        let params = endpoint.param_names.iter().map(String::as_str).zip(values).collect();
        Ok(RouteMatch { handler: endpoint.handler.as_ref(), pattern: &endpoint.pattern, params })
    }

    pub fn len(&self) -> usize {
        self.trees.values().map(Node::count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Node {
    fn lookup<'p>(&self, segments: &[&'p str], values: &mut Vec<&'p str>) -> Option<&Endpoint> {
        let Some((first, rest)) = segments.split_first() else {
            return self.endpoint.as_ref();
        };

        if let Some(endpoint) = self.literals.get(*first).and_then(|child| child.lookup(rest, values)) {
            return Some(endpoint);
        }

        let child = self.param.as_ref()?;
        values.push(*first);
        let endpoint = child.lookup(rest, values);
        if endpoint.is_none() {
            values.pop();
        }
        endpoint
    }

    fn count(&self) -> usize {
        usize::from(self.endpoint.is_some())
            + self.literals.values().map(Node::count).sum::<usize>()
            + self.param.as_ref().map_or(0, |child| child.count())
    }
}

impl<'router> RouteMatch<'router> {
    pub fn handler(&self) -> &'router dyn RequestHandler {
        self.handler
    }

    /// The pattern the route was registered with
    pub fn pattern(&self) -> &'router str {
        self.pattern
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn into_parts(self) -> (&'router dyn RequestHandler, PathParams) {
        (self.handler, self.params)
    }
}

fn parse_pattern(pattern: &str) -> Result<Vec<Segment>, RouteError> {
    let invalid = |reason| RouteError::InvalidPattern { pattern: pattern.to_owned(), reason };

    let rest = pattern.strip_prefix('/').ok_or_else(|| invalid("must start with '/'"))?;
    rest.split('/')
        .map(|segment| match segment.strip_prefix(PARAM_MARKER) {
            Some("") => Err(invalid("parameter without a name")),
            Some(name) => Ok(Segment::Param(name.to_owned())),
            None => Ok(Segment::Literal(segment.to_owned())),
        })
        .collect()
}
