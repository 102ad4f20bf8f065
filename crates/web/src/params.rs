//! Path parameters extracted from the URL of a request.
//!
//! Values are the raw path segments; nothing is decoded or coerced. Handlers
//! that need a number call [`PathParams::parse`] and get a [`ParamError`]
//! back, which the server answers with `400 Bad Request`.

use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

/// Named parameters bound while resolving a route, e.g. `id` in `/users/:id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    params: Vec<(String, String)>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamError {
    #[error("missing path parameter `{name}`")]
    Missing { name: String },

    #[error("path parameter `{name}` has invalid value `{value}`: {reason}")]
    Invalid { name: String, value: String, reason: String },
}

impl PathParams {
    /// Creates an empty PathParams instance with no parameters
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Gets the value of a path parameter by its name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    /// Like [`get`](Self::get), but a missing parameter is an error.
    pub fn require(&self, name: &str) -> Result<&str, ParamError> {
        self.get(name).ok_or_else(|| ParamError::Missing { name: name.to_owned() })
    }

    /// Parses a parameter into `T`.
    ///
    /// # Example
    /// ```
    /// use tern_web::PathParams;
    ///
    /// let params: PathParams = [("id", "42")].into_iter().collect();
    /// assert_eq!(params.parse::<u64>("id"), Ok(42));
    /// assert!(params.parse::<u64>("name").is_err());
    /// ```
    pub fn parse<T>(&self, name: &str) -> Result<T, ParamError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let value = self.require(name)?;
        value.parse::<T>().map_err(|e| ParamError::Invalid {
            name: name.to_owned(),
            value: value.to_owned(),
            reason: e.to_string(),
        })
    }

    /// Iterates in pattern order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl<N, V> FromIterator<(N, V)> for PathParams
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self { params: iter.into_iter().map(|(name, value)| (name.into(), value.into())).collect() }
    }
}
