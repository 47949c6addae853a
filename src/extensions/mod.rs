//! Extension parameter handling for the receive path.
//!
//! Negotiation itself happens during the HTTP upgrade, outside this crate.
//! What remains here is the parameter vocabulary: parsing the
//! `name; key=value; flag` lists a `Sec-WebSocket-Extensions` header
//! carries, so an already-negotiated deflate context can be configured
//! from them.

#[cfg(feature = "compression")]
pub mod deflate;

use std::fmt;

/// A single extension parameter: a name with an optional value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionParam {
    /// Parameter name, e.g. `client_max_window_bits`.
    pub name: String,
    /// Parameter value; `None` for flag parameters.
    pub value: Option<String>,
}

impl ExtensionParam {
    /// Create a parameter with a value.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// Create a flag parameter (no value).
    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    /// Parse one `name` or `name=value` token.
    #[must_use]
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        match token.split_once('=') {
            Some((name, value)) => Self {
                name: name.trim().to_string(),
                value: Some(value.trim().trim_matches('"').to_string()),
            },
            None => Self::flag(token),
        }
    }

    /// Parse a semicolon-separated parameter list, e.g.
    /// `server_no_context_takeover; client_max_window_bits=12`.
    #[must_use]
    pub fn parse_list(list: &str) -> Vec<Self> {
        list.split(';')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(Self::parse)
            .collect()
    }
}

impl fmt::Display for ExtensionParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.name, value),
            None => write!(f, "{}", self.name),
        }
    }
}
