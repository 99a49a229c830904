//! The transport seam.
//!
//! A [`Transport`] takes a verb, a `/v1/...` path, an optional JSON body and
//! an optional field mask, and answers with a JSON body or a [`Status`]. The
//! SDK never speaks HTTP or gRPC itself.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::mask::FieldMask;

/// Status codes a transport may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Code {
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

/// A failure reported by the transport or the server behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: Code,
    #[serde(default)]
    pub message: String,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Code::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(Code::AlreadyExists, message)
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(Code::FailedPrecondition, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for Status {}

/// Custom methods appended to a path as `:<verb>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CustomVerb {
    Undelete,
    BatchUpdate,
    SetIamPolicy,
    GetIamPolicy,
    ParseExpression,
    Sync,
}

impl CustomVerb {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Undelete => "undelete",
            Self::BatchUpdate => "batchUpdate",
            Self::SetIamPolicy => "setIamPolicy",
            Self::GetIamPolicy => "getIamPolicy",
            Self::ParseExpression => "parseExpression",
            Self::Sync => "sync",
        }
    }

    /// Parse the suffix after `:`.
    #[must_use]
    pub fn from_suffix(s: &str) -> Option<Self> {
        Some(match s {
            "undelete" => Self::Undelete,
            "batchUpdate" => Self::BatchUpdate,
            "setIamPolicy" => Self::SetIamPolicy,
            "getIamPolicy" => Self::GetIamPolicy,
            "parseExpression" => Self::ParseExpression,
            "sync" => Self::Sync,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    List,
    Create,
    Update,
    Delete,
    Custom(CustomVerb),
}

impl Verb {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::List => "list",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Custom(c) => c.as_str(),
        }
    }

    /// HTTP method a REST transport would use for this verb.
    #[must_use]
    pub fn http_method(self) -> &'static str {
        match self {
            Self::Get | Self::List | Self::Custom(CustomVerb::GetIamPolicy) => "GET",
            Self::Update => "PATCH",
            Self::Delete => "DELETE",
            Self::Create | Self::Custom(_) => "POST",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request handed to a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub verb: Verb,
    /// `/v1/<name>` or `/v1/<parent>/<collection>`, with `:<custom>` appended
    /// for custom verbs.
    pub path: String,
    /// Query parameters (`filter`, `pageSize`, `pageToken`, `view`, ...).
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub update_mask: Option<FieldMask>,
    /// Upsert semantics: create the resource when it does not exist.
    pub allow_missing: bool,
}

impl Request {
    /// A request against `name` (no leading `/v1/`).
    pub fn new(verb: Verb, name: impl AsRef<str>) -> Self {
        let mut path = format!("/v1/{}", name.as_ref());
        if let Verb::Custom(custom) = verb {
            path.push(':');
            path.push_str(custom.as_str());
        }
        Self {
            verb,
            path,
            query: Vec::new(),
            body: None,
            update_mask: None,
            allow_missing: false,
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_mask(mut self, mask: FieldMask) -> Self {
        self.update_mask = Some(mask);
        self
    }

    #[must_use]
    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_owned(), value.into()));
        self
    }

    #[must_use]
    pub fn allow_missing(mut self, allow: bool) -> Self {
        self.allow_missing = allow;
        self
    }

    /// Look up a query parameter.
    #[must_use]
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Path without the `/v1/` prefix and `:custom` suffix.
    #[must_use]
    pub fn resource_path(&self) -> &str {
        let path = self.path.strip_prefix("/v1/").unwrap_or(&self.path);
        match self.verb {
            Verb::Custom(_) => path.rsplit_once(':').map_or(path, |(p, _)| p),
            _ => path,
        }
    }

    /// Render the full URL against `endpoint`, including query parameters,
    /// `updateMask` and `allowMissing`.
    ///
    /// # Errors
    /// Returns the URL parser error if the joined path is not a valid URL.
    pub fn url(&self, endpoint: &Url) -> Result<Url, url::ParseError> {
        let mut url = endpoint.join(self.path.trim_start_matches('/'))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in &self.query {
                pairs.append_pair(k, v);
            }
            if let Some(mask) = &self.update_mask {
                pairs.append_pair("updateMask", &mask.to_string());
            }
            if self.allow_missing {
                pairs.append_pair("allowMissing", "true");
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url)
    }
}

/// The wire capability the client is parameterized over.
///
/// Implementations must be safe to call concurrently. Dropping the returned
/// future abandons the call.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and return the decoded JSON body.
    ///
    /// # Errors
    /// Returns a [`Status`] when the server rejects the request or cannot be
    /// reached.
    async fn send(&self, request: Request) -> Result<serde_json::Value, Status>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: Request) -> Result<serde_json::Value, Status> {
        (**self).send(request).await
    }
}
