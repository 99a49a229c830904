//! Client configuration.
//!
//! ```yaml
//! endpoint: "https://bytebase.example.com"
//! default_page_size: 50
//! max_page_size: 1000
//! request_timeout: "30s"
//! ```
//!
//! Every key can be overridden with a `BYTEBASE_`-prefixed environment
//! variable, e.g. `BYTEBASE_REQUEST_TIMEOUT=5s`.

use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::BytebaseError;

pub const ENV_PREFIX: &str = "BYTEBASE_";

const KEYS: [&str; 4] = [
    "endpoint",
    "default_page_size",
    "max_page_size",
    "request_timeout",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the server; request paths are appended to it.
    pub endpoint: Url,

    /// Used when a list call asks for page size 0.
    pub default_page_size: u32,

    /// Larger requested page sizes are clamped to this.
    pub max_page_size: u32,

    /// Applied as a deadline to calls whose context carries none.
    #[serde(
        with = "bb_utils::humantime_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            default_page_size: 50,
            max_page_size: 1000,
            request_timeout: None,
        }
    }
}

#[allow(clippy::expect_used)]
fn default_endpoint() -> Url {
    Url::parse("http://localhost:8080").expect("static url should not panic")
}

impl ClientConfig {
    /// Defaults, then the YAML file if given, then `BYTEBASE_*` variables.
    ///
    /// # Errors
    /// Returns `InvalidArgument` when a source cannot be read or a value
    /// does not fit the schema.
    pub fn load(path: Option<&Path>) -> Result<Self, BytebaseError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file_exact(path));
        }
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).only(&KEYS))
            .extract()
            .map_err(|e| BytebaseError::invalid_argument(format!("client config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns `InvalidArgument` for zero page sizes or a default above the
    /// maximum.
    pub fn validate(&self) -> Result<(), BytebaseError> {
        if self.max_page_size == 0 || self.default_page_size == 0 {
            return Err(BytebaseError::invalid_argument(
                "page sizes must be positive",
            ));
        }
        if self.default_page_size > self.max_page_size {
            return Err(BytebaseError::invalid_argument(format!(
                "default_page_size {} exceeds max_page_size {}",
                self.default_page_size, self.max_page_size
            )));
        }
        Ok(())
    }

    /// The page size actually sent for a requested size.
    #[must_use]
    pub fn effective_page_size(&self, requested: u32) -> u32 {
        match requested {
            0 => self.default_page_size,
            n => n.min(self.max_page_size),
        }
    }
}
