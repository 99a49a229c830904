//! Static Bytebase Plugin
//!
//! An in-memory Bytebase workspace seeded from configuration. The domain
//! [`Service`] implements the SDK `Transport`, so a regular SDK `Client`
//! can run against it. Useful for testing, development, and demos.
//!
//! ## Configuration
//!
//! ```yaml
//! modules:
//!   static_bytebase_plugin:
//!     caller:
//!       id: "dba"
//!       email: "dba@example.com"
//!       title: "DBA"
//!     page_size_limit: 100
//!     environments:
//!       - id: "test"
//!         title: "Test"
//!         order: 0
//!       - id: "prod"
//!         title: "Prod"
//!         order: 1
//!         tier: PROTECTED
//!     instances:
//!       - id: "mysql-1"
//!         title: "MySQL 1"
//!         engine: MYSQL
//!         environment: "prod"
//!         databases:
//!           - name: "orders"
//!             labels:
//!               team: "billing"
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

pub mod config;
pub mod domain;

pub use config::StaticPluginConfig;
pub use domain::Service;
