//! Bytebase SDK
//!
//! Typed client for the Bytebase management API:
//! - `BytebaseApi` trait covering environments, instances, databases,
//!   projects, policies, settings, IAM, review configs, risks and database groups
//! - `Client<T>` implementing it over any `Transport`
//! - resource names, field masks, filters and pagination
//! - `BytebaseError` for error handling
//!
//! ## Usage
//!
//! ```ignore
//! use bytebase_sdk::{BytebaseApi, CallContext, Client, ResourceName};
//!
//! let client = Client::connect(transport, &identity).await?;
//! let ctx = CallContext::background().with_timeout(Duration::from_secs(10));
//!
//! let env = client
//!     .get_environment(&ctx, &ResourceName::environment("prod")?)
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

pub mod api;
pub mod caller;
pub mod cel;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod mask;
pub mod models;
pub mod names;
pub mod pager;
pub mod transport;

// Re-export main types at crate root for convenience
pub use api::BytebaseApi;
pub use caller::{IdentityProvider, StaticIdentity};
pub use client::Client;
pub use config::ClientConfig;
pub use context::CallContext;
pub use error::{BytebaseError, ErrorKind};
pub use filter::{
    DatabaseFilter, InstanceFilter, LabelSelector, Page, PageRequest, ProjectFilter, StateFilter,
    UserFilter,
};
pub use mask::{FieldMask, Patch, Upsert};
pub use names::{Collection, ResourceName};
pub use pager::{ItemPager, PagesPager};
pub use transport::{Code, CustomVerb, Request, Status, Transport, Verb};
