//! Domain layer of the static plugin.

pub mod client;
pub mod page_token;
pub mod service;
pub mod store;

pub use service::Service;
