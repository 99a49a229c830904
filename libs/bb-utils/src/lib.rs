#![forbid(unsafe_code)]
//! Small helpers shared by the Bytebase SDK crates.
//!
//! - [`humantime_serde`]: `Duration` fields written as `"30s"`, `"168h"`, `"1h 30m"`.
//! - [`SecretString`]: a string that never shows up in `Debug`/`Display` output.

pub mod humantime_serde;
pub mod secret_string;

pub use secret_string::SecretString;
