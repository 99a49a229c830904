//! Field masks and partial-update semantics.
//!
//! An update carries a patch record whose fields are all `Option<T>` plus a
//! [`FieldMask`] naming the fields that participate:
//!
//! - a field set in the patch but absent from the mask is ignored;
//! - a field in the mask and set in the patch overwrites;
//! - a field in the mask but unset in the patch is cleared when the field
//!   allows it, otherwise the update is rejected.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::BytebaseError;

/// Paths that can never appear in a mask, whatever the resource.
pub const ALWAYS_IMMUTABLE: &[&str] = &["name", "state", "create_time"];

/// An ordered set of dotted field paths.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldMask {
    paths: Vec<String>,
}

impl FieldMask {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mask, dropping duplicates and keeping first positions.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for a wildcard or a malformed path.
    pub fn from_paths<I, S>(paths: I) -> Result<Self, BytebaseError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut mask = Self::new();
        for path in paths {
            mask.push(path)?;
        }
        Ok(mask)
    }

    /// Append a path unless it is already present.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for a wildcard or a malformed path.
    pub fn push(&mut self, path: impl Into<String>) -> Result<(), BytebaseError> {
        let path = path.into();
        check_path(&path)?;
        if !self.contains(&path) {
            self.paths.push(path);
        }
        Ok(())
    }

    #[must_use]
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Check the mask against the paths `P` understands.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for an empty mask, an immutable path, an
    /// unknown path, or a masked field that is unset and cannot be cleared.
    pub fn validate<P: Patch>(&self, patch: &P) -> Result<(), BytebaseError> {
        if self.is_empty() {
            return Err(BytebaseError::invalid_argument("update mask must not be empty"));
        }
        for path in &self.paths {
            if ALWAYS_IMMUTABLE.contains(&path.as_str()) || P::IMMUTABLE.contains(&path.as_str()) {
                return Err(BytebaseError::invalid_argument(format!(
                    "field '{path}' is immutable"
                )));
            }
            let spec = P::FIELDS
                .iter()
                .find(|f| f.path == path)
                .ok_or_else(|| {
                    BytebaseError::invalid_argument(format!("unknown update mask path '{path}'"))
                })?;
            if !spec.clearable && !patch.is_set(path) {
                return Err(BytebaseError::invalid_argument(format!(
                    "field '{path}' is in the update mask but has no value and cannot be cleared"
                )));
            }
        }
        patch.check_values(self)
    }
}

fn check_path(path: &str) -> Result<(), BytebaseError> {
    if path.contains('*') {
        return Err(BytebaseError::invalid_argument(
            "wildcards are not supported in update masks",
        ));
    }
    let well_formed = !path.is_empty()
        && path.split('.').all(|seg| {
            let mut chars = seg.chars();
            chars
                .next()
                .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
                && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        });
    if well_formed {
        Ok(())
    } else {
        Err(BytebaseError::invalid_argument(format!(
            "malformed update mask path '{path}'"
        )))
    }
}

impl fmt::Display for FieldMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.paths.join(","))
    }
}

impl Serialize for FieldMask {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldMask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            return Ok(Self::new());
        }
        Self::from_paths(s.split(',')).map_err(serde::de::Error::custom)
    }
}

/// One mutable path of a patch type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub path: &'static str,
    /// Whether an unset value in the patch resets the field.
    pub clearable: bool,
}

impl FieldSpec {
    #[must_use]
    pub const fn clearable(path: &'static str) -> Self {
        Self {
            path,
            clearable: true,
        }
    }

    #[must_use]
    pub const fn required(path: &'static str) -> Self {
        Self {
            path,
            clearable: false,
        }
    }
}

/// A partial update of `Target`.
pub trait Patch {
    type Target;

    /// Mutable paths.
    const FIELDS: &'static [FieldSpec];

    /// Paths that exist on the entity but may not be updated, beyond
    /// [`ALWAYS_IMMUTABLE`].
    const IMMUTABLE: &'static [&'static str] = &[];

    /// Whether the patch carries a value for `path`.
    fn is_set(&self, path: &str) -> bool;

    /// Validate the values of the masked fields (expressions, data
    /// sources, ...).
    ///
    /// # Errors
    /// Returns `InvalidArgument` or `InvalidExpression` for a bad value.
    fn check_values(&self, _mask: &FieldMask) -> Result<(), BytebaseError> {
        Ok(())
    }

    /// Apply the masked fields onto `target`. The mask must have passed
    /// [`FieldMask::validate`].
    fn apply(&self, mask: &FieldMask, target: &mut Self::Target);
}

/// A create-or-replace input. The payload always replaces the stored one;
/// the mask only governs the metadata fields around it.
pub trait Upsert: Patch {
    /// Path of the payload field.
    const PAYLOAD: &'static str;

    /// The caller's mask with the payload path appended when missing.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if `mask` holds a malformed path.
    fn effective_mask(mask: &FieldMask) -> Result<FieldMask, BytebaseError> {
        let mut effective = mask.clone();
        effective.push(Self::PAYLOAD)?;
        Ok(effective)
    }
}

/// Masked assignment into a plain field; unset resets to the zero value.
pub fn assign<T: Clone + Default>(mask: &FieldMask, path: &str, value: Option<&T>, target: &mut T) {
    if mask.contains(path) {
        *target = value.cloned().unwrap_or_default();
    }
}

/// Masked assignment into an optional field; unset clears it.
pub fn assign_opt<T: Clone>(mask: &FieldMask, path: &str, value: Option<&T>, target: &mut Option<T>) {
    if mask.contains(path) {
        *target = value.cloned();
    }
}
