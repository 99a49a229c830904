//! Keyset page tokens.
//!
//! A token is base64url(JSON) of the last name served and the filter it was
//! served under, so a listing resumes after that name even when records are
//! added in between.

use bytebase_sdk::{BytebaseError, Page, PageRequest, ResourceName};
use serde::{Deserialize, Serialize};

use super::store::Record;

const VERSION: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PageToken {
    v: u8,
    /// Last name of the previous page.
    k: String,
    /// Filter the listing was started with.
    f: String,
}

impl PageToken {
    fn encode(&self) -> Result<String, BytebaseError> {
        serde_json::to_vec(self)
            .map(|bytes| base64_url::encode(&bytes))
            .map_err(|e| BytebaseError::internal(format!("cannot encode page token: {e}")))
    }

    fn decode(token: &str) -> Result<Self, BytebaseError> {
        let invalid = || BytebaseError::invalid_argument(format!("invalid page token '{token}'"));
        let bytes = base64_url::decode(token).map_err(|_| invalid())?;
        let decoded: Self = serde_json::from_slice(&bytes).map_err(|_| invalid())?;
        if decoded.v != VERSION {
            return Err(invalid());
        }
        Ok(decoded)
    }
}

/// Cut one page out of `items`, which must be in name order.
///
/// `filter` is the canonical filter string of the request; a token issued
/// under a different filter is rejected.
///
/// # Errors
/// `InvalidArgument` for a malformed token or a filter mismatch.
pub fn paginate<T: Record>(
    items: Vec<T>,
    filter: &str,
    page: &PageRequest,
    limit: u32,
) -> Result<Page<T>, BytebaseError> {
    let after = if page.page_token.is_empty() {
        None
    } else {
        let token = PageToken::decode(&page.page_token)?;
        if token.f != filter {
            return Err(BytebaseError::invalid_argument(
                "page token was issued for a different filter",
            ));
        }
        Some(ResourceName::parse(&token.k)?)
    };

    let size = match page.page_size {
        0 => limit,
        n => n.min(limit),
    };
    let size = usize::try_from(size).unwrap_or(usize::MAX).max(1);

    let mut rest = items
        .into_iter()
        .filter(|item| after.as_ref().is_none_or(|a| item.name() > a));
    let batch: Vec<T> = rest.by_ref().take(size).collect();
    let next_page_token = match (batch.last(), rest.next()) {
        (Some(last), Some(_)) => PageToken {
            v: VERSION,
            k: last.name().to_string(),
            f: filter.to_owned(),
        }
        .encode()?,
        _ => String::new(),
    };
    Ok(Page::new(batch, next_page_token))
}

// base64url helpers (no padding)
mod base64_url {
    use base64::Engine;

    pub fn encode(bytes: &[u8]) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    pub fn decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(s)
    }
}
