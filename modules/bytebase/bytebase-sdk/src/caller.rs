//! The authenticated principal behind a client.

use async_trait::async_trait;

use crate::error::BytebaseError;
use crate::models::User;

/// Resolves who the transport authenticates as.
///
/// Consulted once, when a [`crate::Client`] is connected; the client keeps
/// the returned user for its whole lifetime.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// # Errors
    /// Returns `PermissionDenied` when no principal can be established, or
    /// whatever the underlying lookup fails with.
    async fn current_user(&self) -> Result<User, BytebaseError>;
}

/// An identity fixed up front, e.g. a service account loaded from config.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    user: User,
}

impl StaticIdentity {
    #[must_use]
    pub fn new(user: User) -> Self {
        Self { user }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_user(&self) -> Result<User, BytebaseError> {
        if !self.user.state.is_active() {
            return Err(BytebaseError::permission_denied(format!(
                "principal '{}' is deactivated",
                self.user.name
            )));
        }
        Ok(self.user.clone())
    }
}
