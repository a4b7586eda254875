// core/src/identity.rs

use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
  pub user_id: Uuid,
  pub email: Option<String>,
}

/// Optional signed-in user. Guests get `None`.
#[async_trait]
pub trait IdentityService: Send + Sync {
  async fn current(&self) -> Option<Identity>;
}

/// Fixed identity, resolved before the service is built (per request in the
/// HTTP layer, per test in tests).
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(pub Option<Identity>);

impl StaticIdentity {
  pub fn guest() -> Self {
    StaticIdentity(None)
  }

  pub fn user(user_id: Uuid) -> Self {
    StaticIdentity(Some(Identity { user_id, email: None }))
  }
}

#[async_trait]
impl IdentityService for StaticIdentity {
  async fn current(&self) -> Option<Identity> {
    self.0.clone()
  }
}
