//! The slice of the authentication provider the feed relies on.

use crate::{post::UserId, FeedResult};
use async_trait::async_trait;
use std::sync::RwLock;
use tracing::info;

/// The signed in user, as far as the feed is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub id: UserId,
}

#[async_trait]
pub trait Identity: Send + Sync {
    /// `None` before sign in and after sign out.
    fn current_user(&self) -> Option<Viewer>;

    async fn sign_out(&self) -> FeedResult<()>;
}

/// Identity fixed at construction, e.g. from a command line flag.
#[derive(Debug, Default)]
pub struct StaticIdentity {
    viewer: RwLock<Option<Viewer>>,
}

impl StaticIdentity {
    pub fn new(user_id: Option<UserId>) -> Self {
        Self {
            viewer: RwLock::new(user_id.map(|id| Viewer { id })),
        }
    }
}

#[async_trait]
impl Identity for StaticIdentity {
    fn current_user(&self) -> Option<Viewer> {
        self.viewer.read().ok().and_then(|viewer| viewer.clone())
    }

    async fn sign_out(&self) -> FeedResult<()> {
        if let Ok(mut viewer) = self.viewer.write() {
            if let Some(prev) = viewer.take() {
                info!("Signed out {}", prev.id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_out_clears_viewer() {
        let identity = StaticIdentity::new(Some("u1".into()));
        assert_eq!(identity.current_user().map(|v| v.id), Some("u1".into()));

        identity.sign_out().await.unwrap();
        assert!(identity.current_user().is_none());
    }
}
