//! Registry of open notification channels, keyed by client id.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub connection: Uuid,
    pub connected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, SessionInfo>>,
}

impl SessionRegistry {
    /// Register `client_id`; the entry lives as long as the returned guard.
    pub fn connect(&self, client_id: &str) -> SessionGuard {
        let connection = Uuid::new_v4();
        let info = SessionInfo {
            connection,
            connected_at: Utc::now(),
        };
        if self.sessions.insert(client_id.to_string(), info).is_some() {
            tracing::debug!(client_id, "client reconnected, replacing its channel");
        }
        tracing::info!(client_id, open = self.sessions.len(), "notification channel opened");
        SessionGuard {
            registry: self.clone(),
            client_id: client_id.to_string(),
            connection,
        }
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.sessions.contains_key(client_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// A stale guard of a replaced channel leaves the newer entry alone.
    fn disconnect(&self, client_id: &str, connection: Uuid) {
        let removed = self
            .sessions
            .remove_if(client_id, |_, info| info.connection == connection);
        if let Some((_, info)) = removed {
            let seconds = (Utc::now() - info.connected_at).num_seconds();
            tracing::info!(client_id, seconds, "notification channel closed");
        }
    }
}

/// Removes its client from the registry when dropped
#[derive(Debug)]
pub struct SessionGuard {
    registry: SessionRegistry,
    client_id: String,
    connection: Uuid,
}

impl SessionGuard {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.disconnect(&self.client_id, self.connection);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_removes_entry() {
        let registry = SessionRegistry::default();
        let guard = registry.connect("client-a");
        assert!(registry.contains("client-a"));
        assert_eq!(guard.client_id(), "client-a");

        drop(guard);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_independent_clients() {
        let registry = SessionRegistry::default();
        let a = registry.connect("a");
        let _b = registry.connect("b");
        assert_eq!(registry.len(), 2);
        drop(a);
        assert!(!registry.contains("a"));
        assert!(registry.contains("b"));
    }

    #[test]
    fn test_stale_guard_keeps_reconnected_client() {
        let registry = SessionRegistry::default();
        let first = registry.connect("same");
        let _second = registry.connect("same");
        drop(first);
        assert!(registry.contains("same"));
    }
}
