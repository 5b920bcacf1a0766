use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};

use super::session::Session;
use super::stats::ServerStats;
use crate::language;

/// Why a registration was refused.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Server at maximum capacity")]
    CapacityExceeded,
    #[error("Invalid client profile: {0}")]
    InvalidProfile(String),
}

/// The parts of a `connect` message the registry cares about.
#[derive(Debug, Default, Clone)]
pub struct ClientProfile {
    pub user_id: Option<String>,
    pub display_name: Option<String>,
    pub display_language: Option<String>,
    pub native_language: Option<String>,
}

/// Size limits applied to the session set.
#[derive(Debug, Clone)]
pub struct RegistryLimits {
    /// Registrations are refused beyond this count.
    pub max_sessions: usize,
    /// Per-session audio queue capacity (independent of the scheduler's
    /// batch size).
    pub queue_capacity: usize,
}

impl Default for RegistryLimits {
    fn default() -> Self {
        Self {
            max_sessions: 50,
            queue_capacity: 100,
        }
    }
}

/// Owns the set of connected sessions.
///
/// Explicit state passed by `Arc` to the scheduler, the fan-out and the
/// stats monitor; nothing here is ambient or global.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    active_count: AtomicUsize,
    limits: RegistryLimits,
    stats: Arc<ServerStats>,
}

impl SessionRegistry {
    pub fn new(limits: RegistryLimits, stats: Arc<ServerStats>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            active_count: AtomicUsize::new(0),
            limits,
            stats,
        }
    }

    /// Registers a new participant and returns its session.
    ///
    /// An unknown target language is normalized to the default rather than
    /// refused; a missing id gets a generated one. `outbound` is the sender
    /// half of the connection's delivery channel.
    pub async fn register(
        &self,
        profile: ClientProfile,
        outbound: mpsc::Sender<String>,
    ) -> Result<Arc<Session>, RegistryError> {
        let user_id = match profile.user_id {
            Some(id) => {
                let id = id.trim().to_string();
                if id.is_empty() {
                    return Err(RegistryError::InvalidProfile("empty userId".into()));
                }
                id
            }
            None => format!("user_{}", uuid::Uuid::new_v4()),
        };

        let display_name = profile
            .display_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "Anonymous User".to_string());

        let target_language = profile
            .display_language
            .filter(|c| language::is_supported(c))
            .unwrap_or_else(|| language::DEFAULT_LANGUAGE.to_string());

        let native_language = profile
            .native_language
            .filter(|c| language::is_supported(c))
            .unwrap_or_else(|| language::AUTO.to_string());

        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.limits.max_sessions {
            return Err(RegistryError::CapacityExceeded);
        }
        if sessions.contains_key(&user_id) {
            return Err(RegistryError::InvalidProfile(format!(
                "userId {} is already connected",
                user_id
            )));
        }

        let session = Arc::new(Session::new(
            user_id.clone(),
            display_name,
            target_language,
            native_language,
            self.limits.queue_capacity,
            outbound,
        ));

        sessions.insert(user_id.clone(), Arc::clone(&session));
        self.active_count.store(sessions.len(), Ordering::Relaxed);
        self.stats.session_registered();

        info!(
            session = %session.id,
            name = %session.display_name,
            "client registered"
        );

        Ok(session)
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// A point-in-time copy of the session set, for iteration outside the
    /// lock (the fan-out and the scheduler must never mutate the map while
    /// walking it).
    pub async fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    /// Removes a session. Idempotent: repeated calls, or calls for an id
    /// that never existed, are no-ops.
    pub async fn cleanup(&self, id: &str) -> bool {
        let removed = {
            let mut sessions = self.sessions.write().await;
            let removed = sessions.remove(id);
            self.active_count.store(sessions.len(), Ordering::Relaxed);
            removed
        };

        match removed {
            Some(session) => {
                session.deactivate();
                info!(session = %id, name = %session.display_name, "client cleaned up");
                true
            }
            None => {
                warn!(session = %id, "cleanup for unknown session (already removed?)");
                false
            }
        }
    }
}
