use std::sync::Arc;
use tracing::{debug, warn};

use super::messages::ServerMessage;
use crate::session::{DeliveryError, Session, SessionRegistry};

/// Delivers `message` to every active session.
pub async fn broadcast(registry: &SessionRegistry, message: &ServerMessage) {
    let sessions = registry.snapshot().await;
    deliver(registry, &sessions, message).await;
}

/// Delivers `message` to the given sessions.
///
/// The message is serialized once. A closed-connection failure marks that
/// session inactive and schedules it for cleanup; any other delivery
/// failure is logged and tolerated. Cleanups run strictly after the walk
/// over the session set, once per affected session.
pub async fn deliver(
    registry: &SessionRegistry,
    sessions: &[Arc<Session>],
    message: &ServerMessage,
) {
    let wire = message.to_wire();

    let mut disconnected: Vec<String> = Vec::new();

    for session in sessions {
        if !session.is_active() {
            continue;
        }
        match session.try_deliver(&wire) {
            Ok(()) => {}
            Err(DeliveryError::Closed) => {
                session.deactivate();
                disconnected.push(session.id.clone());
            }
            Err(DeliveryError::Lagged) => {
                warn!(
                    session = %session.id,
                    name = %session.display_name,
                    "outbound channel full, dropping message"
                );
            }
        }
    }

    for id in disconnected {
        debug!(session = %id, "removing session after failed delivery");
        registry.cleanup(&id).await;
    }
}
