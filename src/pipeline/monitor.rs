use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::session::{ServerStats, SessionRegistry};
use crate::ws::dispatcher;
use crate::ws::messages::ServerMessage;

/// Periodically logs aggregate counters and pushes the same snapshot to
/// every connected session.
pub struct StatsMonitor {
    registry: Arc<SessionRegistry>,
    stats: Arc<ServerStats>,
    interval: Duration,
}

impl StatsMonitor {
    pub fn new(registry: Arc<SessionRegistry>, stats: Arc<ServerStats>) -> Self {
        Self {
            registry,
            stats,
            interval: Duration::from_secs(60),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs forever. Spawn this on its own task.
    pub async fn run(self) {
        loop {
            tokio::time::sleep(self.interval).await;
            self.report().await;
        }
    }

    async fn report(&self) {
        let snapshot = self.stats.snapshot(self.registry.active_count());

        info!(
            active_sessions = snapshot.active_sessions,
            total_sessions = snapshot.total_sessions,
            audio_secs = format!("{:.1}", snapshot.total_audio_processed_secs),
            transcriptions = snapshot.total_transcriptions,
            translations = snapshot.total_translations,
            errors = snapshot.error_count,
            avg_processing_secs = format!("{:.3}", snapshot.average_processing_secs),
            uptime_secs = format!("{:.0}", snapshot.uptime_secs),
            "server stats"
        );

        if !self.registry.is_empty().await {
            dispatcher::broadcast(
                &self.registry,
                &ServerMessage::ServerStatsBroadcast { data: snapshot },
            )
            .await;
        }
    }
}
