//! Liveness blocks emitted on activity-tracking streams.

use std::time::Duration;

use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::codec::{encode_block, SYNTHETIC_EVENT_NAME};

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Payload `type` of heartbeat blocks.
pub const HEARTBEAT_EVENT_TYPE: &str = "openchamber:heartbeat";

/// Heartbeat block stamped with `at_millis`, unterminated.
pub fn heartbeat_block(at_millis: i64) -> String {
    encode_block(
        SYNTHETIC_EVENT_NAME,
        &json!({
            "type": HEARTBEAT_EVENT_TYPE,
            "properties": { "at": at_millis },
        }),
    )
}

/// Recurring heartbeat timer bound to a stream's cancellation token.
#[derive(Debug)]
pub struct Heartbeat {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Heartbeat {
    /// Spawn a timer calling `emit` with one unterminated heartbeat block
    /// per tick. The first tick fires one `period` after spawning. Ticks
    /// that land after `stream_cancel` fires are dropped.
    pub fn spawn<F>(period: Duration, stream_cancel: &CancellationToken, mut emit: F) -> Self
    where
        F: FnMut(String) + Send + 'static,
    {
        let cancel = stream_cancel.child_token();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if token.is_cancelled() {
                            break;
                        }
                        let at = chrono::Utc::now().timestamp_millis();
                        emit(heartbeat_block(at));
                    }
                }
            }
        });
        Self { cancel, task }
    }

    /// Stop the timer. Safe to call after the stream already ended.
    pub fn stop(self) {
        self.cancel.cancel();
        self.task.abort();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled() || self.task.is_finished()
    }
}
