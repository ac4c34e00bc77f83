//! Last known phase per session, with cooldown expiry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::bridge::OutboundMessage;
use crate::panel::PanelRegistry;
use crate::sse::{ActivityPhase, SessionActivity};

#[derive(Default)]
struct Book {
    phases: HashMap<String, ActivityPhase>,
    cooldowns: HashMap<String, JoinHandle<()>>,
}

/// Phase state shared by the monitor and its cooldown timers. Every change
/// is broadcast to all panels as `session:activity`.
pub struct PhaseBook {
    inner: Mutex<Book>,
    registry: Arc<PanelRegistry>,
    cooldown: Duration,
}

impl PhaseBook {
    pub fn new(registry: Arc<PanelRegistry>, cooldown: Duration) -> Self {
        Self {
            inner: Mutex::new(Book::default()),
            registry,
            cooldown,
        }
    }

    pub fn phase(&self, session_id: &str) -> Option<ActivityPhase> {
        self.inner.lock().phases.get(session_id).copied()
    }

    /// Record a phase. Returns false when it was already current.
    pub fn set_phase(&self, session_id: &str, phase: ActivityPhase) -> bool {
        {
            let mut book = self.inner.lock();
            if book.phases.get(session_id) == Some(&phase) {
                return false;
            }
            book.phases.insert(session_id.to_string(), phase);
            if phase != ActivityPhase::Cooldown {
                if let Some(timer) = book.cooldowns.remove(session_id) {
                    timer.abort();
                }
            }
        }

        tracing::debug!(session_id, %phase, "Session activity changed");
        self.registry
            .broadcast(&OutboundMessage::SessionActivity(SessionActivity::new(
                session_id, phase,
            )));
        true
    }

    /// Busy sessions move to cooldown, then back to idle once the cooldown
    /// elapses without another change.
    pub fn enter_cooldown_if_busy(self: &Arc<Self>, session_id: &str) {
        if self.phase(session_id) != Some(ActivityPhase::Busy) {
            return;
        }
        self.set_phase(session_id, ActivityPhase::Cooldown);

        let book = Arc::clone(self);
        let id = session_id.to_string();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(book.cooldown).await;
            if book.phase(&id) == Some(ActivityPhase::Cooldown) {
                book.set_phase(&id, ActivityPhase::Idle);
            }
        });

        if let Some(previous) = self
            .inner
            .lock()
            .cooldowns
            .insert(session_id.to_string(), timer)
        {
            previous.abort();
        }
    }

    /// Force every known session to idle and re-announce it.
    pub fn reset_all(&self) {
        let snapshot: Vec<String> = {
            let mut book = self.inner.lock();
            for (_, timer) in book.cooldowns.drain() {
                timer.abort();
            }
            for phase in book.phases.values_mut() {
                *phase = ActivityPhase::Idle;
            }
            book.phases.keys().cloned().collect()
        };

        for session_id in snapshot {
            self.registry
                .broadcast(&OutboundMessage::SessionActivity(SessionActivity::new(
                    session_id,
                    ActivityPhase::Idle,
                )));
        }
    }

    pub fn clear_timers(&self) {
        for (_, timer) in self.inner.lock().cooldowns.drain() {
            timer.abort();
        }
    }
}
