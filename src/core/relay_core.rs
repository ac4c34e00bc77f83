//! Core infrastructure shared by the web server and tests.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bridge::{Bridge, OutboundMessage};
use crate::config::Config;
use crate::monitor::{ActivityMonitor, MonitorConfig};
use crate::panel::PanelRegistry;
use crate::sse::{SseProxy, StreamIdGenerator};
use crate::upstream::{BackendConnection, SharedConnection, UpstreamClient};

/// Core infrastructure for the relay.
///
/// This struct owns all the foundational components:
/// - The backend connection panels resolve upstream URLs against
/// - The panel registry and the bridge that serves panel requests
/// - The optional session activity monitor
pub struct RelayCore {
    /// Application configuration
    config: Config,
    /// Backend base URL and working directory
    connection: Arc<SharedConnection>,
    /// Live panels
    registry: Arc<PanelRegistry>,
    /// Request dispatch for panels
    bridge: Arc<Bridge>,
    /// Background activity tracker
    monitor: Arc<ActivityMonitor>,
    /// Stops background tasks on shutdown
    shutdown: CancellationToken,
}

impl RelayCore {
    /// Wire the relay around `upstream`.
    pub fn new(config: Config, upstream: Arc<dyn UpstreamClient>) -> Self {
        Self::with_ids(config, upstream, Arc::new(StreamIdGenerator::new()))
    }

    pub fn with_ids(
        config: Config,
        upstream: Arc<dyn UpstreamClient>,
        ids: Arc<StreamIdGenerator>,
    ) -> Self {
        let connection = Arc::new(SharedConnection::new(
            config.backend_url.clone(),
            config.working_dir.clone(),
        ));
        let registry = Arc::new(PanelRegistry::new());

        let proxy = SseProxy::new(connection.clone(), upstream.clone(), ids)
            .with_heartbeat_interval(config.heartbeat_interval);
        let bridge = Arc::new(Bridge::new(Arc::new(proxy)));

        let monitor = Arc::new(ActivityMonitor::new(
            connection.clone(),
            upstream,
            registry.clone(),
            MonitorConfig {
                reconnect_delay: config.monitor.reconnect_delay,
                cooldown: config.monitor.cooldown,
                notifications: config.monitor.notifications,
            },
        ));

        Self {
            config,
            connection,
            registry,
            bridge,
            monitor,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn connection(&self) -> &Arc<SharedConnection> {
        &self.connection
    }

    pub fn registry(&self) -> &Arc<PanelRegistry> {
        &self.registry
    }

    pub fn bridge(&self) -> &Arc<Bridge> {
        &self.bridge
    }

    pub fn monitor(&self) -> &Arc<ActivityMonitor> {
        &self.monitor
    }

    /// Start the activity monitor if enabled.
    pub fn start_background(&self) -> Option<JoinHandle<()>> {
        if !self.config.monitor.enabled {
            tracing::info!("Session activity monitor disabled");
            return None;
        }
        Some(self.monitor.clone().spawn(self.shutdown.child_token()))
    }

    /// Replace the backend URL and tell every panel.
    pub fn update_connection(&self, base_url: Option<&str>) -> usize {
        self.connection.set_base_url(base_url);
        self.broadcast_connection_status()
    }

    /// Announce the current connection state to every panel.
    pub fn broadcast_connection_status(&self) -> usize {
        self.registry.broadcast(&OutboundMessage::ConnectionStatus {
            connected: self.connection.is_connected(),
            base_url: self.connection.base_url(),
        })
    }

    /// Stop background work and dispose every panel.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.registry.dispose_all();
    }
}
