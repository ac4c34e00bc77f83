//! Backend connection the relay resolves upstream URLs against.

use std::path::PathBuf;

use parking_lot::RwLock;

/// Source of the active backend base URL and working directory.
pub trait BackendConnection: Send + Sync {
    /// Base URL of the running backend, without trailing slash.
    fn base_url(&self) -> Option<String>;

    /// Directory the backend is currently serving.
    fn working_directory(&self) -> Option<PathBuf>;
}

#[derive(Debug, Default, Clone)]
struct ConnectionState {
    base_url: Option<String>,
    directory: Option<PathBuf>,
}

/// Runtime-updatable connection, seeded from configuration.
#[derive(Debug, Default)]
pub struct SharedConnection {
    state: RwLock<ConnectionState>,
}

impl SharedConnection {
    pub fn new(base_url: Option<String>, directory: Option<PathBuf>) -> Self {
        Self {
            state: RwLock::new(ConnectionState {
                base_url: base_url.as_deref().and_then(normalize_base_url),
                directory,
            }),
        }
    }

    /// Replace the base URL. Blank values disconnect.
    pub fn set_base_url(&self, base_url: Option<&str>) {
        let normalized = base_url.and_then(normalize_base_url);
        tracing::info!(base_url = ?normalized, "Backend base URL updated");
        self.state.write().base_url = normalized;
    }

    pub fn set_working_directory(&self, directory: Option<PathBuf>) {
        self.state.write().directory = directory;
    }

    pub fn is_connected(&self) -> bool {
        self.state.read().base_url.is_some()
    }
}

impl BackendConnection for SharedConnection {
    fn base_url(&self) -> Option<String> {
        self.state.read().base_url.clone()
    }

    fn working_directory(&self) -> Option<PathBuf> {
        self.state.read().directory.clone()
    }
}

fn normalize_base_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
