//! Panel sessions: one per connected webview, owning its relay resources.

mod registry;
mod surface;

pub use registry::{PanelRegistry, PanelSession};
pub use surface::{ChannelSurface, PanelSurface};
