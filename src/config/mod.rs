mod settings;

pub use settings::{Config, MonitorSettings, TomlConfig, EXAMPLE_CONFIG};
