mod loader;

pub use loader::{load_config, LoadedConfig, LynnConfig, Settings, CONFIG_FILE};
