// Engine configuration

mod loader;
mod settings;

pub use loader::{from_toml_str, load_config};
pub use settings::EngineConfig;
