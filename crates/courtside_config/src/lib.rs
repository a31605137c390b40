//! Configuration loading for the Courtside push client.
//!
//! Sources are layered in this order, later ones winning:
//!
//! 1. serde defaults on the models
//! 2. `config/default.*`
//! 3. `config/{RUN_ENV}.*`
//! 4. `COURTSIDE__SECTION__KEY` environment variables
//!
//! The config directory defaults to `config` and can be moved with `CONFIG_DIR`.

use config::{Config, ConfigError, Environment, File, FileFormat};
use once_cell::sync::OnceCell;
use std::env;
use std::path::PathBuf;
use tracing::debug;

pub mod models;
pub use models::*;

/// Prefix for configuration environment variables
pub const ENV_PREFIX: &str = "COURTSIDE";

/// Separator between prefix, section and key in environment variables
pub const ENV_SEPARATOR: &str = "__";

static INIT_DOTENV: OnceCell<()> = OnceCell::new();

/// Ensures that the dotenv file is loaded into the environment variables.
///
/// The file named by `DOTENV_OVERRIDE` is used when set, `.env` otherwise.
/// Loading happens at most once per process; a missing file is not an error.
/// Returns the path that was (or would have been) loaded.
pub fn ensure_dotenv_loaded() -> String {
    let dotenv_path = env::var("DOTENV_OVERRIDE").unwrap_or_else(|_| ".env".to_string());

    INIT_DOTENV.get_or_init(|| {
        dotenv::from_filename(&dotenv_path).ok();
    });

    dotenv_path
}

/// Loads the application configuration from files and environment.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    ensure_dotenv_loaded();

    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| "debug".to_string());
    let config_dir = PathBuf::from(env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string()));

    let default_path = config_dir.join("default");
    let env_path = config_dir.join(&run_env);
    debug!(
        "Loading config from {} and {}",
        default_path.display(),
        env_path.display()
    );

    let builder = Config::builder()
        .add_source(File::from(default_path).required(false))
        .add_source(File::from(env_path).required(false))
        .add_source(environment());

    builder.build()?.try_deserialize()
}

/// Parses an inline TOML document on top of the model defaults.
///
/// Environment variables are not consulted.
pub fn load_config_from_str(toml: &str) -> Result<AppConfig, ConfigError> {
    Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()?
        .try_deserialize()
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}
