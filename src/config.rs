//! Unified configuration loading for EYWA MVC applications.
//!
//! [`MvcConfig`] is built once at startup and shared read-only (behind an
//! `Arc`) by the registry, the dispatcher and every request context.

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use tracing::info;

use crate::{AppError, Result};

/// Wrapper for service configuration.
///
/// Automatically loads configuration from:
/// 1. `config/default.toml`
/// 2. `config/{env}.toml` (where {env} is RUN_MODE, defaults to "development")
/// 3. `config/local.toml`
/// 4. Environment variables (nested keys separated by `__`)
/// 5. `.env` file
pub struct EywaConfig;

impl EywaConfig {
    /// Load configuration into a struct that implements `Deserialize`.
    pub fn load<T>() -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        info!("Loading configuration for environment: {}", run_mode);

        let settings = Config::builder()
            .add_source(File::new("config/default", FileFormat::Toml).required(false))
            .add_source(
                File::new(&format!("config/{}", run_mode), FileFormat::Toml).required(false),
            )
            // Add local config (gitignored)
            .add_source(File::new("config/local", FileFormat::Toml).required(false))
            .add_source(Environment::default().separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Load a single configuration file. The format follows the extension
    /// (`.toml`, `.ini`, `.json`, `.yaml`).
    pub fn load_file<T>(path: impl AsRef<Path>) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let path = path.as_ref();
        info!("Loading configuration file: {}", path.display());

        let settings = Config::builder()
            .add_source(File::from(path).required(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

/// Running mode. Development mode renders diagnostic error pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    #[serde(alias = "development")]
    Dev,
    #[serde(alias = "production")]
    Pro,
}

/// Framework configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MvcConfig {
    pub mode: Mode,
    pub server: ServerConfig,
    pub controller: ControllerConfig,
    pub action: ActionConfig,
    pub view: ViewConfig,
    pub session: SessionConfig,
    pub jwt: JwtConfig,
    pub log: LogConfig,
    pub router: RouterConfig,
}

impl MvcConfig {
    /// Load from the layered sources of [`EywaConfig::load`] and validate.
    pub fn load() -> Result<Self> {
        let config: Self = EywaConfig::load()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a single file and validate.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = EywaConfig::load_file(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.action.prefix.is_empty() && self.action.suffix.is_empty() {
            return Err(AppError::ConfigError(
                "you should set the action's prefix or suffix".into(),
            ));
        }
        if self.action.method_field.is_empty() {
            return Err(AppError::ConfigError(
                "action.method_field must not be empty".into(),
            ));
        }
        if self.session.enable && self.session.name.is_empty() {
            return Err(AppError::ConfigError(
                "session.name must not be empty when sessions are enabled".into(),
            ));
        }
        Ok(())
    }

    pub fn is_dev(&self) -> bool {
        self.mode == Mode::Dev
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    /// Maximum buffered request body, in bytes.
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0:8080".into(),
            body_limit: 2 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub prefix: String,
    pub suffix: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            suffix: "Controller".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    pub prefix: String,
    pub suffix: String,
    /// Request field used to simulate a verb over POST.
    pub method_field: String,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            prefix: "Action".into(),
            suffix: String::new(),
            method_field: "_method".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub root: String,
    pub suffix: String,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            root: "views".into(),
            suffix: ".html".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub enable: bool,
    /// Cookie name.
    pub name: String,
    /// Seconds.
    pub max_age: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enable: false,
            name: "GOSESSION".into(),
            max_age: 10 * 24 * 3600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    pub enable: bool,
    pub issuer: String,
    /// Seconds.
    pub ttl: u64,
    pub secret: String,
    pub query_key: String,
    pub form_key: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            enable: true,
            issuer: "CleverGO".into(),
            ttl: 3600 * 24 * 7,
            secret: uuid::Uuid::new_v4().simple().to_string(),
            query_key: "_jwt".into(),
            form_key: "_jwt".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub enable: bool,
    /// `EnvFilter` directive, overridden by `RUST_LOG`.
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enable: true,
            level: "info".into(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub redirect_trailing_slash: bool,
    pub handle_method_not_allowed: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            redirect_trailing_slash: true,
            handle_method_not_allowed: true,
        }
    }
}
