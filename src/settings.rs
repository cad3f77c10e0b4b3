use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::webauthn::PasskeySettings;

const SETTINGS_FILE: &str = "Settings.toml";
const SECRETS_DIR_VAR: &str = "PASSKEY_SECRETS_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerSettings {
    pub application: ApplicationSettings,
    pub passkeys: PasskeySettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: "http://localhost:3000,http://localhost:8080".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ServerSettings {
    /// Load settings from configuration files and environment variables
    ///
    /// Also loads `.env` and initializes the logger at the configured level.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A settings file cannot be read or parsed
    /// - The logger is already initialized
    /// - The passkey settings are invalid
    pub fn load() -> anyhow::Result<Self> {
        Self::load_env_file();

        let mut settings = Self::load_base_settings(Path::new(SETTINGS_FILE))?;
        Self::apply_env_overrides(&mut settings);

        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(settings.logging.level.as_str()),
        )
        .try_init()
        .context("failed to initialize logger")?;

        settings
            .passkeys
            .validate()
            .context("invalid passkey settings")?;
        Ok(settings)
    }

    /// Load base settings from TOML file(s) or use defaults
    ///
    /// Settings are loaded with the following priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `PASSKEY_SECRETS_DIR` (if specified and exists)
    /// 3. `default_path` (if exists)
    /// 4. Default settings
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file cannot be read or parsed.
    pub fn load_base_settings(default_path: &Path) -> anyhow::Result<Self> {
        let mut settings = Self::default();

        if default_path.exists() {
            settings = Self::read_file(default_path)?;
            println!("✓ Loaded base settings from {}", default_path.display());
        }

        if let Ok(secrets_dir) = std::env::var(SECRETS_DIR_VAR) {
            let secrets_path = Path::new(&secrets_dir).join(SETTINGS_FILE);
            if secrets_path.exists() {
                settings = Self::read_file(&secrets_path)?;
                println!("✓ Overriding settings from {}", secrets_path.display());
            } else {
                println!(
                    "ℹ {SECRETS_DIR_VAR} set but no {SETTINGS_FILE} found at: {}",
                    secrets_path.display()
                );
            }
        }

        Ok(settings)
    }

    fn read_file(path: &Path) -> anyhow::Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        basic_toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        Self::apply_application_env_overrides(&mut settings.application);
        Self::apply_passkey_env_overrides(&mut settings.passkeys);
        Self::apply_logging_env_overrides(&mut settings.logging);
    }

    fn apply_application_env_overrides(app_settings: &mut ApplicationSettings) {
        if let Ok(host) = std::env::var("HOST") {
            app_settings.host = host;
        }
        if let Ok(port_str) = std::env::var("PORT") {
            if let Ok(port) = port_str.parse::<u16>() {
                app_settings.port = port;
            }
        }
        if let Ok(cors_origins) = std::env::var("CORS_ORIGINS") {
            app_settings.cors_origins = cors_origins;
        }
    }

    fn apply_passkey_env_overrides(passkeys: &mut PasskeySettings) {
        if let Ok(rp_id) = std::env::var("RP_ID") {
            passkeys.rp_id = rp_id;
        }
        if let Ok(rp_name) = std::env::var("RP_NAME") {
            passkeys.rp_name = rp_name;
        }
        if let Ok(origins) = std::env::var("RP_ORIGIN") {
            passkeys.rp_origins = split_list(&origins);
        }
        Self::apply_numeric_env_override("PASSKEY_TIMEOUT_SECONDS", &mut passkeys.timeout_seconds);
        Self::apply_numeric_env_override(
            "CHALLENGE_TTL_SECONDS",
            &mut passkeys.challenge_ttl_seconds,
        );
        if let Ok(user_verification) = std::env::var("USER_VERIFICATION") {
            passkeys.user_verification = user_verification;
        }
    }

    fn apply_numeric_env_override(env_var: &str, target: &mut u64) {
        if let Ok(value_str) = std::env::var(env_var) {
            if let Ok(value) = value_str.parse::<u64>() {
                *target = value;
            }
        }
    }

    fn apply_logging_env_overrides(logging_settings: &mut LoggingSettings) {
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            logging_settings.level = log_level;
        }
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = fs::read_to_string(".env") {
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }

    /// Get the bind address for the server
    #[must_use]
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.application.host, self.application.port)
    }

    /// Get CORS origins as a vector of strings
    #[must_use]
    pub fn get_cors_origins(&self) -> Vec<String> {
        split_list(&self.application.cors_origins)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}
