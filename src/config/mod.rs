use std::env;
use std::path::Path;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::console::Console;
use crate::error::{Error, Result};

/// Controller connection settings, immutable once resolved.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl ControllerConfig {
    pub fn base_url(&self) -> String {
        format!("https://{}:{}", self.host, self.port)
    }
}

/// Settings gathered so far from the config file and the environment.
/// Whatever is still missing gets prompted for by [`PartialConfig::resolve`].
#[derive(Debug, Default, Deserialize)]
pub struct PartialConfig {
    #[serde(default)]
    pub vmanage_host: Option<String>,
    #[serde(default, deserialize_with = "port_value")]
    pub vmanage_port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl PartialConfig {
    /// Read the persisted config document. An absent file is not an error.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("config file {} not found, proceeding without it", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        tracing::info!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Fill still-missing keys from VMANAGE_* environment variables.
    pub fn apply_env(mut self) -> Result<Self> {
        if self.vmanage_host.is_none() {
            self.vmanage_host = env_nonempty("VMANAGE_HOST");
        }
        if self.vmanage_port.is_none() {
            if let Some(raw) = env_nonempty("VMANAGE_PORT") {
                let port = raw
                    .trim()
                    .parse()
                    .map_err(|_| Error::Config(format!("VMANAGE_PORT '{}' is not a valid port", raw)))?;
                self.vmanage_port = Some(port);
            }
        }
        if self.username.is_none() {
            self.username = env_nonempty("VMANAGE_USERNAME");
        }
        if self.password.is_none() {
            self.password = env_nonempty("VMANAGE_PASSWORD");
        }
        Ok(self)
    }

    /// Prompt for exactly the keys still missing and return the final
    /// configuration. Present values are never overwritten, and nothing is
    /// written back to the config file.
    pub fn resolve(self, console: &mut dyn Console) -> Result<ControllerConfig> {
        let host = match self.vmanage_host {
            Some(host) => host,
            None => console.prompt_line("Enter vManage IP/Hostname")?,
        };
        let port = match self.vmanage_port {
            Some(port) => port,
            None => {
                let raw = console.prompt_line("Enter vManage Port")?;
                raw.trim()
                    .parse()
                    .map_err(|_| Error::Config(format!("'{}' is not a valid port", raw)))?
            }
        };
        let username = match self.username {
            Some(username) => username,
            None => console.prompt_line("Enter Username")?,
        };
        let password = match self.password {
            Some(password) => password,
            None => console.prompt_line("Enter Password")?,
        };

        Ok(ControllerConfig {
            host,
            port,
            username,
            password,
        })
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Ports appear as numbers or strings depending on how the config file was
/// produced; accept both. Blank strings count as missing.
fn port_value<'de, D>(deserializer: D) -> std::result::Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u16::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("port out of range")),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("'{}' is not a valid port", s))),
        Some(other) => Err(serde::de::Error::custom(format!(
            "invalid port value: {}",
            other
        ))),
    }
}
