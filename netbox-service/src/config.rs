use std::path::Path;
use std::time::Duration;
use serde::Deserialize;
use anyhow::{Context, Result};
use shared::coerce;
use shared::protocol::{ENV_TOKEN, ENV_URL};
use shared::types::{ServiceData, State};
use crate::error::ConvergeError;

/// Arguments handed to the module by the automation host.
///
/// The host writes extra `_ansible_*` keys into the same file, so unknown
/// top-level keys are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleArgs {
    #[serde(default)]
    pub netbox_url: Option<String>,
    #[serde(default)]
    pub netbox_token: Option<String>,
    #[serde(default = "default_validate_certs", deserialize_with = "coerce::flag")]
    pub validate_certs: bool,
    #[serde(default)]
    pub state: State,
    pub data: ServiceData,
    #[serde(default, alias = "_ansible_check_mode", deserialize_with = "coerce::flag")]
    pub check_mode: bool,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Resolved connection settings for the API client.
#[derive(Debug, Clone)]
pub struct Connection {
    pub url: String,
    pub token: String,
    pub validate_certs: bool,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgsFormat {
    Json,
    Toml,
}

impl ArgsFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ArgsFormat::Toml,
            _ => ArgsFormat::Json,
        }
    }
}

fn default_validate_certs() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

impl ModuleArgs {
    /// Load module arguments from a JSON or TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read arguments file: {}", path.display()))?;

        Self::parse(&contents, ArgsFormat::from_path(path))
            .with_context(|| format!("Failed to parse arguments file: {}", path.display()))
    }

    pub fn parse(contents: &str, format: ArgsFormat) -> Result<Self> {
        let args = match format {
            ArgsFormat::Json => serde_json::from_str(contents)?,
            ArgsFormat::Toml => toml::from_str(contents)?,
        };
        Ok(args)
    }

    /// Connection settings, falling back to the process environment for
    /// the url and token.
    pub fn connection(&self) -> Result<Connection, ConvergeError> {
        self.connection_with(|key| std::env::var(key).ok())
    }

    pub fn connection_with<F>(&self, env: F) -> Result<Connection, ConvergeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = non_empty(self.netbox_url.clone())
            .or_else(|| non_empty(env(ENV_URL)))
            .ok_or_else(|| ConvergeError::validation("missing required arguments: netbox_url"))?;
        let token = non_empty(self.netbox_token.clone())
            .or_else(|| non_empty(env(ENV_TOKEN)))
            .ok_or_else(|| ConvergeError::validation("missing required arguments: netbox_token"))?;

        Ok(Connection {
            url,
            token,
            validate_certs: self.validate_certs,
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
