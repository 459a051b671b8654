//! # Configuration Utilities
//!
//! TOML-backed configuration for the directory service. Every section has
//! defaults so a missing file or a partial file still yields a usable config.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Load a TOML configuration file and deserialize it into the specified type.
///
/// # Arguments
/// - `path`: Path to the TOML configuration file
///
/// # Returns
/// - `Ok(T)`: Successfully loaded and parsed configuration
/// - `Err`: File I/O or parsing error
///
/// # Example
/// ```ignore
/// let config: AppConfig = load_config("config/hyspania.toml")?;
/// ```
pub fn load_config<T>(path: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)?;
    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Complete service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener settings
    pub server: ServerSection,
    /// Where the JSON documents live
    pub storage: StorageSection,
    /// Client identifier derivation
    pub identity: IdentitySection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Address the HTTP listener binds to (e.g., "0.0.0.0:8080")
    pub address: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Directory holding `servers.json`, `votes.json` and `user_servers.json`.
    /// Created on first write.
    pub data_dir: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySection {
    /// Salt appended to the client address before hashing
    pub salt: String,
    /// Honor `Client-IP` / `X-Forwarded-For` when resolving the client address.
    /// Disable when the service is exposed without a reverse proxy.
    pub trust_proxy_headers: bool,
}

impl Default for IdentitySection {
    fn default() -> Self {
        Self {
            salt: "hyspania_salt_2026".to_string(),
            trust_proxy_headers: true,
        }
    }
}
