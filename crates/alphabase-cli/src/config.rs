use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{env, DEFAULT_STORE_FILE};

/// Contents of `config.toml`. Every section is optional.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AlphaConfig {
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub write: WriteSection,
    #[serde(default)]
    pub ttl: TtlSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreSection {
    pub path: Option<String>,
    pub cipher: Option<String>,
    pub backup_dir: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WriteSection {
    /// Coalescing window for deferred writes; absent or 0 writes immediately.
    pub deferred_ms: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TtlSection {
    /// Background sweep period; absent or 0 sweeps only on access.
    pub sweep_interval_ms: Option<u64>,
}

pub fn resolve_config_path() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var(env::CONFIG) {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }
    default_config_path()
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join("config.toml"))
}

pub fn default_store_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_data_dir()?.join(DEFAULT_STORE_FILE))
}

/// Load the config file, or defaults when it does not exist.
pub fn load_config() -> anyhow::Result<AlphaConfig> {
    let path = resolve_config_path()?;
    if !path.exists() {
        return Ok(AlphaConfig::default());
    }
    read_config(&path)
}

pub fn read_config(path: &Path) -> anyhow::Result<AlphaConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
}

pub fn xdg_config_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_CONFIG_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("alphabase"));
        }
    }
    Ok(home_dir()?.join(".config").join("alphabase"))
}

pub fn xdg_data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_DATA_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("alphabase"));
        }
    }
    Ok(home_dir()?.join(".local").join("share").join("alphabase"))
}

fn home_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME is not set; cannot resolve default paths"))?;
    Ok(PathBuf::from(home))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parses() {
        let config: AlphaConfig = toml::from_str(
            r#"
            [store]
            path = "/var/lib/alphabase/db.json"
            cipher = "aes"
            backup_dir = "/var/backups/alphabase"

            [write]
            deferred_ms = 250

            [ttl]
            sweep_interval_ms = 60000
            "#,
        )
        .unwrap();
        assert_eq!(config.store.cipher.as_deref(), Some("aes"));
        assert_eq!(config.write.deferred_ms, Some(250));
        assert_eq!(config.ttl.sweep_interval_ms, Some(60000));
    }

    #[test]
    fn test_sections_are_optional() {
        let config: AlphaConfig = toml::from_str("[store]\npath = \"db.json\"\n").unwrap();
        assert_eq!(config.store.path.as_deref(), Some("db.json"));
        assert!(config.write.deferred_ms.is_none());
        assert!(config.ttl.sweep_interval_ms.is_none());

        let empty: AlphaConfig = toml::from_str("").unwrap();
        assert!(empty.store.path.is_none());
    }

    #[test]
    fn test_read_config_reports_path_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[store\n").unwrap();
        let err = read_config(&path).unwrap_err();
        assert!(err.to_string().contains("config.toml"));
    }
}
