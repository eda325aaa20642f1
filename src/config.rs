use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::view::{Currency, DEFAULT_MEMO_CAPACITY};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub pagination: PaginationConfig,
  #[serde(default)]
  pub inventory: InventoryConfig,
  #[serde(default)]
  pub display: DisplayConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the admin API, e.g. `https://shop.example.com/api/`
  pub base_url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
  #[serde(default = "default_page_size")]
  pub default_size: u32,
}

fn default_page_size() -> u32 {
  20
}

impl Default for PaginationConfig {
  fn default() -> Self {
    Self {
      default_size: default_page_size(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryConfig {
  /// Variants with stock at or below this (and above zero) are low stock
  #[serde(default = "default_low_stock_threshold")]
  pub low_stock_threshold: u32,
}

fn default_low_stock_threshold() -> u32 {
  10
}

impl Default for InventoryConfig {
  fn default() -> Self {
    Self {
      low_stock_threshold: default_low_stock_threshold(),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DisplayConfig {
  #[serde(default)]
  pub currency: Currency,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Persist fetched pages to sqlite for warm starts
  #[serde(default = "default_persist")]
  pub persist: bool,
  #[serde(default = "default_memo_capacity")]
  pub memo_capacity: usize,
}

fn default_persist() -> bool {
  true
}

fn default_memo_capacity() -> usize {
  DEFAULT_MEMO_CAPACITY
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      persist: default_persist(),
      memo_capacity: default_memo_capacity(),
    }
  }
}

impl CacheConfig {
  /// Zero is treated as one.
  pub fn memo_capacity(&self) -> NonZeroUsize {
    NonZeroUsize::new(self.memo_capacity).unwrap_or(NonZeroUsize::MIN)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./dashcache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/dashcache/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/dashcache/config.yaml\n\
                 with at least an `api.base_url` entry."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("dashcache.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("dashcache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Get the admin API token from environment variables.
  ///
  /// Checks DASHCACHE_API_TOKEN first, then ADMIN_API_TOKEN as fallback.
  /// Unauthenticated APIs are allowed, so a missing token is not an error.
  pub fn get_api_token() -> Option<String> {
    std::env::var("DASHCACHE_API_TOKEN")
      .or_else(|_| std::env::var("ADMIN_API_TOKEN"))
      .ok()
      .filter(|t| !t.trim().is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::from_yaml("api:\n  base_url: http://localhost:8080/api\n").unwrap();
    assert_eq!(config.api.base_url, "http://localhost:8080/api");
    assert_eq!(config.api.timeout_secs, 30);
    assert_eq!(config.pagination.default_size, 20);
    assert_eq!(config.inventory.low_stock_threshold, 10);
    assert_eq!(config.display.currency, Currency::USD);
    assert!(config.cache.persist);
    assert_eq!(config.cache.memo_capacity().get(), DEFAULT_MEMO_CAPACITY);
  }

  #[test]
  fn test_full_config() {
    let yaml = r#"
api:
  base_url: https://shop.example.com/api/
  timeout_secs: 5
pagination:
  default_size: 50
inventory:
  low_stock_threshold: 3
display:
  currency: EUR
cache:
  persist: false
  memo_capacity: 0
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.api.timeout_secs, 5);
    assert_eq!(config.pagination.default_size, 50);
    assert_eq!(config.inventory.low_stock_threshold, 3);
    assert_eq!(config.display.currency, Currency::EUR);
    assert!(!config.cache.persist);
    assert_eq!(config.cache.memo_capacity().get(), 1);
  }

  #[test]
  fn test_missing_api_section_is_an_error() {
    assert!(Config::from_yaml("pagination:\n  default_size: 10\n").is_err());
  }

  #[test]
  fn test_explicit_missing_path_is_an_error() {
    let err = Config::load(Some(Path::new("/nonexistent/dashcache.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
