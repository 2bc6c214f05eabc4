use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const ENV_PREFIX: &str = "PLUGREG";

/// Connection settings for the target environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Environment root, e.g. `https://contoso.crm.dynamics.com`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Pre-issued bearer token; skips the client-credentials exchange.
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_authority")]
    pub authority: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_authority() -> String {
    "https://login.microsoftonline.com".into()
}

fn default_api_version() -> String {
    "9.2".into()
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            url: None,
            tenant_id: None,
            client_id: None,
            client_secret: None,
            access_token: None,
            authority: default_authority(),
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        let raw = self
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or("url is required (set it in the config file, PLUGREG__URL or --url)")?;
        let parsed = url::Url::parse(raw).map_err(|e| format!("url is invalid: {e}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(format!("url must be http or https, got {}", parsed.scheme()));
        }
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be > 0".into());
        }
        if self.api_version.trim().is_empty() {
            return Err("api_version must not be empty".into());
        }
        Ok(())
    }

    pub fn with_url_override(mut self, url: Option<&str>) -> Self {
        if let Some(url) = url {
            self.url = Some(url.to_string());
        }
        self
    }

    /// Environment root without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.as_deref().unwrap_or_default().trim_end_matches('/')
    }

    /// Copy safe to print.
    pub fn masked(&self) -> Self {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "********".to_string());
        Self {
            client_secret: mask(&self.client_secret),
            access_token: mask(&self.access_token),
            ..self.clone()
        }
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .context("Cannot determine home directory")?
        .join(".plugreg")
        .join("config.toml"))
}

/// Loads the config file (when present) overlaid with `PLUGREG__*` variables,
/// e.g. `PLUGREG__CLIENT_SECRET`.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut builder = config::Config::builder();
    match path {
        Some(p) => {
            if !p.is_file() {
                anyhow::bail!("Config file not found: {}", p.display());
            }
            builder = builder.add_source(config::File::from(p.to_path_buf()));
        }
        None => {
            if let Ok(default_path) = default_config_path()
                && default_path.is_file()
            {
                builder = builder.add_source(config::File::from(default_path));
            }
        }
    }
    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .try_parsing(false)
            .separator("__"),
    );

    let cfg = builder.build().context("config build error")?;
    cfg.try_deserialize()
        .context("config deserialize error")
}

/// Loads, applies the `--url` override and validates.
pub fn resolve(path: Option<&Path>, url: Option<&str>) -> Result<AppConfig> {
    let cfg = load_config(path)?.with_url_override(url);
    cfg.validate().map_err(anyhow::Error::msg)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_from_file_with_defaults() {
        let (_dir, path) = write_config(
            r#"
url = "https://contoso.crm.dynamics.com/"
tenant_id = "tenant"
client_id = "client"
client_secret = "secret"
"#,
        );
        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.base_url(), "https://contoso.crm.dynamics.com");
        assert_eq!(cfg.api_version, "9.2");
        assert_eq!(cfg.timeout_secs, 120);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        assert!(load_config(Some(Path::new("/nonexistent/plugreg.toml"))).is_err());
    }

    #[test]
    fn test_validation() {
        let mut cfg = AppConfig::default();
        assert!(cfg.validate().unwrap_err().contains("url is required"));

        cfg = cfg.with_url_override(Some("not a url"));
        assert!(cfg.validate().is_err());

        cfg = cfg.with_url_override(Some("ftp://contoso"));
        assert!(cfg.validate().is_err());

        cfg = cfg.with_url_override(Some("https://contoso.crm.dynamics.com"));
        assert!(cfg.validate().is_ok());

        cfg.timeout_secs = 0;
        assert!(cfg.validate().unwrap_err().contains("timeout_secs"));
    }

    #[test]
    fn test_masked_hides_secrets() {
        let cfg = AppConfig {
            client_secret: Some("s3cret".into()),
            access_token: Some("eyJ0".into()),
            ..AppConfig::default()
        };
        let masked = cfg.masked();
        assert_eq!(masked.client_secret.as_deref(), Some("********"));
        assert_eq!(masked.access_token.as_deref(), Some("********"));
    }
}
