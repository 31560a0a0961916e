use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AppError, Result};

/// Azure cloud environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cloud {
    #[default]
    Global,
    China,
}

impl Cloud {
    /// Get the Entra ID login endpoint for this cloud
    pub fn login_endpoint(&self) -> &'static str {
        match self {
            Cloud::Global => "https://login.microsoftonline.com",
            Cloud::China => "https://login.partner.microsoftonline.cn",
        }
    }

    /// Get the Key Vault data-plane scope for Entra ID auth
    pub fn key_vault_scope(&self) -> &'static str {
        match self {
            Cloud::Global => "https://vault.azure.net/.default",
            Cloud::China => "https://vault.azure.cn/.default",
        }
    }
}

impl std::fmt::Display for Cloud {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cloud::Global => write!(f, "global"),
            Cloud::China => write!(f, "china"),
        }
    }
}

impl std::str::FromStr for Cloud {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "global" | "azure" | "public" => Ok(Cloud::Global),
            "china" | "mooncake" | "cn" => Ok(Cloud::China),
            _ => Err(AppError::Config(format!("Unknown cloud: {}", s))),
        }
    }
}

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub cloud: Cloud,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            cloud: Cloud::Global,
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

/// Entra ID settings for the Key Vault device code sign-in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_tenant")]
    pub tenant_id: String,
    pub client_id: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            tenant_id: default_tenant(),
            client_id: None,
        }
    }
}

fn default_tenant() -> String {
    "organizations".to_string()
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::FileNotFound(path.display().to_string())
            } else {
                AppError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&content)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(tenant) = lookup("AZURE_TENANT_ID") {
            self.auth.tenant_id = tenant;
        }
        if let Some(client_id) = lookup("AZURE_CLIENT_ID") {
            self.auth.client_id = Some(client_id);
        }
        if let Some(cloud) = lookup("AZURE_CLOUD") {
            self.global.cloud = cloud.parse()?;
        }
        Ok(())
    }
}

/// Reject settings that would make every probe fail
pub fn validate_config(config: &Config) -> Result<()> {
    if config.global.timeout_seconds == 0 {
        return Err(AppError::Config(
            "timeout_seconds must be greater than zero".to_string(),
        ));
    }
    if config.auth.tenant_id.trim().is_empty() {
        return Err(AppError::Config("auth.tenant_id must not be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_cloud_endpoints() {
        assert_eq!(
            Cloud::Global.login_endpoint(),
            "https://login.microsoftonline.com"
        );
        assert_eq!(Cloud::China.key_vault_scope(), "https://vault.azure.cn/.default");
    }

    #[test]
    fn test_cloud_parse() {
        assert_eq!("global".parse::<Cloud>().unwrap(), Cloud::Global);
        assert_eq!("mooncake".parse::<Cloud>().unwrap(), Cloud::China);
        assert!("mars".parse::<Cloud>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.global.cloud, Cloud::Global);
        assert_eq!(config.global.timeout_seconds, 30);
        assert_eq!(config.auth.tenant_id, "organizations");
        assert!(config.auth.client_id.is_none());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[global]\ntimeout_seconds = 5\ncloud = \"china\"\n\n[auth]\ntenant_id = \"contoso\""
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.global.timeout_seconds, 5);
        assert_eq!(config.global.cloud, Cloud::China);
        assert_eq!(config.auth.tenant_id, "contoso");
    }

    #[test]
    fn test_from_file_missing() {
        let err = Config::from_file(Path::new("/nonexistent/service-tester.toml")).unwrap_err();
        assert!(matches!(err, AppError::FileNotFound(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[global]\ntimeout_seconds = 0").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("AZURE_TENANT_ID", "contoso"),
            ("AZURE_CLIENT_ID", "client"),
            ("AZURE_CLOUD", "cn"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides_from(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.auth.tenant_id, "contoso");
        assert_eq!(config.auth.client_id.as_deref(), Some("client"));
        assert_eq!(config.global.cloud, Cloud::China);
    }

    #[test]
    fn test_toml_round_trip_keeps_defaults() {
        let toml = Config::default().to_toml().unwrap();
        assert!(toml.contains("timeout_seconds = 30"));
        assert!(toml.contains("tenant_id = \"organizations\""));
    }
}
