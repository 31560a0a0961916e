pub mod appconfig;
pub mod keyvault;
pub mod mongo;
pub mod redis;
pub mod sql;

use crate::cli::FilterSet;
use crate::config::{Cloud, Config};
use crate::error::ProbeError;
use async_trait::async_trait;
use std::time::Duration;

/// The services a probe exists for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceType {
    Sql,
    Mongo,
    Redis,
    AppConfig,
    KeyVault,
}

impl ServiceType {
    pub const ALL: [ServiceType; 5] = [
        ServiceType::Sql,
        ServiceType::Mongo,
        ServiceType::Redis,
        ServiceType::AppConfig,
        ServiceType::KeyVault,
    ];

    /// Identifier accepted on the command line
    pub fn id(&self) -> &'static str {
        match self {
            ServiceType::Sql => "sql",
            ServiceType::Mongo => "mongo",
            ServiceType::Redis => "redis",
            ServiceType::AppConfig => "appconfig",
            ServiceType::KeyVault => "keyvault",
        }
    }

    /// Case-insensitive lookup of a command-line identifier
    pub fn from_id(id: &str) -> Option<Self> {
        ServiceType::ALL
            .into_iter()
            .find(|service| service.id().eq_ignore_ascii_case(id))
    }

    /// Name used in report lines
    pub fn display_name(&self) -> &'static str {
        match self {
            ServiceType::Sql => "SQL Server",
            ServiceType::Mongo => "MongoDB",
            ServiceType::Redis => "Redis",
            ServiceType::AppConfig => "Azure App Configuration",
            ServiceType::KeyVault => "Azure Key Vault",
        }
    }

    /// Whether the probe consumes the key/label filters
    pub fn accepts_filters(&self) -> bool {
        matches!(self, ServiceType::AppConfig)
    }

    /// Whether the probe prompts the user (device code sign-in)
    pub fn is_interactive(&self) -> bool {
        matches!(self, ServiceType::KeyVault)
    }

    pub fn probe(&self) -> Box<dyn Probe> {
        match self {
            ServiceType::Sql => Box::new(sql::SqlProbe::new()),
            ServiceType::Mongo => Box::new(mongo::MongoProbe::new()),
            ServiceType::Redis => Box::new(redis::RedisProbe::new()),
            ServiceType::AppConfig => Box::new(appconfig::AppConfigProbe::new()),
            ServiceType::KeyVault => Box::new(keyvault::KeyVaultProbe::new()),
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// One App Configuration key-value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSetting {
    pub key: String,
    pub value: Option<String>,
    pub label: Option<String>,
}

/// What a successful probe found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeSuccess {
    /// Session opened (SQL Server, Redis)
    Connected,
    /// Database names listed by the server
    Databases(Vec<String>),
    /// Number of secret property entries in the vault
    Secrets { count: usize },
    /// Settings matching the filters
    Settings {
        settings: Vec<ConfigSetting>,
        filters: FilterSet,
    },
}

pub type ProbeResult = Result<ProbeSuccess, ProbeError>;

/// Run-wide settings shared by every probe
#[derive(Debug, Clone)]
pub struct ProbeContext {
    /// Upper bound on the probe's network work
    pub timeout: Duration,
    /// Cloud used for Entra ID sign-in
    pub cloud: Cloud,
    /// Entra ID tenant for device code sign-in
    pub tenant_id: String,
    /// Optional client ID override for device code sign-in
    pub client_id: Option<String>,
    /// Suppress progress indicators
    pub quiet: bool,
}

impl ProbeContext {
    pub fn from_config(config: &Config, quiet: bool) -> Self {
        Self {
            timeout: Duration::from_secs(config.global.timeout_seconds),
            cloud: config.global.cloud,
            tenant_id: config.auth.tenant_id.clone(),
            client_id: config.auth.client_id.clone(),
            quiet,
        }
    }
}

impl Default for ProbeContext {
    fn default() -> Self {
        Self::from_config(&Config::default(), true)
    }
}

/// A connectivity check against one kind of service
#[async_trait]
pub trait Probe: Send + Sync {
    fn service(&self) -> ServiceType;

    /// Contact the service behind `target`. `filters` is only passed to probes
    /// whose service accepts filters.
    async fn run(
        &self,
        target: &str,
        filters: Option<&FilterSet>,
        context: &ProbeContext,
    ) -> ProbeResult;
}

/// Lookup from service type to probe
pub trait ProbeRegistry: Send + Sync {
    fn probe_for(&self, service: ServiceType) -> Box<dyn Probe>;
}

/// Registry backed by the real service clients
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinProbes;

impl ProbeRegistry for BuiltinProbes {
    fn probe_for(&self, service: ServiceType) -> Box<dyn Probe> {
        service.probe()
    }
}

/// Comma-separated list of command-line identifiers
pub fn supported_ids() -> String {
    ServiceType::ALL
        .iter()
        .map(|s| s.id())
        .collect::<Vec<_>>()
        .join(", ")
}
