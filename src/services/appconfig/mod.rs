use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;
use url::{Position, Url};

use crate::cli::FilterSet;
use crate::error::ProbeError;
use crate::network::{check_status, from_http_error, http_client, with_timeout};
use crate::services::{
    ConfigSetting, Probe, ProbeContext, ProbeResult, ProbeSuccess, ServiceType,
};

const API_VERSION: &str = "1.0";
const SIGNED_HEADERS: &str = "x-ms-date;host;x-ms-content-sha256";

type HmacSha256 = Hmac<Sha256>;

/// Parsed `Endpoint=...;Id=...;Secret=...` access-key connection string
#[derive(Debug, Clone)]
pub struct AppConfigConnection {
    pub endpoint: Url,
    pub id: String,
    secret: Vec<u8>,
}

impl AppConfigConnection {
    pub fn parse(connection_string: &str) -> Result<Self, ProbeError> {
        let mut endpoint = None;
        let mut id = None;
        let mut secret = None;

        for part in connection_string.split(';').filter(|p| !p.trim().is_empty()) {
            let (name, value) = part.split_once('=').ok_or_else(|| {
                ProbeError::other(format!("Invalid connection string segment '{}'", part))
            })?;
            match name.trim().to_lowercase().as_str() {
                "endpoint" => endpoint = Some(value.trim().to_string()),
                "id" => id = Some(value.trim().to_string()),
                "secret" => secret = Some(value.trim().to_string()),
                other => debug!(segment = other, "ignoring connection string segment"),
            }
        }

        let missing = |name: &str| ProbeError::other(format!("Connection string is missing '{}'", name));
        let endpoint = endpoint.ok_or_else(|| missing("Endpoint"))?;
        let id = id.ok_or_else(|| missing("Id"))?;
        let secret = secret.ok_or_else(|| missing("Secret"))?;

        let endpoint = Url::parse(&endpoint)
            .map_err(|e| ProbeError::other(format!("Invalid endpoint '{}': {}", endpoint, e)))?;
        let secret = STANDARD
            .decode(secret.as_bytes())
            .map_err(|e| ProbeError::other(format!("Secret is not valid base64: {}", e)))?;

        Ok(Self {
            endpoint,
            id,
            secret,
        })
    }

    /// First page of key-values matching `filters`
    pub fn list_url(&self, filters: &FilterSet) -> Result<Url, ProbeError> {
        let mut url = self
            .endpoint
            .join("kv")
            .map_err(|e| ProbeError::other(e.to_string()))?;
        let query = serde_urlencoded::to_string([
            ("key", filters.key_filter.as_str()),
            ("label", filters.label_filter.as_str()),
            ("api-version", API_VERSION),
        ])
        .map_err(|e| ProbeError::other(e.to_string()))?;
        url.set_query(Some(&query));
        Ok(url)
    }

    /// Headers for an HMAC-SHA256 signed GET of `url`
    pub fn sign_get(&self, url: &Url, now: DateTime<Utc>) -> Result<Vec<(&'static str, String)>, ProbeError> {
        let date = now.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let content_hash = STANDARD.encode(Sha256::digest(b""));
        let host = &url[Position::BeforeHost..Position::AfterPort];
        let path_and_query = &url[Position::BeforePath..Position::AfterQuery];

        let string_to_sign = format!("GET\n{}\n{};{};{}", path_and_query, date, host, content_hash);
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| ProbeError::other(format!("Invalid secret: {}", e)))?;
        Mac::update(&mut mac, string_to_sign.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        Ok(vec![
            ("x-ms-date", date),
            ("x-ms-content-sha256", content_hash),
            (
                "Authorization",
                format!(
                    "HMAC-SHA256 Credential={}&SignedHeaders={}&Signature={}",
                    self.id, SIGNED_HEADERS, signature
                ),
            ),
        ])
    }
}

#[derive(Debug, Deserialize)]
struct KeyValue {
    key: String,
    value: Option<String>,
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KeyValuePage {
    #[serde(default)]
    items: Vec<KeyValue>,
    #[serde(rename = "@nextLink")]
    next_link: Option<String>,
}

/// Lists the key-values selected by the key and label filters
pub struct AppConfigProbe;

impl AppConfigProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AppConfigProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for AppConfigProbe {
    fn service(&self) -> ServiceType {
        ServiceType::AppConfig
    }

    async fn run(
        &self,
        target: &str,
        filters: Option<&FilterSet>,
        context: &ProbeContext,
    ) -> ProbeResult {
        let filters = filters.cloned().unwrap_or_default();
        let connection = AppConfigConnection::parse(target)?;
        let client = http_client(context.timeout)?;

        let settings = with_timeout(
            context.timeout,
            list_settings(&client, &connection, &filters),
        )
        .await?;

        Ok(ProbeSuccess::Settings { settings, filters })
    }
}

async fn list_settings(
    client: &Client,
    connection: &AppConfigConnection,
    filters: &FilterSet,
) -> Result<Vec<ConfigSetting>, ProbeError> {
    let mut settings = Vec::new();
    let mut next = Some(connection.list_url(filters)?);

    while let Some(url) = next.take() {
        debug!(%url, "fetching App Configuration page");
        let mut request = client
            .get(url.clone())
            .header("Accept", "application/vnd.microsoft.appconfig.kvset+json, application/json")
            .header("x-ms-client-request-id", uuid::Uuid::new_v4().to_string());
        for (name, value) in connection.sign_get(&url, Utc::now())? {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|e| from_http_error(&e))?;
        let page: KeyValuePage = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProbeError::malformed(format!("Failed to parse response: {}", e)))?;

        settings.extend(page.items.into_iter().map(|kv| ConfigSetting {
            key: kv.key,
            value: kv.value,
            label: kv.label,
        }));

        next = match page.next_link {
            Some(link) => Some(
                connection
                    .endpoint
                    .join(&link)
                    .map_err(|e| ProbeError::malformed(format!("Invalid next link '{}': {}", link, e)))?,
            ),
            None => None,
        };
    }

    Ok(settings)
}
