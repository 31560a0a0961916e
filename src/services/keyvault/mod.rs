use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::auth::{AuthProvider, BearerToken, DeviceCodeAuth};
use crate::cli::FilterSet;
use crate::error::ProbeError;
use crate::network::{check_status, from_http_error, http_client, with_timeout};
use crate::services::{Probe, ProbeContext, ProbeResult, ProbeSuccess, ServiceType};

const API_VERSION: &str = "7.4";

#[derive(Debug, Deserialize)]
struct SecretPage {
    #[serde(default)]
    value: Vec<serde_json::Value>,
    #[serde(rename = "nextLink")]
    next_link: Option<String>,
}

/// Signs in with a device code and counts the secret properties in a vault
pub struct KeyVaultProbe {
    auth: Option<Box<dyn AuthProvider>>,
}

impl KeyVaultProbe {
    pub fn new() -> Self {
        Self { auth: None }
    }

    /// Use `auth` instead of the interactive device code sign-in
    pub fn with_auth(auth: Box<dyn AuthProvider>) -> Self {
        Self { auth: Some(auth) }
    }

    async fn token(&self, context: &ProbeContext) -> Result<BearerToken, ProbeError> {
        match &self.auth {
            Some(auth) => Ok(auth.get_token().await?),
            None => {
                let auth = DeviceCodeAuth::for_key_vault(
                    context.tenant_id.clone(),
                    context.client_id.clone(),
                    context.cloud,
                )
                .with_quiet(context.quiet);
                info!(method = auth.method_name(), "signing in to Azure Key Vault");
                Ok(auth.get_token().await?)
            }
        }
    }
}

impl Default for KeyVaultProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for KeyVaultProbe {
    fn service(&self) -> ServiceType {
        ServiceType::KeyVault
    }

    async fn run(
        &self,
        target: &str,
        _filters: Option<&FilterSet>,
        context: &ProbeContext,
    ) -> ProbeResult {
        let vault = vault_url(target)?;
        // Sign-in is interactive and bounded by the device code lifetime
        let token = self.token(context).await?;
        let client = http_client(context.timeout)?;

        let count = with_timeout(context.timeout, count_secrets(&client, &vault, &token)).await?;
        Ok(ProbeSuccess::Secrets { count })
    }
}

/// Validate the vault URI and point it at the secrets collection
pub fn vault_url(target: &str) -> Result<Url, ProbeError> {
    let vault = Url::parse(target.trim())
        .map_err(|e| ProbeError::other(format!("Invalid Key Vault URI '{}': {}", target, e)))?;
    if !matches!(vault.scheme(), "https" | "http") || vault.host_str().is_none() {
        return Err(ProbeError::other(format!(
            "Invalid Key Vault URI '{}': expected https://<vault-name>.vault.azure.net",
            target
        )));
    }

    let mut url = vault
        .join("/secrets")
        .map_err(|e| ProbeError::other(e.to_string()))?;
    url.query_pairs_mut().append_pair("api-version", API_VERSION);
    Ok(url)
}

async fn count_secrets(client: &Client, first: &Url, token: &BearerToken) -> Result<usize, ProbeError> {
    let mut count = 0;
    let mut next = Some(first.clone());

    while let Some(url) = next.take() {
        debug!(%url, "fetching Key Vault secrets page");
        let request = client
            .get(url.clone())
            .header("x-ms-client-request-id", uuid::Uuid::new_v4().to_string());
        let response = token
            .apply_to_request(request)
            .send()
            .await
            .map_err(|e| from_http_error(&e))?;

        let page: SecretPage = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProbeError::malformed(format!("Failed to parse response: {}", e)))?;

        count += page.value.len();
        next = match page.next_link.filter(|link| !link.is_empty()) {
            Some(link) => Some(
                url.join(&link)
                    .map_err(|e| ProbeError::malformed(format!("Invalid next link '{}': {}", link, e)))?,
            ),
            None => None,
        };
    }

    Ok(count)
}
