use super::{AuthProvider, BearerToken};
use crate::config::Cloud;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::devicecode::StandardDeviceAuthorizationResponse;
use oauth2::devicecode::{DeviceCodeErrorResponse, DeviceCodeErrorResponseType};
use oauth2::{
    AuthUrl, ClientId, DeviceAuthorizationUrl, RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Azure CLI's well-known public client ID
const AZURE_CLI_CLIENT_ID: &str = "04b07795-8ddb-461a-bbee-02f9e1bf7b46";

/// Fallback when the server does not say how long the code is valid
const DEFAULT_CODE_LIFETIME_SECS: u64 = 15 * 60;

/// Entra ID device code sign-in. The user enters a short code on the
/// Microsoft login page while this side polls for the token.
pub struct DeviceCodeAuth {
    tenant_id: String,
    client_id: String,
    scope: String,
    cloud: Cloud,
    quiet: bool,
}

impl DeviceCodeAuth {
    /// Sign-in for the Key Vault data plane of `cloud`
    pub fn for_key_vault(tenant_id: String, client_id: Option<String>, cloud: Cloud) -> Self {
        Self {
            tenant_id,
            client_id: client_id.unwrap_or_else(|| AZURE_CLI_CLIENT_ID.to_string()),
            scope: cloud.key_vault_scope().to_string(),
            cloud,
            quiet: false,
        }
    }

    /// Set quiet mode (suppresses progress indicators)
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// `https://<login>/<tenant>/oauth2/v2.0/<action>`
    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/{}/oauth2/v2.0/{}",
            self.cloud.login_endpoint(),
            self.tenant_id,
            action
        )
    }

    fn oauth_client(&self) -> Result<BasicClient> {
        let invalid = |e: oauth2::url::ParseError| {
            AppError::DeviceCodeAuthFailed(format!("Invalid sign-in endpoint for tenant '{}': {}", self.tenant_id, e))
        };
        let auth_url = AuthUrl::new(self.endpoint("authorize")).map_err(invalid)?;
        let token_url = TokenUrl::new(self.endpoint("token")).map_err(invalid)?;
        let device_url = DeviceAuthorizationUrl::new(self.endpoint("devicecode")).map_err(invalid)?;

        Ok(BasicClient::new(ClientId::new(self.client_id.clone()), None, auth_url, Some(token_url))
            .set_device_authorization_url(device_url))
    }

    async fn fetch_token(&self) -> Result<BasicTokenResponse> {
        let client = self.oauth_client()?;

        debug!(tenant = %self.tenant_id, scope = %self.scope, "requesting device code");
        let details: StandardDeviceAuthorizationResponse = client
            .exchange_device_code()
            .map_err(|e| AppError::DeviceCodeAuthFailed(e.to_string()))?
            .add_scope(Scope::new(self.scope.clone()))
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .map_err(|e| AppError::DeviceCodeAuthFailed(format!("Could not start Key Vault sign-in: {}", e)))?;

        print_prompt(&details);
        self.wait_for_sign_in(&client, &details).await
    }

    /// Poll the token endpoint until the user finishes signing in or the code expires
    async fn wait_for_sign_in(
        &self,
        client: &BasicClient,
        details: &StandardDeviceAuthorizationResponse,
    ) -> Result<BasicTokenResponse> {
        let lifetime = match details.expires_in() {
            d if d.is_zero() => Duration::from_secs(DEFAULT_CODE_LIFETIME_SECS),
            d => d,
        };
        let deadline = Instant::now() + lifetime;
        let mut interval = details.interval();
        let progress = WaitBar::new(lifetime, self.quiet);

        while Instant::now() < deadline {
            progress.tick(deadline);
            sleep(interval).await;

            let attempt = client
                .exchange_device_access_token(details)
                .request_async(oauth2::reqwest::async_http_client, sleep, None)
                .await;
            match attempt {
                Ok(token) => {
                    debug!("device code sign-in completed");
                    return Ok(token);
                }
                Err(err) => match classify(err) {
                    PollStep::Pending => {}
                    PollStep::SlowDown => interval += interval,
                    PollStep::Fail(message) => return Err(AppError::DeviceCodeAuthFailed(message)),
                },
            }
        }

        Err(AppError::DeviceCodeAuthFailed(
            "Sign-in was not completed before the device code expired".to_string(),
        ))
    }
}

fn print_prompt(details: &StandardDeviceAuthorizationResponse) {
    eprintln!();
    eprintln!("  {} {}", style("[*]").cyan(), style("Azure Key Vault sign-in required").bold());
    eprintln!("  {} Open this URL in your browser:", style("1.").bold());
    eprintln!("     {}", style(details.verification_uri().as_str()).underlined());
    eprintln!("  {} Enter this code:", style("2.").bold());
    eprintln!("     {}", style(details.user_code().secret()).bold().yellow());
    eprintln!();
}

/// What to do after one unsuccessful token poll
#[derive(Debug, PartialEq, Eq)]
enum PollStep {
    Pending,
    SlowDown,
    Fail(String),
}

type PollError = RequestTokenError<oauth2::reqwest::AsyncHttpClientError, DeviceCodeErrorResponse>;

fn classify(err: PollError) -> PollStep {
    match err {
        RequestTokenError::ServerResponse(response) => match response.error() {
            DeviceCodeErrorResponseType::AuthorizationPending => PollStep::Pending,
            DeviceCodeErrorResponseType::SlowDown => PollStep::SlowDown,
            DeviceCodeErrorResponseType::ExpiredToken => {
                PollStep::Fail("Device code expired".to_string())
            }
            DeviceCodeErrorResponseType::AccessDenied => {
                PollStep::Fail("User declined authorization".to_string())
            }
            other => PollStep::Fail(format!(
                "Sign-in rejected: {}",
                response.error_description().cloned().unwrap_or_else(|| format!("{:?}", other))
            )),
        },
        RequestTokenError::Request(e) => PollStep::Fail(format!("Network error while waiting for sign-in: {}", e)),
        other => PollStep::Fail(format!("Token request failed: {}", other)),
    }
}

/// Countdown shown while the user signs in. Cleared on drop.
struct WaitBar(Option<ProgressBar>);

impl WaitBar {
    fn new(lifetime: Duration, quiet: bool) -> Self {
        if quiet {
            return Self(None);
        }
        let bar = ProgressBar::new(lifetime.as_secs());
        if let Ok(template) =
            ProgressStyle::default_bar().template("  {spinner:.cyan} Waiting for sign-in [{bar:30.dim}] {msg}")
        {
            bar.set_style(template.progress_chars("=>-"));
        }
        Self(Some(bar))
    }

    fn tick(&self, deadline: Instant) {
        if let Some(bar) = &self.0 {
            let remaining = deadline.saturating_duration_since(Instant::now()).as_secs();
            bar.set_position(bar.length().unwrap_or(0).saturating_sub(remaining));
            bar.set_message(format!("{}:{:02} left", remaining / 60, remaining % 60));
        }
    }
}

impl Drop for WaitBar {
    fn drop(&mut self) {
        if let Some(bar) = &self.0 {
            bar.finish_and_clear();
        }
    }
}

#[async_trait]
impl AuthProvider for DeviceCodeAuth {
    async fn get_token(&self) -> Result<BearerToken> {
        let token = self.fetch_token().await?;
        Ok(BearerToken::new(token.access_token().secret().clone()))
    }

    fn method_name(&self) -> &'static str {
        "Device Code Flow"
    }
}
