pub mod device_code;

use crate::error::Result;

pub use device_code::DeviceCodeAuth;

/// OAuth2 access token sent as `Authorization: Bearer ...`
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Apply the token to a request builder
    pub fn apply_to_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.bearer_auth(&self.0)
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// Authentication provider trait
#[async_trait::async_trait]
pub trait AuthProvider: Send + Sync {
    /// Get a token for making API calls
    async fn get_token(&self) -> Result<BearerToken>;

    /// Get the authentication method name
    fn method_name(&self) -> &'static str;
}

/// Provider that hands out a token obtained elsewhere
#[derive(Debug, Clone)]
pub struct StaticTokenAuth {
    token: BearerToken,
}

impl StaticTokenAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: BearerToken::new(token),
        }
    }
}

#[async_trait::async_trait]
impl AuthProvider for StaticTokenAuth {
    async fn get_token(&self) -> Result<BearerToken> {
        Ok(self.token.clone())
    }

    fn method_name(&self) -> &'static str {
        "Access Token"
    }
}
