use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::cli::FilterSet;
use crate::error::{ProbeError, ProbeErrorKind};
use crate::network::with_timeout;
use crate::services::{Probe, ProbeContext, ProbeResult, ProbeSuccess, ServiceType};

const DEFAULT_PORT: u16 = 6379;
const DEFAULT_TLS_PORT: u16 = 6380;

/// Connects and sends `PING`
pub struct RedisProbe;

impl RedisProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RedisProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for RedisProbe {
    fn service(&self) -> ServiceType {
        ServiceType::Redis
    }

    async fn run(
        &self,
        target: &str,
        _filters: Option<&FilterSet>,
        context: &ProbeContext,
    ) -> ProbeResult {
        let url = redis_url(target)?;
        debug!(host = url.host_str().unwrap_or_default(), tls = url.scheme() == "rediss", "connecting to Redis");

        with_timeout(context.timeout, ping(url)).await?;
        Ok(ProbeSuccess::Connected)
    }
}

async fn ping(url: Url) -> Result<(), ProbeError> {
    let client = ::redis::Client::open(url.as_str()).map_err(map_error)?;
    let mut connection = client
        .get_multiplexed_async_connection()
        .await
        .map_err(map_error)?;
    let reply: String = ::redis::cmd("PING")
        .query_async(&mut connection)
        .await
        .map_err(map_error)?;

    if reply.eq_ignore_ascii_case("PONG") {
        Ok(())
    } else {
        Err(ProbeError::malformed(format!("Unexpected PING reply: {}", reply)))
    }
}

/// Accept either a `redis://`/`rediss://` URL or a StackExchange-style
/// `host:port,password=...,ssl=True` string and produce a client URL.
pub fn redis_url(target: &str) -> Result<Url, ProbeError> {
    let target = target.trim();
    if target.starts_with("redis://") || target.starts_with("rediss://") {
        return Url::parse(target).map_err(|e| ProbeError::other(format!("Invalid Redis URL: {}", e)));
    }

    let mut endpoints = Vec::new();
    let mut password = None;
    let mut user = None;
    let mut tls = false;
    let mut database = None;

    for part in target.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('=') {
            Some((key, value)) => match key.trim().to_lowercase().as_str() {
                "password" => password = Some(value.to_string()),
                "user" => user = Some(value.to_string()),
                "ssl" => tls = value.trim().eq_ignore_ascii_case("true"),
                "defaultdatabase" => {
                    let db = value.trim().parse::<u32>().map_err(|_| {
                        ProbeError::other(format!("Invalid defaultDatabase: {}", value))
                    })?;
                    database = Some(db);
                }
                other => debug!(option = other, "ignoring Redis connection option"),
            },
            None => endpoints.push(part),
        }
    }

    let endpoint = endpoints
        .first()
        .ok_or_else(|| ProbeError::other("Redis connection string has no endpoint"))?;
    if endpoints.len() > 1 {
        debug!(count = endpoints.len(), "multiple Redis endpoints given, probing the first");
    }

    let (host, port) = match endpoint.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| ProbeError::other(format!("Invalid Redis port in '{}'", endpoint)))?;
            (host, port)
        }
        None => (*endpoint, if tls { DEFAULT_TLS_PORT } else { DEFAULT_PORT }),
    };

    let scheme = if tls { "rediss" } else { "redis" };
    let mut url = Url::parse(&format!("{}://{}:{}", scheme, host, port))
        .map_err(|e| ProbeError::other(format!("Invalid Redis endpoint '{}': {}", endpoint, e)))?;

    if let Some(password) = password {
        let invalid = |_| ProbeError::other("Redis credentials cannot be encoded");
        url.set_username(user.as_deref().unwrap_or_default()).map_err(invalid)?;
        url.set_password(Some(&password)).map_err(invalid)?;
    }
    if let Some(db) = database {
        url.set_path(&db.to_string());
    }

    Ok(url)
}

fn map_error(err: ::redis::RedisError) -> ProbeError {
    let kind = if err.kind() == ::redis::ErrorKind::AuthenticationFailed
        || matches!(err.code(), Some("WRONGPASS") | Some("NOAUTH"))
    {
        ProbeErrorKind::AuthFailed
    } else if err.is_timeout() {
        ProbeErrorKind::Timeout
    } else if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
        ProbeErrorKind::Unreachable
    } else if err.kind() == ::redis::ErrorKind::TypeError {
        ProbeErrorKind::MalformedResponse
    } else {
        ProbeErrorKind::Other
    };
    ProbeError::new(kind, err.to_string())
}
