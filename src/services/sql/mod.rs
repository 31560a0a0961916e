use async_trait::async_trait;
use tiberius::error::Error as TdsError;
use tiberius::{Client, Config};
use tokio::net::TcpStream;
use tokio_util::compat::TokioAsyncWriteCompatExt;
use tracing::{debug, info};

use crate::cli::FilterSet;
use crate::error::{ProbeError, ProbeErrorKind};
use crate::network::{io_error_kind, with_timeout};
use crate::services::{Probe, ProbeContext, ProbeResult, ProbeSuccess, ServiceType};

/// SQL Server login failure
const LOGIN_FAILED: u32 = 18456;

/// Opens a TDS session from an ADO.NET connection string
pub struct SqlProbe;

impl SqlProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SqlProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for SqlProbe {
    fn service(&self) -> ServiceType {
        ServiceType::Sql
    }

    async fn run(
        &self,
        target: &str,
        _filters: Option<&FilterSet>,
        context: &ProbeContext,
    ) -> ProbeResult {
        let config = Config::from_ado_string(target).map_err(map_error)?;
        with_timeout(context.timeout, open_session(config)).await?;
        Ok(ProbeSuccess::Connected)
    }
}

async fn open_session(config: Config) -> Result<(), ProbeError> {
    let client = match connect(config.clone()).await {
        Err(TdsError::Routing { host, port }) => {
            // Azure SQL gateways redirect the login to the database node
            info!(%host, port, "following SQL Server routing redirect");
            let mut config = config;
            config.host(&host);
            config.port(port);
            connect(config).await
        }
        other => other,
    }
    .map_err(map_error)?;

    debug!("SQL Server login completed");
    client.close().await.map_err(map_error)
}

async fn connect(
    config: Config,
) -> Result<Client<tokio_util::compat::Compat<TcpStream>>, TdsError> {
    let tcp = TcpStream::connect(config.get_addr()).await?;
    tcp.set_nodelay(true)?;
    Client::connect(config, tcp.compat_write()).await
}

fn map_error(err: TdsError) -> ProbeError {
    match &err {
        TdsError::Io { kind, .. } => ProbeError::new(io_error_kind(*kind), err.to_string()),
        TdsError::Server(token) => {
            let kind = if token.code() == LOGIN_FAILED {
                ProbeErrorKind::AuthFailed
            } else {
                ProbeErrorKind::Other
            };
            ProbeError::new(kind, token.message().to_string())
        }
        TdsError::Protocol(_)
        | TdsError::Encoding(_)
        | TdsError::Conversion(_)
        | TdsError::Utf8
        | TdsError::Utf16
        | TdsError::ParseInt(_) => ProbeError::malformed(err.to_string()),
        TdsError::Tls(_) => ProbeError::unreachable(err.to_string()),
        _ => ProbeError::other(err.to_string()),
    }
}
