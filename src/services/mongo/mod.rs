use async_trait::async_trait;
use mongodb::error::{Error as MongoError, ErrorKind};
use mongodb::options::ClientOptions;
use mongodb::Client;
use tracing::debug;

use crate::cli::FilterSet;
use crate::error::{ProbeError, ProbeErrorKind};
use crate::network::{io_error_kind, with_timeout};
use crate::services::{Probe, ProbeContext, ProbeResult, ProbeSuccess, ServiceType};

/// MongoDB server error codes that mean bad credentials or missing rights
const AUTH_ERROR_CODES: [i32; 2] = [13, 18];

/// Lists databases to prove the connection and credentials work
pub struct MongoProbe;

impl MongoProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MongoProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for MongoProbe {
    fn service(&self) -> ServiceType {
        ServiceType::Mongo
    }

    async fn run(
        &self,
        target: &str,
        _filters: Option<&FilterSet>,
        context: &ProbeContext,
    ) -> ProbeResult {
        let names = with_timeout(context.timeout, list_databases(target, context)).await?;
        debug!(count = names.len(), "listed MongoDB databases");
        Ok(ProbeSuccess::Databases(names))
    }
}

async fn list_databases(target: &str, context: &ProbeContext) -> Result<Vec<String>, ProbeError> {
    let mut options = ClientOptions::parse(target).await.map_err(map_error)?;
    options.app_name = Some("service-tester".to_string());
    options.server_selection_timeout = Some(context.timeout);
    options.connect_timeout = Some(context.timeout);

    let client = Client::with_options(options).map_err(map_error)?;
    client
        .list_database_names(None, None)
        .await
        .map_err(map_error)
}

fn map_error(err: MongoError) -> ProbeError {
    let kind = match err.kind.as_ref() {
        ErrorKind::Authentication { .. } => ProbeErrorKind::AuthFailed,
        ErrorKind::Command(command) if AUTH_ERROR_CODES.contains(&command.code) => {
            ProbeErrorKind::AuthFailed
        }
        ErrorKind::Io(io) => io_error_kind(io.kind()),
        ErrorKind::ServerSelection { .. }
        | ErrorKind::DnsResolve { .. }
        | ErrorKind::ConnectionPoolCleared { .. } => ProbeErrorKind::Unreachable,
        ErrorKind::InvalidResponse { .. } | ErrorKind::BsonDeserialization(_) => {
            ProbeErrorKind::MalformedResponse
        }
        _ => ProbeErrorKind::Other,
    };
    ProbeError::new(kind, err.to_string())
}
