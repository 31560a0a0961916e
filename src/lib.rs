//! Service Connectivity Testing Tool
//!
//! A CLI tool to check that a database, cache or Azure configuration service
//! is reachable with a given connection string.
//!
//! # Supported Services
//!
//! - **sql** - SQL Server, opens a session from an ADO.NET connection string
//! - **mongo** - MongoDB, lists databases
//! - **redis** - Redis, sends `PING`
//! - **appconfig** - Azure App Configuration, lists key-values by key/label filter
//! - **keyvault** - Azure Key Vault, counts secrets after a device code sign-in
//!
//! # Example Usage
//!
//! ```bash
//! service-tester sql "Server=tcp:db.example.com,1433;User Id=sa;Password=..."
//! service-tester redis "contoso.redis.cache.windows.net:6380,password=...,ssl=True"
//! service-tester appconfig "Endpoint=https://contoso.azconfig.io;Id=...;Secret=..." --label-filter prod
//! service-tester --tenant-id contoso keyvault https://contoso.vault.azure.net
//! ```

pub mod auth;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod network;
pub mod output;
pub mod services;

pub use cli::{Cli, FilterSet, OptionSet, ParsedInvocation, ServiceSelection};
pub use config::{Cloud, Config};
pub use dispatch::Dispatcher;
pub use error::{AppError, ExitCode, ProbeError, ProbeErrorKind, Result};
pub use output::{HumanFormatter, Report};
pub use services::{BuiltinProbes, Probe, ProbeContext, ProbeRegistry, ProbeSuccess, ServiceType};
