pub mod invocation;
pub mod options;
pub mod tokenizer;

use crate::config::Cloud;
use clap::Parser;
use std::path::PathBuf;

pub use invocation::{ParsedInvocation, ServiceSelection};
pub use options::{FilterSet, OptionSet};

/// Verify connectivity to a database, cache or Azure configuration service
///
/// Global flags go before the service type. Everything from the service type
/// on is read by the service-tester argument reader, which stitches quoted
/// values back together and ignores flags it does not know.
#[derive(Parser, Debug)]
#[command(name = "service-tester")]
#[command(author, version, about, long_about = None)]
#[command(override_usage = "service-tester [OPTIONS] <service_type> <connection_string> [--key-filter <filter>] [--label-filter <filter>]")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "SERVICE_TESTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Probe timeout in seconds
    #[arg(long, env = "SERVICE_TESTER_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Azure cloud used for Key Vault sign-in (global, china)
    #[arg(long)]
    pub cloud: Option<Cloud>,

    /// Entra ID tenant for Key Vault sign-in
    #[arg(long)]
    pub tenant_id: Option<String>,

    /// Enable verbose output
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Suppress progress indicators
    #[arg(short, long, default_value_t = false)]
    pub quiet: bool,

    /// <service_type> <connection_string> [--key-filter <filter>] [--label-filter <filter>]
    #[arg(
        value_name = "ARGS",
        num_args = 0..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub args: Vec<String>,
}
