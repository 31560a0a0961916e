use clap::Parser;
use console::style;
use service_tester::{
    cli::Cli,
    config::{validate_config, Config},
    error::ExitCode,
    output::HumanFormatter,
    services::{BuiltinProbes, ProbeContext},
    Dispatcher,
};
use std::process::ExitCode as StdExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> StdExitCode {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            e.exit_code()
        }
    };

    StdExitCode::from(exit_code as u8)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> service_tester::Result<ExitCode> {
    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };

    config.apply_env_overrides()?;
    if let Some(timeout) = cli.timeout {
        config.global.timeout_seconds = timeout;
    }
    if let Some(cloud) = cli.cloud {
        config.global.cloud = cloud;
    }
    if let Some(tenant_id) = cli.tenant_id {
        config.auth.tenant_id = tenant_id;
    }
    validate_config(&config)?;
    debug!(config = %config.to_toml()?, "effective configuration");

    let context = ProbeContext::from_config(&config, cli.quiet);
    let dispatcher = Dispatcher::new(BuiltinProbes, context);
    let report = dispatcher.dispatch(&cli.args).await;

    let formatter = HumanFormatter::new(console::colors_enabled());
    print!("{}", formatter.format(&report));

    Ok(report.exit_code())
}
