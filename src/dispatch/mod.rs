use crate::cli::{ParsedInvocation, ServiceSelection};
use crate::error::{ParseError, ProbeError};
use crate::output::Report;
use crate::services::{ProbeContext, ProbeRegistry, ServiceType};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

/// Turns the raw argument list into exactly one probe run and its report.
/// Every path ends in a `Report`; nothing is propagated to the caller.
pub struct Dispatcher<R: ProbeRegistry> {
    registry: R,
    context: ProbeContext,
}

impl<R: ProbeRegistry> Dispatcher<R> {
    pub fn new(registry: R, context: ProbeContext) -> Self {
        Self { registry, context }
    }

    pub async fn dispatch(&self, args: &[String]) -> Report {
        let invocation = match ParsedInvocation::parse(args) {
            Ok(invocation) => invocation,
            Err(ParseError::MissingPositional) => {
                debug!(count = args.len(), "missing positional arguments");
                return Report::Usage;
            }
            Err(err) => {
                warn!(error = %err, "could not parse arguments");
                return Report::InvalidArguments(err);
            }
        };

        match invocation.service {
            ServiceSelection::Supported(service) => self.run_probe(service, &invocation).await,
            ServiceSelection::Unsupported(ref token) => {
                warn!(token = %token, "unsupported service type");
                Report::Unsupported(token.clone())
            }
        }
    }

    async fn run_probe(&self, service: ServiceType, invocation: &ParsedInvocation) -> Report {
        let probe = self.registry.probe_for(service);
        let filters = service.accepts_filters().then(|| invocation.filters.clone());
        if let Some(filters) = &filters {
            debug!(key_filter = %filters.key_filter, label_filter = %filters.label_filter, "using filters");
        }

        let spinner = self.spinner(service);
        info!(service = %service, "running probe");
        let target = invocation.target.clone();
        let context = self.context.clone();
        // A panicking client library ends up as a failure report too
        let task = tokio::spawn(async move { probe.run(&target, filters.as_ref(), &context).await });
        let result = task.await.unwrap_or_else(|err| Err(task_error(err)));
        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }

        match result {
            Ok(outcome) => Report::Success { service, outcome },
            Err(error) => {
                warn!(service = %service, kind = %error.kind, "probe failed");
                Report::Failure { service, error }
            }
        }
    }

    fn spinner(&self, service: ServiceType) -> Option<ProgressBar> {
        if self.context.quiet || service.is_interactive() {
            return None;
        }
        let spinner = ProgressBar::new_spinner();
        if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            spinner.set_style(template);
        }
        spinner.set_message(format!("Connecting to {}...", service.display_name()));
        spinner.enable_steady_tick(Duration::from_millis(100));
        Some(spinner)
    }
}

fn task_error(err: JoinError) -> ProbeError {
    if !err.is_panic() {
        return ProbeError::other("Connection check was cancelled");
    }
    let payload = err.into_panic();
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    ProbeError::other(format!("Client library panicked: {}", detail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::FilterSet;
    use crate::error::ProbeErrorKind;
    use crate::services::{Probe, ProbeResult, ProbeSuccess};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    struct Call {
        service: ServiceType,
        target: String,
        filters: Option<FilterSet>,
    }

    /// Registry whose probes record their calls and return a canned result
    #[derive(Clone)]
    struct FakeRegistry {
        calls: Arc<Mutex<Vec<Call>>>,
        result: ProbeResult,
    }

    impl FakeRegistry {
        fn returning(result: ProbeResult) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                result,
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    struct FakeProbe {
        service: ServiceType,
        registry: FakeRegistry,
    }

    #[async_trait]
    impl Probe for FakeProbe {
        fn service(&self) -> ServiceType {
            self.service
        }

        async fn run(&self, target: &str, filters: Option<&FilterSet>, _context: &ProbeContext) -> ProbeResult {
            self.registry.calls.lock().unwrap().push(Call {
                service: self.service,
                target: target.to_string(),
                filters: filters.cloned(),
            });
            self.registry.result.clone()
        }
    }

    impl ProbeRegistry for FakeRegistry {
        fn probe_for(&self, service: ServiceType) -> Box<dyn Probe> {
            Box::new(FakeProbe {
                service,
                registry: self.clone(),
            })
        }
    }

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn dispatcher(registry: &FakeRegistry) -> Dispatcher<FakeRegistry> {
        Dispatcher::new(registry.clone(), ProbeContext::default())
    }

    #[tokio::test]
    async fn test_missing_positionals_print_usage() {
        let registry = FakeRegistry::returning(Ok(ProbeSuccess::Connected));
        for raw in [&[][..], &["sql"][..], &["redis", "--key-filter", "x"][..]] {
            let report = dispatcher(&registry).dispatch(&args(raw)).await;
            assert_eq!(report, Report::Usage);
        }
        assert!(registry.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_service_runs_no_probe() {
        let registry = FakeRegistry::returning(Ok(ProbeSuccess::Connected));
        let report = dispatcher(&registry)
            .dispatch(&args(&["Postgres", "host=db"]))
            .await;
        assert_eq!(report, Report::Unsupported("postgres".to_string()));
        assert_eq!(report.lines(), vec!["Unsupported database type postgres"]);
        assert!(registry.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unterminated_quote_runs_no_probe() {
        let registry = FakeRegistry::returning(Ok(ProbeSuccess::Connected));
        let report = dispatcher(&registry)
            .dispatch(&args(&["sql", "\"Server=db;", "Database=x"]))
            .await;
        assert_eq!(
            report,
            Report::InvalidArguments(ParseError::UnterminatedQuote { start: 1 })
        );
        assert!(registry.calls().is_empty());
    }

    #[tokio::test]
    async fn test_runs_exactly_one_probe() {
        let registry = FakeRegistry::returning(Ok(ProbeSuccess::Connected));
        let report = dispatcher(&registry)
            .dispatch(&args(&["REDIS", "\"cache:6379,", "ssl=false\""]))
            .await;

        assert_eq!(
            report,
            Report::Success {
                service: ServiceType::Redis,
                outcome: ProbeSuccess::Connected
            }
        );
        assert_eq!(
            registry.calls(),
            vec![Call {
                service: ServiceType::Redis,
                target: "cache:6379, ssl=false".to_string(),
                filters: None,
            }]
        );
    }

    #[tokio::test]
    async fn test_only_appconfig_gets_filters() {
        let registry = FakeRegistry::returning(Ok(ProbeSuccess::Connected));
        dispatcher(&registry)
            .dispatch(&args(&["appconfig", "Endpoint=x", "--bogus", "--label-filter", "\"blue", "green\""]))
            .await;
        dispatcher(&registry)
            .dispatch(&args(&["mongo", "mongodb://x", "--key-filter", "a"]))
            .await;

        let calls = registry.calls();
        assert_eq!(calls.len(), 2);
        let filters = calls[0].filters.clone().unwrap();
        assert_eq!(filters.key_filter, "*");
        assert_eq!(filters.label_filter, "blue green");
        assert_eq!(calls[1].filters, None);
    }

    #[tokio::test]
    async fn test_probe_error_becomes_failure_report() {
        let registry = FakeRegistry::returning(Err(ProbeError::new(
            ProbeErrorKind::AuthFailed,
            "Login failed for user 'sa'.",
        )));
        let report = dispatcher(&registry)
            .dispatch(&args(&["sql", "Server=db"]))
            .await;

        assert_eq!(
            report.lines(),
            vec!["An error occurred while connecting to SQL Server: Login failed for user 'sa'."]
        );
        assert_eq!(report.exit_code(), crate::error::ExitCode::AuthFailure);
    }

    struct PanickingProbe;

    #[async_trait]
    impl Probe for PanickingProbe {
        fn service(&self) -> ServiceType {
            ServiceType::Mongo
        }

        async fn run(&self, _target: &str, _filters: Option<&FilterSet>, _context: &ProbeContext) -> ProbeResult {
            panic!("driver state corrupted")
        }
    }

    struct PanickingRegistry;

    impl ProbeRegistry for PanickingRegistry {
        fn probe_for(&self, _service: ServiceType) -> Box<dyn Probe> {
            Box::new(PanickingProbe)
        }
    }

    #[tokio::test]
    async fn test_client_panic_becomes_failure_report() {
        let report = Dispatcher::new(PanickingRegistry, ProbeContext::default())
            .dispatch(&args(&["mongo", "mongodb://db"]))
            .await;

        match &report {
            Report::Failure { service, error } => {
                assert_eq!(*service, ServiceType::Mongo);
                assert_eq!(error.kind, ProbeErrorKind::Other);
                assert!(error.message.contains("driver state corrupted"));
            }
            other => panic!("expected failure report, got {:?}", other),
        }
        assert_eq!(report.exit_code(), crate::error::ExitCode::ProbeFailure);
    }
}
