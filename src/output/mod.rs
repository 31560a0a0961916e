use crate::cli::FilterSet;
use crate::error::{ExitCode, ParseError, ProbeError};
use crate::services::{supported_ids, ConfigSetting, ProbeSuccess, ServiceType};
use console::style;

/// Label shown for settings without one
pub const EMPTY_LABEL: &str = "<EMPTY>";

/// Outcome of one run, ready to print
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Usage,
    Unsupported(String),
    InvalidArguments(ParseError),
    Success {
        service: ServiceType,
        outcome: ProbeSuccess,
    },
    Failure {
        service: ServiceType,
        error: ProbeError,
    },
}

impl Report {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Report::Usage | Report::Success { .. } => ExitCode::Success,
            Report::Unsupported(_) | Report::InvalidArguments(_) => ExitCode::InvalidInput,
            Report::Failure { error, .. } => error.kind.exit_code(),
        }
    }

    /// Plain report lines, without styling
    pub fn lines(&self) -> Vec<String> {
        match self {
            Report::Usage => vec![
                "Usage: service-tester <service_type> <connection_string> [--key-filter <filter>] [--label-filter <filter>]".to_string(),
                format!("Service types: {}", supported_ids()),
            ],
            Report::Unsupported(token) => vec![format!("Unsupported database type {}", token)],
            Report::InvalidArguments(err) => vec![format!("Invalid arguments: {}", err)],
            Report::Success { service, outcome } => success_lines(*service, outcome),
            Report::Failure { service, error } => vec![format!(
                "An error occurred while connecting to {}: {}",
                service.display_name(),
                error.message
            )],
        }
    }
}

fn success_lines(service: ServiceType, outcome: &ProbeSuccess) -> Vec<String> {
    let name = service.display_name();
    match outcome {
        ProbeSuccess::Connected => vec![format!("Connection to {} established successfully.", name)],
        ProbeSuccess::Databases(names) => {
            let mut lines = vec![format!(
                "Connection to {} established successfully. Databases:",
                name
            )];
            lines.extend(names.iter().map(|db| format!(" - {}", db)));
            lines
        }
        ProbeSuccess::Secrets { count } => vec![format!(
            "Connection to {} established successfully. Found {} properties of secrets.",
            name, count
        )],
        ProbeSuccess::Settings { settings, filters } => settings_lines(name, settings, filters),
    }
}

fn settings_lines(name: &str, settings: &[ConfigSetting], filters: &FilterSet) -> Vec<String> {
    if settings.is_empty() {
        return vec![format!(
            "Connection to {} established successfully, but found no configs matching key filter '{}' and label filter '{}'.",
            name, filters.key_filter, filters.label_filter
        )];
    }

    if filters.is_default() {
        return vec![format!(
            "Connection to {} established successfully. Found {} config settings and the following labels: {}",
            name,
            settings.len(),
            distinct_labels(settings).join(", ")
        )];
    }

    let mut lines = vec![format!(
        "Connection to {} established successfully. Found {} config settings matching key filter '{}' and label filter '{}':",
        name,
        settings.len(),
        filters.key_filter,
        filters.label_filter
    )];
    lines.extend(settings.iter().map(|s| {
        format!(
            "Key: {}, Value: {}, Label: {}",
            s.key,
            s.value.as_deref().unwrap_or_default(),
            s.label.as_deref().unwrap_or_default()
        )
    }));
    lines
}

/// Labels in first-seen order, with the empty label shown as `<EMPTY>`
pub fn distinct_labels(settings: &[ConfigSetting]) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for setting in settings {
        let label = match setting.label.as_deref() {
            None | Some("") => EMPTY_LABEL,
            Some(label) => label,
        };
        if !labels.iter().any(|seen| seen == label) {
            labels.push(label.to_string());
        }
    }
    labels
}

/// Human-readable console formatter
pub struct HumanFormatter {
    use_colors: bool,
}

impl HumanFormatter {
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    pub fn format(&self, report: &Report) -> String {
        let mut output = String::new();
        for (i, line) in report.lines().into_iter().enumerate() {
            if self.use_colors && i == 0 {
                let styled = match report {
                    Report::Success { .. } => style(line).green(),
                    Report::Failure { .. } => style(line).red(),
                    Report::Usage => style(line).bold(),
                    Report::Unsupported(_) | Report::InvalidArguments(_) => style(line).yellow(),
                };
                output.push_str(&styled.to_string());
            } else {
                output.push_str(&line);
            }
            output.push('\n');
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::options::{OptionSet, KEY_FILTER};

    fn setting(key: &str, value: &str, label: Option<&str>) -> ConfigSetting {
        ConfigSetting {
            key: key.to_string(),
            value: Some(value.to_string()),
            label: label.map(str::to_string),
        }
    }

    fn key_filter(value: &str) -> FilterSet {
        let mut options = OptionSet::new();
        options.insert(KEY_FILTER, value);
        FilterSet::from_options(&options)
    }

    #[test]
    fn test_usage_lists_service_types() {
        let lines = Report::Usage.lines();
        assert!(lines[0].starts_with("Usage: service-tester <service_type> <connection_string>"));
        assert_eq!(lines[1], "Service types: sql, mongo, redis, appconfig, keyvault");
        assert_eq!(Report::Usage.exit_code(), ExitCode::Success);
    }

    #[test]
    fn test_connected_lines() {
        let report = Report::Success {
            service: ServiceType::Sql,
            outcome: ProbeSuccess::Connected,
        };
        assert_eq!(report.lines(), vec!["Connection to SQL Server established successfully."]);

        let report = Report::Success {
            service: ServiceType::Redis,
            outcome: ProbeSuccess::Connected,
        };
        assert_eq!(report.lines(), vec!["Connection to Redis established successfully."]);
    }

    #[test]
    fn test_mongo_lines() {
        let report = Report::Success {
            service: ServiceType::Mongo,
            outcome: ProbeSuccess::Databases(vec!["admin".to_string(), "orders".to_string()]),
        };
        assert_eq!(
            report.lines(),
            vec![
                "Connection to MongoDB established successfully. Databases:",
                " - admin",
                " - orders"
            ]
        );
    }

    #[test]
    fn test_key_vault_line() {
        let report = Report::Success {
            service: ServiceType::KeyVault,
            outcome: ProbeSuccess::Secrets { count: 4 },
        };
        assert_eq!(
            report.lines(),
            vec!["Connection to Azure Key Vault established successfully. Found 4 properties of secrets."]
        );
    }

    #[test]
    fn test_appconfig_summary_with_default_filters() {
        let report = Report::Success {
            service: ServiceType::AppConfig,
            outcome: ProbeSuccess::Settings {
                settings: vec![
                    setting("a", "1", Some("")),
                    setting("b", "2", Some("prod")),
                    setting("c", "3", Some("prod")),
                ],
                filters: FilterSet::default(),
            },
        };
        assert_eq!(
            report.lines(),
            vec!["Connection to Azure App Configuration established successfully. Found 3 config settings and the following labels: <EMPTY>, prod"]
        );
    }

    #[test]
    fn test_appconfig_listing_with_key_filter() {
        let report = Report::Success {
            service: ServiceType::AppConfig,
            outcome: ProbeSuccess::Settings {
                settings: vec![setting("app:color", "blue", None), setting("app:size", "xl", Some("prod"))],
                filters: key_filter("app:*"),
            },
        };
        let lines = report.lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("Found 2 config settings matching key filter 'app:*' and label filter '*'"));
        assert_eq!(lines[1], "Key: app:color, Value: blue, Label: ");
        assert_eq!(lines[2], "Key: app:size, Value: xl, Label: prod");
    }

    #[test]
    fn test_appconfig_no_matches() {
        let report = Report::Success {
            service: ServiceType::AppConfig,
            outcome: ProbeSuccess::Settings {
                settings: vec![],
                filters: key_filter("missing:*"),
            },
        };
        let lines = report.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("found no configs"));
        assert!(!lines[0].contains("Key:"));
    }

    #[test]
    fn test_failure_line() {
        let report = Report::Failure {
            service: ServiceType::Mongo,
            error: ProbeError::unreachable("Server selection timeout"),
        };
        assert_eq!(
            report.lines(),
            vec!["An error occurred while connecting to MongoDB: Server selection timeout"]
        );
        assert_eq!(report.exit_code(), ExitCode::NetworkFailure);
    }

    #[test]
    fn test_unsupported_line() {
        let report = Report::Unsupported("postgres".to_string());
        assert_eq!(report.lines(), vec!["Unsupported database type postgres"]);
        assert_eq!(report.exit_code(), ExitCode::InvalidInput);
    }

    #[test]
    fn test_distinct_labels_treats_missing_as_empty() {
        let labels = distinct_labels(&[
            setting("a", "1", None),
            setting("b", "2", Some("")),
            setting("c", "3", Some("dev")),
        ]);
        assert_eq!(labels, vec![EMPTY_LABEL, "dev"]);
    }

    #[test]
    fn test_plain_formatter_output() {
        let formatter = HumanFormatter::new(false);
        assert_eq!(
            formatter.format(&Report::Unsupported("x".to_string())),
            "Unsupported database type x\n"
        );
    }
}
