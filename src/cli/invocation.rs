use super::options::{extract_options, FilterSet, OptionSet};
use super::tokenizer::{read_value, ValueRead};
use crate::error::ParseError;
use crate::services::ServiceType;

/// Service selector token, resolved case-insensitively
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceSelection {
    Supported(ServiceType),
    Unsupported(String),
}

impl ServiceSelection {
    /// Unsupported tokens are kept lowercased, as they are reported
    pub fn from_token(token: &str) -> Self {
        match ServiceType::from_id(token) {
            Some(service) => ServiceSelection::Supported(service),
            None => ServiceSelection::Unsupported(token.to_lowercase()),
        }
    }
}

/// Everything one run needs, built once from the raw arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInvocation {
    pub service: ServiceSelection,
    pub target: String,
    pub options: OptionSet,
    pub filters: FilterSet,
}

impl ParsedInvocation {
    pub fn parse(args: &[String]) -> Result<Self, ParseError> {
        let (service_token, next) = positional(args, 0)?;
        let (target, next) = positional(args, next)?;
        let options = extract_options(args, next)?;
        let filters = FilterSet::from_options(&options);

        Ok(Self {
            service: ServiceSelection::from_token(&service_token),
            target,
            options,
            filters,
        })
    }
}

fn positional(args: &[String], at: usize) -> Result<(String, usize), ParseError> {
    match read_value(args, at)? {
        ValueRead::Value { value, next } => Ok((value, next)),
        ValueRead::Option | ValueRead::End => Err(ParseError::MissingPositional),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::options::{KEY_FILTER, WILDCARD};

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_quoted_target_then_flags() {
        let parsed =
            ParsedInvocation::parse(&args(&["appconfig", "\"a", "b", "c\"", "--key-filter", "x"]))
                .unwrap();
        assert_eq!(parsed.service, ServiceSelection::Supported(ServiceType::AppConfig));
        assert_eq!(parsed.target, "a b c");
        assert_eq!(parsed.options.get(KEY_FILTER), Some("x"));
        assert_eq!(parsed.filters.key_filter, "x");
        assert_eq!(parsed.filters.label_filter, WILDCARD);
    }

    #[test]
    fn test_service_type_is_case_insensitive() {
        let parsed = ParsedInvocation::parse(&args(&["KeyVault", "https://v.vault.azure.net"])).unwrap();
        assert_eq!(parsed.service, ServiceSelection::Supported(ServiceType::KeyVault));
    }

    #[test]
    fn test_unsupported_service_is_lowercased() {
        let parsed = ParsedInvocation::parse(&args(&["PostgreSQL", "host=x"])).unwrap();
        assert_eq!(parsed.service, ServiceSelection::Unsupported("postgresql".to_string()));
    }

    #[test]
    fn test_missing_positionals() {
        assert_eq!(ParsedInvocation::parse(&[]), Err(ParseError::MissingPositional));
        assert_eq!(ParsedInvocation::parse(&args(&["sql"])), Err(ParseError::MissingPositional));
        assert_eq!(
            ParsedInvocation::parse(&args(&["sql", "--key-filter", "x"])),
            Err(ParseError::MissingPositional)
        );
    }

    #[test]
    fn test_unterminated_quote_after_target() {
        assert_eq!(
            ParsedInvocation::parse(&args(&["sql", "Server=x", "\"note", "text"])),
            Err(ParseError::UnterminatedQuote { start: 2 })
        );
    }

    #[test]
    fn test_unterminated_target() {
        assert_eq!(
            ParsedInvocation::parse(&args(&["sql", "\"Server=x;", "User Id=sa"])),
            Err(ParseError::UnterminatedQuote { start: 1 })
        );
    }
}
