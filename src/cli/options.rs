use std::collections::BTreeMap;

use tracing::debug;

use super::tokenizer::{read_value, ValueRead, OPTION_PREFIX};
use crate::error::ParseError;

pub const KEY_FILTER: &str = "key-filter";
pub const LABEL_FILTER: &str = "label-filter";

/// Option names the tool consumes
pub const KNOWN_OPTIONS: [&str; 2] = [KEY_FILTER, LABEL_FILTER];

/// Match-everything filter value
pub const WILDCARD: &str = "*";

/// Named options keyed by name without the `--` prefix. Last writer wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet {
    values: BTreeMap<String, String>,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Names that no consumer reads
    pub fn unknown(&self) -> impl Iterator<Item = &str> {
        self.values
            .keys()
            .map(String::as_str)
            .filter(|name| !KNOWN_OPTIONS.contains(name))
    }
}

/// Scan `args` from `start` and collect every `--name value` pair.
///
/// Stray values are read like any other value (so quotes are honored) and
/// skipped. A flag with no value after it (end of input, or
/// another flag) is dropped.
pub fn extract_options(args: &[String], start: usize) -> Result<OptionSet, ParseError> {
    let mut options = OptionSet::new();
    let mut i = start;

    while let Some(token) = args.get(i) {
        let name = match token.strip_prefix(OPTION_PREFIX) {
            Some(name) if !name.is_empty() => name,
            _ => {
                match read_value(args, i)? {
                    ValueRead::Value { value, next } => {
                        debug!(value = %value, "skipping stray argument");
                        i = next;
                    }
                    ValueRead::Option => i += 1,
                    ValueRead::End => break,
                }
                continue;
            }
        };

        match read_value(args, i + 1)? {
            ValueRead::Value { value, next } => {
                options.insert(name, value);
                i = next;
            }
            ValueRead::Option => {
                debug!(option = name, "option has no value, dropping it");
                i += 1;
            }
            ValueRead::End => {
                debug!(option = name, "trailing option has no value, dropping it");
                break;
            }
        }
    }

    for name in options.unknown() {
        debug!(option = name, "ignoring unrecognized option");
    }

    Ok(options)
}

/// Key and label filters handed to the App Configuration probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSet {
    pub key_filter: String,
    pub label_filter: String,
}

impl FilterSet {
    /// The only place the wildcard default is applied
    pub fn from_options(options: &OptionSet) -> Self {
        Self {
            key_filter: options.get(KEY_FILTER).unwrap_or(WILDCARD).to_string(),
            label_filter: options.get(LABEL_FILTER).unwrap_or(WILDCARD).to_string(),
        }
    }

    pub fn is_default(&self) -> bool {
        self.key_filter == WILDCARD && self.label_filter == WILDCARD
    }
}

impl Default for FilterSet {
    fn default() -> Self {
        Self::from_options(&OptionSet::new())
    }
}
