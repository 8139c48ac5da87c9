// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::str::FromStr;

use serde::Deserialize;

use crate::sampling::TracingMode;

/// One entry of the `SWO_TRANSACTION_SETTINGS` JSON array, as written by the user
///
/// ```json
/// [
///   {"type": "url", "regex": "^/health", "tracing": "disabled"},
///   {"type": "url", "extensions": ["png", "css"], "tracing": "disabled"}
/// ]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransactionFilterConfig {
    #[serde(rename = "type")]
    pub filter_type: String,
    #[serde(default)]
    pub regex: Option<String>,
    #[serde(default)]
    pub extensions: Option<Vec<String>>,
    pub tracing: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionFilterError {
    #[error("invalid transaction filter type {0:?}, only \"url\" is supported")]
    InvalidType(String),
    #[error("a transaction filter must set only one of regex and extensions")]
    RegexAndExtensions,
    #[error("a transaction filter must set one of regex and extensions")]
    MissingMatcher,
    #[error("invalid transaction filter tracing mode {0:?}")]
    InvalidTracing(String),
}

/// How a filter recognizes a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlMatcher {
    Regex(String),
    Extensions(Vec<String>),
}

/// A validated transaction filter. Regular expressions are compiled by the
/// consumer, so an invalid pattern only surfaces there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionFilterRule {
    pub matcher: UrlMatcher,
    pub tracing: TracingMode,
}

impl TryFrom<TransactionFilterConfig> for TransactionFilterRule {
    type Error = TransactionFilterError;

    fn try_from(config: TransactionFilterConfig) -> Result<Self, Self::Error> {
        if config.filter_type != "url" {
            return Err(TransactionFilterError::InvalidType(config.filter_type));
        }
        let tracing = match config.tracing.as_str() {
            "enabled" => TracingMode::Enabled,
            "disabled" => TracingMode::Disabled,
            _ => return Err(TransactionFilterError::InvalidTracing(config.tracing)),
        };
        let matcher = match (config.regex, config.extensions) {
            (Some(_), Some(_)) => return Err(TransactionFilterError::RegexAndExtensions),
            (Some(regex), None) => UrlMatcher::Regex(regex),
            (None, Some(extensions)) => UrlMatcher::Extensions(extensions),
            (None, None) => return Err(TransactionFilterError::MissingMatcher),
        };
        Ok(TransactionFilterRule { matcher, tracing })
    }
}

/// Parsed value of `SWO_TRANSACTION_SETTINGS`
pub(crate) struct TransactionSettings(pub(crate) Vec<TransactionFilterConfig>);

impl FromStr for TransactionSettings {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
            .map(TransactionSettings)
            .map_err(|e| e.to_string())
    }
}

impl TransactionSettings {
    /// Validates every entry, dropping the invalid ones with a warning
    pub(crate) fn into_rules(self) -> Vec<TransactionFilterRule> {
        self.0
            .into_iter()
            .filter_map(|config| match TransactionFilterRule::try_from(config) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    crate::apm_warn!("Ignoring transaction filter: {}", e);
                    None
                }
            })
            .collect()
    }
}
