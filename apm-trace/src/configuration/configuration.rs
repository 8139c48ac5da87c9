// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{str::FromStr, time::Duration};

use super::sources::{CompositeConfigSourceResult, CompositeSource};
use super::supported_configurations::SupportedConfigurations;
use super::transaction_settings::{TransactionFilterRule, TransactionSettings};
use crate::constants::{interval, rate::MAX_SAMPLE_RATE};
use crate::log::LevelFilter;
use crate::sampling::{clamp_sample_rate, TracingMode};

/// The part of the configuration the sampling decision reads on every call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalSamplingConfig {
    pub tracing_mode: TracingMode,
    /// Parts per million. `1_000_000` when not configured.
    pub sample_rate: u32,
    pub tracing_mode_configured: bool,
    pub sample_rate_configured: bool,
}

impl LocalSamplingConfig {
    /// Local settings take precedence over remote ones once either the mode or
    /// the rate was set by the user
    pub fn is_configured(&self) -> bool {
        self.tracing_mode_configured || self.sample_rate_configured
    }
}

#[derive(Debug, Clone)]
#[non_exhaustive]
/// Configuration for the APM agent
///
/// # Usage
/// ```
/// use apm_trace::{sampling::TracingMode, Config};
///
/// // This pulls configuration from the environment
/// let mut builder = Config::builder();
///
/// // Manual overrides
/// builder
///     .set_tracing_mode(TracingMode::Enabled)
///     .set_sample_rate(10_000);
///
/// let config = builder.build();
/// assert!(config.local_sampling().sample_rate_configured);
/// ```
pub struct Config {
    // # Sampling
    tracing_mode: TracingMode,
    tracing_mode_configured: bool,
    sample_rate: u32,
    sample_rate_configured: bool,
    trigger_trace_enabled: bool,
    /// Validated `SWO_TRANSACTION_SETTINGS` entries, in evaluation order
    transaction_filters: Vec<TransactionFilterRule>,

    // # Workers
    /// How often expired remote settings are removed
    settings_timeout_check_interval: Duration,
    /// How often bucket counters are flushed
    metrics_flush_interval: Duration,

    log_level: LevelFilter,
}

/// Sample rate in parts per million, clamped instead of rejected
#[derive(Debug, PartialEq)]
pub(crate) struct SampleRate(pub(crate) u32);

impl FromStr for SampleRate {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(|r| SampleRate(clamp_sample_rate(r)))
    }
}

/// `enabled`/`disabled`, also accepting booleans
#[derive(Debug, PartialEq)]
pub(crate) struct Toggle(pub(crate) bool);

impl FromStr for Toggle {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("enabled") || s.eq_ignore_ascii_case("true") {
            Ok(Toggle(true))
        } else if s.eq_ignore_ascii_case("disabled") || s.eq_ignore_ascii_case("false") {
            Ok(Toggle(false))
        } else {
            Err("expected one of enabled, disabled")
        }
    }
}

/// A strictly positive number of seconds
#[derive(Debug, PartialEq)]
pub(crate) struct Seconds(pub(crate) Duration);

impl FromStr for Seconds {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<u64>() {
            Ok(0) => Err("interval must be greater than zero"),
            Ok(secs) => Ok(Seconds(Duration::from_secs(secs))),
            Err(_) => Err("interval must be a number of seconds"),
        }
    }
}

impl Config {
    fn from_sources(sources: &CompositeSource) -> Self {
        let default = Config::default();

        fn to_val<T>(res: CompositeConfigSourceResult<T>) -> Option<T> {
            res.into_value()
        }

        let tracing_mode =
            to_val(sources.get_parse::<TracingMode>(SupportedConfigurations::SWO_TRACING_MODE));
        let sample_rate =
            to_val(sources.get_parse::<SampleRate>(SupportedConfigurations::SWO_SAMPLE_RATE));

        Self {
            tracing_mode_configured: tracing_mode.is_some(),
            tracing_mode: tracing_mode.unwrap_or(default.tracing_mode),
            sample_rate_configured: sample_rate.is_some(),
            sample_rate: sample_rate
                .map(|SampleRate(r)| r)
                .unwrap_or(default.sample_rate),
            trigger_trace_enabled: to_val(
                sources.get_parse::<Toggle>(SupportedConfigurations::SWO_TRIGGER_TRACE),
            )
            .map(|Toggle(t)| t)
            .unwrap_or(default.trigger_trace_enabled),
            transaction_filters: to_val(
                sources.get_parse::<TransactionSettings>(
                    SupportedConfigurations::SWO_TRANSACTION_SETTINGS,
                ),
            )
            .map(TransactionSettings::into_rules)
            .unwrap_or(default.transaction_filters),
            settings_timeout_check_interval: to_val(sources.get_parse::<Seconds>(
                SupportedConfigurations::SWO_SETTINGS_TIMEOUT_CHECK_INTERVAL,
            ))
            .map(|Seconds(d)| d)
            .unwrap_or(default.settings_timeout_check_interval),
            metrics_flush_interval: to_val(
                sources.get_parse::<Seconds>(SupportedConfigurations::SWO_METRICS_FLUSH_INTERVAL),
            )
            .map(|Seconds(d)| d)
            .unwrap_or(default.metrics_flush_interval),
            log_level: to_val(sources.get_parse(SupportedConfigurations::SWO_DEBUG_LEVEL))
                .unwrap_or(default.log_level),
        }
    }

    fn builder_with_sources(sources: &CompositeSource) -> ConfigBuilder {
        ConfigBuilder {
            config: Config::from_sources(sources),
        }
    }

    /// Creates a new builder seeded from the environment
    pub fn builder() -> ConfigBuilder {
        Self::builder_with_sources(&CompositeSource::default_sources())
    }

    /// Snapshot of the local sampling directives
    pub fn local_sampling(&self) -> LocalSamplingConfig {
        LocalSamplingConfig {
            tracing_mode: self.tracing_mode,
            sample_rate: self.sample_rate,
            tracing_mode_configured: self.tracing_mode_configured,
            sample_rate_configured: self.sample_rate_configured,
        }
    }

    pub fn tracing_mode(&self) -> TracingMode {
        self.tracing_mode
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn trigger_trace_enabled(&self) -> bool {
        self.trigger_trace_enabled
    }

    pub fn transaction_filters(&self) -> &[TransactionFilterRule] {
        &self.transaction_filters
    }

    pub fn settings_timeout_check_interval(&self) -> Duration {
        self.settings_timeout_check_interval
    }

    pub fn metrics_flush_interval(&self) -> Duration {
        self.metrics_flush_interval
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tracing_mode: TracingMode::Unset,
            tracing_mode_configured: false,
            sample_rate: MAX_SAMPLE_RATE,
            sample_rate_configured: false,
            trigger_trace_enabled: true,
            transaction_filters: Vec::new(),
            settings_timeout_check_interval: interval::SETTINGS_TIMEOUT_CHECK_INTERVAL,
            metrics_flush_interval: interval::METRICS_FLUSH_INTERVAL,
            log_level: LevelFilter::default(),
        }
    }
}

pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    /// A builder that ignores the environment
    fn default() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }
}

impl ConfigBuilder {
    /// Finalizes the builder and returns the configuration
    pub fn build(self) -> Config {
        self.config
    }

    /// Sets the local tracing mode. `Unset` clears a previously configured mode.
    pub fn set_tracing_mode(&mut self, tracing_mode: TracingMode) -> &mut Self {
        self.config.tracing_mode = tracing_mode;
        self.config.tracing_mode_configured = tracing_mode != TracingMode::Unset;
        self
    }

    /// Sets the local sample rate in parts per million. Out of range values are
    /// clamped.
    pub fn set_sample_rate(&mut self, sample_rate: i64) -> &mut Self {
        self.config.sample_rate = clamp_sample_rate(sample_rate);
        self.config.sample_rate_configured = true;
        self
    }

    pub fn set_trigger_trace_enabled(&mut self, enabled: bool) -> &mut Self {
        self.config.trigger_trace_enabled = enabled;
        self
    }

    pub fn set_transaction_filters(&mut self, filters: Vec<TransactionFilterRule>) -> &mut Self {
        self.config.transaction_filters = filters;
        self
    }

    pub fn set_settings_timeout_check_interval(&mut self, interval: Duration) -> &mut Self {
        self.config.settings_timeout_check_interval = interval;
        self
    }

    pub fn set_metrics_flush_interval(&mut self, interval: Duration) -> &mut Self {
        self.config.metrics_flush_interval = interval;
        self
    }

    pub fn set_log_level(&mut self, log_level: LevelFilter) -> &mut Self {
        self.config.log_level = log_level;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Config, ConfigBuilder};
    use crate::configuration::sources::{CompositeSource, ConfigSourceOrigin, HashMapSource};
    use crate::configuration::transaction_settings::UrlMatcher;
    use crate::log::LevelFilter;
    use crate::sampling::TracingMode;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let mut sources = CompositeSource::new();
        sources.add_source(HashMapSource::from_iter(
            pairs.iter().copied(),
            ConfigSourceOrigin::EnvVar,
        ));
        Config::builder_with_sources(&sources).build()
    }

    #[test]
    fn test_config_defaults() {
        let config = config_from(&[]);
        let local = config.local_sampling();

        assert_eq!(local.tracing_mode, TracingMode::Unset);
        assert_eq!(local.sample_rate, 1_000_000);
        assert!(!local.is_configured());
        assert!(config.trigger_trace_enabled());
        assert!(config.transaction_filters().is_empty());
        assert_eq!(config.settings_timeout_check_interval(), Duration::from_secs(10));
        assert_eq!(config.metrics_flush_interval(), Duration::from_secs(30));
        assert_eq!(config.log_level(), LevelFilter::Error);
    }

    #[test]
    fn test_config_from_source() {
        let config = config_from(&[
            ("SWO_TRACING_MODE", "enabled"),
            ("SWO_SAMPLE_RATE", "10000"),
            ("SWO_TRIGGER_TRACE", "disabled"),
            (
                "SWO_TRANSACTION_SETTINGS",
                r#"[{"type": "url", "regex": "user\\d{3}", "tracing": "disabled"}]"#,
            ),
            ("SWO_SETTINGS_TIMEOUT_CHECK_INTERVAL", "3"),
            ("SWO_METRICS_FLUSH_INTERVAL", "60"),
            ("SWO_DEBUG_LEVEL", "debug"),
        ]);
        let local = config.local_sampling();

        assert_eq!(local.tracing_mode, TracingMode::Enabled);
        assert_eq!(local.sample_rate, 10_000);
        assert!(local.tracing_mode_configured);
        assert!(local.sample_rate_configured);
        assert!(!config.trigger_trace_enabled());
        assert_eq!(
            config.transaction_filters()[0].matcher,
            UrlMatcher::Regex("user\\d{3}".to_string())
        );
        assert_eq!(config.settings_timeout_check_interval(), Duration::from_secs(3));
        assert_eq!(config.metrics_flush_interval(), Duration::from_secs(60));
        assert_eq!(config.log_level(), LevelFilter::Debug);
    }

    #[test]
    fn test_config_legacy_and_invalid_values() {
        let config = config_from(&[
            ("SWO_TRACING_MODE", "never"),
            ("SWO_SAMPLE_RATE", "2000000"),
            ("SWO_SETTINGS_TIMEOUT_CHECK_INTERVAL", "0"),
        ]);
        assert_eq!(config.tracing_mode(), TracingMode::Disabled);
        assert_eq!(config.sample_rate(), 1_000_000);
        assert!(config.local_sampling().sample_rate_configured);
        assert_eq!(config.settings_timeout_check_interval(), Duration::from_secs(10));

        let config = config_from(&[("SWO_TRACING_MODE", "sometimes"), ("SWO_SAMPLE_RATE", "-5")]);
        assert_eq!(config.tracing_mode(), TracingMode::Unset);
        assert!(!config.local_sampling().tracing_mode_configured);
        assert_eq!(config.sample_rate(), 0);

        let config = config_from(&[("SWO_SAMPLE_RATE", "half")]);
        assert!(!config.local_sampling().sample_rate_configured);
        assert_eq!(config.sample_rate(), 1_000_000);
    }

    #[test]
    fn test_config_from_source_manual_override() {
        let sources = {
            let mut sources = CompositeSource::new();
            sources.add_source(HashMapSource::from_iter(
                [("SWO_TRACING_MODE", "disabled"), ("SWO_SAMPLE_RATE", "10")],
                ConfigSourceOrigin::EnvVar,
            ));
            sources
        };
        let mut builder = Config::builder_with_sources(&sources);
        builder
            .set_tracing_mode(TracingMode::Enabled)
            .set_sample_rate(1_500_000)
            .set_trigger_trace_enabled(false)
            .set_settings_timeout_check_interval(Duration::from_millis(50))
            .set_log_level(LevelFilter::Warn);
        let config = builder.build();

        assert_eq!(config.tracing_mode(), TracingMode::Enabled);
        assert_eq!(config.sample_rate(), 1_000_000);
        assert!(!config.trigger_trace_enabled());
        assert_eq!(
            config.settings_timeout_check_interval(),
            Duration::from_millis(50)
        );
        assert_eq!(config.log_level(), LevelFilter::Warn);
    }

    #[test]
    fn test_builder_unset_tracing_mode() {
        let mut builder = ConfigBuilder::default();
        builder.set_tracing_mode(TracingMode::Disabled);
        builder.set_tracing_mode(TracingMode::Unset);
        let local = builder.build().local_sampling();
        assert!(!local.tracing_mode_configured);
        assert!(!local.is_configured());
    }
}
