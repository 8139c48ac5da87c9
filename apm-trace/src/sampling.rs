// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{fmt, str::FromStr};

use crate::constants::rate::{MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};

/// Clamps a sample rate expressed in parts per million into `0..=1_000_000`.
///
/// Rates outside the range are never rejected, whatever their origin.
pub fn clamp_sample_rate(rate: i64) -> u32 {
    rate.clamp(MIN_SAMPLE_RATE as i64, MAX_SAMPLE_RATE as i64) as u32
}

/// Whether tracing is turned on, either for the whole process or for a class of
/// transactions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TracingMode {
    Enabled,
    Disabled,
    /// No verdict. This is also what a transaction filter returns when no rule
    /// matches a URL.
    #[default]
    Unset,
}

impl TracingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TracingMode::Enabled => "enabled",
            TracingMode::Disabled => "disabled",
            TracingMode::Unset => "unset",
        }
    }
}

impl FromStr for TracingMode {
    type Err = &'static str;

    /// Parses a configured tracing mode. `always` and `never` are accepted as
    /// legacy spellings of `enabled` and `disabled`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("enabled") || s.eq_ignore_ascii_case("always") {
            Ok(TracingMode::Enabled)
        } else if s.eq_ignore_ascii_case("disabled") || s.eq_ignore_ascii_case("never") {
            Ok(TracingMode::Disabled)
        } else {
            Err("tracing mode should be one of enabled, disabled")
        }
    }
}

impl fmt::Display for TracingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for TracingMode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Provenance of the rate used for a sampling decision.
///
/// The numeric codes are propagated to the collector and must stay stable.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleSource {
    /// No directive was applied
    #[default]
    None,
    /// Local file or environment configuration
    File,
    /// Remote settings for the default scope
    Default,
    /// Remote settings for a specific layer
    PerLayer,
}

impl SampleSource {
    pub const fn code(&self) -> i32 {
        match self {
            SampleSource::None => 0,
            SampleSource::File => 1,
            SampleSource::Default => 2,
            SampleSource::PerLayer => 3,
        }
    }

    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(SampleSource::None),
            1 => Some(SampleSource::File),
            2 => Some(SampleSource::Default),
            3 => Some(SampleSource::PerLayer),
            _ => None,
        }
    }
}

impl fmt::Display for SampleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
