// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Every configuration key the agent reads
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum SupportedConfigurations {
    SWO_TRACING_MODE,
    SWO_SAMPLE_RATE,
    SWO_TRIGGER_TRACE,
    SWO_TRANSACTION_SETTINGS,
    SWO_SETTINGS_TIMEOUT_CHECK_INTERVAL,
    SWO_METRICS_FLUSH_INTERVAL,
    SWO_DEBUG_LEVEL,
}

impl SupportedConfigurations {
    pub(crate) const fn as_str(&self) -> &'static str {
        match self {
            Self::SWO_TRACING_MODE => "SWO_TRACING_MODE",
            Self::SWO_SAMPLE_RATE => "SWO_SAMPLE_RATE",
            Self::SWO_TRIGGER_TRACE => "SWO_TRIGGER_TRACE",
            Self::SWO_TRANSACTION_SETTINGS => "SWO_TRANSACTION_SETTINGS",
            Self::SWO_SETTINGS_TIMEOUT_CHECK_INTERVAL => "SWO_SETTINGS_TIMEOUT_CHECK_INTERVAL",
            Self::SWO_METRICS_FLUSH_INTERVAL => "SWO_METRICS_FLUSH_INTERVAL",
            Self::SWO_DEBUG_LEVEL => "SWO_DEBUG_LEVEL",
        }
    }
}
