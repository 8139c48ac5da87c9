// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#[allow(clippy::module_inception)]
mod configuration;
mod sources;
mod supported_configurations;
mod transaction_settings;

pub use configuration::{Config, ConfigBuilder, LocalSamplingConfig};
pub use transaction_settings::{
    TransactionFilterConfig, TransactionFilterError, TransactionFilterRule, UrlMatcher,
};
