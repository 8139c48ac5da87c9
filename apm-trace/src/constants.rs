// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

pub mod rate {
    /// Sample rates are expressed in parts per million
    pub const MAX_SAMPLE_RATE: u32 = 1_000_000;
    pub const MIN_SAMPLE_RATE: u32 = 0;
}

pub mod interval {
    use std::time::Duration;

    pub const SETTINGS_TIMEOUT_CHECK_INTERVAL: Duration = Duration::from_secs(10);
    pub const METRICS_FLUSH_INTERVAL: Duration = Duration::from_secs(30);
}
