// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shared constants for the apm-trace-sampling crate

pub use apm_trace::constants::rate::MAX_SAMPLE_RATE;

/// Keys of the binary arguments attached to a remote setting
pub mod setting_args {
    /// `f64`, little endian
    pub const BUCKET_CAPACITY: &str = "BucketCapacity";
    pub const BUCKET_RATE: &str = "BucketRate";
    pub const TRIGGER_RELAXED_BUCKET_CAPACITY: &str = "TriggerRelaxedBucketCapacity";
    pub const TRIGGER_RELAXED_BUCKET_RATE: &str = "TriggerRelaxedBucketRate";
    pub const TRIGGER_STRICT_BUCKET_CAPACITY: &str = "TriggerStrictBucketCapacity";
    pub const TRIGGER_STRICT_BUCKET_RATE: &str = "TriggerStrictBucketRate";
    /// `i32`, little endian
    pub const METRICS_FLUSH_INTERVAL: &str = "MetricsFlushInterval";
    pub const MAX_TRANSACTIONS: &str = "MaxTransactions";
    /// raw bytes
    pub const SIGNATURE_KEY: &str = "SignatureKey";
}

/// Values used for a setting argument that is missing or malformed
pub mod setting_defaults {
    pub const BUCKET_CAPACITY: f64 = 0.0;
    pub const BUCKET_RATE: f64 = 0.0;
    pub const METRICS_FLUSH_INTERVAL_SECS: i32 = -1;
    pub const MAX_TRANSACTIONS: i32 = -1;
}

/// Transaction filter cache
pub mod filter_cache {
    use std::time::Duration;

    pub const CACHE_SIZE: usize = 1024;
    pub const CACHE_TTL: Duration = Duration::from_secs(600);
}

/// Trigger trace response propagation
pub mod trigger_trace {
    /// Header carrying the outcome of a trigger trace request back to the caller
    pub const X_TRACE_OPTIONS_RESPONSE_HEADER: &str = "X-Trace-Options-Response";
    pub const TRIGGER_TRACE_KEY: &str = "trigger-trace";
    pub const AUTH_KEY: &str = "auth";
}
