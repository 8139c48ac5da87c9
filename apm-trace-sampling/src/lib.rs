// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sampling decision core.
//!
//! Decides, per unit of work, whether it is traced. Inputs are the local
//! configuration, the latest remote settings per layer and the transaction
//! filters. Admission is rate limited by token buckets attached to each setting.

pub mod agent;
pub mod constants;
pub mod random;
pub mod sample_flags;
pub mod sampler;
pub mod setting_args;
pub mod settings;
pub mod token_bucket;
pub mod transaction_filter;
pub mod trigger_trace;

// Re-exports for convenient usage
pub use agent::SamplingAgent;
pub use sample_flags::SampleFlags;
pub use sampler::{SampleDecision, Sampler, SamplingRequest};
pub use settings::{ResolvedSetting, ScopeType, SettingsProvider, SettingsStore};
pub use token_bucket::{RateCounts, TokenBucket};
pub use transaction_filter::TransactionFilter;
pub use trigger_trace::{SignatureState, TriggerTraceMode, TriggerTraceResponse};
