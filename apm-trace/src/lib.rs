// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shared building blocks of the APM agent: configuration, logging, error type,
//! sampling vocabulary and background workers.

pub mod configuration;
pub mod constants;
pub use configuration::{Config, ConfigBuilder, LocalSamplingConfig};

mod error;
pub use error::{Error, Result};

pub mod log;
pub mod sampling;
pub mod worker;

/// Macro to catch panics and return a fallback value with error logging
/// The fallback is only evaluated if a panic occurs
#[macro_export]
#[doc(hidden)]
macro_rules! catch_panic {
    ($operation:expr, $fallback:expr) => {
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| $operation)) {
            Ok(result) => result,
            Err(error) => {
                $crate::apm_error!("Panic caught {error:?}");
                $fallback
            }
        }
    };

    ($operation:expr) => {
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| $operation)) {
            Ok(result) => result,
            Err(error) => {
                $crate::apm_error!("Panic caught {error:?}");
            }
        }
    };
}
