// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Decoding of the binary arguments that come with a remote setting.
//!
//! Every field is decoded on its own. A missing or malformed field falls back to
//! the supplied default and the rest of the setting still applies.

use std::collections::HashMap;

use apm_trace::apm_warn;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgDecodeError {
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("negative value")]
    Negative,
    #[error("not a finite number")]
    NotFinite,
}

/// Decodes a little endian `f64`
pub fn bytes_to_f64(bytes: &[u8]) -> Result<f64, ArgDecodeError> {
    let bytes: [u8; 8] = bytes
        .try_into()
        .map_err(|_| ArgDecodeError::InvalidLength {
            expected: 8,
            actual: bytes.len(),
        })?;
    Ok(f64::from_le_bytes(bytes))
}

/// Decodes a little endian `i32`
pub fn bytes_to_i32(bytes: &[u8]) -> Result<i32, ArgDecodeError> {
    let bytes: [u8; 4] = bytes
        .try_into()
        .map_err(|_| ArgDecodeError::InvalidLength {
            expected: 4,
            actual: bytes.len(),
        })?;
    Ok(i32::from_le_bytes(bytes))
}

/// Reads a non negative `f64` argument, or `default`
pub fn parse_f64(args: &HashMap<String, Vec<u8>>, key: &str, default: f64) -> f64 {
    let Some(bytes) = args.get(key) else {
        return default;
    };
    let decoded = bytes_to_f64(bytes).and_then(|v| {
        if !v.is_finite() {
            Err(ArgDecodeError::NotFinite)
        } else if v < 0.0 {
            Err(ArgDecodeError::Negative)
        } else {
            Ok(v)
        }
    });
    decoded.unwrap_or_else(|e| {
        apm_warn!("Invalid setting argument {}: {}, using {}", key, e, default);
        default
    })
}

/// Reads a non negative `i32` argument, or `default`
pub fn parse_i32(args: &HashMap<String, Vec<u8>>, key: &str, default: i32) -> i32 {
    let Some(bytes) = args.get(key) else {
        return default;
    };
    let decoded = bytes_to_i32(bytes).and_then(|v| {
        if v < 0 {
            Err(ArgDecodeError::Negative)
        } else {
            Ok(v)
        }
    });
    decoded.unwrap_or_else(|e| {
        apm_warn!("Invalid setting argument {}: {}, using {}", key, e, default);
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, Vec<u8>)]) -> HashMap<String, Vec<u8>> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_bytes_to_i32_is_little_endian() {
        assert_eq!(bytes_to_i32(&[0, 1, 0, 0]), Ok(256));
        assert_eq!(bytes_to_i32(&[255, 255, 255, 255]), Ok(-1));
        assert_eq!(
            bytes_to_i32(&[1, 0, 0]),
            Err(ArgDecodeError::InvalidLength {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn test_bytes_to_f64() {
        assert_eq!(bytes_to_f64(&16.0f64.to_le_bytes()), Ok(16.0));
        assert_eq!(
            bytes_to_f64(&[0, 0, 0, 0]),
            Err(ArgDecodeError::InvalidLength {
                expected: 8,
                actual: 4
            })
        );
    }

    #[test]
    fn test_parse_i32_falls_back_to_default() {
        let args = args(&[
            ("Good", vec![0, 1, 0, 0]),
            ("Negative", vec![255, 255, 255, 255]),
            ("Short", vec![1, 2]),
        ]);
        assert_eq!(parse_i32(&args, "Good", 7), 256);
        assert_eq!(parse_i32(&args, "Negative", 7), 7);
        assert_eq!(parse_i32(&args, "Short", 7), 7);
        assert_eq!(parse_i32(&args, "Missing", 7), 7);
    }

    #[test]
    fn test_parse_f64_falls_back_to_default() {
        let args = args(&[
            ("Good", 8.5f64.to_le_bytes().to_vec()),
            ("Negative", (-1.0f64).to_le_bytes().to_vec()),
            ("NaN", f64::NAN.to_le_bytes().to_vec()),
            ("Short", vec![0, 0, 0, 0]),
        ]);
        assert_eq!(parse_f64(&args, "Good", 1.0), 8.5);
        assert_eq!(parse_f64(&args, "Negative", 1.0), 1.0);
        assert_eq!(parse_f64(&args, "NaN", 1.0), 1.0);
        assert_eq!(parse_f64(&args, "Short", 1.0), 1.0);
        assert_eq!(parse_f64(&args, "Missing", 1.0), 1.0);
    }

    #[test]
    fn test_malformed_argument_is_logged() {
        use apm_trace::log::{test_logger, Level};

        let _guard = test_logger::activate_test_logger();
        let args = args(&[("BucketRate", vec![1, 2, 3])]);
        assert_eq!(parse_f64(&args, "BucketRate", 0.0), 0.0);

        let logs = test_logger::take_test_logs().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].0, Level::Warn);
        assert!(logs[0].1.contains("BucketRate"), "{}", logs[0].1);
        assert!(logs[0].1.contains("invalid length"), "{}", logs[0].1);
    }
}
