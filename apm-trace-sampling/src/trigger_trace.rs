// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Trigger trace requests and the response reported back to the caller.
//!
//! The literal tokens in this module are part of the propagation protocol.

use std::fmt;

use crate::constants::trigger_trace::{AUTH_KEY, TRIGGER_TRACE_KEY};

/// Outcome of the signature check done upstream on a trigger trace request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Ok,
    BadSignature,
    BadTimestamp,
    NoSignatureKey,
}

impl AuthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthStatus::Ok => "ok",
            AuthStatus::BadSignature => "bad-signature",
            AuthStatus::BadTimestamp => "bad-timestamp",
            AuthStatus::NoSignatureKey => "no-signature-key",
        }
    }
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signature attached to a request, as validated by the caller
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SignatureState {
    #[default]
    NoSignature,
    ValidSignature,
    InvalidSignature(AuthStatus),
}

/// How a trigger trace request is honored
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TriggerTraceMode {
    #[default]
    NotPresent,
    /// Unsigned request, limited by the strict bucket
    Strict,
    /// Signed request, limited by the relaxed bucket
    Relaxed,
    /// Signed request whose signature was rejected, never admitted
    Invalid,
}

impl TriggerTraceMode {
    pub fn from_request(trigger_trace_requested: bool, signature: &SignatureState) -> Self {
        if !trigger_trace_requested {
            return TriggerTraceMode::NotPresent;
        }
        match signature {
            SignatureState::ValidSignature => TriggerTraceMode::Relaxed,
            SignatureState::InvalidSignature(_) => TriggerTraceMode::Invalid,
            SignatureState::NoSignature => TriggerTraceMode::Strict,
        }
    }

    pub fn is_requested(&self) -> bool {
        *self != TriggerTraceMode::NotPresent
    }
}

/// Result of a trigger trace request
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TriggerTraceResponse {
    Ok,
    RateExceeded,
    TracingDisabled,
    TriggerTracingDisabled,
    #[default]
    NotRequested,
    Ignored,
    SettingsNotAvailable,
    /// The request was rejected by its signature, only the auth status is reported
    Empty,
}

impl TriggerTraceResponse {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerTraceResponse::Ok => "ok",
            TriggerTraceResponse::RateExceeded => "rate-exceeded",
            TriggerTraceResponse::TracingDisabled => "tracing-disabled",
            TriggerTraceResponse::TriggerTracingDisabled => "trigger-tracing-disabled",
            TriggerTraceResponse::NotRequested => "not-requested",
            TriggerTraceResponse::Ignored => "ignored",
            TriggerTraceResponse::SettingsNotAvailable => "settings-not-available",
            TriggerTraceResponse::Empty => "",
        }
    }
}

impl fmt::Display for TriggerTraceResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds the `X-Trace-Options-Response` header value, or `None` when there is
/// nothing to report
pub fn x_trace_options_response(
    response: TriggerTraceResponse,
    signature: &SignatureState,
) -> Option<String> {
    let requested = response != TriggerTraceResponse::NotRequested;
    match signature {
        SignatureState::InvalidSignature(auth) => Some(format!("{AUTH_KEY}={auth}")),
        SignatureState::ValidSignature if requested => Some(format!(
            "{AUTH_KEY}={};{TRIGGER_TRACE_KEY}={response}",
            AuthStatus::Ok
        )),
        SignatureState::ValidSignature => Some(format!("{AUTH_KEY}={}", AuthStatus::Ok)),
        SignatureState::NoSignature if requested => {
            Some(format!("{TRIGGER_TRACE_KEY}={response}"))
        }
        SignatureState::NoSignature => None,
    }
}
