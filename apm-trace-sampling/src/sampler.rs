// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use apm_trace::sampling::{SampleSource, TracingMode};
use apm_trace::{catch_panic, Config, LocalSamplingConfig};

use crate::random::{SampleDraw, ThreadRngDraw};
use crate::sample_flags::SampleFlags;
use crate::settings::{ResolvedSetting, Setting, SettingsProvider};
use crate::token_bucket::TokenBucket;
use crate::transaction_filter::TransactionFilter;
use crate::trigger_trace::{
    x_trace_options_response, SignatureState, TriggerTraceMode, TriggerTraceResponse,
};

/// Everything known about a unit of work when deciding whether to trace it
#[derive(Debug, Default, Clone, Copy)]
pub struct SamplingRequest<'a> {
    pub layer: &'a str,
    /// An upstream hop already decided to trace this request
    pub already_traced: bool,
    pub url: Option<&'a str>,
    /// The caller asked for this request to be traced
    pub trigger_trace_requested: bool,
    pub signature: SignatureState,
}

impl<'a> SamplingRequest<'a> {
    pub fn new(layer: &'a str) -> Self {
        Self {
            layer,
            ..Default::default()
        }
    }

    /// How a trigger trace request is honored, given the signature
    pub fn trigger_trace_mode(&self) -> TriggerTraceMode {
        TriggerTraceMode::from_request(self.trigger_trace_requested, &self.signature)
    }
}

/// The verdict for one unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleDecision {
    pub trace: bool,
    /// Effective sample rate, parts per million
    pub rate: u32,
    pub source: SampleSource,
    pub xtrace_opts_response: TriggerTraceResponse,
    /// Value of the `X-Trace-Options-Response` header, if any
    pub response_header: Option<String>,
}

/// Rate, source and flags after merging local and remote directives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Directive {
    rate: u32,
    source: SampleSource,
    flags: SampleFlags,
}

/// Flags implied by a locally configured tracing mode
fn local_flags(tracing_mode: TracingMode) -> SampleFlags {
    match tracing_mode {
        TracingMode::Enabled => {
            SampleFlags::SAMPLE_START | SampleFlags::SAMPLE_THROUGH_ALWAYS | SampleFlags::TRIGGER_TRACE
        }
        TracingMode::Disabled | TracingMode::Unset => SampleFlags::empty(),
    }
}

/// Local configuration wins once set. A remote setting carrying `OVERRIDE` can
/// only lower the local rate and remove local flags.
fn merge_directive(
    local: &LocalSamplingConfig,
    tracing_mode: TracingMode,
    setting: &Setting,
    scope: SampleSource,
) -> Directive {
    let remote_rate = setting.value();
    let remote_flags = setting.flags();
    if !local.is_configured() {
        return Directive {
            rate: remote_rate,
            source: scope,
            flags: remote_flags,
        };
    }

    let remote_override = remote_flags.contains(SampleFlags::OVERRIDE);
    let (rate, source) = if remote_override && remote_rate < local.sample_rate {
        (remote_rate, scope)
    } else {
        (local.sample_rate, SampleSource::File)
    };
    let flags = match (local.tracing_mode_configured, remote_override) {
        (false, _) => remote_flags,
        (true, false) => local_flags(tracing_mode),
        (true, true) => local_flags(tracing_mode) & remote_flags,
    };
    Directive {
        rate,
        source,
        flags,
    }
}

/// Admits through `bucket`, reporting the trigger trace outcome
fn trigger_trace_admit(bucket: &TokenBucket) -> (bool, TriggerTraceResponse) {
    if bucket.count(true, false, false) {
        (true, TriggerTraceResponse::Ok)
    } else {
        (false, TriggerTraceResponse::RateExceeded)
    }
}

/// Decides whether units of work are traced, from the local configuration, the
/// remote settings and the transaction filters.
pub struct Sampler {
    config: RwLock<Arc<Config>>,
    settings: Arc<dyn SettingsProvider>,
    filter: TransactionFilter,
    draw: Box<dyn SampleDraw>,
}

impl fmt::Debug for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sampler")
            .field("config", &self.config())
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

impl Sampler {
    pub fn new(config: Config, settings: Arc<dyn SettingsProvider>) -> Self {
        Sampler {
            filter: TransactionFilter::new(config.transaction_filters()),
            config: RwLock::new(Arc::new(config)),
            settings,
            draw: Box::new(ThreadRngDraw),
        }
    }

    /// Replaces the random source used for the sample rate draw
    pub fn with_draw<D: SampleDraw + 'static>(mut self, draw: D) -> Self {
        self.draw = Box::new(draw);
        self
    }

    /// Current local configuration
    pub fn config(&self) -> Arc<Config> {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swaps the local configuration and reloads the transaction filters
    pub fn update_config(&self, config: Config) {
        self.filter.load_config(config.transaction_filters());
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
    }

    pub fn filter(&self) -> &TransactionFilter {
        &self.filter
    }

    /// Decides whether the unit of work described by `request` is traced.
    ///
    /// Never panics. Any failure results in not tracing.
    pub fn decide(&self, request: &SamplingRequest<'_>) -> SampleDecision {
        catch_panic!(
            self.decide_inner(request),
            Self::decision(request, false, 0, SampleSource::None, TriggerTraceResponse::NotRequested)
        )
    }

    fn decision(
        request: &SamplingRequest<'_>,
        trace: bool,
        rate: u32,
        source: SampleSource,
        response: TriggerTraceResponse,
    ) -> SampleDecision {
        SampleDecision {
            trace,
            rate,
            source,
            xtrace_opts_response: response,
            response_header: x_trace_options_response(response, &request.signature),
        }
    }

    fn decide_inner(&self, request: &SamplingRequest<'_>) -> SampleDecision {
        let trigger_trace = request.trigger_trace_mode();
        let trigger_requested = trigger_trace.is_requested();
        let when_requested = |response: TriggerTraceResponse| {
            if trigger_requested {
                response
            } else {
                TriggerTraceResponse::NotRequested
            }
        };

        let url_mode = match request.url {
            Some(url) if !url.is_empty() => self.filter.classify(url),
            _ => TracingMode::Unset,
        };
        if url_mode == TracingMode::Disabled {
            return Self::decision(
                request,
                false,
                0,
                SampleSource::None,
                when_requested(TriggerTraceResponse::TracingDisabled),
            );
        }

        let Some(ResolvedSetting {
            setting,
            source: scope,
            default,
        }) = self.settings.lookup(request.layer)
        else {
            return Self::decision(
                request,
                false,
                0,
                SampleSource::None,
                when_requested(TriggerTraceResponse::SettingsNotAvailable),
            );
        };

        let config = self.config();
        let local = config.local_sampling();
        // an enabled transaction filter lifts a locally disabled tracing mode
        let tracing_mode = match (local.tracing_mode, url_mode) {
            (TracingMode::Disabled, TracingMode::Enabled) => TracingMode::Enabled,
            (mode, _) => mode,
        };
        let directive = merge_directive(&local, tracing_mode, &setting, scope);
        let bucket = setting.bucket();

        if tracing_mode == TracingMode::Disabled {
            bucket.count(false, false, false);
            return Self::decision(
                request,
                false,
                directive.rate,
                directive.source,
                when_requested(TriggerTraceResponse::TracingDisabled),
            );
        }

        let mut response = TriggerTraceResponse::NotRequested;
        if trigger_requested {
            if request.already_traced {
                response = TriggerTraceResponse::Ignored;
            } else if trigger_trace == TriggerTraceMode::Invalid {
                return Self::decision(
                    request,
                    false,
                    directive.rate,
                    directive.source,
                    TriggerTraceResponse::Empty,
                );
            } else if !config.trigger_trace_enabled()
                || !directive.flags.contains(SampleFlags::TRIGGER_TRACE)
            {
                response = TriggerTraceResponse::TriggerTracingDisabled;
            } else {
                // trigger trace buckets are shared across layers
                let bucket = if trigger_trace == TriggerTraceMode::Relaxed {
                    default.trigger_trace_relaxed_bucket()
                } else {
                    default.trigger_trace_strict_bucket()
                };
                let (trace, response) = trigger_trace_admit(bucket);
                return Self::decision(request, trace, directive.rate, directive.source, response);
            }
        }

        let trace = if !request.already_traced {
            if directive.flags.contains(SampleFlags::SAMPLE_START) {
                let sampled = self.draw.draw() < directive.rate;
                bucket.count(sampled, false, sampled)
            } else {
                bucket.count(false, false, false)
            }
        } else if directive
            .flags
            .intersects(SampleFlags::SAMPLE_THROUGH | SampleFlags::SAMPLE_THROUGH_ALWAYS)
        {
            bucket.count(true, true, false)
        } else {
            bucket.count(false, false, false)
        };

        Self::decision(request, trace, directive.rate, directive.source, response)
    }
}
