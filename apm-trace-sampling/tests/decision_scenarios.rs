// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use apm_trace::configuration::{TransactionFilterRule, UrlMatcher};
use apm_trace::sampling::{SampleSource, TracingMode};
use apm_trace::{Config, ConfigBuilder};
use apm_trace_sampling::constants::setting_args;
use apm_trace_sampling::random::FixedDraw;
use apm_trace_sampling::settings::BucketKind;
use apm_trace_sampling::{
    SampleFlags, Sampler, SamplingAgent, SamplingRequest, ScopeType, SettingsProvider,
    SettingsStore, SignatureState, TriggerTraceResponse,
};

const ALL_FLAGS: &str = "SAMPLE_START,SAMPLE_THROUGH_ALWAYS,TRIGGER_TRACE";

fn bucket_args(capacity: f64, rate: f64) -> HashMap<String, Vec<u8>> {
    [
        (setting_args::BUCKET_CAPACITY, capacity),
        (setting_args::BUCKET_RATE, rate),
        (setting_args::TRIGGER_RELAXED_BUCKET_CAPACITY, capacity),
        (setting_args::TRIGGER_RELAXED_BUCKET_RATE, rate),
        (setting_args::TRIGGER_STRICT_BUCKET_CAPACITY, capacity),
        (setting_args::TRIGGER_STRICT_BUCKET_RATE, rate),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_le_bytes().to_vec()))
    .collect()
}

fn default_setting(flags: &str, value: i64, capacity: f64, rate: f64) -> Arc<SettingsStore> {
    let store = Arc::new(SettingsStore::new());
    store.update(
        ScopeType::Default,
        "",
        SampleFlags::parse(flags),
        value,
        600,
        &bucket_args(capacity, rate),
    );
    store
}

fn local_config(tracing_mode: TracingMode, sample_rate: i64) -> Config {
    let mut builder = ConfigBuilder::default();
    builder
        .set_tracing_mode(tracing_mode)
        .set_sample_rate(sample_rate);
    builder.build()
}

#[test]
fn test_burst_then_refill() {
    let store = default_setting(ALL_FLAGS, 1_000_000, 16.0, 8.0);
    let sampler = Sampler::new(Config::default(), store.clone()).with_draw(FixedDraw(0));
    let request = SamplingRequest::new("web");

    let traced = (0..50).filter(|_| sampler.decide(&request).trace).count();
    assert_eq!(traced, 16);

    let counts = store.flush_counters();
    let sampling = counts
        .iter()
        .find(|c| c.kind == BucketKind::Sampling)
        .unwrap();
    assert_eq!(sampling.counts.requested, 50);
    assert_eq!(sampling.counts.sampled, 50);
    assert_eq!(sampling.counts.traced, 16);
    assert_eq!(sampling.counts.limited, 34);

    thread::sleep(Duration::from_secs(1));
    let traced = (0..50).filter(|_| sampler.decide(&request).trace).count();
    assert_eq!(traced, 8);
}

#[test]
fn test_remote_rate_zero() {
    let store = default_setting(ALL_FLAGS, 0, 100.0, 100.0);
    let sampler = Sampler::new(Config::default(), store);

    for _ in 0..1000 {
        let decision = sampler.decide(&SamplingRequest::new("web"));
        assert!(!decision.trace);
        assert_eq!(decision.rate, 0);
        assert_eq!(decision.source, SampleSource::Default);
    }
}

#[test]
fn test_local_rate_against_override() {
    let config = local_config(TracingMode::Enabled, 10_000);

    let store = default_setting("OVERRIDE,SAMPLE_START", 1_000_000, 100.0, 100.0);
    let decision = Sampler::new(config.clone(), store).decide(&SamplingRequest::new("web"));
    assert_eq!(decision.source, SampleSource::File);
    assert_eq!(decision.rate, 10_000);

    let store = default_setting("OVERRIDE,SAMPLE_START", 1000, 100.0, 100.0);
    let decision = Sampler::new(config, store).decide(&SamplingRequest::new("web"));
    assert_eq!(decision.source, SampleSource::Default);
    assert_eq!(decision.rate, 1000);
}

#[test]
fn test_filter_cache_scenario() {
    let store = default_setting(ALL_FLAGS, 1_000_000, 1000.0, 0.0);
    let mut builder = ConfigBuilder::default();
    builder.set_transaction_filters(vec![TransactionFilterRule {
        matcher: UrlMatcher::Regex("user\\d{3}".to_string()),
        tracing: TracingMode::Disabled,
    }]);
    let sampler = Sampler::new(builder.build(), store).with_draw(FixedDraw(0));

    let decide = |url: &str| {
        sampler.decide(&SamplingRequest {
            url: Some(url),
            ..SamplingRequest::new("web")
        })
    };
    assert!(!decide("user123").trace);
    assert!(decide("test123").trace);
    assert!(!decide("user123").trace);
    assert!(decide("test123").trace);
    assert_eq!(sampler.filter().misses(), 2);
    assert_eq!(sampler.filter().hits(), 2);
}

#[test]
fn test_sampled_fraction_follows_rate() {
    let store = default_setting("SAMPLE_START", 250_000, 1e9, 1e9);
    let sampler = Sampler::new(Config::default(), store);

    let traced = (0..20_000)
        .filter(|_| sampler.decide(&SamplingRequest::new("web")).trace)
        .count();
    assert!((4_000..6_000).contains(&traced), "{traced}");
}

#[test]
fn test_concurrent_decisions_respect_capacity() {
    let store = default_setting(ALL_FLAGS, 1_000_000, 100.0, 0.0);
    let sampler = Arc::new(Sampler::new(Config::default(), store.clone()).with_draw(FixedDraw(0)));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let sampler = sampler.clone();
            thread::spawn(move || {
                (0..50)
                    .filter(|_| sampler.decide(&SamplingRequest::new("web")).trace)
                    .count()
            })
        })
        .collect();
    let traced: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(traced, 100);

    let sampling = store.lookup("web").unwrap().setting.bucket().counts();
    assert_eq!(sampling.requested, 400);
    assert_eq!(sampling.traced + sampling.limited, 400);
}

#[test]
fn test_settings_update_starts_with_full_bucket() {
    let store = default_setting(ALL_FLAGS, 1_000_000, 5.0, 0.0);
    let sampler = Sampler::new(Config::default(), store.clone()).with_draw(FixedDraw(0));
    let request = SamplingRequest::new("web");

    let traced = (0..10).filter(|_| sampler.decide(&request).trace).count();
    assert_eq!(traced, 5);
    assert!(!sampler.decide(&request).trace);

    store.update(
        ScopeType::Default,
        "",
        SampleFlags::parse(ALL_FLAGS),
        1_000_000,
        600,
        &bucket_args(5.0, 0.0),
    );
    let traced = (0..10).filter(|_| sampler.decide(&request).trace).count();
    assert_eq!(traced, 5);
    assert_eq!(store.lookup("web").unwrap().setting.bucket().counts().requested, 10);
}

#[test]
fn test_trigger_trace_headers() {
    let store = default_setting(ALL_FLAGS, 0, 1.0, 0.0);
    let sampler = Sampler::new(Config::default(), store);

    let strict = SamplingRequest {
        trigger_trace_requested: true,
        ..SamplingRequest::new("web")
    };
    let first = sampler.decide(&strict);
    assert!(first.trace);
    assert_eq!(first.xtrace_opts_response, TriggerTraceResponse::Ok);
    assert_eq!(first.response_header.as_deref(), Some("trigger-trace=ok"));

    let second = sampler.decide(&strict);
    assert!(!second.trace);
    assert_eq!(
        second.response_header.as_deref(),
        Some("trigger-trace=rate-exceeded")
    );

    let signed = SamplingRequest {
        signature: SignatureState::ValidSignature,
        ..strict
    };
    let relaxed = sampler.decide(&signed);
    assert!(relaxed.trace);
    assert_eq!(
        relaxed.response_header.as_deref(),
        Some("auth=ok;trigger-trace=ok")
    );

    let not_requested = sampler.decide(&SamplingRequest::new("web"));
    assert_eq!(not_requested.response_header, None);
}

#[test]
fn test_agent_lifecycle() {
    let mut builder = ConfigBuilder::default();
    builder
        .set_settings_timeout_check_interval(Duration::from_millis(20))
        .set_metrics_flush_interval(Duration::from_secs(60));
    let agent = SamplingAgent::start(builder.build(), |_| {})
        .unwrap()
        .with_draw(FixedDraw(0));

    let no_settings = agent.decide(&SamplingRequest::new("web"));
    assert!(!no_settings.trace);
    assert_eq!(no_settings.source, SampleSource::None);

    let args = bucket_args(10.0, 0.0);
    assert!(agent.update(0, "", ALL_FLAGS, 1_000_000, 1, &args));
    assert!(agent.update(1, "web", ALL_FLAGS, 500_000, 1, &args));
    let decision = agent.decide(&SamplingRequest::new("web"));
    assert!(decision.trace);
    assert_eq!(decision.source, SampleSource::PerLayer);
    assert_eq!(decision.rate, 500_000);

    let counts = agent.flush_counters();
    assert_eq!(counts.len(), 6);
    assert_eq!(counts.iter().map(|c| c.counts.traced).sum::<u64>(), 1);

    // both settings expire after one second and get swept
    thread::sleep(Duration::from_millis(1200));
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while !agent.settings().is_empty() && std::time::Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
    }
    assert!(agent.settings().is_empty());
    assert_eq!(
        agent.decide(&SamplingRequest::new("web")).source,
        SampleSource::None
    );

    agent.shutdown(Duration::from_secs(5)).unwrap();
}
