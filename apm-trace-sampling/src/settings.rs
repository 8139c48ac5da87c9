// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, PoisonError},
    time::{Duration, Instant},
};

use apm_trace::{apm_debug, sampling::clamp_sample_rate, sampling::SampleSource};

use crate::constants::{setting_args, setting_defaults};
use crate::sample_flags::SampleFlags;
use crate::setting_args::{parse_f64, parse_i32};
use crate::token_bucket::{RateCounts, TokenBucket};

/// Whether a setting applies to every layer or to a single one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeType {
    Default,
    PerLayer,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown setting scope type {0}")]
pub struct ScopeTypeError(pub i32);

impl TryFrom<i32> for ScopeType {
    type Error = ScopeTypeError;

    /// Scope type codes used by the collector
    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ScopeType::Default),
            1 => Ok(ScopeType::PerLayer),
            _ => Err(ScopeTypeError(code)),
        }
    }
}

impl From<ScopeType> for SampleSource {
    fn from(scope: ScopeType) -> Self {
        match scope {
            ScopeType::Default => SampleSource::Default,
            ScopeType::PerLayer => SampleSource::PerLayer,
        }
    }
}

/// Identifies a setting. The default scope always has an empty layer name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SettingKey {
    pub scope: ScopeType,
    pub layer: String,
}

/// A sampling directive received from the collector
pub struct Setting {
    key: SettingKey,
    flags: SampleFlags,
    /// Sample rate in parts per million
    value: u32,
    timestamp: Instant,
    ttl: Duration,
    bucket: TokenBucket,
    trigger_trace_relaxed_bucket: TokenBucket,
    trigger_trace_strict_bucket: TokenBucket,
    metrics_flush_interval: Option<Duration>,
    max_transactions: Option<u32>,
    signature_key: Option<Vec<u8>>,
}

impl fmt::Debug for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setting")
            .field("key", &self.key)
            .field("flags", &self.flags.to_string())
            .field("value", &self.value)
            .field("ttl", &self.ttl)
            .field("bucket", &self.bucket)
            .field("trigger_trace_relaxed_bucket", &self.trigger_trace_relaxed_bucket)
            .field("trigger_trace_strict_bucket", &self.trigger_trace_strict_bucket)
            .field("has_signature_key", &self.signature_key.is_some())
            .finish()
    }
}

impl Setting {
    pub fn key(&self) -> &SettingKey {
        &self.key
    }

    pub fn flags(&self) -> SampleFlags {
        self.flags
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn bucket(&self) -> &TokenBucket {
        &self.bucket
    }

    pub fn trigger_trace_relaxed_bucket(&self) -> &TokenBucket {
        &self.trigger_trace_relaxed_bucket
    }

    pub fn trigger_trace_strict_bucket(&self) -> &TokenBucket {
        &self.trigger_trace_strict_bucket
    }

    pub fn metrics_flush_interval(&self) -> Option<Duration> {
        self.metrics_flush_interval
    }

    pub fn max_transactions(&self) -> Option<u32> {
        self.max_transactions
    }

    pub fn signature_key(&self) -> Option<&[u8]> {
        self.signature_key.as_deref()
    }

    fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.timestamp) > self.ttl
    }

    fn buckets(&self) -> [(BucketKind, &TokenBucket); 3] {
        [
            (BucketKind::Sampling, &self.bucket),
            (BucketKind::TriggerTraceRelaxed, &self.trigger_trace_relaxed_bucket),
            (BucketKind::TriggerTraceStrict, &self.trigger_trace_strict_bucket),
        ]
    }
}

/// Which of the three buckets of a setting a counter snapshot belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketKind {
    Sampling,
    TriggerTraceRelaxed,
    TriggerTraceStrict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketCounts {
    pub key: SettingKey,
    pub kind: BucketKind,
    pub counts: RateCounts,
}

/// The setting that applies to a layer, as seen by the sampler
#[derive(Debug, Clone)]
pub struct ResolvedSetting {
    pub setting: Arc<Setting>,
    /// Scope that supplied `setting`
    pub source: SampleSource,
    /// The default scope setting. Its trigger trace buckets are shared by every layer.
    pub default: Arc<Setting>,
}

/// Read access to the current settings, as needed by the sampler
pub trait SettingsProvider: Send + Sync {
    /// Returns the setting that applies to `layer`, per-layer first.
    ///
    /// Nothing is returned unless a default setting exists.
    fn lookup(&self, layer: &str) -> Option<ResolvedSetting>;
}

#[derive(Default)]
struct Settings {
    default: Option<Arc<Setting>>,
    layers: HashMap<String, Arc<Setting>>,
}

impl Settings {
    fn get(&self, scope: ScopeType, layer: &str) -> Option<&Arc<Setting>> {
        match scope {
            ScopeType::Default => self.default.as_ref(),
            ScopeType::PerLayer => self.layers.get(layer),
        }
    }

    fn iter(&self) -> impl Iterator<Item = &Arc<Setting>> {
        self.default.iter().chain(self.layers.values())
    }
}

/// Latest sampling directive per scope, with TTL based expiry.
///
/// Reads never block each other. Updates, sweeps and resets take the write lock.
#[derive(Default)]
pub struct SettingsStore {
    inner: RwLock<Settings>,
}

impl fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let settings = self.read();
        f.debug_struct("SettingsStore")
            .field("default", &settings.default)
            .field("layers", &settings.layers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Settings> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Settings> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs or replaces the setting for `(scope, layer)`.
    ///
    /// `value` is clamped into the valid sample rate range and a negative `ttl_secs`
    /// is treated as zero. Bucket parameters are read from `args`. A replaced
    /// setting takes its buckets with it: the new ones start full with zeroed
    /// counters.
    pub fn update(
        &self,
        scope: ScopeType,
        layer: &str,
        flags: SampleFlags,
        value: i64,
        ttl_secs: i64,
        args: &HashMap<String, Vec<u8>>,
    ) {
        self.update_at(scope, layer, flags, value, ttl_secs, args, Instant::now())
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn update_at(
        &self,
        scope: ScopeType,
        layer: &str,
        flags: SampleFlags,
        value: i64,
        ttl_secs: i64,
        args: &HashMap<String, Vec<u8>>,
        now: Instant,
    ) {
        let layer = match scope {
            ScopeType::Default => "",
            ScopeType::PerLayer => layer,
        };
        let bucket_args = |capacity_key, rate_key| {
            (
                parse_f64(args, rate_key, setting_defaults::BUCKET_RATE),
                parse_f64(args, capacity_key, setting_defaults::BUCKET_CAPACITY),
            )
        };
        let (rate, capacity) =
            bucket_args(setting_args::BUCKET_CAPACITY, setting_args::BUCKET_RATE);
        let (relaxed_rate, relaxed_capacity) = bucket_args(
            setting_args::TRIGGER_RELAXED_BUCKET_CAPACITY,
            setting_args::TRIGGER_RELAXED_BUCKET_RATE,
        );
        let (strict_rate, strict_capacity) = bucket_args(
            setting_args::TRIGGER_STRICT_BUCKET_CAPACITY,
            setting_args::TRIGGER_STRICT_BUCKET_RATE,
        );
        let metrics_flush_interval = parse_i32(
            args,
            setting_args::METRICS_FLUSH_INTERVAL,
            setting_defaults::METRICS_FLUSH_INTERVAL_SECS,
        );
        let max_transactions = parse_i32(
            args,
            setting_args::MAX_TRANSACTIONS,
            setting_defaults::MAX_TRANSACTIONS,
        );

        let setting = Setting {
            key: SettingKey {
                scope,
                layer: layer.to_string(),
            },
            flags,
            value: clamp_sample_rate(value),
            timestamp: now,
            ttl: Duration::from_secs(ttl_secs.max(0) as u64),
            bucket: TokenBucket::new_at(rate, capacity, now),
            trigger_trace_relaxed_bucket: TokenBucket::new_at(relaxed_rate, relaxed_capacity, now),
            trigger_trace_strict_bucket: TokenBucket::new_at(strict_rate, strict_capacity, now),
            metrics_flush_interval: u64::try_from(metrics_flush_interval)
                .ok()
                .map(Duration::from_secs),
            max_transactions: u32::try_from(max_transactions).ok(),
            signature_key: args.get(setting_args::SIGNATURE_KEY).cloned(),
        };
        apm_debug!("Updated sampling setting {:?}", setting);

        let setting = Arc::new(setting);
        let mut settings = self.write();
        match scope {
            ScopeType::Default => settings.default = Some(setting),
            ScopeType::PerLayer => {
                settings.layers.insert(layer.to_string(), setting);
            }
        }
    }

    /// Returns the setting stored for exactly this scope and layer
    pub fn get(&self, scope: ScopeType, layer: &str) -> Option<Arc<Setting>> {
        self.read().get(scope, layer).cloned()
    }

    /// Removes every setting older than its TTL. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    pub(crate) fn sweep_expired_at(&self, now: Instant) -> usize {
        let mut settings = self.write();
        let mut removed = 0;
        if settings
            .default
            .as_ref()
            .is_some_and(|s| s.is_expired_at(now))
        {
            settings.default = None;
            apm_debug!("Default sampling setting expired");
            removed += 1;
        }
        settings.layers.retain(|layer, s| {
            let expired = s.is_expired_at(now);
            if expired {
                apm_debug!("Sampling setting for layer {} expired", layer);
                removed += 1;
            }
            !expired
        });
        removed
    }

    /// Removes every setting
    pub fn reset(&self) {
        *self.write() = Settings::default();
    }

    /// Returns and resets the counters of every bucket of every setting
    pub fn flush_counters(&self) -> Vec<BucketCounts> {
        self.read()
            .iter()
            .flat_map(|setting| {
                setting.buckets().map(|(kind, bucket)| BucketCounts {
                    key: setting.key.clone(),
                    kind,
                    counts: bucket.flush_counters(),
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        let settings = self.read();
        settings.default.iter().count() + settings.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SettingsProvider for SettingsStore {
    fn lookup(&self, layer: &str) -> Option<ResolvedSetting> {
        let settings = self.read();
        let default = settings.default.as_ref()?;
        let (setting, source) = match settings.layers.get(layer) {
            Some(per_layer) if !layer.is_empty() => (per_layer, SampleSource::PerLayer),
            _ => (default, SampleSource::Default),
        };
        Some(ResolvedSetting {
            setting: setting.clone(),
            source,
            default: default.clone(),
        })
    }
}
