// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use apm_trace::worker::{spawn_periodic, WorkerError, WorkerHandle};
use apm_trace::{apm_debug, apm_warn, log, Config};

use crate::random::SampleDraw;
use crate::sample_flags::SampleFlags;
use crate::sampler::{SampleDecision, Sampler, SamplingRequest};
use crate::settings::{BucketCounts, ScopeType, SettingsStore};

/// Owns the settings store, the sampler and the two background workers.
///
/// Built once at startup. Dropping the agent stops the workers without waiting.
pub struct SamplingAgent {
    store: Arc<SettingsStore>,
    sampler: Sampler,
    sweeper: WorkerHandle,
    flusher: WorkerHandle,
}

impl SamplingAgent {
    /// Starts the agent.
    ///
    /// `on_counts` receives the bucket counters every metrics flush interval.
    pub fn start<F>(config: Config, on_counts: F) -> apm_trace::Result<Self>
    where
        F: FnMut(Vec<BucketCounts>) + Send + 'static,
    {
        log::set_max_level(config.log_level());
        let store = Arc::new(SettingsStore::new());

        let sweeper = spawn_periodic(
            "apm-settings-sweeper",
            config.settings_timeout_check_interval(),
            {
                let store = store.clone();
                move || {
                    let removed = store.sweep_expired();
                    if removed > 0 {
                        apm_debug!("Removed {} expired sampling settings", removed);
                    }
                }
            },
        )?;
        let flusher = spawn_periodic("apm-counts-flusher", config.metrics_flush_interval(), {
            let store = store.clone();
            let mut on_counts = on_counts;
            move || on_counts(store.flush_counters())
        })?;

        Ok(SamplingAgent {
            sampler: Sampler::new(config, store.clone()),
            store,
            sweeper,
            flusher,
        })
    }

    /// Replaces the random source of the sampler
    pub fn with_draw<D: SampleDraw + 'static>(mut self, draw: D) -> Self {
        self.sampler = self.sampler.with_draw(draw);
        self
    }

    /// Applies a setting received from the remote feed.
    ///
    /// Returns `false` when `scope_code` is not a known scope type, in which case
    /// the setting is ignored.
    pub fn update(
        &self,
        scope_code: i32,
        layer: &str,
        flags: &str,
        value: i64,
        ttl_secs: i64,
        args: &HashMap<String, Vec<u8>>,
    ) -> bool {
        match ScopeType::try_from(scope_code) {
            Ok(scope) => {
                self.store
                    .update(scope, layer, SampleFlags::parse(flags), value, ttl_secs, args);
                true
            }
            Err(e) => {
                apm_warn!("Ignoring sampling setting for layer {:?}: {}", layer, e);
                false
            }
        }
    }

    pub fn decide(&self, request: &SamplingRequest<'_>) -> SampleDecision {
        self.sampler.decide(request)
    }

    /// Collects and resets the counters of every bucket
    pub fn flush_counters(&self) -> Vec<BucketCounts> {
        self.store.flush_counters()
    }

    /// Reloads the local configuration
    pub fn update_config(&self, config: Config) {
        log::set_max_level(config.log_level());
        self.sampler.update_config(config);
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.store
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    /// Stops both workers, waiting up to `timeout` for each
    pub fn shutdown(&self, timeout: Duration) -> Result<(), WorkerError> {
        let sweeper = self.sweeper.shutdown(timeout);
        let flusher = self.flusher.shutdown(timeout);
        sweeper.and(flusher)
    }
}
