// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{
    fmt,
    sync::{Arc, Condvar, Mutex, PoisonError},
    thread,
    time::Duration,
};

/// Handle on a background thread that runs until asked to stop.
///
/// Dropping the handle asks the worker to stop but does not wait for it.
pub struct WorkerHandle {
    name: String,
    join_handle: Mutex<Option<thread::JoinHandle<()>>>,
    shutdown_requested: Arc<ShutdownSignaler>,
    shutdown_finished: Arc<ShutdownSignaler>,
}

impl WorkerHandle {
    pub fn new(
        name: String,
        shutdown_requested: Arc<ShutdownSignaler>,
        shutdown_finished: Arc<ShutdownSignaler>,
        handle: thread::JoinHandle<()>,
    ) -> Self {
        Self {
            name,
            join_handle: Mutex::new(Some(handle)),
            shutdown_requested,
            shutdown_finished,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Asks the worker to stop and waits up to `timeout` for it to finish
    pub fn shutdown(&self, timeout: Duration) -> Result<(), WorkerError> {
        self.shutdown_requested.signal_shutdown();
        self.wait_for_shutdown(timeout)
    }

    pub fn wait_for_shutdown(&self, timeout: Duration) -> Result<(), WorkerError> {
        let Some(handle) = self
            .join_handle
            .lock()
            .map_err(|_| {
                crate::apm_error!("{}.wait_for_shutdown: handle mutex poisoned", self.name);
                WorkerError::HandleMutexPoisoned
            })?
            .take()
        else {
            return Ok(());
        };
        self.shutdown_finished.wait_for_shutdown(timeout)?;
        handle.join().map_err(|e| {
            let err = if let Some(e) = e.downcast_ref::<&'static str>() {
                e
            } else if let Some(e) = e.downcast_ref::<String>() {
                e
            } else {
                "unknown panic type"
            };
            crate::apm_error!("{}.wait_for_shutdown: worker panicked: {}", self.name, err);
            WorkerError::WorkerPanicked(err.to_string())
        })?;
        Ok(())
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown_requested.signal_shutdown();
    }
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("name", &self.name)
            .field("shutdown_requested", &self.shutdown_requested.is_signaled())
            .field("shutdown_finished", &self.shutdown_finished.is_signaled())
            .finish()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum WorkerError {
    ShutdownTimedOut,
    HandleMutexPoisoned,
    WorkerPanicked(String),
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HandleMutexPoisoned => write!(f, "handle mutex poisoned"),
            Self::WorkerPanicked(msg) => write!(f, "worker panicked: {}", msg),
            Self::ShutdownTimedOut => write!(f, "shutdown timed out"),
        }
    }
}

impl std::error::Error for WorkerError {}

/// One-shot flag that threads can block on
#[derive(Default)]
pub struct ShutdownSignaler {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

impl ShutdownSignaler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn signal_shutdown(&self) {
        let mut signaled = self.signaled.lock().unwrap_or_else(PoisonError::into_inner);
        *signaled = true;
        self.condvar.notify_all();
    }

    pub fn is_signaled(&self) -> bool {
        *self.signaled.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until the signal is raised or `timeout` elapses
    pub fn wait_for_shutdown(&self, timeout: Duration) -> Result<(), WorkerError> {
        let Ok(signaled) = self.signaled.lock() else {
            return Ok(());
        };
        let Ok((_signaled, timeout)) = self
            .condvar
            .wait_timeout_while(signaled, timeout, |s| !*s)
        else {
            return Ok(());
        };
        if timeout.timed_out() {
            return Err(WorkerError::ShutdownTimedOut);
        }
        Ok(())
    }
}

/// Spawns a named thread calling `tick` every `interval` until the returned
/// handle is shut down or dropped.
///
/// A panic inside `tick` is logged and the worker keeps going.
pub fn spawn_periodic<F>(name: &str, interval: Duration, mut tick: F) -> crate::Result<WorkerHandle>
where
    F: FnMut() + Send + 'static,
{
    let shutdown_requested = ShutdownSignaler::new();
    let shutdown_finished = ShutdownSignaler::new();

    let handle = thread::Builder::new().name(name.to_string()).spawn({
        let shutdown_requested = shutdown_requested.clone();
        let shutdown_finished = shutdown_finished.clone();
        let name = name.to_string();
        move || {
            crate::apm_debug!("{} started, interval {:?}", name, interval);
            while shutdown_requested.wait_for_shutdown(interval).is_err() {
                crate::catch_panic!(tick());
            }
            crate::apm_debug!("{} stopped", name);
            shutdown_finished.signal_shutdown();
        }
    });
    let handle = handle.map_err(|e| crate::Error::from(e).context(format!("spawning {name}")))?;

    Ok(WorkerHandle::new(
        name.to_string(),
        shutdown_requested,
        shutdown_finished,
        handle,
    ))
}
