//! Named registry of supervised processes.

use crate::handle::ProcessHandle;
use crate::record::SuperviseRecord;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use warden_common::{ProcessError, ProcessName, ProcessResult};
use warden_spec::ProcessSpec;

/// Handles keyed by process name. Cloning shares the same registry.
#[derive(Clone, Default)]
pub struct Supervisor {
    handles: Arc<DashMap<ProcessName, Arc<ProcessHandle>>>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new process. Auto-start specs launch immediately; if that
    /// launch fails nothing is registered.
    pub fn create(&self, spec: ProcessSpec) -> ProcessResult<Arc<ProcessHandle>> {
        match self.handles.entry(spec.name().clone()) {
            Entry::Occupied(entry) => Err(ProcessError::already_exists(entry.key().as_str())),
            Entry::Vacant(entry) => {
                let name = spec.name().clone();
                let handle = Arc::new(ProcessHandle::new(spec)?);
                entry.insert(Arc::clone(&handle));
                info!(process = %name, "Process registered");
                Ok(handle)
            }
        }
    }

    pub fn get(&self, name: &str) -> ProcessResult<Arc<ProcessHandle>> {
        let key = ProcessName::parse(name).map_err(|_| ProcessError::not_found(name))?;
        self.handles
            .get(&key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ProcessError::not_found(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_ok()
    }

    /// Replace the spec of an existing process.
    ///
    /// The replacement handle is built (and auto-started) first. Only once
    /// that succeeds is it swapped in and the old handle closed and stopped;
    /// on failure the registry and the old process are left untouched.
    pub fn update(&self, spec: ProcessSpec) -> ProcessResult<Arc<ProcessHandle>> {
        let name = spec.name().clone();
        let (old, handle) = {
            let mut entry = self
                .handles
                .get_mut(&name)
                .ok_or_else(|| ProcessError::not_found(name.as_str()))?;
            let handle = Arc::new(ProcessHandle::new(spec)?);
            let old = std::mem::replace(entry.value_mut(), Arc::clone(&handle));
            (old, handle)
        };

        old.close();
        if let Err(e) = old.stop() {
            warn!(process = %name, error = %e, "Failed to stop replaced process");
        }

        info!(process = %name, "Process updated");
        Ok(handle)
    }

    /// Unregister a process, closing and stopping it. If the stop signal
    /// cannot be delivered the closed handle stays registered, so the caller
    /// can still reach it.
    pub fn delete(&self, name: &str) -> ProcessResult<()> {
        let handle = self.get(name)?;
        handle.close();
        handle.stop()?;
        self.handles.remove(handle.spec().name());
        info!(process = name, "Process removed");
        Ok(())
    }

    /// All handles, ordered by name.
    pub fn list(&self) -> Vec<Arc<ProcessHandle>> {
        let mut handles: Vec<_> = self
            .handles
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        handles.sort_by(|a, b| a.spec().name().cmp(b.spec().name()));
        handles
    }

    /// Current records of all handles, ordered by name.
    pub fn records(&self) -> Vec<SuperviseRecord> {
        self.list()
            .iter()
            .map(|handle| SuperviseRecord::from_handle(handle))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn start(&self, name: &str) -> ProcessResult<()> {
        self.get(name)?.start()?;
        Ok(())
    }

    pub fn stop(&self, name: &str) -> ProcessResult<()> {
        self.get(name)?.stop()
    }

    pub fn kill(&self, name: &str) -> ProcessResult<()> {
        self.get(name)?.kill()
    }

    /// Close every handle and stop every running process, waiting up to
    /// `timeout` for them to exit. Whatever is still running afterwards is
    /// killed. Returns the number of processes that had to be killed.
    pub async fn shutdown_all(&self, timeout: Duration) -> usize {
        let handles = self.list();
        info!(count = handles.len(), "Shutting down all processes");

        for handle in &handles {
            handle.close();
            if let Err(e) = handle.stop() {
                warn!(process = handle.name(), error = %e, "Failed to stop process");
            }
        }

        let deadline = tokio::time::Instant::now() + timeout;
        let mut killed = 0;
        for handle in &handles {
            let exited = tokio::time::timeout_at(
                deadline,
                handle.wait_for_state(|state| !state.is_active()),
            )
            .await
            .is_ok();

            if !exited {
                warn!(
                    process = handle.name(),
                    timeout = ?timeout,
                    "Process did not stop in time, killing"
                );
                if let Err(e) = handle.kill() {
                    warn!(process = handle.name(), error = %e, "Failed to kill process");
                }
                killed += 1;
            }
        }

        info!(killed, "Shutdown complete");
        killed
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("processes", &self.handles.len())
            .finish()
    }
}
