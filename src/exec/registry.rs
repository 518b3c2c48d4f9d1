// src/exec/registry.rs

//! Shared set of live child process ids.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct ProcessRegistry {
    pids: Arc<Mutex<BTreeSet<u32>>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, pid: u32) {
        if let Ok(mut pids) = self.pids.lock() {
            pids.insert(pid);
        }
    }

    pub fn unregister(&self, pid: u32) {
        if let Ok(mut pids) = self.pids.lock() {
            pids.remove(&pid);
        }
    }

    pub fn live(&self) -> Vec<u32> {
        self.pids
            .lock()
            .map(|pids| pids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Send `SIGTERM` to the process group of every live child. Each child
    /// leads its own group, so this reaches grandchildren too.
    pub fn terminate_all(&self) {
        for pid in self.live() {
            terminate_group(pid);
        }
    }
}

/// Removes a pid from the registry when dropped.
pub(crate) struct Registration<'a> {
    registry: &'a ProcessRegistry,
    pid: Option<u32>,
}

impl<'a> Registration<'a> {
    pub(crate) fn new(registry: &'a ProcessRegistry, pid: Option<u32>) -> Self {
        if let Some(pid) = pid {
            registry.register(pid);
        }
        Self { registry, pid }
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        if let Some(pid) = self.pid {
            self.registry.unregister(pid);
        }
    }
}

#[cfg(unix)]
pub(crate) fn terminate_group(pid: u32) {
    debug!(pid, "sending SIGTERM to process group");
    // SAFETY: kill(2) with a negative pid signals a process group and touches
    // no memory owned by this process.
    let rc = unsafe { libc::kill(-(pid as i32), libc::SIGTERM) };
    if rc != 0 {
        warn!(pid, error = %std::io::Error::last_os_error(), "failed to signal process group");
    }
}

#[cfg(not(unix))]
pub(crate) fn terminate_group(pid: u32) {
    debug!(pid, "process groups unsupported; child is killed directly");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_scoped() {
        let registry = ProcessRegistry::new();
        {
            let _reg = Registration::new(&registry, Some(42));
            assert_eq!(registry.live(), vec![42]);
        }
        assert!(registry.live().is_empty());
    }
}
