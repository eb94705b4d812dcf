/*
 * runtime.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Process-wide engine runtime state.
//!
//! The runtime is started once per process. Classpath entries can be
//! registered until then; registering the same entry twice has no effect,
//! and registrations after start are ignored.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use hashlink::LinkedHashSet;

#[derive(Debug, Default)]
struct RuntimeState {
    started: bool,
    classpath: LinkedHashSet<PathBuf>,
}

#[derive(Debug, Default)]
pub struct EngineRuntime {
    state: Mutex<RuntimeState>,
}

static SHARED: OnceLock<Arc<EngineRuntime>> = OnceLock::new();

impl EngineRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide runtime.
    pub fn shared() -> Arc<EngineRuntime> {
        Arc::clone(SHARED.get_or_init(|| Arc::new(EngineRuntime::new())))
    }

    /// Register classpath entries, resolved against `context`.
    ///
    /// # Returns
    /// `false` when the runtime has already started and the entries were
    /// ignored.
    pub fn register_classpath<'a>(
        &self,
        context: &Path,
        entries: impl IntoIterator<Item = &'a str>,
    ) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.started {
            tracing::debug!("Engine runtime already started; classpath registration ignored");
            return false;
        }
        for entry in entries {
            let path = context.join(entry);
            if !state.classpath.contains(&path) {
                state.classpath.insert(path.clone());
                tracing::debug!(path = %path.display(), "Registered classpath entry");
            }
        }
        true
    }

    /// Start the runtime unless it is running.
    ///
    /// # Returns
    /// `true` when this call started it.
    pub fn ensure_started(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.started {
            return false;
        }
        state.started = true;
        tracing::info!(
            classpath_entries = state.classpath.len(),
            "Engine runtime started"
        );
        true
    }

    pub fn is_started(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .started
    }

    /// Registered classpath, in registration order.
    pub fn classpath(&self) -> Vec<PathBuf> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .classpath
            .iter()
            .cloned()
            .collect()
    }
}
