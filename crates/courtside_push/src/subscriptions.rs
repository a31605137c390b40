// Owned collection of listener and timer tasks.
//
// Every background task the service starts is pushed here, and teardown is a
// single `dispose` call. Dropping the set disposes it as well.

use std::future::Future;

use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Default)]
pub struct SubscriptionSet {
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `task` on the current runtime and tracks it under `name`.
    pub fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.push(name, tokio::spawn(task));
    }

    pub fn push(&mut self, name: &'static str, handle: JoinHandle<()>) {
        self.handles.push((name, handle));
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Aborts every tracked task. Calling it again is a no-op.
    pub fn dispose(&mut self) {
        for (name, handle) in self.handles.drain(..) {
            debug!("Stopping {} subscription", name);
            handle.abort();
        }
    }
}

impl Drop for SubscriptionSet {
    fn drop(&mut self) {
        self.dispose();
    }
}
