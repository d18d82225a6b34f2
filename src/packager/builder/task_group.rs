//! Structured fan-out over platforms.
//!
//! Tasks run concurrently on the runtime. [`TaskGroup::join_all`] waits for
//! every one of them and returns their results in spawn order; a task that
//! fails or panics never cancels its siblings. Dropping a group without
//! joining aborts whatever is still running.

use crate::packager::{Error, Result};
use std::future::Future;
use tokio::task::{JoinError, JoinHandle};

/// A set of labelled tasks joined together.
pub struct TaskGroup<T> {
    tasks: Vec<(String, JoinHandle<T>)>,
}

impl<T: Send + 'static> TaskGroup<T> {
    /// Creates an empty group.
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Starts `future` immediately.
    pub fn spawn<F>(&mut self, label: impl Into<String>, future: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        self.tasks.push((label.into(), tokio::spawn(future)));
    }

    /// Waits for every task. A panicked task yields [`Error::TaskPanicked`].
    pub async fn join_all(mut self) -> Vec<Result<T>> {
        let tasks = std::mem::take(&mut self.tasks);
        let mut results = Vec::with_capacity(tasks.len());
        for (label, handle) in tasks {
            results.push(handle.await.map_err(|e| panicked(&label, e)));
        }
        results
    }
}

impl<T: Send + 'static> Default for TaskGroup<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for TaskGroup<T> {
    fn drop(&mut self) {
        for (_, handle) in &self.tasks {
            handle.abort();
        }
    }
}

fn panicked(label: &str, error: JoinError) -> Error {
    if !error.is_panic() {
        return Error::TaskPanicked(format!("{label}: {error}"));
    }
    let payload = error.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    Error::TaskPanicked(format!("{label}: {message}"))
}
