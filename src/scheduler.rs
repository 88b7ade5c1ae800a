use crate::error::Result;
use std::thread;

pub trait Scheduler {
    /// Runs `f` on a new named thread.
    fn spawn<F, T>(&self, name: &str, f: F) -> Result<thread::JoinHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static;
}

pub struct ThreadScheduler;

impl ThreadScheduler {
    pub fn new() -> Self {
        ThreadScheduler
    }
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ThreadScheduler {
    fn spawn<F, T>(&self, name: &str, f: F) -> Result<thread::JoinHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        Ok(thread::Builder::new().name(name.to_string()).spawn(f)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_scheduler_spawn() {
        let scheduler = ThreadScheduler::new();
        let handle = scheduler
            .spawn("test-worker", || {
                thread::current().name().map(str::to_string)
            })
            .unwrap();
        assert_eq!(handle.join().unwrap(), Some("test-worker".to_string()));
    }
}
