//! Cooperative shutdown.
//!
//! Worker loops poll a [`CancellationToken`]; the signal shim below is the
//! only place that knows about POSIX signals.

use crate::channel::ChannelWaker;
use crate::error::Result;
use log::info;
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Shared stop flag. Cloning is cheap.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Cancels `token` on SIGINT, SIGTERM or SIGHUP and wakes the consumer
/// behind `waker`, if any.
pub fn install_signal_handlers(
    token: CancellationToken,
    waker: Option<ChannelWaker>,
) -> Result<thread::JoinHandle<()>> {
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;
    let handle = thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!("Caught signal {}, shutting down", signal);
                token.cancel();
                if let Some(waker) = &waker {
                    waker.wake();
                }
            }
        })?;
    Ok(handle)
}
