pub mod channel;
pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod event_loop;
pub mod logging;
pub mod midi;
pub mod scheduler;
pub mod shutdown;
pub mod transport;
pub mod ui;

// Re-export commonly used items
pub use channel::{event_channel, ChannelWaker, EventConsumer, EventProducer};
pub use cli::{validate_device, Args, Command};
pub use config::Settings;
pub use driver::CycleDriver;
pub use error::{Error, Result};
pub use event_loop::{EventLoop, ReportSink};
pub use scheduler::{Scheduler, ThreadScheduler};
pub use shutdown::CancellationToken;

pub fn handle_device_list() -> Vec<String> {
    midi::list_devices()
}

pub fn create_scheduler() -> ThreadScheduler {
    ThreadScheduler::new()
}
