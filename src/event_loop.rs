// event_loop.rs

use crate::channel::EventConsumer;
use crate::midi::clock::{ClockRecoverer, ClockReport};
use crate::shutdown::CancellationToken;
use log::{info, warn};

/// Receives every report the recoverer produces.
pub trait ReportSink {
    fn report(&mut self, report: &ClockReport);
}

impl<F: FnMut(&ClockReport)> ReportSink for F {
    fn report(&mut self, report: &ClockReport) {
        self(report)
    }
}

/// Worker side of the receive path: drains the event channel into the
/// recoverer and hands the results to a sink.
pub struct EventLoop<S> {
    consumer: EventConsumer,
    recoverer: ClockRecoverer,
    sink: S,
    dropped_seen: u64,
}

impl<S: ReportSink> EventLoop<S> {
    pub fn new(consumer: EventConsumer, recoverer: ClockRecoverer, sink: S) -> Self {
        EventLoop {
            consumer,
            recoverer,
            sink,
            dropped_seen: 0,
        }
    }

    pub fn recoverer(&self) -> &ClockRecoverer {
        &self.recoverer
    }

    /// Processes events until `token` is cancelled.
    pub fn run(&mut self, token: &CancellationToken) {
        info!("Event loop running");
        let consumer = &self.consumer;
        let recoverer = &mut self.recoverer;
        let sink = &mut self.sink;
        let dropped_seen = &mut self.dropped_seen;

        consumer.run(token, |event| {
            let dropped = consumer.dropped();
            if dropped > *dropped_seen {
                warn!(
                    "Event queue overflow, {} clock events dropped",
                    dropped - *dropped_seen
                );
                *dropped_seen = dropped;
            }
            let report = recoverer.handle(event);
            sink.report(&report);
        });
        info!("Event loop stopped");
    }

    /// Processes whatever is queued right now, without waiting.
    pub fn poll(&mut self) -> usize {
        let recoverer = &mut self.recoverer;
        let sink = &mut self.sink;
        self.consumer.drain(|event| {
            let report = recoverer.handle(event);
            sink.report(&report);
        })
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::event_channel;
    use crate::midi::{ClockMessage, TimedEvent};

    #[test]
    fn test_poll_feeds_recoverer() {
        let (tx, rx) = event_channel(8);
        tx.try_push(TimedEvent::new(ClockMessage::Start, 0));
        tx.try_push(TimedEvent::new(ClockMessage::Clock, 0));
        tx.try_push(TimedEvent::new(ClockMessage::Clock, 1000));

        let mut reports = Vec::new();
        let mut event_loop =
            EventLoop::new(rx, ClockRecoverer::default(), |r: &ClockReport| reports.push(*r));
        assert_eq!(event_loop.poll(), 3);
        assert_eq!(event_loop.recoverer().state().sequence, 2);
        drop(event_loop);

        assert_eq!(reports.len(), 3);
        assert!(matches!(
            reports[0],
            ClockReport::Transport {
                message: ClockMessage::Start,
                ..
            }
        ));
        match reports[2] {
            ClockReport::Clock(tick) => assert_eq!(tick.delta, Some(1000)),
            other => panic!("unexpected report {:?}", other),
        }
    }
}
