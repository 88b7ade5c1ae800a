//! Runs the clock generator against the software transport at wall-clock
//! pace and forwards the scheduled events to a MIDI output.

use crate::error::Result;
use crate::midi::clock::{ClockGenerator, CycleReport};
use crate::midi::{EventBuffer, MidiOutput};
use crate::shutdown::CancellationToken;
use crate::transport::input::TransportCommand;
use crate::transport::timing::SoftTransport;
use crossbeam::channel::{Receiver, TryRecvError};
use log::{debug, info};
use std::thread;
use std::time::{Duration, Instant};

pub struct CycleDriver<O> {
    transport: SoftTransport,
    generator: ClockGenerator,
    buffer: EventBuffer,
    output: O,
    period: u32,
    cycles: u64,
}

impl<O: MidiOutput> CycleDriver<O> {
    pub fn new(transport: SoftTransport, generator: ClockGenerator, output: O, period: u32) -> Self {
        CycleDriver {
            transport,
            generator,
            buffer: EventBuffer::default(),
            output,
            period: period.max(1),
            cycles: 0,
        }
    }

    pub fn transport(&self) -> &SoftTransport {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut SoftTransport {
        &mut self.transport
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    fn cycle_duration(&self, frames: u64) -> Duration {
        let rate = f64::from(self.transport.snapshot().frame_rate);
        Duration::from_secs_f64(frames as f64 / rate)
    }

    /// Runs one processing cycle. With `pace`, the cycle's start time, each
    /// event is sent at its in-cycle offset; without it, immediately.
    pub fn cycle(&mut self, pace: Option<Instant>) -> Result<CycleReport> {
        let snapshot = self.transport.snapshot();
        self.buffer.clear();
        let report = self
            .generator
            .process(&snapshot, self.period, &mut self.buffer);

        if let Some(state) = report.transition {
            info!("Transport {} at frame {}", state, snapshot.frame);
        }

        for event in self.buffer.events() {
            if let Some(start) = pace {
                let due = start + self.cycle_duration(u64::from(event.offset));
                let now = Instant::now();
                if due > now {
                    thread::sleep(due - now);
                }
            }
            self.output.send(event.bytes())?;
        }

        self.transport.advance(self.period);
        self.cycles += 1;
        Ok(report)
    }

    /// Cycles at wall-clock pace, applying commands between cycles, until
    /// `token` is cancelled or a `quit` command arrives.
    pub fn run(
        &mut self,
        commands: &Receiver<TransportCommand>,
        token: &CancellationToken,
    ) -> Result<()> {
        let started = Instant::now();
        let first_cycle = self.cycles;
        info!(
            "Driving {} frame cycles at {} Hz",
            self.period,
            self.transport.snapshot().frame_rate
        );

        while !token.is_cancelled() {
            loop {
                match commands.try_recv() {
                    Ok(command) => {
                        if !self.transport.apply(command) {
                            token.cancel();
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        debug!("Command input closed");
                        break;
                    }
                }
            }
            if token.is_cancelled() {
                break;
            }

            let elapsed = (self.cycles - first_cycle) * u64::from(self.period);
            let start = started + self.cycle_duration(elapsed);
            let now = Instant::now();
            if start > now {
                thread::sleep(start - now);
            }
            self.cycle(Some(start))?;
        }
        info!("Cycle driver stopped after {} cycles", self.cycles);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::clock::GeneratorConfig;
    use crate::midi::MockMidiOutput;
    use crate::transport::timing::Meter;

    #[test]
    fn test_cycles_send_start_and_clock() {
        let output = MockMidiOutput::new();
        let transport = SoftTransport::new(48000, 120.0, Meter::default(), true);
        let mut driver = CycleDriver::new(
            transport,
            ClockGenerator::new(GeneratorConfig::default()),
            output.clone(),
            256,
        );
        driver.transport_mut().play();

        // Starting, then the first rolling cycle
        driver.cycle(None).unwrap();
        driver.cycle(None).unwrap();
        assert_eq!(output.sent(), vec![vec![0xFA], vec![0xF8]]);

        for _ in 0..4 {
            driver.cycle(None).unwrap();
        }
        // 1000 frames per clock, 1280 frames rolled
        assert_eq!(output.sent().len(), 3);
    }

    #[test]
    fn test_quit_command_cancels() {
        let (tx, rx) = crossbeam::channel::unbounded();
        tx.send(TransportCommand::Quit).unwrap();
        let token = CancellationToken::new();
        let mut driver = CycleDriver::new(
            SoftTransport::default(),
            ClockGenerator::default(),
            MockMidiOutput::new(),
            256,
        );
        driver.run(&rx, &token).unwrap();
        assert!(token.is_cancelled());
        assert!(driver.output().sent().is_empty());
    }

    #[test]
    fn test_send_failure_is_fatal() {
        let output = MockMidiOutput::failing();
        let mut driver = CycleDriver::new(
            SoftTransport::default(),
            ClockGenerator::default(),
            output,
            256,
        );
        driver.transport_mut().play();
        assert!(driver.cycle(None).is_err());
    }
}
