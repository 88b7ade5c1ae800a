//! Tempo and transport recovery from received MIDI beat clock.

use super::dll::{ClockFilter, DEFAULT_BANDWIDTH};
use crate::config::{
    CLOCKS_PER_MIDI_BEAT, CLOCKS_PER_QUARTER_NOTE, DEFAULT_BEATS_PER_BAR, DEFAULT_SAMPLE_RATE,
};
use crate::midi::{ClockMessage, TimedEvent};
use crate::transport::{BarBeatTick, TransportState};
use log::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecovererConfig {
    /// rate of the sample clock the event timestamps count in
    pub sample_rate: f64,
    pub bandwidth: f64,
    /// meter used to display song positions
    pub beats_per_bar: u32,
}

impl Default for RecovererConfig {
    fn default() -> Self {
        Self {
            sample_rate: f64::from(DEFAULT_SAMPLE_RATE),
            bandwidth: DEFAULT_BANDWIDTH,
            beats_per_bar: DEFAULT_BEATS_PER_BAR,
        }
    }
}

/// Receiver-side sequence tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequenceState {
    pub previous_clock: Option<u64>,
    /// timestamp of the previous event of any kind
    pub previous_event: Option<u64>,
    /// clocks since the last Start/Continue/Stop
    pub sequence: u64,
    /// MIDI beats, when known
    pub song_position: Option<u64>,
    /// time of the last Start/Continue, `None` while stopped
    pub started_at: Option<u64>,
}

/// A received clock tick with the tempo derived from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockTick {
    pub time: u64,
    /// samples since the previous clock of this sequence
    pub delta: Option<u64>,
    /// tempo from the last interval alone
    pub bpm: Option<f64>,
    /// DLL-smoothed tempo, available from the third clock on
    pub filtered_bpm: Option<f64>,
    pub position: Option<BarBeatTick>,
}

/// What the recoverer learned from one event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockReport {
    Transport {
        message: ClockMessage,
        time: u64,
        /// samples since the previous event of any kind
        delta: Option<u64>,
    },
    SongPosition {
        position: u16,
        time: u64,
        delta: Option<u64>,
        display: BarBeatTick,
    },
    Clock(ClockTick),
}

/// Consumes received events in arrival order and reports tempo and
/// transport state.
#[derive(Debug, Clone)]
pub struct ClockRecoverer {
    config: RecovererConfig,
    filter: ClockFilter,
    state: SequenceState,
    transport: TransportState,
}

impl Default for ClockRecoverer {
    fn default() -> Self {
        Self::new(RecovererConfig::default())
    }
}

impl ClockRecoverer {
    pub fn new(config: RecovererConfig) -> Self {
        let filter = ClockFilter::new(config.bandwidth);
        Self {
            config: RecovererConfig {
                bandwidth: filter.bandwidth(),
                ..config
            },
            filter,
            state: SequenceState::default(),
            transport: TransportState::Stopped,
        }
    }

    pub fn state(&self) -> &SequenceState {
        &self.state
    }

    pub fn transport(&self) -> TransportState {
        self.transport
    }

    pub fn handle(&mut self, event: TimedEvent) -> ClockReport {
        let delta = self
            .state
            .previous_event
            .map(|prev| event.time.saturating_sub(prev));
        self.state.previous_event = Some(event.time);

        match event.message {
            ClockMessage::Clock => ClockReport::Clock(self.handle_clock(event.time)),
            ClockMessage::SongPosition(position) => {
                self.state.song_position = Some(u64::from(position));
                debug!("Song position {} MIDI beats", position);
                ClockReport::SongPosition {
                    position,
                    time: event.time,
                    delta,
                    display: BarBeatTick::from_song_position(
                        u64::from(position),
                        0,
                        self.config.beats_per_bar,
                    ),
                }
            }
            message => {
                self.handle_transport(message, event.time);
                ClockReport::Transport {
                    message,
                    time: event.time,
                    delta,
                }
            }
        }
    }

    fn handle_transport(&mut self, message: ClockMessage, time: u64) {
        match message {
            ClockMessage::Start => {
                self.state.song_position = Some(0);
                self.state.started_at = Some(time);
            }
            ClockMessage::Continue => {
                self.state.started_at = Some(time);
            }
            ClockMessage::Stop => {
                // keep the place reached, so a later Continue resumes there
                if self.transport == TransportState::Rolling {
                    let played = self.state.sequence / u64::from(CLOCKS_PER_MIDI_BEAT);
                    self.state.song_position = self.state.song_position.map(|pos| pos + played);
                }
                self.state.started_at = None;
            }
            _ => {}
        }
        self.state.sequence = 0;
        self.filter.reset();
        self.transport = self.transport.follow(&message);
        info!("Clock transport {} ({})", message.name(), self.transport);
    }

    fn handle_clock(&mut self, time: u64) -> ClockTick {
        let sample_rate = self.config.sample_rate;
        let delta = match self.state.previous_clock {
            Some(prev) if self.state.sequence > 0 => Some(time.saturating_sub(prev)),
            _ => None,
        };
        let bpm = delta
            .filter(|dt| *dt > 0)
            .map(|dt| 60.0 * sample_rate / (f64::from(CLOCKS_PER_QUARTER_NOTE) * dt as f64));

        let seconds = time as f64 / sample_rate;
        // the filter starts at the first usable interval, not at a fixed clock
        let filtered_bpm = match delta {
            Some(dt) if !self.filter.is_initialized() => {
                if dt > 0 {
                    self.filter.initialize(seconds, dt as f64 / sample_rate);
                }
                None
            }
            Some(_) => self
                .filter
                .advance(seconds)
                .filter(|period| *period > 0.0)
                .map(|period| 60.0 / (f64::from(CLOCKS_PER_QUARTER_NOTE) * period)),
            None => None,
        };

        let position = self.state.song_position.map(|midi_beats| {
            let progress = if self.transport == TransportState::Rolling {
                self.state.sequence
            } else {
                0
            };
            BarBeatTick::from_song_position(midi_beats, progress, self.config.beats_per_bar)
        });

        self.state.previous_clock = Some(time);
        self.state.sequence += 1;

        ClockTick {
            time,
            delta,
            bpm,
            filtered_bpm,
            position,
        }
    }
}
