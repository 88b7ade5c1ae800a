//! Software transport host.
//!
//! Plays the role of an audio server's transport: it keeps the playhead,
//! tempo and meter, and produces one [`TransportSnapshot`] per processing
//! cycle. Like a real host it passes through `Starting` for one cycle
//! whenever playback begins or the playhead moves while rolling.

use super::input::TransportCommand;
use super::{Bbt, TransportSnapshot, TransportState};
use crate::config::{DEFAULT_BEATS_PER_BAR, DEFAULT_HOST_BPM, DEFAULT_SAMPLE_RATE};
use log::{info, warn};
use std::fmt;
use std::str::FromStr;

/// BBT tick resolution of the software transport.
pub const TICKS_PER_BEAT: f64 = 1920.0;

/// Time signature, e.g. `6/8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Meter {
    pub beats_per_bar: u32,
    pub beat_type: u32,
}

impl Default for Meter {
    fn default() -> Self {
        Meter {
            beats_per_bar: DEFAULT_BEATS_PER_BAR,
            beat_type: 4,
        }
    }
}

impl FromStr for Meter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (upper, lower) = s
            .split_once('/')
            .ok_or_else(|| format!("invalid meter '{}', expected e.g. 4/4", s))?;
        let beats_per_bar: u32 = upper
            .trim()
            .parse()
            .map_err(|_| format!("invalid beats per bar '{}'", upper))?;
        let beat_type: u32 = lower
            .trim()
            .parse()
            .map_err(|_| format!("invalid beat type '{}'", lower))?;
        if beats_per_bar == 0 || !beat_type.is_power_of_two() {
            return Err(format!("unsupported meter '{}'", s));
        }
        Ok(Meter {
            beats_per_bar,
            beat_type,
        })
    }
}

impl fmt::Display for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats_per_bar, self.beat_type)
    }
}

#[derive(Debug, Clone)]
pub struct SoftTransport {
    state: TransportState,
    frame: u64,
    frame_rate: u32,
    /// playhead in beats since song start
    beats: f64,
    bpm: f64,
    meter: Meter,
    /// whether BBT is provided at all
    timecode: bool,
}

impl Default for SoftTransport {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE, DEFAULT_HOST_BPM, Meter::default(), true)
    }
}

impl SoftTransport {
    pub fn new(frame_rate: u32, bpm: f64, meter: Meter, timecode: bool) -> Self {
        SoftTransport {
            state: TransportState::Stopped,
            frame: 0,
            frame_rate: frame_rate.max(1),
            beats: 0.0,
            bpm: if bpm > 0.0 { bpm } else { DEFAULT_HOST_BPM },
            meter,
            timecode,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn meter(&self) -> Meter {
        self.meter
    }

    pub fn play(&mut self) {
        if self.state == TransportState::Stopped {
            self.state = TransportState::Starting;
        }
    }

    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
    }

    /// Moves the playhead to the start of `bar|beat`.
    pub fn locate(&mut self, bar: u32, beat: u32) {
        let bar = bar.max(1);
        let beat = beat.clamp(1, self.meter.beats_per_bar);
        self.beats =
            f64::from(bar - 1) * f64::from(self.meter.beats_per_bar) + f64::from(beat - 1);
        self.frame = (self.beats * 60.0 / self.bpm * f64::from(self.frame_rate)).round() as u64;
        if self.state == TransportState::Rolling {
            self.state = TransportState::Starting;
        }
    }

    pub fn set_tempo(&mut self, bpm: f64) {
        if bpm.is_finite() && bpm > 0.0 {
            self.bpm = bpm;
        } else {
            warn!("Ignoring invalid tempo {}", bpm);
        }
    }

    /// Applies a command; returns `false` for [`TransportCommand::Quit`].
    pub fn apply(&mut self, command: TransportCommand) -> bool {
        info!("Transport command: {}", command);
        match command {
            TransportCommand::Play => self.play(),
            TransportCommand::Stop => self.stop(),
            TransportCommand::Locate { bar, beat } => self.locate(bar, beat),
            TransportCommand::Tempo(bpm) => self.set_tempo(bpm),
            TransportCommand::Quit => return false,
        }
        true
    }

    /// Transport as seen by the current cycle.
    pub fn snapshot(&self) -> TransportSnapshot {
        TransportSnapshot {
            state: self.state,
            frame: self.frame,
            frame_rate: self.frame_rate,
            bbt: self.timecode.then(|| self.bbt()),
            bbt_offset: None,
        }
    }

    /// Ends the current cycle of `nframes` frames.
    pub fn advance(&mut self, nframes: u32) {
        match self.state {
            TransportState::Starting => self.state = TransportState::Rolling,
            TransportState::Rolling => {
                self.frame += u64::from(nframes);
                self.beats +=
                    f64::from(nframes) / f64::from(self.frame_rate) * self.bpm / 60.0;
            }
            TransportState::Stopped => {}
        }
    }

    fn bbt(&self) -> Bbt {
        let beats_per_bar = f64::from(self.meter.beats_per_bar);
        let bar = (self.beats / beats_per_bar).floor();
        let in_bar = self.beats - bar * beats_per_bar;
        let beat = in_bar.floor();
        let tick = ((in_bar - beat) * TICKS_PER_BEAT).floor();
        Bbt {
            bar: bar as i32 + 1,
            beat: beat as i32 + 1,
            tick: tick as i32,
            beats_per_bar,
            beat_type: f64::from(self.meter.beat_type),
            ticks_per_beat: TICKS_PER_BEAT,
            beats_per_minute: self.bpm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meter_parsing() {
        assert_eq!(
            "6/8".parse::<Meter>(),
            Ok(Meter {
                beats_per_bar: 6,
                beat_type: 8
            })
        );
        assert!("4".parse::<Meter>().is_err());
        assert!("0/4".parse::<Meter>().is_err());
        assert!("4/3".parse::<Meter>().is_err());
        assert_eq!(Meter::default().to_string(), "4/4");
    }

    #[test]
    fn test_play_passes_through_starting() {
        let mut transport = SoftTransport::default();
        transport.play();
        assert_eq!(transport.snapshot().state, TransportState::Starting);
        transport.advance(256);
        assert_eq!(transport.snapshot().state, TransportState::Rolling);
        assert_eq!(transport.frame(), 0);
        transport.advance(256);
        assert_eq!(transport.frame(), 256);
    }

    #[test]
    fn test_bbt_follows_playhead() {
        let mut transport = SoftTransport::default();
        transport.play();
        transport.advance(256);
        // 120 bpm: one beat is 24000 frames
        for _ in 0..5 {
            transport.advance(24000);
        }
        let bbt = transport.snapshot().bbt.unwrap();
        assert_eq!((bbt.bar, bbt.beat, bbt.tick), (2, 2, 0));
    }

    #[test]
    fn test_locate_while_rolling_restarts() {
        let mut transport = SoftTransport::default();
        transport.play();
        transport.advance(256);
        transport.locate(3, 1);
        let snapshot = transport.snapshot();
        assert_eq!(snapshot.state, TransportState::Starting);
        assert_eq!(snapshot.frame, 192_000);
        let bbt = snapshot.bbt.unwrap();
        assert_eq!((bbt.bar, bbt.beat), (3, 1));
    }

    #[test]
    fn test_without_timecode() {
        let transport = SoftTransport::new(44100, 90.0, Meter::default(), false);
        assert_eq!(transport.snapshot().bbt, None);
        assert_eq!(transport.snapshot().frame_rate, 44100);
    }

    #[test]
    fn test_quit_command() {
        let mut transport = SoftTransport::default();
        assert!(transport.apply(TransportCommand::Tempo(140.0)));
        assert_eq!(transport.bpm(), 140.0);
        assert!(!transport.apply(TransportCommand::Quit));
    }
}
