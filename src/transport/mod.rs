//! Transport functionality
//!
//! This module models the host transport as seen by the clock engine:
//! - per-cycle transport snapshots (state, frame, tempo, bar|beat|tick)
//! - the transport state machine that turns state changes into
//!   Start/Stop/Continue and Song Position messages
//! - song position arithmetic (MIDI beats are sixteenth notes)
//!
//! `timing` provides a software transport host and `input` the command
//! parser used to drive it from the terminal.

pub mod input;
pub mod timing;

use crate::config::{CLOCKS_PER_MIDI_BEAT, CLOCKS_PER_QUARTER_NOTE, MIDI_BEATS_PER_QUARTER_NOTE};
use crate::midi::{ClockMessage, MidiSink, SONG_POSITION_LIMIT};
use log::warn;
use std::fmt;

pub const DEFAULT_RESYNC_DELAY: f64 = 2.0;
pub const MAX_RESYNC_DELAY: f64 = 20.0;

/// Returns `delay` if it lies in `[0, MAX_RESYNC_DELAY]` seconds, otherwise
/// warns and returns the default.
pub fn sanitize_resync_delay(delay: f64) -> f64 {
    if (0.0..=MAX_RESYNC_DELAY).contains(&delay) {
        delay
    } else {
        warn!(
            "Invalid resync-delay {}, should be 0 <= dly <= {}. Using {}sec",
            delay, MAX_RESYNC_DELAY, DEFAULT_RESYNC_DELAY
        );
        DEFAULT_RESYNC_DELAY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Starting,
    Rolling,
}

impl TransportState {
    /// State a clock receiver is in after `msg`.
    pub fn follow(self, msg: &ClockMessage) -> TransportState {
        match msg {
            ClockMessage::Start | ClockMessage::Continue => TransportState::Rolling,
            ClockMessage::Stop => TransportState::Stopped,
            _ => self,
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportState::Stopped => write!(f, "stopped"),
            TransportState::Starting => write!(f, "starting"),
            TransportState::Rolling => write!(f, "rolling"),
        }
    }
}

/// Musical position as reported by a timecode master. Bars and beats count
/// from 1, ticks from 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bbt {
    pub bar: i32,
    pub beat: i32,
    pub tick: i32,
    pub beats_per_bar: f64,
    pub beat_type: f64,
    pub ticks_per_beat: f64,
    pub beats_per_minute: f64,
}

impl Bbt {
    pub fn is_song_start(&self) -> bool {
        self.bar == 1 && self.beat == 1 && self.tick == 0
    }

    pub fn same_position(&self, other: &Bbt) -> bool {
        self.bar == other.bar && self.beat == other.beat && self.tick == other.tick
    }

    /// Song position in MIDI beats, plus `offset` MIDI beats.
    ///
    /// Not limited to 14 bits: the generator also compares against this to
    /// time deferred Continue messages.
    pub fn song_position(&self, offset: i64) -> i64 {
        let mb = MIDI_BEATS_PER_QUARTER_NOTE as f64;
        let pos = offset as f64
            + mb * (f64::from(self.bar - 1) * self.beats_per_bar + f64::from(self.beat - 1))
            + (mb * f64::from(self.tick) / self.ticks_per_beat).floor();
        pos as i64
    }

    /// MIDI beats covering `resync_delay` seconds at the current tempo; zero
    /// at 1|1|0 where playback starts with Start rather than Continue.
    pub fn resync_offset(&self, resync_delay: f64) -> i64 {
        if self.is_song_start() {
            0
        } else {
            (self.beats_per_minute * MIDI_BEATS_PER_QUARTER_NOTE as f64 * resync_delay / 60.0)
                .round() as i64
        }
    }
}

/// One cycle's view of the host transport. Read-only to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransportSnapshot {
    pub state: TransportState,
    pub frame: u64,
    pub frame_rate: u32,
    /// `None` when no timecode master provides bar|beat|tick
    pub bbt: Option<Bbt>,
    /// frames between the cycle start and the BBT reference point
    pub bbt_offset: Option<u32>,
}

/// Result of comparing the last remembered position with the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionChange {
    NoPreviousBbt,
    NoCurrentBbt,
    Unchanged,
    Changed,
}

impl PositionChange {
    pub fn compare(previous: Option<&Bbt>, current: Option<&Bbt>) -> Self {
        match (previous, current) {
            (None, _) => PositionChange::NoPreviousBbt,
            (_, None) => PositionChange::NoCurrentBbt,
            (Some(a), Some(b)) if a.same_position(b) => PositionChange::Unchanged,
            _ => PositionChange::Changed,
        }
    }

    /// Numeric discriminator: `-1` no previous BBT, `-2` no current BBT,
    /// `0` unchanged, `1` changed.
    pub fn code(self) -> i32 {
        match self {
            PositionChange::NoPreviousBbt => -1,
            PositionChange::NoCurrentBbt => -2,
            PositionChange::Unchanged => 0,
            PositionChange::Changed => 1,
        }
    }
}

/// Pending song position synchronisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SongPositionSync {
    #[default]
    Idle,
    /// playback started at 0 with a Start message
    FromStart,
    /// Continue is due once playback reaches this MIDI beat
    Pending(i64),
}

impl SongPositionSync {
    fn from_sent(sent: Option<i64>) -> Self {
        match sent {
            None => SongPositionSync::Idle,
            Some(0) => SongPositionSync::FromStart,
            Some(pos) => SongPositionSync::Pending(pos),
        }
    }
}

/// Which outgoing message classes are suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageFilter {
    /// no Start/Stop/Continue
    pub no_transport: bool,
    /// no Song Position Pointer
    pub no_position: bool,
}

/// Generator-side state carried from one cycle to the next.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SyncState {
    pub transport: TransportState,
    /// absolute frame of the last scheduled clock tick
    pub last_tick: f64,
    pub song_position_sync: SongPositionSync,
    pub last_position: Option<Bbt>,
}

/// Turns transport state changes into MIDI transport messages.
///
/// Holds configuration only; all mutable state lives in the [`SyncState`]
/// passed to [`drive`](Self::drive).
#[derive(Debug, Clone)]
pub struct TransportStateMachine {
    filter: MessageFilter,
    resync_delay: f64,
}

impl Default for TransportStateMachine {
    fn default() -> Self {
        Self::new(MessageFilter::default(), DEFAULT_RESYNC_DELAY)
    }
}

impl TransportStateMachine {
    pub fn new(filter: MessageFilter, resync_delay: f64) -> Self {
        Self {
            filter,
            resync_delay: sanitize_resync_delay(resync_delay),
        }
    }

    pub fn filter(&self) -> MessageFilter {
        self.filter
    }

    pub fn resync_delay(&self) -> f64 {
        self.resync_delay
    }

    /// Applies one cycle's transport snapshot. Messages are written at
    /// offset 0. Returns `true` if the transport state changed.
    pub fn drive<S: MidiSink>(
        &self,
        sync: &mut SyncState,
        snapshot: &TransportSnapshot,
        out: &mut S,
    ) -> bool {
        let state = snapshot.state;

        // locate while stopped
        if state == TransportState::Stopped
            && sync.transport == TransportState::Stopped
            && PositionChange::compare(sync.last_position.as_ref(), snapshot.bbt.as_ref())
                == PositionChange::Changed
        {
            sync.song_position_sync = self.send_position(out, snapshot, None);
        }
        if snapshot.bbt.is_some() {
            sync.last_position = snapshot.bbt;
        }

        if state == sync.transport {
            return false;
        }

        match state {
            TransportState::Stopped => {
                self.send_transport(out, ClockMessage::Stop);
                sync.song_position_sync = self.send_position(out, snapshot, None);
            }
            TransportState::Rolling
                if sync.transport == TransportState::Starting && !self.filter.no_position =>
            {
                // Rolling -> Starting -> Rolling: relocated while playing
                if sync.song_position_sync == SongPositionSync::Idle {
                    self.send_transport(out, ClockMessage::Stop);
                }
                if sync.song_position_sync != SongPositionSync::FromStart {
                    sync.song_position_sync = self.send_position(out, snapshot, None);
                    if sync.song_position_sync == SongPositionSync::Idle {
                        self.send_transport(out, ClockMessage::Continue);
                    }
                } else {
                    sync.song_position_sync = SongPositionSync::Idle;
                }
            }
            TransportState::Rolling | TransportState::Starting
                if sync.transport != TransportState::Starting =>
            {
                if snapshot.frame == 0 {
                    if !self.filter.no_transport {
                        self.send_transport(out, ClockMessage::Start);
                        sync.song_position_sync = SongPositionSync::FromStart;
                    }
                } else if self.filter.no_position {
                    // with song position, Continue is queued just in time
                    self.send_transport(out, ClockMessage::Continue);
                }
            }
            _ => {}
        }

        if state == TransportState::Rolling && (snapshot.frame == 0 || self.filter.no_position) {
            out.write(0, ClockMessage::Clock.bytes().as_slice());
        }

        sync.last_tick = snapshot.frame as f64;
        sync.transport = state;
        true
    }

    /// Song position for `snapshot`; `offset` of `None` selects the resync
    /// offset. `None` without BBT.
    pub fn song_position(&self, snapshot: &TransportSnapshot, offset: Option<i64>) -> Option<i64> {
        let bbt = snapshot.bbt.as_ref()?;
        let offset = offset.unwrap_or_else(|| bbt.resync_offset(self.resync_delay));
        Some(bbt.song_position(offset))
    }

    fn send_position<S: MidiSink>(
        &self,
        out: &mut S,
        snapshot: &TransportSnapshot,
        offset: Option<i64>,
    ) -> SongPositionSync {
        if self.filter.no_position {
            return SongPositionSync::Idle;
        }
        let sent = self
            .song_position(snapshot, offset)
            .filter(|pos| (0..SONG_POSITION_LIMIT).contains(pos))
            .filter(|pos| out.write(0, ClockMessage::SongPosition(*pos as u16).bytes().as_slice()));
        SongPositionSync::from_sent(sent)
    }

    fn send_transport<S: MidiSink>(&self, out: &mut S, msg: ClockMessage) {
        if !self.filter.no_transport {
            out.write(0, msg.bytes().as_slice());
        }
    }
}

/// Bar|beat|tick as displayed by a clock receiver, ticks being MIDI clocks
/// within the quarter note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarBeatTick {
    pub bar: u64,
    pub beat: u64,
    pub tick: u64,
}

impl BarBeatTick {
    /// Position `clocks` MIDI clocks after song start.
    pub fn from_clocks(clocks: u64, beats_per_bar: u32) -> Self {
        let beats_per_bar = u64::from(beats_per_bar.max(1));
        let per_quarter = u64::from(CLOCKS_PER_QUARTER_NOTE);
        let quarters = clocks / per_quarter;
        BarBeatTick {
            bar: quarters / beats_per_bar + 1,
            beat: quarters % beats_per_bar + 1,
            tick: clocks % per_quarter,
        }
    }

    /// Position of a song position pointer plus `clocks` clocks of progress.
    pub fn from_song_position(midi_beats: u64, clocks: u64, beats_per_bar: u32) -> Self {
        Self::from_clocks(
            midi_beats * u64::from(CLOCKS_PER_MIDI_BEAT) + clocks,
            beats_per_bar,
        )
    }
}

impl fmt::Display for BarBeatTick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:3}|{:2}|{:2}", self.bar, self.beat, self.tick)
    }
}
