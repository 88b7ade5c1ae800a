//! Per-cycle MIDI beat clock scheduling.

use crate::config::{CLOCKS_PER_MIDI_BEAT, CLOCKS_PER_QUARTER_NOTE};
use crate::midi::{ClockMessage, MidiSink};
use crate::transport::{
    MessageFilter, SongPositionSync, SyncState, TransportSnapshot, TransportState,
    TransportStateMachine, DEFAULT_RESYNC_DELAY,
};

/// How the host's "beats per minute" relates to quarter notes.
///
/// Most DAWs report quarter notes per minute regardless of the meter; some
/// use the time signature denominator as the beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TempoMode {
    #[default]
    QuarterNotesPerMinute,
    StrictBeatsPerMinute,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorConfig {
    /// fallback tempo when no timecode master is present, 0 = none
    pub user_bpm: f64,
    /// use `user_bpm` even when the host reports a tempo
    pub force_bpm: bool,
    /// seconds between Song Position and the deferred Continue
    pub resync_delay: f64,
    pub filter: MessageFilter,
    pub tempo_mode: TempoMode,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            user_bpm: 0.0,
            force_bpm: false,
            resync_delay: DEFAULT_RESYNC_DELAY,
            filter: MessageFilter::default(),
            tempo_mode: TempoMode::default(),
        }
    }
}

/// What happened during one processing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleReport {
    /// new transport state, if it changed this cycle
    pub transition: Option<TransportState>,
    /// clock ticks written by the tick loop, excluding the initial tick
    /// of a transition
    pub clocks: u32,
}

/// Generates MIDI beat clock from host transport snapshots.
///
/// `process` runs inside the host's real-time cycle: it neither allocates
/// nor blocks, and events the sink refuses are dropped.
#[derive(Debug, Clone)]
pub struct ClockGenerator {
    config: GeneratorConfig,
    machine: TransportStateMachine,
    sync: SyncState,
}

impl Default for ClockGenerator {
    fn default() -> Self {
        Self::new(GeneratorConfig::default())
    }
}

impl ClockGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        let machine = TransportStateMachine::new(config.filter, config.resync_delay);
        Self {
            config: GeneratorConfig {
                resync_delay: machine.resync_delay(),
                ..config
            },
            machine,
            sync: SyncState::default(),
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn sync_state(&self) -> &SyncState {
        &self.sync
    }

    /// Runs one cycle of `nframes` frames, writing transport messages at
    /// offset 0 and clock ticks at their sample offsets.
    pub fn process<S: MidiSink>(
        &mut self,
        snapshot: &TransportSnapshot,
        nframes: u32,
        out: &mut S,
    ) -> CycleReport {
        let mut report = CycleReport::default();
        if self.machine.drive(&mut self.sync, snapshot, out) {
            report.transition = Some(snapshot.state);
        }

        if snapshot.state != TransportState::Rolling {
            return report;
        }

        let Some((samples_per_quarter_note, bbt_offset)) = self.samples_per_quarter_note(snapshot)
        else {
            return report; // no tempo known
        };
        let interval = samples_per_quarter_note / f64::from(CLOCKS_PER_QUARTER_NOTE);
        if !(interval.is_finite() && interval > 0.0) {
            return report;
        }

        let origin = snapshot.frame as i64 + i64::from(bbt_offset);
        // after a frame jump, skip whole intervals so the loop below stays
        // bounded; the tick phase is kept
        let behind = origin as f64 - self.sync.last_tick;
        if behind >= 2.0 * interval {
            let skipped = (behind / interval).floor() - 1.0;
            self.sync.last_tick += skipped * interval;
        }
        let mut clocks_this_cycle = 0u32;
        loop {
            let next_tick = self.sync.last_tick + interval;
            let offset = next_tick.round() as i64 - origin;
            if offset >= i64::from(nframes) {
                break;
            }

            if offset >= 0 {
                let offset = offset as u32;
                self.emit_deferred_continue(snapshot, clocks_this_cycle, offset, out);
                if out.write(offset, ClockMessage::Clock.bytes().as_slice()) {
                    report.clocks += 1;
                }
            }

            // carried across cycles, never reset to the cycle start
            self.sync.last_tick = next_tick;
            clocks_this_cycle += 1;
        }
        report
    }

    fn samples_per_quarter_note(&self, snapshot: &TransportSnapshot) -> Option<(f64, u32)> {
        let rate = f64::from(snapshot.frame_rate);
        let user_bpm = self.config.user_bpm;
        let host_bbt = snapshot.bbt.filter(|bbt| bbt.beats_per_minute > 0.0);

        let (samples_per_beat, bbt_offset) = if self.config.force_bpm && user_bpm > 0.0 {
            (rate * 60.0 / user_bpm, 0)
        } else if let Some(bbt) = host_bbt {
            (
                rate * 60.0 / bbt.beats_per_minute,
                snapshot.bbt_offset.unwrap_or(0),
            )
        } else if user_bpm > 0.0 {
            (rate * 60.0 / user_bpm, 0)
        } else {
            return None;
        };

        let quarter_notes_per_beat = match (self.config.tempo_mode, snapshot.bbt) {
            (TempoMode::StrictBeatsPerMinute, Some(bbt)) if bbt.beat_type > 0.0 => {
                bbt.beat_type / 4.0
            }
            _ => 1.0,
        };
        Some((samples_per_beat / quarter_notes_per_beat, bbt_offset))
    }

    /// Sends the Continue queued behind a Song Position once playback has
    /// reached the sync point.
    fn emit_deferred_continue<S: MidiSink>(
        &mut self,
        snapshot: &TransportSnapshot,
        clocks_this_cycle: u32,
        offset: u32,
        out: &mut S,
    ) {
        let SongPositionSync::Pending(target) = self.sync.song_position_sync else {
            return;
        };
        let filter = self.machine.filter();
        if filter.no_position {
            return;
        }
        // Without BBT the position can no longer be tracked; continue now
        // rather than leave the receiver waiting.
        let reached = self
            .machine
            .song_position(snapshot, Some(0))
            .map_or(true, |pos| {
                pos + i64::from(clocks_this_cycle / CLOCKS_PER_MIDI_BEAT) >= target
            });
        if reached {
            if !filter.no_transport {
                out.write(offset, ClockMessage::Continue.bytes().as_slice());
            }
            self.sync.song_position_sync = SongPositionSync::Idle;
        }
    }
}
