use crate::error::Result;

/// MIDI System Real-Time status bytes.
pub const MIDI_RT_CLOCK: u8 = 0xF8;
pub const MIDI_RT_START: u8 = 0xFA;
pub const MIDI_RT_CONTINUE: u8 = 0xFB;
pub const MIDI_RT_STOP: u8 = 0xFC;
/// Song Position Pointer (System Common), followed by LSB and MSB.
pub const MIDI_SONG_POSITION: u8 = 0xF2;

/// Song position values are 14 bit MIDI-beat counts.
pub const SONG_POSITION_LIMIT: i64 = 16384;

/// The subset of MIDI messages that make up the beat clock protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMessage {
    /// Timing clock, 24 per quarter note
    Clock,
    Start,
    Continue,
    Stop,
    /// Absolute position in MIDI beats (six clocks each)
    SongPosition(u16),
}

impl ClockMessage {
    /// Parses one complete MIDI message. Anything that is not part of the
    /// beat clock protocol yields `None`.
    pub fn parse(data: &[u8]) -> Option<Self> {
        match *data {
            [MIDI_RT_CLOCK] => Some(ClockMessage::Clock),
            [MIDI_RT_START] => Some(ClockMessage::Start),
            [MIDI_RT_CONTINUE] => Some(ClockMessage::Continue),
            [MIDI_RT_STOP] => Some(ClockMessage::Stop),
            [MIDI_SONG_POSITION, lsb, msb] => Some(ClockMessage::SongPosition(
                (u16::from(msb & 0x7F) << 7) | u16::from(lsb & 0x7F),
            )),
            _ => None,
        }
    }

    pub fn status(&self) -> u8 {
        match self {
            ClockMessage::Clock => MIDI_RT_CLOCK,
            ClockMessage::Start => MIDI_RT_START,
            ClockMessage::Continue => MIDI_RT_CONTINUE,
            ClockMessage::Stop => MIDI_RT_STOP,
            ClockMessage::SongPosition(_) => MIDI_SONG_POSITION,
        }
    }

    /// Wire encoding, without allocating.
    pub fn bytes(&self) -> MessageBytes {
        match *self {
            ClockMessage::SongPosition(pos) => MessageBytes {
                data: [
                    MIDI_SONG_POSITION,
                    (pos & 0x7F) as u8,
                    ((pos >> 7) & 0x7F) as u8,
                ],
                len: 3,
            },
            other => MessageBytes {
                data: [other.status(), 0, 0],
                len: 1,
            },
        }
    }

    /// Start, Continue and Stop.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClockMessage::Start | ClockMessage::Continue | ClockMessage::Stop
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClockMessage::Clock => "clk",
            ClockMessage::Start => "start",
            ClockMessage::Continue => "continue",
            ClockMessage::Stop => "stop",
            ClockMessage::SongPosition(_) => "song-position",
        }
    }
}

/// Encoded form of a [`ClockMessage`], at most three bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageBytes {
    data: [u8; 3],
    len: usize,
}

impl MessageBytes {
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

/// A protocol message stamped with the monotonic sample count at which it
/// was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedEvent {
    pub message: ClockMessage,
    pub time: u64,
}

impl TimedEvent {
    pub fn new(message: ClockMessage, time: u64) -> Self {
        Self { message, time }
    }
}

/// Per-cycle MIDI port buffer: the host reserves `bytes.len()` bytes at a
/// sample offset within the current cycle.
///
/// Implementations must not block or allocate. Returns `false` when the
/// buffer cannot take the event, in which case the caller drops it.
pub trait MidiSink {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> bool;
}

/// A connected MIDI output that sends bytes immediately.
pub trait MidiOutput: Send {
    fn send(&mut self, bytes: &[u8]) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_realtime_messages() {
        assert_eq!(ClockMessage::parse(&[0xF8]), Some(ClockMessage::Clock));
        assert_eq!(ClockMessage::parse(&[0xFA]), Some(ClockMessage::Start));
        assert_eq!(ClockMessage::parse(&[0xFB]), Some(ClockMessage::Continue));
        assert_eq!(ClockMessage::parse(&[0xFC]), Some(ClockMessage::Stop));
    }

    #[test]
    fn test_parse_song_position() {
        // 300 = 2 * 128 + 44
        assert_eq!(
            ClockMessage::parse(&[0xF2, 44, 2]),
            Some(ClockMessage::SongPosition(300))
        );
        // data bytes are masked to seven bits
        assert_eq!(
            ClockMessage::parse(&[0xF2, 0xFF, 0xFF]),
            Some(ClockMessage::SongPosition(16383))
        );
    }

    #[test]
    fn test_parse_discards_other_messages() {
        assert_eq!(ClockMessage::parse(&[]), None);
        assert_eq!(ClockMessage::parse(&[0x90, 60, 100]), None);
        assert_eq!(ClockMessage::parse(&[0xFE]), None); // active sensing
        assert_eq!(ClockMessage::parse(&[0xF2, 1]), None);
        assert_eq!(ClockMessage::parse(&[0xF8, 0xF8]), None);
    }

    #[test]
    fn test_song_position_bytes() {
        let msg = ClockMessage::SongPosition(300);
        assert_eq!(msg.bytes().as_slice(), &[0xF2, 44, 2]);
        assert_eq!(ClockMessage::parse(msg.bytes().as_slice()), Some(msg));
    }

    #[test]
    fn test_single_byte_encoding() {
        assert_eq!(ClockMessage::Stop.bytes().as_slice(), &[0xFC]);
        assert!(ClockMessage::Stop.is_transport());
        assert!(!ClockMessage::Clock.is_transport());
    }
}
