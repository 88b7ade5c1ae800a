//! Fixed-capacity cycle buffer, the in-process stand-in for a host MIDI
//! port buffer.

use super::engine::{ClockMessage, MidiSink};

/// Default number of events one cycle can hold.
pub const DEFAULT_BUFFER_EVENTS: usize = 64;

/// One event reserved in the cycle buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferedEvent {
    pub offset: u32,
    data: [u8; 3],
    len: u8,
}

impl BufferedEvent {
    pub fn bytes(&self) -> &[u8] {
        &self.data[..usize::from(self.len)]
    }

    pub fn message(&self) -> Option<ClockMessage> {
        ClockMessage::parse(self.bytes())
    }
}

/// Collects the events written during one processing cycle.
///
/// Storage is reserved up front; `write` never reallocates and refuses
/// events once the capacity is reached or when they arrive out of order.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<BufferedEvent>,
    capacity: usize,
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_EVENTS)
    }
}

impl EventBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Empties the buffer at the start of a cycle.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn events(&self) -> &[BufferedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Decoded view of the buffer as `(offset, message)` pairs.
    pub fn messages(&self) -> impl Iterator<Item = (u32, ClockMessage)> + '_ {
        self.events
            .iter()
            .filter_map(|ev| ev.message().map(|msg| (ev.offset, msg)))
    }
}

impl MidiSink for EventBuffer {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> bool {
        if self.events.len() >= self.capacity || bytes.is_empty() || bytes.len() > 3 {
            return false;
        }
        // host MIDI buffers only accept events in time order
        if self.events.last().is_some_and(|last| last.offset > offset) {
            return false;
        }
        let mut data = [0u8; 3];
        data[..bytes.len()].copy_from_slice(bytes);
        self.events.push(BufferedEvent {
            offset,
            data,
            len: bytes.len() as u8,
        });
        true
    }
}
