//! MIDI functionality for mclksync
//!
//! This module provides the MIDI side of beat clock sync, including:
//! - Beat clock message types and their wire encoding
//! - Per-cycle event buffers the generator writes into
//! - MIDI clock generation and tempo recovery
//! - Real MIDI device communication via midir
//! - Mock implementations for testing
//!
//! The main components are:
//! - [`MidiSink`] trait for in-cycle event buffers and [`EventBuffer`]
//! - [`MidiOutput`] trait for connected outputs, [`MidirOutput`] and
//!   [`MockMidiOutput`]
//! - [`MidirInput`] feeding received clock into an event channel
//! - [`ClockGenerator`] and [`ClockRecoverer`]
//!
mod buffer;
pub mod clock;
mod engine;
pub mod midir_engine;
pub mod mock_engine;

pub use buffer::{BufferedEvent, EventBuffer, DEFAULT_BUFFER_EVENTS};
pub use engine::{
    ClockMessage, MessageBytes, MidiOutput, MidiSink, TimedEvent, MIDI_RT_CLOCK, MIDI_RT_CONTINUE,
    MIDI_RT_START, MIDI_RT_STOP, MIDI_SONG_POSITION, SONG_POSITION_LIMIT,
};

pub use clock::{ClockGenerator, ClockRecoverer, ClockReport, GeneratorConfig, RecovererConfig};

pub use midir_engine::{MidirInput, MidirOutput};
pub use mock_engine::MockMidiOutput;

/// Names of all MIDI input and output ports.
#[cfg(not(feature = "test-mock"))]
pub fn list_devices() -> Vec<String> {
    let mut devices = Vec::new();

    if let Ok(midi_in) = midir::MidiInput::new("mclksync-list") {
        for port in midi_in.ports() {
            if let Ok(name) = midi_in.port_name(&port) {
                devices.push(format!("{} [Input]", name));
            }
        }
    }
    if let Ok(midi_out) = midir::MidiOutput::new("mclksync-list") {
        for port in midi_out.ports() {
            if let Ok(name) = midi_out.port_name(&port) {
                devices.push(format!("{} [Output]", name));
            }
        }
    }

    devices
}

#[cfg(feature = "test-mock")]
pub fn list_devices() -> Vec<String> {
    // Mock implementation for tests - simple format as expected by tests
    vec!["Mock Device 1".to_string(), "Mock Device 2".to_string()]
}
