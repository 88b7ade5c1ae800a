//! MIDI clock generation and tempo recovery
pub mod dll;
pub mod generator;
pub mod recoverer;

pub use dll::{sanitize_bandwidth, ClockFilter, ClockFilterState, DEFAULT_BANDWIDTH};
pub use generator::{ClockGenerator, CycleReport, GeneratorConfig, TempoMode};
pub use recoverer::{ClockRecoverer, ClockReport, ClockTick, RecovererConfig, SequenceState};
