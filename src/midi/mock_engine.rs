use crate::error::{Error, Result};
use crate::midi::MidiOutput;
use std::sync::{Arc, Mutex, PoisonError};

/// Records everything sent to it. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct MockMidiOutput {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    fail: bool,
}

impl MockMidiOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// An output whose every send fails, like a disconnected port.
    pub fn failing() -> Self {
        MockMidiOutput {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl MidiOutput for MockMidiOutput {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        if self.fail {
            return Err(Error::Send("mock output disconnected".to_string()));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(bytes.to_vec());
        Ok(())
    }
}
