use crate::channel::EventProducer;
use crate::error::{Error, Result};
use crate::midi::{ClockMessage, MidiOutput, TimedEvent};
use log::{debug, info};
use midir::{Ignore, MidiInputConnection, MidiOutputConnection};

const CLIENT_NAME: &str = "mclksync";
const OUTPUT_PORT_NAME: &str = "mclk_out";
const INPUT_PORT_NAME: &str = "mclk_in";

/// Converts a midir timestamp (microseconds) to a sample count.
pub fn micros_to_samples(stamp: u64, sample_rate: u32) -> u64 {
    ((u128::from(stamp) * u128::from(sample_rate) + 500_000) / 1_000_000) as u64
}

fn find_port<P>(ports: Vec<P>, name: &str, port_name: impl Fn(&P) -> Option<String>) -> Result<P> {
    ports
        .into_iter()
        .find(|p| port_name(p).unwrap_or_default().contains(name))
        .ok_or_else(|| Error::DeviceNotFound(name.to_string()))
}

/// Beat clock output on a real MIDI port.
pub struct MidirOutput {
    connection: MidiOutputConnection,
}

impl MidirOutput {
    /// Connects to the first output port whose name contains `device_name`.
    /// Without a name, opens a virtual port other applications can connect
    /// to.
    pub fn connect(device_name: Option<&str>) -> Result<Self> {
        let midi_out = midir::MidiOutput::new(CLIENT_NAME)?;

        let connection = match device_name {
            Some(name) => {
                let port = find_port(midi_out.ports(), name, |p| midi_out.port_name(p).ok())?;
                let port_name = midi_out.port_name(&port)?;
                let connection = midi_out.connect(&port, OUTPUT_PORT_NAME)?;
                info!("Sending MIDI clock to {}", port_name);
                connection
            }
            None => Self::virtual_port(midi_out)?,
        };
        Ok(MidirOutput { connection })
    }

    #[cfg(unix)]
    fn virtual_port(midi_out: midir::MidiOutput) -> Result<MidiOutputConnection> {
        use midir::os::unix::VirtualOutput;
        let connection = midi_out.create_virtual(OUTPUT_PORT_NAME)?;
        info!("Created virtual output port {}:{}", CLIENT_NAME, OUTPUT_PORT_NAME);
        Ok(connection)
    }

    #[cfg(not(unix))]
    fn virtual_port(_midi_out: midir::MidiOutput) -> Result<MidiOutputConnection> {
        Err(Error::Connection(
            "virtual ports are not supported on this platform, name an output port".to_string(),
        ))
    }
}

impl MidiOutput for MidirOutput {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.connection.send(bytes)?;
        Ok(())
    }
}

/// Beat clock input. Keeps the connection open while alive; received
/// clock messages go to the event channel stamped in samples.
pub struct MidirInput {
    #[allow(dead_code)]
    connection: MidiInputConnection<()>,
}

impl MidirInput {
    pub fn connect(
        device_name: Option<&str>,
        producer: EventProducer,
        sample_rate: u32,
    ) -> Result<Self> {
        let mut midi_in = midir::MidiInput::new(CLIENT_NAME)?;
        midi_in.ignore(Ignore::None);

        // runs on the backend's input thread: no allocation, no blocking
        let callback = move |stamp: u64, message: &[u8], _: &mut ()| {
            if let Some(msg) = ClockMessage::parse(message) {
                producer.try_push(TimedEvent::new(msg, micros_to_samples(stamp, sample_rate)));
            }
        };

        let connection = match device_name {
            Some(name) => {
                let port = find_port(midi_in.ports(), name, |p| midi_in.port_name(p).ok())?;
                let port_name = midi_in.port_name(&port)?;
                let connection = midi_in.connect(&port, INPUT_PORT_NAME, callback, ())?;
                info!("Receiving MIDI clock from {}", port_name);
                connection
            }
            None => Self::virtual_port(midi_in, callback)?,
        };
        debug!("Input timestamps converted at {} Hz", sample_rate);
        Ok(MidirInput { connection })
    }

    #[cfg(unix)]
    fn virtual_port<F>(midi_in: midir::MidiInput, callback: F) -> Result<MidiInputConnection<()>>
    where
        F: FnMut(u64, &[u8], &mut ()) + Send + 'static,
    {
        use midir::os::unix::VirtualInput;
        let connection = midi_in.create_virtual(INPUT_PORT_NAME, callback, ())?;
        info!("Created virtual input port {}:{}", CLIENT_NAME, INPUT_PORT_NAME);
        Ok(connection)
    }

    #[cfg(not(unix))]
    fn virtual_port<F>(_midi_in: midir::MidiInput, _callback: F) -> Result<MidiInputConnection<()>>
    where
        F: FnMut(u64, &[u8], &mut ()) + Send + 'static,
    {
        Err(Error::Connection(
            "virtual ports are not supported on this platform, name an input port".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_micros_to_samples() {
        assert_eq!(micros_to_samples(0, 48000), 0);
        assert_eq!(micros_to_samples(1_000_000, 48000), 48000);
        // 20833us is one tick at 120 bpm
        assert_eq!(micros_to_samples(20_833, 48000), 1000);
        assert_eq!(micros_to_samples(10, 44100), 0);
    }
}
