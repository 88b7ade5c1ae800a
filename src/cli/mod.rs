use crate::config::Settings;
use crate::transport::timing::Meter;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// List available MIDI devices
    #[arg(long)]
    pub device_list: bool,

    /// Read settings from this file (TOML, YAML, JSON or INI)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate MIDI beat clock from the transport
    Generate(GenerateArgs),
    /// Print received MIDI beat clock with its tempo
    Dump(DumpArgs),
}

#[derive(ClapArgs, Debug, Default)]
pub struct GenerateArgs {
    /// Default tempo when the transport has no timecode
    #[arg(short = 'b', long)]
    pub bpm: Option<f64>,

    /// Use --bpm even when the transport reports a tempo
    #[arg(short = 'B', long)]
    pub force_bpm: bool,

    /// Seconds between Song Position and Continue after a relocate
    #[arg(short = 'd', long)]
    pub resync_delay: Option<f64>,

    /// Do not send Song Position Pointer messages
    #[arg(short = 'P', long)]
    pub no_position: bool,

    /// Do not send Start, Stop and Continue
    #[arg(short = 'T', long)]
    pub no_transport: bool,

    /// Treat the tempo as beats (of the meter's beat type) per minute
    #[arg(short = 's', long)]
    pub strict_bpm: bool,

    #[arg(long)]
    pub samplerate: Option<u32>,

    /// Frames per processing cycle
    #[arg(long)]
    pub period: Option<u32>,

    /// Time signature of the transport, e.g. 6/8
    #[arg(long, default_value_t = Meter::default())]
    pub meter: Meter,

    /// Run the transport without bar|beat|tick
    #[arg(long)]
    pub no_timecode: bool,

    /// Output port, matched by name substring; a virtual port if omitted
    pub port: Option<String>,
}

#[derive(ClapArgs, Debug, Default)]
pub struct DumpArgs {
    /// DLL bandwidth in 1/Hz
    #[arg(short = 'b', long)]
    pub bandwidth: Option<f64>,

    /// Print every clock on its own line
    #[arg(short = 'n', long)]
    pub newline: bool,

    #[arg(long)]
    pub samplerate: Option<u32>,

    /// Meter used to display song positions
    #[arg(long)]
    pub beats_per_bar: Option<u32>,

    /// Input port, matched by name substring; a virtual port if omitted
    pub port: Option<String>,
}

impl GenerateArgs {
    /// Overlays the flags that were given onto `settings`.
    pub fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(bpm) = self.bpm {
            settings.bpm = bpm;
        }
        if let Some(delay) = self.resync_delay {
            settings.resync_delay = delay;
        }
        if let Some(rate) = self.samplerate {
            settings.sample_rate = rate;
        }
        if let Some(period) = self.period {
            settings.period = period;
        }
        settings.force_bpm |= self.force_bpm;
        settings.no_position |= self.no_position;
        settings.no_transport |= self.no_transport;
        settings.strict_bpm |= self.strict_bpm;
        if self.no_timecode {
            settings.timecode = false;
        }
        settings
    }
}

impl DumpArgs {
    pub fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(bandwidth) = self.bandwidth {
            settings.bandwidth = bandwidth;
        }
        if let Some(rate) = self.samplerate {
            settings.sample_rate = rate;
        }
        if let Some(beats) = self.beats_per_bar {
            settings.beats_per_bar = beats;
        }
        settings.newline |= self.newline;
        settings
    }
}

pub fn validate_device(device_name: &str, devices: &[String]) -> Result<(), String> {
    if !devices.iter().any(|d| d.contains(device_name)) {
        let mut error_msg = format!(
            "Error: Device '{}' not found in available devices:\n",
            device_name
        );
        for device in devices {
            error_msg.push_str(&format!("  - {}\n", device));
        }
        return Err(error_msg);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_flags_override_settings() {
        let args = Args::parse_from([
            "mclksync", "generate", "-b", "100", "-B", "-d", "0.5", "-P", "--meter", "6/8", "Synth",
        ]);
        let Some(Command::Generate(generate)) = args.command else {
            panic!("expected generate");
        };
        assert_eq!(generate.port.as_deref(), Some("Synth"));
        assert_eq!(generate.meter.beat_type, 8);

        let settings = generate.apply(Settings::default());
        assert_eq!(settings.bpm, 100.0);
        assert!(settings.force_bpm);
        assert_eq!(settings.resync_delay, 0.5);
        assert!(settings.no_position);
        assert!(!settings.no_transport);
    }

    #[test]
    fn test_dump_keeps_unset_values() {
        let args = Args::parse_from(["mclksync", "dump", "-n"]);
        let Some(Command::Dump(dump)) = args.command else {
            panic!("expected dump");
        };
        let base = Settings {
            bandwidth: 3.0,
            ..Settings::default()
        };
        let settings = dump.apply(base);
        assert_eq!(settings.bandwidth, 3.0);
        assert!(settings.newline);
    }

    #[test]
    fn test_validate_device_lists_candidates() {
        let devices = vec!["Alpha".to_string(), "Beta".to_string()];
        assert!(validate_device("Alp", &devices).is_ok());
        let err = validate_device("Gamma", &devices).unwrap_err();
        assert!(err.contains("  - Beta"));
    }
}
