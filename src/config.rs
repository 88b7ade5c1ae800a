// config.rs

use crate::error::Result;
use crate::midi::clock::{
    sanitize_bandwidth, GeneratorConfig, RecovererConfig, TempoMode, DEFAULT_BANDWIDTH,
};
use crate::transport::{sanitize_resync_delay, MessageFilter, DEFAULT_RESYNC_DELAY};
use log::{debug, warn, LevelFilter};
use std::path::Path;

pub const CLOCKS_PER_QUARTER_NOTE: u32 = 24;
pub const CLOCKS_PER_MIDI_BEAT: u32 = 6;
pub const MIDI_BEATS_PER_QUARTER_NOTE: i64 = 4;

pub const DEFAULT_SAMPLE_RATE: u32 = 48000;
pub const DEFAULT_PERIOD: u32 = 256;
pub const MAX_PERIOD: u32 = 8192;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 20;
pub const DEFAULT_BEATS_PER_BAR: u32 = 4;
pub const DEFAULT_HOST_BPM: f64 = 120.0;

/// Prefix of environment variables that override config file values.
pub const ENV_PREFIX: &str = "MCLKSYNC";

/// Resolved settings for both directions.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// DLL bandwidth [1/Hz]
    pub bandwidth: f64,
    /// default BPM when no timecode master is present, 0 = none
    pub bpm: f64,
    pub force_bpm: bool,
    /// seconds between Song Position and Continue
    pub resync_delay: f64,
    pub no_transport: bool,
    pub no_position: bool,
    pub strict_bpm: bool,
    pub sample_rate: u32,
    /// frames per processing cycle of the software transport
    pub period: u32,
    pub channel_capacity: usize,
    /// meter used to display received positions
    pub beats_per_bar: u32,
    /// tempo of the software transport when it acts as timecode master
    pub host_bpm: f64,
    /// whether the software transport provides bar|beat|tick
    pub timecode: bool,
    pub newline: bool,
    pub log_level: LevelFilter,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            bandwidth: DEFAULT_BANDWIDTH,
            bpm: 0.0,
            force_bpm: false,
            resync_delay: DEFAULT_RESYNC_DELAY,
            no_transport: false,
            no_position: false,
            strict_bpm: false,
            sample_rate: DEFAULT_SAMPLE_RATE,
            period: DEFAULT_PERIOD,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            beats_per_bar: DEFAULT_BEATS_PER_BAR,
            host_bpm: DEFAULT_HOST_BPM,
            timecode: true,
            newline: false,
            log_level: LevelFilter::Debug,
        }
    }
}

impl Settings {
    /// Layers defaults, an optional config file and `MCLKSYNC_*`
    /// environment variables.
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        let defaults = Settings::default();
        let mut builder = config::Config::builder()
            .set_default("bandwidth", defaults.bandwidth)?
            .set_default("bpm", defaults.bpm)?
            .set_default("force_bpm", defaults.force_bpm)?
            .set_default("resync_delay", defaults.resync_delay)?
            .set_default("no_transport", defaults.no_transport)?
            .set_default("no_position", defaults.no_position)?
            .set_default("strict_bpm", defaults.strict_bpm)?
            .set_default("sample_rate", i64::from(defaults.sample_rate))?
            .set_default("period", i64::from(defaults.period))?
            .set_default("channel_capacity", defaults.channel_capacity as i64)?
            .set_default("beats_per_bar", i64::from(defaults.beats_per_bar))?
            .set_default("host_bpm", defaults.host_bpm)?
            .set_default("timecode", defaults.timecode)?
            .set_default("newline", defaults.newline)?
            .set_default("log_level", defaults.log_level.as_str())?;

        if let Some(path) = path {
            debug!("Loading config file {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX));

        let cfg = builder.build()?;
        let log_level = cfg.get_string("log_level")?;

        Ok(Settings {
            bandwidth: cfg.get_float("bandwidth")?,
            bpm: cfg.get_float("bpm")?,
            force_bpm: cfg.get_bool("force_bpm")?,
            resync_delay: cfg.get_float("resync_delay")?,
            no_transport: cfg.get_bool("no_transport")?,
            no_position: cfg.get_bool("no_position")?,
            strict_bpm: cfg.get_bool("strict_bpm")?,
            sample_rate: int_setting(&cfg, "sample_rate", defaults.sample_rate)?,
            period: int_setting(&cfg, "period", defaults.period)?,
            channel_capacity: int_setting(&cfg, "channel_capacity", defaults.channel_capacity)?,
            beats_per_bar: int_setting(&cfg, "beats_per_bar", defaults.beats_per_bar)?,
            host_bpm: cfg.get_float("host_bpm")?,
            timecode: cfg.get_bool("timecode")?,
            newline: cfg.get_bool("newline")?,
            log_level: log_level.parse().unwrap_or_else(|_| {
                warn!("Unknown log level '{}', using debug", log_level);
                LevelFilter::Debug
            }),
        })
    }

    /// Replaces out-of-range values with their defaults. Never fails.
    pub fn validated(mut self) -> Settings {
        let defaults = Settings::default();

        self.bandwidth = sanitize_bandwidth(self.bandwidth);
        self.resync_delay = sanitize_resync_delay(self.resync_delay);

        if !(self.bpm.is_finite() && self.bpm >= 0.0) {
            warn!("Invalid BPM {}, disabling default tempo", self.bpm);
            self.bpm = 0.0;
        }
        if self.force_bpm && self.bpm == 0.0 {
            warn!("--force-bpm given without a BPM value, ignoring");
        }
        if !(self.host_bpm.is_finite() && self.host_bpm > 0.0) {
            warn!("Invalid host tempo {}, using {}", self.host_bpm, defaults.host_bpm);
            self.host_bpm = defaults.host_bpm;
        }
        if self.sample_rate == 0 {
            warn!("Invalid sample rate 0, using {}", defaults.sample_rate);
            self.sample_rate = defaults.sample_rate;
        }
        if self.period == 0 || self.period > MAX_PERIOD {
            warn!(
                "Invalid period {}, should be 1 <= period <= {}. Using {}",
                self.period, MAX_PERIOD, defaults.period
            );
            self.period = defaults.period;
        }
        if self.channel_capacity == 0 {
            warn!("Invalid channel capacity 0, using {}", defaults.channel_capacity);
            self.channel_capacity = defaults.channel_capacity;
        }
        if self.beats_per_bar == 0 {
            warn!("Invalid beats per bar 0, using {}", defaults.beats_per_bar);
            self.beats_per_bar = defaults.beats_per_bar;
        }
        self
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            user_bpm: self.bpm,
            force_bpm: self.force_bpm,
            resync_delay: self.resync_delay,
            filter: MessageFilter {
                no_transport: self.no_transport,
                no_position: self.no_position,
            },
            tempo_mode: if self.strict_bpm {
                TempoMode::StrictBeatsPerMinute
            } else {
                TempoMode::QuarterNotesPerMinute
            },
        }
    }

    pub fn recoverer_config(&self) -> RecovererConfig {
        RecovererConfig {
            sample_rate: f64::from(self.sample_rate),
            bandwidth: self.bandwidth,
            beats_per_bar: self.beats_per_bar,
        }
    }
}

// Negative or oversized integers fall back to the default, with a warning.
fn int_setting<T>(cfg: &config::Config, key: &str, default: T) -> Result<T>
where
    T: TryFrom<i64> + Copy + std::fmt::Display,
{
    let value = cfg.get_int(key)?;
    Ok(T::try_from(value).unwrap_or_else(|_| {
        warn!("Invalid {} {}, using {}", key, value, default);
        default
    }))
}
