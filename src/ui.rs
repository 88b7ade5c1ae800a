// ui.rs

use crate::event_loop::ReportSink;
use crate::midi::clock::{ClockReport, ClockTick};
use crate::midi::MIDI_SONG_POSITION;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

fn create_clock_spinner() -> ProgressBar {
    let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix("MCLK");
    pb
}

fn format_clock(tick: &ClockTick) -> String {
    let mut line = match (tick.bpm, tick.delta) {
        (Some(bpm), Some(dt)) => {
            let flt = tick
                .filtered_bpm
                .map_or_else(|| "    ??".to_string(), |f| format!("{:6.2}", f));
            format!(
                "CLK cur: {:6.2}[BPM] flt: {}[BPM]  dt: {:4}[sm] @ {}",
                bpm, flt, dt, tick.time
            )
        }
        _ => format!(
            "CLK cur:     ??[BPM] flt:     ??[BPM]  dt:   ??[sm] @ {}",
            tick.time
        ),
    };
    if let Some(pos) = tick.position {
        line.push_str(&format!("  {}", pos));
    }
    line
}

/// One line of dump output for `report`.
pub fn format_report(report: &ClockReport) -> String {
    match report {
        ClockReport::Clock(tick) => format_clock(tick),
        ClockReport::Transport {
            message,
            time,
            delta,
        } => {
            let mut line = format!(
                "EVENT (0x{:02x}) {:<38} @ {}",
                message.status(),
                message.name(),
                time
            );
            if let Some(dt) = delta {
                line.push_str(&format!("  dt: {}[sm]", dt));
            }
            line
        }
        ClockReport::SongPosition {
            position,
            time,
            display,
            ..
        } => format!(
            "EVENT (0x{:02x}) {:<38} @ {}",
            MIDI_SONG_POSITION,
            format!("song-position {} [{}]", position, display.to_string().trim()),
            time
        ),
    }
}

/// Prints recoverer reports to the terminal.
///
/// With `newline` every report gets its own line. Otherwise clock lines
/// overwrite each other on a spinner and only transport events scroll.
pub struct ConsolePresenter {
    newline: bool,
    spinner: Option<ProgressBar>,
}

impl ConsolePresenter {
    pub fn new(newline: bool) -> Self {
        ConsolePresenter {
            newline,
            spinner: (!newline).then(create_clock_spinner),
        }
    }

    fn print_event(&self, line: &str) {
        let stamp = chrono::Local::now().format("%H:%M:%S%.3f");
        match &self.spinner {
            Some(pb) => pb.suspend(|| println!("{} {}", stamp, line)),
            None => println!("{} {}", stamp, line),
        }
    }

    fn print_clock(&self, line: String) {
        match &self.spinner {
            Some(pb) if !pb.is_hidden() => {
                pb.set_message(line);
                pb.tick();
            }
            Some(_) => {
                use std::io::Write;
                print!("{}\r", line);
                std::io::stdout().flush().ok();
            }
            None => println!("{}", line),
        }
    }

    pub fn finish(&self) {
        if let Some(pb) = &self.spinner {
            pb.finish_and_clear();
        }
    }
}

impl ReportSink for ConsolePresenter {
    fn report(&mut self, report: &ClockReport) {
        let line = format_report(report);
        match report {
            ClockReport::Clock(_) => self.print_clock(line),
            _ => self.print_event(&line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::ClockMessage;
    use crate::transport::BarBeatTick;

    #[test]
    fn test_unknown_tempo_line() {
        let tick = ClockTick {
            time: 1234,
            delta: None,
            bpm: None,
            filtered_bpm: None,
            position: None,
        };
        assert_eq!(
            format_report(&ClockReport::Clock(tick)),
            "CLK cur:     ??[BPM] flt:     ??[BPM]  dt:   ??[sm] @ 1234"
        );
    }

    #[test]
    fn test_clock_line_with_position() {
        let tick = ClockTick {
            time: 3000,
            delta: Some(1000),
            bpm: Some(120.0),
            filtered_bpm: Some(119.996),
            position: Some(BarBeatTick {
                bar: 2,
                beat: 1,
                tick: 3,
            }),
        };
        assert_eq!(
            format_report(&ClockReport::Clock(tick)),
            "CLK cur: 120.00[BPM] flt: 120.00[BPM]  dt: 1000[sm] @ 3000    2| 1| 3"
        );
    }

    #[test]
    fn test_transport_line() {
        let line = format_report(&ClockReport::Transport {
            message: ClockMessage::Start,
            time: 48000,
            delta: None,
        });
        assert!(line.starts_with("EVENT (0xfa) start "));
        assert!(line.ends_with("@ 48000"));
    }

    #[test]
    fn test_song_position_line() {
        let line = format_report(&ClockReport::SongPosition {
            position: 68,
            time: 10,
            delta: None,
            display: BarBeatTick::from_song_position(68, 0, 4),
        });
        assert!(line.starts_with("EVENT (0xf2) song-position 68 [5| 2| 0]"));
    }

    #[test]
    fn test_presenter_without_terminal() {
        let mut presenter = ConsolePresenter::new(false);
        presenter.report(&ClockReport::Transport {
            message: ClockMessage::Start,
            time: 0,
            delta: None,
        });
        presenter.report(&ClockReport::Clock(ClockTick {
            time: 1000,
            delta: Some(1000),
            bpm: Some(120.0),
            filtered_bpm: None,
            position: None,
        }));
        presenter.finish();
    }
}
