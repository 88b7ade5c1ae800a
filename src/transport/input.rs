use crate::shutdown::CancellationToken;
use crossbeam::channel::Sender;
use log::{debug, warn};
use std::fmt;
use std::io::{self, BufRead};
use std::str::FromStr;
use std::thread;

/// Commands accepted on stdin while generating clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportCommand {
    Play,
    Stop,
    Locate { bar: u32, beat: u32 },
    Tempo(f64),
    Quit,
}

impl FromStr for TransportCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let command = words.next().ok_or_else(|| "empty command".to_string())?;
        let mut number = |what: &str| -> Result<Option<f64>, String> {
            words
                .next()
                .map(|w| w.parse::<f64>().map_err(|_| format!("invalid {} '{}'", what, w)))
                .transpose()
        };

        match command.to_ascii_lowercase().as_str() {
            "play" | "start" => Ok(TransportCommand::Play),
            "stop" => Ok(TransportCommand::Stop),
            "locate" => {
                let bar = number("bar")?.ok_or_else(|| "locate needs a bar".to_string())?;
                let beat = number("beat")?.unwrap_or(1.0);
                if bar < 1.0 || beat < 1.0 {
                    return Err("bar and beat count from 1".to_string());
                }
                Ok(TransportCommand::Locate {
                    bar: bar as u32,
                    beat: beat as u32,
                })
            }
            "tempo" => {
                let bpm = number("tempo")?.ok_or_else(|| "tempo needs a BPM value".to_string())?;
                Ok(TransportCommand::Tempo(bpm))
            }
            "quit" | "exit" => Ok(TransportCommand::Quit),
            other => Err(format!("unknown command '{}'", other)),
        }
    }
}

impl fmt::Display for TransportCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportCommand::Play => write!(f, "play"),
            TransportCommand::Stop => write!(f, "stop"),
            TransportCommand::Locate { bar, beat } => write!(f, "locate {} {}", bar, beat),
            TransportCommand::Tempo(bpm) => write!(f, "tempo {}", bpm),
            TransportCommand::Quit => write!(f, "quit"),
        }
    }
}

/// Reads commands from stdin on a background thread until EOF, `quit`
/// or cancellation.
pub fn spawn_command_reader(
    tx: Sender<TransportCommand>,
    token: CancellationToken,
) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("stdin-commands".into())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                if token.is_cancelled() {
                    break;
                }
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<TransportCommand>() {
                    Ok(command) => {
                        debug!("Read command: {}", command);
                        if tx.send(command).is_err() || command == TransportCommand::Quit {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("{}", e);
                        eprintln!("{}", e);
                    }
                }
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!("play".parse(), Ok(TransportCommand::Play));
        assert_eq!(" STOP ".parse(), Ok(TransportCommand::Stop));
        assert_eq!(
            "locate 5 2".parse(),
            Ok(TransportCommand::Locate { bar: 5, beat: 2 })
        );
        assert_eq!(
            "locate 9".parse(),
            Ok(TransportCommand::Locate { bar: 9, beat: 1 })
        );
        assert_eq!("tempo 98.5".parse(), Ok(TransportCommand::Tempo(98.5)));
        assert_eq!("quit".parse(), Ok(TransportCommand::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert!("".parse::<TransportCommand>().is_err());
        assert!("locate".parse::<TransportCommand>().is_err());
        assert!("locate 0".parse::<TransportCommand>().is_err());
        assert!("tempo fast".parse::<TransportCommand>().is_err());
        assert!("rewind".parse::<TransportCommand>().is_err());
    }
}
