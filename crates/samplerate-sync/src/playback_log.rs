//! Player log scraping.
//!
//! The player does not expose the sample rate of the current track through any API, but it
//! reports the stream format in its console log. [`CommandLogSource`] runs the platform log
//! tool and pulls the rates out of its output.

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::Duration;

use crate::error::{Result, SyncError};
use crate::matcher::is_valid_rate;

/// One playback record observed in the player log.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackEvent {
    /// Sample rate of the content in Hz.
    pub sample_rate: f64,
    /// Raw log line the rate was read from.
    pub source_line: String,
}

/// Source of recent playback events, most recent first.
pub trait PlaybackLogSource: Send {
    fn recent_events(&self) -> Result<Vec<PlaybackEvent>>;
}

/// Playback log source that shells out to a log tool and parses its stdout.
#[derive(Clone, Debug)]
pub struct CommandLogSource {
    program: String,
    args: Vec<String>,
    rate_keys: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandLogSource {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        rate_keys: Vec<String>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            rate_keys,
            timeout,
        }
    }

    fn run(&self) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SyncError::LogUnavailable(format!("spawn {}: {e}", self.program)))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| SyncError::LogUnavailable("log command has no stdout".to_string()))?;

        // Drain on a helper thread so a chatty command cannot stall on a full pipe.
        let (tx, rx) = crossbeam_channel::bounded(1);
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let res = stdout.read_to_end(&mut buf).map(|_| buf);
            let _ = tx.send(res);
        });

        let read = match self.timeout {
            Some(timeout) => match rx.recv_timeout(timeout) {
                Ok(res) => res,
                Err(_) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(SyncError::LogUnavailable(format!(
                        "{} timed out after {} ms",
                        self.program,
                        timeout.as_millis()
                    )));
                }
            },
            None => rx
                .recv()
                .map_err(|_| SyncError::LogUnavailable("log reader exited".to_string()))?,
        };
        let bytes = read.map_err(|e| SyncError::LogUnavailable(format!("read log output: {e}")))?;

        let status = child
            .wait()
            .map_err(|e| SyncError::LogUnavailable(format!("wait {}: {e}", self.program)))?;
        if !status.success() {
            return Err(SyncError::LogUnavailable(format!(
                "{} exited with {status}",
                self.program
            )));
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl PlaybackLogSource for CommandLogSource {
    fn recent_events(&self) -> Result<Vec<PlaybackEvent>> {
        let output = self.run()?;
        Ok(parse_playback_events(&output, &self.rate_keys))
    }
}

/// Extract playback events from chronological log text.
///
/// Every line carrying one of `rate_keys` followed by a number yields one event. The result
/// is ordered most recent first.
pub fn parse_playback_events(text: &str, rate_keys: &[String]) -> Vec<PlaybackEvent> {
    let keys: Vec<String> = rate_keys
        .iter()
        .map(|k| k.trim().to_ascii_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    let mut events: Vec<PlaybackEvent> = text
        .lines()
        .filter_map(|line| {
            parse_line_rate(line, &keys).map(|sample_rate| PlaybackEvent {
                sample_rate,
                source_line: line.trim().to_string(),
            })
        })
        .collect();
    events.reverse();
    events
}

fn parse_line_rate(line: &str, keys: &[String]) -> Option<f64> {
    let lower = line.to_ascii_lowercase();
    for key in keys {
        let mut from = 0;
        while let Some(pos) = lower[from..].find(key.as_str()) {
            let after = from + pos + key.len();
            if let Some(rate) = parse_rate_value(&lower[after..]) {
                return Some(rate);
            }
            from = after;
        }
    }
    None
}

/// Parse `": 44100"`, `"=44.1 kHz"` and similar. Unit-less values below 1000 are kHz.
fn parse_rate_value(rest: &str) -> Option<f64> {
    let rest = rest.trim_start_matches(|c: char| matches!(c, ' ' | '\t' | ':' | '=' | '"' | '\''));
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    let value: f64 = rest[..end].parse().ok()?;
    let unit = rest[end..].trim_start();
    let hz = if unit.starts_with("khz") {
        value * 1000.0
    } else if unit.starts_with("hz") {
        value
    } else if value < 1000.0 {
        value * 1000.0
    } else {
        value
    };
    is_valid_rate(hz).then_some(hz)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> Vec<String> {
        vec!["sampleRate".to_string(), "sample rate".to_string()]
    }

    #[test]
    fn parse_returns_most_recent_first() {
        let log = "\
2024-05-01 10:00:00 Music: format sampleRate: 44100 bitDepth: 16
2024-05-01 10:03:00 Music: unrelated line
2024-05-01 10:04:00 Music: format sampleRate: 96000 bitDepth: 24
";
        let events = parse_playback_events(log, &keys());
        let rates: Vec<f64> = events.iter().map(|e| e.sample_rate).collect();
        assert_eq!(rates, vec![96_000.0, 44_100.0]);
        assert!(events[0].source_line.ends_with("bitDepth: 24"));
    }

    #[test]
    fn parse_accepts_khz_units() {
        let events = parse_playback_events("Sample Rate = 88.2 kHz", &keys());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sample_rate, 88_200.0);
    }

    #[test]
    fn parse_treats_small_unitless_values_as_khz() {
        let events = parse_playback_events("asbdSampleRate=44.1", &keys());
        assert_eq!(events[0].sample_rate, 44_100.0);
    }

    #[test]
    fn parse_accepts_explicit_hz() {
        let events = parse_playback_events("sampleRate: 192000 Hz", &keys());
        assert_eq!(events[0].sample_rate, 192_000.0);
    }

    #[test]
    fn parse_skips_keys_without_numbers() {
        let log = "sampleRate unknown\nsampleRate: n/a, sample rate: 48000";
        let events = parse_playback_events(log, &keys());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sample_rate, 48_000.0);
    }

    #[test]
    fn parse_ignores_garbage_and_zero_rates() {
        let log = "no rates here\nsampleRate: 0\nsampleRate: .\n";
        assert!(parse_playback_events(log, &keys()).is_empty());
    }

    #[test]
    fn parse_with_no_keys_finds_nothing() {
        assert!(parse_playback_events("sampleRate: 44100", &[]).is_empty());
        assert!(parse_playback_events("sampleRate: 44100", &["  ".to_string()]).is_empty());
    }

    #[test]
    fn missing_program_is_log_unavailable() {
        let source = CommandLogSource::new(
            "samplerate-sync-definitely-missing-binary",
            Vec::new(),
            keys(),
            None,
        );
        assert!(matches!(
            source.recent_events(),
            Err(SyncError::LogUnavailable(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn command_output_is_parsed() {
        let source = CommandLogSource::new(
            "sh",
            vec![
                "-c".to_string(),
                "printf 'sampleRate: 44100\\nsampleRate: 48000\\n'".to_string(),
            ],
            keys(),
            Some(Duration::from_secs(5)),
        );
        let events = source.recent_events().unwrap();
        assert_eq!(events[0].sample_rate, 48_000.0);
        assert_eq!(events[1].sample_rate, 44_100.0);
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_is_log_unavailable() {
        let source = CommandLogSource::new("sh", vec!["-c".into(), "exit 3".into()], keys(), None);
        assert!(matches!(
            source.recent_events(),
            Err(SyncError::LogUnavailable(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn slow_command_times_out() {
        let source = CommandLogSource::new(
            "sh",
            vec!["-c".into(), "sleep 5".into()],
            keys(),
            Some(Duration::from_millis(100)),
        );
        assert!(matches!(
            source.recent_events(),
            Err(SyncError::LogUnavailable(_))
        ));
    }
}
