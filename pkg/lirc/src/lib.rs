//! Client for the local infrared-remote socket: connects, parses keypress
//! lines, debounces repeats, and dispatches accepted presses without
//! blocking the socket reader.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixStream;

/// Notified once per accepted keypress. Implementations must not block; the
/// reader spawns each call so a slow handler can never stall the socket.
#[async_trait]
pub trait KeypressSink: Send + Sync + 'static {
    async fn on_keypress(&self, key_name: &str);
}

/// Four whitespace-separated fields: `code repeats name source`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct KeyEvent {
    name: String,
    repeats_zero: bool,
}

fn parse_line(line: &str) -> Option<KeyEvent> {
    let mut fields = line.split_whitespace();
    let _code = fields.next()?;
    let repeats = fields.next()?;
    let name = fields.next()?;
    let _source = fields.next()?;
    Some(KeyEvent {
        name: name.to_string(),
        repeats_zero: repeats == "0",
    })
}

struct Debouncer {
    min_delay: Duration,
    last: Option<(String, Instant)>,
}

impl Debouncer {
    fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last: None,
        }
    }

    /// True if this key should be dropped as a repeat within the debounce
    /// window.
    fn should_drop(&mut self, key_name: &str) -> bool {
        let now = Instant::now();
        let drop = match &self.last {
            Some((last_key, last_at)) if last_key == key_name => {
                now.duration_since(*last_at) < self.min_delay
            }
            _ => false,
        };
        if !drop {
            self.last = Some((key_name.to_string(), now));
        }
        drop
    }
}

/// Runs forever: connects to `socket`, reads keypress lines, and dispatches
/// debounced presses to `sink`. Reconnects after a fixed delay on any
/// connection loss.
pub async fn run<S>(socket: &Path, min_delay: Duration, sink: std::sync::Arc<S>) -> !
where
    S: KeypressSink,
{
    let mut debouncer = Debouncer::new(min_delay);
    loop {
        match UnixStream::connect(socket).await {
            Ok(stream) => {
                tracing::debug!(socket = %socket.display(), "connected to lirc socket");
                let mut lines = BufReader::new(stream).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => {
                            if line.is_empty() {
                                continue;
                            }
                            let Some(event) = parse_line(&line) else {
                                tracing::warn!(%line, "could not parse lirc line");
                                continue;
                            };
                            if !event.repeats_zero {
                                tracing::debug!(key = %event.name, "dropping repeated keypress");
                                continue;
                            }
                            if debouncer.should_drop(&event.name) {
                                tracing::debug!(key = %event.name, "dropping debounced keypress");
                                continue;
                            }
                            let sink = sink.clone();
                            let key_name = event.name.clone();
                            tokio::spawn(async move {
                                sink.on_keypress(&key_name).await;
                            });
                        }
                        Ok(None) => break,
                        Err(err) => {
                            tracing::warn!(%err, "error reading from lirc socket");
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                tracing::debug!(%err, socket = %socket.display(), "could not connect to lirc socket");
            }
        }
        tokio::time::sleep(pkg_constants::timeouts::LIRC_RECONNECT_DELAY).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_line() {
        let event = parse_line("00 0 KEY_OK lirc").unwrap();
        assert_eq!(event.name, "KEY_OK");
        assert!(event.repeats_zero);
    }

    #[test]
    fn rejects_short_line() {
        assert!(parse_line("00 0 KEY_OK").is_none());
    }

    #[test]
    fn repeats_field_nonzero_is_flagged() {
        let event = parse_line("00 1 KEY_OK lirc").unwrap();
        assert!(!event.repeats_zero);
    }

    #[test]
    fn debounce_drops_same_key_within_window() {
        let mut debouncer = Debouncer::new(Duration::from_millis(500));
        assert!(!debouncer.should_drop("KEY_OK"));
        assert!(debouncer.should_drop("KEY_OK"));
    }

    #[test]
    fn debounce_allows_different_key() {
        let mut debouncer = Debouncer::new(Duration::from_millis(500));
        assert!(!debouncer.should_drop("KEY_OK"));
        assert!(!debouncer.should_drop("KEY_UP"));
    }

    #[tokio::test]
    async fn debounce_allows_same_key_after_window() {
        let mut debouncer = Debouncer::new(Duration::from_millis(10));
        assert!(!debouncer.should_drop("KEY_OK"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!debouncer.should_drop("KEY_OK"));
    }
}
