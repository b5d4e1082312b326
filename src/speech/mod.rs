//! Speech-to-text seam
//!
//! The recognizer is an external collaborator. While this participant holds
//! the recorder role the session starts it and consumes its events:
//! finalized/interim text deltas, errors and end-of-stream.

pub mod nats;

use anyhow::Result;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;

pub use nats::NatsSpeechEngine;

/// Event emitted by a running recognizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// Newly finalized text (may be empty) and the current interim text
    Result { final_text: String, interim: String },
    Error(SpeechErrorKind),
    /// The recognizer stopped on its own
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechErrorKind {
    NoSpeech,
    Network,
    Aborted,
    NotAllowed,
    AudioCapture,
    LanguageNotSupported,
    ServiceNotAllowed,
    Other,
}

impl SpeechErrorKind {
    /// Faults worth an automatic restart; everything else stops recording
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            SpeechErrorKind::NoSpeech | SpeechErrorKind::Network | SpeechErrorKind::Aborted
        )
    }
}

impl fmt::Display for SpeechErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            SpeechErrorKind::NoSpeech => "no-speech",
            SpeechErrorKind::Network => "network",
            SpeechErrorKind::Aborted => "aborted",
            SpeechErrorKind::NotAllowed => "not-allowed",
            SpeechErrorKind::AudioCapture => "audio-capture",
            SpeechErrorKind::LanguageNotSupported => "language-not-supported",
            SpeechErrorKind::ServiceNotAllowed => "service-not-allowed",
            SpeechErrorKind::Other => "other",
        };
        f.write_str(code)
    }
}

/// Speech recognizer
///
/// Implementations:
/// - NATS: transcripts published by the STT service on `stt.text.>`
pub trait SpeechEngine: Send {
    /// Start recognizing; events arrive on the returned channel
    fn start(&mut self, language: &str) -> Result<mpsc::Receiver<SpeechEvent>>;

    /// Stop recognizing; no further events are delivered
    fn stop(&mut self);

    /// Engine name for logging
    fn name(&self) -> &str;
}

/// Exponential restart delay for recoverable recognizer faults
#[derive(Debug, Clone)]
pub struct RestartBackoff {
    initial: Duration,
    max: Duration,
    next: Duration,
}

impl RestartBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            next: initial,
        }
    }

    /// Delay for the next restart attempt
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.next = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_subset() {
        assert!(SpeechErrorKind::NoSpeech.is_recoverable());
        assert!(SpeechErrorKind::Network.is_recoverable());
        assert!(SpeechErrorKind::Aborted.is_recoverable());
        assert!(!SpeechErrorKind::NotAllowed.is_recoverable());
        assert!(!SpeechErrorKind::AudioCapture.is_recoverable());
        assert!(!SpeechErrorKind::Other.is_recoverable());
    }

    #[test]
    fn test_backoff_doubles_up_to_cap_and_resets() {
        let mut backoff = RestartBackoff::new(Duration::from_millis(500), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(2000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(2000));

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
    }
}
