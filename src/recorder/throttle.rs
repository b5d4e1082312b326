// Outbound transcript rate limiting
//
// Broadcasts are coalesced on the trailing edge: at most one pending payload
// exists and it always holds the latest content. The reference point only
// moves on immediate sends. Independently, the throttler remembers how much
// of the committed transcript was already handed to persistence.

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::signaling::TranscriptPayload;

/// Decision for one offered payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Throttled {
    /// Broadcast this payload right away
    SendNow(TranscriptPayload),
    /// Arm a timer for the given delay; the payload is held as pending
    Schedule(Duration),
    /// A timer is already armed; the pending payload was replaced
    Coalesced,
}

#[derive(Debug)]
pub struct TranscriptBroadcastThrottler {
    interval: Duration,
    last_sent: Option<Instant>,
    pending: Option<TranscriptPayload>,
    reported_len: usize,
}

impl TranscriptBroadcastThrottler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
            pending: None,
            reported_len: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn offer(&mut self, now: Instant, payload: TranscriptPayload) -> Throttled {
        let elapsed = self.last_sent.map(|sent| now.saturating_duration_since(sent));

        match elapsed {
            Some(elapsed) if elapsed < self.interval => {
                let already_scheduled = self.pending.replace(payload).is_some();
                if already_scheduled {
                    Throttled::Coalesced
                } else {
                    Throttled::Schedule(self.interval - elapsed)
                }
            }
            _ => {
                if self.pending.take().is_some() {
                    debug!("Immediate transcript send supersedes pending payload");
                }
                self.last_sent = Some(now);
                Throttled::SendNow(payload)
            }
        }
    }

    /// The scheduled timer fired
    pub fn fire(&mut self) -> Option<TranscriptPayload> {
        self.pending.take()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop any pending payload without sending it
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Suffix of `committed` not yet handed to persistence
    ///
    /// Advances the reported length; returns `None` when nothing is new.
    pub fn unreported(&mut self, committed: &str) -> Option<String> {
        if committed.len() <= self.reported_len {
            return None;
        }
        let suffix = committed.get(self.reported_len..).map(str::to_string);
        self.reported_len = committed.len();
        suffix
    }

    /// Start a fresh recording: nothing has been reported yet
    pub fn reset(&mut self) {
        self.last_sent = None;
        self.pending = None;
        self.reported_len = 0;
    }
}
