// Client-side half of the exclusive recorder role
//
// Local intent is optimistic: ownership is assumed immediately and
// broadcast. The relay is authoritative; a denial or a competing
// `recording-state` makes us yield. The arbiter never starts or stops
// capture itself, it tells the caller what to do through `CaptureDirective`.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::SignalingError;
use crate::signaling::{ParticipantId, RoomChannel, RoomMessage};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "owner", rename_all = "snake_case")]
pub enum RecorderState {
    Idle,
    ActiveOwnedBy(ParticipantId),
}

/// What the caller must do with local capture after an arbiter transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureDirective {
    Start,
    Stop,
    Unchanged,
}

#[derive(Debug)]
pub struct RecorderArbiter {
    local_id: ParticipantId,
    state: RecorderState,
    capturing: bool,
}

impl RecorderArbiter {
    pub fn new(local_id: ParticipantId) -> Self {
        Self {
            local_id,
            state: RecorderState::Idle,
            capturing: false,
        }
    }

    pub fn state(&self) -> &RecorderState {
        &self.state
    }

    pub fn owner(&self) -> Option<&ParticipantId> {
        match &self.state {
            RecorderState::Idle => None,
            RecorderState::ActiveOwnedBy(owner) => Some(owner),
        }
    }

    pub fn is_local_owner(&self) -> bool {
        self.owner() == Some(&self.local_id)
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    /// Local intent to start recording
    pub fn propose(&mut self, channel: &dyn RoomChannel) -> Result<CaptureDirective, SignalingError> {
        if let RecorderState::ActiveOwnedBy(owner) = &self.state {
            if *owner != self.local_id {
                return Err(SignalingError::RecorderBusy(owner.clone()));
            }
        }

        info!("Claiming recorder role for {}", self.local_id);
        self.state = RecorderState::ActiveOwnedBy(self.local_id.clone());
        channel.send(RoomMessage::RecordingState {
            active: true,
            owner_id: Some(self.local_id.clone()),
            sender_id: None,
        });
        Ok(self.start_capture())
    }

    /// Explicit stop by the owner
    pub fn release(&mut self, channel: &dyn RoomChannel) -> Result<CaptureDirective, SignalingError> {
        if !self.is_local_owner() {
            return Err(SignalingError::NotRecorder(self.local_id.clone()));
        }

        info!("Releasing recorder role held by {}", self.local_id);
        self.state = RecorderState::Idle;
        channel.send(RoomMessage::RecordingState {
            active: false,
            owner_id: Some(self.local_id.clone()),
            sender_id: None,
        });
        Ok(self.stop_capture())
    }

    /// Authoritative or peer-announced recorder state
    pub fn on_recording_state(
        &mut self,
        active: bool,
        owner: Option<ParticipantId>,
    ) -> CaptureDirective {
        if active {
            let Some(owner) = owner else {
                warn!("Ignoring active recording-state without an owner");
                return CaptureDirective::Unchanged;
            };
            if owner == self.local_id {
                self.state = RecorderState::ActiveOwnedBy(owner);
                return CaptureDirective::Unchanged;
            }
            info!("Recorder role now held by {}", owner);
            self.state = RecorderState::ActiveOwnedBy(owner);
            return self.stop_capture();
        }

        match (&self.state, owner) {
            (RecorderState::Idle, _) => CaptureDirective::Unchanged,
            (RecorderState::ActiveOwnedBy(current), Some(owner)) if *current != owner => {
                debug!(
                    "Ignoring release by {} while {} holds the recorder role",
                    owner, current
                );
                CaptureDirective::Unchanged
            }
            _ => {
                info!("Recorder role released");
                self.state = RecorderState::Idle;
                self.stop_capture()
            }
        }
    }

    /// The relay rejected our claim and names the real owner
    pub fn on_denied(&mut self, owner: ParticipantId) -> CaptureDirective {
        if owner == self.local_id {
            self.state = RecorderState::ActiveOwnedBy(owner);
            return CaptureDirective::Unchanged;
        }
        warn!("Recording denied: role held by {}", owner);
        self.state = RecorderState::ActiveOwnedBy(owner);
        self.stop_capture()
    }

    /// Owner departure frees the role
    pub fn on_participant_left(&mut self, id: &ParticipantId) {
        if self.owner() == Some(id) {
            info!("Recorder owner {} left, role is free", id);
            self.state = RecorderState::Idle;
        }
    }

    /// Owner reported in the membership snapshot
    pub fn adopt_snapshot(&mut self, owner: Option<ParticipantId>) -> CaptureDirective {
        self.state = match owner {
            Some(owner) => RecorderState::ActiveOwnedBy(owner),
            None => RecorderState::Idle,
        };
        if self.is_local_owner() {
            CaptureDirective::Unchanged
        } else {
            self.stop_capture()
        }
    }

    fn start_capture(&mut self) -> CaptureDirective {
        if self.capturing {
            CaptureDirective::Unchanged
        } else {
            self.capturing = true;
            CaptureDirective::Start
        }
    }

    fn stop_capture(&mut self) -> CaptureDirective {
        if self.capturing {
            self.capturing = false;
            CaptureDirective::Stop
        } else {
            CaptureDirective::Unchanged
        }
    }
}
