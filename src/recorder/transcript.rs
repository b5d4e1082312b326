use serde::Serialize;
use tracing::debug;

use crate::signaling::{ParticipantId, TranscriptPayload};

/// Who is currently writing the transcript shown locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptMode {
    /// The local speech engine feeds the transcript
    Authoring,
    /// Updates broadcast by the active recorder feed the transcript
    Displaying,
}

/// Shared transcript as seen by this participant
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptState {
    pub committed: String,
    pub interim: String,
    pub language: String,
    pub mode: TranscriptMode,
    /// Participant whose content is displayed, if any
    pub author: Option<ParticipantId>,
}

impl TranscriptState {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            committed: String::new(),
            interim: String::new(),
            language: language.into(),
            mode: TranscriptMode::Displaying,
            author: None,
        }
    }

    pub fn is_authoring(&self) -> bool {
        self.mode == TranscriptMode::Authoring
    }

    /// Switch to local authoring with an empty transcript
    pub fn begin_authoring(&mut self, local_id: &ParticipantId) {
        self.committed.clear();
        self.interim.clear();
        self.mode = TranscriptMode::Authoring;
        self.author = Some(local_id.clone());
    }

    /// Fold interim text into the committed transcript and stop authoring
    pub fn finish_authoring(&mut self) {
        if !self.interim.trim().is_empty() {
            let interim = std::mem::take(&mut self.interim);
            self.push_final(&interim);
        }
        self.interim.clear();
        self.mode = TranscriptMode::Displaying;
    }

    /// Stop authoring without committing interim text (role was lost)
    pub fn abandon_authoring(&mut self) {
        self.interim.clear();
        self.mode = TranscriptMode::Displaying;
    }

    /// Apply a local speech delta; returns false when not authoring
    pub fn apply_local(&mut self, final_text: &str, interim: &str) -> bool {
        if !self.is_authoring() {
            debug!("Ignoring local speech delta while displaying");
            return false;
        }
        if !final_text.trim().is_empty() {
            self.push_final(final_text);
        }
        self.interim = interim.to_string();
        true
    }

    /// Apply a broadcast from the active recorder; returns false when authoring
    pub fn apply_remote(&mut self, author: &ParticipantId, payload: TranscriptPayload) -> bool {
        if self.is_authoring() {
            debug!("Ignoring transcript from {} while authoring", author);
            return false;
        }
        self.committed = payload.committed;
        self.interim = payload.interim;
        self.language = payload.language;
        self.author = Some(author.clone());
        true
    }

    pub fn payload(&self) -> TranscriptPayload {
        TranscriptPayload {
            committed: self.committed.clone(),
            interim: self.interim.clone(),
            language: self.language.clone(),
        }
    }

    fn push_final(&mut self, text: &str) {
        self.committed.push_str(text.trim());
        self.committed.push(' ');
    }
}
