// Speech engine fed by the STT service over NATS
//
// The STT service transcribes this participant's audio and publishes partial
// and final text on `stt.text.>`, tagged with a session id. Partial messages
// carry the full current hypothesis; final messages carry newly finalized text.

use anyhow::{bail, Result};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{SpeechEngine, SpeechErrorKind, SpeechEvent};
use crate::nats::{NatsClient, TranscriptMessage};

const EVENT_BUFFER: usize = 64;

pub struct NatsSpeechEngine {
    client: NatsClient,
    session_id: String,
    task: Option<JoinHandle<()>>,
}

impl NatsSpeechEngine {
    pub fn new(client: NatsClient, session_id: impl Into<String>) -> Self {
        Self {
            client,
            session_id: session_id.into(),
            task: None,
        }
    }
}

impl SpeechEngine for NatsSpeechEngine {
    fn start(&mut self, language: &str) -> Result<mpsc::Receiver<SpeechEvent>> {
        if self.task.is_some() {
            bail!("Speech engine already running for {}", self.session_id);
        }

        info!(
            "Starting NATS speech engine for session {} ({})",
            self.session_id, language
        );

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let client = self.client.clone();
        let session_id = self.session_id.clone();
        self.task = Some(tokio::spawn(async move {
            forward_transcripts(client, session_id, tx).await;
        }));

        Ok(rx)
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("Stopped NATS speech engine for session {}", self.session_id);
        }
    }

    fn name(&self) -> &str {
        "nats-stt"
    }
}

impl Drop for NatsSpeechEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn forward_transcripts(
    client: NatsClient,
    session_id: String,
    tx: mpsc::Sender<SpeechEvent>,
) {
    let mut subscriber = match client.subscribe_transcripts().await {
        Ok(subscriber) => subscriber,
        Err(e) => {
            warn!("Transcript subscription failed: {:#}", e);
            let _ = tx.send(SpeechEvent::Error(SpeechErrorKind::Network)).await;
            return;
        }
    };

    while let Some(msg) = subscriber.next().await {
        let transcript: TranscriptMessage = match serde_json::from_slice(&msg.payload) {
            Ok(transcript) => transcript,
            Err(e) => {
                warn!("Failed to parse transcript message: {}", e);
                continue;
            }
        };

        if transcript.session_id != session_id {
            continue;
        }

        if tx.send(to_speech_event(transcript)).await.is_err() {
            debug!("Speech event receiver dropped");
            return;
        }
    }

    let _ = tx.send(SpeechEvent::End).await;
}

/// Map an STT transcript message onto a recognizer delta
pub fn to_speech_event(transcript: TranscriptMessage) -> SpeechEvent {
    if transcript.partial {
        SpeechEvent::Result {
            final_text: String::new(),
            interim: transcript.text,
        }
    } else {
        SpeechEvent::Result {
            final_text: transcript.text,
            interim: String::new(),
        }
    }
}
