use super::config::SessionConfig;
use super::handle::{Command, SessionHandle};
use super::stats::SessionStatus;
use crate::engine::{IceServer, NegotiationEngine};
use crate::errors::SignalingError;
use crate::recorder::{CaptureDirective, Throttled, TranscriptBroadcastThrottler, TranscriptState};
use crate::services::{TranscriptRecord, TranscriptStore};
use crate::signaling::{Dispatch, RoomChannel, RoomMessage, SignalingEvent, SignalingSession};
use crate::speech::{RestartBackoff, SpeechEngine, SpeechEvent};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Default buffer size for the command mailbox
const COMMAND_CHANNEL_BUFFER: usize = 32;

/// External collaborators of a room session
pub struct SessionDeps {
    /// Negotiation engine opening one connection per remote participant
    pub engine: Arc<dyn NegotiationEngine>,

    /// Outbound half of the room relay
    pub channel: Arc<dyn RoomChannel>,

    /// ICE servers handed to every new connection
    pub ice_servers: Vec<IceServer>,

    /// Inbound room messages, already addressed to this participant
    pub inbound: mpsc::UnboundedReceiver<RoomMessage>,

    /// Speech engine used while holding the recorder role
    pub speech: Box<dyn SpeechEngine>,

    /// Persistence for finalized transcript text
    pub store: Arc<dyn TranscriptStore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    /// Throttled transcript broadcast
    Flush,
    /// Speech engine restart after a fault
    Restart,
}

#[derive(Debug)]
struct TimerFired {
    kind: TimerKind,
    seq: u64,
}

#[derive(Debug)]
struct Timer {
    seq: u64,
    task: JoinHandle<()>,
}

/// One participant's membership in a room
///
/// Every input (room messages, link completions, engine callbacks, speech
/// events, timer firings, commands) is handled one at a time by the
/// session loop.
pub struct RoomSession {
    config: SessionConfig,
    signaling: SignalingSession,
    signaling_rx: mpsc::UnboundedReceiver<SignalingEvent>,
    inbound: mpsc::UnboundedReceiver<RoomMessage>,
    commands: mpsc::Receiver<Command>,

    speech: Box<dyn SpeechEngine>,
    speech_rx: Option<mpsc::Receiver<SpeechEvent>>,
    backoff: RestartBackoff,

    store: Arc<dyn TranscriptStore>,
    transcript: TranscriptState,
    throttler: TranscriptBroadcastThrottler,

    timers_tx: mpsc::UnboundedSender<TimerFired>,
    timers_rx: mpsc::UnboundedReceiver<TimerFired>,
    flush_timer: Option<Timer>,
    restart_timer: Option<Timer>,
    timer_seq: u64,

    notices_tx: mpsc::UnboundedSender<String>,
    notices_rx: mpsc::UnboundedReceiver<String>,
    status_message: Option<String>,

    joined_at: DateTime<Utc>,
}

impl RoomSession {
    /// Spawn the session loop
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(config: SessionConfig, deps: SessionDeps) -> (SessionHandle, JoinHandle<()>) {
        let (sender, commands) = mpsc::channel(COMMAND_CHANNEL_BUFFER);
        let session = Self::new(config, deps, commands);
        let task = tokio::spawn(session.run());
        (SessionHandle::new(sender), task)
    }

    fn new(config: SessionConfig, deps: SessionDeps, commands: mpsc::Receiver<Command>) -> Self {
        let SessionDeps {
            engine,
            channel,
            ice_servers,
            inbound,
            speech,
            store,
        } = deps;

        let (signaling, signaling_rx) = SignalingSession::new(
            config.client_id.clone(),
            config.room.clone(),
            engine,
            channel,
            ice_servers,
        );
        let (timers_tx, timers_rx) = mpsc::unbounded_channel();
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();

        Self {
            backoff: RestartBackoff::new(config.restart_initial, config.restart_max),
            transcript: TranscriptState::new(config.language.clone()),
            throttler: TranscriptBroadcastThrottler::new(config.broadcast_interval),
            config,
            signaling,
            signaling_rx,
            inbound,
            commands,
            speech,
            speech_rx: None,
            store,
            timers_tx,
            timers_rx,
            flush_timer: None,
            restart_timer: None,
            timer_seq: 0,
            notices_tx,
            notices_rx,
            status_message: None,
            joined_at: Utc::now(),
        }
    }

    /// Run the session loop until leave, handle drop or relay disconnect
    async fn run(mut self) {
        info!(
            "Room session started: {} in {} (speech: {})",
            self.config.client_id,
            self.config.room,
            self.speech.name()
        );

        loop {
            tokio::select! {
                message = self.inbound.recv() => {
                    match message {
                        Some(message) => self.on_room_message(message),
                        None => {
                            warn!("Room subscription closed, leaving {}", self.config.room);
                            break;
                        }
                    }
                }

                Some(event) = self.signaling_rx.recv() => {
                    self.signaling.handle_event(event);
                }

                event = recv_speech(&mut self.speech_rx) => {
                    self.on_speech_event(event);
                }

                Some(fired) = self.timers_rx.recv() => {
                    self.on_timer(fired);
                }

                Some(notice) = self.notices_rx.recv() => {
                    self.status_message = Some(notice);
                }

                command = self.commands.recv() => {
                    match command {
                        Some(Command::Leave { respond_to }) => {
                            self.shutdown();
                            let _ = respond_to.send(());
                            info!("Room session stopped");
                            return;
                        }
                        Some(command) => self.on_command(command),
                        None => {
                            debug!("All session handles dropped");
                            break;
                        }
                    }
                }
            }
        }

        self.shutdown();
        info!("Room session stopped");
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::StartRecording { respond_to } => {
                let _ = respond_to.send(self.start_recording());
            }
            Command::StopRecording { respond_to } => {
                let _ = respond_to.send(self.stop_recording());
            }
            Command::Status { respond_to } => {
                let _ = respond_to.send(self.status());
            }
            Command::Transcript { respond_to } => {
                let _ = respond_to.send(self.transcript.clone());
            }
            Command::Leave { respond_to } => {
                // Handled by the loop so it can exit
                let _ = respond_to.send(());
            }
        }
    }

    fn on_room_message(&mut self, message: RoomMessage) {
        match self.signaling.handle_room_message(message) {
            Dispatch::Handled => {}
            Dispatch::Capture(directive) => self.apply_capture(directive),
            Dispatch::Transcript { sender, payload } => {
                self.transcript.apply_remote(&sender, payload);
            }
        }
    }

    fn status(&self) -> SessionStatus {
        SessionStatus {
            room: self.config.room.clone(),
            client_id: self.config.client_id.clone(),
            joined_at: self.joined_at,
            members: self.signaling.members(),
            peers: self.signaling.peers(),
            recorder: self.signaling.recorder().state().clone(),
            is_recording: self.transcript.is_authoring(),
            transcript_mode: self.transcript.mode.clone(),
            status_message: self.status_message.clone(),
        }
    }

    fn start_recording(&mut self) -> Result<(), SignalingError> {
        let directive = self.signaling.request_recording()?;
        self.apply_capture(directive);
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<(), SignalingError> {
        if !self.signaling.recorder().is_local_owner() {
            return Err(SignalingError::NotRecorder(self.config.client_id.clone()));
        }
        self.finalize_transcript();
        self.signaling.release_recording()?;
        info!("Recording stopped by {}", self.config.client_id);
        Ok(())
    }

    fn apply_capture(&mut self, directive: CaptureDirective) {
        match directive {
            CaptureDirective::Unchanged => {}
            CaptureDirective::Start => self.begin_authoring(),
            CaptureDirective::Stop => {
                // Another participant holds the role; our content is not shared
                self.halt_capture();
                self.transcript.abandon_authoring();
                if let Some(owner) = self.signaling.recorder().owner() {
                    self.status_message = Some(format!("Recording is active by {}", owner));
                }
            }
        }
    }

    fn begin_authoring(&mut self) {
        info!("Recording started by {}", self.config.client_id);
        self.transcript.begin_authoring(&self.config.client_id);
        self.throttler.reset();
        self.backoff.reset();
        self.status_message = None;
        self.start_speech();
    }

    fn start_speech(&mut self) {
        match self.speech.start(&self.config.language) {
            Ok(rx) => {
                self.speech_rx = Some(rx);
            }
            Err(e) => {
                error!("Failed to start speech engine: {:#}", e);
                self.abort_recording(format!("Speech recognition unavailable: {}", e));
            }
        }
    }

    fn stop_speech(&mut self) {
        if self.speech_rx.take().is_some() {
            self.speech.stop();
        }
    }

    /// Stop the engine and every recording timer without touching the transcript
    fn halt_capture(&mut self) {
        self.stop_speech();
        self.cancel_timer(TimerKind::Flush);
        self.cancel_timer(TimerKind::Restart);
        self.throttler.cancel();
    }

    /// Fold interim text, send the final state unthrottled and persist the rest
    fn finalize_transcript(&mut self) {
        if !self.transcript.is_authoring() {
            return;
        }
        self.halt_capture();
        self.transcript.finish_authoring();
        self.signaling
            .broadcast(RoomMessage::transcript_update(self.transcript.payload()));
        self.persist_unreported();
    }

    /// Give up the recorder role after a fault
    fn abort_recording(&mut self, reason: String) {
        warn!("{}", reason);
        self.finalize_transcript();
        if self.signaling.recorder().is_local_owner() {
            if let Err(e) = self.signaling.release_recording() {
                warn!("Failed to release recorder role: {}", e);
            }
        }
        self.status_message = Some(reason);
    }

    fn on_speech_event(&mut self, event: Option<SpeechEvent>) {
        if !self.transcript.is_authoring() || !self.signaling.recorder().is_local_owner() {
            debug!("Ignoring speech event while not recording");
            self.stop_speech();
            return;
        }

        match event {
            Some(SpeechEvent::Result {
                final_text,
                interim,
            }) => {
                self.backoff.reset();
                if self.transcript.apply_local(&final_text, &interim) {
                    self.broadcast_throttled();
                }
                if !final_text.trim().is_empty() {
                    self.persist_unreported();
                }
            }
            Some(SpeechEvent::Error(kind)) if kind.is_recoverable() => {
                warn!("Recoverable speech error: {}", kind);
                self.schedule_restart();
            }
            Some(SpeechEvent::Error(kind)) => {
                self.abort_recording(format!("Speech recognition failed: {}", kind));
            }
            Some(SpeechEvent::End) | None => {
                debug!("Speech engine ended while recording");
                self.schedule_restart();
            }
        }
    }

    fn schedule_restart(&mut self) {
        self.stop_speech();
        let delay = self.backoff.next_delay();
        info!("Restarting speech engine in {:?}", delay);
        self.arm_timer(TimerKind::Restart, delay);
    }

    fn broadcast_throttled(&mut self) {
        match self.throttler.offer(Instant::now(), self.transcript.payload()) {
            Throttled::SendNow(payload) => {
                self.signaling
                    .broadcast(RoomMessage::transcript_update(payload));
            }
            Throttled::Schedule(delay) => self.arm_timer(TimerKind::Flush, delay),
            Throttled::Coalesced => {}
        }
    }

    /// Hand newly committed text to the store without blocking the loop
    fn persist_unreported(&mut self) {
        let Some(text) = self.throttler.unreported(&self.transcript.committed) else {
            return;
        };
        let text = text.trim().to_string();
        if text.is_empty() {
            return;
        }

        let record = TranscriptRecord {
            room: self.config.room.to_string(),
            client_id: self.config.client_id.to_string(),
            language: self.transcript.language.clone(),
            text,
        };
        let store = Arc::clone(&self.store);
        let notices = self.notices_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = store.save(record).await {
                error!("Failed to save transcript: {:#}", e);
                let _ = notices.send(format!("Failed to save transcript: {}", e));
            }
        });
    }

    fn arm_timer(&mut self, kind: TimerKind, delay: Duration) {
        self.cancel_timer(kind);
        self.timer_seq += 1;
        let seq = self.timer_seq;
        let tx = self.timers_tx.clone();
        let deadline = Instant::now() + delay;
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = tx.send(TimerFired { kind, seq });
        });
        *self.timer_slot(kind) = Some(Timer { seq, task });
    }

    fn cancel_timer(&mut self, kind: TimerKind) {
        if let Some(timer) = self.timer_slot(kind).take() {
            timer.task.abort();
        }
    }

    fn timer_slot(&mut self, kind: TimerKind) -> &mut Option<Timer> {
        match kind {
            TimerKind::Flush => &mut self.flush_timer,
            TimerKind::Restart => &mut self.restart_timer,
        }
    }

    fn on_timer(&mut self, fired: TimerFired) {
        let slot = self.timer_slot(fired.kind);
        if slot.as_ref().map(|timer| timer.seq) != Some(fired.seq) {
            debug!("Discarding cancelled {:?} timer", fired.kind);
            return;
        }
        *slot = None;

        match fired.kind {
            TimerKind::Flush => {
                if let Some(payload) = self.throttler.fire() {
                    self.signaling
                        .broadcast(RoomMessage::transcript_update(payload));
                }
            }
            TimerKind::Restart => {
                if self.transcript.is_authoring() && self.signaling.recorder().is_local_owner() {
                    info!("Restarting speech engine");
                    self.start_speech();
                }
            }
        }
    }

    fn shutdown(&mut self) {
        if self.signaling.recorder().is_local_owner() {
            self.finalize_transcript();
            if let Err(e) = self.signaling.release_recording() {
                warn!("Failed to release recorder role on leave: {}", e);
            }
        }
        self.halt_capture();
        self.signaling.leave();
    }
}

async fn recv_speech(rx: &mut Option<mpsc::Receiver<SpeechEvent>>) -> Option<SpeechEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
