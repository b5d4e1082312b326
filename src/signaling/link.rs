// Per-peer engine worker
//
// Engine calls for one peer run on a dedicated task, strictly in the order
// they were submitted: an answer submitted before a batch of candidates is
// always applied before them. Results re-enter the session queue tagged with
// the record generation; the session discards those whose record is gone.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::messages::{IceCandidate, ParticipantId, SessionDescription};
use super::{LinkOutcome, LinkResult, SignalingEvent};
use crate::engine::PeerConnection;

#[derive(Debug)]
pub enum LinkOp {
    /// Create an offer and install it as local description
    CreateOffer,
    /// Apply a remote offer, then create and install the answer
    AcceptOffer(SessionDescription),
    /// Apply a remote answer
    AcceptAnswer(SessionDescription),
    /// Add remote candidates in order; failures are reported and skipped
    AddCandidates(Vec<IceCandidate>),
    Close,
}

/// Submission side of a peer worker
#[derive(Debug)]
pub struct LinkHandle {
    tx: mpsc::UnboundedSender<LinkOp>,
    task: JoinHandle<()>,
}

impl LinkHandle {
    pub fn spawn(
        peer: ParticipantId,
        generation: u64,
        connection: Arc<dyn PeerConnection>,
        outcomes: mpsc::UnboundedSender<SignalingEvent>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_link(peer, generation, connection, rx, outcomes));
        Self { tx, task }
    }

    pub fn submit(&self, op: LinkOp) {
        if let Err(e) = self.tx.send(op) {
            debug!("Link worker already stopped, dropping {:?}", e.0);
        }
    }

    /// Close the connection after any queued work, then stop the worker
    pub fn close(self) {
        self.submit(LinkOp::Close);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

async fn run_link(
    peer: ParticipantId,
    generation: u64,
    connection: Arc<dyn PeerConnection>,
    mut rx: mpsc::UnboundedReceiver<LinkOp>,
    outcomes: mpsc::UnboundedSender<SignalingEvent>,
) {
    debug!("Link worker started for {} (generation {})", peer, generation);

    let report = |result: LinkResult| {
        let event = SignalingEvent::Link(LinkOutcome {
            peer: peer.clone(),
            generation,
            result,
        });
        if outcomes.send(event).is_err() {
            debug!("Session gone, dropping link outcome for {}", peer);
        }
    };

    while let Some(op) = rx.recv().await {
        match op {
            LinkOp::CreateOffer => {
                report(LinkResult::OfferReady(create_offer(&*connection).await));
            }
            LinkOp::AcceptOffer(offer) => {
                report(LinkResult::AnswerReady(accept_offer(&*connection, &offer).await));
            }
            LinkOp::AcceptAnswer(answer) => {
                let applied = connection
                    .set_remote_description(&answer)
                    .await
                    .context("Failed to apply remote answer");
                report(LinkResult::AnswerApplied(applied));
            }
            LinkOp::AddCandidates(candidates) => {
                for candidate in candidates {
                    match connection.add_candidate(&candidate).await {
                        Ok(()) => debug!("Applied candidate for {}", peer),
                        Err(e) => {
                            warn!("Skipping candidate for {}: {:#}", peer, e);
                            report(LinkResult::CandidateRejected(candidate));
                        }
                    }
                }
            }
            LinkOp::Close => break,
        }
    }

    connection.close().await;
    info!("Link to {} closed (generation {})", peer, generation);
}

async fn create_offer(connection: &dyn PeerConnection) -> Result<SessionDescription> {
    let offer = connection
        .create_offer()
        .await
        .context("Failed to create offer")?;
    connection
        .set_local_description(&offer)
        .await
        .context("Failed to set local offer")?;
    Ok(offer)
}

async fn accept_offer(
    connection: &dyn PeerConnection,
    offer: &SessionDescription,
) -> Result<SessionDescription> {
    connection
        .set_remote_description(offer)
        .await
        .context("Failed to apply remote offer")?;
    let answer = connection
        .create_answer()
        .await
        .context("Failed to create answer")?;
    connection
        .set_local_description(&answer)
        .await
        .context("Failed to set local answer")?;
    Ok(answer)
}
