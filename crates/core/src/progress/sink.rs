use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

use super::types::{ProgressEvent, ProgressKind};
use crate::episode::EpisodeId;

/// Creates a sink and the receiving end of its channel.
pub fn progress_channel(capacity: usize) -> (ProgressSink, mpsc::Receiver<ProgressEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ProgressSink::new(tx), rx)
}

/// Handle for emitting progress events.
///
/// Cheaply cloneable; every stage worker holds one. Every event is also
/// logged through `tracing`, so a sink without a channel still leaves a trace.
///
/// Clones share the per-episode state. A run works on its own
/// [`for_run`](Self::for_run) copy, so that state is dropped when the run ends.
#[derive(Clone, Default)]
pub struct ProgressSink {
    tx: Option<mpsc::Sender<ProgressEvent>>,
    /// Highest rank reached by each episode.
    states: Arc<Mutex<HashMap<EpisodeId, u8>>>,
}

impl ProgressSink {
    pub fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self {
            tx: Some(tx),
            states: Arc::default(),
        }
    }

    /// A sink that only logs.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Same channel, fresh per-episode state.
    pub fn for_run(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            states: Arc::default(),
        }
    }

    pub async fn started(&self, id: EpisodeId, payload: impl Into<String>) {
        self.emit(id, ProgressKind::Started, Some(payload.into()))
            .await;
    }

    /// Best-effort intermediate progress; dropped when the channel is full.
    pub fn progress(&self, id: EpisodeId, percent: f32, payload: &str) {
        let kind = ProgressKind::Progress {
            percent: percent.clamp(0.0, 100.0),
        };
        if !self.admit(id, &kind) {
            return;
        }
        trace!(episode = %id, percent, step = payload, "Progress");

        if let Some(tx) = &self.tx {
            let event = Self::event(id, kind, Some(payload.to_string()));
            if let Err(e) = tx.try_send(event) {
                debug!(episode = %id, "Dropped progress event: {}", e);
            }
        }
    }

    /// Handle a collaborator uses to report progress for one episode.
    pub fn reporter(&self, id: EpisodeId, step: &'static str) -> ProgressReporter {
        ProgressReporter {
            sink: self.clone(),
            id,
            step,
        }
    }

    pub async fn completed(&self, id: EpisodeId, payload: impl Into<String>) {
        self.emit(id, ProgressKind::Completed, Some(payload.into()))
            .await;
    }

    pub async fn failed(&self, id: EpisodeId, error: impl Into<String>) {
        self.emit(id, ProgressKind::Failed, Some(error.into())).await;
    }

    async fn emit(&self, id: EpisodeId, kind: ProgressKind, payload: Option<String>) {
        if !self.admit(id, &kind) {
            debug!(episode = %id, ?kind, "Ignoring out-of-order progress event");
            return;
        }

        let detail = payload.as_deref().unwrap_or_default();
        match kind {
            ProgressKind::Started => info!(episode = %id, "Started {}", detail),
            ProgressKind::Completed => info!(episode = %id, "[DONE] {}", detail),
            ProgressKind::Failed => error!(episode = %id, "[FAILED] {}", detail),
            ProgressKind::Progress { .. } => {}
        }

        if let Some(tx) = &self.tx {
            if let Err(e) = tx.send(Self::event(id, kind, payload)).await {
                error!(episode = %id, "Failed to emit progress event: {}", e);
            }
        }
    }

    /// Records the transition, rejecting anything that would regress the
    /// episode or follow a terminal event.
    fn admit(&self, id: EpisodeId, kind: &ProgressKind) -> bool {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        let rank = kind.rank();
        match states.get(&id) {
            Some(&current) if current >= 2 || rank < current => false,
            _ => {
                states.insert(id, rank);
                true
            }
        }
    }

    fn event(id: EpisodeId, kind: ProgressKind, payload: Option<String>) -> ProgressEvent {
        ProgressEvent {
            timestamp: Utc::now(),
            episode_id: id,
            kind,
            payload,
        }
    }
}

/// Reports intermediate progress of one step of one episode.
#[derive(Clone)]
pub struct ProgressReporter {
    sink: ProgressSink,
    id: EpisodeId,
    step: &'static str,
}

impl ProgressReporter {
    pub fn episode_id(&self) -> EpisodeId {
        self.id
    }

    pub fn report(&self, percent: f32) {
        self.sink.progress(self.id, percent, self.step);
    }
}
