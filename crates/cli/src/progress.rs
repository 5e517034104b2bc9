//! Logs progress events as they arrive.

use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::info;

use serialdl_core::{EpisodeId, ProgressEvent, ProgressKind};

/// Percent steps between two logged progress lines of one episode.
const LOG_STEP: f32 = 25.0;

/// Turns the event stream into a few readable lines per episode.
#[derive(Debug, Default)]
pub struct ProgressLog {
    /// Last logged step per episode and step name.
    logged: HashMap<(EpisodeId, String), u32>,
    finished: usize,
    failed: usize,
}

impl ProgressLog {
    /// Returns the line to log for `event`, if any.
    pub fn observe(&mut self, event: &ProgressEvent) -> Option<String> {
        match &event.kind {
            ProgressKind::Progress { percent } => {
                let step = event.payload.clone().unwrap_or_default();
                let bucket = (percent / LOG_STEP).floor() as u32;
                let key = (event.episode_id, step.clone());
                match self.logged.get(&key) {
                    Some(&last) if last >= bucket => None,
                    _ => {
                        self.logged.insert(key, bucket);
                        Some(format!("{} {} {:.0}%", event.episode_id, step, percent))
                    }
                }
            }
            ProgressKind::Completed => {
                self.finished += 1;
                Some(self.tally())
            }
            ProgressKind::Failed => {
                self.failed += 1;
                Some(self.tally())
            }
            ProgressKind::Started => None,
        }
    }

    fn tally(&self) -> String {
        format!("{} episodes finished, {} failed", self.finished, self.failed)
    }
}

/// Consumes events until every sink is dropped.
pub async fn log_progress(mut rx: mpsc::Receiver<ProgressEvent>) {
    let mut log = ProgressLog::default();
    while let Some(event) = rx.recv().await {
        if let Some(line) = log.observe(&event) {
            info!("{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(kind: ProgressKind, payload: &str) -> ProgressEvent {
        ProgressEvent {
            timestamp: Utc::now(),
            episode_id: EpisodeId::new(Some(1), 4u32),
            kind,
            payload: Some(payload.to_string()),
        }
    }

    fn progress(percent: f32) -> ProgressEvent {
        event(ProgressKind::Progress { percent }, "download")
    }

    #[test]
    fn test_progress_is_throttled() {
        let mut log = ProgressLog::default();
        assert!(log.observe(&progress(1.0)).is_some());
        assert!(log.observe(&progress(10.0)).is_none());
        assert_eq!(
            log.observe(&progress(26.0)).as_deref(),
            Some("S01E04 download 26%")
        );
        assert!(log.observe(&progress(30.0)).is_none());
    }

    #[test]
    fn test_steps_are_tracked_separately() {
        let mut log = ProgressLog::default();
        assert!(log.observe(&progress(60.0)).is_some());
        assert!(log
            .observe(&event(ProgressKind::Progress { percent: 5.0 }, "encode"))
            .is_some());
    }

    #[test]
    fn test_terminal_events_tally() {
        let mut log = ProgressLog::default();
        assert!(log.observe(&event(ProgressKind::Started, "Pilot")).is_none());
        log.observe(&event(ProgressKind::Completed, "/out/a.mkv"));
        let line = log.observe(&event(ProgressKind::Failed, "boom")).unwrap();
        assert_eq!(line, "1 episodes finished, 1 failed");
    }
}
