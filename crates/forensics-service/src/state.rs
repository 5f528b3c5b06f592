use crate::classifier::Classifier;
use crate::queue::{AnalysisQueue, QueueError, RunSink, RunTicket};
use crate::session::{SessionController, SessionOutcome, SessionServices, SessionTarget};
use anyhow::Result;
use common::analysis::AnalysisConfig;
use common::history::HistoryWriter;
use common::media::MediaOpener;
use common::queue::QueueItem;
use common::validation::validate_analysis_config;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{error, info};

/// Tally of a batch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub started: usize,
    pub done: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl BatchSummary {
    fn record(&mut self, outcome: &SessionOutcome) {
        match outcome {
            SessionOutcome::Done(_) => self.done += 1,
            SessionOutcome::Failed(_) => self.failed += 1,
            SessionOutcome::Cancelled => self.cancelled += 1,
        }
    }
}

#[derive(Clone)]
pub struct ForensicsServiceState {
    inner: Arc<ForensicsServiceStateInner>,
}

struct ForensicsServiceStateInner {
    node_id: String,
    queue: Arc<AnalysisQueue>,
    classifier: Arc<dyn Classifier>,
    history: Arc<dyn HistoryWriter>,
    opener: Arc<dyn MediaOpener>,
    settings: RwLock<Arc<AnalysisConfig>>,
}

impl ForensicsServiceState {
    pub fn new(
        node_id: String,
        classifier: Arc<dyn Classifier>,
        history: Arc<dyn HistoryWriter>,
        opener: Arc<dyn MediaOpener>,
        settings: AnalysisConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ForensicsServiceStateInner {
                node_id,
                queue: Arc::new(AnalysisQueue::new()),
                classifier,
                history,
                opener,
                settings: RwLock::new(Arc::new(settings)),
            }),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.inner.node_id
    }

    pub fn queue(&self) -> &AnalysisQueue {
        &self.inner.queue
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.inner.classifier.as_ref()
    }

    pub fn history(&self) -> &dyn HistoryWriter {
        self.inner.history.as_ref()
    }

    /// Current live settings
    pub async fn settings(&self) -> Arc<AnalysisConfig> {
        self.inner.settings.read().await.clone()
    }

    /// Replace the live settings; sessions already running keep their snapshot
    pub async fn update_settings(&self, settings: AnalysisConfig) -> Result<Arc<AnalysisConfig>> {
        validate_analysis_config(&settings)?;
        let settings = Arc::new(settings);
        *self.inner.settings.write().await = settings.clone();
        info!(
            preset = settings.preset.as_str(),
            interval_secs = settings.frame_interval_secs,
            "analysis settings updated"
        );
        Ok(settings)
    }

    /// Run one item to completion
    pub async fn run_item(&self, id: &str) -> Result<SessionOutcome, QueueError> {
        let ticket = self.inner.queue.begin_run(id)?;
        Ok(self.execute(ticket).await)
    }

    /// Admit one item and analyze it in the background
    pub fn start_item(&self, id: &str) -> Result<QueueItem, QueueError> {
        let ticket = self.inner.queue.begin_run(id)?;
        let item = ticket.item.clone();
        let state = self.clone();
        tokio::spawn(async move {
            state.execute(ticket).await;
        });
        Ok(item)
    }

    /// Run every eligible item concurrently and wait for all of them
    pub async fn run_batch(&self) -> BatchSummary {
        let tickets = self.admit_batch();
        self.execute_batch(tickets).await
    }

    /// Admit every eligible item and analyze the batch in the background.
    /// Returns the ids that were started.
    pub fn start_batch(&self) -> Vec<String> {
        let tickets = self.admit_batch();
        let ids = tickets.iter().map(|t| t.item.id.clone()).collect();
        let state = self.clone();
        tokio::spawn(async move {
            state.execute_batch(tickets).await;
        });
        ids
    }

    /// Cancel every running session
    pub async fn shutdown(&self) -> Result<()> {
        info!("Cancelling running analysis sessions");
        self.inner.queue.cancel_all();
        Ok(())
    }

    fn admit_batch(&self) -> Vec<RunTicket> {
        self.inner
            .queue
            .runnable_ids()
            .into_iter()
            // An item may have been removed or started since the listing
            .filter_map(|id| self.inner.queue.begin_run(&id).ok())
            .collect()
    }

    async fn execute_batch(&self, tickets: Vec<RunTicket>) -> BatchSummary {
        let mut summary = BatchSummary {
            started: tickets.len(),
            ..BatchSummary::default()
        };

        let mut sessions = JoinSet::new();
        for ticket in tickets {
            let state = self.clone();
            sessions.spawn(async move { state.execute(ticket).await });
        }

        while let Some(joined) = sessions.join_next().await {
            match joined {
                Ok(outcome) => summary.record(&outcome),
                Err(e) => {
                    error!(error = %e, "analysis session task failed");
                    summary.failed += 1;
                }
            }
        }

        info!(
            started = summary.started,
            done = summary.done,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "batch finished"
        );
        summary
    }

    async fn execute(&self, ticket: RunTicket) -> SessionOutcome {
        let RunTicket {
            item,
            run_id,
            cancel,
        } = ticket;
        let services = SessionServices {
            classifier: self.inner.classifier.clone(),
            sink: Arc::new(RunSink::new(self.inner.queue.clone(), run_id)),
            history: self.inner.history.clone(),
        };
        let controller = SessionController::new(
            SessionTarget::from(&item),
            self.settings().await,
            services,
            cancel,
        );

        let outcome = if item.media_kind.is_segmented() {
            controller
                .run_source(self.inner.opener.as_ref(), &item.source)
                .await
        } else {
            controller.run_single(&item.source).await
        };
        self.inner.queue.end_run(&item.id, run_id);
        outcome
    }
}
