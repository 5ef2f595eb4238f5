use log::{error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::orchestrator::{Orchestrator, RunOutcome};

/// Shared flag that stops runs which have not started yet.
#[derive(Debug, Clone, Default)]
pub struct BatchCancellation(Arc<AtomicBool>);

impl BatchCancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What happened to one input URL.
#[derive(Debug, Clone)]
pub enum BatchItem {
    Completed(Box<RunOutcome>),
    /// Cancelled before the run started.
    Cancelled { url: String },
    /// The run's task died without producing an outcome.
    Aborted { url: String, reason: String },
}

impl BatchItem {
    pub fn url(&self) -> &str {
        match self {
            BatchItem::Completed(outcome) => &outcome.url,
            BatchItem::Cancelled { url } | BatchItem::Aborted { url, .. } => url,
        }
    }

    pub fn outcome(&self) -> Option<&RunOutcome> {
        match self {
            BatchItem::Completed(outcome) => Some(outcome),
            _ => None,
        }
    }
}

/// Runs many independent pipelines with at most `max_concurrent_runs` in
/// flight. One failing run never affects the others.
pub struct BatchRunner {
    orchestrator: Arc<Orchestrator>,
    max_concurrent_runs: usize,
    cancellation: BatchCancellation,
}

impl BatchRunner {
    pub fn new(orchestrator: Arc<Orchestrator>, max_concurrent_runs: usize) -> Self {
        Self {
            orchestrator,
            max_concurrent_runs: max_concurrent_runs.max(1),
            cancellation: BatchCancellation::new(),
        }
    }

    pub fn with_cancellation(mut self, cancellation: BatchCancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn cancellation(&self) -> BatchCancellation {
        self.cancellation.clone()
    }

    /// Run every URL. The result has one item per input, in input order.
    pub async fn run(&self, urls: Vec<String>) -> Vec<BatchItem> {
        info!(
            "Starting batch of {} URLs ({} at a time)",
            urls.len(),
            self.max_concurrent_runs
        );
        let permits = Arc::new(Semaphore::new(self.max_concurrent_runs));
        let mut tasks = JoinSet::new();

        for (index, url) in urls.iter().cloned().enumerate() {
            let permits = Arc::clone(&permits);
            let orchestrator = Arc::clone(&self.orchestrator);
            let cancellation = self.cancellation.clone();

            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return (index, BatchItem::Cancelled { url });
                };
                if cancellation.is_cancelled() {
                    warn!("Skipping {}: batch cancelled", url);
                    return (index, BatchItem::Cancelled { url });
                }
                let outcome = orchestrator.run(&url).await;
                (index, BatchItem::Completed(Box::new(outcome)))
            });
        }

        let mut items: Vec<Option<BatchItem>> = vec![None; urls.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, item)) => items[index] = Some(item),
                Err(e) => error!("Batch task failed: {}", e),
            }
        }

        items
            .into_iter()
            .zip(urls)
            .map(|(item, url)| {
                item.unwrap_or_else(|| BatchItem::Aborted {
                    url,
                    reason: "run task terminated unexpectedly".to_string(),
                })
            })
            .collect()
    }
}
