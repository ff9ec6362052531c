//! Asynchronous half of the violation processor.
//!
//! Detection workers compose the evidence JPEG inline (encoding is cheap
//! compared to inference) and hand the finished bytes over a channel; this
//! processor uploads, records, rolls up, and notifies in the background so
//! the hot path never waits on the network.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::notify::NotificationService;
use crate::repo;
use crate::storage::{evidence_path, EvidenceStore};

/// Concurrent upload+record tasks per process.
const MAX_IN_FLIGHT: usize = 4;

/// One accepted violation, ready for persistence.
#[derive(Debug, Clone)]
pub struct EvidenceJob {
    pub cctv_id: i32,
    pub class_id: i32,
    pub class_name: String,
    pub track_id: u32,
    pub confidence: f32,
    pub jpeg: Vec<u8>,
    pub captured_at: DateTime<FixedOffset>,
}

pub type EvidenceSender = mpsc::UnboundedSender<EvidenceJob>;
pub type EvidenceReceiver = mpsc::UnboundedReceiver<EvidenceJob>;

pub fn evidence_channel() -> (EvidenceSender, EvidenceReceiver) {
    mpsc::unbounded_channel()
}

/// Background consumer of [`EvidenceJob`]s.
#[derive(Clone)]
pub struct EvidenceProcessor {
    pool: PgPool,
    store: Arc<dyn EvidenceStore>,
    notifier: Option<Arc<NotificationService>>,
}

impl std::fmt::Debug for EvidenceProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvidenceProcessor").finish_non_exhaustive()
    }
}

impl EvidenceProcessor {
    pub fn new(
        pool: PgPool,
        store: Arc<dyn EvidenceStore>,
        notifier: Option<Arc<NotificationService>>,
    ) -> Self {
        Self {
            pool,
            store,
            notifier,
        }
    }

    /// Consume jobs until every sender is dropped. Jobs run concurrently
    /// up to a small in-flight cap.
    pub fn spawn(self, mut rx: EvidenceReceiver) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let limiter = Arc::new(Semaphore::new(MAX_IN_FLIGHT));
            while let Some(job) = rx.recv().await {
                let permit = match limiter.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let processor = self.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(e) = processor.process(job).await {
                        error!("Violation processing failed: {e}");
                    }
                });
            }
            info!("Evidence processor drained");
        })
    }

    /// Upload first; an upload failure aborts the database writes. Later
    /// steps tolerate the failure of anything after them.
    async fn process(&self, job: EvidenceJob) -> Result<()> {
        let path = evidence_path(job.cctv_id, &job.class_name, job.captured_at);
        let url = self
            .store
            .upload(job.jpeg.clone(), "image/jpeg", &path)
            .await?;

        let event = repo::violations::insert_event(
            &self.pool,
            job.cctv_id,
            job.class_id,
            &url,
            job.captured_at,
        )
        .await?;
        info!(
            "[CCTV {}] Violation {} recorded ({}, track {})",
            job.cctv_id, event.id, job.class_name, job.track_id
        );

        if let Err(e) = repo::violations::increment_daily_rollup(
            &self.pool,
            job.captured_at.date_naive(),
            job.cctv_id,
            job.class_id,
            job.captured_at,
        )
        .await
        {
            warn!("[CCTV {}] Daily rollup update failed: {e}", job.cctv_id);
        }

        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.notify_violation_auto(event.id).await {
                warn!("[CCTV {}] Auto notification failed: {e}", job.cctv_id);
            }
        }

        Ok(())
    }
}
