use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use storage::repository::{SubmissionSnapshot, SubmissionStore};
use survey_core::Clock;
use survey_core::model::Submission;

use crate::error::SubmissionCacheError;
use crate::submission_api::{Credentials, SubmissionSource};

/// Time-bounded, structurally validated cache over the paginated
/// submissions API.
///
/// The persisted snapshot is a process-wide shared resource: the
/// refresh mutex is the in-flight-build marker, so concurrent callers
/// share one pending refresh instead of issuing duplicate upstream
/// fetches, and the snapshot is always replaced wholesale.
pub struct SubmissionCacheService {
    source: Arc<dyn SubmissionSource>,
    store: Arc<dyn SubmissionStore>,
    clock: Clock,
    ttl: Duration,
    page_size: usize,
    page_delay: StdDuration,
    refresh: Mutex<()>,
}

impl SubmissionCacheService {
    #[must_use]
    pub fn new(source: Arc<dyn SubmissionSource>, store: Arc<dyn SubmissionStore>) -> Self {
        Self {
            source,
            store,
            clock: Clock::system(),
            ttl: Duration::hours(1),
            page_size: 100,
            page_delay: StdDuration::from_millis(500),
            refresh: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub fn with_page_delay(mut self, page_delay: StdDuration) -> Self {
        self.page_delay = page_delay;
        self
    }

    /// Takes page size and inter-page delay from an API config.
    #[must_use]
    pub fn with_api_config(self, config: &crate::submission_api::ApiConfig) -> Self {
        let page_delay = config.page_delay;
        let page_size = config.page_size;
        self.with_page_size(page_size).with_page_delay(page_delay)
    }

    /// Returns every submission, from the snapshot when it is usable,
    /// otherwise from a full paginated refetch.
    ///
    /// # Errors
    ///
    /// Returns `Auth`/`RateLimited` verbatim from the upstream API and
    /// `Storage` when the snapshot store fails. Structural problems
    /// with a persisted snapshot are handled internally by refetching.
    pub async fn get_all(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<Submission>, SubmissionCacheError> {
        if let Some(snapshot) = self.usable_snapshot().await? {
            debug!(records = snapshot.record_count, "serving cached submissions");
            return Ok(snapshot.submissions);
        }

        // In-flight marker: one refresh at a time. Late joiners park
        // here and pick up the snapshot the leader wrote.
        let _refresh = self.refresh.lock().await;
        if let Some(snapshot) = self.usable_snapshot().await? {
            debug!(
                records = snapshot.record_count,
                "joined an in-flight refresh"
            );
            return Ok(snapshot.submissions);
        }

        let submissions = self.fetch_all_pages(credentials).await?;
        let snapshot = SubmissionSnapshot::new(submissions, self.clock.now());
        self.store.save(&snapshot).await?;
        Ok(snapshot.submissions)
    }

    /// Installs an externally produced canonical record set (e.g. the
    /// cross-source merge output) as the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns `Storage` when the snapshot cannot be persisted.
    pub async fn ingest(
        &self,
        submissions: Vec<Submission>,
    ) -> Result<(), SubmissionCacheError> {
        let snapshot = SubmissionSnapshot::new(submissions, self.clock.now());
        info!(records = snapshot.record_count, "ingesting canonical records");
        self.store.save(&snapshot).await?;
        Ok(())
    }

    /// Forces invalidation; the next `get_all` refetches.
    ///
    /// # Errors
    ///
    /// Returns `Storage` when the store cannot be cleared.
    pub async fn clear(&self) -> Result<(), SubmissionCacheError> {
        self.store.clear().await?;
        Ok(())
    }

    /// When the backing snapshot was fetched, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `Storage` when the snapshot store fails.
    pub async fn last_fetched_at(
        &self,
    ) -> Result<Option<DateTime<Utc>>, SubmissionCacheError> {
        Ok(self.store.load().await?.map(|snapshot| snapshot.fetched_at))
    }

    async fn usable_snapshot(
        &self,
    ) -> Result<Option<SubmissionSnapshot>, SubmissionCacheError> {
        let Some(snapshot) = self.store.load().await? else {
            return Ok(None);
        };
        if !snapshot.structurally_valid() {
            debug!("submission snapshot failed structural checks; discarding");
            return Ok(None);
        }
        if !snapshot.is_fresh(self.clock.now(), self.ttl) {
            debug!("submission snapshot expired");
            return Ok(None);
        }
        Ok(Some(snapshot))
    }

    /// Pages through the upstream dataset in request order, stopping on
    /// the first short or empty page. No retry on throttling; the error
    /// surfaces.
    async fn fetch_all_pages(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<Submission>, SubmissionCacheError> {
        let mut all = Vec::new();
        let mut page = 0;
        loop {
            let batch = self
                .source
                .fetch_page(credentials, page, self.page_size)
                .await?;
            let batch_len = batch.len();
            all.extend(batch);
            debug!(page, batch_len, "fetched submission page");
            if batch_len < self.page_size {
                break;
            }
            page += 1;
            tokio::time::sleep(self.page_delay).await;
        }
        info!(records = all.len(), pages = page + 1, "submission refetch complete");
        Ok(all)
    }
}
