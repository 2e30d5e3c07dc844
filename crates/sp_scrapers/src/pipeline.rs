use std::ops::AddAssign;
use std::pin::pin;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use sp_core::{
    ArticleQueue, ArticleSearch, CandidateArticle, Error, PendingArticle, Result, SearchWindow,
    TextExtractor, WatchRegistry, WatchedCompany, DEFAULT_LOOKBACK_HOURS,
};
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// How far back each search reaches from the start of the run
    pub lookback: Duration,
    /// Companies, and articles within a company, processed at once. 1 is fully sequential.
    pub concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lookback: Duration::hours(DEFAULT_LOOKBACK_HOURS),
            concurrency: 1,
        }
    }
}

/// Tally of one ingestion pass. `queued_count` is the number of successful queue writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub queued_count: usize,
    pub companies_searched: usize,
    pub companies_failed: usize,
    pub articles_skipped: usize,
    pub write_failures: usize,
}

impl AddAssign for RunSummary {
    fn add_assign(&mut self, other: Self) {
        self.queued_count += other.queued_count;
        self.companies_searched += other.companies_searched;
        self.companies_failed += other.companies_failed;
        self.articles_skipped += other.articles_skipped;
        self.write_failures += other.write_failures;
    }
}

#[derive(Debug, Clone)]
struct CompanyJob {
    email: String,
    company: WatchedCompany,
}

/// Searches, extracts and queues articles for every watched company.
pub struct NewsPipeline {
    registry: Arc<dyn WatchRegistry>,
    search: Arc<dyn ArticleSearch>,
    extractor: Arc<dyn TextExtractor>,
    queue: Arc<dyn ArticleQueue>,
    config: PipelineConfig,
}

impl NewsPipeline {
    pub fn new(
        registry: Arc<dyn WatchRegistry>,
        search: Arc<dyn ArticleSearch>,
        extractor: Arc<dyn TextExtractor>,
        queue: Arc<dyn ArticleQueue>,
    ) -> Self {
        Self {
            registry,
            search,
            extractor,
            queue,
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// One batch pass over the whole registry, searching the window that ends now.
    pub async fn run(&self) -> Result<RunSummary> {
        self.run_at(Utc::now()).await
    }

    /// Only a registry failure is returned as `Err`. Records written before
    /// the failure stay queued.
    #[instrument(skip(self), fields(lookback_hours = self.config.lookback.num_hours()))]
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunSummary> {
        let window = SearchWindow::trailing(now, self.config.lookback);
        let concurrency = self.config.concurrency.max(1);
        info!(start = %window.start, end = %window.end, "Starting ingestion run");

        let mut outcomes = pin!(self
            .registry
            .watchlists()
            .map_ok(|watchlist| {
                let jobs: Vec<Result<CompanyJob>> = watchlist
                    .watched_companies()
                    .map(|company| {
                        Ok(CompanyJob {
                            email: watchlist.email.clone(),
                            company,
                        })
                    })
                    .collect();
                stream::iter(jobs)
            })
            .try_flatten()
            .map_ok(|job| async move { Ok::<_, Error>(self.process_company(job, window).await) })
            .try_buffer_unordered(concurrency));

        let mut summary = RunSummary::default();
        loop {
            match outcomes.try_next().await {
                Ok(Some(outcome)) => summary += outcome,
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, queued = summary.queued_count, "Watch registry read failed, aborting run");
                    return Err(e);
                }
            }
        }

        info!(
            queued = summary.queued_count,
            companies = summary.companies_searched,
            failed = summary.companies_failed,
            skipped = summary.articles_skipped,
            write_failures = summary.write_failures,
            "Ingestion run finished"
        );
        Ok(summary)
    }

    #[instrument(skip_all, fields(email = %job.email, company = %job.company.name))]
    async fn process_company(&self, job: CompanyJob, window: SearchWindow) -> RunSummary {
        let mut summary = RunSummary {
            companies_searched: 1,
            ..RunSummary::default()
        };

        let candidates = match self.search.search(&job.company.name, &window).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "Article search failed, skipping company");
                summary.companies_failed = 1;
                return summary;
            }
        };

        let total = candidates.len();
        let linked: Vec<(String, CandidateArticle)> = candidates
            .into_iter()
            .filter_map(|candidate| Some((candidate.link()?.to_string(), candidate)))
            .collect();
        summary.articles_skipped = total - linked.len();

        let writes: Vec<bool> = stream::iter(linked)
            .map(|(url, candidate)| self.queue_article(url, candidate, &job))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        for written in writes {
            if written {
                summary.queued_count += 1;
            } else {
                summary.write_failures += 1;
            }
        }

        info!(
            found = total,
            queued = summary.queued_count,
            skipped = summary.articles_skipped,
            "Processed company"
        );
        summary
    }

    async fn queue_article(&self, url: String, candidate: CandidateArticle, job: &CompanyJob) -> bool {
        let body = self.extractor.extract(&url).await;
        let article = PendingArticle::assemble(candidate, body, &job.email, &job.company);

        match self.queue.enqueue(article).await {
            Ok(queued) => {
                debug!(%url, queued_at = %queued.queued_at, "Queued article");
                true
            }
            Err(e) => {
                error!(%url, error = %e, "Failed to queue article");
                false
            }
        }
    }
}
