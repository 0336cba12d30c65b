//! Worker-pool scrape orchestration
//!
//! One [`Engine`] run drains a shared seed list through a bounded pool of
//! worker tasks. A feeder task walks the seed list by index, expanding each
//! URL pattern lazily against the job channel's capacity, and sends jobs;
//! workers fetch, evaluate and report records; an aggregator task receives
//! them keyed by page URL. At the top level each record streams straight to
//! the export sink; a failed sink write aborts the whole pool through a
//! watch channel the feeder and workers observe. Nested pools keep their
//! records in the returned map instead, for embedding in the parent record.
//!
//! Pagination makes the seed list grow while it is being drained, so the
//! feeder cannot close the job channel at the end of the initial list. It
//! closes only once the list is exhausted AND no job is still in flight,
//! which is the only point where no new seed can appear anymore.
//!
//! Nested Link selectors recurse: each one starts a fresh pool over its
//! discovered links, scoped to that selector's id, and the resulting map is
//! embedded in the parent record. Recursion depth follows the sitemap tree.

use crate::output::{create_sink, ExportFormat, ExportSink};
use crate::scrape::evaluator::evaluate_page;
use crate::scrape::fetcher::Fetcher;
use crate::sitemap::{SiteMap, ROOT_PARENT};
use crate::url::{expand_pattern, is_valid_url};
use crate::{Result, Settings};
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex, Notify};

/// Page URL to extraction record.
pub type RecordMap = Map<String, Value>;

/// One unit of work for a worker: fetch and evaluate a single page.
#[derive(Debug)]
struct ScrapeJob {
    url: String,
}

/// One pool invocation's shared state: the sitemap and the seed list the
/// feeder drains and pagination extends.
#[derive(Clone)]
struct Scope {
    sitemap: Arc<SiteMap>,
    seeds: Arc<Mutex<Vec<String>>>,
}

/// Drives a full scrape for one configuration.
///
/// Cloning is cheap; every worker task holds a clone.
#[derive(Clone)]
pub struct Engine<F: Fetcher> {
    settings: Arc<Settings>,
    fetcher: F,
    sink: Arc<Mutex<Box<dyn ExportSink>>>,
}

impl<F: Fetcher> Engine<F> {
    /// Builds the engine and its export sink. Fails before any page is
    /// fetched when the export format is unknown or the output file cannot
    /// be created, truncating the output file otherwise.
    pub fn new(settings: Settings, fetcher: F) -> Result<Self> {
        let format: ExportFormat = settings.export.parse()?;
        let sink = create_sink(format, std::path::Path::new(&settings.output_file))?;
        Ok(Self {
            settings: Arc::new(settings),
            fetcher,
            sink: Arc::new(Mutex::new(sink)),
        })
    }

    /// Scrapes every page the sitemap's URL patterns expand to. Root records
    /// stream to the export sink as they complete; nothing accumulates in
    /// memory at this level.
    pub async fn run(&self, sitemap: SiteMap) -> Result<()> {
        let seeds = sitemap.start_urls.clone();
        tracing::info!(sitemap = %sitemap.id, patterns = seeds.len(), "starting scrape");

        let scope = Scope {
            sitemap: Arc::new(sitemap),
            seeds: Arc::new(Mutex::new(seeds)),
        };
        self.scrape(scope, ROOT_PARENT.to_string()).await?;
        tracing::info!("scrape finished");
        Ok(())
    }

    /// Runs one worker pool over a scope. Boxed because nested Link
    /// selectors call back into it from inside a worker.
    fn scrape(
        &self,
        scope: Scope,
        parent: String,
    ) -> Pin<Box<dyn Future<Output = Result<RecordMap>> + Send>> {
        let engine = self.clone();
        Box::pin(async move { engine.run_pool(scope, parent).await })
    }

    async fn run_pool(self, scope: Scope, parent: String) -> Result<RecordMap> {
        let workers = self.settings.workers;
        let (job_tx, job_rx) = mpsc::channel::<ScrapeJob>(workers);
        let (result_tx, mut result_rx) = mpsc::channel::<(String, RecordMap)>(workers);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let idle = Arc::new(Notify::new());
        let (abort_tx, abort_rx) = watch::channel(false);

        let feeder = tokio::spawn(feed(
            scope.seeds.clone(),
            job_tx,
            in_flight.clone(),
            idle.clone(),
            abort_rx.clone(),
        ));

        let job_rx = Arc::new(Mutex::new(job_rx));
        let mut worker_handles = Vec::with_capacity(workers);
        for n in 0..workers {
            worker_handles.push(tokio::spawn(self.clone().worker(
                n,
                scope.clone(),
                parent.clone(),
                job_rx.clone(),
                result_tx.clone(),
                in_flight.clone(),
                idle.clone(),
                abort_rx.clone(),
            )));
        }
        drop(result_tx);
        drop(abort_rx);

        // Top-level records go straight to the sink and are not retained;
        // nested maps are returned for embedding in the parent record.
        let export = parent == ROOT_PARENT;
        let sink = self.sink.clone();
        let aggregator = tokio::spawn(async move {
            let mut records = RecordMap::new();
            while let Some((url, record)) = result_rx.recv().await {
                let record = Value::Object(record);
                if export {
                    if let Err(e) = sink.lock().await.write(&url, &record) {
                        // Losing records silently is worse than stopping:
                        // tell the feeder and workers to stand down now.
                        let _ = abort_tx.send(true);
                        return Err(e.into());
                    }
                } else {
                    records.insert(url, record);
                }
            }
            Ok::<RecordMap, crate::WeftError>(records)
        });

        for handle in worker_handles {
            handle.await?;
        }
        feeder.await?;
        aggregator.await?
    }

    async fn worker(
        self,
        id: usize,
        scope: Scope,
        parent: String,
        jobs: Arc<Mutex<mpsc::Receiver<ScrapeJob>>>,
        results: mpsc::Sender<(String, RecordMap)>,
        in_flight: Arc<AtomicUsize>,
        idle: Arc<Notify>,
        abort: watch::Receiver<bool>,
    ) {
        loop {
            // Hold the receiver lock only for the handoff so other workers
            // can take the next job while this one scrapes.
            let job = { jobs.lock().await.recv().await };
            let Some(job) = job else {
                break;
            };
            // After an abort the queue is drained without fetching so the
            // in-flight count still reaches zero and the feeder can close.
            if !*abort.borrow() {
                tracing::debug!(worker = id, url = %job.url, %parent, "processing page");
                if let Err(e) = self.process(&scope, &parent, &job.url, &results).await {
                    tracing::warn!(url = %job.url, error = %e, "page dropped");
                }
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);
            idle.notify_waiters();
        }
    }

    /// Fetches and evaluates one page, handles its pagination and nested
    /// scrapes, and reports its record.
    async fn process(
        &self,
        scope: &Scope,
        parent: &str,
        url: &str,
        results: &mpsc::Sender<(String, RecordMap)>,
    ) -> Result<()> {
        let delay = scope
            .sitemap
            .children_of(parent)
            .map(|s| s.delay)
            .max()
            .unwrap_or(0);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let body = self
            .fetcher
            .fetch(url, self.settings.active_user_agent())
            .await?;
        let evaluation = evaluate_page(&body, url, &scope.sitemap, parent);

        if !evaluation.pagination.is_empty() {
            let mut seeds = scope.seeds.lock().await;
            for link in evaluation.pagination {
                // Exact string match; trailing slashes or fragments make a
                // link count as new.
                if !seeds.contains(&link) {
                    tracing::debug!(url = %link, "pagination discovered seed");
                    seeds.push(link);
                }
            }
        }

        let mut record = evaluation.record;
        for nested in evaluation.nested {
            let child_scope = Scope {
                sitemap: scope.sitemap.clone(),
                seeds: Arc::new(Mutex::new(nested.links)),
            };
            let child_records = self.scrape(child_scope, nested.selector_id.clone()).await?;
            record.insert(nested.selector_id, Value::Object(child_records));
        }

        if !record.is_empty() {
            // Send fails only when the aggregator died on a fatal export
            // error; that error surfaces from the pool itself.
            let _ = results.send((url.to_string(), record)).await;
        }
        Ok(())
    }
}

/// Feeds seeds into the job channel in list order, expanding each pattern
/// lazily: the bounded channel applies backpressure to expansion itself, so
/// a huge range never materializes in memory. Syntactically invalid URLs
/// are discarded with a log line.
///
/// The in-flight counter is incremented before the job is sent so the gap
/// between "list drained" and "worker still scraping" is never observable:
/// whenever the counter reads zero with the list drained, no pagination
/// append can be pending.
///
/// An abort signal from the aggregator stops feeding at once, even while a
/// send is blocked on a full channel.
async fn feed(
    seeds: Arc<Mutex<Vec<String>>>,
    jobs: mpsc::Sender<ScrapeJob>,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
    mut abort: watch::Receiver<bool>,
) {
    let mut index = 0;
    loop {
        if *abort.borrow() {
            return;
        }
        let next = { seeds.lock().await.get(index).cloned() };
        match next {
            Some(pattern) => {
                index += 1;
                for url in expand_pattern(&pattern) {
                    if !is_valid_url(&url) {
                        tracing::debug!(url = %url, "discarding invalid seed URL");
                        continue;
                    }
                    in_flight.fetch_add(1, Ordering::SeqCst);
                    tokio::select! {
                        sent = jobs.send(ScrapeJob { url }) => {
                            if sent.is_err() {
                                in_flight.fetch_sub(1, Ordering::SeqCst);
                                return;
                            }
                        }
                        _ = abort.changed() => {
                            in_flight.fetch_sub(1, Ordering::SeqCst);
                            return;
                        }
                    }
                }
            }
            None => {
                // Register before re-checking so a worker finishing between
                // the check and the await still wakes the feeder.
                let notified = idle.notified();
                let drained = seeds.lock().await.len() <= index;
                if drained {
                    if in_flight.load(Ordering::SeqCst) == 0 {
                        break;
                    }
                    notified.await;
                }
            }
        }
    }
    // Dropping the sender closes the job channel and lets workers exit.
}
