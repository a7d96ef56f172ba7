//! Search session registry
//!
//! `SearchServer` hands out search ids, keeps track of the ripgrep process
//! behind every ongoing search and makes sure each search is wrapped up
//! exactly once, whether it completes, fails, hits its result cap or is
//! cancelled.

use super::aggregator::{ResultAggregator, Step};
use super::args::build_command_line;
use super::parser::StreamParser;
use super::paths::{normalize_options, NormalizedSearch};
use super::process::{OutputEvent, ProcessHandle, ProcessSession};
use crate::client::SearchClient;
use crate::config::SearchConfig;
use crate::types::{SearchId, SearchOptions, SearchResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use url::Url;

/// An ongoing search and the process serving it.
#[derive(Debug, Clone)]
pub struct ActiveSearch {
    pub id: SearchId,
    pub process: ProcessHandle,
    delivery: Delivery,
}

#[derive(Debug, Default)]
struct DeliveryState {
    finished: bool,
    delivering: bool,
    /// `on_done` held back until the in-flight `on_result` returns
    pending_done: Option<Option<String>>,
}

/// Orders the client callbacks of one search.
///
/// No lock is held while the client runs, so callbacks may call back into
/// the server. Once a search is finished no new result is delivered, and a
/// finish that races with an in-flight result is reported by the delivering
/// side after the result callback returns.
#[derive(Debug, Clone, Default)]
struct Delivery {
    state: Arc<Mutex<DeliveryState>>,
}

impl Delivery {
    fn lock(&self) -> MutexGuard<'_, DeliveryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the right to deliver one result, `false` once finished.
    fn begin_result(&self) -> bool {
        let mut state = self.lock();
        if state.finished {
            return false;
        }
        state.delivering = true;
        true
    }

    /// Release the claim, returning a deferred `on_done` if there is one.
    fn end_result(&self) -> Option<Option<String>> {
        let mut state = self.lock();
        state.delivering = false;
        state.pending_done.take()
    }

    /// Mark the search finished. Returns the error to report now, or `None`
    /// when a result is being delivered and the report is deferred.
    fn finish(&self, error: Option<String>) -> Option<Option<String>> {
        let mut state = self.lock();
        state.finished = true;
        if state.delivering {
            state.pending_done = Some(error);
            None
        } else {
            Some(error)
        }
    }
}

struct Inner {
    config: SearchConfig,
    next_search_id: AtomicU64,
    ongoing_searches: Mutex<HashMap<SearchId, ActiveSearch>>,
    client: RwLock<Option<Arc<dyn SearchClient>>>,
}

/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct SearchServer {
    inner: Arc<Inner>,
}

impl SearchServer {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                next_search_id: AtomicU64::new(1),
                ongoing_searches: Mutex::new(HashMap::new()),
                client: RwLock::new(None),
            }),
        }
    }

    /// Register the sink for results and completion notices.
    pub fn set_client(&self, client: Option<Arc<dyn SearchClient>>) {
        *self.inner.client.write().unwrap_or_else(PoisonError::into_inner) = client;
    }

    /// Start searching `query` in the given workspace roots.
    ///
    /// Returns as soon as the search is registered; results arrive later
    /// through the client. Include patterns naming existing folders narrow
    /// the search roots, `./` patterns are resolved against them.
    pub async fn search(
        &self,
        query: &str,
        root_uris: &[String],
        options: Option<SearchOptions>,
    ) -> SearchId {
        let search_id = self.inner.next_search_id.fetch_add(1, Ordering::SeqCst);

        let root_paths = root_uris_to_paths(root_uris);
        let options = options.unwrap_or_default();
        let NormalizedSearch {
            search_paths,
            options,
        } = normalize_options(&root_paths, &options);
        let args = build_command_line(
            query,
            &options,
            &search_paths,
            &self.inner.config.default_max_file_size,
        );

        let process = ProcessHandle::new();
        let delivery = Delivery::default();
        self.lock_searches().insert(
            search_id,
            ActiveSearch {
                id: search_id,
                process: process.clone(),
                delivery: delivery.clone(),
            },
        );

        log::info!("Starting search {} for {:?} in {:?}", search_id, query, search_paths);

        let server = self.clone();
        let limit = options.result_limit();
        tokio::spawn(async move {
            server
                .run_search(search_id, args, root_paths, limit, process, delivery)
                .await;
        });

        search_id
    }

    /// Cancel an ongoing search.
    ///
    /// Cancelling a search that already finished, or never existed, is not an
    /// error: a client cancel may race with normal completion.
    pub fn cancel(&self, search_id: SearchId) {
        let process = self
            .lock_searches()
            .get(&search_id)
            .map(|search| search.process.clone());

        if let Some(process) = process {
            log::info!("Cancelling search {}", search_id);
            process.kill();
            self.wrap_up_search(search_id, None);
        }
    }

    /// Cancel every ongoing search.
    pub fn dispose(&self) {
        let ids: Vec<SearchId> = self.lock_searches().keys().copied().collect();
        for search_id in ids {
            self.cancel(search_id);
        }
    }

    pub fn active_searches(&self) -> Vec<SearchId> {
        let mut ids: Vec<SearchId> = self.lock_searches().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Forget about `search_id` and send `on_done` to the client.
    ///
    /// Only the first call for a given id notifies the client.
    pub fn wrap_up_search(&self, search_id: SearchId, error: Option<String>) {
        let removed = self.lock_searches().remove(&search_id);
        let Some(search) = removed else {
            log::debug!("Trying to wrap up a search we don't know about {}", search_id);
            return;
        };

        match search.delivery.finish(error) {
            Some(error) => self.notify_done(search_id, error),
            None => log::debug!("Search {} finished during a result, deferring onDone", search_id),
        }
    }

    /// Deliver one file's result unless the search has already been wrapped up.
    fn deliver_result(&self, search_id: SearchId, delivery: &Delivery, result: SearchResult) {
        if !delivery.begin_result() {
            log::trace!("Dropping result for finished search {}", search_id);
            return;
        }
        if let Some(client) = self.client() {
            client.on_result(search_id, result);
        }
        if let Some(error) = delivery.end_result() {
            self.notify_done(search_id, error);
        }
    }

    fn notify_done(&self, search_id: SearchId, error: Option<String>) {
        match self.client() {
            Some(client) => {
                log::debug!("Sending onDone for {} {:?}", search_id, error);
                client.on_done(search_id, error);
            }
            None => log::debug!("Wrapping up search {} but no client", search_id),
        }
    }

    async fn run_search(
        &self,
        search_id: SearchId,
        args: Vec<String>,
        roots: Vec<PathBuf>,
        limit: Option<usize>,
        process: ProcessHandle,
        delivery: Delivery,
    ) {
        if process.is_killed() {
            log::debug!("Search {} cancelled before ripgrep was started", search_id);
            return;
        }

        let mut session = match ProcessSession::spawn(&self.inner.config.rg_path, &args, process.clone()) {
            Ok(session) => session,
            Err(e) => {
                log::error!("Search {} failed to start: {}", search_id, e);
                self.wrap_up_search(search_id, Some(e.user_message()));
                return;
            }
        };

        let mut parser = StreamParser::new();
        let mut aggregator = ResultAggregator::new(roots, limit);
        let mut emit = |result: SearchResult| self.deliver_result(search_id, &delivery, result);

        loop {
            let event = tokio::select! {
                _ = process.killed() => {
                    log::debug!("Search {} stopped", search_id);
                    return;
                }
                event = session.next_event() => event,
            };

            match event {
                Some(OutputEvent::Chunk(chunk)) => {
                    parser.push(&chunk);
                    while let Some(message) = parser.next_message() {
                        // Nothing decoded after a kill may reach the client
                        if process.is_killed() {
                            return;
                        }
                        if aggregator.handle(message, &mut emit) == Step::LimitReached {
                            process.kill();
                            log::info!(
                                "Search {} reached its limit of {} results",
                                search_id,
                                aggregator.num_results()
                            );
                            self.wrap_up_search(search_id, None);
                            return;
                        }
                    }
                }
                Some(OutputEvent::Error(e)) => {
                    log::error!("Search {} failed: {}", search_id, e);
                    aggregator.finish(&mut emit);
                    self.wrap_up_search(search_id, Some(e.user_message()));
                    return;
                }
                Some(OutputEvent::End) | None => {
                    aggregator.finish(&mut emit);
                    log::info!(
                        "Search {} finished with {} results ({} unreadable lines skipped)",
                        search_id,
                        aggregator.num_results(),
                        parser.skipped()
                    );
                    self.wrap_up_search(search_id, None);
                    return;
                }
            }
        }
    }

    fn lock_searches(&self) -> MutexGuard<'_, HashMap<SearchId, ActiveSearch>> {
        self.inner
            .ongoing_searches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn client(&self) -> Option<Arc<dyn SearchClient>> {
        self.inner
            .client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Convert workspace root URIs to filesystem paths.
///
/// Plain absolute paths are accepted as well; anything else is skipped.
fn root_uris_to_paths(root_uris: &[String]) -> Vec<PathBuf> {
    root_uris
        .iter()
        .filter_map(|uri| match Url::parse(uri) {
            Ok(url) if url.scheme() == "file" => url.to_file_path().ok(),
            _ if Path::new(uri).is_absolute() => Some(PathBuf::from(uri)),
            _ => {
                log::warn!("Ignoring unsupported root URI {:?}", uri);
                None
            }
        })
        .collect()
}
