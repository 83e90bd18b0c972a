use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use shared::{
    domain::{CatalogRecord, SearchHistoryEntry},
    protocol::{SearchMode, SearchResponse},
};
use tokio::{
    sync::{broadcast, oneshot, watch, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

pub mod catalog;
pub mod collation;
pub mod config;
pub mod error;
pub mod filter;
pub mod history;
pub mod instruction_parser;
pub mod session;
pub mod transport;
pub mod types;

pub use catalog::Catalog;
pub use error::{CatalogError, InstructionError, SearchError, SettingsError, ValidationError};
pub use filter::{FacetOptions, Page};
pub use history::{MemorySearchHistory, SearchHistoryStore};
pub use instruction_parser::{FrameSource, InstructionParser};
pub use session::SessionSnapshot;
pub use types::{FilterState, Pagination, SortField, SortOrder, SortState, StreamingStatus};

use instruction_parser::drive;
use session::SearchSession;

/// Ranked search over the catalog index.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str, mode: SearchMode) -> Result<SearchResponse>;
}

pub struct MissingSearchBackend;

#[async_trait]
impl SearchBackend for MissingSearchBackend {
    async fn search(&self, _query: &str, mode: SearchMode) -> Result<SearchResponse> {
        Err(anyhow!("search backend unavailable for {mode} search"))
    }
}

/// Opens AI search streams.
#[async_trait]
pub trait InstructionTransport: Send + Sync {
    async fn open(&self, query: &str) -> Result<Box<dyn FrameSource>>;
}

pub struct MissingInstructionTransport;

#[async_trait]
impl InstructionTransport for MissingInstructionTransport {
    async fn open(&self, _query: &str) -> Result<Box<dyn FrameSource>> {
        Err(anyhow!("instruction stream unavailable"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    ThoughtsUpdated {
        request_id: u64,
        thoughts: String,
    },
    StreamStatusChanged {
        request_id: u64,
        status: StreamingStatus,
    },
    ViewChanged {
        total: usize,
        page: usize,
    },
    Error(String),
}

/// Owns the search session and coordinates the collaborators that feed it.
pub struct QueryOrchestrator {
    facet_options: FacetOptions,
    search_backend: Arc<dyn SearchBackend>,
    transport: Arc<dyn InstructionTransport>,
    history: Arc<dyn SearchHistoryStore>,
    session: Mutex<SearchSession>,
    active_stream: Mutex<Option<ActiveStream>>,
    thoughts: watch::Sender<String>,
    events: broadcast::Sender<SearchEvent>,
}

struct ActiveStream {
    request_id: u64,
    cancel: oneshot::Sender<()>,
    finished: watch::Receiver<bool>,
    task: JoinHandle<()>,
}

impl QueryOrchestrator {
    pub fn new(catalog: Catalog) -> Arc<Self> {
        Self::new_with_dependencies(
            catalog,
            types::DEFAULT_PAGE_SIZE,
            Arc::new(MissingSearchBackend),
            Arc::new(MissingInstructionTransport),
            Arc::new(MemorySearchHistory::default()),
        )
    }

    pub fn new_with_dependencies(
        catalog: Catalog,
        page_size: usize,
        search_backend: Arc<dyn SearchBackend>,
        transport: Arc<dyn InstructionTransport>,
        history: Arc<dyn SearchHistoryStore>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        let (thoughts, _) = watch::channel(String::new());
        Arc::new(Self {
            facet_options: filter::facet_options(catalog.records()),
            search_backend,
            transport,
            history,
            session: Mutex::new(SearchSession::new(catalog, page_size)),
            active_stream: Mutex::new(None),
            thoughts,
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SearchEvent> {
        self.events.subscribe()
    }

    /// Options for every facet, always derived from the full catalog.
    pub fn facet_options(&self) -> &FacetOptions {
        &self.facet_options
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let thoughts = self.thoughts.borrow().clone();
        self.session.lock().await.snapshot(thoughts)
    }

    pub async fn view(&self) -> Vec<Arc<CatalogRecord>> {
        self.session.lock().await.view().to_vec()
    }

    pub async fn current_page(&self) -> Page<Arc<CatalogRecord>> {
        self.session.lock().await.current_page()
    }

    /// Submits a search from the search box. Non-empty queries are recorded in
    /// the search history before the search runs.
    pub async fn submit_search(self: &Arc<Self>, text: &str, mode: SearchMode) -> Result<(), SearchError> {
        let text = text.trim();
        if !text.is_empty() {
            if let Err(err) = self.history.record(text).await {
                warn!(error = %err, "history: failed to record search");
            }
        }
        self.run_search(text, mode).await
    }

    /// Re-runs the current search text in `mode`. Switching to AI search
    /// waits for an explicit submit.
    pub async fn set_mode(self: &Arc<Self>, mode: SearchMode) -> Result<(), SearchError> {
        let text = self.session.lock().await.search_text().to_string();
        if text.is_empty() || mode == SearchMode::Llm {
            return Ok(());
        }
        self.run_search(&text, mode).await
    }

    async fn run_search(self: &Arc<Self>, text: &str, mode: SearchMode) -> Result<(), SearchError> {
        self.cancel_active_stream().await;
        self.thoughts.send_replace(String::new());

        if text.is_empty() {
            let mut session = self.session.lock().await;
            session.next_request();
            session.clear_search();
            self.emit_view(&session);
            return Ok(());
        }

        match mode {
            SearchMode::Keyword => {
                let mut session = self.session.lock().await;
                let request_id = session.next_request();
                session.begin_keyword(text);
                debug!(request_id, total = session.view().len(), "search: keyword");
                self.emit_view(&session);
                Ok(())
            }
            SearchMode::Vector => self.run_ranked_search(text).await,
            SearchMode::Llm => self.start_ai_search(text).await,
        }
    }

    async fn run_ranked_search(&self, text: &str) -> Result<(), SearchError> {
        let request_id = {
            let mut session = self.session.lock().await;
            let request_id = session.next_request();
            session.begin_vector(text);
            request_id
        };

        let response = self.search_backend.search(text, SearchMode::Vector).await;

        let mut session = self.session.lock().await;
        if !session.is_current(request_id) {
            debug!(request_id, "search: stale response discarded");
            return Ok(());
        }
        match response {
            Ok(response) => {
                info!(
                    request_id,
                    results = response.results.len(),
                    "search: ranked results applied"
                );
                session.apply_ranked(response.results, response.weights);
                self.emit_view(&session);
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                warn!(request_id, error = %message, "search: ranked search failed");
                session.fail_search(message.clone());
                let _ = self.events.send(SearchEvent::Error(message.clone()));
                Err(SearchError::Backend(message))
            }
        }
    }

    async fn start_ai_search(self: &Arc<Self>, text: &str) -> Result<(), SearchError> {
        let request_id = {
            let mut session = self.session.lock().await;
            let request_id = session.next_request();
            session.begin_llm(text);
            request_id
        };
        let _ = self.events.send(SearchEvent::StreamStatusChanged {
            request_id,
            status: StreamingStatus::Thinking,
        });

        let mut source = match self.transport.open(text).await {
            Ok(source) => source,
            Err(err) => {
                let error = InstructionError::Transport(format!("{err:#}"));
                self.finish_stream(request_id, Err(error.clone())).await;
                return Err(error.into());
            }
        };

        let mut active_stream = self.active_stream.lock().await;
        if !self.session.lock().await.is_current(request_id) {
            drop(active_stream);
            source.close().await;
            debug!(request_id, "stream: superseded before start");
            return Ok(());
        }

        let (cancel, cancel_rx) = oneshot::channel();
        let (finished_tx, finished) = watch::channel(false);
        let orchestrator = Arc::clone(self);
        let task = tokio::spawn(async move {
            orchestrator.run_stream(request_id, source, cancel_rx).await;
            let _ = finished_tx.send(true);
        });
        info!(request_id, "stream: started");
        *active_stream = Some(ActiveStream {
            request_id,
            cancel,
            finished,
            task,
        });
        Ok(())
    }

    async fn run_stream(
        self: Arc<Self>,
        request_id: u64,
        mut source: Box<dyn FrameSource>,
        mut cancel: oneshot::Receiver<()>,
    ) {
        let mut parser = InstructionParser::new();
        let outcome = tokio::select! {
            outcome = drive(source.as_mut(), &mut parser, |thoughts| {
                self.thoughts.send_replace(thoughts.to_string());
                let _ = self.events.send(SearchEvent::ThoughtsUpdated {
                    request_id,
                    thoughts: thoughts.to_string(),
                });
            }) => Some(outcome),
            _ = &mut cancel => None,
        };

        match outcome {
            Some(outcome) => self.finish_stream(request_id, outcome).await,
            None => {
                source.close().await;
                debug!(request_id, "stream: cancelled");
            }
        }

        let mut active_stream = self.active_stream.lock().await;
        if active_stream
            .as_ref()
            .is_some_and(|active| active.request_id == request_id)
        {
            *active_stream = None;
        }
    }

    async fn finish_stream(&self, request_id: u64, outcome: Result<FilterState, InstructionError>) {
        let mut session = self.session.lock().await;
        if !session.is_current(request_id) {
            debug!(request_id, "stream: stale outcome discarded");
            return;
        }
        if let Err(err) = &outcome {
            warn!(request_id, error = %err, "stream: no instruction applied");
            if matches!(err, InstructionError::Transport(_)) {
                self.thoughts.send_replace(String::new());
                let _ = self.events.send(SearchEvent::ThoughtsUpdated {
                    request_id,
                    thoughts: String::new(),
                });
            }
            let _ = self.events.send(SearchEvent::Error(err.to_string()));
        }
        session.finish_llm(outcome);
        info!(
            request_id,
            status = ?session.status(),
            total = session.view().len(),
            "stream: finished"
        );
        let _ = self.events.send(SearchEvent::StreamStatusChanged {
            request_id,
            status: session.status(),
        });
        self.emit_view(&session);
    }

    /// Signals the running stream, if any, and waits for its task to close
    /// the transport.
    async fn cancel_active_stream(&self) {
        let active = self.active_stream.lock().await.take();
        let Some(active) = active else {
            return;
        };
        let _ = active.cancel.send(());
        if let Err(err) = active.task.await {
            warn!(request_id = active.request_id, error = %err, "stream: task failed");
        }
    }

    /// Resolves once the current AI search stream, if any, has finished.
    pub async fn wait_for_stream(&self) {
        let finished = self
            .active_stream
            .lock()
            .await
            .as_ref()
            .map(|active| active.finished.clone());
        if let Some(mut finished) = finished {
            let _ = finished.wait_for(|done| *done).await;
        }
    }

    /// Replaces the facet selection. Returns whether the selection changed
    /// value.
    pub async fn set_facet_selection(&self, filters: FilterState) -> bool {
        let mut session = self.session.lock().await;
        let changed = session.set_filters(filters);
        if changed && session.status() != StreamingStatus::Thinking {
            self.emit_view(&session);
        }
        changed
    }

    /// Facet selection from an untyped payload; malformed parts are dropped.
    pub async fn apply_selection(&self, raw: &Value) -> bool {
        self.set_facet_selection(filter::build_filter_state_from_selection(raw))
            .await
    }

    pub async fn set_sort(&self, sort: SortState) -> bool {
        let mut session = self.session.lock().await;
        let changed = session.set_sort(sort);
        if changed && session.status() != StreamingStatus::Thinking {
            self.emit_view(&session);
        }
        changed
    }

    pub async fn set_page(&self, page: usize) {
        let mut session = self.session.lock().await;
        session.set_page(page);
        self.emit_view(&session);
    }

    pub async fn set_page_size(&self, page_size: usize) -> Result<(), SearchError> {
        let mut session = self.session.lock().await;
        session.set_page_size(page_size)?;
        self.emit_view(&session);
        Ok(())
    }

    pub async fn history(&self) -> Result<Vec<SearchHistoryEntry>> {
        self.history.recent().await
    }

    pub async fn clear_history(&self) -> Result<()> {
        self.history.clear().await
    }

    fn emit_view(&self, session: &SearchSession) {
        let _ = self.events.send(SearchEvent::ViewChanged {
            total: session.view().len(),
            page: session.pagination().page,
        });
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
