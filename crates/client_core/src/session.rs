use std::{collections::BTreeMap, sync::Arc};

use serde::Serialize;
use shared::{domain::CatalogRecord, protocol::SearchMode};

use crate::{
    catalog::Catalog,
    error::{InstructionError, SearchError},
    filter::{apply_filters, apply_sorter, paginate, Page},
    types::{FilterState, Pagination, SortState, StreamingStatus},
};

/// Records the view is derived from, before facets and sorting.
#[derive(Debug, Clone)]
enum ViewBase {
    /// The whole catalog narrowed by a keyword; empty matches everything.
    Catalog { keyword: String },
    Ranked(Vec<Arc<CatalogRecord>>),
}

impl ViewBase {
    fn catalog() -> Self {
        ViewBase::Catalog {
            keyword: String::new(),
        }
    }
}

/// Search state of one user session.
///
/// Every transition keeps the pagination invariant: the page returns to 1
/// whenever the filters or the search text change value. The view is not
/// recomputed while an AI stream is thinking.
#[derive(Debug)]
pub struct SearchSession {
    catalog: Catalog,
    search_text: String,
    mode: SearchMode,
    filters: FilterState,
    sort: SortState,
    pagination: Pagination,
    status: StreamingStatus,
    weights: Option<BTreeMap<String, f64>>,
    last_error: Option<String>,
    base: ViewBase,
    view: Vec<Arc<CatalogRecord>>,
    observed_filters: FilterState,
    observed_text: String,
    request_seq: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub search_text: String,
    pub mode: SearchMode,
    pub filters: FilterState,
    pub sort: SortState,
    pub pagination: Pagination,
    pub status: StreamingStatus,
    pub thoughts: String,
    pub weights: Option<BTreeMap<String, f64>>,
    pub last_error: Option<String>,
    pub total: usize,
}

impl SearchSession {
    pub fn new(catalog: Catalog, page_size: usize) -> Self {
        let view = catalog.records().to_vec();
        Self {
            catalog,
            search_text: String::new(),
            mode: SearchMode::Keyword,
            filters: FilterState::new(),
            sort: SortState::default(),
            pagination: Pagination {
                page: 1,
                page_size: page_size.max(1),
            },
            status: StreamingStatus::Idle,
            weights: None,
            last_error: None,
            base: ViewBase::catalog(),
            view,
            observed_filters: FilterState::new(),
            observed_text: String::new(),
            request_seq: 0,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn sort(&self) -> SortState {
        self.sort
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn status(&self) -> StreamingStatus {
        self.status
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn view(&self) -> &[Arc<CatalogRecord>] {
        &self.view
    }

    pub fn snapshot(&self, thoughts: String) -> SessionSnapshot {
        SessionSnapshot {
            search_text: self.search_text.clone(),
            mode: self.mode,
            filters: self.filters.clone(),
            sort: self.sort,
            pagination: self.pagination,
            status: self.status,
            thoughts,
            weights: self.weights.clone(),
            last_error: self.last_error.clone(),
            total: self.view.len(),
        }
    }

    /// Issues the token for a new request; earlier tokens become stale.
    pub fn next_request(&mut self) -> u64 {
        self.request_seq += 1;
        self.request_seq
    }

    pub fn is_current(&self, request_id: u64) -> bool {
        self.request_seq == request_id
    }

    /// Empty submission: back to the keyword view of the whole catalog under
    /// the current filters.
    pub fn clear_search(&mut self) {
        self.search_text.clear();
        self.mode = SearchMode::Keyword;
        self.reset_outcome(StreamingStatus::Idle);
        self.base = ViewBase::catalog();
        self.observe();
        self.recompute();
    }

    pub fn begin_keyword(&mut self, text: &str) {
        self.search_text = text.to_string();
        self.mode = SearchMode::Keyword;
        self.reset_outcome(StreamingStatus::Idle);
        self.base = ViewBase::Catalog {
            keyword: text.to_string(),
        };
        self.observe();
        self.recompute();
    }

    /// The view keeps its previous base until ranked results arrive; facet
    /// and sort changes in the meantime still apply to it.
    pub fn begin_vector(&mut self, text: &str) {
        self.search_text = text.to_string();
        self.mode = SearchMode::Vector;
        self.reset_outcome(StreamingStatus::Idle);
        self.observe();
    }

    pub fn apply_ranked(
        &mut self,
        results: Vec<CatalogRecord>,
        weights: Option<BTreeMap<String, f64>>,
    ) {
        self.base = ViewBase::Ranked(self.catalog.resolve(results));
        self.weights = weights;
        self.recompute();
    }

    pub fn fail_search(&mut self, message: String) {
        self.last_error = Some(message);
    }

    /// Manual filters are cleared before the stream opens, even if the
    /// stream later produces nothing.
    pub fn begin_llm(&mut self, text: &str) {
        self.search_text = text.to_string();
        self.mode = SearchMode::Llm;
        self.filters.clear();
        self.reset_outcome(StreamingStatus::Thinking);
        self.base = ViewBase::catalog();
        self.observe();
    }

    /// Leaves the thinking phase and recomputes the view exactly once.
    pub fn finish_llm(&mut self, outcome: Result<FilterState, InstructionError>) {
        match outcome {
            Ok(filters) => {
                self.filters = filters;
                self.status = StreamingStatus::Closed;
            }
            Err(err) => {
                self.status = StreamingStatus::Errored;
                self.last_error = Some(err.to_string());
            }
        }
        self.observe();
        self.recompute();
    }

    /// Returns whether the filters changed value.
    pub fn set_filters(&mut self, filters: FilterState) -> bool {
        if self.filters == filters {
            return false;
        }
        self.filters = filters;
        self.observe();
        self.recompute();
        true
    }

    pub fn set_sort(&mut self, sort: SortState) -> bool {
        if self.sort == sort {
            return false;
        }
        self.sort = sort;
        self.recompute();
        true
    }

    pub fn set_page(&mut self, page: usize) {
        self.pagination.page = page.max(1);
    }

    pub fn set_page_size(&mut self, page_size: usize) -> Result<(), SearchError> {
        if page_size == 0 {
            return Err(SearchError::InvalidPageSize);
        }
        self.pagination.page_size = page_size;
        Ok(())
    }

    pub fn current_page(&self) -> Page<Arc<CatalogRecord>> {
        paginate(&self.view, self.pagination)
    }

    fn reset_outcome(&mut self, status: StreamingStatus) {
        self.status = status;
        self.weights = None;
        self.last_error = None;
    }

    fn observe(&mut self) {
        if self.filters != self.observed_filters || self.search_text != self.observed_text {
            self.pagination.page = 1;
            self.observed_filters = self.filters.clone();
            self.observed_text = self.search_text.clone();
        }
    }

    fn recompute(&mut self) {
        if self.status == StreamingStatus::Thinking {
            return;
        }
        let filtered = match &self.base {
            ViewBase::Catalog { keyword } => {
                apply_filters(self.catalog.records(), keyword, &self.filters)
            }
            ViewBase::Ranked(ranked) => apply_filters(ranked, "", &self.filters),
        };
        self.view = apply_sorter(filtered, self.sort);
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
