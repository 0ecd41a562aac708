//! Paginated list control.
//!
//! One [`ListController`] backs one list view. It owns the [`ListQuery`],
//! debounces search input, refetches on every other query change, and hands
//! each response through the tolerant decoder on the fetcher side.
//!
//! Rapid query changes can leave several fetches in flight at once; each
//! fetch carries a monotonically increasing ticket and only the most
//! recently issued one may update visible state, so a slow early response
//! can never overwrite a newer one. A failed fetch clears the table and
//! emits a notice rather than leaving stale rows on screen silently.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::ServiceResult;
use crate::notify::{Notice, Notifier, TracingNotifier};
use crate::query::{ListPage, ListQuery, SortOrder};

/// Quiet period after the last keystroke before a search refetch fires.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(350);

/// Source of list pages for one resource.
pub trait ListFetcher: Send + Sync + 'static {
    type Row: Clone + Send + 'static;

    fn fetch_page(
        &self,
        query: &ListQuery,
    ) -> impl Future<Output = ServiceResult<ListPage<Self::Row>>> + Send;
}

struct Inner<R> {
    query: ListQuery,
    rows: Vec<R>,
    total: u64,
    /// Ticket of the most recently issued fetch.
    issued: u64,
    /// Generation of the most recent search keystroke.
    search_gen: u64,
}

pub struct ListController<F: ListFetcher> {
    fetcher: Arc<F>,
    notifier: Arc<dyn Notifier>,
    debounce: Duration,
    inner: Arc<Mutex<Inner<F::Row>>>,
}

impl<F: ListFetcher> Clone for ListController<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            notifier: Arc::clone(&self.notifier),
            debounce: self.debounce,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: ListFetcher> ListController<F> {
    pub fn new(fetcher: F, query: ListQuery) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            notifier: Arc::new(TracingNotifier),
            debounce: SEARCH_DEBOUNCE,
            inner: Arc::new(Mutex::new(Inner {
                query,
                rows: Vec::new(),
                total: 0,
                issued: 0,
                search_gen: 0,
            })),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn query(&self) -> ListQuery {
        self.lock().query.clone()
    }

    /// Snapshot of the currently visible page.
    pub fn current(&self) -> ListPage<F::Row> {
        let inner = self.lock();
        ListPage {
            rows: inner.rows.clone(),
            total: inner.total,
            page: inner.query.page,
            limit: inner.query.limit,
        }
    }

    /// Fetches the current query and applies the result unless a newer
    /// fetch has been issued in the meantime.
    pub async fn refresh(&self) -> ServiceResult<()> {
        let (query, ticket) = {
            let mut inner = self.lock();
            inner.issued += 1;
            (inner.query.clone(), inner.issued)
        };

        let result = self.fetcher.fetch_page(&query).await;

        let mut inner = self.lock();
        if ticket != inner.issued {
            // Superseded while in flight; a newer fetch owns the view now.
            tracing::debug!(ticket, latest = inner.issued, "discarding stale list response");
            return Ok(());
        }

        match result {
            Ok(page) => {
                inner.rows = page.rows;
                inner.total = page.total;
                Ok(())
            }
            Err(err) => {
                inner.rows.clear();
                inner.total = 0;
                drop(inner);
                self.notifier
                    .notify(Notice::error(format!("failed to load list: {err}")));
                Err(err)
            }
        }
    }

    /// Records a search keystroke and refetches at page 1 once the input
    /// has been quiet for the debounce interval. A burst of calls results
    /// in a single fetch carrying the final text.
    pub async fn search(&self, text: &str) -> ServiceResult<()> {
        let generation = {
            let mut inner = self.lock();
            inner.query.search = text.to_string();
            inner.query.page = 1;
            inner.search_gen += 1;
            inner.search_gen
        };

        tokio::time::sleep(self.debounce).await;

        if generation != self.lock().search_gen {
            // A newer keystroke supersedes this one.
            return Ok(());
        }
        self.refresh().await
    }

    /// Sets or clears a filter and refetches immediately at page 1.
    pub async fn set_filter(&self, key: &str, value: &str) -> ServiceResult<()> {
        {
            let mut inner = self.lock();
            if value.is_empty() {
                inner.query.filters.remove(key);
            } else {
                inner.query.filters.insert(key.to_string(), value.to_string());
            }
            inner.query.page = 1;
        }
        self.refresh().await
    }

    /// Changes the sort key/direction, preserving the current page.
    pub async fn set_sort(&self, sort_by: &str, order: SortOrder) -> ServiceResult<()> {
        {
            let mut inner = self.lock();
            inner.query.sort_by = sort_by.to_string();
            inner.query.sort_order = order;
        }
        self.refresh().await
    }

    pub async fn set_page(&self, page: u32) -> ServiceResult<()> {
        {
            let mut inner = self.lock();
            inner.query.page = page.max(1);
        }
        self.refresh().await
    }

    pub async fn set_limit(&self, limit: u32) -> ServiceResult<()> {
        {
            let mut inner = self.lock();
            inner.query.limit = limit.max(1);
        }
        self.refresh().await
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<F::Row>> {
        // Recover from a poisoned lock; list state is view state, not an
        // invariant worth aborting over.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
