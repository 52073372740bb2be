//! Bounded pagination over a [`PriceProvider`].
//!
//! A [`PageCursor`] walks offsets until the provider returns a short page, or
//! until its [`PaginationBudget`] runs out. [`PageFetcher`] drives the cursor
//! against a real provider with rate limiting and timeouts.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::errors::MarketDataError;
use crate::models::{PageRequest, PageSet, PricePage};
use crate::provider::PriceProvider;
use crate::rate_limiter::RateLimiter;

/// Limits applied to a single (state, date) page walk.
#[derive(Clone, Debug)]
pub struct PaginationBudget {
    pub page_size: usize,
    pub max_pages: usize,
    pub max_records: usize,
    /// Upper bound for one page request, including rate limiter wait.
    pub page_timeout: Duration,
    /// Upper bound for the whole walk.
    pub batch_timeout: Duration,
}

impl Default for PaginationBudget {
    fn default() -> Self {
        Self {
            page_size: 1000,
            max_pages: 50,
            max_records: 50_000,
            page_timeout: Duration::from_secs(30),
            batch_timeout: Duration::from_secs(300),
        }
    }
}

/// Offset cursor with an explicit termination rule.
///
/// The walk ends on the first short page, or once `max_pages` pages or
/// `max_records` rows have been collected (the result is then truncated).
#[derive(Debug)]
pub struct PageCursor {
    state: String,
    date: Option<NaiveDate>,
    offset: usize,
    pages: usize,
    records: usize,
    exhausted: bool,
    budget: PaginationBudget,
}

impl PageCursor {
    pub fn new(state: impl Into<String>, date: Option<NaiveDate>, budget: PaginationBudget) -> Self {
        Self {
            state: state.into(),
            date,
            offset: 0,
            pages: 0,
            records: 0,
            exhausted: false,
            budget,
        }
    }

    fn budget_spent(&self) -> bool {
        self.pages >= self.budget.max_pages || self.records >= self.budget.max_records
    }

    /// The next request to issue, or `None` when the walk is over.
    pub fn next_request(&self) -> Option<PageRequest> {
        if self.exhausted || self.budget_spent() {
            return None;
        }
        let remaining = self.budget.max_records - self.records;
        let limit = self.budget.page_size.min(remaining).max(1);
        Some(PageRequest::new(self.state.clone(), self.date, self.offset, limit))
    }

    /// Record a received page.
    pub fn advance(&mut self, page: &PricePage) {
        self.pages += 1;
        self.records += page.rows.len();
        self.offset += page.rows.len();
        if !page.has_more || page.rows.is_empty() {
            self.exhausted = true;
        }
    }

    /// True when the budget stopped the walk before the provider ran dry.
    pub fn truncated(&self) -> bool {
        !self.exhausted && self.budget_spent()
    }

    pub fn pages(&self) -> usize {
        self.pages
    }
}

/// Walks every page for a (state, date) against one provider.
pub struct PageFetcher {
    provider: Arc<dyn PriceProvider>,
    limiter: RateLimiter,
    budget: PaginationBudget,
}

impl PageFetcher {
    pub fn new(provider: Arc<dyn PriceProvider>, budget: PaginationBudget) -> Self {
        let limiter = RateLimiter::new();
        limiter.configure(provider.id(), provider.rate_limit().into());
        Self {
            provider,
            limiter,
            budget,
        }
    }

    pub fn provider_id(&self) -> &'static str {
        self.provider.id()
    }

    pub fn budget(&self) -> &PaginationBudget {
        &self.budget
    }

    /// Fetch a single page under the rate limiter and page timeout.
    pub async fn fetch_page(&self, request: &PageRequest) -> Result<PricePage, MarketDataError> {
        let provider_id = self.provider.id();
        let call = async {
            self.limiter.acquire(provider_id).await;
            self.provider.fetch_page(request).await
        };
        tokio::time::timeout(self.budget.page_timeout, call)
            .await
            .map_err(|_| {
                warn!(
                    "Page request to {} timed out after {:?} (state={}, offset={})",
                    provider_id, self.budget.page_timeout, request.state, request.offset
                );
                MarketDataError::Timeout {
                    provider: provider_id.to_string(),
                }
            })?
    }

    /// Fetch every page for a state and optional date.
    ///
    /// Any page failure fails the whole walk; rows from earlier pages are dropped.
    pub async fn fetch_all(
        &self,
        state: &str,
        date: Option<NaiveDate>,
    ) -> Result<PageSet, MarketDataError> {
        let walk = async {
            let mut cursor = PageCursor::new(state, date, self.budget.clone());
            let mut rows = Vec::new();

            while let Some(request) = cursor.next_request() {
                let page = self.fetch_page(&request).await?;
                cursor.advance(&page);
                rows.extend(page.rows);
            }

            let truncated = cursor.truncated();
            if truncated {
                warn!(
                    "Pagination budget reached for {} {:?} after {} pages",
                    state,
                    date,
                    cursor.pages()
                );
            }
            debug!(
                "Fetched {} rows in {} pages for {} {:?}",
                rows.len(),
                cursor.pages(),
                state,
                date
            );

            Ok::<_, MarketDataError>(PageSet {
                rows,
                pages_fetched: cursor.pages(),
                truncated,
            })
        };

        tokio::time::timeout(self.budget.batch_timeout, walk)
            .await
            .map_err(|_| MarketDataError::Timeout {
                provider: self.provider.id().to_string(),
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawPriceRow;
    use crate::provider::RateLimit;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn row(i: usize) -> RawPriceRow {
        RawPriceRow {
            state: "Karnataka".to_string(),
            market: format!("Market {}", i),
            commodity: "Tomato".to_string(),
            ..Default::default()
        }
    }

    fn fast_limit() -> RateLimit {
        RateLimit {
            requests_per_minute: 60_000,
            burst: 100,
            min_delay: Duration::ZERO,
        }
    }

    /// Serves `total` rows in pages of the requested size.
    struct FiniteProvider {
        total: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PriceProvider for FiniteProvider {
        fn id(&self) -> &'static str {
            "FINITE"
        }

        fn rate_limit(&self) -> RateLimit {
            fast_limit()
        }

        async fn fetch_page(&self, request: &PageRequest) -> Result<PricePage, MarketDataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let end = (request.offset + request.limit).min(self.total);
            let rows = (request.offset..end).map(row).collect();
            Ok(PricePage::from_rows(rows, request.limit))
        }
    }

    /// Always returns a full page.
    struct EndlessProvider;

    #[async_trait]
    impl PriceProvider for EndlessProvider {
        fn id(&self) -> &'static str {
            "ENDLESS"
        }

        fn rate_limit(&self) -> RateLimit {
            fast_limit()
        }

        async fn fetch_page(&self, request: &PageRequest) -> Result<PricePage, MarketDataError> {
            let rows = (0..request.limit).map(|i| row(request.offset + i)).collect();
            Ok(PricePage::from_rows(rows, request.limit))
        }
    }

    /// Never answers.
    struct HangingProvider;

    #[async_trait]
    impl PriceProvider for HangingProvider {
        fn id(&self) -> &'static str {
            "HANGING"
        }

        fn rate_limit(&self) -> RateLimit {
            fast_limit()
        }

        async fn fetch_page(&self, _request: &PageRequest) -> Result<PricePage, MarketDataError> {
            std::future::pending().await
        }
    }

    fn budget(page_size: usize, max_pages: usize, max_records: usize) -> PaginationBudget {
        PaginationBudget {
            page_size,
            max_pages,
            max_records,
            ..Default::default()
        }
    }

    #[test]
    fn test_cursor_stops_on_short_page() {
        let mut cursor = PageCursor::new("Karnataka", None, budget(10, 100, 10_000));

        let first = cursor.next_request().unwrap();
        assert_eq!(first.offset, 0);
        cursor.advance(&PricePage::from_rows((0..10).map(row).collect(), 10));

        let second = cursor.next_request().unwrap();
        assert_eq!(second.offset, 10);
        cursor.advance(&PricePage::from_rows((0..4).map(row).collect(), 10));

        assert!(cursor.next_request().is_none());
        assert!(!cursor.truncated());
    }

    #[test]
    fn test_cursor_trims_last_page_to_record_budget() {
        let mut cursor = PageCursor::new("Karnataka", None, budget(10, 100, 15));
        cursor.advance(&PricePage::from_rows((0..10).map(row).collect(), 10));

        let next = cursor.next_request().unwrap();
        assert_eq!(next.limit, 5);
    }

    #[tokio::test]
    async fn test_fetch_all_collects_every_page() {
        let provider = Arc::new(FiniteProvider {
            total: 25,
            calls: AtomicUsize::new(0),
        });
        let fetcher = PageFetcher::new(provider.clone(), budget(10, 100, 10_000));

        let set = fetcher.fetch_all("Karnataka", None).await.unwrap();
        assert_eq!(set.rows.len(), 25);
        assert_eq!(set.pages_fetched, 3);
        assert!(!set.truncated);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exact_multiple_needs_one_empty_page() {
        let provider = Arc::new(FiniteProvider {
            total: 20,
            calls: AtomicUsize::new(0),
        });
        let fetcher = PageFetcher::new(provider.clone(), budget(10, 100, 10_000));

        let set = fetcher.fetch_all("Karnataka", None).await.unwrap();
        assert_eq!(set.rows.len(), 20);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_endless_provider_terminates_on_page_budget() {
        let fetcher = PageFetcher::new(Arc::new(EndlessProvider), budget(10, 4, 10_000));

        let set = fetcher.fetch_all("Karnataka", None).await.unwrap();
        assert_eq!(set.pages_fetched, 4);
        assert_eq!(set.rows.len(), 40);
        assert!(set.truncated);
    }

    #[tokio::test]
    async fn test_endless_provider_terminates_on_record_budget() {
        let fetcher = PageFetcher::new(Arc::new(EndlessProvider), budget(10, 1_000, 35));

        let set = fetcher.fetch_all("Karnataka", None).await.unwrap();
        assert_eq!(set.rows.len(), 35);
        assert!(set.truncated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_page_times_out() {
        let fetcher = PageFetcher::new(
            Arc::new(HangingProvider),
            PaginationBudget {
                page_timeout: Duration::from_secs(5),
                ..Default::default()
            },
        );

        let err = fetcher.fetch_all("Karnataka", None).await.unwrap_err();
        assert!(matches!(err, MarketDataError::Timeout { .. }));
    }
}
