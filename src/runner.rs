//! Batch extraction over many result pages.

use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::BatchConfig;
use crate::extract::Extractor;
use crate::fetch::Fetcher;
use crate::types::ExtractionOutput;

/// Why a batch stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Completed,
    PageLimit,
    TimeLimit,
}

/// Page-count and wall-clock limits for one batch
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchBudget {
    pub max_pages: Option<usize>,
    pub max_duration: Option<Duration>,
}

impl From<&BatchConfig> for BatchBudget {
    fn from(config: &BatchConfig) -> Self {
        Self {
            max_pages: config.max_pages,
            max_duration: config.max_seconds.map(Duration::from_secs),
        }
    }
}

/// Everything a batch produced, including partial work when a budget ran out
#[derive(Debug)]
pub struct BatchReport {
    pub outputs: Vec<ExtractionOutput>,
    /// `(url, error)` for pages that could not be fetched
    pub failures: Vec<(String, String)>,
    /// Repeated URLs that were not fetched again
    pub skipped: Vec<String>,
    pub stop: StopReason,
}

impl BatchReport {
    pub fn result_count(&self) -> usize {
        self.outputs.iter().map(|o| o.results.len()).sum()
    }
}

pub struct BatchRunner<'a, F> {
    fetcher: &'a F,
    extractor: &'a Extractor,
    budget: BatchBudget,
}

impl<'a, F: Fetcher> BatchRunner<'a, F> {
    pub fn new(fetcher: &'a F, extractor: &'a Extractor, budget: BatchBudget) -> Self {
        Self {
            fetcher,
            extractor,
            budget,
        }
    }

    /// Fetch and extract each URL in order, one fresh session per page
    pub async fn run(&self, urls: &[String]) -> BatchReport {
        let started = Instant::now();
        let mut visited = HashSet::new();
        let mut report = BatchReport {
            outputs: Vec::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
            stop: StopReason::Completed,
        };
        let mut pages = 0;

        for url in urls {
            if !visited.insert(url.as_str()) {
                report.skipped.push(url.clone());
                continue;
            }
            if self.budget.max_pages.is_some_and(|max| pages >= max) {
                report.stop = StopReason::PageLimit;
                break;
            }
            if self
                .budget
                .max_duration
                .is_some_and(|max| started.elapsed() >= max)
            {
                report.stop = StopReason::TimeLimit;
                break;
            }

            pages += 1;
            match self.fetcher.fetch(url).await {
                Ok(html) => {
                    let output = self.extractor.extract(&html, url);
                    report.outputs.push(output);
                }
                Err(e) => {
                    warn!("Skipping {}: {}", url, e);
                    report.failures.push((url.clone(), e.to_string()));
                }
            }
        }

        if report.stop != StopReason::Completed {
            info!(
                "Batch stopped early ({:?}) after {} pages; keeping partial results",
                report.stop, pages
            );
        }
        info!(
            "Batch finished: {} pages extracted, {} results, {} failures",
            report.outputs.len(),
            report.result_count(),
            report.failures.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::extract::ExtractionConfig;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PAGE: &str = r#"<h2>Sunfish</h2><table>
<tr><th>Pos</th><th>Skipper</th><th>Total</th></tr>
<tr><td>1</td><td>Ann Lee</td><td>3</td></tr>
</table>"#;

    struct MockFetcher {
        pages: HashMap<String, String>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl MockFetcher {
        fn new(urls: &[&str], delay: Duration) -> Self {
            Self {
                pages: urls.iter().map(|u| (u.to_string(), PAGE.to_string())).collect(),
                delay,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Fetcher for MockFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.pages.get(url).cloned().ok_or(FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|u| u.to_string()).collect()
    }

    fn extractor() -> Extractor {
        Extractor::new(&ExtractionConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_all_pages_and_duplicates() {
        let fetcher = MockFetcher::new(&["a", "b"], Duration::ZERO);
        let extractor = extractor();
        let runner = BatchRunner::new(&fetcher, &extractor, BatchBudget::default());

        let report = runner.run(&urls(&["a", "b", "a", "missing"])).await;

        assert_eq!(report.stop, StopReason::Completed);
        assert_eq!(report.outputs.len(), 2);
        assert_eq!(report.result_count(), 2);
        assert_eq!(report.skipped, vec!["a".to_string()]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
        // Sessions are per page: the same sailor appears once in each
        assert!(report.outputs.iter().all(|o| o.sailors.len() == 1));
    }

    #[tokio::test]
    async fn test_page_limit_keeps_partial_results() {
        let fetcher = MockFetcher::new(&["a", "b", "c"], Duration::ZERO);
        let extractor = extractor();
        let budget = BatchBudget {
            max_pages: Some(2),
            max_duration: None,
        };
        let report = BatchRunner::new(&fetcher, &extractor, budget)
            .run(&urls(&["a", "b", "c"]))
            .await;

        assert_eq!(report.stop, StopReason::PageLimit);
        assert_eq!(report.outputs.len(), 2);
        assert_eq!(report.outputs[1].url, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_limit_keeps_partial_results() {
        let fetcher = MockFetcher::new(&["a", "b", "c"], Duration::from_secs(10));
        let extractor = extractor();
        let budget = BatchBudget {
            max_pages: None,
            max_duration: Some(Duration::from_secs(15)),
        };
        let report = BatchRunner::new(&fetcher, &extractor, budget)
            .run(&urls(&["a", "b", "c"]))
            .await;

        assert_eq!(report.stop, StopReason::TimeLimit);
        assert_eq!(report.outputs.len(), 2);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_budget_from_config() {
        let budget = BatchBudget::from(&BatchConfig {
            max_pages: Some(5),
            max_seconds: Some(60),
        });
        assert_eq!(budget.max_pages, Some(5));
        assert_eq!(budget.max_duration, Some(Duration::from_secs(60)));
    }
}
