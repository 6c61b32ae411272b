//! Abstract single-page listing contract and the pagination loop over it.
//!
//! Every provider implements [`ObjectLister`], which fetches one page.
//! [`list_all`] follows continuation tokens until the provider reports no
//! further pages and either returns every object or fails as a whole.

use std::future::Future;
use std::pin::Pin;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::debug;

/// One object as reported by the provider's listing API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedObject {
    /// Full object key.
    pub key: String,
    /// Size in bytes.
    pub size: i64,
    /// Last-modified timestamp.
    pub last_modified: DateTime<Utc>,
}

/// One page of a listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Objects on this page, in provider order.
    pub objects: Vec<ListedObject>,
    /// Cursor for the next page.  `None` marks the final page.
    pub next_continuation_token: Option<String>,
}

/// Async single-page listing contract.
pub trait ObjectLister: Send + Sync + 'static {
    /// Fetch the page that starts at `continuation_token` (the first page
    /// when `None`).
    fn list_page(
        &self,
        continuation_token: Option<String>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ListPage>> + Send + '_>>;
}

/// List every object in the bucket, following continuation tokens.
///
/// Any page failure aborts the whole operation; no partial result escapes.
pub async fn list_all(lister: &dyn ObjectLister) -> anyhow::Result<Vec<ListedObject>> {
    let mut objects = Vec::new();
    let mut token: Option<String> = None;
    let mut page_number = 1usize;

    loop {
        let page = lister
            .list_page(token.take())
            .await
            .with_context(|| format!("listing page {page_number}"))?;

        debug!(
            "Listed page {}: {} objects (more={})",
            page_number,
            page.objects.len(),
            page.next_continuation_token.is_some()
        );
        objects.extend(page.objects);

        match page.next_continuation_token {
            Some(next) => {
                token = Some(next);
                page_number += 1;
            }
            None => break,
        }
    }

    Ok(objects)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves `pages` in order, failing on page index `fail_at` if set.
    struct ScriptedLister {
        pages: Vec<Vec<&'static str>>,
        fail_at: Option<usize>,
        calls: AtomicUsize,
    }

    impl ScriptedLister {
        fn new(pages: Vec<Vec<&'static str>>) -> Self {
            Self {
                pages,
                fail_at: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ObjectLister for ScriptedLister {
        fn list_page(
            &self,
            continuation_token: Option<String>,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<ListPage>> + Send + '_>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let index: usize = match continuation_token {
                    Some(t) => t.parse()?,
                    None => 0,
                };
                if self.fail_at == Some(index) {
                    anyhow::bail!("provider unavailable");
                }
                let objects = self.pages[index]
                    .iter()
                    .map(|key| ListedObject {
                        key: key.to_string(),
                        size: 1,
                        last_modified: DateTime::<Utc>::default(),
                    })
                    .collect();
                let next = (index + 1 < self.pages.len()).then(|| (index + 1).to_string());
                Ok(ListPage {
                    objects,
                    next_continuation_token: next,
                })
            })
        }
    }

    fn keys(objects: &[ListedObject]) -> Vec<&str> {
        objects.iter().map(|o| o.key.as_str()).collect()
    }

    #[tokio::test]
    async fn test_single_page() {
        let lister = ScriptedLister::new(vec![vec!["a", "b"]]);
        let objects = list_all(&lister).await.unwrap();
        assert_eq!(keys(&objects), vec!["a", "b"]);
        assert_eq!(lister.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_multiple_pages_are_concatenated_in_order() {
        let lister = ScriptedLister::new(vec![vec!["a", "b"], vec!["c"], vec!["d", "e"]]);
        let objects = list_all(&lister).await.unwrap();
        assert_eq!(keys(&objects), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(lister.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_bucket() {
        let lister = ScriptedLister::new(vec![vec![]]);
        assert!(list_all(&lister).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_on_later_page_fails_whole_listing() {
        let mut lister = ScriptedLister::new(vec![vec!["a"], vec!["b"], vec!["c"]]);
        lister.fail_at = Some(2);
        let err = list_all(&lister).await.unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("listing page 3"), "{message}");
        assert!(message.contains("provider unavailable"), "{message}");
        // No retries: the failing page is requested exactly once.
        assert_eq!(lister.calls.load(Ordering::SeqCst), 3);
    }
}
