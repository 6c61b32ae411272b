//! In-memory listing backend.
//!
//! Holds a fixed object list and serves it in pages of `page_size`, using
//! the decimal offset of the next page as the continuation token.  The
//! object list can be swapped at runtime to simulate bucket changes.

use std::future::Future;
use std::pin::Pin;

use super::lister::{ListPage, ListedObject, ObjectLister};

/// Paged lister over an in-process object list.
pub struct MemoryLister {
    objects: std::sync::RwLock<Vec<ListedObject>>,
    page_size: usize,
}

impl MemoryLister {
    /// Create a lister that returns `objects` in pages of `page_size`.
    ///
    /// A `page_size` of zero is treated as one.
    pub fn new(objects: Vec<ListedObject>, page_size: usize) -> Self {
        Self {
            objects: std::sync::RwLock::new(objects),
            page_size: page_size.max(1),
        }
    }

    /// Replace the object list served by subsequent listings.
    pub fn set_objects(&self, objects: Vec<ListedObject>) {
        match self.objects.write() {
            Ok(mut guard) => *guard = objects,
            Err(poisoned) => *poisoned.into_inner() = objects,
        }
    }
}

impl ObjectLister for MemoryLister {
    fn list_page(
        &self,
        continuation_token: Option<String>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ListPage>> + Send + '_>> {
        Box::pin(async move {
            let start = match continuation_token {
                Some(token) => token
                    .parse::<usize>()
                    .map_err(|_| anyhow::anyhow!("invalid continuation token: {token}"))?,
                None => 0,
            };

            let objects = self
                .objects
                .read()
                .map_err(|_| anyhow::anyhow!("memory lister lock poisoned"))?;
            if start > objects.len() {
                anyhow::bail!("continuation token {start} is past the end of the listing");
            }

            let end = (start + self.page_size).min(objects.len());
            Ok(ListPage {
                objects: objects[start..end].to_vec(),
                next_continuation_token: (end < objects.len()).then(|| end.to_string()),
            })
        })
    }
}

// -- Tests -------------------------------------------------------------------
