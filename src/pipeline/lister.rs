use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::storage::Storage;
use crate::types::ObjectDescriptor;
use crate::types::error::MigrateError;

/// Pulls a container listing page by page.
///
/// Each request continues from the last name of the previous page. A page
/// shorter than `page_size` (an empty one included) ends the listing. A new
/// page is only requested once the previous one was consumed.
pub struct ObjectLister<'a> {
    source: &'a Storage,
    container: String,
    page_size: i32,
    marker: Option<String>,
    buffer: VecDeque<ObjectDescriptor>,
    exhausted: bool,
    page_count: u64,
}

impl<'a> ObjectLister<'a> {
    pub fn new(
        source: &'a Storage,
        container: &str,
        page_size: i32,
        start_marker: Option<String>,
    ) -> Self {
        Self {
            source,
            container: container.to_string(),
            page_size: page_size.max(1),
            marker: start_marker,
            buffer: VecDeque::new(),
            exhausted: false,
            page_count: 0,
        }
    }

    /// Requests the next page. Returns `None` once the listing is exhausted.
    ///
    /// Objects still buffered by `next()` are not returned here.
    pub async fn next_page(&mut self) -> Result<Option<Vec<ObjectDescriptor>>, MigrateError> {
        if self.exhausted {
            return Ok(None);
        }

        let page = self
            .source
            .list_objects(&self.container, self.page_size, self.marker.as_deref())
            .await
            .map_err(|e| MigrateError::Listing {
                container: self.container.clone(),
                marker: self.marker.clone(),
                source: e,
            })?;
        self.page_count += 1;

        debug!(
            container = self.container.as_str(),
            marker = self.marker.as_deref(),
            page = self.page_count,
            count = page.len(),
            "object page listed."
        );

        if page.len() < self.page_size as usize {
            self.exhausted = true;
            trace!(container = self.container.as_str(), "listing exhausted.");
        }

        if let Some(last) = page.last() {
            self.marker = Some(last.name.clone());
        }

        if page.is_empty() {
            return Ok(None);
        }

        Ok(Some(page))
    }

    pub async fn next(&mut self) -> Result<Option<ObjectDescriptor>, MigrateError> {
        loop {
            if let Some(object) = self.buffer.pop_front() {
                return Ok(Some(object));
            }

            match self.next_page().await? {
                Some(page) => self.buffer.extend(page),
                None => return Ok(None),
            }
        }
    }

    pub fn page_count(&self) -> u64 {
        self.page_count
    }
}
