//! Parent listing enumerator

use crate::config::CatalogConfig;
use crate::decode::{PageDecoder, PageLayout};
use crate::error::{Error, Result};
use crate::http::Fetcher;
use crate::pagination::{OffsetPaginator, PageWalker};
use crate::types::{ParentEntity, SortOrder};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Result of enumerating the parent listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enumeration {
    /// Parents in first-seen order, unique by alias
    pub parents: Vec<ParentEntity>,
    /// Total the upstream declared on the first page
    pub declared_total: u64,
    /// Declared parents no sort pass could reach
    pub unreachable: u64,
}

impl Enumeration {
    /// Did every declared parent turn up?
    pub fn is_complete(&self) -> bool {
        self.unreachable == 0
    }
}

/// Enumerates parents across one or more sort passes
///
/// Each pass can only see `max_offset + page_size` entries, so a second pass
/// in reverse order reaches the tail of listings up to twice that size.
pub struct CollectionEnumerator<'a> {
    fetcher: &'a dyn Fetcher,
    config: &'a CatalogConfig,
    decoder: PageDecoder,
}

impl<'a> CollectionEnumerator<'a> {
    /// Create an enumerator over the configured parent listing
    pub fn new(fetcher: &'a dyn Fetcher, config: &'a CatalogConfig) -> Self {
        Self {
            fetcher,
            config,
            decoder: PageDecoder::new(PageLayout::offset_results()),
        }
    }

    fn paginator(&self, order: &SortOrder) -> OffsetPaginator {
        let paginator = OffsetPaginator::new(&self.config.parents_path, self.config.page_size)
            .with_max_offset(self.config.max_offset);
        match order.param() {
            Some(sort) => paginator.with_param("sort", sort),
            None => paginator,
        }
    }

    /// Collect every reachable parent
    ///
    /// Fails only when the very first page cannot be fetched; later failures
    /// end the current pass and show up as a shortfall.
    pub async fn enumerate(&self) -> Result<Enumeration> {
        let mut parents = Vec::new();
        let mut seen = HashSet::new();
        let mut declared: Option<u64> = None;

        let all_collected = |count: usize, declared: Option<u64>| {
            declared.is_some_and(|total| count as u64 >= total)
        };

        for (pass, order) in self.config.sort_orders.iter().enumerate() {
            if all_collected(parents.len(), declared) {
                debug!("All declared parents collected, skipping {} pass", order.label());
                break;
            }

            let paginator = self.paginator(order);
            let mut walker = PageWalker::new(self.fetcher, &paginator, &self.decoder)
                .with_delay(self.config.parent_page_delay());
            let before = parents.len();

            loop {
                let page = match walker.next_page().await {
                    Ok(Some(page)) => page,
                    Ok(None) => break,
                    Err(e) if pass == 0 && walker.state().pages == 0 => {
                        return Err(Error::enumeration(format!(
                            "failed to fetch first page of {}: {e}",
                            self.config.parents_path
                        )));
                    }
                    Err(e) => {
                        warn!("Ending {} pass early: {}", order.label(), e);
                        break;
                    }
                };

                if declared.is_none() {
                    declared = page.reported_total;
                }

                for record in page.items {
                    let item = Value::Object(record.fields);
                    let Some(parent) = ParentEntity::from_listing(
                        &item,
                        &self.config.alias_field,
                        &self.config.name_field,
                    ) else {
                        continue;
                    };
                    if seen.insert(parent.alias.clone()) {
                        parents.push(parent);
                    }
                }

                if all_collected(parents.len(), declared) {
                    break;
                }
            }

            info!(
                "Sort pass {}: {} new parents ({} total)",
                order.label(),
                parents.len() - before,
                parents.len()
            );
        }

        let declared_total = declared.unwrap_or(parents.len() as u64);
        let unreachable = declared_total.saturating_sub(parents.len() as u64);
        if unreachable > 0 {
            warn!(
                "{} of {} declared parents are unreachable through the listing",
                unreachable, declared_total
            );
        }

        Ok(Enumeration {
            parents,
            declared_total,
            unreachable,
        })
    }
}

impl std::fmt::Debug for CollectionEnumerator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionEnumerator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
