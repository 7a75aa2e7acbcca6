// src/ingest/dedup.rs
//
// Run-wide deduplication. The accumulator is threaded explicitly through each
// category's batch instead of living in shared state: processing order is a
// documented input (the first category to claim a story wins), not an
// accident of iteration.
//
// Collisions are detected on the category-independent dedup identity
// (`kind:datestamp:wireId`), not the full natural key: the wire tags one
// story under several desks, and each desk prefixes the key with its own
// name. The surviving copy keeps the natural key of the desk that claimed it
// first.

use std::collections::{HashMap, HashSet};

use crate::ingest::types::NormalizedArticle;

/// Per-category counters for the run report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounters {
    pub fetched: usize,
    pub filtered: usize,
    pub duplicates: usize,
}

/// Dedup state shared across all categories of one run.
#[derive(Debug, Default)]
pub struct DedupAccumulator {
    /// Identities already accepted by earlier categories of this run.
    claimed: HashSet<String>,
    pub total_fetched: usize,
    pub filtered_out: usize,
    pub within_category_dupes: usize,
    pub cross_category_dupes: usize,
}

impl DedupAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duplicates_total(&self) -> usize {
        self.within_category_dupes + self.cross_category_dupes
    }

    /// Fold one category's normalized batch into the run.
    ///
    /// Order of operations per the pipeline contract:
    /// 1. drop items whose priority/kind is not allowed (before any dedup, so
    ///    filtered items never count as duplicates);
    /// 2. within the category, collapse equal identities keeping the latest
    ///    `publish_date`; ties go to the last-encountered item;
    /// 3. drop identities already claimed by an earlier category (no date
    ///    comparison; the first-processed category keeps the story).
    ///
    /// Degenerate-key articles bypass both maps and are always kept.
    /// An empty allow-list means "allow everything".
    pub fn fold_category(
        &mut self,
        items: Vec<NormalizedArticle>,
        allowed_priorities: &[i64],
        allowed_kinds: &[i64],
    ) -> (Vec<NormalizedArticle>, CategoryCounters) {
        let mut counters = CategoryCounters {
            fetched: items.len(),
            ..Default::default()
        };
        self.total_fetched += items.len();

        let mut kept: Vec<NormalizedArticle> = Vec::with_capacity(items.len());
        // dedup identity -> position in `kept`, for within-category collisions
        let mut by_identity: HashMap<String, usize> = HashMap::new();

        for article in items {
            let allowed = (allowed_priorities.is_empty()
                || allowed_priorities.contains(&article.priority))
                && (allowed_kinds.is_empty() || allowed_kinds.contains(&article.kind.code()));
            if !allowed {
                counters.filtered += 1;
                self.filtered_out += 1;
                continue;
            }

            if article.degenerate {
                kept.push(article);
                continue;
            }

            let identity = article.dedup_identity().to_string();

            if self.claimed.contains(&identity) {
                counters.duplicates += 1;
                self.cross_category_dupes += 1;
                continue;
            }

            match by_identity.get(&identity) {
                Some(&idx) => {
                    counters.duplicates += 1;
                    self.within_category_dupes += 1;
                    // update-wins-by-recency; tie keeps the later arrival
                    if article.publish_date >= kept[idx].publish_date {
                        kept[idx] = article;
                    }
                }
                None => {
                    by_identity.insert(identity, kept.len());
                    kept.push(article);
                }
            }
        }

        // Only now do this category's survivors claim their identities; the
        // claimed set must reflect *earlier* categories during the pass above.
        self.claimed.extend(by_identity.into_keys());

        (kept, counters)
    }
}
