use crate::model::ProblemId;

/// Maximum number of entries kept in the recent-visit history.
pub const HISTORY_LIMIT: usize = 10;

/// Most-recent-first list of visited problems, bounded and free of duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentHistory {
    ids: Vec<ProblemId>,
    limit: usize,
}

impl Default for RecentHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl RecentHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(HISTORY_LIMIT)
    }

    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            ids: Vec::new(),
            limit,
        }
    }

    /// Rebuild from persisted ids, dropping later duplicates and anything past the limit.
    #[must_use]
    pub fn from_persisted(ids: impl IntoIterator<Item = ProblemId>, limit: usize) -> Self {
        let mut normalized: Vec<ProblemId> = Vec::new();
        for id in ids {
            if normalized.len() == limit {
                break;
            }
            if !normalized.contains(&id) {
                normalized.push(id);
            }
        }
        Self {
            ids: normalized,
            limit,
        }
    }

    /// Move `id` to the front, removing any older occurrence, then truncate.
    pub fn record(&mut self, id: ProblemId) {
        self.ids.retain(|existing| *existing != id);
        self.ids.insert(0, id);
        self.ids.truncate(self.limit);
    }

    #[must_use]
    pub fn ids(&self) -> &[ProblemId] {
        &self.ids
    }

    #[must_use]
    pub fn into_ids(self) -> Vec<ProblemId> {
        self.ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
