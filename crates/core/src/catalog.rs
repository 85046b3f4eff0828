//! In-memory problem catalog with an explicit, ordered list of groups.

use std::collections::HashMap;

use crate::model::{ProblemEntry, ProblemId};

/// A named group of problems, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemGroup {
    pub name: String,
    pub problems: Vec<ProblemId>,
}

/// Group entries by their parent directory name.
///
/// Groups are ordered by first appearance; problems keep discovery order within a group.
#[must_use]
pub fn group_by(entries: &[ProblemEntry]) -> Vec<ProblemGroup> {
    let mut groups: Vec<ProblemGroup> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for entry in entries {
        let index = *positions.entry(entry.group()).or_insert_with(|| {
            groups.push(ProblemGroup {
                name: entry.group().to_string(),
                problems: Vec::new(),
            });
            groups.len() - 1
        });
        groups[index].problems.push(entry.id().clone());
    }

    groups
}

/// Where a problem sits in the grouped catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogPosition {
    pub group_index: usize,
    pub problem_index: usize,
}

/// Every discovered problem, loaded once per process.
#[derive(Debug, Clone, Default)]
pub struct ProblemCatalog {
    entries: Vec<ProblemEntry>,
    by_id: HashMap<ProblemId, usize>,
    groups: Vec<ProblemGroup>,
}

impl ProblemCatalog {
    /// Build a catalog. Later entries with an already-seen id are dropped.
    #[must_use]
    pub fn new(entries: Vec<ProblemEntry>) -> Self {
        let mut kept = Vec::with_capacity(entries.len());
        let mut by_id = HashMap::with_capacity(entries.len());
        for entry in entries {
            if by_id.contains_key(entry.id()) {
                continue;
            }
            by_id.insert(entry.id().clone(), kept.len());
            kept.push(entry);
        }
        let groups = group_by(&kept);
        Self {
            entries: kept,
            by_id,
            groups,
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[ProblemEntry] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, id: &ProblemId) -> Option<&ProblemEntry> {
        self.by_id.get(id).map(|&index| &self.entries[index])
    }

    #[must_use]
    pub fn groups(&self) -> &[ProblemGroup] {
        &self.groups
    }

    /// Entries of a group, in discovery order.
    pub fn group_entries<'a>(
        &'a self,
        group: &'a ProblemGroup,
    ) -> impl Iterator<Item = &'a ProblemEntry> + 'a {
        group.problems.iter().filter_map(|id| self.get(id))
    }

    /// First problem of the first group.
    #[must_use]
    pub fn first(&self) -> Option<&ProblemEntry> {
        self.groups
            .first()
            .and_then(|group| group.problems.first())
            .and_then(|id| self.get(id))
    }

    #[must_use]
    pub fn position(&self, id: &ProblemId) -> Option<CatalogPosition> {
        self.groups
            .iter()
            .enumerate()
            .find_map(|(group_index, group)| {
                group
                    .problems
                    .iter()
                    .position(|candidate| candidate == id)
                    .map(|problem_index| CatalogPosition {
                        group_index,
                        problem_index,
                    })
            })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Metadata, MetadataValue, ProblemDocument, ProblemFiles};
    use std::path::PathBuf;

    fn entry(id: &str, category: &str) -> ProblemEntry {
        let (group, _) = id.split_once('/').unwrap();
        let metadata = Metadata::new()
            .with("name", MetadataValue::Text(id.to_string()))
            .with("category", MetadataValue::Text(category.to_string()));
        ProblemEntry::new(
            ProblemId::new(id).unwrap(),
            group,
            ProblemDocument {
                metadata,
                body: String::new(),
            },
            ProblemFiles {
                directory: PathBuf::from(id),
                hint_files: Vec::new(),
                solution_file: PathBuf::from(id).join("solution.md"),
                lab_dir: None,
            },
        )
    }

    #[test]
    fn group_by_keeps_discovery_order() {
        let entries = vec![
            entry("arrays/two-sum", "easy"),
            entry("arrays/three-sum", "medium"),
        ];
        let groups = group_by(&entries);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "arrays");
        let ids: Vec<_> = groups[0].problems.iter().map(ProblemId::as_str).collect();
        assert_eq!(ids, vec!["arrays/two-sum", "arrays/three-sum"]);
    }

    #[test]
    fn groups_ordered_by_first_appearance() {
        let entries = vec![
            entry("systems/cache", "design"),
            entry("incidents/disk-full", "ops"),
            entry("systems/queue", "design"),
        ];
        let catalog = ProblemCatalog::new(entries);
        let names: Vec<_> = catalog.groups().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["systems", "incidents"]);

        let queue = ProblemId::new("systems/queue").unwrap();
        assert_eq!(
            catalog.position(&queue),
            Some(CatalogPosition {
                group_index: 0,
                problem_index: 1
            })
        );
        assert_eq!(catalog.first().map(|e| e.id().as_str()), Some("systems/cache"));
    }

    #[test]
    fn duplicate_ids_keep_first_entry() {
        let catalog = ProblemCatalog::new(vec![
            entry("arrays/two-sum", "easy"),
            entry("arrays/two-sum", "hard"),
        ]);
        assert_eq!(catalog.len(), 1);
        let id = ProblemId::new("arrays/two-sum").unwrap();
        assert_eq!(catalog.get(&id).unwrap().metadata().text("category"), Some("easy"));
    }

    #[test]
    fn empty_catalog_has_no_first() {
        let catalog = ProblemCatalog::new(Vec::new());
        assert!(catalog.is_empty());
        assert!(catalog.first().is_none());
    }
}
