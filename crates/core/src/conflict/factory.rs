//! Building [`Change`] records from raw backend output.
//!
//! Both construction paths are pure: they only reshape what the backend
//! already reported.

use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use crate::models::{Change, ConflictState, DiffKind, IndexEntry, RawDiffEntry, Stage};

/// Stateless constructors for [`Change`] records.
pub struct ChangeFactory;

impl ChangeFactory {
    /// One change per conflicting path, with versions taken from the
    /// `Ours` and `Theirs` stages of the index.
    pub fn from_conflicts(
        conflicts: &BTreeMap<String, ConflictState>,
        entries: &[IndexEntry],
    ) -> Vec<Change> {
        let mut by_path: HashMap<&str, Vec<&IndexEntry>> = HashMap::new();
        for entry in entries {
            by_path.entry(entry.path.as_str()).or_default().push(entry);
        }

        conflicts
            .iter()
            .map(|(path, state)| {
                let rows = by_path.get(path.as_str()).map(Vec::as_slice).unwrap_or(&[]);
                Self::from_conflict(path, *state, rows.iter().copied())
            })
            .collect()
    }

    /// Build the change for a single conflicting path.
    pub fn from_conflict<'a>(
        path: &str,
        state: ConflictState,
        entries: impl IntoIterator<Item = &'a IndexEntry>,
    ) -> Change {
        let mut ours = None;
        let mut theirs = None;
        for entry in entries.into_iter().filter(|e| e.path == path) {
            match entry.stage {
                Stage::Ours => ours = Some(entry.content_id.clone()),
                Stage::Theirs => theirs = Some(entry.content_id.clone()),
                Stage::Index | Stage::Base => {}
            }
        }

        Change::new(
            path,
            state.their_change_type(),
            state.our_change_type(),
            theirs,
            ours,
            None,
        )
    }

    /// Build the change for one entry of a local-to-reference diff.
    pub fn from_diff_entry(entry: &RawDiffEntry) -> Change {
        Change::new(
            Self::diff_path(entry),
            Some(entry.kind.change_type()),
            None,
            entry.new_id.clone(),
            entry.old_id.clone(),
            entry.new_mode.and_then(|mode| mode.permissions()),
        )
    }

    /// Build changes for a whole diff.
    ///
    /// Paths reported by more than one entry are ambiguous and are left out
    /// entirely. Every dropped entry is logged so the path can be handled by
    /// hand.
    pub fn from_diff(entries: &[RawDiffEntry]) -> Vec<Change> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for entry in entries {
            *counts.entry(Self::diff_path(entry)).or_default() += 1;
        }

        entries
            .iter()
            .filter(|entry| {
                let path = Self::diff_path(entry);
                let count = counts.get(path).copied().unwrap_or(0);
                if count > 1 {
                    warn!(
                        path,
                        kind = entry.kind.name(),
                        entries = count,
                        "ambiguous diff entry excluded from automatic resolution"
                    );
                    return false;
                }
                true
            })
            .map(Self::from_diff_entry)
            .collect()
    }

    fn diff_path(entry: &RawDiffEntry) -> &str {
        match entry.kind {
            DiffKind::Add => entry.new_path.as_str(),
            _ => entry.old_path.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChangeType, FileMode, FilePermissions};

    fn diff(kind: DiffKind, path: &str, old: Option<&str>, new: Option<&str>) -> RawDiffEntry {
        RawDiffEntry {
            kind,
            old_path: path.to_string(),
            new_path: path.to_string(),
            old_id: old.map(str::to_string),
            new_id: new.map(str::to_string),
            new_mode: Some(FileMode::Regular),
        }
    }

    #[test]
    fn test_from_conflicts_reads_stages() {
        let mut conflicts = BTreeMap::new();
        conflicts.insert("a.txt".to_string(), ConflictState::BothModified);
        conflicts.insert("b.txt".to_string(), ConflictState::AddedByThem);
        let entries = vec![
            IndexEntry::new("a.txt", Stage::Base, "base"),
            IndexEntry::new("a.txt", Stage::Ours, "ours"),
            IndexEntry::new("a.txt", Stage::Theirs, "theirs"),
            IndexEntry::new("b.txt", Stage::Theirs, "b-theirs"),
            IndexEntry::new("c.txt", Stage::Index, "clean"),
        ];

        let changes = ChangeFactory::from_conflicts(&conflicts, &entries);
        assert_eq!(changes.len(), 2);

        let a = &changes[0];
        assert_eq!(a.path, "a.txt");
        assert_eq!(a.our_change_type, Some(ChangeType::Updated));
        assert_eq!(a.their_change_type, Some(ChangeType::Updated));
        assert_eq!(a.our_version.as_deref(), Some("ours"));
        assert_eq!(a.their_version.as_deref(), Some("theirs"));
        assert_eq!(a.their_permissions, None);

        let b = &changes[1];
        assert_eq!(b.our_change_type, None);
        assert_eq!(b.their_change_type, Some(ChangeType::Created));
        assert_eq!(b.our_version, None);
        assert!(!b.is_conflict());
    }

    #[test]
    fn test_deleted_by_us_keeps_incoming_version() {
        let entries = vec![
            IndexEntry::new("d.txt", Stage::Base, "base"),
            IndexEntry::new("d.txt", Stage::Theirs, "theirs"),
        ];
        let change = ChangeFactory::from_conflict("d.txt", ConflictState::DeletedByUs, &entries);
        assert_eq!(change.our_change_type, Some(ChangeType::Deleted));
        assert_eq!(change.their_change_type, Some(ChangeType::Updated));
        assert_eq!(change.their_version.as_deref(), Some("theirs"));
    }

    #[test]
    fn test_deleted_by_them_has_no_incoming_version() {
        let entries = vec![
            IndexEntry::new("e.txt", Stage::Base, "base"),
            IndexEntry::new("e.txt", Stage::Ours, "ours"),
        ];
        let change = ChangeFactory::from_conflict("e.txt", ConflictState::DeletedByThem, &entries);
        assert_eq!(change.their_change_type, Some(ChangeType::Deleted));
        assert_eq!(change.their_version, None);
    }

    #[test]
    fn test_from_diff_entry_maps_kinds_and_permissions() {
        let mut entry = diff(DiffKind::Modify, "run.sh", Some("old"), Some("new"));
        entry.new_mode = Some(FileMode::Executable);
        let change = ChangeFactory::from_diff_entry(&entry);
        assert_eq!(change.their_change_type, Some(ChangeType::Updated));
        assert_eq!(change.our_change_type, None);
        assert_eq!(change.our_version.as_deref(), Some("old"));
        assert_eq!(change.their_version.as_deref(), Some("new"));
        assert_eq!(change.their_permissions, Some(FilePermissions::EXECUTABLE));

        let mut copy = diff(DiffKind::Copy, "copy.txt", None, Some("new"));
        copy.new_mode = Some(FileMode::Symlink);
        let change = ChangeFactory::from_diff_entry(&copy);
        assert_eq!(change.their_change_type, Some(ChangeType::Created));
        assert_eq!(change.their_permissions, None);

        let rename = diff(DiffKind::Rename, "moved.txt", Some("old"), Some("new"));
        assert_eq!(
            ChangeFactory::from_diff_entry(&rename).their_change_type,
            Some(ChangeType::Renamed)
        );
    }

    #[test]
    fn test_add_uses_new_path() {
        let entry = RawDiffEntry {
            kind: DiffKind::Add,
            old_path: "/dev/null".to_string(),
            new_path: "added.txt".to_string(),
            old_id: None,
            new_id: Some("new".to_string()),
            new_mode: Some(FileMode::Regular),
        };
        let change = ChangeFactory::from_diff_entry(&entry);
        assert_eq!(change.path, "added.txt");
        assert_eq!(change.their_permissions, Some(FilePermissions::REGULAR));
    }

    #[test]
    fn test_from_diff_drops_all_entries_for_duplicate_paths() {
        let entries = vec![
            diff(DiffKind::Modify, "dup.txt", Some("1"), Some("2")),
            diff(DiffKind::Delete, "dup.txt", Some("1"), None),
            diff(DiffKind::Modify, "single.txt", Some("3"), Some("4")),
        ];
        let changes = ChangeFactory::from_diff(&entries);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "single.txt");
    }
}
