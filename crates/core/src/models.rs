//! Domain model types used throughout upmerge.
//!
//! These types bridge the VCS backends, the change factory, the resolution
//! determiners, and the resolver that applies their decisions.

use serde::{Deserialize, Serialize};

/// Hex-encoded, content-addressed blob identifier.
pub type ContentId = String;

/// Hex-encoded commit identifier.
pub type CommitId = String;

// ---------------------------------------------------------------------------
// Change types
// ---------------------------------------------------------------------------

/// Kind of change recorded for one side of a file-level divergence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Created,
    Updated,
    Deleted,
    Renamed,
    /// File type changed (e.g. regular file to symlink).
    Type,
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Deleted => write!(f, "deleted"),
            Self::Renamed => write!(f, "renamed"),
            Self::Type => write!(f, "type changed"),
        }
    }
}

/// Outcome of a resolution determiner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolutionStrategy {
    AcceptOurs,
    AcceptTheirs,
    ManualResolutionRequired,
}

impl std::fmt::Display for ConflictResolutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AcceptOurs => write!(f, "accept_ours"),
            Self::AcceptTheirs => write!(f, "accept_theirs"),
            Self::ManualResolutionRequired => write!(f, "manual_resolution_required"),
        }
    }
}

// ---------------------------------------------------------------------------
// File permissions / modes
// ---------------------------------------------------------------------------

/// Readable / writable / executable triple restored on incoming files.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct FilePermissions {
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
}

impl FilePermissions {
    /// Permissions of a regular (`100644`) file.
    pub const REGULAR: Self = Self {
        readable: true,
        writable: true,
        executable: false,
    };

    /// Permissions of an executable (`100755`) file.
    pub const EXECUTABLE: Self = Self {
        readable: true,
        writable: true,
        executable: true,
    };

    /// Unix mode bits for these permissions, with the owner always able to
    /// write when `writable` is set.
    pub fn mode_bits(&self) -> u32 {
        let mut mode = 0;
        if self.readable {
            mode |= 0o444;
        }
        if self.writable {
            mode |= 0o200;
        }
        if self.executable {
            mode |= 0o111;
        }
        mode
    }
}

/// Tree entry mode reported by a diff.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileMode {
    Regular,
    Executable,
    Symlink,
    Gitlink,
    Tree,
}

impl FileMode {
    /// Permissions to restore for a file of this mode, if any.
    pub fn permissions(&self) -> Option<FilePermissions> {
        match self {
            Self::Regular => Some(FilePermissions::REGULAR),
            Self::Executable => Some(FilePermissions::EXECUTABLE),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Merge index
// ---------------------------------------------------------------------------

/// Three-way merge staging slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Index = 0,
    Base = 1,
    Ours = 2,
    Theirs = 3,
}

impl Stage {
    /// Map a git stage number onto a [`Stage`].
    pub fn from_number(number: u16) -> Option<Self> {
        match number {
            0 => Some(Self::Index),
            1 => Some(Self::Base),
            2 => Some(Self::Ours),
            3 => Some(Self::Theirs),
            _ => None,
        }
    }

    pub fn number(&self) -> u16 {
        *self as u16
    }
}

/// One row of the merge index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct IndexEntry {
    pub path: String,
    pub stage: Stage,
    pub content_id: ContentId,
}

impl IndexEntry {
    pub fn new(path: impl Into<String>, stage: Stage, content_id: impl Into<ContentId>) -> Self {
        Self {
            path: path.into(),
            stage,
            content_id: content_id.into(),
        }
    }
}

impl std::fmt::Display for IndexEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.content_id, self.stage.number(), self.path)
    }
}

/// Compound conflict state of a path in the merge index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConflictState {
    BothDeleted,
    AddedByUs,
    DeletedByThem,
    AddedByThem,
    DeletedByUs,
    BothAdded,
    BothModified,
}

impl ConflictState {
    /// Classify a conflict from which stages are present for its path.
    ///
    /// Returns `None` when no conflict stage is present at all.
    pub fn from_stages(base: bool, ours: bool, theirs: bool) -> Option<Self> {
        match (base, ours, theirs) {
            (true, true, true) => Some(Self::BothModified),
            (false, true, true) => Some(Self::BothAdded),
            (true, false, true) => Some(Self::DeletedByUs),
            (true, true, false) => Some(Self::DeletedByThem),
            (false, true, false) => Some(Self::AddedByUs),
            (false, false, true) => Some(Self::AddedByThem),
            (true, false, false) => Some(Self::BothDeleted),
            (false, false, false) => None,
        }
    }

    /// Change recorded on the local side.
    pub fn our_change_type(&self) -> Option<ChangeType> {
        match self {
            Self::BothDeleted | Self::DeletedByUs => Some(ChangeType::Deleted),
            Self::AddedByUs | Self::BothAdded => Some(ChangeType::Created),
            Self::BothModified | Self::DeletedByThem => Some(ChangeType::Updated),
            Self::AddedByThem => None,
        }
    }

    /// Change recorded on the incoming side.
    pub fn their_change_type(&self) -> Option<ChangeType> {
        match self {
            Self::BothDeleted | Self::DeletedByThem => Some(ChangeType::Deleted),
            Self::AddedByThem | Self::BothAdded => Some(ChangeType::Created),
            Self::DeletedByUs | Self::BothModified => Some(ChangeType::Updated),
            Self::AddedByUs => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Raw diff
// ---------------------------------------------------------------------------

/// Change kind reported by a tree diff.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    Add,
    Copy,
    Modify,
    Delete,
    Rename,
}

impl DiffKind {
    pub fn change_type(&self) -> ChangeType {
        match self {
            Self::Add | Self::Copy => ChangeType::Created,
            Self::Modify => ChangeType::Updated,
            Self::Delete => ChangeType::Deleted,
            Self::Rename => ChangeType::Renamed,
        }
    }

    /// Upper-case name, as used in commit content hashes.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Copy => "COPY",
            Self::Modify => "MODIFY",
            Self::Delete => "DELETE",
            Self::Rename => "RENAME",
        }
    }
}

/// One entry of a linear diff between the local tree and a reference tree.
///
/// The old side is local, the new side is the reference. Absent ids mean the
/// file does not exist on that side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawDiffEntry {
    pub kind: DiffKind,
    pub old_path: String,
    pub new_path: String,
    pub old_id: Option<ContentId>,
    pub new_id: Option<ContentId>,
    pub new_mode: Option<FileMode>,
}

// ---------------------------------------------------------------------------
// Change
// ---------------------------------------------------------------------------

/// One file-level divergence between the local ("ours") and incoming
/// ("theirs") states of a path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Change {
    pub path: String,
    pub our_change_type: Option<ChangeType>,
    pub their_change_type: Option<ChangeType>,
    pub our_version: Option<ContentId>,
    pub their_version: Option<ContentId>,
    pub their_permissions: Option<FilePermissions>,
}

impl Change {
    /// Build a change record.
    ///
    /// A rename is sometimes reported as a deletion at the old path plus a
    /// creation at the new path; when the file was also edited, the old-path
    /// record arrives as `Updated` even though no incoming content exists.
    /// Such records are normalized to `Deleted`.
    pub fn new(
        path: impl Into<String>,
        their_change_type: Option<ChangeType>,
        our_change_type: Option<ChangeType>,
        their_version: Option<ContentId>,
        our_version: Option<ContentId>,
        their_permissions: Option<FilePermissions>,
    ) -> Self {
        // TODO: confirm this split-rename heuristic against libgit2 rename
        // detection output before applying it to other change types.
        let their_change_type = match (their_change_type, &their_version) {
            (Some(ChangeType::Updated), None) => Some(ChangeType::Deleted),
            (other, _) => other,
        };

        Self {
            path: path.into(),
            our_change_type,
            their_change_type,
            our_version,
            their_version,
            their_permissions,
        }
    }

    /// Whether both sides recorded a change.
    pub fn is_conflict(&self) -> bool {
        self.our_change_type.is_some() && self.their_change_type.is_some()
    }
}

impl std::fmt::Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ours) = self.our_change_type {
            write!(f, "{} locally and ", ours)?;
        }
        match self.their_change_type {
            Some(theirs) => write!(f, "{} remotely: {}", theirs, self.path),
            None => write!(f, "unchanged remotely: {}", self.path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_split_normalized_to_deleted() {
        let change = Change::new(
            "src/Old.java",
            Some(ChangeType::Updated),
            Some(ChangeType::Updated),
            None,
            Some("aaa".into()),
            None,
        );
        assert_eq!(change.their_change_type, Some(ChangeType::Deleted));
    }

    #[test]
    fn test_updated_with_version_is_kept() {
        let change = Change::new(
            "a.txt",
            Some(ChangeType::Updated),
            None,
            Some("bbb".into()),
            None,
            None,
        );
        assert_eq!(change.their_change_type, Some(ChangeType::Updated));
    }

    #[test]
    fn test_created_without_version_is_not_rewritten() {
        let change = Change::new("a.txt", Some(ChangeType::Created), None, None, None, None);
        assert_eq!(change.their_change_type, Some(ChangeType::Created));
    }

    #[test]
    fn test_is_conflict_requires_both_sides() {
        let both = Change::new(
            "a",
            Some(ChangeType::Updated),
            Some(ChangeType::Updated),
            Some("1".into()),
            Some("2".into()),
            None,
        );
        assert!(both.is_conflict());

        let theirs_only = Change::new("a", Some(ChangeType::Updated), None, Some("1".into()), None, None);
        assert!(!theirs_only.is_conflict());

        let ours_only = Change::new("a", None, Some(ChangeType::Created), None, Some("2".into()), None);
        assert!(!ours_only.is_conflict());
    }

    #[test]
    fn test_conflict_state_table() {
        use ChangeType::*;
        let cases = [
            (ConflictState::BothModified, Some(Updated), Some(Updated)),
            (ConflictState::BothAdded, Some(Created), Some(Created)),
            (ConflictState::BothDeleted, Some(Deleted), Some(Deleted)),
            (ConflictState::AddedByUs, Some(Created), None),
            (ConflictState::AddedByThem, None, Some(Created)),
            (ConflictState::DeletedByUs, Some(Deleted), Some(Updated)),
            (ConflictState::DeletedByThem, Some(Updated), Some(Deleted)),
        ];
        for (state, ours, theirs) in cases {
            assert_eq!(state.our_change_type(), ours, "ours for {:?}", state);
            assert_eq!(state.their_change_type(), theirs, "theirs for {:?}", state);
        }
    }

    #[test]
    fn test_conflict_state_from_stages() {
        assert_eq!(
            ConflictState::from_stages(true, true, true),
            Some(ConflictState::BothModified)
        );
        assert_eq!(
            ConflictState::from_stages(true, false, true),
            Some(ConflictState::DeletedByUs)
        );
        assert_eq!(ConflictState::from_stages(false, false, false), None);
    }

    #[test]
    fn test_stage_numbers() {
        assert_eq!(Stage::from_number(2), Some(Stage::Ours));
        assert_eq!(Stage::from_number(3), Some(Stage::Theirs));
        assert_eq!(Stage::from_number(4), None);
        assert_eq!(Stage::Base.number(), 1);
    }

    #[test]
    fn test_permissions_from_mode() {
        assert_eq!(FileMode::Regular.permissions(), Some(FilePermissions::REGULAR));
        assert_eq!(FileMode::Executable.permissions(), Some(FilePermissions::EXECUTABLE));
        assert_eq!(FileMode::Symlink.permissions(), None);
        assert_eq!(FilePermissions::REGULAR.mode_bits(), 0o644);
        assert_eq!(FilePermissions::EXECUTABLE.mode_bits(), 0o755);
    }

    #[test]
    fn test_change_display() {
        let change = Change::new(
            "c.txt",
            Some(ChangeType::Updated),
            Some(ChangeType::Created),
            Some("1".into()),
            Some("2".into()),
            None,
        );
        assert_eq!(change.to_string(), "created locally and updated remotely: c.txt");
    }
}
