//! Resolution policy.
//!
//! Determiners are pure decision functions. The two content predicates they
//! consult are injected as collaborators and only evaluated when a rule
//! actually needs them.

use crate::errors::ResolveError;
use crate::models::{Change, ChangeType, ConflictResolutionStrategy};

use super::{ContentEquivalence, ProvenanceChecker};

/// Whether local content at a change's path may be replaced by upstream's.
pub trait OverwriteCheck: Sync {
    fn is_safe(&self, change: &Change) -> Result<bool, ResolveError>;
}

/// Whether both sides of a change hold identical content.
pub trait EquivalenceCheck: Sync {
    fn is_equal(&self, change: &Change) -> Result<bool, ResolveError>;
}

impl<F> OverwriteCheck for F
where
    F: Fn(&Change) -> Result<bool, ResolveError> + Sync,
{
    fn is_safe(&self, change: &Change) -> Result<bool, ResolveError> {
        self(change)
    }
}

impl<F> EquivalenceCheck for F
where
    F: Fn(&Change) -> Result<bool, ResolveError> + Sync,
{
    fn is_equal(&self, change: &Change) -> Result<bool, ResolveError> {
        self(change)
    }
}

impl OverwriteCheck for ProvenanceChecker<'_> {
    fn is_safe(&self, change: &Change) -> Result<bool, ResolveError> {
        self.safe_to_overwrite(&change.path)
    }
}

impl EquivalenceCheck for ContentEquivalence<'_> {
    fn is_equal(&self, change: &Change) -> Result<bool, ResolveError> {
        self.contents_equal(change)
    }
}

/// Policy for paths left conflicted by a merge.
pub struct MergeConflictDeterminer;

impl MergeConflictDeterminer {
    /// First matching rule wins:
    ///
    /// 1. upstream deleted the path: take theirs
    /// 2. both sides created identical content: keep ours
    /// 3. local content is known upstream: take theirs
    /// 4. otherwise a human has to decide
    pub fn determine(
        change: &Change,
        overwrite: &dyn OverwriteCheck,
        equivalence: &dyn EquivalenceCheck,
    ) -> Result<ConflictResolutionStrategy, ResolveError> {
        if change.their_change_type == Some(ChangeType::Deleted) {
            return Ok(ConflictResolutionStrategy::AcceptTheirs);
        }

        if change.our_change_type == Some(ChangeType::Created)
            && change.their_change_type == Some(ChangeType::Created)
            && equivalence.is_equal(change)?
        {
            return Ok(ConflictResolutionStrategy::AcceptOurs);
        }

        if overwrite.is_safe(change)? {
            return Ok(ConflictResolutionStrategy::AcceptTheirs);
        }

        Ok(ConflictResolutionStrategy::ManualResolutionRequired)
    }
}

/// Policy for paths that differ from the release branch without a conflict.
pub struct DiffDeterminer;

impl DiffDeterminer {
    /// Take upstream's version when the local content is known upstream,
    /// otherwise keep the local content.
    pub fn determine(
        change: &Change,
        overwrite: &dyn OverwriteCheck,
    ) -> Result<ConflictResolutionStrategy, ResolveError> {
        if overwrite.is_safe(change)? {
            Ok(ConflictResolutionStrategy::AcceptTheirs)
        } else {
            Ok(ConflictResolutionStrategy::AcceptOurs)
        }
    }
}
