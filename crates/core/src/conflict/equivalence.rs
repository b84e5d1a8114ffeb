//! Byte-exact content comparison of both sides of a change.

use tracing::debug;

use crate::errors::ResolveError;
use crate::models::Change;
use crate::vcs::VcsBackend;

/// Compares the blobs behind `our_version` and `their_version`.
pub struct ContentEquivalence<'a> {
    backend: &'a dyn VcsBackend,
}

impl<'a> ContentEquivalence<'a> {
    pub fn new(backend: &'a dyn VcsBackend) -> Self {
        Self { backend }
    }

    /// Whether both sides of `change` hold identical bytes.
    ///
    /// A missing version or an unreadable blob is an error: no decision can
    /// be made without the content.
    pub fn contents_equal(&self, change: &Change) -> Result<bool, ResolveError> {
        let ours = change
            .our_version
            .as_deref()
            .ok_or_else(|| ResolveError::MissingVersion {
                path: change.path.clone(),
                side: "our",
            })?;
        let theirs = change
            .their_version
            .as_deref()
            .ok_or_else(|| ResolveError::MissingVersion {
                path: change.path.clone(),
                side: "their",
            })?;

        let equal = ours == theirs || self.backend.read_blob(ours)? == self.backend.read_blob(theirs)?;
        debug!(path = %change.path, equal, "compared contents");
        Ok(equal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::VcsError;
    use crate::models::ChangeType;
    use crate::vcs::InMemoryBackend;

    fn created_both(ours: Option<String>, theirs: Option<String>) -> Change {
        Change::new(
            "b.txt",
            Some(ChangeType::Created),
            Some(ChangeType::Created),
            theirs,
            ours,
            None,
        )
    }

    #[test]
    fn test_identical_contents() {
        let backend = InMemoryBackend::new();
        let id = backend.add_blob(b"same bytes");
        let change = created_both(Some(id.clone()), Some(id));
        assert!(ContentEquivalence::new(&backend).contents_equal(&change).unwrap());
    }

    #[test]
    fn test_different_contents() {
        let backend = InMemoryBackend::new();
        let ours = backend.add_blob(b"local");
        let theirs = backend.add_blob(b"upstream");
        let change = created_both(Some(ours), Some(theirs));
        assert!(!ContentEquivalence::new(&backend).contents_equal(&change).unwrap());
    }

    #[test]
    fn test_missing_version_is_fatal() {
        let backend = InMemoryBackend::new();
        let theirs = backend.add_blob(b"upstream");
        let change = created_both(None, Some(theirs));
        let err = ContentEquivalence::new(&backend)
            .contents_equal(&change)
            .unwrap_err();
        assert!(matches!(err, ResolveError::MissingVersion { side: "our", .. }));
    }

    #[test]
    fn test_unreadable_blob_is_fatal() {
        let backend = InMemoryBackend::new();
        let theirs = backend.add_blob(b"upstream");
        let change = created_both(Some("not-stored".into()), Some(theirs));
        let err = ContentEquivalence::new(&backend)
            .contents_equal(&change)
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::VcsError(VcsError::BlobNotFound(_))
        ));
    }
}
