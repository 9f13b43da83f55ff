// ============================================================
// Layer 3 — ClassSet Domain Type
// ============================================================
// The ordered list of class names a split was built from.
//
// Class names come from subdirectory names and are sorted in
// byte order, so index `i` always refers to the same defect type
// no matter which order the filesystem lists directories in.
// The training split defines the set; every other split must
// match it exactly (same names, same count).

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSet {
    names: Vec<String>,
}

impl ClassSet {
    /// Build a class set from unordered names. Duplicates are dropped.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort();
        names.dedup();
        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Class name for a label index
    pub fn name(&self, label: usize) -> Option<&str> {
        self.names.get(label).map(String::as_str)
    }

    /// Label index for a class name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.binary_search_by(|n| n.as_str().cmp(name)).ok()
    }

    /// Fail unless `other` holds exactly the same classes.
    ///
    /// `what` names the split being checked, e.g. "validation".
    pub fn ensure_matches(&self, other: &ClassSet, what: &str) -> Result<()> {
        if self == other {
            return Ok(());
        }

        let missing: Vec<&str> = self
            .names
            .iter()
            .filter(|n| other.index_of(n).is_none())
            .map(String::as_str)
            .collect();
        let unexpected: Vec<&str> = other
            .names
            .iter()
            .filter(|n| self.index_of(n).is_none())
            .map(String::as_str)
            .collect();

        bail!(
            "{what} classes do not match training classes \
             (training has {}, {what} has {}; missing from {what}: {:?}; not in training: {:?})",
            self.len(),
            other.len(),
            missing,
            unexpected,
        )
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_sorted() {
        let set = ClassSet::new(["scratches", "crazing", "patches"]);
        assert_eq!(set.names(), &["crazing", "patches", "scratches"]);
        assert_eq!(set.index_of("patches"), Some(1));
        assert_eq!(set.name(2), Some("scratches"));
    }

    #[test]
    fn test_duplicates_dropped() {
        let set = ClassSet::new(["a", "b", "a"]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_matching_sets_pass() {
        let train = ClassSet::new(["A", "B"]);
        let val   = ClassSet::new(["B", "A"]);
        assert!(train.ensure_matches(&val, "validation").is_ok());
    }

    #[test]
    fn test_extra_validation_class_fails() {
        let train = ClassSet::new(["A", "B"]);
        let val   = ClassSet::new(["A", "B", "C"]);
        let err   = train.ensure_matches(&val, "validation").unwrap_err();
        assert!(err.to_string().contains("\"C\""));
    }

    #[test]
    fn test_missing_validation_class_fails() {
        let train = ClassSet::new(["A", "B"]);
        let val   = ClassSet::new(["A"]);
        assert!(train.ensure_matches(&val, "validation").is_err());
    }

    #[test]
    fn test_unknown_name() {
        let set = ClassSet::new(["A"]);
        assert_eq!(set.index_of("Z"), None);
        assert_eq!(set.name(5), None);
    }
}
