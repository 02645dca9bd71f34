//! Repository classification
//!
//! Splits the local checkout names and the remote organization names into
//! three disjoint action sets: repositories to clone, repositories to sync and
//! local-only repositories that are left untouched.

use std::collections::HashSet;
use std::fmt;

/// The action a repository name was assigned for this run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionClass {
    /// Present remotely only, needs a fresh checkout
    Clone,
    /// Present on both sides, needs updating
    Sync,
    /// Present locally only, left as is
    Other,
}

impl fmt::Display for ActionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionClass::Clone => write!(f, "Clone"),
            ActionClass::Sync => write!(f, "Sync"),
            ActionClass::Other => write!(f, "Other"),
        }
    }
}

/// Result of classifying local and remote repository names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoActions {
    /// Remote-only names, sorted
    pub clone: Vec<String>,
    /// Names present on both sides, in local enumeration order
    pub sync: Vec<String>,
    /// Local-only names, sorted
    pub other: Vec<String>,
}

impl RepoActions {
    /// Names assigned to the given class
    pub fn names(&self, class: ActionClass) -> &[String] {
        match class {
            ActionClass::Clone => &self.clone,
            ActionClass::Sync => &self.sync,
            ActionClass::Other => &self.other,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clone.is_empty() && self.sync.is_empty() && self.other.is_empty()
    }
}

/// Partition `local` and `remote` names into clone, sync and other sets.
///
/// Names are compared exactly (case-sensitive, untrimmed). Duplicates in
/// either input collapse to a single entry.
pub fn classify<L, R>(local: L, remote: R) -> RepoActions
where
    L: IntoIterator,
    L::Item: Into<String>,
    R: IntoIterator,
    R::Item: Into<String>,
{
    let local: Vec<String> = local.into_iter().map(Into::into).collect();
    let mut remote_left: HashSet<String> = remote.into_iter().map(Into::into).collect();
    let mut local_left: HashSet<String> = local.iter().cloned().collect();

    let mut sync = Vec::new();
    for name in &local {
        if !remote_left.remove(name) {
            continue;
        }
        local_left.remove(name);
        sync.push(name.clone());
    }

    let mut clone: Vec<String> = remote_left.into_iter().collect();
    clone.sort();

    let mut other: Vec<String> = local_left.into_iter().collect();
    other.sort();

    RepoActions { clone, sync, other }
}
