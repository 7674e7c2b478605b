//! The pending list of dropped tracks and batch organizing over it.

use crate::organize::{OrganizeError, Organizer, Placement};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Tracks waiting to be organized, in drop order.
///
/// An entry leaves the list only when its file was actually moved. Entries
/// whose last attempt failed are flagged until they succeed.
#[derive(Debug, Default)]
pub struct Session {
    pending: Vec<PathBuf>,
    flagged: HashSet<PathBuf>,
}

#[derive(Debug)]
pub enum Outcome {
    Moved(Placement),
    Failed { path: PathBuf, error: OrganizeError },
}

impl Outcome {
    pub fn path(&self) -> &Path {
        match self {
            Outcome::Moved(placement) => &placement.source,
            Outcome::Failed { path, .. } => path,
        }
    }

    pub fn is_moved(&self) -> bool {
        matches!(self, Outcome::Moved(_))
    }
}

/// One outcome per attempted track, in the order they were attempted.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<Outcome>,
}

impl BatchReport {
    pub fn moved(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_moved()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.moved()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &OrganizeError)> {
        self.outcomes.iter().filter_map(|o| match o {
            Outcome::Failed { path, error } => Some((path.as_path(), error)),
            Outcome::Moved(_) => None,
        })
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a dropped path. Returns `false` if it is already pending.
    pub fn add(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if self.pending.contains(&path) {
            debug!("{} already pending", path.display());
            return false;
        }
        self.pending.push(path);
        true
    }

    /// Queue several paths, keeping their order. Returns how many were new.
    pub fn extend<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        paths
            .into_iter()
            .fold(0, |added, path| added + usize::from(self.add(path)))
    }

    pub fn pending(&self) -> &[PathBuf] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_flagged(&self, path: &Path) -> bool {
        self.flagged.contains(path)
    }

    /// Organize a single pending track.
    ///
    /// The entry is dropped from the list only if the file was moved; on
    /// failure it stays in place and is flagged.
    pub fn organize(
        &mut self,
        path: &Path,
        organizer: &Organizer,
    ) -> Result<Placement, OrganizeError> {
        match organizer.organize(path) {
            Ok(placement) => {
                self.pending.retain(|p| p != path);
                self.flagged.remove(path);
                Ok(placement)
            }
            Err(error) => {
                warn!("Could not organize {}: {}", path.display(), error);
                if self.pending.iter().any(|p| p == path) {
                    self.flagged.insert(path.to_path_buf());
                }
                Err(error)
            }
        }
    }

    /// Attempt every pending track once, in drop order.
    ///
    /// Works on a snapshot of the list taken up front, so removals during the
    /// run never shift or skip entries, and one track's failure never stops
    /// the others.
    pub fn organize_all(&mut self, organizer: &Organizer) -> BatchReport {
        let snapshot = self.pending.clone();
        let mut report = BatchReport::default();

        for path in snapshot {
            let outcome = match self.organize(&path, organizer) {
                Ok(placement) => Outcome::Moved(placement),
                Err(error) => Outcome::Failed { path, error },
            };
            report.outcomes.push(outcome);
        }

        debug!(
            moved = report.moved(),
            failed = report.failed(),
            "batch finished"
        );
        report
    }
}
