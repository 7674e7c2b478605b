use crate::layout::{destination_for, DateStamp};
use crate::tags::{read_tags, TagError, TagSnapshot};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const MAX_CONFLICT_ATTEMPTS: u32 = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum OrganizeError {
    #[error("{} does not exist or is not a regular file", path.display())]
    MissingSource { path: PathBuf },
    #[error(transparent)]
    Tags(#[from] TagError),
    #[error("{} has no usable artist tag", path.display())]
    EmptyArtist { path: PathBuf },
    #[error("destination already exists: {}", path.display())]
    DestinationExists { path: PathBuf },
    #[error("failed to {action} {}: {source}", path.display())]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl OrganizeError {
    /// The file's tags could not be used: unreadable container, no tag, or
    /// no artist.
    pub fn is_tag_failure(&self) -> bool {
        matches!(self, Self::Tags(_) | Self::EmptyArtist { .. })
    }

    fn fs(action: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Filesystem {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What to do when the destination file name is already taken. Existing
/// files are never overwritten.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Leave the source where it is and report the collision.
    #[default]
    Fail,
    /// Append ` (1)`, ` (2)`, ... to the file stem until the name is free.
    Rename,
}

/// Where the organize date comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    /// Local wall-clock date, read at every organize call.
    Today,
    Fixed(NaiveDate),
}

impl DateSource {
    pub fn stamp(&self) -> DateStamp {
        match self {
            DateSource::Today => DateStamp::of(Local::now().date_naive()),
            DateSource::Fixed(date) => DateStamp::of(*date),
        }
    }
}

/// A computed, not yet executed, placement.
#[derive(Debug, Clone)]
pub struct Plan {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub snapshot: TagSnapshot,
    pub date: DateStamp,
    /// The source already is the destination file.
    pub in_place: bool,
    /// The destination name was changed to dodge another file.
    pub renamed: bool,
}

/// A completed placement.
#[derive(Debug, Clone)]
pub struct Placement {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub snapshot: TagSnapshot,
    /// The file name was changed to dodge an existing file.
    pub renamed: bool,
}

#[derive(Debug, Clone)]
pub struct Organizer {
    root: PathBuf,
    dates: DateSource,
    on_conflict: ConflictPolicy,
}

impl Organizer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dates: DateSource::Today,
            on_conflict: ConflictPolicy::default(),
        }
    }

    pub fn with_dates(mut self, dates: DateSource) -> Self {
        self.dates = dates;
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.on_conflict = policy;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read tags and compute the destination for `source` without touching
    /// the filesystem.
    pub fn plan(&self, source: &Path) -> Result<Plan, OrganizeError> {
        if !source.is_file() {
            return Err(OrganizeError::MissingSource {
                path: source.to_path_buf(),
            });
        }

        let snapshot = read_tags(source)?;
        let date = self.dates.stamp();
        let destination = destination_for(&self.root, date, &snapshot.artist, source).ok_or_else(
            || OrganizeError::EmptyArtist {
                path: source.to_path_buf(),
            },
        )?;

        let in_place = same_file(source, &destination);

        Ok(Plan {
            source: source.to_path_buf(),
            destination,
            snapshot,
            date,
            in_place,
            renamed: false,
        })
    }

    /// Plan a whole batch in order, applying the conflict policy against
    /// both the disk and destinations claimed earlier in the batch.
    pub fn plan_all(&self, sources: &[PathBuf]) -> Vec<Result<Plan, OrganizeError>> {
        let mut claimed = HashSet::new();

        sources
            .iter()
            .map(|source| -> Result<Plan, OrganizeError> {
                let mut plan = self.plan(source)?;
                if !plan.in_place {
                    let destination = self.resolve_conflict(&plan.destination, &claimed)?;
                    plan.renamed = destination != plan.destination;
                    plan.destination = destination;
                }
                claimed.insert(plan.destination.clone());
                Ok(plan)
            })
            .collect()
    }

    /// Organize one track: read its tags, create the year, month and artist
    /// directories as needed, and move the file there.
    ///
    /// On any error the source file is left where it was.
    pub fn organize(&self, source: &Path) -> Result<Placement, OrganizeError> {
        let name = source.file_name().unwrap_or(source.as_os_str());
        debug!("Organizing {}", name.to_string_lossy());

        let plan = self.plan(source)?;
        debug!(artist = %plan.snapshot.artist, destination = %plan.destination.display(), "planned");

        if plan.in_place {
            return Ok(Placement {
                source: plan.source,
                destination: plan.destination,
                snapshot: plan.snapshot,
                renamed: false,
            });
        }

        let year_dir = self.root.join(plan.date.year_segment());
        let month_dir = year_dir.join(plan.date.month_segment());
        let mut dirs = vec![year_dir, month_dir];
        dirs.extend(plan.destination.parent().map(Path::to_path_buf));
        for dir in &dirs {
            ensure_dir(dir)?;
        }

        let destination = self.resolve_conflict(&plan.destination, &HashSet::new())?;
        let renamed = destination != plan.destination;
        move_file(&plan.source, &destination)?;

        info!(
            "Moved {} -> {}",
            plan.source.display(),
            destination.display()
        );
        Ok(Placement {
            source: plan.source,
            destination,
            snapshot: plan.snapshot,
            renamed,
        })
    }

    fn resolve_conflict(
        &self,
        dest: &Path,
        claimed: &HashSet<PathBuf>,
    ) -> Result<PathBuf, OrganizeError> {
        let taken = |p: &Path| occupied(p) || claimed.contains(p);

        if !taken(dest) {
            return Ok(dest.to_path_buf());
        }
        if self.on_conflict == ConflictPolicy::Fail {
            return Err(OrganizeError::DestinationExists {
                path: dest.to_path_buf(),
            });
        }

        let stem = dest
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("file");
        let ext = dest.extension().and_then(|e| e.to_str()).unwrap_or("");
        let parent = dest.parent().unwrap_or(Path::new(""));

        for counter in 1..=MAX_CONFLICT_ATTEMPTS {
            let new_name = if ext.is_empty() {
                format!("{} ({})", stem, counter)
            } else {
                format!("{} ({}).{}", stem, counter, ext)
            };
            let candidate = parent.join(new_name);
            if !taken(&candidate) {
                debug!("{} taken, using {}", dest.display(), candidate.display());
                return Ok(candidate);
            }
        }

        Err(OrganizeError::DestinationExists {
            path: dest.to_path_buf(),
        })
    }
}

fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Both paths resolve to the same file on disk, however they are spelled.
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Make sure `path` is a directory, creating it (one level) if needed.
///
/// Returns `true` when this call created it. A directory that appears between
/// the check and the create counts as already existing.
pub fn ensure_dir(path: &Path) -> Result<bool, OrganizeError> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => return Ok(false),
        Ok(_) => {
            return Err(OrganizeError::fs(
                "create directory",
                path,
                io::Error::new(io::ErrorKind::AlreadyExists, "a non-directory is in the way"),
            ))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(OrganizeError::fs("inspect", path, e)),
    }

    match fs::create_dir(path) {
        Ok(()) => {
            debug!("Created directory {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(false),
        Err(e) => Err(OrganizeError::fs("create directory", path, e)),
    }
}

/// Move a file, falling back to copy+delete only for cross-device moves.
pub fn move_file(source: &Path, dest: &Path) -> Result<(), OrganizeError> {
    // Re-check right before the move: rename would silently clobber.
    if occupied(dest) {
        return Err(OrganizeError::DestinationExists {
            path: dest.to_path_buf(),
        });
    }

    match fs::rename(source, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(libc::EXDEV) => {
            warn!(
                "{} is on another device, copying instead",
                dest.display()
            );
            copy_then_remove(source, dest)
        }
        Err(e) => Err(OrganizeError::fs("move", source, e)),
    }
}

/// Copy `source` to `dest`, verify the byte count, then delete `source`.
///
/// If anything fails the partial copy is removed and `source` is kept.
fn copy_then_remove(source: &Path, dest: &Path) -> Result<(), OrganizeError> {
    let source_len = fs::metadata(source)
        .map_err(|e| OrganizeError::fs("read metadata of", source, e))?
        .len();

    let copied = match fs::copy(source, dest) {
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_file(dest);
            return Err(OrganizeError::fs("copy", source, e));
        }
    };

    if copied != source_len {
        let _ = fs::remove_file(dest);
        return Err(OrganizeError::fs(
            "copy",
            source,
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes, copied {}", source_len, copied),
            ),
        ));
    }

    if let Err(e) = fs::remove_file(source) {
        let _ = fs::remove_file(dest);
        return Err(OrganizeError::fs("remove", source, e));
    }
    Ok(())
}
