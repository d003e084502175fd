use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::RelocationError;

/// Which run directory under the transient root holds the annotated image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunSelector {
    /// The directory named by this run id.
    Named(String),
    /// The most recently modified subdirectory. Only meaningful when no other
    /// run writes to the same root, e.g. output left behind by external tools.
    Latest,
}

/// Names moved out of a run directory, one per line.
const LEDGER_NAME: &str = ".relocated";

/// Moves `image_name` from the selected run directory into `destination_root`.
///
/// Calling it again after a successful move returns the destination path
/// without touching the file system. A file already at the destination that
/// this run did not move there is never claimed.
pub fn relocate(
    transient_root: &Path,
    run: &RunSelector,
    image_name: &str,
    destination_root: &Path,
) -> Result<PathBuf, RelocationError> {
    let destination = destination_root.join(image_name);
    let run_dir = match run {
        RunSelector::Named(run_id) => transient_root.join(run_id),
        RunSelector::Latest => match latest_subdirectory(transient_root) {
            Some(dir) => dir,
            None => {
                return Err(RelocationError::NoRunDirectory {
                    root: transient_root.to_path_buf(),
                });
            }
        },
    };
    let source = run_dir.join(image_name);

    if !source.is_file() {
        if destination.is_file() && already_relocated(&run_dir, image_name) {
            tracing::debug!(image = image_name, "annotated image already relocated");
            return Ok(destination);
        }
        return Err(RelocationError::NotFound {
            image: image_name.to_string(),
            run_dir,
        });
    }

    let io_error = |source_err| RelocationError::Io {
        from: source.clone(),
        to: destination.clone(),
        source: source_err,
    };
    fs::create_dir_all(destination_root).map_err(io_error)?;
    move_file(&source, &destination).map_err(io_error)?;
    if let Err(e) = record_relocation(&run_dir, image_name) {
        tracing::warn!(image = image_name, error = %e, "relocation not recorded");
    }
    Ok(destination)
}

/// Removes the run directory once every annotated image has been moved out.
///
/// Fails, leaving the directory in place, when anything besides the move
/// ledger is still inside.
pub fn clear_run_dir(run_dir: &Path) -> io::Result<()> {
    for entry in fs::read_dir(run_dir)? {
        if entry?.file_name() != LEDGER_NAME {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{:?} still holds files that were not relocated", run_dir),
            ));
        }
    }
    match fs::remove_file(run_dir.join(LEDGER_NAME)) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::remove_dir(run_dir)
}

fn already_relocated(run_dir: &Path, image_name: &str) -> bool {
    fs::read_to_string(run_dir.join(LEDGER_NAME))
        .map(|ledger| ledger.lines().any(|name| name == image_name))
        .unwrap_or(false)
}

fn record_relocation(run_dir: &Path, image_name: &str) -> io::Result<()> {
    let mut ledger = OpenOptions::new()
        .create(true)
        .append(true)
        .open(run_dir.join(LEDGER_NAME))?;
    writeln!(ledger, "{image_name}")
}

/// Rename, falling back to copy + remove when the rename crosses file systems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

fn latest_subdirectory(root: &Path) -> Option<PathBuf> {
    fs::read_dir(root)
        .ok()?
        .flatten()
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|entry| {
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, entry.path())
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, path)| path)
}
