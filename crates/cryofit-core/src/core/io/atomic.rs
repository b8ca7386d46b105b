use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// A fully written, synced temporary file waiting to replace its target.
///
/// Dropping it without [`StagedFile::commit`] removes the temporary file.
#[derive(Debug)]
pub struct StagedFile {
    file: NamedTempFile,
    target: PathBuf,
}

impl StagedFile {
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Renames the staged file over its target.
    pub fn commit(self) -> io::Result<()> {
        self.file.persist(&self.target).map_err(|e| e.error)?;
        Ok(())
    }
}

#[derive(Debug, Error)]
#[error("Failed to replace {path}: {source}")]
pub struct CommitError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Writes the contents destined for `path` into a temporary file next to it.
///
/// Nothing at `path` changes until the returned file is committed. On
/// failure the temporary file is removed.
pub fn stage<P, F, E>(path: P, write: F) -> Result<StagedFile, E>
where
    P: AsRef<Path>,
    F: FnOnce(&mut dyn Write) -> Result<(), E>,
    E: From<io::Error>,
{
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut writer = BufWriter::new(NamedTempFile::new_in(dir)?);
    write(&mut writer)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.as_file().sync_all()?;
    Ok(StagedFile {
        file,
        target: path.to_path_buf(),
    })
}

/// Writes a file so that readers see either the old contents or the complete
/// new contents, never a truncated file.
///
/// On failure the temporary file is removed and `path` is untouched.
pub fn write_atomically<P, F, E>(path: P, write: F) -> Result<(), E>
where
    P: AsRef<Path>,
    F: FnOnce(&mut dyn Write) -> Result<(), E>,
    E: From<io::Error>,
{
    stage(path, write)?.commit()?;
    Ok(())
}

/// Commits every staged file in order. If one rename fails, the targets
/// already replaced by this call are removed again and the remaining
/// temporary files are discarded, so the set lands whole or not at all.
pub fn commit_all(staged: Vec<StagedFile>) -> Result<(), CommitError> {
    let mut committed: Vec<PathBuf> = Vec::with_capacity(staged.len());
    for file in staged {
        let target = file.target.clone();
        if let Err(source) = file.commit() {
            for path in &committed {
                let _ = fs::remove_file(path);
            }
            return Err(CommitError {
                path: target,
                source,
            });
        }
        committed.push(target);
    }
    Ok(())
}
