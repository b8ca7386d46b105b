use crate::core::io::atomic::write_atomically;
use crate::core::io::model::ModelFormat;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Stem suffix of a normalized copy.
pub const RNA_CLEANED_SUFFIX: &str = "_RNA_cleaned";

const RESIDUE_CODE_COLUMNS: std::ops::Range<usize> = 18..20;
const ATOMIC_RECORDS: [&[u8]; 3] = [b"ATOM  ", b"HETATM", b"ANISOU"];

fn modern_code(legacy: &[u8]) -> Option<&'static [u8; 2]> {
    match legacy {
        b"RA" => Some(b" A"),
        b"RU" => Some(b" U"),
        b"RG" => Some(b" G"),
        b"RC" => Some(b" C"),
        _ => None,
    }
}

/// Rewrites a legacy ribonucleotide code in columns 19-20 of an atomic record
/// line. Returns `true` if the line was changed.
pub fn rewrite_rna_line(line: &mut [u8]) -> bool {
    if line.len() < RESIDUE_CODE_COLUMNS.end
        || !ATOMIC_RECORDS.iter().any(|r| line.starts_with(r))
    {
        return false;
    }
    match modern_code(&line[RESIDUE_CODE_COLUMNS]) {
        Some(code) => {
            line[RESIDUE_CODE_COLUMNS].copy_from_slice(code);
            true
        }
        None => false,
    }
}

/// Rewrites every line of `contents`, preserving line endings. Returns the new
/// contents and the number of lines changed.
pub fn rewrite_rna_codes(contents: &[u8]) -> (Vec<u8>, usize) {
    let mut out = Vec::with_capacity(contents.len());
    let mut changed = 0;
    for line in contents.split_inclusive(|&b| b == b'\n') {
        let start = out.len();
        out.extend_from_slice(line);
        if rewrite_rna_line(&mut out[start..]) {
            changed += 1;
        }
    }
    (out, changed)
}

pub fn is_normalized(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.ends_with(RNA_CLEANED_SUFFIX))
}

/// `dir/name.pdb` becomes `dir/name_RNA_cleaned.pdb`.
pub fn normalized_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}{RNA_CLEANED_SUFFIX}.{}", ext.to_string_lossy()),
        None => format!("{stem}{RNA_CLEANED_SUFFIX}"),
    };
    path.with_file_name(name)
}

/// Writes a copy of a PDB model with legacy `RA`/`RU`/`RG`/`RC` residue codes
/// replaced and returns its path.
///
/// A path that already carries the normalized suffix, or a model that is not
/// in PDB format, is returned unchanged without touching the filesystem.
///
/// # Errors
///
/// Returns an I/O error if the model cannot be read or the copy cannot be
/// written.
pub fn normalize_model_file(path: &Path) -> io::Result<PathBuf> {
    if is_normalized(path) {
        debug!(path = %path.display(), "Model already normalized");
        return Ok(path.to_path_buf());
    }
    if ModelFormat::from_path(path) != Some(ModelFormat::Pdb) {
        debug!(path = %path.display(), "Skipping residue-code normalization for non-PDB model");
        return Ok(path.to_path_buf());
    }

    let contents = fs::read(path)?;
    let (rewritten, changed) = rewrite_rna_codes(&contents);
    let output = normalized_path(path);
    write_atomically(&output, |w| -> io::Result<()> { w.write_all(&rewritten) })?;
    info!(
        input = %path.display(),
        output = %output.display(),
        rewritten_lines = changed,
        "Normalized ribonucleotide residue codes"
    );
    Ok(output)
}
