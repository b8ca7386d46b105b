use super::atomic::write_atomically;
use super::traits::MolecularFile;
use crate::core::models::atom::Atom;
use crate::core::models::element;
use crate::core::models::system::MolecularSystem;
use crate::core::xtal::cell::{CrystalSymmetry, UnitCell};
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Non-coordinate records preserved from the source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdbMetadata {
    /// Title and remark records that preceded the coordinates, verbatim.
    pub header_lines: Vec<String>,
}

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: PdbParseErrorKind,
    },
    #[error("Inconsistent data: {0}")]
    Inconsistency(String),
    #[error("Missing required record: {0}")]
    MissingRecord(String),
}

#[derive(Debug, Error)]
pub enum PdbParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Line is too short for ATOM/HETATM record (must reach column 54)")]
    LineTooShort,
}

const HEADER_RECORDS: &[&str] = &[
    "HEADER", "TITLE", "COMPND", "SOURCE", "KEYWDS", "EXPDTA", "AUTHOR", "REMARK",
];

fn field(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len())).unwrap_or("")
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    field(line, start, end).trim()
}

fn column_char(line: &str, column: usize) -> char {
    field(line, column, column + 1).chars().next().unwrap_or(' ')
}

fn parse_float(line: &str, line_num: usize, start: usize, end: usize) -> Result<f64, PdbError> {
    let value = slice_and_trim(line, start, end);
    value.parse().map_err(|_| PdbError::Parse {
        line: line_num,
        kind: PdbParseErrorKind::InvalidFloat {
            columns: format!("{}-{}", start + 1, end),
            value: value.into(),
        },
    })
}

fn parse_optional_float(
    line: &str,
    line_num: usize,
    start: usize,
    end: usize,
    default: f64,
) -> Result<f64, PdbError> {
    if slice_and_trim(line, start, end).is_empty() {
        Ok(default)
    } else {
        parse_float(line, line_num, start, end)
    }
}

fn parse_cryst1(line: &str, line_num: usize) -> Result<Option<CrystalSymmetry>, PdbError> {
    let mut parameters = [0.0; 6];
    let columns = [(6, 15), (15, 24), (24, 33), (33, 40), (40, 47), (47, 54)];
    for (value, (start, end)) in parameters.iter_mut().zip(columns) {
        *value = parse_float(line, line_num, start, end)?;
    }
    match UnitCell::new(parameters) {
        Ok(cell) => Ok(Some(CrystalSymmetry::new(
            cell,
            slice_and_trim(line, 55, 66),
        ))),
        Err(e) => {
            warn!(line = line_num, error = %e, "Ignoring unusable CRYST1 record");
            Ok(None)
        }
    }
}

/// Formats an atom name into the four PDB name columns.
///
/// Names read from PDB files are already four characters wide; shorter names
/// (from mmCIF) are aligned so one-letter elements start in column 14.
fn pdb_atom_name(name: &str, element: &str) -> String {
    if name.len() == 4 {
        return name.to_string();
    }
    let trimmed = name.trim();
    if trimmed.len() < 4 && element.trim().len() == 1 {
        format!(" {:<3}", trimmed)
    } else {
        format!("{:<4}", trimmed)
    }
}

fn write_cryst1(symmetry: &CrystalSymmetry, writer: &mut impl Write) -> io::Result<()> {
    let [a, b, c, alpha, beta, gamma] = symmetry.unit_cell.parameters();
    writeln!(
        writer,
        "CRYST1{:>9.3}{:>9.3}{:>9.3}{:>7.2}{:>7.2}{:>7.2} {:<11}{:>4}",
        a, b, c, alpha, beta, gamma, symmetry.space_group, 1
    )
}

/// Writes one ATOM/HETATM record per atom, taking coordinates from `sites`
/// (in atom order), with a `TER` after each chain.
fn write_atom_records(
    system: &MolecularSystem,
    sites: &[Point3<f64>],
    writer: &mut impl Write,
) -> Result<(), PdbError> {
    if sites.len() != system.atom_count() {
        return Err(PdbError::Inconsistency(format!(
            "{} coordinates for {} atoms",
            sites.len(),
            system.atom_count()
        )));
    }

    let mut previous_chain = None;
    for (i, ((atom_id, atom), site)) in system.atoms_iter().zip(sites).enumerate() {
        let (chain, residue) = system.atom_context(atom_id).ok_or_else(|| {
            PdbError::Inconsistency(format!("Atom {} has no residue", atom.name.trim()))
        })?;
        if previous_chain.is_some_and(|id| id != residue.chain_id) {
            writeln!(writer, "TER")?;
        }
        previous_chain = Some(residue.chain_id);

        let line = format!(
            "{:<6}{:>5} {:<4}{}{:>3} {}{:>4}{}   {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}{:<2}",
            if atom.hetero { "HETATM" } else { "ATOM" },
            (i + 1) % 100_000,
            pdb_atom_name(&atom.name, &atom.element),
            atom.alt_loc,
            residue.name,
            chain.id.chars().next().unwrap_or(' '),
            residue.id,
            residue.insertion_code,
            site.x,
            site.y,
            site.z,
            atom.occupancy,
            atom.b_factor,
            atom.element,
            atom.charge
        );
        writeln!(writer, "{}", line)?;
    }
    if previous_chain.is_some() {
        writeln!(writer, "TER")?;
    }
    Ok(())
}

pub struct PdbFile;

impl PdbFile {
    /// Writes a multi-model file with one `MODEL`/`ENDMDL` block per state.
    ///
    /// Every state must hold one coordinate per atom of `system`, in atom
    /// order. States are written in the order given.
    pub fn write_ensemble(
        system: &MolecularSystem,
        states: &[Vec<Point3<f64>>],
        writer: &mut impl Write,
    ) -> Result<(), PdbError> {
        if states.is_empty() {
            return Err(PdbError::Inconsistency(
                "an ensemble needs at least one state".into(),
            ));
        }
        writeln!(writer, "REMARK Generated by cryofit")?;
        if let Some(symmetry) = system.crystal_symmetry() {
            write_cryst1(symmetry, writer)?;
        }
        for (n, sites) in states.iter().enumerate() {
            writeln!(writer, "MODEL     {:>4}", n + 1)?;
            write_atom_records(system, sites, writer)?;
            writeln!(writer, "ENDMDL")?;
        }
        writeln!(writer, "END")?;
        Ok(())
    }

    /// All-or-nothing variant of [`PdbFile::write_ensemble`].
    pub fn write_ensemble_to_path<P: AsRef<Path>>(
        system: &MolecularSystem,
        states: &[Vec<Point3<f64>>],
        path: P,
    ) -> Result<(), PdbError> {
        write_atomically(path, |mut writer| {
            Self::write_ensemble(system, states, &mut writer)
        })
    }

    /// Coordinates of every model in a file, in file order.
    ///
    /// A file without `MODEL` records counts as a single model.
    pub fn read_model_coordinates(
        reader: &mut impl BufRead,
    ) -> Result<Vec<Vec<Point3<f64>>>, PdbError> {
        let mut models = Vec::new();
        let mut current: Vec<Point3<f64>> = Vec::new();
        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;
            match field(&line, 0, 6).trim_end() {
                "ATOM" | "HETATM" => {
                    let x = parse_float(&line, line_num, 30, 38)?;
                    let y = parse_float(&line, line_num, 38, 46)?;
                    let z = parse_float(&line, line_num, 46, 54)?;
                    current.push(Point3::new(x, y, z));
                }
                "ENDMDL" => models.push(std::mem::take(&mut current)),
                _ => {}
            }
        }
        if !current.is_empty() {
            models.push(current);
        }
        Ok(models)
    }
}

impl MolecularFile for PdbFile {
    type Metadata = PdbMetadata;
    type Error = PdbError;

    /// Reads the first model of a PDB file.
    ///
    /// Only the first alternate conformer of each atom is kept.
    fn read_from(
        reader: &mut impl BufRead,
    ) -> Result<(MolecularSystem, Self::Metadata), Self::Error> {
        let mut system = MolecularSystem::new();
        let mut metadata = PdbMetadata::default();
        let mut symmetry = None;
        let mut models_seen = 0;
        let mut chosen_alt_loc: Option<char> = None;
        let mut skipped_alt_locs = 0usize;

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;
            let record_type = field(&line, 0, 6).trim_end();

            match record_type {
                "ATOM" | "HETATM" => {
                    if line.len() < 54 {
                        return Err(PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::LineTooShort,
                        });
                    }

                    let alt_loc = column_char(&line, 16);
                    if alt_loc != ' ' {
                        match chosen_alt_loc {
                            None => chosen_alt_loc = Some(alt_loc),
                            Some(chosen) if chosen != alt_loc => {
                                skipped_alt_locs += 1;
                                continue;
                            }
                            Some(_) => {}
                        }
                    }

                    let serial_str = slice_and_trim(&line, 6, 11);
                    let serial = if serial_str.is_empty() {
                        system.atom_count() + 1
                    } else {
                        serial_str.parse().map_err(|_| PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::InvalidInt {
                                columns: "7-11".into(),
                                value: serial_str.into(),
                            },
                        })?
                    };
                    let res_seq_str = slice_and_trim(&line, 22, 26);
                    let res_seq: isize = res_seq_str.parse().map_err(|_| PdbError::Parse {
                        line: line_num,
                        kind: PdbParseErrorKind::InvalidInt {
                            columns: "23-26".into(),
                            value: res_seq_str.into(),
                        },
                    })?;
                    let x = parse_float(&line, line_num, 30, 38)?;
                    let y = parse_float(&line, line_num, 38, 46)?;
                    let z = parse_float(&line, line_num, 46, 54)?;

                    let raw_name = format!("{:<4}", field(&line, 12, 16));
                    let mut atom = Atom::new(&raw_name, Default::default(), Point3::new(x, y, z));
                    atom.serial = serial;
                    atom.alt_loc = alt_loc;
                    atom.hetero = record_type == "HETATM";
                    atom.occupancy = parse_optional_float(&line, line_num, 54, 60, atom.occupancy)?;
                    atom.b_factor = parse_optional_float(&line, line_num, 60, 66, atom.b_factor)?;
                    let element_str = slice_and_trim(&line, 76, 78);
                    if !element_str.is_empty() {
                        atom.element = element_str.to_ascii_uppercase();
                    } else {
                        atom.element = element::infer_from_atom_name(&raw_name);
                    }
                    atom.charge = slice_and_trim(&line, 78, 80).to_string();

                    let chain_id = system.add_chain(slice_and_trim(&line, 21, 22));
                    let residue_id = system
                        .add_residue(
                            chain_id,
                            res_seq,
                            column_char(&line, 26),
                            slice_and_trim(&line, 17, 20),
                        )
                        .ok_or_else(|| {
                            PdbError::Inconsistency(format!("Chain missing on line {}", line_num))
                        })?;
                    system.add_atom_to_residue(residue_id, atom).ok_or_else(|| {
                        PdbError::Inconsistency(format!("Residue missing on line {}", line_num))
                    })?;
                }
                "CRYST1" => symmetry = parse_cryst1(&line, line_num)?,
                "MODEL" => {
                    models_seen += 1;
                    if models_seen > 1 {
                        break;
                    }
                }
                "ENDMDL" | "END" => break,
                record if HEADER_RECORDS.contains(&record) && system.is_empty() => {
                    metadata.header_lines.push(line.clone());
                }
                _ => {}
            }
        }

        if system.is_empty() {
            return Err(PdbError::MissingRecord("ATOM/HETATM records".into()));
        }
        if skipped_alt_locs > 0 {
            debug!(
                skipped = skipped_alt_locs,
                "Kept only the first alternate conformer"
            );
        }
        system.set_crystal_symmetry(symmetry);
        Ok((system, metadata))
    }

    fn write_to(
        system: &MolecularSystem,
        metadata: &Self::Metadata,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        for line in &metadata.header_lines {
            writeln!(writer, "{}", line)?;
        }
        if let Some(symmetry) = system.crystal_symmetry() {
            write_cryst1(symmetry, writer)?;
        }
        write_atom_records(system, &system.sites_cart(), writer)?;
        writeln!(writer, "END")?;
        Ok(())
    }

    fn write_system_to(
        system: &MolecularSystem,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        let default_metadata = PdbMetadata {
            header_lines: vec!["REMARK Generated by cryofit".to_string()],
        };
        Self::write_to(system, &default_metadata, writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "\
HEADER    RNA FRAGMENT
REMARK   2 RESOLUTION. 3.00 ANGSTROMS.
CRYST1   30.000   40.000   50.000  90.00  90.00  90.00 P 1           1
ATOM      1  N   GLY A   1       1.000   2.000   3.000  1.00 15.00           N
ATOM      2  CA AGLY A   1       2.000   2.000   3.000  0.60 16.00           C
ATOM      3  CA BGLY A   1       2.100   2.100   3.100  0.40 16.00           C
ATOM      4  C   GLY A   1       3.000   2.500   3.000  1.00 17.00
HETATM    5 ZN    ZN B 101      10.000  10.000  10.000  1.00 30.00          ZN2+
END
";

    fn read_sample() -> (MolecularSystem, PdbMetadata) {
        PdbFile::read_from(&mut Cursor::new(SAMPLE)).unwrap()
    }

    #[test]
    fn reads_atoms_chains_and_symmetry() {
        let (system, metadata) = read_sample();

        assert_eq!(system.atom_count(), 4);
        assert_eq!(system.chains_iter().count(), 2);
        assert_eq!(metadata.header_lines.len(), 2);

        let symmetry = system.crystal_symmetry().unwrap();
        assert_eq!(symmetry.unit_cell.parameters()[1], 40.0);
        assert_eq!(symmetry.space_group, "P 1");

        let atoms: Vec<_> = system.atoms_iter().map(|(_, a)| a.clone()).collect();
        assert_eq!(atoms[1].name, " CA ");
        assert_eq!(atoms[1].alt_loc, 'A');
        assert_eq!(atoms[1].occupancy, 0.6);
        assert_eq!(atoms[2].element, "C");
        assert_eq!(atoms[3].element, "ZN");
        assert_eq!(atoms[3].charge, "2+");
        assert!(atoms[3].hetero);
        assert_eq!(atoms[3].position, Point3::new(10.0, 10.0, 10.0));
    }

    #[test]
    fn only_the_first_model_is_read() {
        let text = "\
MODEL        1
ATOM      1  CA  ALA A   1       1.000   1.000   1.000  1.00 20.00           C
ENDMDL
MODEL        2
ATOM      1  CA  ALA A   1       9.000   9.000   9.000  1.00 20.00           C
ENDMDL
";
        let (system, _) = PdbFile::read_from(&mut Cursor::new(text)).unwrap();
        assert_eq!(system.sites_cart(), vec![Point3::new(1.0, 1.0, 1.0)]);
    }

    #[test]
    fn parse_errors_report_line_and_columns() {
        let text = "ATOM      1  CA  ALA A   1       1.000   x.xxx   1.000  1.00 20.00           C\n";
        let err = PdbFile::read_from(&mut Cursor::new(text)).unwrap_err();
        match err {
            PdbError::Parse {
                line,
                kind: PdbParseErrorKind::InvalidFloat { columns, .. },
            } => {
                assert_eq!(line, 1);
                assert_eq!(columns, "39-46");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let short = "ATOM      1  CA  ALA A   1       1.000\n";
        assert!(matches!(
            PdbFile::read_from(&mut Cursor::new(short)),
            Err(PdbError::Parse {
                kind: PdbParseErrorKind::LineTooShort,
                ..
            })
        ));
    }

    #[test]
    fn files_without_atoms_are_rejected() {
        let text = "HEADER    EMPTY\nEND\n";
        assert!(matches!(
            PdbFile::read_from(&mut Cursor::new(text)),
            Err(PdbError::MissingRecord(_))
        ));
    }

    #[test]
    fn unusable_cryst1_is_ignored() {
        let text = "\
CRYST1    0.000    0.000    0.000   0.00   0.00   0.00 P 1           1
ATOM      1  CA  ALA A   1       1.000   1.000   1.000  1.00 20.00           C
";
        let (system, _) = PdbFile::read_from(&mut Cursor::new(text)).unwrap();
        assert!(system.crystal_symmetry().is_none());
    }

    #[test]
    fn written_records_use_fixed_columns_and_read_back() {
        let (system, metadata) = read_sample();
        let mut out = Vec::new();
        PdbFile::write_to(&system, &metadata, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let first_atom = text.lines().find(|l| l.starts_with("ATOM")).unwrap();
        assert_eq!(
            first_atom,
            "ATOM      1  N   GLY A   1       1.000   2.000   3.000  1.00 15.00           N  "
        );
        assert!(text.lines().any(|l| l.starts_with("CRYST1   30.000   40.000   50.000")));
        assert_eq!(text.lines().filter(|l| *l == "TER").count(), 2);

        let (again, _) = PdbFile::read_from(&mut Cursor::new(text)).unwrap();
        assert_eq!(again.sites_cart(), system.sites_cart());
        assert_eq!(again.crystal_symmetry(), system.crystal_symmetry());
    }

    #[test]
    fn ensemble_keeps_state_order() {
        let (system, _) = read_sample();
        let first = system.sites_cart();
        let second: Vec<_> = first
            .iter()
            .map(|p| p + nalgebra::Vector3::new(0.5, 0.0, 0.0))
            .collect();

        let mut out = Vec::new();
        PdbFile::write_ensemble(&system, &[first.clone(), second.clone()], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("MODEL")).count(), 2);
        assert!(text.contains("MODEL        1\n"));

        let models = PdbFile::read_model_coordinates(&mut Cursor::new(text)).unwrap();
        assert_eq!(models, vec![first, second]);
    }

    #[test]
    fn ensemble_rejects_mismatched_states() {
        let (system, _) = read_sample();
        let mut out = Vec::new();
        assert!(matches!(
            PdbFile::write_ensemble(&system, &[vec![Point3::origin()]], &mut out),
            Err(PdbError::Inconsistency(_))
        ));
        assert!(matches!(
            PdbFile::write_ensemble(&system, &[], &mut out),
            Err(PdbError::Inconsistency(_))
        ));
    }

    #[test]
    fn short_names_are_aligned_by_element() {
        assert_eq!(pdb_atom_name("CA", "C"), " CA ");
        assert_eq!(pdb_atom_name("FE", "FE"), "FE  ");
        assert_eq!(pdb_atom_name("HD21", "H"), "HD21");
        assert_eq!(pdb_atom_name(" N  ", "N"), " N  ");
    }
}
