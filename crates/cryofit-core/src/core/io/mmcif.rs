use super::traits::MolecularFile;
use crate::core::models::atom::Atom;
use crate::core::models::element;
use crate::core::models::system::MolecularSystem;
use crate::core::xtal::cell::{CrystalSymmetry, UnitCell};
use nalgebra::Point3;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct CifMetadata {
    /// Name of the data block (the text after `data_`).
    pub data_block: String,
}

impl Default for CifMetadata {
    fn default() -> Self {
        Self {
            data_block: "cryofit".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CifError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("Missing required column: {0}")]
    MissingColumn(String),
    #[error("Invalid value in column {column}: '{value}'")]
    InvalidValue { column: String, value: String },
    #[error("Missing required record: {0}")]
    MissingRecord(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    text: String,
    quoted: bool,
    line: usize,
}

impl Token {
    fn is_keyword(&self) -> bool {
        if self.quoted {
            return false;
        }
        let lower = self.text.to_ascii_lowercase();
        self.text.starts_with('_')
            || lower == "loop_"
            || lower.starts_with("data_")
            || lower.starts_with("save_")
            || lower == "global_"
            || lower == "stop_"
    }
}

fn tokenize(reader: &mut impl BufRead) -> Result<Vec<Token>, CifError> {
    let mut tokens = Vec::new();
    let mut text_field: Option<(usize, String)> = None;

    for (line_num, line_res) in reader.lines().enumerate() {
        let line = line_res?;
        let line_num = line_num + 1;

        if let Some((start, mut text)) = text_field.take() {
            if let Some(rest) = line.strip_prefix(';') {
                tokens.push(Token {
                    text,
                    quoted: true,
                    line: start,
                });
                tokenize_line(rest, line_num, &mut tokens)?;
            } else {
                text.push_str(&line);
                text.push('\n');
                text_field = Some((start, text));
            }
            continue;
        }

        if let Some(first) = line.strip_prefix(';') {
            text_field = Some((line_num, format!("{}\n", first)));
            continue;
        }
        tokenize_line(&line, line_num, &mut tokens)?;
    }

    if let Some((start, _)) = text_field {
        return Err(CifError::Syntax {
            line: start,
            message: "unterminated text field".into(),
        });
    }
    Ok(tokens)
}

fn tokenize_line(line: &str, line_num: usize, tokens: &mut Vec<Token>) -> Result<(), CifError> {
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '#' {
            break;
        } else if c == '\'' || c == '"' {
            // A quote only closes when followed by whitespace or the line end.
            let start = i + 1;
            let mut end = start;
            loop {
                if end >= chars.len() {
                    return Err(CifError::Syntax {
                        line: line_num,
                        message: "unterminated quoted value".into(),
                    });
                }
                if chars[end] == c && chars.get(end + 1).is_none_or(|n| n.is_whitespace()) {
                    break;
                }
                end += 1;
            }
            tokens.push(Token {
                text: chars[start..end].iter().collect(),
                quoted: true,
                line: line_num,
            });
            i = end + 1;
        } else {
            let start = i;
            while i < chars.len() && !chars[i].is_whitespace() {
                i += 1;
            }
            tokens.push(Token {
                text: chars[start..i].iter().collect(),
                quoted: false,
                line: line_num,
            });
        }
    }
    Ok(())
}

/// A `loop_` table with lower-cased tags.
#[derive(Debug, Default)]
struct CifLoop {
    tags: Vec<String>,
    values: Vec<String>,
}

impl CifLoop {
    fn column(&self, tag: &str) -> Option<usize> {
        self.tags.iter().position(|t| t == tag)
    }

    fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.values.chunks_exact(self.tags.len().max(1))
    }
}

#[derive(Debug, Default)]
struct CifBlock {
    name: String,
    items: HashMap<String, String>,
    atom_site: Option<CifLoop>,
}

fn parse_block(tokens: &[Token]) -> Result<CifBlock, CifError> {
    let mut block = CifBlock::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        let lower = token.text.to_ascii_lowercase();
        if token.quoted {
            return Err(CifError::Syntax {
                line: token.line,
                message: format!("unexpected value '{}'", token.text),
            });
        } else if lower == "loop_" {
            i += 1;
            let mut table = CifLoop::default();
            while i < tokens.len() && !tokens[i].quoted && tokens[i].text.starts_with('_') {
                table.tags.push(tokens[i].text.to_ascii_lowercase());
                i += 1;
            }
            while i < tokens.len() && !tokens[i].is_keyword() {
                table.values.push(tokens[i].text.clone());
                i += 1;
            }
            if table.tags.is_empty() || table.values.len() % table.tags.len() != 0 {
                return Err(CifError::Syntax {
                    line: token.line,
                    message: "loop has no tags or an incomplete row".into(),
                });
            }
            if table.tags[0].starts_with("_atom_site.") && block.atom_site.is_none() {
                block.atom_site = Some(table);
            }
        } else if lower.starts_with("data_") {
            if !block.name.is_empty() {
                debug!("Ignoring data blocks after the first");
                break;
            }
            block.name = token.text[5..].to_string();
            i += 1;
        } else if lower.starts_with('_') {
            let value = tokens
                .get(i + 1)
                .filter(|v| !v.is_keyword())
                .ok_or_else(|| CifError::Syntax {
                    line: token.line,
                    message: format!("item {} has no value", token.text),
                })?;
            block.items.insert(lower, value.text.clone());
            i += 2;
        } else {
            i += 1;
        }
    }
    Ok(block)
}

fn is_missing(value: &str) -> bool {
    value == "." || value == "?"
}

/// Strips a trailing standard uncertainty such as `50.12(3)`.
fn numeric_text(value: &str) -> &str {
    value.split('(').next().unwrap_or(value)
}

fn parse_number<T: std::str::FromStr>(column: &str, value: &str) -> Result<T, CifError> {
    numeric_text(value)
        .parse()
        .map_err(|_| CifError::InvalidValue {
            column: column.to_string(),
            value: value.to_string(),
        })
}

fn crystal_symmetry(items: &HashMap<String, String>) -> Option<CrystalSymmetry> {
    let keys = [
        "_cell.length_a",
        "_cell.length_b",
        "_cell.length_c",
        "_cell.angle_alpha",
        "_cell.angle_beta",
        "_cell.angle_gamma",
    ];
    let mut parameters = [0.0; 6];
    for (value, key) in parameters.iter_mut().zip(keys) {
        *value = numeric_text(items.get(key)?).parse().ok()?;
    }
    let space_group = ["_symmetry.space_group_name_h-m", "_space_group.name_h-m_alt"]
        .iter()
        .find_map(|key| items.get(*key).filter(|v| !is_missing(v)))
        .map_or("P 1", |v| v.as_str());
    match UnitCell::new(parameters) {
        Ok(cell) => Some(CrystalSymmetry::new(cell, space_group)),
        Err(e) => {
            warn!(error = %e, "Ignoring unusable _cell category");
            None
        }
    }
}

fn pdb_style_charge(value: &str) -> Result<String, CifError> {
    if is_missing(value) {
        return Ok(String::new());
    }
    let charge: i32 = parse_number("_atom_site.pdbx_formal_charge", value)?;
    Ok(match charge {
        0 => String::new(),
        c if c > 0 => format!("{}+", c),
        c => format!("{}-", -c),
    })
}

fn quote_value(value: &str) -> String {
    if value.is_empty() {
        return ".".to_string();
    }
    let needs_quotes = value.chars().any(char::is_whitespace)
        || value.starts_with(['_', '#', '$', '\'', '"', '[', ']', ';']);
    if !needs_quotes {
        value.to_string()
    } else if value.contains('"') {
        format!("'{}'", value)
    } else {
        format!("\"{}\"", value)
    }
}

pub struct CifFile;

impl MolecularFile for CifFile {
    type Metadata = CifMetadata;
    type Error = CifError;

    /// Reads the first model of the `_atom_site` loop in the first data
    /// block, preferring author-assigned identifiers over label ones.
    fn read_from(
        reader: &mut impl BufRead,
    ) -> Result<(MolecularSystem, Self::Metadata), Self::Error> {
        let tokens = tokenize(reader)?;
        let block = parse_block(&tokens)?;
        let table = block
            .atom_site
            .as_ref()
            .ok_or_else(|| CifError::MissingRecord("_atom_site loop".into()))?;

        let column = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| table.column(&format!("_atom_site.{}", name)))
        };
        let required = |name: &str| {
            table
                .column(&format!("_atom_site.{}", name.to_ascii_lowercase()))
                .ok_or_else(|| CifError::MissingColumn(format!("_atom_site.{}", name)))
        };

        let x_col = required("Cartn_x")?;
        let y_col = required("Cartn_y")?;
        let z_col = required("Cartn_z")?;
        let name_col = column(&["auth_atom_id", "label_atom_id"])
            .ok_or_else(|| CifError::MissingColumn("_atom_site.label_atom_id".into()))?;
        let group_col = column(&["group_pdb"]);
        let id_col = column(&["id"]);
        let element_col = column(&["type_symbol"]);
        let alt_col = column(&["label_alt_id"]);
        let comp_col = column(&["auth_comp_id", "label_comp_id"]);
        let chain_col = column(&["auth_asym_id", "label_asym_id"]);
        let seq_col = column(&["auth_seq_id", "label_seq_id"]);
        let icode_col = column(&["pdbx_pdb_ins_code"]);
        let occ_col = column(&["occupancy"]);
        let b_col = column(&["b_iso_or_equiv"]);
        let charge_col = column(&["pdbx_formal_charge"]);
        let model_col = column(&["pdbx_pdb_model_num"]);

        let get = |row: &[String], col: Option<usize>| -> Option<String> {
            col.map(|c| row[c].clone()).filter(|v| !is_missing(v))
        };

        let mut system = MolecularSystem::new();
        let mut first_model: Option<String> = None;
        let mut chosen_alt_loc: Option<String> = None;

        for row in table.rows() {
            if let Some(model) = get(row, model_col) {
                match &first_model {
                    None => first_model = Some(model),
                    Some(first) if *first != model => continue,
                    Some(_) => {}
                }
            }
            let alt_loc = get(row, alt_col);
            if let Some(alt) = &alt_loc {
                match &chosen_alt_loc {
                    None => chosen_alt_loc = Some(alt.clone()),
                    Some(chosen) if chosen != alt => continue,
                    Some(_) => {}
                }
            }

            let position = Point3::new(
                parse_number("_atom_site.Cartn_x", &row[x_col])?,
                parse_number("_atom_site.Cartn_y", &row[y_col])?,
                parse_number("_atom_site.Cartn_z", &row[z_col])?,
            );
            let name = row[name_col].clone();
            let mut atom = Atom::new(&name, Default::default(), position);
            atom.serial = match get(row, id_col) {
                Some(id) => parse_number("_atom_site.id", &id)?,
                None => system.atom_count() + 1,
            };
            atom.alt_loc = alt_loc.and_then(|a| a.chars().next()).unwrap_or(' ');
            atom.hetero = get(row, group_col).is_some_and(|g| g.eq_ignore_ascii_case("HETATM"));
            atom.element = match get(row, element_col) {
                Some(symbol) => symbol.to_ascii_uppercase(),
                None => element::infer_from_atom_name(&name),
            };
            if let Some(occ) = get(row, occ_col) {
                atom.occupancy = parse_number("_atom_site.occupancy", &occ)?;
            }
            if let Some(b) = get(row, b_col) {
                atom.b_factor = parse_number("_atom_site.B_iso_or_equiv", &b)?;
            }
            atom.charge = match get(row, charge_col) {
                Some(charge) => pdb_style_charge(&charge)?,
                None => String::new(),
            };

            let res_seq: isize = match get(row, seq_col) {
                Some(seq) => parse_number("_atom_site.auth_seq_id", &seq)?,
                None => 0,
            };
            let insertion_code = get(row, icode_col)
                .and_then(|c| c.chars().next())
                .unwrap_or(' ');
            let comp = get(row, comp_col).unwrap_or_else(|| "UNK".to_string());
            let chain = get(row, chain_col).unwrap_or_default();

            let chain_id = system.add_chain(&chain);
            let residue_id = system
                .add_residue(chain_id, res_seq, insertion_code, &comp)
                .ok_or_else(|| CifError::MissingRecord(format!("chain {}", chain)))?;
            system
                .add_atom_to_residue(residue_id, atom)
                .ok_or_else(|| CifError::MissingRecord(format!("residue {}", res_seq)))?;
        }

        if system.is_empty() {
            return Err(CifError::MissingRecord("_atom_site rows".into()));
        }
        system.set_crystal_symmetry(crystal_symmetry(&block.items));

        let metadata = CifMetadata {
            data_block: if block.name.is_empty() {
                CifMetadata::default().data_block
            } else {
                block.name
            },
        };
        Ok((system, metadata))
    }

    fn write_to(
        system: &MolecularSystem,
        metadata: &Self::Metadata,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        writeln!(writer, "data_{}", metadata.data_block)?;
        writeln!(writer, "#")?;
        if let Some(symmetry) = system.crystal_symmetry() {
            let [a, b, c, alpha, beta, gamma] = symmetry.unit_cell.parameters();
            writeln!(writer, "_cell.length_a {:.3}", a)?;
            writeln!(writer, "_cell.length_b {:.3}", b)?;
            writeln!(writer, "_cell.length_c {:.3}", c)?;
            writeln!(writer, "_cell.angle_alpha {:.2}", alpha)?;
            writeln!(writer, "_cell.angle_beta {:.2}", beta)?;
            writeln!(writer, "_cell.angle_gamma {:.2}", gamma)?;
            writeln!(
                writer,
                "_symmetry.space_group_name_H-M {}",
                quote_value(&symmetry.space_group)
            )?;
            writeln!(writer, "#")?;
        }

        writeln!(writer, "loop_")?;
        for tag in [
            "group_PDB",
            "id",
            "type_symbol",
            "label_atom_id",
            "label_alt_id",
            "label_comp_id",
            "label_asym_id",
            "label_seq_id",
            "pdbx_PDB_ins_code",
            "Cartn_x",
            "Cartn_y",
            "Cartn_z",
            "occupancy",
            "B_iso_or_equiv",
            "pdbx_PDB_model_num",
        ] {
            writeln!(writer, "_atom_site.{}", tag)?;
        }

        for (i, (atom_id, atom)) in system.atoms_iter().enumerate() {
            let (chain, residue) = system.atom_context(atom_id).ok_or_else(|| {
                CifError::MissingRecord(format!("residue of atom {}", atom.name.trim()))
            })?;
            writeln!(
                writer,
                "{} {} {} {} {} {} {} {} {} {:.3} {:.3} {:.3} {:.2} {:.2} 1",
                if atom.hetero { "HETATM" } else { "ATOM" },
                i + 1,
                quote_value(&atom.element),
                quote_value(atom.name.trim()),
                quote_value(atom.alt_loc.to_string().trim()),
                quote_value(&residue.name),
                if chain.id.is_empty() { "." } else { &chain.id },
                residue.id,
                if residue.insertion_code == ' ' {
                    "?".to_string()
                } else {
                    residue.insertion_code.to_string()
                },
                atom.position.x,
                atom.position.y,
                atom.position.z,
                atom.occupancy,
                atom.b_factor
            )?;
        }
        writeln!(writer, "#")?;
        Ok(())
    }

    fn write_system_to(
        system: &MolecularSystem,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        Self::write_to(system, &CifMetadata::default(), writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = r#"data_1ABC
#
_cell.length_a 40.000
_cell.length_b 41.000
_cell.length_c 42.000(5)
_cell.angle_alpha 90.00
_cell.angle_beta 90.00
_cell.angle_gamma 90.00
_symmetry.space_group_name_H-M 'P 1'
_struct.title
;Two-line title
with a 'quote'
;
loop_
_atom_site.group_PDB
_atom_site.id
_atom_site.type_symbol
_atom_site.label_atom_id
_atom_site.label_alt_id
_atom_site.label_comp_id
_atom_site.label_asym_id
_atom_site.label_seq_id
_atom_site.pdbx_PDB_ins_code
_atom_site.Cartn_x
_atom_site.Cartn_y
_atom_site.Cartn_z
_atom_site.occupancy
_atom_site.B_iso_or_equiv
_atom_site.pdbx_formal_charge
_atom_site.auth_seq_id
_atom_site.auth_asym_id
_atom_site.pdbx_PDB_model_num
ATOM   1 P "P"   . A   A 1 ? 1.000 2.000 3.000 1.00 30.00 ? 5 B 1
ATOM   2 C "C4'" . A   A 1 ? 2.000 2.000 3.000 1.00 31.00 ? 5 B 1
HETATM 3 MG MG   . MG  C . ? 9.000 9.000 9.000 1.00 40.00 2 101 B 1
ATOM   4 P "P"   . A   A 1 ? 7.000 7.000 7.000 1.00 30.00 ? 5 B 2
#
"#;

    #[test]
    fn reads_first_model_with_author_identifiers() {
        let (system, metadata) = CifFile::read_from(&mut Cursor::new(SAMPLE)).unwrap();

        assert_eq!(metadata.data_block, "1ABC");
        assert_eq!(system.atom_count(), 3);

        let chain_id = system.find_chain_by_id("B").unwrap();
        let residue = system.find_residue(chain_id, 5, ' ').unwrap();
        let residue = system.residue(residue).unwrap();
        assert_eq!(residue.name, "A");
        assert!(residue.get_atom_id_by_name("C4'").is_some());

        let atoms: Vec<_> = system.atoms_iter().map(|(_, a)| a.clone()).collect();
        assert_eq!(atoms[2].element, "MG");
        assert_eq!(atoms[2].charge, "2+");
        assert!(atoms[2].hetero);

        let cell = &system.crystal_symmetry().unwrap().unit_cell;
        assert_eq!(cell.parameters()[2], 42.0);
    }

    #[test]
    fn write_then_read_preserves_atoms() {
        let (system, _) = CifFile::read_from(&mut Cursor::new(SAMPLE)).unwrap();
        let mut out = Vec::new();
        CifFile::write_system_to(&system, &mut out).unwrap();

        let (again, metadata) = CifFile::read_from(&mut Cursor::new(out)).unwrap();
        assert_eq!(metadata.data_block, "cryofit");
        assert_eq!(again.sites_cart(), system.sites_cart());
        assert_eq!(again.crystal_symmetry(), system.crystal_symmetry());
        let names: Vec<_> = again.atoms_iter().map(|(_, a)| a.name.clone()).collect();
        assert_eq!(names, vec!["P", "C4'", "MG"]);
    }

    #[test]
    fn missing_coordinates_are_reported() {
        let text = "data_x\nloop_\n_atom_site.id\n_atom_site.label_atom_id\n1 CA\n";
        assert!(matches!(
            CifFile::read_from(&mut Cursor::new(text)),
            Err(CifError::MissingColumn(column)) if column == "_atom_site.Cartn_x"
        ));
    }

    #[test]
    fn syntax_errors_are_reported() {
        let unterminated = "data_x\n_struct.title 'open\n";
        assert!(matches!(
            CifFile::read_from(&mut Cursor::new(unterminated)),
            Err(CifError::Syntax { line: 2, .. })
        ));

        let ragged = "data_x\nloop_\n_atom_site.id\n_atom_site.Cartn_x\n1 2.0 3\n";
        assert!(matches!(
            CifFile::read_from(&mut Cursor::new(ragged)),
            Err(CifError::Syntax { .. })
        ));
    }

    #[test]
    fn bad_numbers_name_their_column() {
        let text = "data_x\nloop_\n_atom_site.label_atom_id\n_atom_site.Cartn_x\n_atom_site.Cartn_y\n_atom_site.Cartn_z\nCA 1.0 abc 3.0\n";
        assert!(matches!(
            CifFile::read_from(&mut Cursor::new(text)),
            Err(CifError::InvalidValue { column, .. }) if column == "_atom_site.Cartn_y"
        ));
    }

    #[test]
    fn quoting_protects_special_values() {
        assert_eq!(quote_value("CA"), "CA");
        assert_eq!(quote_value("C4'"), "C4'");
        assert_eq!(quote_value("P 21 21 21"), "\"P 21 21 21\"");
        assert_eq!(quote_value("_x"), "\"_x\"");
        assert_eq!(quote_value(""), ".");
    }
}
