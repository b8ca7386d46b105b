use phf::phf_map;

/// Static physical properties of a chemical element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementData {
    /// Standard atomic weight in daltons.
    pub mass: f64,
    /// Single-bond covalent radius in Angstroms.
    pub covalent_radius: f64,
}

static ELEMENTS: phf::Map<&'static str, ElementData> = phf_map! {
    "H" => ElementData { mass: 1.008, covalent_radius: 0.31 },
    "D" => ElementData { mass: 2.014, covalent_radius: 0.31 },
    "C" => ElementData { mass: 12.011, covalent_radius: 0.76 },
    "N" => ElementData { mass: 14.007, covalent_radius: 0.71 },
    "O" => ElementData { mass: 15.999, covalent_radius: 0.66 },
    "F" => ElementData { mass: 18.998, covalent_radius: 0.57 },
    "NA" => ElementData { mass: 22.990, covalent_radius: 1.66 },
    "MG" => ElementData { mass: 24.305, covalent_radius: 1.41 },
    "P" => ElementData { mass: 30.974, covalent_radius: 1.07 },
    "S" => ElementData { mass: 32.06, covalent_radius: 1.05 },
    "CL" => ElementData { mass: 35.45, covalent_radius: 1.02 },
    "K" => ElementData { mass: 39.098, covalent_radius: 2.03 },
    "CA" => ElementData { mass: 40.078, covalent_radius: 1.76 },
    "MN" => ElementData { mass: 54.938, covalent_radius: 1.39 },
    "FE" => ElementData { mass: 55.845, covalent_radius: 1.32 },
    "CO" => ElementData { mass: 58.933, covalent_radius: 1.26 },
    "NI" => ElementData { mass: 58.693, covalent_radius: 1.24 },
    "CU" => ElementData { mass: 63.546, covalent_radius: 1.32 },
    "ZN" => ElementData { mass: 65.38, covalent_radius: 1.22 },
    "SE" => ElementData { mass: 78.971, covalent_radius: 1.20 },
    "BR" => ElementData { mass: 79.904, covalent_radius: 1.20 },
    "I" => ElementData { mass: 126.904, covalent_radius: 1.39 },
};

/// Looks up element data by symbol (case-insensitive).
pub fn lookup(symbol: &str) -> Option<&'static ElementData> {
    ELEMENTS.get(symbol.trim().to_ascii_uppercase().as_str())
}

/// Returns `true` for hydrogen and deuterium.
pub fn is_hydrogen(symbol: &str) -> bool {
    matches!(symbol.trim().to_ascii_uppercase().as_str(), "H" | "D")
}

/// Infers an element symbol from a PDB-style atom name.
///
/// The PDB convention right-justifies one-letter element symbols in columns
/// 13-14, so a four-character name starting with a letter (e.g. `FE1 `) may
/// carry a two-letter symbol while ` CA ` is a carbon. Leading digits are
/// hydrogen counters (`1HB2`).
pub fn infer_from_atom_name(raw_name: &str) -> String {
    let padded = format!("{:<4}", raw_name);
    let head: Vec<char> = padded.chars().take(2).collect();

    if head[0].is_ascii_alphabetic() && head[1].is_ascii_alphabetic() && raw_name.len() == 4 {
        let candidate: String = head.iter().collect::<String>().to_ascii_uppercase();
        if lookup(&candidate).is_some() {
            return candidate;
        }
    }

    raw_name
        .trim()
        .chars()
        .find(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase().to_string())
        .unwrap_or_else(|| "C".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(lookup("fe").unwrap().mass, 55.845);
        assert_eq!(lookup(" C ").unwrap().covalent_radius, 0.76);
        assert!(lookup("Xx").is_none());
    }

    #[test]
    fn infers_common_protein_elements() {
        assert_eq!(infer_from_atom_name(" CA "), "C");
        assert_eq!(infer_from_atom_name(" N  "), "N");
        assert_eq!(infer_from_atom_name("1HB2"), "H");
        assert_eq!(infer_from_atom_name(" OG1"), "O");
    }

    #[test]
    fn infers_two_letter_metals_from_full_width_names() {
        assert_eq!(infer_from_atom_name("FE  "), "FE");
        assert_eq!(infer_from_atom_name("ZN  "), "ZN");
        assert_eq!(infer_from_atom_name("CA  "), "CA");
    }

    #[test]
    fn hydrogen_detection() {
        assert!(is_hydrogen("H"));
        assert!(is_hydrogen("d"));
        assert!(!is_hydrogen("HG"));
    }
}
