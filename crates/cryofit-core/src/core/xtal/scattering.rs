use phf::phf_map;

/// Four-Gaussian X-ray form factor approximation (Cromer & Mann).
///
/// `f(s) = sum_i a_i * exp(-b_i * s^2) + c` with `s = sin(theta) / lambda`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormFactor {
    pub a: [f64; 4],
    pub b: [f64; 4],
    pub c: f64,
}

impl FormFactor {
    /// Form factor at `stol_sq = (sin(theta) / lambda)^2 = 1 / (4 d^2)`.
    #[inline]
    pub fn at_stol_sq(&self, stol_sq: f64) -> f64 {
        self.a
            .iter()
            .zip(&self.b)
            .map(|(a, b)| a * (-b * stol_sq).exp())
            .sum::<f64>()
            + self.c
    }
}

static FORM_FACTORS: phf::Map<&'static str, FormFactor> = phf_map! {
    "H" => FormFactor {
        a: [0.489918, 0.262003, 0.196767, 0.049879],
        b: [20.6593, 7.74039, 49.5519, 2.20159],
        c: 0.001305,
    },
    "C" => FormFactor {
        a: [2.31000, 1.02000, 1.58860, 0.865000],
        b: [20.8439, 10.2075, 0.568700, 51.6512],
        c: 0.215600,
    },
    "N" => FormFactor {
        a: [12.2126, 3.13220, 2.01250, 1.16630],
        b: [0.005700, 9.89330, 28.9975, 0.582600],
        c: -11.529,
    },
    "O" => FormFactor {
        a: [3.04850, 2.28680, 1.54630, 0.867000],
        b: [13.2771, 5.70110, 0.323900, 32.9089],
        c: 0.250800,
    },
    "NA" => FormFactor {
        a: [4.76260, 3.17360, 1.26740, 1.11280],
        b: [3.28500, 8.84220, 0.313600, 129.424],
        c: 0.676000,
    },
    "MG" => FormFactor {
        a: [5.42040, 2.17350, 1.22690, 2.30730],
        b: [2.82750, 79.2611, 0.380800, 7.19370],
        c: 0.858400,
    },
    "P" => FormFactor {
        a: [6.43450, 4.17910, 1.78000, 1.49080],
        b: [1.90670, 27.1570, 0.526000, 68.1645],
        c: 1.11490,
    },
    "S" => FormFactor {
        a: [6.90530, 5.20340, 1.43790, 1.58630],
        b: [1.46790, 22.2151, 0.253600, 56.1720],
        c: 0.866900,
    },
    "CL" => FormFactor {
        a: [11.4604, 7.19640, 6.25560, 1.64550],
        b: [0.010400, 1.16620, 18.5194, 47.7784],
        c: -9.5574,
    },
    "K" => FormFactor {
        a: [8.21860, 7.43980, 1.05190, 0.865900],
        b: [12.7949, 0.774800, 213.187, 41.6841],
        c: 1.42280,
    },
    "CA" => FormFactor {
        a: [8.62660, 7.38730, 1.58990, 1.02110],
        b: [10.4421, 0.659900, 85.7484, 178.437],
        c: 1.37510,
    },
    "FE" => FormFactor {
        a: [11.7695, 7.35730, 3.52220, 2.30450],
        b: [4.76110, 0.307200, 15.3535, 76.8805],
        c: 1.03690,
    },
    "ZN" => FormFactor {
        a: [14.0743, 7.03180, 5.16520, 2.41000],
        b: [3.26550, 0.233300, 10.3163, 58.7097],
        c: 1.30410,
    },
    "SE" => FormFactor {
        a: [17.0006, 5.81960, 3.97310, 4.35430],
        b: [2.40980, 0.272600, 15.2372, 43.8163],
        c: 2.84090,
    },
};

/// Looks up the form factor for an element symbol (case-insensitive).
///
/// Deuterium shares hydrogen's coefficients.
pub fn lookup(symbol: &str) -> Option<&'static FormFactor> {
    let key = symbol.trim().to_ascii_uppercase();
    let key = if key == "D" { "H".to_string() } else { key };
    FORM_FACTORS.get(key.as_str())
}

/// Like [`lookup`], but unknown elements scatter as carbon.
pub fn form_factor_or_carbon(symbol: &str) -> &'static FormFactor {
    lookup(symbol).unwrap_or(&FORM_FACTORS["C"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_scattering_equals_electron_count() {
        for (symbol, z) in [
            ("H", 1.0),
            ("C", 6.0),
            ("N", 7.0),
            ("O", 8.0),
            ("P", 15.0),
            ("S", 16.0),
            ("FE", 26.0),
            ("ZN", 30.0),
        ] {
            let f0 = lookup(symbol).unwrap().at_stol_sq(0.0);
            assert!((f0 - z).abs() < 0.02, "{}: f(0) = {}", symbol, f0);
        }
    }

    #[test]
    fn form_factors_decay_with_resolution() {
        let carbon = lookup("c").unwrap();
        let low = carbon.at_stol_sq(1.0 / (4.0 * 10.0 * 10.0));
        let high = carbon.at_stol_sq(1.0 / (4.0 * 2.0 * 2.0));
        assert!(high < low && low < 6.0);
    }

    #[test]
    fn deuterium_and_unknown_elements_fall_back() {
        assert_eq!(lookup("D"), lookup("H"));
        assert!(lookup("XX").is_none());
        assert_eq!(form_factor_or_carbon("XX"), lookup("C").unwrap());
    }
}
