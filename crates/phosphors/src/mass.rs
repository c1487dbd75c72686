use serde::{Deserialize, Serialize};

pub const H2O: f64 = 18.010565;
pub const PROTON: f64 = 1.00727646688;
pub const NH3: f64 = 17.026549;
pub const CO: f64 = 27.994915;
pub const H2: f64 = 2.01565;

#[derive(Copy, Clone, Serialize, Deserialize, Debug, PartialEq, PartialOrd)]
#[serde(rename_all = "lowercase")]
pub enum Tolerance {
    Ppm(f64, f64),
    Da(f64, f64),
}

impl Tolerance {
    /// Compute the (`lower`, `upper`) window (in Da) around an m/z for a
    /// given tolerance
    pub fn bounds(&self, center: f64) -> (f64, f64) {
        match self {
            Tolerance::Ppm(lo, hi) => {
                let delta_lo = center * lo / 1_000_000.0;
                let delta_hi = center * hi / 1_000_000.0;
                (center + delta_lo, center + delta_hi)
            }
            Tolerance::Da(lo, hi) => (center + lo, center + hi),
        }
    }

    /// Widest side of the tolerance window, in Da, at a reference m/z.
    ///
    /// This is the fragment accuracy `d` of the PhosphoRS model.
    pub fn accuracy_in_da(&self, reference_mz: f64) -> f64 {
        match self {
            Tolerance::Ppm(lo, hi) => Self::ppm_to_delta_mass(reference_mz, lo.abs().max(hi.abs())),
            Tolerance::Da(lo, hi) => lo.abs().max(hi.abs()),
        }
    }

    pub fn ppm_to_delta_mass(center: f64, ppm: f64) -> f64 {
        ppm * center / 1_000_000.0
    }
}

pub trait Mass {
    fn monoisotopic(&self) -> f64;
}

pub const VALID_AA: [u8; 22] = [
    b'A', b'C', b'D', b'E', b'F', b'G', b'H', b'I', b'K', b'L', b'M', b'N', b'P', b'Q', b'R', b'S',
    b'T', b'V', b'W', b'Y', b'U', b'O',
];

impl Mass for u8 {
    fn monoisotopic(&self) -> f64 {
        match self {
            b'A' => 71.03711,
            b'R' => 156.1011,
            b'N' => 114.04293,
            b'D' => 115.02694,
            b'C' => 103.00919,
            b'E' => 129.04259,
            b'Q' => 128.05858,
            b'G' => 57.02146,
            b'H' => 137.05891,
            b'I' => 113.08406,
            b'L' => 113.08406,
            b'K' => 128.09496,
            b'M' => 131.0405,
            b'F' => 147.0684,
            b'P' => 97.05276,
            b'S' => 87.03203,
            b'T' => 101.04768,
            b'W' => 186.07931,
            b'Y' => 163.06333,
            b'V' => 99.06841,
            b'U' => 150.95363,
            b'O' => 237.14773,
            _ => unreachable!("BUG: invalid amino acid {}", *self as char),
        }
    }
}
