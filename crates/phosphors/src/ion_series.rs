use serde::{Deserialize, Serialize};

use crate::mass::{CO, H2, H2O, NH3};
use crate::peptide::Peptide;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    A,
    B,
    C,
    X,
    Y,
    Z,
}

impl Kind {
    /// Does this ion series retain the peptide N-terminus?
    pub fn n_terminal(&self) -> bool {
        matches!(self, Kind::A | Kind::B | Kind::C)
    }

    /// Mass offset of the series relative to the summed residue masses
    fn offset(&self) -> f64 {
        match self {
            Kind::A => -CO,
            Kind::B => 0.0,
            Kind::C => NH3,
            Kind::X => H2O + CO - H2,
            Kind::Y => H2O,
            Kind::Z => H2O - NH3,
        }
    }
}

/// Theoretical backbone ion
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Ion {
    pub kind: Kind,
    /// Fragment number, i.e. the number of residues the fragment contains
    pub number: usize,
    /// Neutral fragment mass (no charge)
    pub monoisotopic_mass: f64,
}

/// Generate one backbone ion ladder for a peptide.
///
/// N-terminal series accumulate residues from the N-terminus, C-terminal
/// series from the C-terminus, so fragments sharing all of their residues
/// have bit-identical masses.
pub struct IonSeries {
    pub kind: Kind,
    cumulative_mass: f64,
    residues: Vec<f64>,
    idx: usize,
}

impl IonSeries {
    /// Create a new [`IonSeries`] iterator for a specified peptide
    pub fn new(peptide: &Peptide, kind: Kind) -> Self {
        let mut residues = peptide.residue_masses();
        if !kind.n_terminal() {
            residues.reverse();
        }
        Self {
            kind,
            cumulative_mass: 0.0,
            residues,
            idx: 0,
        }
    }
}

impl Iterator for IonSeries {
    type Item = Ion;

    fn next(&mut self) -> Option<Self::Item> {
        // A fragment never holds the complete sequence
        if self.idx + 1 >= self.residues.len() {
            return None;
        }
        self.cumulative_mass += self.residues[self.idx];
        self.idx += 1;

        Some(Ion {
            kind: self.kind,
            number: self.idx,
            monoisotopic_mass: self.cumulative_mass + self.kind.offset(),
        })
    }
}
