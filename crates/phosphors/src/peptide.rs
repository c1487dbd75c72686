use serde::{Deserialize, Serialize};

use crate::{
    mass::{Mass, H2O, VALID_AA},
    modification::{ModificationMatch, ModificationSpecificity, PtmDefinition},
    Error,
};

/// Where a peptide sits within its parent protein
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Nterm,
    Cterm,
    Full,
    Internal,
}

impl Default for Position {
    fn default() -> Self {
        Self::Internal
    }
}

impl Position {
    pub fn protein_n_terminal(&self) -> bool {
        matches!(self, Position::Nterm | Position::Full)
    }

    pub fn protein_c_terminal(&self) -> bool {
        matches!(self, Position::Cterm | Position::Full)
    }
}

/// How residues are compared when looking for modification sites
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidueMatching {
    Exact,
    /// Isoleucine and leucine are isobaric and considered the same residue
    IndistinguishableIl,
}

impl Default for ResidueMatching {
    fn default() -> Self {
        Self::Exact
    }
}

impl ResidueMatching {
    pub fn matches(&self, residue: u8, target: u8) -> bool {
        match self {
            ResidueMatching::Exact => residue == target,
            ResidueMatching::IndistinguishableIl => {
                residue == target || (is_il(residue) && is_il(target))
            }
        }
    }
}

fn is_il(residue: u8) -> bool {
    residue == b'I' || residue == b'L'
}

/// A peptide as read from input, before its sequence and sites are checked
#[derive(Deserialize)]
pub struct UncheckedPeptide {
    pub sequence: String,
    #[serde(default)]
    pub modifications: Vec<ModificationMatch>,
    #[serde(default)]
    pub position: Position,
}

/// A peptide with its modification placements. Site indices of the
/// placements are 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedPeptide")]
pub struct Peptide {
    pub sequence: String,
    pub modifications: Vec<ModificationMatch>,
    pub position: Position,
}

impl TryFrom<UncheckedPeptide> for Peptide {
    type Error = Error;

    fn try_from(value: UncheckedPeptide) -> Result<Self, Self::Error> {
        let mut peptide = Peptide::try_from(value.sequence.as_str())?;
        peptide.position = value.position;
        peptide.modifications = value.modifications;
        peptide.check_sites()?;
        Ok(peptide)
    }
}

impl TryFrom<&str> for Peptide {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err(Error::InvalidInput("empty peptide sequence".into()));
        }
        if let Some(c) = value.bytes().find(|c| !VALID_AA.contains(c)) {
            return Err(Error::InvalidInput(format!(
                "invalid amino acid `{}` in {}",
                c as char, value
            )));
        }
        Ok(Peptide {
            sequence: value.into(),
            modifications: Vec::new(),
            position: Position::default(),
        })
    }
}

impl Peptide {
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Every placement must sit on a residue, 1..=len
    pub fn check_sites(&self) -> Result<(), Error> {
        match self
            .modifications
            .iter()
            .find(|m| m.site == 0 || m.site > self.len())
        {
            Some(m) => Err(Error::InvalidInput(format!(
                "modification {} placed at site {} of {}",
                m.name, m.site, self.sequence
            ))),
            None => Ok(()),
        }
    }

    /// A copy of this peptide carrying one more modification. The site is
    /// not checked, see [`Peptide::check_sites`].
    pub fn with_modification(&self, modification: ModificationMatch) -> Peptide {
        let mut peptide = self.clone();
        peptide.modifications.push(modification);
        peptide
    }

    /// A copy of this peptide where every variable placement of one of the
    /// given PTMs has been removed. Fixed modifications are kept.
    pub fn without_variable(&self, ptms: &[PtmDefinition]) -> Peptide {
        Peptide {
            sequence: self.sequence.clone(),
            modifications: self
                .modifications
                .iter()
                .filter(|m| !(m.variable && ptms.iter().any(|ptm| ptm.name == m.name)))
                .cloned()
                .collect(),
            position: self.position,
        }
    }

    /// Number of variable placements of one of the given PTMs
    pub fn count_variable(&self, ptms: &[PtmDefinition]) -> usize {
        self.modifications
            .iter()
            .filter(|m| m.variable && ptms.iter().any(|ptm| ptm.name == m.name))
            .count()
    }

    /// Residue masses including modification mass shifts, in sequence order.
    /// Placements outside of the sequence are ignored.
    pub fn residue_masses(&self) -> Vec<f64> {
        let mut masses = self
            .sequence
            .as_bytes()
            .iter()
            .map(Mass::monoisotopic)
            .collect::<Vec<_>>();
        for m in &self.modifications {
            if let Some(mass) = m.site.checked_sub(1).and_then(|ix| masses.get_mut(ix)) {
                *mass += m.mass;
            }
        }
        masses
    }

    /// Neutral monoisotopic mass
    pub fn monoisotopic(&self) -> f64 {
        self.residue_masses().iter().sum::<f64>() + H2O
    }

    /// 1-based residues where `ptm` could be placed on this peptide
    pub fn potential_sites(&self, ptm: &PtmDefinition, matching: ResidueMatching) -> Vec<usize> {
        let seq = self.sequence.as_bytes();
        let residue_ok = |ix: usize, target: Option<u8>| {
            target.map_or(true, |target| matching.matches(seq[ix - 1], target))
        };
        let len = self.len();
        match ptm.specificity {
            ModificationSpecificity::PeptideN(r) if residue_ok(1, r) => vec![1],
            ModificationSpecificity::PeptideC(r) if residue_ok(len, r) => vec![len],
            ModificationSpecificity::ProteinN(r)
                if self.position.protein_n_terminal() && residue_ok(1, r) =>
            {
                vec![1]
            }
            ModificationSpecificity::ProteinC(r)
                if self.position.protein_c_terminal() && residue_ok(len, r) =>
            {
                vec![len]
            }
            ModificationSpecificity::Residue(r) => (1..=len)
                .filter(|&ix| matching.matches(seq[ix - 1], r))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Potential modification site lookup.
///
/// Protein-level specificities may require a sequence index, so lookups are
/// fallible.
pub trait SiteLocator: Send + Sync {
    fn potential_sites(&self, peptide: &Peptide, ptm: &PtmDefinition) -> Result<Vec<usize>, Error>;
}

/// Locates sites from the peptide sequence and its protein position alone
#[derive(Copy, Clone, Debug, Default)]
pub struct SequenceSites {
    pub matching: ResidueMatching,
}

impl SiteLocator for SequenceSites {
    fn potential_sites(&self, peptide: &Peptide, ptm: &PtmDefinition) -> Result<Vec<usize>, Error> {
        Ok(peptide.potential_sites(ptm, self.matching))
    }
}

impl std::fmt::Display for Peptide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (idx, residue) in self.sequence.chars().enumerate() {
            write!(f, "{}", residue)?;
            for m in self.modifications.iter().filter(|m| m.site == idx + 1) {
                if m.mass.is_sign_positive() {
                    write!(f, "[+{}]", m.mass)?;
                } else {
                    write!(f, "[{}]", m.mass)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn phospho(residue: u8) -> PtmDefinition {
        PtmDefinition::new(
            format!("Phosphorylation of {}", residue as char),
            79.966331,
            ModificationSpecificity::Residue(residue),
        )
    }

    #[test]
    fn invalid_sequences() {
        assert!(Peptide::try_from("PEPTIDE").is_ok());
        assert!(matches!(
            Peptide::try_from("PEPTIDEB"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(Peptide::try_from(""), Err(Error::InvalidInput(_))));

        let json = r#"{"sequence":"PEPTIDE","modifications":[{"name":"Ox","mass":16.0,"variable":true,"site":8}]}"#;
        assert!(serde_json::from_str::<Peptide>(json).is_err());
    }

    #[test]
    fn placements_off_the_sequence() {
        let ox = PtmDefinition::new("Ox", 16.0, ModificationSpecificity::Residue(b'P'));
        let peptide = Peptide::try_from("PEPTIDE").unwrap();
        assert!(peptide.check_sites().is_ok());

        for site in [0, 8] {
            let bad = peptide.with_modification(ModificationMatch::variable(&ox, site));
            assert!(matches!(bad.check_sites(), Err(Error::InvalidInput(_))));
            // Ignored rather than indexed
            assert_eq!(bad.residue_masses(), peptide.residue_masses());
        }
    }

    #[test]
    fn demodify_and_count() {
        let s = phospho(b'S');
        let t = phospho(b'T');
        let carbamidomethyl =
            PtmDefinition::new("Carbamidomethyl", 57.021464, ModificationSpecificity::Residue(b'C'));

        let peptide = Peptide::try_from("SCTSK").unwrap();
        let peptide = peptide
            .with_modification(ModificationMatch::variable(&s, 1))
            .with_modification(ModificationMatch::fixed(&carbamidomethyl, 2))
            .with_modification(ModificationMatch::variable(&t, 3));

        assert_eq!(peptide.count_variable(&[s.clone(), t.clone()]), 2);
        assert_eq!(peptide.count_variable(&[s.clone()]), 1);
        assert_eq!(peptide.count_variable(&[carbamidomethyl.clone()]), 0);

        let bare = peptide.without_variable(&[s.clone(), t]);
        assert_eq!(bare.modifications.len(), 1);
        assert_eq!(bare.modifications[0].name, "Carbamidomethyl");
        // The source peptide is untouched
        assert_eq!(peptide.modifications.len(), 3);
        assert_eq!(bare.to_string(), "SC[+57.021464]TSK");
    }

    #[test]
    fn masses() {
        let peptide = Peptide::try_from("PEPTIDE").unwrap();
        assert!((peptide.monoisotopic() - 799.35997).abs() < 0.001);

        let ox = PtmDefinition::new("Oxidation", 15.994915, ModificationSpecificity::Residue(b'P'));
        let modified = peptide.with_modification(ModificationMatch::variable(&ox, 3));
        let masses = modified.residue_masses();
        assert!((masses[2] - (97.05276 + 15.994915)).abs() < 1e-9);
        assert!((masses[0] - 97.05276).abs() < 1e-9);
    }

    #[test]
    fn residue_sites() {
        let peptide = Peptide::try_from("ASLTSYK").unwrap();
        assert_eq!(peptide.potential_sites(&phospho(b'S'), ResidueMatching::Exact), vec![2, 5]);
        assert_eq!(peptide.potential_sites(&phospho(b'Y'), ResidueMatching::Exact), vec![6]);

        let on_i = PtmDefinition::new("x", 1.0, ModificationSpecificity::Residue(b'I'));
        assert!(peptide.potential_sites(&on_i, ResidueMatching::Exact).is_empty());
        assert_eq!(
            peptide.potential_sites(&on_i, ResidueMatching::IndistinguishableIl),
            vec![3]
        );
    }

    #[test]
    fn terminal_sites() {
        let mut peptide = Peptide::try_from("MSEK").unwrap();
        let pep_n = PtmDefinition::new("n", 1.0, ModificationSpecificity::PeptideN(None));
        let pep_n_q = PtmDefinition::new("q", 1.0, ModificationSpecificity::PeptideN(Some(b'Q')));
        let pep_c_k = PtmDefinition::new("k", 1.0, ModificationSpecificity::PeptideC(Some(b'K')));
        let prot_n = PtmDefinition::new("ac", 42.0, ModificationSpecificity::ProteinN(Some(b'M')));

        assert_eq!(peptide.potential_sites(&pep_n, ResidueMatching::Exact), vec![1]);
        assert!(peptide.potential_sites(&pep_n_q, ResidueMatching::Exact).is_empty());
        assert_eq!(peptide.potential_sites(&pep_c_k, ResidueMatching::Exact), vec![4]);
        assert!(peptide.potential_sites(&prot_n, ResidueMatching::Exact).is_empty());

        peptide.position = Position::Nterm;
        assert_eq!(
            SequenceSites::default().potential_sites(&peptide, &prot_n).unwrap(),
            vec![1]
        );
    }
}
