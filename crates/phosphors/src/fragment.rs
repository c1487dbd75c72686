use std::ops::Range;

use fnv::{FnvHashMap, FnvHashSet};
use serde::{Deserialize, Serialize};

use crate::ion_series::{IonSeries, Kind};
use crate::mass::{Tolerance, CO, PROTON};
use crate::peptide::Peptide;
use crate::Error;

/// Fragment ion families that can be predicted for a peptide
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum IonType {
    Backbone(Kind),
    Precursor,
    Immonium,
}

impl IonType {
    pub fn is_backbone(&self) -> bool {
        matches!(self, IonType::Backbone(_))
    }
}

impl TryFrom<String> for IonType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "a" => Ok(IonType::Backbone(Kind::A)),
            "b" => Ok(IonType::Backbone(Kind::B)),
            "c" => Ok(IonType::Backbone(Kind::C)),
            "x" => Ok(IonType::Backbone(Kind::X)),
            "y" => Ok(IonType::Backbone(Kind::Y)),
            "z" => Ok(IonType::Backbone(Kind::Z)),
            "precursor" => Ok(IonType::Precursor),
            "immonium" => Ok(IonType::Immonium),
            _ => Err(format!("unknown ion type `{}`", value)),
        }
    }
}

impl From<IonType> for String {
    fn from(value: IonType) -> Self {
        match value {
            IonType::Backbone(kind) => match kind {
                Kind::A => "a",
                Kind::B => "b",
                Kind::C => "c",
                Kind::X => "x",
                Kind::Y => "y",
                Kind::Z => "z",
            }
            .into(),
            IonType::Precursor => "precursor".into(),
            IonType::Immonium => "immonium".into(),
        }
    }
}

/// A neutral loss, e.g. H3PO4 from phosphorylated serine.
///
/// The loss is considered for fragments holding one of `residues` or one of
/// the named `modifications`. Without any trigger it applies to every fragment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NeutralLoss {
    pub name: String,
    pub mass: f64,
    #[serde(default)]
    pub residues: String,
    #[serde(default)]
    pub modifications: Vec<String>,
}

impl NeutralLoss {
    pub fn new<S: Into<String>>(name: S, mass: f64) -> Self {
        Self {
            name: name.into(),
            mass,
            residues: String::new(),
            modifications: Vec::new(),
        }
    }

    /// Does the loss apply to the fragment spanning `residues` (0-based,
    /// half-open) of `peptide`?
    pub fn applies(&self, peptide: &Peptide, residues: Range<usize>) -> bool {
        if self.residues.is_empty() && self.modifications.is_empty() {
            return true;
        }
        let seq = peptide.sequence.as_bytes();
        seq[residues.clone()]
            .iter()
            .any(|r| self.residues.as_bytes().contains(r))
            || peptide.modifications.iter().any(|m| {
                m.site
                    .checked_sub(1)
                    .map_or(false, |ix| residues.contains(&ix))
                    && self.modifications.contains(&m.name)
            })
    }
}

/// Which theoretical fragments to predict and how to match them
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotationSettings {
    pub ion_types: Vec<IonType>,
    pub charges: Vec<u8>,
    pub neutral_losses: Vec<NeutralLoss>,
    pub fragment_tol: Tolerance,
}

impl Default for AnnotationSettings {
    fn default() -> Self {
        Self {
            ion_types: vec![IonType::Backbone(Kind::B), IonType::Backbone(Kind::Y)],
            charges: vec![1],
            neutral_losses: Vec::new(),
            fragment_tol: Tolerance::Da(-0.5, 0.5),
        }
    }
}

/// A charged theoretical fragment
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FragmentIon {
    pub ion_type: IonType,
    /// Number of residues the fragment contains. Immonium ions carry the
    /// 1-based position of their residue.
    pub number: usize,
    pub charge: u8,
    /// Index into [`AnnotationSettings::neutral_losses`]
    pub loss: Option<usize>,
    pub mz: f64,
}

/// Theoretical fragments of one peptide
#[derive(Clone, Debug, Default)]
pub struct FragmentIonSet {
    ions: Vec<FragmentIon>,
    index: FnvHashMap<(IonType, usize, u8), Vec<usize>>,
}

impl FragmentIonSet {
    pub fn new(ions: Vec<FragmentIon>) -> Self {
        let mut index: FnvHashMap<_, Vec<usize>> = FnvHashMap::default();
        for (ix, ion) in ions.iter().enumerate() {
            index
                .entry((ion.ion_type, ion.number, ion.charge))
                .or_default()
                .push(ix);
        }
        Self { ions, index }
    }

    /// Number of expected ions, counted over every ion type, charge and loss
    pub fn len(&self) -> usize {
        self.ions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FragmentIon> {
        self.ions.iter()
    }

    pub fn backbone(&self) -> impl Iterator<Item = &FragmentIon> {
        self.ions.iter().filter(|ion| ion.ion_type.is_backbone())
    }

    /// All ions (with and without neutral losses) of one series position and charge
    pub fn get(&self, ion_type: IonType, number: usize, charge: u8) -> Vec<&FragmentIon> {
        self.index
            .get(&(ion_type, number, charge))
            .map(|ixs| ixs.iter().map(|&ix| &self.ions[ix]).collect())
            .unwrap_or_default()
    }
}

/// Theoretical fragmentation of a peptide
pub trait Fragmenter: Send + Sync {
    fn fragment(
        &self,
        peptide: &Peptide,
        settings: &AnnotationSettings,
    ) -> Result<FragmentIonSet, Error>;
}

/// Predicts backbone ladders, precursor and immonium ions from residue masses
#[derive(Copy, Clone, Debug, Default)]
pub struct BackboneFragmenter;

fn push_charged(
    ions: &mut Vec<FragmentIon>,
    ion_type: IonType,
    number: usize,
    mass: f64,
    charges: &[u8],
    losses: &[(usize, f64)],
) {
    for &charge in charges {
        let z = charge as f64;
        ions.push(FragmentIon {
            ion_type,
            number,
            charge,
            loss: None,
            mz: (mass + z * PROTON) / z,
        });
        for &(ix, loss) in losses {
            ions.push(FragmentIon {
                ion_type,
                number,
                charge,
                loss: Some(ix),
                mz: (mass - loss + z * PROTON) / z,
            });
        }
    }
}

impl Fragmenter for BackboneFragmenter {
    fn fragment(
        &self,
        peptide: &Peptide,
        settings: &AnnotationSettings,
    ) -> Result<FragmentIonSet, Error> {
        let len = peptide.len();
        let losses = |residues: Range<usize>| {
            settings
                .neutral_losses
                .iter()
                .enumerate()
                .filter(|(_, loss)| loss.applies(peptide, residues.clone()))
                .map(|(ix, loss)| (ix, loss.mass))
                .collect::<Vec<_>>()
        };

        let mut ions = Vec::new();
        for &ion_type in &settings.ion_types {
            match ion_type {
                IonType::Backbone(kind) => {
                    for ion in IonSeries::new(peptide, kind) {
                        let span = if kind.n_terminal() {
                            0..ion.number
                        } else {
                            len - ion.number..len
                        };
                        push_charged(
                            &mut ions,
                            ion_type,
                            ion.number,
                            ion.monoisotopic_mass,
                            &settings.charges,
                            &losses(span),
                        );
                    }
                }
                IonType::Precursor => push_charged(
                    &mut ions,
                    ion_type,
                    len,
                    peptide.monoisotopic(),
                    &settings.charges,
                    &losses(0..len),
                ),
                IonType::Immonium => {
                    // One singly charged ion per distinct (modified) residue
                    let mut seen = FnvHashSet::default();
                    let masses = peptide.residue_masses();
                    for (ix, (&residue, mass)) in
                        peptide.sequence.as_bytes().iter().zip(masses).enumerate()
                    {
                        if seen.insert((residue, mass.to_bits())) {
                            push_charged(&mut ions, ion_type, ix + 1, mass - CO, &[1], &[]);
                        }
                    }
                }
            }
        }
        Ok(FragmentIonSet::new(ions))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::modification::{ModificationMatch, ModificationSpecificity, PtmDefinition};

    fn phospho() -> PtmDefinition {
        PtmDefinition::new("Phospho", 79.966331, ModificationSpecificity::Residue(b'S'))
    }

    #[test]
    fn ion_type_names() {
        let types: Vec<IonType> = serde_json::from_str(r#"["b", "Y", "immonium"]"#).unwrap();
        assert_eq!(
            types,
            vec![
                IonType::Backbone(Kind::B),
                IonType::Backbone(Kind::Y),
                IonType::Immonium
            ]
        );
        assert_eq!(serde_json::to_string(&types[1]).unwrap(), "\"y\"");
        assert!(serde_json::from_str::<IonType>("\"w\"").is_err());
    }

    #[test]
    fn backbone_counts() {
        let peptide = Peptide::try_from("PEPTIDE").unwrap();
        let settings = AnnotationSettings {
            charges: vec![1, 2],
            ..Default::default()
        };
        let ions = BackboneFragmenter.fragment(&peptide, &settings).unwrap();
        // 2 series * 6 positions * 2 charges
        assert_eq!(ions.len(), 24);
        assert_eq!(ions.backbone().count(), 24);

        let b2 = ions.get(IonType::Backbone(Kind::B), 2, 1);
        assert_eq!(b2.len(), 1);
        assert!((b2[0].mz - 227.1026).abs() < 0.001);
        let y1 = ions.get(IonType::Backbone(Kind::Y), 1, 2);
        assert!((y1[0].mz - 74.53385).abs() < 0.001);
        assert!(ions.get(IonType::Backbone(Kind::Y), 7, 1).is_empty());
    }

    #[test]
    fn neutral_loss_triggers() {
        let peptide = Peptide::try_from("ASAGTAR")
            .unwrap()
            .with_modification(ModificationMatch::variable(&phospho(), 2));
        let mut h3po4 = NeutralLoss::new("H3PO4", 97.976896);
        h3po4.modifications.push("Phospho".into());
        let h2o = NeutralLoss {
            residues: "DE".into(),
            ..NeutralLoss::new("H2O", 18.010565)
        };

        assert!(h3po4.applies(&peptide, 0..2));
        assert!(!h3po4.applies(&peptide, 2..7));
        assert!(!h2o.applies(&peptide, 0..7));
        assert!(NeutralLoss::new("NH3", 17.026549).applies(&peptide, 3..4));
        let off_sequence = peptide.with_modification(ModificationMatch::variable(&phospho(), 0));
        assert!(!h3po4.applies(&off_sequence, 2..7));
        assert!(h3po4.applies(&off_sequence, 0..2));

        let settings = AnnotationSettings {
            ion_types: vec![IonType::Backbone(Kind::B)],
            neutral_losses: vec![h3po4],
            ..Default::default()
        };
        let ions = BackboneFragmenter.fragment(&peptide, &settings).unwrap();
        // b1 has no phosphosite, b2..b6 carry one loss each
        assert_eq!(ions.len(), 6 + 5);
        assert_eq!(ions.get(IonType::Backbone(Kind::B), 1, 1).len(), 1);
        let b2 = ions.get(IonType::Backbone(Kind::B), 2, 1);
        assert_eq!(b2.len(), 2);
        assert!((b2[0].mz - b2[1].mz - 97.976896).abs() < 1e-6);
        assert_eq!(b2[1].loss, Some(0));
    }

    #[test]
    fn precursor_and_immonium() {
        let peptide = Peptide::try_from("SASK")
            .unwrap()
            .with_modification(ModificationMatch::variable(&phospho(), 3));
        let settings = AnnotationSettings {
            ion_types: vec![IonType::Precursor, IonType::Immonium],
            ..Default::default()
        };
        let ions = BackboneFragmenter.fragment(&peptide, &settings).unwrap();
        assert_eq!(ions.backbone().count(), 0);

        let precursor = ions.get(IonType::Precursor, 4, 1);
        assert!((precursor[0].mz - (peptide.monoisotopic() + PROTON)).abs() < 1e-9);

        // S, A, phospho-S and K
        let immonium = ions
            .iter()
            .filter(|ion| ion.ion_type == IonType::Immonium)
            .collect::<Vec<_>>();
        assert_eq!(immonium.len(), 4);
        assert!((immonium[0].mz - 60.04439).abs() < 0.001);
    }
}
