use serde::{Deserialize, Serialize};

use crate::fragment::{AnnotationSettings, IonType, NeutralLoss};
use crate::ion_series::Kind;
use crate::mass::Tolerance;
use crate::peptide::ResidueMatching;
use crate::window::{Windowing, MAX_DEPTH, MIN_DEPTH, WINDOW_SIZE};

/// Localization parameters as read from a configuration file. Every field
/// is optional.
#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct Builder {
    /// Width of a spectrum window, in m/z
    pub window_size: Option<f64>,
    /// Lowest number of peaks retained from a window holding site-determining ions
    pub min_depth: Option<usize>,
    /// Highest number of peaks retained from any window
    pub max_depth: Option<usize>,
    /// Number of distinct match probabilities whose distributions are cached
    pub cache_size: Option<usize>,
    /// Which kind of fragment ions to generate (a, b, c, x, y, z, precursor, immonium)
    pub ion_types: Option<Vec<IonType>>,
    /// Fragment charges to consider
    pub charges: Option<Vec<u8>>,
    pub neutral_losses: Option<Vec<NeutralLoss>>,
    /// Consider neutral losses when scoring
    pub account_neutral_losses: Option<bool>,
    pub fragment_tol: Option<Tolerance>,
    pub residue_matching: Option<ResidueMatching>,
}

impl Builder {
    pub fn make_parameters(self) -> Parameters {
        let window_size = match self.window_size {
            Some(w) if w > 0.0 && w.is_finite() => w,
            Some(w) => {
                log::warn!("window_size must be positive, got {}; using {}", w, WINDOW_SIZE);
                WINDOW_SIZE
            }
            None => WINDOW_SIZE,
        };
        let max_depth = self.max_depth.unwrap_or(MAX_DEPTH).max(1);
        let min_depth = self.min_depth.unwrap_or(MIN_DEPTH).clamp(1, max_depth);

        let fragment_tol = self.fragment_tol.unwrap_or(Tolerance::Da(-0.5, 0.5));
        match fragment_tol {
            Tolerance::Da(lo, hi) if lo > 0.0 || hi < 0.0 || hi - lo > 2.0 => {
                log::warn!("fragment_tol of {:?} Da is unusual", (lo, hi))
            }
            Tolerance::Ppm(lo, hi) if lo > 0.0 || hi < 0.0 || hi - lo > 100.0 => {
                log::warn!("fragment_tol of {:?} ppm is unusual", (lo, hi))
            }
            _ => {}
        }

        let mut charges = self.charges.unwrap_or_else(|| vec![1]);
        charges.retain(|&z| z > 0);
        charges.sort_unstable();
        charges.dedup();
        if charges.is_empty() {
            log::warn!("no valid fragment charge given, using 1+");
            charges.push(1);
        }

        let mut ion_types = self
            .ion_types
            .unwrap_or_else(|| vec![IonType::Backbone(Kind::B), IonType::Backbone(Kind::Y)]);
        ion_types.sort_unstable();
        ion_types.dedup();
        if !ion_types.iter().any(IonType::is_backbone) {
            log::warn!("no backbone ion type selected: every profile will score alike");
        }

        Parameters {
            window_size,
            min_depth,
            max_depth,
            cache_size: self.cache_size.unwrap_or(1000),
            annotation: AnnotationSettings {
                ion_types,
                charges,
                neutral_losses: self.neutral_losses.unwrap_or_default(),
                fragment_tol,
            },
            account_neutral_losses: self.account_neutral_losses.unwrap_or(false),
            residue_matching: self.residue_matching.unwrap_or_default(),
        }
    }
}

/// Validated localization parameters
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Parameters {
    pub window_size: f64,
    pub min_depth: usize,
    pub max_depth: usize,
    pub cache_size: usize,
    pub annotation: AnnotationSettings,
    pub account_neutral_losses: bool,
    pub residue_matching: ResidueMatching,
}

impl Default for Parameters {
    fn default() -> Self {
        Builder::default().make_parameters()
    }
}

impl Parameters {
    pub fn windowing(&self) -> Windowing {
        Windowing {
            width: self.window_size,
            min_depth: self.min_depth,
            max_depth: self.max_depth,
            tolerance: self.annotation.fragment_tol,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let parameters = Parameters::default();
        assert_eq!(parameters.window_size, 100.0);
        assert_eq!(parameters.min_depth, 2);
        assert_eq!(parameters.max_depth, 8);
        assert_eq!(parameters.cache_size, 1000);
        assert_eq!(parameters.annotation, AnnotationSettings::default());
        assert!(!parameters.account_neutral_losses);
        assert_eq!(parameters.residue_matching, ResidueMatching::Exact);
    }

    #[test]
    fn from_json() {
        let builder: Builder = serde_json::from_str(
            r#"{
                "window_size": 50.0,
                "max_depth": 1,
                "charges": [2, 1, 2, 0],
                "ion_types": ["y", "b", "precursor"],
                "fragment_tol": {"ppm": [-10.0, 10.0]},
                "residue_matching": "indistinguishable_il",
                "neutral_losses": [{"name": "H3PO4", "mass": 97.976896, "modifications": ["Phospho"]}]
            }"#,
        )
        .unwrap();
        let parameters = builder.make_parameters();
        assert_eq!(parameters.window_size, 50.0);
        assert_eq!(parameters.max_depth, 1);
        assert_eq!(parameters.min_depth, 1);
        assert_eq!(parameters.annotation.charges, vec![1, 2]);
        assert_eq!(
            parameters.annotation.ion_types,
            vec![
                IonType::Backbone(Kind::B),
                IonType::Backbone(Kind::Y),
                IonType::Precursor
            ]
        );
        assert_eq!(parameters.annotation.fragment_tol, Tolerance::Ppm(-10.0, 10.0));
        assert_eq!(parameters.residue_matching, ResidueMatching::IndistinguishableIl);
        assert_eq!(parameters.annotation.neutral_losses[0].residues, "");

        let windowing = parameters.windowing();
        assert_eq!(windowing.width, 50.0);
        assert_eq!(windowing.tolerance, Tolerance::Ppm(-10.0, 10.0));
    }

    #[test]
    fn invalid_window() {
        let parameters = Builder {
            window_size: Some(-3.0),
            ..Default::default()
        }
        .make_parameters();
        assert_eq!(parameters.window_size, WINDOW_SIZE);
    }
}
