use crate::fragment::{AnnotationSettings, FragmentIon, FragmentIonSet};
use crate::peptide::Peptide;
use crate::spectrum::{select_closest_peak, Peak, Spectrum};
use crate::Error;

/// A theoretical ion paired with the experimental peak explaining it
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IonMatch {
    pub ion: FragmentIon,
    pub peak: Peak,
}

/// Matches theoretical fragments against a spectrum
pub trait Annotator: Send + Sync {
    fn annotate(
        &self,
        settings: &AnnotationSettings,
        spectrum: &Spectrum,
        peptide: &Peptide,
        ions: &FragmentIonSet,
    ) -> Result<Vec<IonMatch>, Error>;
}

/// Pairs every theoretical ion with at most one peak: the closest one within
/// the fragment tolerance
#[derive(Copy, Clone, Debug, Default)]
pub struct ClosestPeakAnnotator;

impl Annotator for ClosestPeakAnnotator {
    fn annotate(
        &self,
        settings: &AnnotationSettings,
        spectrum: &Spectrum,
        _peptide: &Peptide,
        ions: &FragmentIonSet,
    ) -> Result<Vec<IonMatch>, Error> {
        Ok(ions
            .iter()
            .filter_map(|ion| {
                select_closest_peak(spectrum.peaks(), ion.mz, settings.fragment_tol)
                    .map(|peak| IonMatch { ion: *ion, peak: *peak })
            })
            .collect())
    }
}
