use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::annotation::{Annotator, ClosestPeakAnnotator};
use crate::binomial::DistributionCache;
use crate::fragment::{AnnotationSettings, BackboneFragmenter, FragmentIonSet, Fragmenter, IonType};
use crate::modification::PtmDefinition;
use crate::peptide::{Peptide, SequenceSites, SiteLocator};
use crate::profile::{build_variants, possible_profiles, possible_sites, ModificationProfile};
use crate::settings::Parameters;
use crate::site_ions::SiteDeterminingIons;
use crate::spectrum::Spectrum;
use crate::window::{prefilter, rescoring_probability, Target};
use crate::Error;

/// One peptide-spectrum match to localize
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Query {
    pub peptide: Peptide,
    /// Modifications of one mass group, the first being representative
    pub ptms: Vec<PtmDefinition>,
    pub spectrum: Spectrum,
}

/// Localization probabilities of one mass group, in percent
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Localization {
    /// Site -> summed probability of all profiles holding the site
    pub sites: BTreeMap<usize, f64>,
    pub profiles: Vec<(ModificationProfile, f64)>,
}

impl Localization {
    fn new(profiles: Vec<(ModificationProfile, f64)>) -> Self {
        Self {
            sites: aggregate(&profiles),
            profiles,
        }
    }

    /// Most probable site, ties broken towards the N-terminus
    pub fn best_site(&self) -> Option<(usize, f64)> {
        self.sites
            .iter()
            .fold(None, |best: Option<(usize, f64)>, (&site, &score)| match best {
                Some((_, top)) if top >= score => best,
                _ => Some((site, score)),
            })
    }
}

/// Turn raw profile probabilities into percentages proportional to 1/P
pub fn normalize(probabilities: &[f64]) -> Result<Vec<f64>, Error> {
    let mut inverse = Vec::with_capacity(probabilities.len());
    for &p in probabilities {
        Error::check_probability(p, "profile probability")?;
        inverse.push(1.0 / p);
    }
    let total = inverse.iter().sum::<f64>();
    if !(total > 0.0) {
        return Err(Error::Normalization(total));
    }
    inverse
        .into_iter()
        .map(|inv| Error::check_probability(inv / total, "normalized profile probability").map(|r| r * 100.0))
        .collect()
}

/// Per site, the sum of the scores of all profiles holding it
pub fn aggregate(profiles: &[(ModificationProfile, f64)]) -> BTreeMap<usize, f64> {
    let mut sites = BTreeMap::new();
    for (profile, score) in profiles {
        for &site in profile.sites() {
            *sites.entry(site).or_insert(0.0) += score;
        }
    }
    sites
}

/// PhosphoRS localization of indistinguishable modifications
pub struct Scorer<F = BackboneFragmenter, A = ClosestPeakAnnotator, L = SequenceSites> {
    pub parameters: Parameters,
    fragmenter: F,
    annotator: A,
    locator: L,
    cache: Arc<DistributionCache>,
}

impl Scorer {
    pub fn new(parameters: Parameters) -> Self {
        let locator = SequenceSites {
            matching: parameters.residue_matching,
        };
        Scorer::with_collaborators(parameters, BackboneFragmenter, ClosestPeakAnnotator, locator)
    }
}

impl<F, A, L> Scorer<F, A, L>
where
    F: Fragmenter,
    A: Annotator,
    L: SiteLocator,
{
    pub fn with_collaborators(parameters: Parameters, fragmenter: F, annotator: A, locator: L) -> Self {
        let cache = Arc::new(DistributionCache::new(parameters.cache_size));
        Self {
            parameters,
            fragmenter,
            annotator,
            locator,
            cache,
        }
    }

    /// Share a distribution cache with other scorers
    pub fn with_cache(mut self, cache: Arc<DistributionCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &Arc<DistributionCache> {
        &self.cache
    }

    /// Annotation settings used for scoring: backbone ions only, and only
    /// the neutral losses that cannot be mistaken for the modification itself
    pub fn scoring_settings(&self, ptms: &[PtmDefinition], spectrum: &Spectrum) -> AnnotationSettings {
        let annotation = &self.parameters.annotation;
        let neutral_losses = match (self.parameters.account_neutral_losses, ptms.first()) {
            (true, Some(representative)) => {
                let tolerance = spectrum
                    .max_mz()
                    .map(|mz| annotation.fragment_tol.accuracy_in_da(mz))
                    .unwrap_or_default();
                annotation
                    .neutral_losses
                    .iter()
                    .filter(|loss| (loss.mass - representative.mass).abs() > tolerance)
                    .cloned()
                    .collect()
            }
            _ => Vec::new(),
        };
        AnnotationSettings {
            ion_types: annotation
                .ion_types
                .iter()
                .copied()
                .filter(IonType::is_backbone)
                .collect(),
            charges: annotation.charges.clone(),
            neutral_losses,
            fragment_tol: annotation.fragment_tol,
        }
    }

    /// Binomial probability of `peptide` explaining `spectrum` by chance
    fn probability(
        &self,
        settings: &AnnotationSettings,
        peptide: &Peptide,
        ions: &FragmentIonSet,
        spectrum: &Spectrum,
        p: f64,
    ) -> Result<f64, Error> {
        let matches = self.annotator.annotate(settings, spectrum, peptide, ions)?;
        let k = matches
            .iter()
            .filter(|m| m.ion.ion_type.is_backbone())
            .count();
        self.cache.score(p, ions.len(), k)
    }

    /// Localize the modifications of the mass group `ptms` carried by `peptide`.
    ///
    /// Every variable modification of `peptide` named after one of `ptms`
    /// counts towards the number of modifications to place. The first PTM
    /// is used to build the candidate variants.
    pub fn score(
        &self,
        peptide: &Peptide,
        ptms: &[PtmDefinition],
        spectrum: &Spectrum,
    ) -> Result<Localization, Error> {
        peptide.check_sites()?;
        let representative = ptms
            .first()
            .ok_or_else(|| Error::InvalidInput("no modification to localize".into()))?;

        let count = peptide.count_variable(ptms);
        if count == 0 {
            return Err(Error::InvalidInput(format!(
                "{} carries no variable `{}`",
                peptide, representative.name
            )));
        }

        let sites = possible_sites(&self.locator, peptide, ptms)?;
        if sites.len() < count {
            return Err(Error::InvalidInput(format!(
                "{} has {} possible sites for {} modifications",
                peptide,
                sites.len(),
                count
            )));
        }
        if sites.len() == count {
            return Ok(Localization::new(vec![(sites.into(), 100.0)]));
        }

        let settings = self.scoring_settings(ptms, spectrum);
        let filtered = prefilter(spectrum, &settings.fragment_tol, self.parameters.window_size)?;

        let base = peptide.without_variable(ptms);
        let profiles = possible_profiles(&sites, count);
        let variants = build_variants(&base, representative, &profiles);
        let fragments = variants
            .iter()
            .map(|variant| self.fragmenter.fragment(variant, &settings))
            .collect::<Result<Vec<_>, _>>()?;
        let unmodified = self.fragmenter.fragment(&base, &settings)?;
        let ions = SiteDeterminingIons::new(&fragments);
        log::trace!(
            "{} on {}: {} profiles, {} site-determining ions",
            peptide,
            spectrum.title,
            profiles.len(),
            ions.len()
        );

        let reduced = self.parameters.windowing().reduce(
            &filtered,
            &ions,
            profiles.len(),
            |target, depth, p| match target {
                Target::Profile(ix) => {
                    self.probability(&settings, &variants[ix.ix()], &fragments[ix.ix()], depth, p)
                }
                Target::Unmodified => self.probability(&settings, &base, &unmodified, depth, p),
            },
        )?;

        let p = rescoring_probability(&filtered, &reduced, &settings.fragment_tol);
        let probabilities = variants
            .iter()
            .zip(&fragments)
            .map(|(variant, ions)| self.probability(&settings, variant, ions, &reduced, p))
            .collect::<Result<Vec<_>, _>>()?;
        let percentages = normalize(&probabilities)?;

        let localization = Localization::new(profiles.into_iter().zip(percentages).collect());
        if let Some(&site) = sites.iter().find(|s| !localization.sites.contains_key(s)) {
            return Err(Error::IncompleteCoverage {
                site,
                title: spectrum.title.clone(),
            });
        }
        log::debug!(
            "{} on {}: reduced to {} of {} peaks, best site {:?}",
            peptide,
            spectrum.title,
            reduced.len(),
            spectrum.len(),
            localization.best_site()
        );
        Ok(localization)
    }

    /// Score independent queries in parallel, sharing the distribution cache
    pub fn score_batch(&self, queries: &[Query]) -> Vec<Result<Localization, Error>> {
        queries
            .par_iter()
            .map(|query| self.score(&query.peptide, &query.ptms, &query.spectrum))
            .collect()
    }
}
