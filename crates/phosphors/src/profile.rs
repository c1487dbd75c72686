use serde::{Deserialize, Serialize};

use crate::modification::{ModificationMatch, PtmDefinition};
use crate::peptide::{Peptide, SiteLocator};
use crate::Error;

/// Index of a profile in the list returned by [`possible_profiles`]
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProfileIx(pub u32);

impl ProfileIx {
    pub fn ix(&self) -> usize {
        self.0 as usize
    }
}

/// One placement of all modifications of a mass group.
///
/// Sites are strictly increasing. 0 is the peptide N-terminus, L + 1 the
/// C-terminus and 1..=L the residues of a peptide of length L.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModificationProfile(Vec<usize>);

impl ModificationProfile {
    pub fn sites(&self) -> &[usize] {
        &self.0
    }

    pub fn contains(&self, site: usize) -> bool {
        self.0.binary_search(&site).is_ok()
    }
}

impl From<Vec<usize>> for ModificationProfile {
    fn from(mut sites: Vec<usize>) -> Self {
        sites.sort_unstable();
        sites.dedup();
        Self(sites)
    }
}

/// All `k`-combinations of the sorted, duplicate free `sites`, in
/// lexicographic order
pub fn possible_profiles(sites: &[usize], k: usize) -> Vec<ModificationProfile> {
    if k == 0 || k > sites.len() {
        return Vec::new();
    }
    let mut profiles: Vec<Vec<usize>> = sites.iter().map(|&site| vec![site]).collect();
    for _ in 1..k {
        profiles = profiles
            .into_iter()
            .flat_map(|profile| {
                let last = profile[profile.len() - 1];
                sites
                    .iter()
                    .filter(move |&&site| site > last)
                    .map(move |&site| {
                        let mut next = profile.clone();
                        next.push(site);
                        next
                    })
            })
            .collect();
    }
    profiles.into_iter().map(ModificationProfile).collect()
}

/// Sorted candidate sites of the mass group `ptms` on `peptide`.
///
/// Terminal modifications contribute the terminus (0 or L + 1) when they can
/// sit on the first or last residue, other modifications every residue they
/// can sit on.
pub fn possible_sites<L: SiteLocator + ?Sized>(
    locator: &L,
    peptide: &Peptide,
    ptms: &[PtmDefinition],
) -> Result<Vec<usize>, Error> {
    let len = peptide.len();
    let mut sites = Vec::new();
    for ptm in ptms {
        let potential = locator.potential_sites(peptide, ptm)?;
        if ptm.is_n_term() {
            if potential.contains(&1) {
                sites.push(0);
            }
        } else if ptm.is_c_term() {
            if potential.contains(&len) {
                sites.push(len + 1);
            }
        } else {
            sites.extend(potential);
        }
    }
    sites.sort_unstable();
    sites.dedup();
    Ok(sites)
}

/// Map a profile site onto the residue carrying the modification
pub fn residue_of(site: usize, len: usize) -> usize {
    site.clamp(1, len)
}

/// The peptide variant of every profile: `base` with `representative`
/// placed at each site of the profile
pub fn build_variants(
    base: &Peptide,
    representative: &PtmDefinition,
    profiles: &[ModificationProfile],
) -> Vec<Peptide> {
    profiles
        .iter()
        .map(|profile| {
            let mut peptide = base.clone();
            peptide.modifications.extend(profile.sites().iter().map(|&site| {
                ModificationMatch::variable(representative, residue_of(site, base.len()))
            }));
            peptide
        })
        .collect()
}
