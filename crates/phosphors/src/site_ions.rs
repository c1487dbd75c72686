use fnv::{FnvHashMap, FnvHashSet};

use crate::fragment::FragmentIonSet;
use crate::profile::ProfileIx;

/// m/z values are compared after rounding to 1e-6
fn quantize(mz: f64) -> i64 {
    (mz * 1e6).round() as i64
}

/// A theoretical fragment m/z that is not shared by every profile
#[derive(Clone, Debug, PartialEq)]
pub struct DiagnosticIon {
    pub mz: f64,
    /// Profiles predicting this ion, ascending
    pub profiles: Vec<ProfileIx>,
}

/// Site-determining ions of a set of profile variants, sorted by m/z
#[derive(Clone, Debug, Default)]
pub struct SiteDeterminingIons {
    ions: Vec<DiagnosticIon>,
}

impl SiteDeterminingIons {
    /// `fragments[i]` holds the predicted fragments of profile `i`.
    /// Only backbone ions take part.
    pub fn new(fragments: &[FragmentIonSet]) -> Self {
        let mut map: FnvHashMap<i64, DiagnosticIon> = FnvHashMap::default();
        for (ix, set) in fragments.iter().enumerate() {
            let mut seen = FnvHashSet::default();
            for ion in set.backbone() {
                let key = quantize(ion.mz);
                if seen.insert(key) {
                    map.entry(key)
                        .or_insert_with(|| DiagnosticIon {
                            mz: ion.mz,
                            profiles: Vec::new(),
                        })
                        .profiles
                        .push(ProfileIx(ix as u32));
                }
            }
        }

        let mut ions = map
            .into_values()
            .filter(|ion| ion.profiles.len() < fragments.len())
            .collect::<Vec<_>>();
        ions.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        Self { ions }
    }

    pub fn len(&self) -> usize {
        self.ions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiagnosticIon> {
        self.ions.iter()
    }

    /// Ions with `lo < mz <= hi`
    pub fn in_window(&self, lo: f64, hi: f64) -> &[DiagnosticIon] {
        let start = self.ions.partition_point(|ion| ion.mz <= lo);
        let end = self.ions.partition_point(|ion| ion.mz <= hi);
        &self.ions[start..end.max(start)]
    }

    /// For each profile, the indices (into [`Self::in_window`]) of the ions it
    /// predicts within `lo < mz <= hi`
    pub fn per_profile(&self, lo: f64, hi: f64, profiles: usize) -> Vec<Vec<usize>> {
        let mut sets = vec![Vec::new(); profiles];
        for (ix, ion) in self.in_window(lo, hi).iter().enumerate() {
            for profile in &ion.profiles {
                sets[profile.ix()].push(ix);
            }
        }
        sets
    }
}
