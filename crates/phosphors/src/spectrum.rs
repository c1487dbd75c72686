use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::mass::Tolerance;

/// A centroided peak
#[derive(PartialEq, PartialOrd, Copy, Clone, Default, Debug, Serialize, Deserialize)]
pub struct Peak {
    pub mz: f64,
    pub intensity: f64,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Precursor {
    pub mz: f64,
    pub intensity: Option<f64>,
    pub charge: Option<u8>,
}

#[derive(Deserialize)]
struct UnsortedSpectrum {
    #[serde(default = "default_level")]
    level: u8,
    title: String,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    precursor: Option<Precursor>,
    peaks: Vec<Peak>,
}

fn default_level() -> u8 {
    2
}

impl From<UnsortedSpectrum> for Spectrum {
    fn from(value: UnsortedSpectrum) -> Self {
        Spectrum::new(
            value.level,
            value.title,
            value.file,
            value.precursor,
            value.peaks,
        )
    }
}

/// An immutable MSn spectrum. Peaks are sorted by m/z in ascending order.
#[derive(Clone, Default, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "UnsortedSpectrum")]
pub struct Spectrum {
    /// MSn level
    pub level: u8,
    /// Spectrum title
    pub title: String,
    /// Source file, if known
    pub file: Option<String>,
    pub precursor: Option<Precursor>,
    peaks: Vec<Peak>,
}

impl Spectrum {
    pub fn new(
        level: u8,
        title: String,
        file: Option<String>,
        precursor: Option<Precursor>,
        mut peaks: Vec<Peak>,
    ) -> Self {
        peaks.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        Self {
            level,
            title,
            file,
            precursor,
            peaks,
        }
    }

    /// Create a spectrum holding `peaks` and the metadata of `self`, with
    /// `suffix` appended to the title
    pub fn derive(&self, suffix: &str, peaks: Vec<Peak>) -> Spectrum {
        Spectrum::new(
            self.level,
            format!("{}{}", self.title, suffix),
            self.file.clone(),
            self.precursor.clone(),
            peaks,
        )
    }

    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn min_mz(&self) -> Option<f64> {
        self.peaks.first().map(|peak| peak.mz)
    }

    pub fn max_mz(&self) -> Option<f64> {
        self.peaks.last().map(|peak| peak.mz)
    }

    /// Peaks with `lo <= mz < hi`
    pub fn peaks_between(&self, lo: f64, hi: f64) -> &[Peak] {
        let start = self.peaks.partition_point(|peak| peak.mz < lo);
        let end = self.peaks.partition_point(|peak| peak.mz < hi);
        &self.peaks[start..end.max(start)]
    }
}

/// Binary search followed by linear search to select the closest peak to `mz` within `tolerance` window
pub fn select_closest_peak(peaks: &[Peak], mz: f64, tolerance: Tolerance) -> Option<&Peak> {
    let (lo, hi) = tolerance.bounds(mz);
    let (i, j) = binary_search_slice(peaks, |peak, query| peak.mz.total_cmp(query), lo, hi);

    let mut best_peak = None;
    let mut min_eps = f64::MAX;
    for peak in peaks[i..j]
        .iter()
        .filter(|peak| peak.mz >= lo && peak.mz <= hi)
    {
        let eps = (peak.mz - mz).abs();
        if eps < min_eps {
            min_eps = eps;
            best_peak = Some(peak);
        }
    }
    best_peak
}

/// Return the widest `left` and `right` indices into a `slice` (sorted by the
/// function `key`) such that all values between `low` and `high` are
/// contained in `slice[left..right]`
pub fn binary_search_slice<T, F, S>(slice: &[T], key: F, low: S, high: S) -> (usize, usize)
where
    F: Fn(&T, &S) -> Ordering,
{
    let left_idx = match slice.binary_search_by(|a| key(a, &low)) {
        Ok(idx) | Err(idx) => {
            let mut idx = idx.saturating_sub(1);
            while idx > 0 && key(&slice[idx], &low) != Ordering::Less {
                idx -= 1;
            }
            idx
        }
    };

    let right_idx = match slice[left_idx..].binary_search_by(|a| key(a, &high)) {
        Ok(idx) | Err(idx) => {
            let mut idx = idx + left_idx;
            while idx < slice.len() && key(&slice[idx], &high) != Ordering::Greater {
                idx = idx.saturating_add(1);
            }
            idx.min(slice.len())
        }
    };
    (left_idx, right_idx)
}
