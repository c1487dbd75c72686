//! Adaptive, window-by-window reduction of a spectrum to its most
//! informative peaks.
//!
//! The spectrum is cut into windows of fixed width. Within each window the
//! peaks are ranked by intensity and nested "depth" sub-spectra holding the
//! 1, 2, .. most intense peaks are scored. The retained depth is the one that
//! best separates the candidate profiles, or, for windows without any
//! site-determining ion, the one that best explains the unmodified peptide.

use crate::mass::Tolerance;
use crate::profile::ProfileIx;
use crate::site_ions::SiteDeterminingIons;
use crate::spectrum::{Peak, Spectrum};
use crate::Error;

pub const WINDOW_SIZE: f64 = 100.0;
pub const MIN_DEPTH: usize = 2;
pub const MAX_DEPTH: usize = 8;

/// Decimal places `p` is floored to for an accuracy `d` over a width `w`
pub fn decimals(d: f64, w: f64) -> i32 {
    let order = -(d / w).log10();
    // Beyond 15 decimals f64 carries no more information
    (order as i32).saturating_add(1).clamp(0, 15)
}

/// Probability of a theoretical ion matching one of `n` peaks by chance,
/// with accuracy `d` (Da) over a width `w` (m/z)
pub fn match_probability(d: f64, n: usize, w: f64, decimals: i32) -> f64 {
    if w <= 0.0 || n <= 1 {
        return 1.0;
    }
    let p = (d * n as f64 / w).min(1.0);
    let scale = 10f64.powi(decimals);
    // 0.02 * 3 / 100 is 0.00059999.. in binary
    ((p * scale) + 1e-9).floor() / scale
}

/// Bin the spectrum so that a random match probability below 1 is
/// attainable: within every bin only the most intense peaks are kept.
///
/// Bins lie on a grid anchored at the first peak. A spectrum already below
/// the per-bin budget is returned unchanged.
pub fn prefilter(spectrum: &Spectrum, tolerance: &Tolerance, width: f64) -> Result<Spectrum, Error> {
    let (first, last) = match (spectrum.min_mz(), spectrum.max_mz()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Ok(spectrum.clone()),
    };

    let t = tolerance.accuracy_in_da(last);
    let (bin_width, budget) = if t <= 10.0 {
        (10.0 * t, 10)
    } else {
        (width, (width / t) as usize)
    };
    if budget < 1 {
        return Err(Error::OverFiltered { tolerance: t });
    }
    if bin_width <= 0.0 {
        return Ok(spectrum.clone());
    }

    let mut kept = Vec::with_capacity(spectrum.len());
    let mut bin: Vec<Peak> = Vec::new();
    let mut reference = first;
    let mut removed = 0;

    let mut flush = |bin: &mut Vec<Peak>, kept: &mut Vec<Peak>| {
        if bin.len() > budget {
            bin.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));
            removed += bin.len() - budget;
            bin.truncate(budget);
        }
        kept.append(bin);
    };

    for peak in spectrum.peaks() {
        if peak.mz > reference + bin_width {
            flush(&mut bin, &mut kept);
            reference += ((peak.mz - reference) / bin_width).floor() * bin_width;
            if peak.mz > reference + bin_width {
                reference += bin_width;
            }
        }
        bin.push(*peak);
    }
    flush(&mut bin, &mut kept);

    if removed == 0 {
        return Ok(spectrum.clone());
    }
    log::trace!(
        "{}: filtered {} peaks (bin width {:.4}, {} peaks per bin)",
        spectrum.title,
        removed,
        bin_width,
        budget
    );
    Ok(spectrum.derive("_filtered", kept))
}

/// Nested spectra of the 1, 2, .. `max_depth` most intense peaks of `window`.
/// Equal intensities are ranked by m/z.
pub fn depth_spectra(window: &Spectrum, max_depth: usize) -> Result<Vec<Spectrum>, Error> {
    if window.is_empty() {
        return Err(Error::EmptySpectrum);
    }
    let mut ranked = window.peaks().to_vec();
    ranked.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));
    let depth = ranked.len().min(max_depth);
    Ok((1..=depth)
        .map(|d| window.derive(&format!("_{}", d), ranked[..d].to_vec()))
        .collect())
}

/// Ratios between adjacent scores, after sorting them in ascending order
pub fn deltas(mut scores: Vec<f64>) -> Vec<f64> {
    scores.sort_by(|a, b| a.total_cmp(b));
    scores.windows(2).map(|w| w[0] / w[1]).collect()
}

/// Pick the depth (as an index into the depth spectra) holding the largest
/// delta. Ranks are scanned in increasing order, depths in increasing order
/// within a rank, and the first maximum wins.
pub fn select_depth(deltas: &[Vec<f64>], min_depth: usize, max_depth: usize) -> usize {
    let ranks = deltas.iter().map(Vec::len).max().unwrap_or(0);
    let mut best = 0;
    let mut largest = 0.0;
    for j in 0..ranks {
        for (i, at_depth) in deltas.iter().enumerate() {
            if let Some(&delta) = at_depth.get(j) {
                if delta > largest {
                    largest = delta;
                    best = i;
                }
            }
        }
    }
    clamp_depth(best, deltas.len(), min_depth, max_depth)
}

/// Keep a depth index within [min_depth, max_depth], never going past the
/// `available` depths to honour the lower bound
pub fn clamp_depth(best: usize, available: usize, min_depth: usize, max_depth: usize) -> usize {
    let lower = min_depth.saturating_sub(1);
    let upper = max_depth.saturating_sub(1);
    let mut best = best;
    if best < lower && lower < available {
        best = lower;
    }
    best.min(upper)
}

/// What a depth spectrum is scored against
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// The variant of one profile
    Profile(ProfileIx),
    /// The peptide without any modification of the scored mass group
    Unmodified,
}

/// Window geometry and depth bounds
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Windowing {
    pub width: f64,
    pub min_depth: usize,
    pub max_depth: usize,
    pub tolerance: Tolerance,
}

impl Default for Windowing {
    fn default() -> Self {
        Self {
            width: WINDOW_SIZE,
            min_depth: MIN_DEPTH,
            max_depth: MAX_DEPTH,
            tolerance: Tolerance::Da(-0.5, 0.5),
        }
    }
}

impl Windowing {
    /// Reduce `spectrum` window by window.
    ///
    /// `score(target, depth_spectrum, p)` returns the binomial probability of
    /// `target` on a depth spectrum given a random match probability `p`.
    /// `profiles` is the number of candidate profiles referenced by `ions`.
    pub fn reduce<F>(
        &self,
        spectrum: &Spectrum,
        ions: &SiteDeterminingIons,
        profiles: usize,
        mut score: F,
    ) -> Result<Spectrum, Error>
    where
        F: FnMut(Target, &Spectrum, f64) -> Result<f64, Error>,
    {
        let (min_mz, max_mz) = match (spectrum.min_mz(), spectrum.max_mz()) {
            (Some(min), Some(max)) => (min, max),
            _ => return Err(Error::EmptySpectrum),
        };
        if self.width <= 0.0 || !self.width.is_finite() {
            return Err(Error::InvalidInput(format!(
                "window width must be positive, got {}",
                self.width
            )));
        }

        let w = self.width;
        let mut reduced = Vec::new();
        let mut lo = min_mz;
        while lo <= max_mz {
            let hi = lo + w;
            let d = self.tolerance.accuracy_in_da(lo + w / 2.0);
            let decimals = decimals(d, w);

            let peaks = spectrum.peaks_between(lo, hi);
            if peaks.is_empty() {
                lo = hi;
                continue;
            }

            let window = spectrum.derive(&format!("_minMZ_{}", lo), peaks.to_vec());
            let depths = depth_spectra(&window, self.max_depth)?;
            let diagnostic = ions.per_profile(lo, hi, profiles);

            let chosen = if diagnostic.iter().any(|set| !set.is_empty()) {
                let mut all_deltas = Vec::with_capacity(depths.len());
                for depth in &depths {
                    let p = match_probability(d, depth.len(), w, decimals);
                    let mut scored: Vec<&[usize]> = Vec::new();
                    let mut scores = Vec::new();
                    for (ix, set) in diagnostic.iter().enumerate() {
                        if scored.contains(&set.as_slice()) {
                            continue;
                        }
                        scored.push(set);
                        scores.push(score(Target::Profile(ProfileIx(ix as u32)), depth, p)?);
                    }
                    all_deltas.push(deltas(scores));
                }
                select_depth(&all_deltas, self.min_depth, self.max_depth)
            } else {
                let mut best = 0;
                let mut best_score = f64::INFINITY;
                for (i, depth) in depths.iter().enumerate() {
                    let p = match_probability(d, depth.len(), w, decimals);
                    let s = score(Target::Unmodified, depth, p)?;
                    if s < best_score {
                        best_score = s;
                        best = i;
                    }
                }
                best
            };

            log::trace!(
                "{}: window [{:.4}, {:.4}) keeps {} of {} peaks",
                spectrum.title,
                lo,
                hi,
                depths[chosen].len(),
                peaks.len()
            );
            reduced.extend_from_slice(depths[chosen].peaks());
            lo = hi;
        }
        Ok(spectrum.derive("_phosphoRS", reduced))
    }
}

/// Random match probability used to rescore the reduced spectrum: the width
/// is the m/z span of the filtered spectrum, the peak count that of the
/// reduced one
pub fn rescoring_probability(filtered: &Spectrum, reduced: &Spectrum, tolerance: &Tolerance) -> f64 {
    let (min, max) = match (filtered.min_mz(), filtered.max_mz()) {
        (Some(min), Some(max)) => (min, max),
        _ => return 1.0,
    };
    let w = max - min;
    if w <= 0.0 {
        return 1.0;
    }
    let d = tolerance.accuracy_in_da(min + w / 2.0);
    match_probability(d, reduced.len(), w, decimals(d, w))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fragment::{FragmentIon, FragmentIonSet, IonType};
    use crate::ion_series::Kind;
    use quickcheck_macros::quickcheck;

    fn spectrum(peaks: &[(f64, f64)]) -> Spectrum {
        Spectrum::new(
            2,
            "scan=7".into(),
            None,
            None,
            peaks
                .iter()
                .map(|&(mz, intensity)| Peak { mz, intensity })
                .collect(),
        )
    }

    #[test]
    fn probability() {
        assert_eq!(decimals(0.5, 100.0), 3);
        assert!((match_probability(0.5, 4, 100.0, 3) - 0.02).abs() < 1e-12);
        assert!((match_probability(0.5, 3, 70.0, decimals(0.5, 70.0)) - 0.021).abs() < 1e-12);

        // Flooring works on the decimal value
        assert_eq!(decimals(0.02, 100.0), 4);
        assert_eq!(match_probability(0.02, 3, 100.0, 4), 0.0006);
        assert_eq!(match_probability(0.02, 6, 100.0, 4), 0.0012);
        assert_eq!(match_probability(0.7, 3, 100.0, 3), 0.021);
        assert_eq!(match_probability(0.02, 7, 100.0, 4), 0.0014);

        assert_eq!(match_probability(0.5, 1, 100.0, 3), 1.0);
        assert_eq!(match_probability(0.5, 0, 100.0, 3), 1.0);
        assert_eq!(match_probability(0.5, 10, 0.0, 3), 1.0);

        // d > w
        assert_eq!(decimals(200.0, 100.0), 1);
        assert_eq!(match_probability(200.0, 3, 100.0, 1), 1.0);
        assert_eq!(decimals(0.0, 100.0), 15);
    }

    #[quickcheck]
    fn probability_in_range(d: u16, n: u8, w: u16) -> bool {
        let d = d as f64 / 1000.0;
        let w = w as f64 / 10.0;
        let p = match_probability(d, n as usize, w, decimals(d, w));
        (0.0..=1.0).contains(&p)
    }

    #[test]
    fn depth_order() {
        let window = spectrum(&[(1.0, 5.0), (2.0, 9.0), (3.0, 1.0), (4.0, 9.0)]);
        let depths = depth_spectra(&window, 8).unwrap();
        let mz = depths
            .iter()
            .map(|s| s.peaks().iter().map(|p| p.mz).collect::<Vec<_>>())
            .collect::<Vec<_>>();
        assert_eq!(
            mz,
            vec![
                vec![2.0],
                vec![2.0, 4.0],
                vec![1.0, 2.0, 4.0],
                vec![1.0, 2.0, 3.0, 4.0]
            ]
        );
        assert_eq!(depth_spectra(&window, 3).unwrap().len(), 3);
        assert!(matches!(
            depth_spectra(&spectrum(&[]), 8),
            Err(Error::EmptySpectrum)
        ));
    }

    #[test]
    fn largest_delta() {
        assert_eq!(deltas(vec![0.5, 0.1, 0.2]), vec![0.5, 0.4]);

        let d = vec![vec![0.5], vec![0.1, 0.9], vec![0.7]];
        assert_eq!(select_depth(&d, 2, 8), 1);
        // First maximum wins
        let d = vec![vec![0.1], vec![0.3, 0.2], vec![0.3, 0.3], vec![0.1, 0.3]];
        assert_eq!(select_depth(&d, 2, 8), 1);
        // Raised to the minimum depth
        assert_eq!(select_depth(&[vec![0.9], vec![0.2]], 2, 8), 1);
        // .. unless the window is too small
        assert_eq!(select_depth(&[vec![0.9]], 2, 8), 0);
        // No delta at all
        assert_eq!(select_depth(&[vec![], vec![], vec![]], 2, 8), 1);
        assert_eq!(clamp_depth(10, 12, 2, 8), 7);
    }

    #[quickcheck]
    fn depth_within_bounds(deltas: Vec<Vec<u8>>) -> bool {
        let deltas = deltas
            .into_iter()
            .take(MAX_DEPTH)
            .map(|d| d.into_iter().map(|x| x as f64 / 255.0).collect())
            .collect::<Vec<Vec<f64>>>();
        if deltas.is_empty() {
            return true;
        }
        let depth = select_depth(&deltas, MIN_DEPTH, MAX_DEPTH);
        let lower = if deltas.len() >= MIN_DEPTH { MIN_DEPTH - 1 } else { 0 };
        depth < deltas.len() && depth >= lower && depth < MAX_DEPTH
    }

    #[test]
    fn prefilter_bins() {
        // Tolerance 0.5 Da: bins of 5 m/z keeping 10 peaks each
        let tol = Tolerance::Da(-0.5, 0.5);
        let mut peaks = (0..12)
            .map(|i| (100.0 + i as f64 * 0.25, 1.0 + i as f64))
            .collect::<Vec<_>>();
        peaks.push((300.0, 1.0));
        peaks.push((300.5, 1.0));
        let dense = spectrum(&peaks);

        let filtered = prefilter(&dense, &tol, WINDOW_SIZE).unwrap();
        assert_eq!(filtered.len(), 12);
        assert_eq!(filtered.title, "scan=7_filtered");
        // The two weakest peaks are gone
        assert_eq!(filtered.min_mz(), Some(100.5));
        assert_eq!(dense.len(), 14);

        // Filtering is idempotent
        assert_eq!(prefilter(&filtered, &tol, WINDOW_SIZE).unwrap(), filtered);

        let sparse = spectrum(&[(100.0, 1.0), (200.0, 2.0)]);
        assert_eq!(prefilter(&sparse, &tol, WINDOW_SIZE).unwrap(), sparse);
    }

    #[test]
    fn overfiltered() {
        let sparse = spectrum(&[(100.0, 1.0), (200.0, 2.0)]);
        assert!(matches!(
            prefilter(&sparse, &Tolerance::Da(-150.0, 150.0), WINDOW_SIZE),
            Err(Error::OverFiltered { .. })
        ));
        assert!(prefilter(&spectrum(&[]), &Tolerance::Da(-150.0, 150.0), WINDOW_SIZE).is_ok());
    }

    #[test]
    fn unmodified_windows() {
        let mut peaks = (0..13)
            .map(|i| (100.0 + i as f64, 10.0 + i as f64))
            .collect::<Vec<_>>();
        peaks.push((250.0, 3.0));
        let spectrum = spectrum(&peaks);
        let windowing = Windowing::default();
        let ions = SiteDeterminingIons::default();

        // Deeper is better: every window keeps as many peaks as allowed
        let mut calls = 0;
        let reduced = windowing
            .reduce(&spectrum, &ions, 2, |target, depth, _| {
                assert_eq!(target, Target::Unmodified);
                calls += 1;
                Ok(1.0 / depth.len() as f64)
            })
            .unwrap();
        assert_eq!(calls, 8 + 1);
        assert_eq!(reduced.len(), 8 + 1);
        assert_eq!(reduced.title, "scan=7_phosphoRS");
        assert_eq!(reduced.max_mz(), Some(250.0));
        // The most intense peaks of the first window
        assert_eq!(reduced.min_mz(), Some(105.0));

        // Ties go to the shallowest depth
        let reduced = windowing
            .reduce(&spectrum, &ions, 2, |_, _, _| Ok(1.0))
            .unwrap();
        assert_eq!(reduced.len(), 2);
    }

    #[test]
    fn ppm_windows_use_nominal_width() {
        let tol = Tolerance::Ppm(-10.0, 10.0);
        let windowing = Windowing {
            tolerance: tol,
            ..Default::default()
        };
        // Windows [100, 200) and a partial [200, 300) spanning only 210-220
        let spectrum = spectrum(&[(100.0, 1.0), (150.0, 2.0), (210.0, 3.0), (220.0, 4.0)]);

        let mut seen = Vec::new();
        windowing
            .reduce(&spectrum, &SiteDeterminingIons::default(), 1, |_, depth, p| {
                seen.push((depth.min_mz().unwrap(), depth.len(), p));
                Ok(1.0 / depth.len() as f64)
            })
            .unwrap();
        assert_eq!(seen.len(), 4);

        for &(mz, n, p) in &seen {
            let lo = if mz >= 200.0 { 200.0 } else { 100.0 };
            // Accuracy at the window midpoint, width W even for the last window
            let d = tol.accuracy_in_da(lo + WINDOW_SIZE / 2.0);
            assert_eq!(p, match_probability(d, n, WINDOW_SIZE, decimals(d, WINDOW_SIZE)));
        }

        let (_, _, p) = seen
            .iter()
            .copied()
            .find(|&(mz, n, _)| mz >= 200.0 && n == 2)
            .unwrap();
        assert_eq!(p, 0.00005);
        let partial = match_probability(0.0025, 2, 20.0, decimals(0.0025, 20.0));
        assert_ne!(p, partial);
    }

    fn b_ions(mz: &[f64]) -> FragmentIonSet {
        FragmentIonSet::new(
            mz.iter()
                .enumerate()
                .map(|(ix, &mz)| FragmentIon {
                    ion_type: IonType::Backbone(Kind::B),
                    number: ix + 1,
                    charge: 1,
                    loss: None,
                    mz,
                })
                .collect(),
        )
    }

    #[test]
    fn diagnostic_windows() {
        // 120 is diagnostic for profile 0, 130 for profiles 1 and 2. 500 and
        // 600 fall outside the only window.
        let ions = SiteDeterminingIons::new(&[
            b_ions(&[120.0, 500.0]),
            b_ions(&[130.0, 500.0]),
            b_ions(&[130.0, 600.0]),
        ]);
        let spectrum = spectrum(&[(100.0, 1.0), (120.0, 4.0), (130.0, 3.0), (180.0, 2.0)]);
        let windowing = Windowing::default();

        let run = |separating: usize| {
            let mut calls = Vec::new();
            let reduced = windowing
                .reduce(&spectrum, &ions, 3, |target, depth, _| {
                    calls.push((depth.len(), target));
                    match target {
                        Target::Profile(ProfileIx(0)) => Ok(0.5),
                        Target::Profile(_) if depth.len() == separating => Ok(0.45),
                        Target::Profile(_) => Ok(0.1),
                        Target::Unmodified => panic!("window holds diagnostic ions"),
                    }
                })
                .unwrap();
            let mz = reduced.peaks().iter().map(|p| p.mz).collect::<Vec<_>>();
            (calls, mz)
        };

        let (calls, mz) = run(3);
        // Profiles 1 and 2 share their window set and are scored once per depth
        assert_eq!(calls.len(), 4 * 2);
        for len in 1..=4 {
            assert_eq!(calls.iter().filter(|(n, _)| *n == len).count(), 2);
        }
        assert!(calls
            .iter()
            .all(|(_, target)| *target != Target::Profile(ProfileIx(2))));
        // Largest delta (0.45 / 0.5) at depth 3
        assert_eq!(mz, vec![120.0, 130.0, 180.0]);

        // Largest delta at depth 1 is raised to the minimum depth
        let (_, mz) = run(1);
        assert_eq!(mz, vec![120.0, 130.0]);
    }

    #[test]
    fn single_peak_is_kept() {
        let spectrum = spectrum(&[(500.0, 1.0)]);
        let reduced = Windowing::default()
            .reduce(&spectrum, &SiteDeterminingIons::default(), 1, |_, _, p| {
                assert_eq!(p, 1.0);
                Ok(0.5)
            })
            .unwrap();
        assert_eq!(reduced.len(), 1);
    }

    #[test]
    fn rescoring_width() {
        let filtered = spectrum(&[(100.0, 1.0), (150.0, 1.0), (300.0, 1.0), (600.0, 1.0)]);
        let reduced = spectrum(&[(100.0, 1.0), (300.0, 1.0), (600.0, 1.0)]);
        let tol = Tolerance::Da(-0.5, 0.5);
        // d = 0.5, N = 3, w = 500
        assert!((rescoring_probability(&filtered, &reduced, &tol) - 0.003).abs() < 1e-12);
        assert_eq!(rescoring_probability(&reduced, &spectrum(&[(1.0, 1.0)]), &tol), 1.0);

        // Under ppm the accuracy is taken at the center of the span (350)
        let ppm = Tolerance::Ppm(-10.0, 10.0);
        let expected = match_probability(0.0035, 3, 500.0, decimals(0.0035, 500.0));
        assert!((rescoring_probability(&filtered, &reduced, &ppm) - expected).abs() < 1e-12);
    }
}
