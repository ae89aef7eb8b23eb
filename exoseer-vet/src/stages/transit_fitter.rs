//! Transit fitter
//!
//! Produces a coarse [`TransitFit`] from a light curve.
//!
//! - With an expected period, depth and SNR come from the flux dispersion and
//!   the duration is a fixed fraction of the period.
//! - Without one, a box least squares (BLS) search over a log-spaced period
//!   grid locates the strongest periodic dip.
//!
//! Any failure yields [`FALLBACK_FIT`] marked degraded.

use super::{mean_std, StageError};
use crate::types::{LightCurveSeries, StageOutcome, TransitFit};
use exoseer_common::config::FitterThresholds;
use tracing::{debug, warn};

/// Fit reported when fitting is impossible
pub const FALLBACK_FIT: TransitFit = TransitFit {
    period: 10.0,
    depth: 0.001,
    duration: 2.0,
    snr: 5.0,
    chi_squared: 1.5,
};

/// Reduced chi-squared reported for the dispersion fit
const NOMINAL_CHI_SQUARED: f64 = 1.2;

/// Minimum samples for a period search
const MIN_SEARCH_SAMPLES: usize = 20;

/// Minimum in-transit samples for a box to count
const MIN_IN_TRANSIT: usize = 3;

/// Phase resolution of the folded light curve
const PHASE_BINS: usize = 200;

/// Trial box widths, in phase bins
const BOX_WIDTHS: [usize; 5] = [2, 4, 8, 16, 24];

/// Fit a light curve, falling back to [`FALLBACK_FIT`] on failure
pub fn fit(
    series: &LightCurveSeries,
    expected_period: Option<f64>,
    thresholds: &FitterThresholds,
) -> StageOutcome<TransitFit> {
    match try_fit(series, expected_period, thresholds) {
        Ok(fit) => {
            debug!(
                period = fit.period,
                depth = fit.depth,
                snr = fit.snr,
                "Transit fit complete"
            );
            StageOutcome::Ok(fit)
        }
        Err(e) => {
            warn!(
                target_name = %series.target_name,
                samples = series.time.len(),
                error = %e,
                "Transit fit failed, using fallback fit"
            );
            StageOutcome::degraded(FALLBACK_FIT, e.to_string())
        }
    }
}

fn try_fit(
    series: &LightCurveSeries,
    expected_period: Option<f64>,
    thresholds: &FitterThresholds,
) -> Result<TransitFit, StageError> {
    if let Some(defect) = series.defect() {
        return Err(StageError::MalformedSeries(defect));
    }

    let fit = match expected_period {
        Some(period) if period.is_finite() && period > 0.0 => {
            dispersion_fit(&series.flux, period, thresholds)
        }
        Some(period) => {
            debug!(period, "Ignoring unusable expected period, searching instead");
            search_period(series, thresholds)?
        }
        None => search_period(series, thresholds)?,
    };

    if !fit.is_valid() {
        return Err(StageError::Implausible(format!(
            "fit violates invariants: period={} depth={} duration={} snr={}",
            fit.period, fit.depth, fit.duration, fit.snr
        )));
    }
    Ok(fit)
}

/// Fit with a known period from the flux dispersion alone
fn dispersion_fit(flux: &[f64], period: f64, thresholds: &FitterThresholds) -> TransitFit {
    let (_, std) = mean_std(flux);
    let depth = (3.0 * std).max(thresholds.floor_depth);
    let snr = if std > 0.0 {
        (depth / std).min(thresholds.snr_cap)
    } else {
        thresholds.snr_cap
    };

    TransitFit {
        period,
        depth,
        duration: period * thresholds.duration_fraction,
        snr,
        chi_squared: NOMINAL_CHI_SQUARED,
    }
}

/// Log-spaced trial periods from `min` to `max` inclusive
pub fn log_period_grid(min: f64, max: f64, steps: usize) -> Vec<f64> {
    if steps < 2 || !(min > 0.0 && max > min) {
        return Vec::new();
    }
    let (ln_min, ln_max) = (min.ln(), max.ln());
    let step = (ln_max - ln_min) / (steps - 1) as f64;
    (0..steps).map(|i| (ln_min + step * i as f64).exp()).collect()
}

/// Best box found at one trial period
#[derive(Debug, Clone, Copy)]
struct BoxCandidate {
    period: f64,
    power: f64,
    start_bin: usize,
    width_bins: usize,
}

fn phase_bin(time: f64, epoch: f64, period: f64) -> usize {
    let phase = ((time - epoch) / period).rem_euclid(1.0);
    ((phase * PHASE_BINS as f64) as usize).min(PHASE_BINS - 1)
}

fn in_window(bin: usize, start: usize, width: usize) -> bool {
    (bin + PHASE_BINS - start) % PHASE_BINS < width
}

/// Strongest dip at one period by scanning box positions and widths
fn best_box(time: &[f64], residuals: &[f64], period: f64) -> Option<BoxCandidate> {
    let epoch = time[0];
    let n = residuals.len() as f64;
    let mut sums = [0.0f64; PHASE_BINS];
    let mut counts = [0usize; PHASE_BINS];
    for (t, r) in time.iter().zip(residuals) {
        let bin = phase_bin(*t, epoch, period);
        sums[bin] += r;
        counts[bin] += 1;
    }

    let mut best: Option<BoxCandidate> = None;
    for &width in BOX_WIDTHS.iter() {
        for start in 0..PHASE_BINS {
            let (mut s, mut c) = (0.0, 0usize);
            for k in 0..width {
                let bin = (start + k) % PHASE_BINS;
                s += sums[bin];
                c += counts[bin];
            }
            if c < MIN_IN_TRANSIT || c as f64 >= n || s >= 0.0 {
                continue;
            }
            let r = c as f64 / n;
            let power = (s / n).powi(2) / (r * (1.0 - r));
            if best.map_or(true, |b| power > b.power) {
                best = Some(BoxCandidate {
                    period,
                    power,
                    start_bin: start,
                    width_bins: width,
                });
            }
        }
    }
    best
}

/// BLS period search
fn search_period(
    series: &LightCurveSeries,
    thresholds: &FitterThresholds,
) -> Result<TransitFit, StageError> {
    let n = series.time.len();
    if n < MIN_SEARCH_SAMPLES {
        return Err(StageError::InsufficientData(format!(
            "{} samples, period search needs at least {}",
            n, MIN_SEARCH_SAMPLES
        )));
    }

    let (mean, std) = mean_std(&series.flux);
    if std <= 0.0 {
        return Err(StageError::InsufficientData(
            "flux has no variation to search".to_string(),
        ));
    }

    let residuals: Vec<f64> = series.flux.iter().map(|f| f - mean).collect();
    let grid = log_period_grid(
        thresholds.min_period,
        thresholds.max_period,
        thresholds.period_steps,
    );

    let best = grid
        .iter()
        .filter_map(|&period| best_box(&series.time, &residuals, period))
        .fold(None::<BoxCandidate>, |best, c| match best {
            Some(b) if b.power >= c.power => Some(b),
            _ => Some(c),
        })
        .ok_or_else(|| StageError::Numeric("no trial period produced a dip".to_string()))?;

    let epoch = series.time[0];
    let in_transit: Vec<bool> = series
        .time
        .iter()
        .map(|t| in_window(phase_bin(*t, epoch, best.period), best.start_bin, best.width_bins))
        .collect();

    let (mut in_sum, mut in_count) = (0.0, 0usize);
    for (r, inside) in residuals.iter().zip(&in_transit) {
        if *inside {
            in_sum += r;
            in_count += 1;
        }
    }
    if in_count == 0 || in_count == n {
        return Err(StageError::Numeric("degenerate transit window".to_string()));
    }

    let in_level = mean + in_sum / in_count as f64;
    let out_level = mean - in_sum / (n - in_count) as f64;
    let depth = (out_level - in_level) / out_level;
    let snr = (out_level - in_level) / (std / (in_count as f64).sqrt());

    // noise level from out-of-transit points; the whole-series spread includes the dip
    let out_of_transit: Vec<f64> = series
        .flux
        .iter()
        .zip(&in_transit)
        .filter(|(_, inside)| !**inside)
        .map(|(f, _)| *f)
        .collect();
    let (_, out_std) = mean_std(&out_of_transit);
    let noise = if out_std > 0.0 { out_std } else { std };

    let errors = series.flux_err.as_deref();
    let chi_sum: f64 = series
        .flux
        .iter()
        .zip(&in_transit)
        .enumerate()
        .map(|(i, (f, inside))| {
            let model = if *inside { in_level } else { out_level };
            let sigma = errors
                .and_then(|e| e.get(i).copied())
                .filter(|s| *s > 0.0)
                .unwrap_or(noise);
            ((f - model) / sigma).powi(2)
        })
        .sum();
    // period, epoch, width and depth are free
    let chi_squared = chi_sum / (n - 4) as f64;

    let duration = best.width_bins as f64 / PHASE_BINS as f64 * best.period * 24.0;

    debug!(
        period = best.period,
        power = best.power,
        in_transit = in_count,
        "Period search selected best box"
    );

    Ok(TransitFit {
        period: best.period,
        depth,
        duration,
        snr,
        chi_squared,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn thresholds() -> FitterThresholds {
        FitterThresholds::default()
    }

    fn series(time: Vec<f64>, flux: Vec<f64>) -> LightCurveSeries {
        LightCurveSeries::new("TEST-1", "TESS", time, flux, None)
    }

    #[test]
    fn test_known_period_uses_dispersion() {
        let s = series(
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            vec![1.0, 1.0, 1.0, 0.999, 1.0, 1.0],
        );
        let outcome = fit(&s, Some(10.0), &thresholds());
        assert!(!outcome.is_degraded());

        let fit = outcome.into_value();
        assert_eq!(fit.period, 10.0);
        assert!((fit.depth - 1.118e-3).abs() < 1e-6);
        assert!((fit.snr - 3.0).abs() < 1e-9);
        assert!((fit.duration - 1.0).abs() < 1e-12);
        assert_eq!(fit.chi_squared, 1.2);
    }

    #[test]
    fn test_flat_series_uses_floor_depth_and_cap() {
        let s = series(vec![0.0, 1.0, 2.0], vec![1.0, 1.0, 1.0]);
        let fit = fit(&s, Some(4.0), &thresholds()).into_value();
        assert_eq!(fit.depth, 0.0005);
        assert_eq!(fit.snr, 20.0);
    }

    #[test]
    fn test_empty_series_falls_back() {
        let s = series(vec![], vec![]);
        let outcome = fit(&s, None, &thresholds());
        assert!(outcome.is_degraded());
        assert_eq!(*outcome.value(), FALLBACK_FIT);
    }

    #[test]
    fn test_mismatched_lengths_fall_back() {
        let s = series(vec![0.0, 1.0, 2.0], vec![1.0, 1.0]);
        let outcome = fit(&s, Some(3.0), &thresholds());
        assert!(outcome.is_degraded());
        assert_eq!(outcome.into_value(), FALLBACK_FIT);
    }

    #[test]
    fn test_short_series_without_period_falls_back() {
        let s = series(vec![0.0, 1.0, 2.0], vec![1.0, 0.99, 1.0]);
        let outcome = fit(&s, None, &thresholds());
        assert!(outcome.reason().unwrap().contains("insufficient data"));
    }

    #[test]
    fn test_log_period_grid_endpoints() {
        let grid = log_period_grid(0.5, 50.0, 100);
        assert_eq!(grid.len(), 100);
        assert!((grid[0] - 0.5).abs() < 1e-12);
        assert!((grid[99] - 50.0).abs() < 1e-9);
        assert!(grid.windows(2).all(|w| w[1] > w[0]));
        assert!(log_period_grid(1.0, 0.5, 10).is_empty());
    }

    #[test]
    fn test_period_search_recovers_injected_transit() {
        let t = thresholds();
        let grid = log_period_grid(t.min_period, t.max_period, t.period_steps);
        let period = grid[50];
        let duration_days = 0.04 * period;

        let time: Vec<f64> = (0..4000).map(|i| i as f64 * 0.01).collect();
        let flux: Vec<f64> = time
            .iter()
            .map(|&x| {
                let phase = (x - 1.0).rem_euclid(period);
                if phase < duration_days {
                    0.99
                } else {
                    1.0
                }
            })
            .collect();

        let outcome = fit(&series(time, flux), None, &t);
        assert!(!outcome.is_degraded(), "{:?}", outcome.reason());

        let fit = outcome.into_value();
        assert!((fit.period - period).abs() / period < 1e-9);
        assert!((fit.depth - 0.01).abs() < 0.0025, "depth {}", fit.depth);
        assert!(fit.snr > 7.0);
        assert!(fit.duration > 0.0);
    }

    #[test]
    fn test_chi_squared_near_one_for_white_noise() {
        let t = thresholds();
        let grid = log_period_grid(t.min_period, t.max_period, t.period_steps);
        let period = grid[50];
        let duration_days = 8.0 / PHASE_BINS as f64 * period;

        let mut rng = StdRng::seed_from_u64(42);
        let noise = Normal::new(0.0, 0.001).unwrap();
        let time: Vec<f64> = (0..4000).map(|i| i as f64 * 0.01).collect();
        let flux: Vec<f64> = time
            .iter()
            .map(|&x| {
                let level = if x.rem_euclid(period) < duration_days {
                    0.99
                } else {
                    1.0
                };
                level + noise.sample(&mut rng)
            })
            .collect();

        let outcome = fit(&series(time, flux), None, &t);
        assert!(!outcome.is_degraded(), "{:?}", outcome.reason());

        let fit = outcome.into_value();
        assert!((fit.period - period).abs() / period < 1e-9);
        assert!(
            (fit.chi_squared - 1.0).abs() < 0.15,
            "chi_squared {}",
            fit.chi_squared
        );
    }
}
