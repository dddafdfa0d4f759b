use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::statistics::{Data, OrderStatistics, Statistics};

use crate::models::{ConfidenceInterval, ModelParams};

/// Settings for the CAR bootstrap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BootstrapSettings {
    pub iterations: usize,
    pub seed: u64,
    /// Windows of this many offsets or fewer get no interval
    pub min_window_len: usize,
    /// Estimation sample must exceed the window length by more than this
    pub min_extra_samples: usize,
}

/// 2.5% / 97.5% quantiles of `values`, interpolated linearly between order
/// statistics. None for an empty input.
pub fn quantile_ci(values: Vec<f64>) -> Option<ConfidenceInterval> {
    let finite: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    let n = finite.len();
    let mut data = Data::new(finite);
    Some(ConfidenceInterval {
        low: linear_quantile(&mut data, n, 0.025),
        high: linear_quantile(&mut data, n, 0.975),
    })
}

// Type 7: h = (n - 1) * tau, interpolated between the floor and ceil order statistics
fn linear_quantile(data: &mut Data<Vec<f64>>, n: usize, tau: f64) -> f64 {
    let h = (n - 1) as f64 * tau.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let below = data.order_statistic(lo + 1);
    let above = data.order_statistic(hi + 1);
    below + (h - lo as f64) * (above - below)
}

/// Sample standard deviation, None with fewer than two values
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    Some(values.iter().std_dev())
}

/// Ordinary least squares for y ~ alpha + beta * x.
///
/// With fewer than `min_observations` pairs the fit is not trusted and
/// (0, 0) comes back. A flat x gives beta = 0 and alpha = mean(y).
pub fn ols_alpha_beta(x: &[f64], y: &[f64], min_observations: usize) -> ModelParams {
    debug_assert_eq!(x.len(), y.len());
    let n = x.len().min(y.len());
    if n < min_observations || n == 0 {
        return ModelParams {
            alpha: 0.0,
            beta: 0.0,
        };
    }
    let x = &x[..n];
    let y = &y[..n];
    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;

    let (sxy, sxx) = x
        .iter()
        .zip(y)
        .fold((0.0, 0.0), |(sxy, sxx), (xi, yi)| {
            let dx = xi - mean_x;
            (sxy + dx * (yi - mean_y), sxx + dx * dx)
        });

    if sxx == 0.0 {
        return ModelParams {
            alpha: mean_y,
            beta: 0.0,
        };
    }
    let beta = sxy / sxx;
    ModelParams {
        alpha: mean_y - beta * mean_x,
        beta,
    }
}

/// Bootstrap interval for a CAR of `window_len` offsets: sum randomly placed
/// consecutive windows of the estimation-period returns and take the 2.5% /
/// 97.5% quantiles. Seeded, so repeated calls agree.
pub fn bootstrap_car_ci(
    estimation_returns: &[f64],
    window_len: usize,
    settings: &BootstrapSettings,
) -> Option<ConfidenceInterval> {
    if window_len <= settings.min_window_len
        || estimation_returns.len() <= window_len + settings.min_extra_samples
        || settings.iterations == 0
    {
        return None;
    }

    let mut rng = StdRng::seed_from_u64(settings.seed);
    let last_start = estimation_returns.len() - window_len;
    let sums: Vec<f64> = (0..settings.iterations)
        .map(|_| {
            let start = rng.random_range(0..last_start);
            estimation_returns[start..start + window_len].iter().sum()
        })
        .collect();
    quantile_ci(sums)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> BootstrapSettings {
        BootstrapSettings {
            iterations: 500,
            seed: 42,
            min_window_len: 3,
            min_extra_samples: 10,
        }
    }

    #[test]
    fn test_ols_recovers_line() {
        let x: Vec<f64> = (0..20).map(|i| i as f64 * 0.001).collect();
        let y: Vec<f64> = x.iter().map(|v| 0.002 + 1.5 * v).collect();
        let params = ols_alpha_beta(&x, &y, 10);
        assert!((params.alpha - 0.002).abs() < 1e-12);
        assert!((params.beta - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_ols_too_few_observations() {
        let params = ols_alpha_beta(&[0.1, 0.2], &[0.3, 0.4], 10);
        assert_eq!(params, ModelParams { alpha: 0.0, beta: 0.0 });
    }

    #[test]
    fn test_ols_flat_regressor() {
        let params = ols_alpha_beta(&[0.0; 12], &[0.01; 12], 10);
        assert_eq!(params.beta, 0.0);
        assert!((params.alpha - 0.01).abs() < 1e-15);
    }

    #[test]
    fn test_bootstrap_is_deterministic_and_ordered() {
        let rets: Vec<f64> = (0..200).map(|i| ((i * 7919) % 23) as f64 * 1e-4 - 0.001).collect();
        let a = bootstrap_car_ci(&rets, 25, &settings()).unwrap();
        let b = bootstrap_car_ci(&rets, 25, &settings()).unwrap();
        assert_eq!(a, b);
        assert!(a.low <= a.high);
    }

    #[test]
    fn test_bootstrap_needs_enough_samples() {
        let rets = vec![0.001; 30];
        assert!(bootstrap_car_ci(&rets, 25, &settings()).is_none());
        assert!(bootstrap_car_ci(&rets, 3, &settings()).is_none());
    }

    #[test]
    fn test_quantile_ci_of_constant() {
        let ci = quantile_ci(vec![0.5; 10]).unwrap();
        assert_eq!(ci.low, 0.5);
        assert_eq!(ci.high, 0.5);
        assert!(quantile_ci(vec![]).is_none());
    }

    #[test]
    fn test_quantile_ci_interpolates_small_samples() {
        // five events: bounds sit between the order statistics, not on the extremes
        let ci = quantile_ci(vec![5.0, 1.0, 4.0, 2.0, 3.0]).unwrap();
        assert!((ci.low - 1.1).abs() < 1e-12);
        assert!((ci.high - 4.9).abs() < 1e-12);

        let single = quantile_ci(vec![0.2, f64::NAN]).unwrap();
        assert_eq!(single.low, 0.2);
        assert_eq!(single.high, 0.2);
    }

    #[test]
    fn test_sample_std_dev() {
        assert!(sample_std_dev(&[1.0]).is_none());
        let sd = sample_std_dev(&[1.0, 3.0]).unwrap();
        assert!((sd - 2f64.sqrt()).abs() < 1e-12);
    }
}
