use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::stats::{self, BootstrapSettings};
use crate::domain::Event;
use crate::error::{EventStudyError, Result};
use crate::models::{EventWindowResult, ModelParams, ReturnSeries};
use crate::utils::maths_utils;

/// Window lengths in periods (bars) of the return series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    /// E: periods immediately before the event bar used for the baseline
    pub estimation: usize,
    /// W: periods after the event bar; offsets run 0..=W
    pub event: usize,
}

impl WindowSpec {
    pub fn window_len(&self) -> usize {
        self.event + 1
    }
}

/// How expected returns are formed.
///
/// `MeanAdjusted` (a flat estimation-window mean) is the default and the
/// documented model; `MarketModel` is opt-in.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NormalReturnModel {
    #[default]
    MeanAdjusted,
    MarketModel {
        benchmark: String,
        min_observations: usize,
    },
}

/// Raw estimator output before event metadata is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct AbnormalReturns {
    pub anchor_index: usize,
    pub anchor_ts: DateTime<Utc>,
    pub baseline: f64,
    pub params: ModelParams,
    pub ar: Vec<f64>,
    pub car: Vec<f64>,
}

impl AbnormalReturns {
    /// Estimation-window slice of `returns` this result was built from
    pub fn estimation_returns<'a>(&self, returns: &'a ReturnSeries, spec: &WindowSpec) -> &'a [f64] {
        &returns.returns()[self.anchor_index - spec.estimation..self.anchor_index]
    }
}

/// Find the event bar and check the series spans E periods before it and W after.
fn locate_event(returns: &ReturnSeries, event_ts: DateTime<Utc>, spec: &WindowSpec) -> Result<usize> {
    let not_covered = |available_before: usize, available_after: usize| {
        EventStudyError::EventNotCovered {
            event_ts,
            needed_before: spec.estimation,
            needed_after: spec.event,
            available_before,
            available_after,
        }
    };

    let index = returns
        .index_at_or_before(event_ts)
        .ok_or_else(|| not_covered(0, 0))?;
    let available_before = index;
    let available_after = returns.len() - 1 - index;
    if available_before < spec.estimation || available_after < spec.event {
        return Err(not_covered(available_before, available_after));
    }
    Ok(index)
}

/// Flat-baseline abnormal returns.
///
/// baseline = mean of the E returns before the event bar,
/// AR[k] = r[index + k] - baseline for k = 0..=W, CAR = running sum of AR.
pub fn estimate_abnormal_returns(
    returns: &ReturnSeries,
    event_ts: DateTime<Utc>,
    spec: &WindowSpec,
) -> Result<AbnormalReturns> {
    let index = locate_event(returns, event_ts, spec)?;
    let rets = returns.returns();

    let estimation = &rets[index - spec.estimation..index];
    // E = 0 leaves nothing to average; treat the expected return as zero
    let baseline = maths_utils::mean(estimation).unwrap_or(0.0);

    let ar: Vec<f64> = rets[index..=index + spec.event]
        .iter()
        .map(|r| r - baseline)
        .collect();
    let car = maths_utils::cumulative_sum(&ar);

    Ok(AbnormalReturns {
        anchor_index: index,
        anchor_ts: returns.timestamps()[index],
        baseline,
        params: ModelParams {
            alpha: baseline,
            beta: 0.0,
        },
        ar,
        car,
    })
}

/// Market-model abnormal returns against a benchmark series.
///
/// alpha/beta come from OLS over the estimation window, pairing bars by
/// timestamp. Every event-window bar needs a benchmark return.
pub fn estimate_market_model(
    returns: &ReturnSeries,
    benchmark: &ReturnSeries,
    event_ts: DateTime<Utc>,
    spec: &WindowSpec,
    min_observations: usize,
) -> Result<AbnormalReturns> {
    let index = locate_event(returns, event_ts, spec)?;
    let rets = returns.returns();
    let stamps = returns.timestamps();

    let (bench_est, target_est): (Vec<f64>, Vec<f64>) = (index - spec.estimation..index)
        .filter_map(|i| benchmark.return_at(stamps[i]).map(|b| (b, rets[i])))
        .unzip();
    let params = stats::ols_alpha_beta(&bench_est, &target_est, min_observations);
    let baseline = maths_utils::mean(&rets[index - spec.estimation..index]).unwrap_or(0.0);

    let mut ar = Vec::with_capacity(spec.window_len());
    for i in index..=index + spec.event {
        let bench = benchmark.return_at(stamps[i]).ok_or_else(|| {
            EventStudyError::InsufficientData {
                needed: spec.window_len(),
                got: i - index,
            }
        })?;
        ar.push(rets[i] - (params.alpha + params.beta * bench));
    }
    let car = maths_utils::cumulative_sum(&ar);

    Ok(AbnormalReturns {
        anchor_index: index,
        anchor_ts: stamps[index],
        baseline,
        params,
        ar,
        car,
    })
}

/// Per-event evaluation: picks the model, runs the estimator, attaches the
/// optional bootstrap interval and the event metadata.
pub struct EventStudy<'a> {
    pub spec: WindowSpec,
    pub model: &'a NormalReturnModel,
    pub bootstrap: Option<&'a BootstrapSettings>,
}

impl EventStudy<'_> {
    pub fn evaluate(
        &self,
        event: &Event,
        returns: &ReturnSeries,
        benchmark: Option<&ReturnSeries>,
    ) -> Result<EventWindowResult> {
        let abnormal = match (self.model, benchmark) {
            (NormalReturnModel::MarketModel { min_observations, .. }, Some(bench)) => {
                estimate_market_model(returns, bench, event.timestamp, &self.spec, *min_observations)?
            }
            _ => estimate_abnormal_returns(returns, event.timestamp, &self.spec)?,
        };

        let car_ci = self.bootstrap.and_then(|settings| {
            stats::bootstrap_car_ci(
                abnormal.estimation_returns(returns, &self.spec),
                abnormal.ar.len(),
                settings,
            )
        });

        Ok(EventWindowResult {
            event_id: event.id.clone(),
            symbol: event.symbol.clone(),
            category: event.category.clone(),
            direction: event.direction,
            event_ts: event.timestamp,
            anchor_ts: abnormal.anchor_ts,
            baseline: abnormal.baseline,
            params: abnormal.params,
            ar: abnormal.ar,
            car: abnormal.car,
            car_ci,
        })
    }
}
