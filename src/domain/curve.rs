use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Revenue curve construction errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CurveError {
    #[error("Revenue curve has no sample points")]
    Empty,
    #[error("Non-finite sample at index {0}")]
    NonFinite(usize),
    #[error("Samples out of order at index {index}: {flow} after {previous}")]
    Unordered { index: usize, previous: f64, flow: f64 },
}

/// One sample of an operation's revenue structure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenuePoint {
    pub flow_per_day: f64,
    #[serde(rename = "dollarsPerDay")]
    pub revenue_per_day: f64,
}

impl RevenuePoint {
    pub fn new(flow_per_day: f64, revenue_per_day: f64) -> Self {
        Self {
            flow_per_day,
            revenue_per_day,
        }
    }
}

/// Piecewise-linear revenue-vs-flow curve.
///
/// Samples are kept in the order given. Construction rejects samples whose
/// flow decreases, so evaluation can scan once without sorting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RevenueCurve {
    points: Vec<RevenuePoint>,
}

impl RevenueCurve {
    pub fn new(points: Vec<RevenuePoint>) -> Result<Self, CurveError> {
        if points.is_empty() {
            return Err(CurveError::Empty);
        }

        for (index, p) in points.iter().enumerate() {
            if !p.flow_per_day.is_finite() || !p.revenue_per_day.is_finite() {
                return Err(CurveError::NonFinite(index));
            }
            if index > 0 {
                let previous = points[index - 1].flow_per_day;
                if p.flow_per_day < previous {
                    return Err(CurveError::Unordered {
                        index,
                        previous,
                        flow: p.flow_per_day,
                    });
                }
            }
        }

        Ok(Self { points })
    }

    /// Build from `(flow, revenue)` pairs
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self, CurveError> {
        Self::new(
            pairs
                .iter()
                .map(|&(flow, revenue)| RevenuePoint::new(flow, revenue))
                .collect(),
        )
    }

    pub fn points(&self) -> &[RevenuePoint] {
        &self.points
    }

    /// Smallest sampled flow. Requests below it clamp to its revenue.
    pub fn first_flow(&self) -> f64 {
        self.points[0].flow_per_day
    }

    /// Largest sampled flow. Requests above it evaluate to negative infinity.
    pub fn last_flow(&self) -> f64 {
        self.points[self.points.len() - 1].flow_per_day
    }

    /// Revenue per day at `flow`.
    ///
    /// An exact sample match returns the sample's revenue untouched. Between
    /// samples the result is interpolated on the segment joining the highest
    /// sample below `flow` and the first sample above it. Below the first
    /// sample the first revenue is returned. Above the last sample the curve
    /// is unmodeled and the result is `f64::NEG_INFINITY`, so no allocation
    /// will ever prefer flow the curve cannot price.
    pub fn evaluate(&self, flow: f64) -> f64 {
        let mut lower = 0;
        for (k, point) in self.points.iter().enumerate() {
            if flow == point.flow_per_day {
                return point.revenue_per_day;
            } else if flow > point.flow_per_day {
                lower = k;
            } else {
                if k == 0 {
                    // Nothing below to interpolate from
                    return point.revenue_per_day;
                }
                let low = &self.points[lower];
                let slope = (point.revenue_per_day - low.revenue_per_day)
                    / (point.flow_per_day - low.flow_per_day);
                return low.revenue_per_day + slope * (flow - low.flow_per_day);
            }
        }

        f64::NEG_INFINITY
    }
}

impl TryFrom<Vec<RevenuePoint>> for RevenueCurve {
    type Error = CurveError;

    fn try_from(points: Vec<RevenuePoint>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}
