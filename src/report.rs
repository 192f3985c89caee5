use serde::{Deserialize, Serialize};

use crate::domain::Snapshot;

/// Revenue summary for one allocation, for display and telemetry only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub incremental_revenue: f64,
    pub revenue_per_day: f64,
    pub flow_rate_in: f64,
    pub flow_rate_to_operations: f64,
    pub current_pit_volume: f64,
    pub maximum_pit_volume: f64,
}

/// Summarise an allocation.
///
/// `flows` is in snapshot operation order. The incremental revenue is
/// measured against every curve evaluated at zero flow. Pure, so calling it
/// again on the same inputs gives the same summary.
pub fn build_summary(
    snapshot: &Snapshot,
    flows: &[f64],
    pit_volume: f64,
    pit_capacity: f64,
) -> ResultSummary {
    let operations = snapshot.operations();

    let revenue_per_day: f64 = operations
        .iter()
        .zip(flows)
        .map(|(op, &flow)| op.curve.evaluate(flow))
        .sum();
    let baseline: f64 = operations.iter().map(|op| op.curve.evaluate(0.0)).sum();

    ResultSummary {
        incremental_revenue: revenue_per_day - baseline,
        revenue_per_day,
        flow_rate_in: snapshot.flow_rate_in(),
        flow_rate_to_operations: flows.iter().sum(),
        current_pit_volume: pit_volume,
        maximum_pit_volume: pit_capacity,
    }
}
