//! Snapshot protocol messages
//!
//! The server pushes `CURRENT_STATE` snapshots and `OPTIMATION_RESULT`
//! scores (the server's own spelling) as JSON tagged by `type`, and plain
//! text starting with `Error` when it rejects something. The client answers
//! each snapshot with a decision array and announces its pit capacity once
//! after connecting.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::{Operation, RevenueCurve, RevenuePoint, Snapshot, SnapshotError};

/// Operation as sent by the server
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OperationPayload {
    #[validate(length(min = 1))]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[validate(length(min = 1))]
    pub revenue_structure: Vec<RevenuePoint>,
}

/// `CURRENT_STATE` body
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CurrentStatePayload {
    #[validate(range(min = 0.0))]
    pub flow_rate_in: f64,
    #[validate(length(min = 1), nested)]
    pub operations: Vec<OperationPayload>,
}

/// `OPTIMATION_RESULT` body: the server's scoring of our last decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResultPayload {
    pub incremental_revenue: f64,
    pub revenue_per_day: f64,
    pub flow_rate_in: f64,
    pub flow_rate_to_operations: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_pit_volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_pit_volume: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "CURRENT_STATE")]
    CurrentState(CurrentStatePayload),
    #[serde(rename = "OPTIMATION_RESULT")]
    OptimizationResult(OptimizationResultPayload),
}

/// Anything the server can send
#[derive(Debug, Clone)]
pub enum Inbound {
    Message(ServerMessage),
    ServerError(String),
}

impl Inbound {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        if text.starts_with("Error") {
            return Ok(Inbound::ServerError(text.to_string()));
        }
        serde_json::from_str(text).map(Inbound::Message)
    }
}

/// Sent once after connecting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPitCapacity {
    pub set_pit_capacity: f64,
}

impl TryFrom<CurrentStatePayload> for Snapshot {
    type Error = SnapshotError;

    fn try_from(payload: CurrentStatePayload) -> Result<Self, Self::Error> {
        payload
            .validate()
            .map_err(|e| SnapshotError::Malformed(e.to_string()))?;

        let operations = payload
            .operations
            .into_iter()
            .map(|op| {
                let curve = RevenueCurve::new(op.revenue_structure).map_err(|source| {
                    SnapshotError::InvalidCurve {
                        id: op.id.clone(),
                        source,
                    }
                })?;
                Ok(Operation::new(op.id, op.name, curve))
            })
            .collect::<Result<Vec<_>, SnapshotError>>()?;

        Snapshot::new(payload.flow_rate_in, operations)
    }
}
