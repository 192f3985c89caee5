use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use super::{CurveError, RevenueCurve};

/// Reasons a snapshot is rejected before allocation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SnapshotError {
    #[error("Snapshot has no operations")]
    NoOperations,
    #[error("Invalid inbound flow rate: {0}")]
    InvalidFlowRate(f64),
    #[error("Operation has an empty id")]
    EmptyOperationId,
    #[error("Duplicate operation id: {0}")]
    DuplicateOperationId(String),
    #[error("Operation {id}: {source}")]
    InvalidCurve {
        id: String,
        #[source]
        source: CurveError,
    },
    #[error("Malformed snapshot: {0}")]
    Malformed(String),
}

/// A consumer of flow with its revenue curve
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub id: String,
    pub name: String,
    pub curve: RevenueCurve,
}

impl Operation {
    pub fn new(id: impl Into<String>, name: impl Into<String>, curve: RevenueCurve) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            curve,
        }
    }
}

/// Validated description of the flow available now and who can use it.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    flow_rate_in: f64,
    operations: Vec<Operation>,
}

impl Snapshot {
    pub fn new(flow_rate_in: f64, operations: Vec<Operation>) -> Result<Self, SnapshotError> {
        if !flow_rate_in.is_finite() || flow_rate_in < 0.0 {
            return Err(SnapshotError::InvalidFlowRate(flow_rate_in));
        }
        if operations.is_empty() {
            return Err(SnapshotError::NoOperations);
        }

        let mut seen = HashSet::with_capacity(operations.len());
        for op in &operations {
            if op.id.is_empty() {
                return Err(SnapshotError::EmptyOperationId);
            }
            if !seen.insert(op.id.as_str()) {
                return Err(SnapshotError::DuplicateOperationId(op.id.clone()));
            }
        }

        Ok(Self {
            flow_rate_in,
            operations,
        })
    }

    pub fn flow_rate_in(&self) -> f64 {
        self.flow_rate_in
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }
}

/// Flow assigned to one operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub operation_id: String,
    pub flow_rate: f64,
}
