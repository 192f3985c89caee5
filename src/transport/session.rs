use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::messages::{
    CurrentStatePayload, Inbound, OptimizationResultPayload, ServerMessage, SetPitCapacity,
};
use crate::domain::{PitReservoir, Snapshot};
use crate::optimizer::FlowAllocator;
use crate::report::ResultSummary;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Server reported: {0}")]
    Server(String),
    #[error("Failed to encode reply: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A server score together with when it arrived
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedResult {
    pub received_at: DateTime<Utc>,
    pub result: OptimizationResultPayload,
}

/// Turns inbound protocol text into replies.
///
/// Holds the allocator, and with it the pit, for as long as the process
/// runs, independently of any single connection.
pub struct Session {
    allocator: FlowAllocator,
    results: Vec<RecordedResult>,
    last_summary: Option<ResultSummary>,
    snapshots_handled: u64,
    snapshots_rejected: u64,
}

impl Session {
    pub fn new(allocator: FlowAllocator) -> Self {
        Self {
            allocator,
            results: Vec::new(),
            last_summary: None,
            snapshots_handled: 0,
            snapshots_rejected: 0,
        }
    }

    /// First message after connecting
    pub fn handshake(&self) -> Result<String, SessionError> {
        Ok(serde_json::to_string(&SetPitCapacity {
            set_pit_capacity: self.allocator.pit().capacity(),
        })?)
    }

    /// Handle one inbound text frame, returning the reply to send, if any.
    ///
    /// Only a server-reported error ends the session. Snapshots that cannot
    /// be allocated are logged and skipped so the next snapshot gets a fresh
    /// attempt.
    pub fn handle_text(&mut self, text: &str) -> Result<Option<String>, SessionError> {
        let inbound = match Inbound::parse(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable message");
                return Ok(None);
            }
        };

        match inbound {
            Inbound::ServerError(msg) => Err(SessionError::Server(msg)),
            Inbound::Message(ServerMessage::CurrentState(payload)) => {
                self.handle_current_state(payload)
            }
            Inbound::Message(ServerMessage::OptimizationResult(result)) => {
                info!(
                    incremental_revenue = result.incremental_revenue,
                    revenue_per_day = result.revenue_per_day,
                    flow_rate_to_operations = result.flow_rate_to_operations,
                    pit_volume = ?result.current_pit_volume,
                    "optimization result received"
                );
                self.results.push(RecordedResult {
                    received_at: Utc::now(),
                    result,
                });
                Ok(None)
            }
        }
    }

    fn handle_current_state(
        &mut self,
        payload: CurrentStatePayload,
    ) -> Result<Option<String>, SessionError> {
        let snapshot = match Snapshot::try_from(payload) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.snapshots_rejected += 1;
                warn!(error = %e, "rejecting snapshot");
                return Ok(None);
            }
        };

        let outcome = match self.allocator.allocate(&snapshot) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.snapshots_rejected += 1;
                warn!(error = %e, "no decision for snapshot");
                return Ok(None);
            }
        };

        let summary = outcome.summary(&snapshot);
        debug!(
            incremental_revenue = summary.incremental_revenue,
            revenue_per_day = summary.revenue_per_day,
            pit_volume = summary.current_pit_volume,
            "decision ready"
        );
        self.last_summary = Some(summary);
        self.snapshots_handled += 1;

        Ok(Some(serde_json::to_string(&outcome.decisions)?))
    }

    pub fn pit(&self) -> &PitReservoir {
        self.allocator.pit()
    }

    pub fn results(&self) -> &[RecordedResult] {
        &self.results
    }

    pub fn last_summary(&self) -> Option<&ResultSummary> {
        self.last_summary.as_ref()
    }

    pub fn snapshots_handled(&self) -> u64 {
        self.snapshots_handled
    }

    pub fn snapshots_rejected(&self) -> u64 {
        self.snapshots_rejected
    }
}
