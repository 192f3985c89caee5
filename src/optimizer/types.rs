use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{Decision, PitReservoir, Snapshot, SnapshotError};
use crate::report::{build_summary, ResultSummary};

/// Reasons an allocation call produced no decision
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AllocationError {
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(#[from] SnapshotError),
    #[error("No operation can price the remaining flow and the pit cannot hold it ({unallocated} unallocated)")]
    UnmodeledFlow { unallocated: f64 },
    #[error("Strategy returned {got} flows for {expected} operations")]
    FlowCountMismatch { expected: usize, got: usize },
}

/// What a strategy decided for one snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkedAllocation {
    /// Flow per operation, in snapshot order
    pub flows: Vec<f64>,
    /// Flow absorbed by the pit during the call
    pub stored_in_pit: f64,
    /// Flow meant for the pit that did not fit and went to an operation
    pub rerouted_overflow: f64,
    /// Loop iterations
    pub chunks: usize,
}

impl ChunkedAllocation {
    pub fn zeroed(operations: usize) -> Self {
        Self {
            flows: vec![0.0; operations],
            ..Default::default()
        }
    }

    pub fn flow_to_operations(&self) -> f64 {
        self.flows.iter().sum()
    }
}

/// Splits a snapshot's flow between operations and the pit.
///
/// Implementations mutate the pit directly. The caller restores it if the
/// call fails.
#[cfg_attr(test, mockall::automock)]
pub trait AllocationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn allocate(
        &self,
        snapshot: &Snapshot,
        pit: &mut PitReservoir,
    ) -> Result<ChunkedAllocation, AllocationError>;
}

/// Result of one successful allocation call
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationOutcome {
    pub decisions: Vec<Decision>,
    pub allocation: ChunkedAllocation,
    pub pit_volume_before: f64,
    pub pit_volume_after: f64,
    pub pit_capacity: f64,
}

impl AllocationOutcome {
    pub fn summary(&self, snapshot: &Snapshot) -> ResultSummary {
        build_summary(
            snapshot,
            &self.allocation.flows,
            self.pit_volume_after,
            self.pit_capacity,
        )
    }
}

/// Owns the pit and runs one strategy call per snapshot.
pub struct FlowAllocator {
    pit: PitReservoir,
    strategy: Box<dyn AllocationStrategy>,
}

impl FlowAllocator {
    pub fn new(pit: PitReservoir, strategy: Box<dyn AllocationStrategy>) -> Self {
        Self { pit, strategy }
    }

    pub fn pit(&self) -> &PitReservoir {
        &self.pit
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Allocate one snapshot.
    ///
    /// On success the post-call pit volume is appended to the pit history.
    /// On failure the pit is left as it was before the call.
    pub fn allocate(&mut self, snapshot: &Snapshot) -> Result<AllocationOutcome, AllocationError> {
        let checkpoint = self.pit.checkpoint();
        let pit_volume_before = self.pit.volume();

        let allocation = match self.strategy.allocate(snapshot, &mut self.pit) {
            Ok(allocation) if allocation.flows.len() == snapshot.operations().len() => allocation,
            Ok(allocation) => {
                self.pit.restore(checkpoint);
                return Err(AllocationError::FlowCountMismatch {
                    expected: snapshot.operations().len(),
                    got: allocation.flows.len(),
                });
            }
            Err(e) => {
                self.pit.restore(checkpoint);
                warn!(
                    strategy = self.strategy.name(),
                    flow_rate_in = snapshot.flow_rate_in(),
                    error = %e,
                    "allocation rejected, pit left unchanged"
                );
                return Err(e);
            }
        };

        let pit_volume_after = self.pit.volume();
        self.pit.record_history(pit_volume_after);

        let decisions = snapshot
            .operations()
            .iter()
            .zip(&allocation.flows)
            .map(|(op, &flow_rate)| Decision {
                operation_id: op.id.clone(),
                flow_rate,
            })
            .collect();

        debug!(
            strategy = self.strategy.name(),
            flow_rate_in = snapshot.flow_rate_in(),
            pit_before = pit_volume_before,
            pit_after = pit_volume_after,
            to_operations = allocation.flow_to_operations(),
            stored = allocation.stored_in_pit,
            rerouted = allocation.rerouted_overflow,
            chunks = allocation.chunks,
            "snapshot allocated"
        );

        Ok(AllocationOutcome {
            decisions,
            allocation,
            pit_volume_before,
            pit_volume_after,
            pit_capacity: self.pit.capacity(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Operation, RevenueCurve};

    fn snapshot() -> Snapshot {
        let curve = RevenueCurve::from_pairs(&[(0.0, 0.0), (100.0, 100.0)]).unwrap();
        Snapshot::new(
            10.0,
            vec![
                Operation::new("a", "A", curve.clone()),
                Operation::new("b", "B", curve),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_successful_call_records_history_and_decisions() {
        let mut strategy = MockAllocationStrategy::new();
        strategy.expect_name().return_const("mock");
        strategy.expect_allocate().times(1).returning(|_, pit| {
            pit.withdraw_all();
            pit.deposit(3.0);
            Ok(ChunkedAllocation {
                flows: vec![4.0, 5.0],
                stored_in_pit: 3.0,
                rerouted_overflow: 0.0,
                chunks: 1,
            })
        });

        let pit = PitReservoir::with_volume(50.0, 2.0).unwrap();
        let mut allocator = FlowAllocator::new(pit, Box::new(strategy));
        let outcome = allocator.allocate(&snapshot()).unwrap();

        assert_eq!(outcome.pit_volume_before, 2.0);
        assert_eq!(outcome.pit_volume_after, 3.0);
        assert_eq!(outcome.pit_capacity, 50.0);
        assert_eq!(
            outcome.decisions,
            vec![
                Decision {
                    operation_id: "a".into(),
                    flow_rate: 4.0
                },
                Decision {
                    operation_id: "b".into(),
                    flow_rate: 5.0
                },
            ]
        );
        assert_eq!(allocator.pit().history(), &[3.0]);
    }

    #[test]
    fn test_failed_call_restores_pit() {
        let mut strategy = MockAllocationStrategy::new();
        strategy.expect_name().return_const("mock");
        strategy.expect_allocate().returning(|_, pit| {
            pit.withdraw_all();
            Err(AllocationError::UnmodeledFlow { unallocated: 1.0 })
        });

        let pit = PitReservoir::with_volume(50.0, 7.0).unwrap();
        let mut allocator = FlowAllocator::new(pit, Box::new(strategy));
        let err = allocator.allocate(&snapshot()).unwrap_err();

        assert_eq!(err, AllocationError::UnmodeledFlow { unallocated: 1.0 });
        assert_eq!(allocator.pit().volume(), 7.0);
        assert!(allocator.pit().history().is_empty());
    }

    #[test]
    fn test_flow_count_mismatch_is_rejected() {
        let mut strategy = MockAllocationStrategy::new();
        strategy.expect_name().return_const("mock");
        strategy.expect_allocate().returning(|_, pit| {
            pit.deposit(1.0);
            Ok(ChunkedAllocation::zeroed(1))
        });

        let mut allocator = FlowAllocator::new(PitReservoir::new(5.0).unwrap(), Box::new(strategy));
        assert_eq!(
            allocator.allocate(&snapshot()).unwrap_err(),
            AllocationError::FlowCountMismatch {
                expected: 2,
                got: 1
            }
        );
        assert_eq!(allocator.pit().volume(), 0.0);
    }
}
