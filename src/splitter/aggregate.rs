//! Aggregation policies for fragmented requests.
//!
//! Each policy folds the outcomes of N sub-commands into one client
//! reply. The policies are independent: `Gather` keeps
//! partial results, while `Sum` and `Acknowledge` turn any failure into a
//! failure of the whole request.

use crate::error::SplitError;
use crate::protocol::RespValue;
use tracing::warn;

/// How a fragmented request combines its sub-replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// One reply slot per key, returned as an array in key order.
    Gather,
    /// Integer replies are added up.
    Sum,
    /// `OK` only if every sub-command acknowledged.
    Acknowledge,
}

/// Outcome of one sub-command as seen by its parent.
#[derive(Debug)]
pub(crate) enum ChildOutcome {
    /// The shard replied (possibly with an error value).
    Reply(RespValue),
    /// No reply was received.
    Failed(SplitError),
}

/// Running state of one aggregation.
#[derive(Debug)]
pub(crate) enum Aggregator {
    Gather(GatherAggregator),
    Sum(SumAggregator),
    Acknowledge(AcknowledgeAggregator),
}

impl Aggregator {
    pub(crate) fn new(aggregation: Aggregation, fragments: usize) -> Self {
        match aggregation {
            Aggregation::Gather => Aggregator::Gather(GatherAggregator::new(fragments)),
            Aggregation::Sum => Aggregator::Sum(SumAggregator::default()),
            Aggregation::Acknowledge => Aggregator::Acknowledge(AcknowledgeAggregator::default()),
        }
    }

    /// Folds in the outcome for slot `index`. Returns true if the outcome
    /// counts as an error for the request's stats.
    pub(crate) fn absorb(&mut self, index: usize, outcome: ChildOutcome) -> bool {
        match self {
            Aggregator::Gather(g) => g.absorb(index, outcome),
            Aggregator::Sum(s) => s.absorb(outcome),
            Aggregator::Acknowledge(a) => a.absorb(outcome),
        }
    }

    /// Builds the client reply once every slot is resolved.
    pub(crate) fn finish(&mut self) -> RespValue {
        match self {
            Aggregator::Gather(g) => g.finish(),
            Aggregator::Sum(s) => s.finish(),
            Aggregator::Acknowledge(a) => a.finish(),
        }
    }
}

/// Collects raw sub-replies into pre-sized slots.
#[derive(Debug)]
pub(crate) struct GatherAggregator {
    slots: Vec<RespValue>,
}

impl GatherAggregator {
    fn new(fragments: usize) -> Self {
        Self {
            slots: vec![RespValue::Null; fragments],
        }
    }

    fn absorb(&mut self, index: usize, outcome: ChildOutcome) -> bool {
        let (value, is_error) = match outcome {
            ChildOutcome::Reply(value) => {
                let is_error = value.is_error();
                (value, is_error)
            }
            ChildOutcome::Failed(err) => (err.to_reply(), true),
        };
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = value;
        }
        is_error
    }

    fn finish(&mut self) -> RespValue {
        RespValue::Array(std::mem::take(&mut self.slots))
    }
}

/// Adds up integer sub-replies.
#[derive(Debug, Default)]
pub(crate) struct SumAggregator {
    total: i64,
    failures: usize,
    protocol_errors: usize,
}

impl SumAggregator {
    fn absorb(&mut self, outcome: ChildOutcome) -> bool {
        match outcome {
            ChildOutcome::Reply(RespValue::Integer(n)) => match self.total.checked_add(n) {
                Some(total) => {
                    self.total = total;
                    false
                }
                None => {
                    warn!(total = self.total, value = n, "Integer overflow summing shard replies");
                    self.protocol_errors += 1;
                    true
                }
            },
            ChildOutcome::Reply(RespValue::Error(_)) | ChildOutcome::Failed(_) => {
                self.failures += 1;
                true
            }
            ChildOutcome::Reply(other) => {
                warn!(reply = %other, "Expected an integer reply from shard");
                self.protocol_errors += 1;
                true
            }
        }
    }

    fn finish(&mut self) -> RespValue {
        if self.failures > 0 {
            SplitError::UpstreamFailure.to_reply()
        } else if self.protocol_errors > 0 {
            SplitError::UpstreamProtocolError.to_reply()
        } else {
            RespValue::Integer(self.total)
        }
    }
}

/// Waits for an `OK` from every sub-command.
#[derive(Debug, Default)]
pub(crate) struct AcknowledgeAggregator {
    failures: usize,
}

impl AcknowledgeAggregator {
    fn absorb(&mut self, outcome: ChildOutcome) -> bool {
        let acknowledged = matches!(&outcome, ChildOutcome::Reply(v) if v.is_ok());
        if !acknowledged {
            self.failures += 1;
        }
        !acknowledged
    }

    fn finish(&mut self) -> RespValue {
        if self.failures == 0 {
            RespValue::ok()
        } else {
            SplitError::UpstreamFailure.to_reply()
        }
    }
}
