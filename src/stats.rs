//! Per-context operation counters for estimation backends.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Operation kinds counted by estimation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpType {
    Add,
    Sub,
    Multiply,
    AddPlain,
    SubPlain,
    MultiplyPlain,
    AddScalar,
    MultiplyScalar,
    Square,
    Rotate,
    Conjugate,
    Negate,
    Relinearize,
    Rescale,
    ReduceChainIndex,
    Bootstrap,
    Encrypt,
    Decrypt,
}

impl OpType {
    /// Key used in estimated-measure tables.
    pub fn name(&self) -> &'static str {
        match self {
            OpType::Add => "add",
            OpType::Sub => "sub",
            OpType::Multiply => "multiply",
            OpType::AddPlain => "add_plain",
            OpType::SubPlain => "sub_plain",
            OpType::MultiplyPlain => "multiply_plain",
            OpType::AddScalar => "add_scalar",
            OpType::MultiplyScalar => "multiply_scalar",
            OpType::Square => "square",
            OpType::Rotate => "rotate",
            OpType::Conjugate => "conjugate",
            OpType::Negate => "negate",
            OpType::Relinearize => "relinearize",
            OpType::Rescale => "rescale",
            OpType::ReduceChainIndex => "reduce_chain_index",
            OpType::Bootstrap => "bootstrap",
            OpType::Encrypt => "encrypt",
            OpType::Decrypt => "decrypt",
        }
    }
}

/// Accumulator of operation counts by (operation, chain index).
///
/// Owned by an estimation context behind a mutex: backend raw operations may
/// be issued from caller-parallel regions. Reset is always explicit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    counts: HashMap<(OpType, i32), u64>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, op: OpType, chain_index: i32) {
        *self.counts.entry((op, chain_index)).or_insert(0) += 1;
    }

    /// Total count of `op` across all chain indices.
    pub fn count(&self, op: OpType) -> u64 {
        self.counts
            .iter()
            .filter(|((o, _), _)| *o == op)
            .map(|(_, c)| *c)
            .sum()
    }

    pub fn count_at(&self, op: OpType, chain_index: i32) -> u64 {
        self.counts.get(&(op, chain_index)).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn reset(&mut self) {
        self.counts.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (OpType, i32, u64)> + '_ {
        self.counts.iter().map(|(&(op, ci), &c)| (op, ci, c))
    }

    /// Joins the counters against a latency table and returns the estimated
    /// total time.
    ///
    /// The table maps operation names either to a single number or to an
    /// object keyed by chain index:
    /// `{"multiply": {"2": 1.5, "1": 1.1}, "rotate": 0.8}`.
    /// Operations absent from the table contribute zero.
    pub fn estimated_time(&self, measures: &serde_json::Value) -> f64 {
        let mut total = 0.0;
        for (op, chain_index, count) in self.iter() {
            let per_op = match measures.get(op.name()) {
                Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
                Some(serde_json::Value::Object(by_level)) => by_level
                    .get(&chain_index.to_string())
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.0),
                _ => 0.0,
            };
            total += per_op * count as f64;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn counts_accumulate_per_chain_index() {
        let mut stats = RunStats::new();
        stats.record(OpType::Multiply, 2);
        stats.record(OpType::Multiply, 2);
        stats.record(OpType::Multiply, 1);
        stats.record(OpType::Rotate, 2);

        assert_eq!(stats.count(OpType::Multiply), 3);
        assert_eq!(stats.count_at(OpType::Multiply, 2), 2);
        assert_eq!(stats.count_at(OpType::Multiply, 0), 0);
        assert_eq!(stats.count(OpType::Bootstrap), 0);

        stats.reset();
        assert!(stats.is_empty());
    }

    #[test]
    fn estimated_time_joins_flat_and_per_level_tables() {
        let mut stats = RunStats::new();
        stats.record(OpType::Multiply, 2);
        stats.record(OpType::Multiply, 1);
        stats.record(OpType::Rotate, 2);
        stats.record(OpType::Negate, 2); // absent from the table

        let measures = json!({
            "multiply": {"2": 1.5, "1": 1.0},
            "rotate": 0.5,
        });
        let t = stats.estimated_time(&measures);
        assert!((t - 3.0).abs() < 1e-12);
    }
}
