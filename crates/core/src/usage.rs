//! Per-session usage statistics.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};
use crate::provider::Usage;

/// Token and tool-call counts accumulated across agent turns.
///
/// Merging is field-wise addition, so it is commutative and associative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub tool_calls: u64,
}

impl UsageStats {
    pub fn merge(self, other: UsageStats) -> UsageStats {
        UsageStats {
            input_tokens: self.input_tokens + other.input_tokens,
            output_tokens: self.output_tokens + other.output_tokens,
            total_tokens: self.total_tokens + other.total_tokens,
            tool_calls: self.tool_calls + other.tool_calls,
        }
    }

    /// Record one model response.
    pub fn record_usage(&mut self, usage: &Usage) {
        self.input_tokens += usage.input_tokens;
        self.output_tokens += usage.output_tokens;
        self.total_tokens += usage.total_tokens;
    }
}

impl Add for UsageStats {
    type Output = UsageStats;

    fn add(self, rhs: UsageStats) -> UsageStats {
        self.merge(rhs)
    }
}

impl AddAssign for UsageStats {
    fn add_assign(&mut self, rhs: UsageStats) {
        *self = self.merge(rhs);
    }
}
