//! Run configuration.

use crate::plan::JoinPlan;
use crate::scan::Scanner;

#[derive(Debug)]
pub struct JoinConfig {
    /// Bucket count is `next_power_of_two(max(left, right)) >> bucket_shift`.
    pub bucket_shift: u32,
    pub scanner: Scanner,
    pub plan: JoinPlan,
}

impl JoinConfig {
    /// Eight tuples per bucket on the larger side turned out to be the sweet
    /// spot between comparisons and bookkeeping.
    pub const DEFAULT_BUCKET_SHIFT: u32 = 3;

    pub fn new() -> Self {
        Self {
            bucket_shift: Self::DEFAULT_BUCKET_SHIFT,
            scanner: Scanner::detect(),
            plan: JoinPlan::four_way(),
        }
    }

    pub fn with_bucket_shift(mut self, shift: u32) -> Self {
        self.bucket_shift = shift;
        self
    }

    pub fn with_scanner(mut self, scanner: Scanner) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn with_plan(mut self, plan: JoinPlan) -> Self {
        self.plan = plan;
        self
    }
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self::new()
    }
}
