//! Test-data feeder
//!
//! Hands one [`TestDataRecord`] to each iteration. The record pool is the only
//! mutable state shared between workers, so every access goes through a single
//! short critical section.

use chainload_core::{FeedMode, RunConfig, TestDataRecord};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Thread-safe source of per-iteration input records
#[derive(Debug)]
pub struct TestDataFeeder {
    mode: FeedMode,
    pool: Mutex<Pool>,
}

#[derive(Debug)]
enum Pool {
    /// No test data configured: every iteration gets an empty record
    Unseeded,
    Exhausting(VecDeque<TestDataRecord>),
    Cyclic {
        records: Vec<TestDataRecord>,
        cursor: usize,
    },
}

impl TestDataFeeder {
    /// Create a feeder; `None` means no test data was configured
    pub fn new(records: Option<Vec<TestDataRecord>>, mode: FeedMode) -> Self {
        let pool = match (records, mode) {
            (None, _) => Pool::Unseeded,
            (Some(records), FeedMode::Exhausting) => Pool::Exhausting(records.into()),
            (Some(records), FeedMode::Cyclic) => Pool::Cyclic { records, cursor: 0 },
        };

        Self {
            mode,
            pool: Mutex::new(pool),
        }
    }

    /// Build the feeder described by a run configuration
    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.test_data.clone(), config.test_data_mode)
    }

    /// Next record, or `None` once an exhausting pool is drained
    pub fn next(&self) -> Option<TestDataRecord> {
        let mut pool = self.pool.lock();
        match &mut *pool {
            Pool::Unseeded => Some(TestDataRecord::new()),
            Pool::Exhausting(queue) => queue.pop_front(),
            Pool::Cyclic { records, cursor } => {
                if records.is_empty() {
                    return None;
                }
                let record = records[*cursor % records.len()].clone();
                *cursor = (*cursor + 1) % records.len();
                Some(record)
            }
        }
    }

    pub fn mode(&self) -> FeedMode {
        self.mode
    }

    /// Whether any test data was configured
    pub fn is_seeded(&self) -> bool {
        !matches!(*self.pool.lock(), Pool::Unseeded)
    }
}
