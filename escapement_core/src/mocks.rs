//! Test and helper mocks for escapement_core

use std::collections::VecDeque;

use escapement_traits::{BoxError, TemperatureSensor, Transducer};

/// Transducer replaying a fixed list of passage timestamps, then failing.
#[derive(Debug, Default, Clone)]
pub struct ScriptedTransducer {
    timestamps: VecDeque<u64>,
    kicks: u64,
}

impl ScriptedTransducer {
    pub fn new(timestamps: impl IntoIterator<Item = u64>) -> Self {
        Self {
            timestamps: timestamps.into_iter().collect(),
            kicks: 0,
        }
    }

    /// Passages `period_us` apart starting at `start_us`.
    pub fn periodic(start_us: u64, period_us: u64, count: usize) -> Self {
        Self::new((0..count as u64).map(|i| start_us + i * period_us))
    }

    pub fn push(&mut self, ts: u64) {
        self.timestamps.push_back(ts);
    }

    pub fn kicks(&self) -> u64 {
        self.kicks
    }
}

impl Transducer for ScriptedTransducer {
    fn await_passage(&mut self) -> Result<u64, BoxError> {
        self.timestamps
            .pop_front()
            .ok_or_else(|| Box::new(std::io::Error::other("script exhausted")) as BoxError)
    }

    fn apply_kick(&mut self) -> Result<(), BoxError> {
        self.kicks += 1;
        Ok(())
    }
}

/// Sensor that always reports the same reading (°C × 256).
#[derive(Debug, Clone, Copy)]
pub struct FixedSensor(pub i32);

impl TemperatureSensor for FixedSensor {
    fn read(&mut self) -> Result<i32, BoxError> {
        Ok(self.0)
    }
}
