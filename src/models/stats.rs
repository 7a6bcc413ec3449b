use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Streak {
    pub current: u32,
    pub best: u32,
}

/// One day of a per-day series: how many tracked items were recorded and how
/// many of those counted as compliant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DayRecord {
    pub recorded: u32,
    pub hits: u32,
    /// Whether the day satisfied the full-compliance rule of its series.
    pub complete: bool,
}

impl DayRecord {
    /// A single yes/no habit day.
    pub fn from_bool(done: bool) -> Self {
        Self {
            recorded: 1,
            hits: done as u32,
            complete: done,
        }
    }

    pub fn has_record(&self) -> bool {
        self.recorded > 0
    }
}
