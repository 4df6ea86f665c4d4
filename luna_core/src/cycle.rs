//! Cycle phase derivation.
//!
//! Phases are anchored to the end of the cycle: ovulation is placed 14 days
//! before the next cycle starts and the last 7 days are late luteal.

use crate::state::DEFAULT_CYCLE_LENGTH;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Days of bleeding counted as the menstrual phase
const MENSTRUAL_DAYS: u32 = 5;

/// Length of the luteal phase (ovulation to next cycle)
const LUTEAL_DAYS: u32 = 14;

/// Final days of the cycle counted as late luteal
const LATE_LUTEAL_DAYS: u32 = 7;

/// Phase of the menstrual cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Menstrual,
    Follicular,
    Ovulatory,
    EarlyLuteal,
    LateLuteal,
}

impl CyclePhase {
    /// Derive the phase for `day` of a cycle of `length` days
    ///
    /// Days outside `1..=length` are clamped; a zero length falls back to
    /// the default cycle length.
    pub fn from_day(day: u32, length: u32) -> Self {
        let length = if length == 0 {
            DEFAULT_CYCLE_LENGTH
        } else {
            length
        };
        let day = day.clamp(1, length);

        let ovulation_day = length.saturating_sub(LUTEAL_DAYS).max(MENSTRUAL_DAYS + 1);
        let window_start = ovulation_day.saturating_sub(2).max(MENSTRUAL_DAYS + 1);
        let window_end = ovulation_day + 1;
        let late_luteal_start = length.saturating_sub(LATE_LUTEAL_DAYS - 1);

        if day <= MENSTRUAL_DAYS {
            CyclePhase::Menstrual
        } else if day < window_start {
            CyclePhase::Follicular
        } else if day <= window_end {
            CyclePhase::Ovulatory
        } else if day >= late_luteal_start {
            CyclePhase::LateLuteal
        } else {
            CyclePhase::EarlyLuteal
        }
    }

    /// Luteal phase, early or late
    pub fn is_luteal(self) -> bool {
        matches!(self, CyclePhase::EarlyLuteal | CyclePhase::LateLuteal)
    }
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CyclePhase::Menstrual => "menstrual",
            CyclePhase::Follicular => "follicular",
            CyclePhase::Ovulatory => "ovulatory",
            CyclePhase::EarlyLuteal => "early luteal",
            CyclePhase::LateLuteal => "late luteal",
        };
        f.write_str(label)
    }
}
