//! Six-slot query plans.
//!
//! A [`QueryPlan`] is the resolved form of a (commands, units) pair: exactly
//! six slots, each with its mock profile looked up once.

use log::warn;
use obdash_elm327_lib::Command;

use crate::mock::MockProfile;

/// Number of display slots on a dashboard screen
pub const SLOT_COUNT: usize = 6;

/// Shown for slots without a command or without data
pub const PLACEHOLDER: &str = "N/A";

/// Identifies a sensor reading in the command registry
pub type CommandId = &'static Command;

/// One display string per slot
pub type SlotValues = [String; SLOT_COUNT];

/// Pad with `filler` or truncate so exactly [`SLOT_COUNT`] items remain
pub fn normalize<T: Clone>(items: &[T], filler: &T) -> [T; SLOT_COUNT] {
    std::array::from_fn(|i| items.get(i).unwrap_or(filler).clone())
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedSlot {
    pub command: Option<CommandId>,
    pub unit: String,
    /// Resolved from the command name when the plan is built
    pub mock: Option<MockProfile>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    slots: [PlannedSlot; SLOT_COUNT],
}

impl Default for QueryPlan {
    fn default() -> Self {
        Self::new::<&str>(&[], &[])
    }
}

impl QueryPlan {
    /// Build a plan from up to six commands and their units. Missing entries
    /// become empty slots, extra entries are dropped.
    pub fn new<U: AsRef<str>>(commands: &[Option<CommandId>], units: &[U]) -> Self {
        if commands.len() > SLOT_COUNT || units.len() > SLOT_COUNT {
            warn!(
                "Query plan takes at most {SLOT_COUNT} slots, got {} commands and {} units. Truncating.",
                commands.len(),
                units.len()
            );
        }

        let slots = std::array::from_fn(|i| {
            let command = commands.get(i).copied().flatten();
            PlannedSlot {
                command,
                unit: units.get(i).map(|u| u.as_ref().to_string()).unwrap_or_default(),
                mock: MockProfile::for_command(command),
            }
        });

        Self { slots }
    }

    #[must_use]
    pub fn slots(&self) -> &[PlannedSlot; SLOT_COUNT] {
        &self.slots
    }

    #[must_use]
    pub fn commands(&self) -> [Option<CommandId>; SLOT_COUNT] {
        std::array::from_fn(|i| self.slots[i].command)
    }
}
