//! Per-target generation counters
//!
//! Every started operation takes a [`Ticket`] carrying the target's new
//! generation. Starting or cancelling again bumps the generation, so any
//! older ticket stops being current mid-flight. Publishing a result happens
//! under the table lock, which makes "still current?" and "publish" one step.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;

use crate::document::DocumentFormat;

/// Logical target of a load; at most one operation per target is current
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LoadTarget {
    DocumentList(DocumentFormat),
    Pages(String),
}

impl fmt::Display for LoadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadTarget::DocumentList(format) => write!(f, "list:{}", format),
            LoadTarget::Pages(id) => write!(f, "pages:{}", id),
        }
    }
}

/// State of the most recent operation for a target
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Running,
    Completed,
    Superseded,
    Failed(String),
}

impl LoadState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoadState::Completed | LoadState::Superseded | LoadState::Failed(_)
        )
    }
}

/// Proof of which generation an operation belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub target: LoadTarget,
    pub generation: u64,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    state: LoadState,
}

#[derive(Debug, Default)]
pub struct GenerationTable {
    slots: Mutex<HashMap<LoadTarget, Slot>>,
}

impl GenerationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new operation, superseding whatever was running
    pub fn begin(&self, target: LoadTarget) -> Ticket {
        let mut slots = self.slots.lock();
        let slot = slots.entry(target.clone()).or_default();
        slot.generation += 1;
        slot.state = LoadState::Running;
        Ticket {
            target,
            generation: slot.generation,
        }
    }

    /// Supersede the current operation without starting another
    pub fn cancel(&self, target: &LoadTarget) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(target) {
            slot.generation += 1;
            if slot.state == LoadState::Running {
                slot.state = LoadState::Superseded;
            }
        }
    }

    pub fn cancel_all(&self) {
        let mut slots = self.slots.lock();
        for slot in slots.values_mut() {
            slot.generation += 1;
            if slot.state == LoadState::Running {
                slot.state = LoadState::Superseded;
            }
        }
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.slots
            .lock()
            .get(&ticket.target)
            .map(|slot| slot.generation == ticket.generation)
            .unwrap_or(false)
    }

    /// Run `publish` and mark the target completed, if `ticket` is current
    pub fn complete<F: FnOnce()>(&self, ticket: &Ticket, publish: F) -> bool {
        let mut slots = self.slots.lock();
        match slots.get_mut(&ticket.target) {
            Some(slot) if slot.generation == ticket.generation => {
                publish();
                slot.state = LoadState::Completed;
                true
            }
            _ => false,
        }
    }

    /// Mark the target failed, if `ticket` is current
    pub fn fail(&self, ticket: &Ticket, reason: String) -> bool {
        let mut slots = self.slots.lock();
        match slots.get_mut(&ticket.target) {
            Some(slot) if slot.generation == ticket.generation => {
                slot.state = LoadState::Failed(reason);
                true
            }
            _ => false,
        }
    }

    pub fn state(&self, target: &LoadTarget) -> LoadState {
        self.slots
            .lock()
            .get(target)
            .map(|slot| slot.state.clone())
            .unwrap_or_default()
    }
}
