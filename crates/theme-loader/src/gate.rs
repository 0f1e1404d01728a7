/*
 * gate.rs
 * Copyright (c) 2025 Posit, PBC
 */

use std::cell::Cell;

/// One-shot latch shared by every trigger of a deferred action.
///
/// The first successful [`InteractionGate::try_fire`] wins; all later calls,
/// from any trigger, return `false`.
#[derive(Debug, Default)]
pub struct InteractionGate {
    fired: Cell<bool>,
}

impl InteractionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the gate. Returns `true` only for the first call.
    pub fn try_fire(&self) -> bool {
        !self.fired.replace(true)
    }

    pub fn has_fired(&self) -> bool {
        self.fired.get()
    }
}
