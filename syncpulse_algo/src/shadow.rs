// Shadow cache: remembers the last compare value written per channel so the polling
// loop does not rewrite unchanged registers every iteration.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::channel::{Channel, PwmUnit};
use crate::error::PwmResult;

/// Last tick value applied to one channel. `None` means "never applied", which
/// is distinct from every valid tick value, so the first apply always writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShadowEntry {
    last: Option<u32>,
}

impl ShadowEntry {
    pub const fn new() -> Self {
        ShadowEntry { last: None }
    }

    /// True when `ticks` is exactly what the hardware already holds
    #[inline(always)]
    pub fn is_current(&self, ticks: u32) -> bool {
        self.last == Some(ticks)
    }

    pub fn record(&mut self, ticks: u32) {
        self.last = Some(ticks);
    }

    /// Forget the cached value; the next apply writes unconditionally
    pub fn invalidate(&mut self) {
        self.last = None;
    }

    pub fn last(&self) -> Option<u32> {
        self.last
    }
}

impl<U: PwmUnit> Channel<U> {
    /// Writes `ticks` only if it differs from the cached value.
    /// Returns whether a hardware write happened. The cache is only updated
    /// after the write succeeded.
    pub fn apply_if_changed(&mut self, ticks: u32) -> PwmResult<bool> {
        if self.shadow.is_current(ticks) {
            return Ok(false);
        }
        self.write_compare(ticks)?;
        self.shadow.record(ticks);
        Ok(true)
    }

    pub fn invalidate_shadow(&mut self) {
        self.shadow.invalidate();
    }

    pub fn shadow(&self) -> ShadowEntry {
        self.shadow
    }
}
