//! Incremental loading trigger.
//!
//! Level-triggered: every scroll, selection move or resize re-evaluates how
//! much content is left below the viewport. Firing is throttled on the tick
//! clock so a burst of scroll events asks for at most one batch; the batch
//! loader keeps its own reentrancy guard on top of this.

use serde::{Deserialize, Serialize};

/// Ticks (90 ms each) during which the trigger stays silent after firing.
pub const SCROLL_THROTTLE_TICKS: u64 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollMetrics {
    pub offset: u32,
    pub viewport: u32,
    pub content: u32,
}

impl ScrollMetrics {
    /// Unscrolled distance between the bottom of the viewport and the end
    /// of the content.
    pub fn remaining(&self) -> u32 {
        self.content
            .saturating_sub(self.offset.saturating_add(self.viewport))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollTrigger {
    pub threshold: u32,
    last_fired: Option<u64>,
}

impl ScrollTrigger {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            last_fired: None,
        }
    }

    pub fn near_bottom(&self, metrics: ScrollMetrics) -> bool {
        metrics.remaining() < self.threshold
    }

    pub fn evaluate(&mut self, metrics: ScrollMetrics, tick: u64) -> bool {
        if !self.near_bottom(metrics) {
            return false;
        }
        if let Some(last) = self.last_fired {
            if tick.saturating_sub(last) < SCROLL_THROTTLE_TICKS {
                return false;
            }
        }
        self.last_fired = Some(tick);
        true
    }
}
