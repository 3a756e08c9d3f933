//! Single/double click disambiguation.
//!
//! A click arms a pending single click. A second click inside the window
//! cancels it and reports a double click at once; otherwise [`ClickGate::poll`]
//! releases the single click when the window has elapsed. Time is supplied
//! by the caller in milliseconds, so the gate never owns a timer.

/// Default window between the two clicks of a double click.
pub const DOUBLE_CLICK_MS: u64 = 250;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClickOutcome<K> {
    /// Single click armed; it fires from `poll` unless a second click arrives.
    Pending,
    /// Second click inside the window. The pending single click is dropped.
    DoubleClick(K),
}

#[derive(Clone, Debug)]
struct PendingClick<K> {
    target: K,
    fires_at: u64,
}

#[derive(Clone, Debug)]
pub struct ClickGate<K> {
    pub window_ms: u64,
    pending: Option<PendingClick<K>>,
}

impl<K> Default for ClickGate<K> {
    fn default() -> Self {
        Self::new(DOUBLE_CLICK_MS)
    }
}

impl<K> ClickGate<K> {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            pending: None,
        }
    }

    pub fn on_click(&mut self, target: K, now: u64) -> ClickOutcome<K> {
        match self.pending.take() {
            Some(p) if now < p.fires_at => ClickOutcome::DoubleClick(target),
            _ => {
                // An expired click that was never polled is dropped, not fired late.
                self.pending = Some(PendingClick {
                    target,
                    fires_at: now.saturating_add(self.window_ms),
                });
                ClickOutcome::Pending
            }
        }
    }

    /// Returns the pending single click once its window has elapsed.
    pub fn poll(&mut self, now: u64) -> Option<K> {
        if self.pending.as_ref().is_some_and(|p| now >= p.fires_at) {
            return self.pending.take().map(|p| p.target);
        }
        None
    }

    /// When the pending click, if any, will fire.
    pub fn deadline(&self) -> Option<u64> {
        self.pending.as_ref().map(|p| p.fires_at)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_click_fires_after_window() {
        let mut gate = ClickGate::default();
        assert_eq!(gate.on_click(7u32, 0), ClickOutcome::Pending);
        assert_eq!(gate.deadline(), Some(250));
        assert_eq!(gate.poll(249), None);
        assert_eq!(gate.poll(250), Some(7));
        assert_eq!(gate.poll(400), None);
    }

    #[test]
    fn second_click_inside_window_is_double() {
        let mut gate = ClickGate::default();
        assert_eq!(gate.on_click(7u32, 0), ClickOutcome::Pending);
        assert_eq!(gate.on_click(7, 100), ClickOutcome::DoubleClick(7));
        // The cancelled single click never fires.
        assert_eq!(gate.poll(250), None);
        assert_eq!(gate.poll(10_000), None);
        assert!(!gate.is_pending());
    }

    #[test]
    fn click_after_window_starts_over() {
        let mut gate = ClickGate::new(100);
        gate.on_click("a", 0);
        assert_eq!(gate.on_click("b", 150), ClickOutcome::Pending);
        assert_eq!(gate.poll(200), None);
        assert_eq!(gate.poll(250), Some("b"));
    }

    #[test]
    fn third_click_arms_again() {
        let mut gate = ClickGate::default();
        gate.on_click(1u8, 0);
        assert_eq!(gate.on_click(1, 50), ClickOutcome::DoubleClick(1));
        assert_eq!(gate.on_click(1, 80), ClickOutcome::Pending);
        assert_eq!(gate.poll(330), Some(1));
    }

    #[test]
    fn cancel_drops_pending() {
        let mut gate = ClickGate::default();
        gate.on_click(3u32, 0);
        gate.cancel();
        assert_eq!(gate.poll(1_000), None);
    }
}
