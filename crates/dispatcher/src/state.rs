//! Dispatcher lifecycle state

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a dispatcher.
///
/// Transitions only move forward: `Active -> Draining -> ForceShutdown`,
/// with `Active -> ForceShutdown` allowed directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum DispatcherState {
    /// Accepts submissions and dispatches
    Active = 0,
    /// Rejects submissions, dispatches what is buffered, then stops
    Draining = 1,
    /// Rejects submissions, abandons what is buffered, then stops
    ForceShutdown = 2,
}

impl DispatcherState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Active,
            1 => Self::Draining,
            _ => Self::ForceShutdown,
        }
    }

    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

impl fmt::Display for DispatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Draining => "draining",
            Self::ForceShutdown => "force_shutdown",
        };
        f.write_str(s)
    }
}

/// Atomic cell holding a [`DispatcherState`]
#[derive(Debug)]
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(DispatcherState::Active as u8))
    }

    pub(crate) fn load(&self) -> DispatcherState {
        DispatcherState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `target` if it is further along than the current state.
    ///
    /// Returns `true` when the state changed.
    pub(crate) fn advance(&self, target: DispatcherState) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (target as u8 > current).then_some(target as u8)
            })
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_active() {
        assert_eq!(AtomicState::new().load(), DispatcherState::Active);
    }

    #[test]
    fn test_transitions_are_one_way() {
        let state = AtomicState::new();

        assert!(state.advance(DispatcherState::Draining));
        assert!(!state.advance(DispatcherState::Active));
        assert!(!state.advance(DispatcherState::Draining));
        assert_eq!(state.load(), DispatcherState::Draining);

        assert!(state.advance(DispatcherState::ForceShutdown));
        assert!(!state.advance(DispatcherState::Draining));
        assert_eq!(state.load(), DispatcherState::ForceShutdown);
    }

    #[test]
    fn test_active_can_skip_to_force_shutdown() {
        let state = AtomicState::new();
        assert!(state.advance(DispatcherState::ForceShutdown));
        assert_eq!(state.load(), DispatcherState::ForceShutdown);
    }
}
