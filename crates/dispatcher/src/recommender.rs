//! Weighted-fair priority recommender
//!
//! Compares the expected spread of types (their weights) with what was
//! actually dispatched within a sliding window of recent sends:
//! - Window capacity = sum of all weights
//! - Types under-represented in the window are preferred
//! - Everything else follows, in static priority order
//!
//! With an empty window every deficit equals the full weight, so the
//! recommendation degenerates to pure descending-weight priority.

use std::collections::HashMap;
use std::sync::Arc;

use contracts::{MessageType, MAX_WINDOW_CAPACITY};
use ringbuf::{traits::*, HeapRb};

use crate::error::DispatcherError;

/// Registered types and weights, sorted by descending weight.
///
/// Ties are broken by type name so the order is deterministic.
#[derive(Debug, Clone)]
pub struct ExpectedSpread {
    entries: Vec<(MessageType, u32)>,
    window_capacity: usize,
}

impl ExpectedSpread {
    /// # Errors
    /// Fails on an empty map, a zero weight, or a weight sum above
    /// [`MAX_WINDOW_CAPACITY`].
    pub fn new(registered: &HashMap<MessageType, u32>) -> Result<Self, DispatcherError> {
        if registered.is_empty() {
            return Err(DispatcherError::config(
                "at least one message type must be registered",
            ));
        }

        let mut entries: Vec<(MessageType, u32)> = registered
            .iter()
            .map(|(t, w)| (t.clone(), *w))
            .collect();
        entries.sort_by(|(ta, wa), (tb, wb)| wb.cmp(wa).then_with(|| ta.cmp(tb)));

        if let Some((t, _)) = entries.iter().find(|(_, w)| *w == 0) {
            return Err(DispatcherError::config(format!(
                "weight of message type '{t}' must be positive"
            )));
        }

        let window_capacity = entries
            .iter()
            .try_fold(0usize, |acc, (_, w)| acc.checked_add(*w as usize))
            .filter(|capacity| *capacity > 0)
            .ok_or_else(|| DispatcherError::config("window capacity must be positive"))?;
        if window_capacity > MAX_WINDOW_CAPACITY as usize {
            return Err(DispatcherError::config(format!(
                "window capacity {window_capacity} exceeds the maximum {MAX_WINDOW_CAPACITY}"
            )));
        }

        Ok(Self {
            entries,
            window_capacity,
        })
    }

    pub fn is_registered(&self, message_type: &str) -> bool {
        self.entries.iter().any(|(t, _)| t.as_str() == message_type)
    }

    pub fn weight(&self, message_type: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|(t, _)| t.as_str() == message_type)
            .map(|(_, w)| *w)
    }

    /// Types in priority order
    pub fn types(&self) -> impl Iterator<Item = &MessageType> {
        self.entries.iter().map(|(t, _)| t)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MessageType, u32)> {
        self.entries.iter().map(|(t, w)| (t, *w))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all weights
    pub fn window_capacity(&self) -> usize {
        self.window_capacity
    }
}

/// Sliding-window recommender.
///
/// Single writer: only the dispatch worker records and asks for
/// recommendations, so no synchronisation is needed.
pub struct PriorityRecommender {
    spread: Arc<ExpectedSpread>,
    window: HeapRb<MessageType>,
}

impl std::fmt::Debug for PriorityRecommender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorityRecommender")
            .field("spread", &self.spread)
            .field("window_len", &self.window.occupied_len())
            .finish()
    }
}

impl PriorityRecommender {
    pub fn new(registered: &HashMap<MessageType, u32>) -> Result<Self, DispatcherError> {
        Ok(Self::from_spread(Arc::new(ExpectedSpread::new(registered)?)))
    }

    pub fn from_spread(spread: Arc<ExpectedSpread>) -> Self {
        let window = HeapRb::new(spread.window_capacity());
        Self { spread, window }
    }

    /// Note a dispatched type, evicting the oldest entry when full
    pub fn record(&mut self, message_type: MessageType) {
        self.window.push_overwrite(message_type);
    }

    /// All registered types, most deserving first.
    ///
    /// Types whose weight exceeds their count in the window come first, the
    /// rest follow; both groups keep priority order.
    pub fn recommend(&self) -> Vec<MessageType> {
        let mut observed: HashMap<&str, u32> = HashMap::with_capacity(self.spread.len());
        for t in self.window.iter() {
            *observed.entry(t.as_str()).or_default() += 1;
        }

        let (mut behind, caught_up): (Vec<_>, Vec<_>) = self.spread.iter().partition(|(t, w)| {
            let seen = observed.get(t.as_str()).copied().unwrap_or(0);
            *w > seen
        });
        behind.extend(caught_up);
        behind.into_iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn is_registered(&self, message_type: &str) -> bool {
        self.spread.is_registered(message_type)
    }

    pub fn spread(&self) -> &Arc<ExpectedSpread> {
        &self.spread
    }

    pub fn window_len(&self) -> usize {
        self.window.occupied_len()
    }

    pub fn window_capacity(&self) -> usize {
        self.window.capacity().get()
    }
}
