use std::collections::{HashMap, VecDeque};

use log::debug;

use crate::aggregation::error::AggregationError;
use crate::aggregation::model::{Window, WindowIndex};

/// Bounded, insertion-ordered collection of windows.
///
/// Eviction is strict FIFO on insertion order: once a new window pushes the
/// count over `capacity`, the window created longest ago is dropped, whatever
/// its index. Lookups, inserts and evictions are O(1) amortized.
#[derive(Debug)]
pub struct WindowStore {
    windows: HashMap<WindowIndex, Window>,
    insertion_order: VecDeque<WindowIndex>,
    capacity: usize,
}

impl WindowStore {
    pub fn new(capacity: usize) -> Result<Self, AggregationError> {
        if capacity == 0 {
            return Err(AggregationError::ZeroRetention);
        }

        Ok(Self {
            windows: HashMap::with_capacity(capacity + 1),
            insertion_order: VecDeque::with_capacity(capacity + 1),
            capacity,
        })
    }

    /// Returns the window for `index`, creating it (and evicting the oldest) if absent.
    pub fn ensure(&mut self, index: WindowIndex) -> &mut Window {
        if !self.windows.contains_key(&index) {
            self.insertion_order.push_back(index);

            // The new index sits at the back, so capacity >= 1 never evicts it.
            while self.insertion_order.len() > self.capacity {
                if let Some(oldest) = self.insertion_order.pop_front() {
                    self.windows.remove(&oldest);
                    debug!("Evicted window {} (capacity {})", oldest, self.capacity);
                }
            }
        }

        self.windows.entry(index).or_insert_with(|| Window::new(index))
    }

    /// Most recently inserted window, which is not necessarily the highest index.
    pub fn latest(&self) -> Option<(WindowIndex, &Window)> {
        let index = *self.insertion_order.back()?;
        self.windows.get(&index).map(|window| (index, window))
    }

    pub fn get(&self, index: WindowIndex) -> Option<&Window> {
        self.windows.get(&index)
    }

    /// Windows in insertion order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Window> + '_ {
        self.insertion_order
            .iter()
            .filter_map(move |index| self.windows.get(index))
    }

    pub fn len(&self) -> usize {
        self.insertion_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insertion_order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
