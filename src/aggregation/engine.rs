use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, trace};

use crate::aggregation::error::AggregationError;
use crate::aggregation::model::{window_index_for, Direction, TrafficEvent};
use crate::aggregation::query::QueryFacade;
use crate::aggregation::window_store::WindowStore;

/// State shared by the write path and every query view.
#[derive(Debug)]
pub(crate) struct SharedWindows {
    pub(crate) window_size_secs: u64,
    store: Mutex<WindowStore>,
}

impl SharedWindows {
    /// One lock acquisition per logical operation; a poisoned lock still holds
    /// consistent counters because every mutation finishes before it can panic.
    pub(crate) fn lock(&self) -> MutexGuard<'_, WindowStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Write side of the aggregator.
///
/// Cheap to clone; every clone and every [`QueryFacade`] it hands out see the
/// same store.
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    shared: Arc<SharedWindows>,
}

impl AggregationEngine {
    pub fn new(window_size_secs: u64, keep_windows: usize) -> Result<Self, AggregationError> {
        if window_size_secs == 0 {
            return Err(AggregationError::ZeroWindowSize);
        }
        let store = WindowStore::new(keep_windows)?;

        debug!(
            "Aggregation engine ready: window={}s keep={}",
            window_size_secs, keep_windows
        );

        Ok(Self {
            shared: Arc::new(SharedWindows {
                window_size_secs,
                store: Mutex::new(store),
            }),
        })
    }

    /// Folds one event into its window.
    ///
    /// The window for the event's timestamp is created even when the event is
    /// discarded, so it still counts toward `latest` and eviction. Returns the
    /// direction the event was counted in, or `None` when neither endpoint is
    /// `monitored`.
    pub fn record(&self, event: &TrafficEvent, monitored: &str) -> Option<Direction> {
        let index = window_index_for(event.timestamp, self.shared.window_size_secs);

        let mut store = self.shared.lock();
        let window = store.ensure(index);

        let (peer, direction) = if event.source == monitored {
            (event.destination.as_str(), Direction::Outbound)
        } else if event.destination == monitored {
            (event.source.as_str(), Direction::Inbound)
        } else {
            trace!("Ignoring {} -> {}", event.source, event.destination);
            return None;
        };

        window.fold(peer, direction, &event.protocol, event.byte_size);
        Some(direction)
    }

    pub fn query(&self) -> QueryFacade {
        QueryFacade::new(Arc::clone(&self.shared))
    }

    pub fn window_size_secs(&self) -> u64 {
        self.shared.window_size_secs
    }
}
