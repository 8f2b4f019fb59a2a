pub mod engine;
pub mod error;
pub mod model;
pub mod query;
pub mod window_store;

pub use engine::AggregationEngine;
pub use error::AggregationError;
pub use model::{Direction, PeerStats, TrafficEvent, Window, WindowIndex};
pub use query::{LatestSummary, PeerDetail, PeerSummary, QueryFacade, StoreStatus, WindowOverview, WindowSnapshot};
pub use window_store::WindowStore;
