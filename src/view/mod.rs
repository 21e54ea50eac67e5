//! Client-side view model: zoom/pan state, mip selection, and the
//! fetch-or-reuse decision for region requests.

pub mod coordinator;
pub mod state;

pub use coordinator::{CurrentRegion, RegionRequestCoordinator};
pub use state::{calculate_mip, Bounds, Debouncer, ViewStateTracker, GESTURE_DEBOUNCE, MIN_ZOOM};
