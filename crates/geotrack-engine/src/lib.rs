//! GeoTrack Engine - Geofence membership and location stream processing
//!
//! Reports for one (booking, worker) pair are processed one at a time under a
//! per-pair async mutex; different pairs never contend with each other.

pub mod filter;
pub mod geofence;
pub mod service;
pub mod state;
pub mod stream;

pub use filter::{OutlierFilter, Rejection};
pub use geofence::{Evaluation, GeofenceEngine};
pub use service::TrackingService;
pub use state::{PairRegistry, PairState};
pub use stream::{LocationStreamProcessor, StreamConfig};
