pub mod event;
pub mod geofence;
pub mod point;
pub mod region;
pub mod report;

pub use event::{LocationEvent, LocationEventType};
pub use geofence::{Geofence, GeofenceId, GeofenceType};
pub use point::GeoPoint;
pub use region::{BoundingBox, Region};
pub use report::{BookingId, LocationReport, PairKey, WorkerId};
