#[path = "core/complaint.rs"]
pub mod complaint;

#[path = "core/config.rs"]
pub mod config;

#[path = "core/error.rs"]
pub mod error;

#[path = "core/layers.rs"]
pub mod layers;

#[path = "core/markers.rs"]
pub mod markers;

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/proximity.rs"]
pub mod proximity;

#[path = "core/pulse.rs"]
pub mod pulse;

#[path = "core/selection.rs"]
pub mod selection;

#[path = "core/store.rs"]
pub mod store;

#[path = "core/surface.rs"]
pub mod surface;

#[path = "core/view.rs"]
pub mod view;

pub use complaint::{Complaint, ComplaintRef, Coordinates, IssueType, ReportedDate};
pub use error::{DataFetchError, SurfaceError, ValidationError};
pub use store::{ComplaintSource, ComplaintStore, JsonFileSource};
pub use view::ComplaintMapView;
