pub mod get;
pub mod list;

pub use get::{GetStationError, GetStationQuery};
pub use list::{ListStationsError, ListStationsQuery};
