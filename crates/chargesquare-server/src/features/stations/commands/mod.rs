pub mod create;

pub use create::{CreateStationCommand, CreateStationError};
