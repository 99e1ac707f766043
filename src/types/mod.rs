pub mod config;
pub mod date_range;
pub mod fields;
pub mod options;
pub mod progress;
pub mod station;
pub mod traits;
