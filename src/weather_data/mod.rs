pub mod chunked;
pub mod error;
pub mod extractor;
pub mod grid;
pub mod local_grid;
pub mod source;
pub mod units;
