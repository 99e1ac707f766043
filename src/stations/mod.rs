pub mod code;
pub mod error;
pub mod hubeau;
pub mod rate_limiter;
pub mod source;
