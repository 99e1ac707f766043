pub mod any_date;
pub mod period;
