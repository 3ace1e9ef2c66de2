//! Formatting helpers shared by providers and tables.

mod time_fmt;

pub use time_fmt::{format_float, format_time_since, local_time_string, local_time_with};
