pub mod date_range;
pub mod error;
pub mod location;
pub mod raw_table;
pub mod series;
pub mod source;
pub mod state_meta;

pub use error::{CovidError, Result};
