pub mod concurrency;
pub mod errors;
pub mod intervals;
pub mod io;

pub use errors::{is_broken_pipe, RedError, Result};
