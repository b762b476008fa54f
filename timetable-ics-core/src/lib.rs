//! Timetable ICS Core Library
//!
//! This library turns a weekday-indexed lecture timetable into weekly
//! recurring calendar events, serialized as RFC 5545 ICS text or as
//! web-calendar deep links.

pub mod error;
pub mod ics;
pub mod links;
pub mod push;
pub mod reader;
pub mod term;
pub mod timetable;
pub mod types;

// Re-export core types and error handling
pub use error::{Error, Result};
pub use term::Term;
pub use timetable::WeeklyTimetable;
pub use types::*;

/// Commonly used items
pub mod prelude {
    pub use crate::{ics::*, links::*, push::*, reader::*, term::*, timetable::*, types::*};
}
