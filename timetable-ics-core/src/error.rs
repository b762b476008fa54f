use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid timetable shape: {0}")]
    InvalidTimetableShape(String),

    #[error("No lectures match the selected modules")]
    EmptySelection,

    #[error("Malformed time interval: {0}")]
    MalformedTimeInterval(String),

    #[error("Term start {0} is not a Monday")]
    InvalidTermStart(NaiveDate),

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Date/time parsing failed: {0}")]
    DateTime(#[from] chrono::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL construction failed: {0}")]
    Url(#[from] url::ParseError),

    #[error("ICS parsing failed: {0}")]
    IcsParse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
