use std::io::{BufReader, Cursor, Read};

use chrono::{DateTime, NaiveDateTime, Utc};
use ical::parser::ical::{IcalParser, component::IcalEvent};

use crate::{Error, Result, ics::ICS_DATETIME_FORMAT, ics::unescape_text};

/// An event read back from an ICS document, with text unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEvent {
    pub uid: String,
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub rrule: Option<String>,
}

/// 读取ICS中的所有事件
pub fn read_events<R: Read>(reader: R) -> Result<Vec<ParsedEvent>> {
    let parser = IcalParser::new(BufReader::new(reader));
    let mut events = Vec::new();

    for calendar in parser {
        let calendar = calendar.map_err(|err| Error::IcsParse(err.to_string()))?;
        for event in &calendar.events {
            events.push(parse_event(event)?);
        }
    }

    Ok(events)
}

pub fn read_events_str(content: &str) -> Result<Vec<ParsedEvent>> {
    read_events(Cursor::new(content.as_bytes()))
}

fn parse_event(event: &IcalEvent) -> Result<ParsedEvent> {
    let uid = required(event, "UID")?;
    let start = parse_utc(required(event, "DTSTART")?)?;
    let end = parse_utc(required(event, "DTEND")?)?;

    Ok(ParsedEvent {
        uid: uid.to_string(),
        summary: event_property(event, "SUMMARY")
            .map(unescape_text)
            .unwrap_or_default(),
        description: event_property(event, "DESCRIPTION").map(unescape_text),
        location: event_property(event, "LOCATION").map(unescape_text),
        start,
        end,
        rrule: event_property(event, "RRULE").map(str::to_string),
    })
}

fn required<'a>(event: &'a IcalEvent, name: &str) -> Result<&'a str> {
    event_property(event, name)
        .ok_or_else(|| Error::IcsParse(format!("event is missing {name}")))
}

fn event_property<'a>(event: &'a IcalEvent, name: &str) -> Option<&'a str> {
    event
        .properties
        .iter()
        .find(|prop| prop.name.eq_ignore_ascii_case(name))
        .and_then(|prop| prop.value.as_deref())
}

fn parse_utc(value: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value, ICS_DATETIME_FORMAT)?;
    Ok(naive.and_utc())
}
