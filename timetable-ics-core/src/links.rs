use url::Url;

use crate::{RecurringEvent, Result, ics::ICS_DATETIME_FORMAT};

/// 默认的网页日历主机
pub const DEFAULT_CALENDAR_HOST: &str = "calendar.google.com";

/// "Quick add" deep link for one event on a web calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarLink {
    pub summary: String,
    pub url: Url,
}

impl CalendarLink {
    /// `https://<host>/calendar/render?action=TEMPLATE&text=..&dates=<start>/<end>&details=..&location=..`
    pub fn for_event(event: &RecurringEvent, host: &str) -> Result<Self> {
        let mut url = Url::parse(&format!("https://{host}/calendar/render"))?;
        let dates = format!(
            "{}/{}",
            event.first_start.format(ICS_DATETIME_FORMAT),
            event.first_end.format(ICS_DATETIME_FORMAT)
        );

        url.query_pairs_mut()
            .append_pair("action", "TEMPLATE")
            .append_pair("text", &event.summary)
            .append_pair("dates", &dates)
            .append_pair("details", &event.description)
            .append_pair("location", &event.location)
            .append_pair("recur", &format!("RRULE:{}", event.rrule()));

        Ok(Self {
            summary: event.summary.clone(),
            url,
        })
    }
}

/// 为一组事件生成深链接
pub fn links_for_events(events: &[RecurringEvent], host: &str) -> Result<Vec<CalendarLink>> {
    events
        .iter()
        .map(|event| CalendarLink::for_event(event, host))
        .collect()
}
