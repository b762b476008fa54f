use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use crate::{
    ClockTime, Error, IcsOptions, ModuleSlot, PatternKey, RecurringEvent, Result, Term, Weekday,
    WeeklyTimetable,
};

#[cfg(test)]
mod tests;

/// MIME type for generated documents
pub const ICS_MIME_TYPE: &str = "text/calendar; charset=utf-8";

/// UTC basic format used by DTSTAMP/DTSTART/DTEND
pub const ICS_DATETIME_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// RFC 5545 recommends folding content lines longer than 75 octets.
const MAX_LINE_OCTETS: usize = 75;

/// Generate with default options.
///
/// `term_start` must be a Monday; `occurrence_count` bounds the weekly RRULE.
pub fn generate(
    timetable: &WeeklyTimetable,
    selection: &BTreeSet<String>,
    term_start: NaiveDate,
    occurrence_count: u32,
) -> Result<String> {
    let term = Term::new(term_start, occurrence_count)?;
    IcsGenerator::default().generate(timetable, selection, &term)
}

/// ICS日历生成器
pub struct IcsGenerator {
    options: IcsOptions,
}

impl IcsGenerator {
    pub fn new(options: IcsOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &IcsOptions {
        &self.options
    }

    /// 生成ICS日历内容
    ///
    /// Fails before producing any text if the timetable is malformed or no
    /// slot matches the selection.
    pub fn generate(
        &self,
        timetable: &WeeklyTimetable,
        selection: &BTreeSet<String>,
        term: &Term,
    ) -> Result<String> {
        let events = self.events(timetable, selection, term)?;
        let content = self.render(&events, selection, Utc::now());

        tracing::info!(
            "Generated calendar with {} recurring events for {} modules",
            events.len(),
            selection.len()
        );

        Ok(content)
    }

    /// 按模式去重后的每周重复事件
    pub fn events(
        &self,
        timetable: &WeeklyTimetable,
        selection: &BTreeSet<String>,
        term: &Term,
    ) -> Result<Vec<RecurringEvent>> {
        timetable.validate()?;

        let now = Utc::now();
        let mut seen: HashSet<PatternKey> = HashSet::new();
        let mut events = Vec::new();

        for (weekday, slot) in timetable.iter() {
            if !selection.contains(&slot.module) {
                continue;
            }

            if !seen.insert(PatternKey::of(weekday, slot)) {
                tracing::debug!(
                    "Slot {} (week {}) repeats {} {} {}, skipping",
                    slot.id,
                    slot.week,
                    slot.module,
                    weekday,
                    slot.time
                );
                continue;
            }

            events.push(self.build_event(weekday, slot, term, now)?);
        }

        if events.is_empty() {
            return Err(Error::EmptySelection);
        }

        Ok(events)
    }

    /// 将单节课映射为每周重复事件
    fn build_event(
        &self,
        weekday: Weekday,
        slot: &ModuleSlot,
        term: &Term,
        now: DateTime<Utc>,
    ) -> Result<RecurringEvent> {
        let date = term.first_occurrence(weekday);
        let first_start = self.resolve_local(date, slot.time.start)?;
        let first_end = self.resolve_local(date, slot.time.end)?;

        tracing::debug!(
            "Built event for {} on {} {} starting {}",
            slot.module,
            weekday,
            slot.time,
            first_start
        );

        Ok(RecurringEvent {
            uid: self.generate_uid(now),
            summary: slot.module.clone(),
            description: self.build_description(slot),
            location: slot.location.clone(),
            first_start,
            first_end,
            count: term.occurrences(),
        })
    }

    /// Wall-clock time in the configured zone, as UTC.
    fn resolve_local(&self, date: NaiveDate, time: ClockTime) -> Result<DateTime<Utc>> {
        let naive = date.and_time(time.to_naive_time());
        self.options
            .timezone
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| {
                Error::MalformedTimeInterval(format!(
                    "{} does not exist in {}",
                    naive,
                    self.options.timezone.name()
                ))
            })
    }

    /// `<millis base36><random>@<domain>`
    fn generate_uid(&self, now: DateTime<Utc>) -> String {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or_default();
        format!(
            "{}{}@{}",
            to_base36(millis),
            Uuid::new_v4().simple(),
            self.options.uid_domain
        )
    }

    /// 构建课程描述信息
    pub fn build_description(&self, slot: &ModuleSlot) -> String {
        let mut lines = Vec::new();

        if !slot.staff.is_empty() {
            lines.push(slot.staff.clone());
        }

        if slot.location.is_empty() {
            lines.push(slot.module.clone());
        } else {
            lines.push(format!("{} - {}", slot.module, slot.location));
        }

        if !slot.event_category.is_empty() {
            lines.push(format!("Category: {}", slot.event_category));
        }
        if !slot.groups.is_empty() {
            lines.push(format!("Groups: {}", slot.groups));
        }
        if !slot.department.is_empty() {
            lines.push(format!("Department: {}", slot.department));
        }
        if let Some(notes) = slot.notes.as_deref().filter(|n| !n.is_empty()) {
            lines.push(notes.to_string());
        }
        if let Some(link) = slot
            .published_online_link
            .as_deref()
            .filter(|l| !l.is_empty())
        {
            lines.push(format!("Online: {link}"));
        }

        lines.join("\n")
    }

    /// 日历名称，附带选中的课程
    pub fn calendar_name(&self, selection: &BTreeSet<String>) -> String {
        if selection.is_empty() {
            self.options.calendar_name.clone()
        } else {
            let modules: Vec<&str> = selection.iter().map(String::as_str).collect();
            format!("{} - {}", self.options.calendar_name, modules.join(", "))
        }
    }

    fn render(
        &self,
        events: &[RecurringEvent],
        selection: &BTreeSet<String>,
        now: DateTime<Utc>,
    ) -> String {
        let mut ics_content = String::new();

        // ICS文件头部
        push_line(&mut ics_content, "BEGIN:VCALENDAR");
        push_line(&mut ics_content, "VERSION:2.0");
        push_line(&mut ics_content, &format!("PRODID:{}", self.options.product_id));
        push_line(&mut ics_content, "CALSCALE:GREGORIAN");
        push_line(&mut ics_content, "METHOD:PUBLISH");
        push_line(
            &mut ics_content,
            &format!("X-WR-CALNAME:{}", escape_text(&self.calendar_name(selection))),
        );
        push_line(
            &mut ics_content,
            &format!("X-WR-TIMEZONE:{}", self.options.timezone.name()),
        );
        push_line(
            &mut ics_content,
            &format!(
                "X-WR-CALDESC:{}",
                escape_text(&self.options.calendar_description)
            ),
        );

        let dtstamp = now.format(ICS_DATETIME_FORMAT).to_string();
        for event in events {
            self.add_event(&mut ics_content, event, &dtstamp);
        }

        // ICS文件尾部
        push_line(&mut ics_content, "END:VCALENDAR");

        ics_content
    }

    /// 添加单个课程事件
    fn add_event(&self, ics_content: &mut String, event: &RecurringEvent, dtstamp: &str) {
        push_line(ics_content, "BEGIN:VEVENT");
        push_line(ics_content, &format!("UID:{}", event.uid));
        push_line(ics_content, &format!("DTSTAMP:{dtstamp}"));
        push_line(
            ics_content,
            &format!("DTSTART:{}", event.first_start.format(ICS_DATETIME_FORMAT)),
        );
        push_line(
            ics_content,
            &format!("DTEND:{}", event.first_end.format(ICS_DATETIME_FORMAT)),
        );
        push_line(ics_content, &format!("RRULE:{}", event.rrule()));
        push_line(
            ics_content,
            &format!("SUMMARY:{}", escape_text(&event.summary)),
        );
        if self.options.include_description {
            push_line(
                ics_content,
                &format!("DESCRIPTION:{}", escape_text(&event.description)),
            );
        }
        push_line(
            ics_content,
            &format!("LOCATION:{}", escape_text(&event.location)),
        );
        push_line(ics_content, "STATUS:CONFIRMED");
        push_line(ics_content, "TRANSP:OPAQUE");

        // 添加提醒
        if let Some(reminder_minutes) = self.options.reminder_minutes {
            push_line(ics_content, "BEGIN:VALARM");
            push_line(ics_content, "ACTION:DISPLAY");
            push_line(
                ics_content,
                &format!("DESCRIPTION:{}", escape_text(&event.summary)),
            );
            push_line(ics_content, &format!("TRIGGER:-PT{reminder_minutes}M"));
            push_line(ics_content, "END:VALARM");
        }

        push_line(ics_content, "END:VEVENT");
    }
}

impl Default for IcsGenerator {
    fn default() -> Self {
        Self::new(IcsOptions::default())
    }
}

/// 转义ICS文本内容
///
/// Backslash goes first so escapes introduced later are not doubled.
pub fn escape_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace(';', "\\;")
        .replace('\n', "\\n")
}

/// Inverse of [`escape_text`].
pub fn unescape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(escaped @ (',' | ';' | '\\')) => out.push(escaped),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}

/// 导出文件名：`<prefix>_<modules>_<date>.ics`
///
/// Module tokens are sorted so the name does not depend on selection order.
pub fn ics_filename<I, S>(prefix: &str, selection: I, date: NaiveDate) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let tokens: BTreeSet<String> = selection
        .into_iter()
        .map(|module| filename_token(module.as_ref()))
        .filter(|token| !token.is_empty())
        .collect();

    if tokens.is_empty() {
        format!("{prefix}_{date}.ics")
    } else {
        let tokens: Vec<String> = tokens.into_iter().collect();
        format!("{}_{}_{}.ics", prefix, tokens.join("_"), date)
    }
}

fn filename_token(module: &str) -> String {
    let mut token = String::with_capacity(module.len());
    for c in module.chars() {
        if c.is_alphanumeric() {
            token.push(c);
        } else if !token.is_empty() && !token.ends_with('-') {
            token.push('-');
        }
    }
    token.trim_end_matches('-').to_string()
}

/// Append one content line, folded, with CRLF.
///
/// A folded segment never ends in whitespace: common readers trim it.
/// The fold moves back before any trailing whitespace run, which is
/// carried onto the continuation line. A segment made only of whitespace
/// cannot be split and is allowed past the limit.
fn push_line(ics_content: &mut String, line: &str) {
    let mut segment = String::new();
    // the leading space counts toward a continuation line
    let mut limit = MAX_LINE_OCTETS;
    for c in line.chars() {
        if segment.len() + c.len_utf8() > limit {
            let keep = segment.trim_end().len();
            if keep > 0 {
                let carried = segment.split_off(keep);
                if limit < MAX_LINE_OCTETS {
                    ics_content.push_str("\r\n ");
                }
                ics_content.push_str(&segment);
                segment = carried;
                limit = MAX_LINE_OCTETS - 1;
            }
        }
        segment.push(c);
    }
    if limit < MAX_LINE_OCTETS {
        ics_content.push_str("\r\n ");
    }
    ics_content.push_str(&segment);
    ics_content.push_str("\r\n");
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(DIGITS[(value % 36) as usize] as char);
        value /= 36;
    }
    digits.iter().rev().collect()
}
