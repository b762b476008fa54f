use super::*;
use crate::reader::read_events_str;
use chrono::{Datelike, Timelike};
use std::collections::BTreeMap;

fn slot(module: &str, start: &str, end: &str, week: u32, id: &str) -> ModuleSlot {
    ModuleSlot {
        time: crate::TimeInterval::parse(start, end).unwrap(),
        week,
        module: module.to_string(),
        location: "Huxley 340".to_string(),
        staff: "Dr Knuth".to_string(),
        groups: "C2".to_string(),
        event_category: "Lecture".to_string(),
        department: "Computing".to_string(),
        id: id.to_string(),
        notes: None,
        published_online_link: None,
    }
}

fn timetable(entries: Vec<(Weekday, ModuleSlot)>) -> WeeklyTimetable {
    let mut days: BTreeMap<Weekday, Vec<ModuleSlot>> =
        Weekday::ALL.iter().map(|day| (*day, Vec::new())).collect();
    for (day, slot) in entries {
        days.entry(day).or_default().push(slot);
    }
    WeeklyTimetable::new(days).unwrap()
}

fn selection(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| (*name).to_string()).collect()
}

fn term_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, 13).unwrap()
}

fn count_events(ics_content: &str) -> usize {
    ics_content.matches("BEGIN:VEVENT\r\n").count()
}

#[test]
fn test_algorithms_scenario() {
    let timetable = timetable(vec![(
        Weekday::Monday,
        slot("Algorithms", "10:00", "12:00", 1, "a1"),
    )]);

    let ics_content = generate(&timetable, &selection(&["Algorithms"]), term_start(), 8)
        .expect("生成ICS失败");

    assert_eq!(count_events(&ics_content), 1);
    // London is on BST until late October
    assert!(ics_content.contains("DTSTART:20251013T090000Z\r\n"));
    assert!(ics_content.contains("DTEND:20251013T110000Z\r\n"));
    assert!(ics_content.contains("RRULE:FREQ=WEEKLY;COUNT=8\r\n"));
    assert!(ics_content.contains("SUMMARY:Algorithms\r\n"));
    assert!(ics_content.contains("LOCATION:Huxley 340\r\n"));
    assert!(ics_content.contains("STATUS:CONFIRMED\r\n"));
    assert!(ics_content.contains("TRANSP:OPAQUE\r\n"));
}

#[test]
fn test_repeated_weeks_collapse_into_one_event() {
    let timetable = timetable(vec![
        (Weekday::Monday, slot("Algorithms", "10:00", "12:00", 1, "a1")),
        (Weekday::Monday, slot("Algorithms", "10:00", "12:00", 2, "a2")),
    ]);

    let ics_content =
        generate(&timetable, &selection(&["Algorithms"]), term_start(), 8).unwrap();
    assert_eq!(count_events(&ics_content), 1);
}

#[test]
fn test_one_event_per_distinct_pattern() {
    let timetable = timetable(vec![
        (Weekday::Monday, slot("Algorithms", "10:00", "12:00", 1, "a1")),
        (Weekday::Monday, slot("Algorithms", "10:00", "12:00", 2, "a2")),
        // same module and time, different day
        (Weekday::Wednesday, slot("Algorithms", "10:00", "12:00", 1, "a3")),
        // same module and day, different time
        (Weekday::Monday, slot("Algorithms", "14:00", "15:00", 1, "a4")),
        (Weekday::Tuesday, slot("Databases", "09:00", "11:00", 1, "d1")),
        (Weekday::Tuesday, slot("Databases", "09:00", "11:00", 3, "d2")),
        (Weekday::Friday, slot("Networks", "11:00", "13:00", 1, "n1")),
    ]);

    let generator = IcsGenerator::default();
    let term = Term::new(term_start(), 8).unwrap();
    let events = generator
        .events(&timetable, &selection(&["Algorithms", "Databases"]), &term)
        .unwrap();

    assert_eq!(events.len(), 4);
    assert!(events.iter().all(|event| event.summary != "Networks"));

    // first-seen order: Monday slots, then Tuesday, then Wednesday
    let summaries: Vec<&str> = events.iter().map(|e| e.summary.as_str()).collect();
    assert_eq!(
        summaries,
        vec!["Algorithms", "Algorithms", "Databases", "Algorithms"]
    );
}

#[test]
fn test_round_trip_weekday_and_time() {
    let timetable = timetable(vec![
        (Weekday::Monday, slot("Algorithms", "10:00", "12:00", 1, "a1")),
        (Weekday::Thursday, slot("Databases", "9:30", "11:15", 1, "d1")),
        (Weekday::Friday, slot("Databases", "16:00", "17:00", 1, "d2")),
    ]);

    let ics_content = generate(
        &timetable,
        &selection(&["Algorithms", "Databases"]),
        term_start(),
        8,
    )
    .unwrap();
    let parsed = read_events_str(&ics_content).unwrap();
    assert_eq!(parsed.len(), 3);

    let expected = [
        (chrono::Weekday::Mon, (10, 0), (12, 0)),
        (chrono::Weekday::Thu, (9, 30), (11, 15)),
        (chrono::Weekday::Fri, (16, 0), (17, 0)),
    ];
    for (event, (weekday, start, end)) in parsed.iter().zip(expected) {
        let local_start = event.start.with_timezone(&chrono_tz::Europe::London);
        let local_end = event.end.with_timezone(&chrono_tz::Europe::London);
        assert_eq!(local_start.weekday(), weekday);
        assert_eq!((local_start.hour(), local_start.minute()), start);
        assert_eq!((local_end.hour(), local_end.minute()), end);
        // first occurrence falls in the anchor week
        let days_from_anchor = (local_start.date_naive() - term_start()).num_days();
        assert!((0..5).contains(&days_from_anchor));
        assert_eq!(event.rrule.as_deref(), Some("FREQ=WEEKLY;COUNT=8"));
    }
}

#[test]
fn test_escaping_round_trip() {
    let samples = [
        "plain",
        "Logic, Sets; Proofs",
        r"C:\path\to\notes",
        "line one\nline two",
        r"mixed \, already; escaped\n text",
        ",;\\\n",
    ];
    for sample in samples {
        assert_eq!(unescape_text(&escape_text(sample)), sample, "sample {sample:?}");
    }

    assert_eq!(escape_text("a\\b,c;d\ne"), "a\\\\b\\,c\\;d\\ne");
    assert_eq!(escape_text("a\r\nb"), "a\\nb");
}

#[test]
fn test_escaped_text_survives_parser() {
    let mut special = slot("Logic, Sets; Proofs", "10:00", "11:00", 1, "l1");
    special.location = r"Room 1\2, Level 3".to_string();
    special.staff = "Dr A; Dr B".to_string();
    special.notes = Some("Bring notes\nand a pen".to_string());
    let timetable = timetable(vec![(Weekday::Tuesday, special.clone())]);

    let generator = IcsGenerator::default();
    let term = Term::default();
    let ics_content = generator
        .generate(&timetable, &selection(&["Logic, Sets; Proofs"]), &term)
        .unwrap();
    assert!(ics_content.contains("SUMMARY:Logic\\, Sets\\; Proofs\r\n"));

    let parsed = read_events_str(&ics_content).unwrap();
    assert_eq!(parsed[0].summary, special.module);
    assert_eq!(parsed[0].location.as_deref(), Some(special.location.as_str()));
    assert_eq!(
        parsed[0].description.as_deref(),
        Some(generator.build_description(&special).as_str())
    );
}

#[test]
fn test_empty_selection_fails() {
    let timetable = timetable(vec![(
        Weekday::Monday,
        slot("Algorithms", "10:00", "12:00", 1, "a1"),
    )]);

    assert!(matches!(
        generate(&timetable, &BTreeSet::new(), term_start(), 8),
        Err(Error::EmptySelection)
    ));
    assert!(matches!(
        generate(&timetable, &selection(&["Compilers"]), term_start(), 8),
        Err(Error::EmptySelection)
    ));
}

#[test]
fn test_term_start_must_be_monday() {
    let timetable = timetable(vec![(
        Weekday::Monday,
        slot("Algorithms", "10:00", "12:00", 1, "a1"),
    )]);
    let tuesday = NaiveDate::from_ymd_opt(2025, 10, 14).unwrap();

    assert!(matches!(
        generate(&timetable, &selection(&["Algorithms"]), tuesday, 8),
        Err(Error::InvalidTermStart(date)) if date == tuesday
    ));
}

#[test]
fn test_envelope_and_crlf() {
    let timetable = timetable(vec![
        (Weekday::Monday, slot("Algorithms", "10:00", "12:00", 1, "a1")),
        (Weekday::Tuesday, slot("Databases", "09:00", "11:00", 1, "d1")),
    ]);

    let ics_content = generate(
        &timetable,
        &selection(&["Databases", "Algorithms"]),
        term_start(),
        8,
    )
    .unwrap();

    assert!(ics_content.starts_with("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n"));
    assert!(ics_content.ends_with("END:VCALENDAR\r\n"));
    assert!(ics_content.contains("PRODID:-//Imperial College London//Calendar Export//EN\r\n"));
    assert!(ics_content.contains("CALSCALE:GREGORIAN\r\n"));
    assert!(ics_content.contains("METHOD:PUBLISH\r\n"));
    assert!(ics_content.contains("X-WR-CALNAME:Imperial College - Algorithms\\, Databases\r\n"));
    assert!(ics_content.contains("X-WR-TIMEZONE:Europe/London\r\n"));
    assert!(ics_content.contains("X-WR-CALDESC:"));

    // every LF is part of a CRLF
    assert_eq!(
        ics_content.matches('\n').count(),
        ics_content.matches("\r\n").count()
    );
    // no content line exceeds 75 octets
    assert!(ics_content.split("\r\n").all(|line| line.len() <= 75));
}

#[test]
fn test_uids_are_unique() {
    let timetable = timetable(vec![
        (Weekday::Monday, slot("Algorithms", "10:00", "12:00", 1, "a1")),
        (Weekday::Tuesday, slot("Algorithms", "10:00", "12:00", 1, "a2")),
        (Weekday::Wednesday, slot("Algorithms", "10:00", "12:00", 1, "a3")),
    ]);
    let ics_content =
        generate(&timetable, &selection(&["Algorithms"]), term_start(), 8).unwrap();

    let parsed = read_events_str(&ics_content).unwrap();
    let uids: HashSet<&str> = parsed.iter().map(|event| event.uid.as_str()).collect();
    assert_eq!(uids.len(), 3);
    assert!(uids.iter().all(|uid| uid.ends_with("@imperial.ac.uk")));
}

#[test]
fn test_injected_timezone_and_winter_time() {
    let timetable = timetable(vec![(
        Weekday::Monday,
        slot("Algorithms", "10:00", "12:00", 1, "a1"),
    )]);
    let algorithms = selection(&["Algorithms"]);

    let utc = IcsGenerator::new(IcsOptions {
        timezone: chrono_tz::UTC,
        ..Default::default()
    });
    let ics_content = utc
        .generate(&timetable, &algorithms, &Term::default())
        .unwrap();
    assert!(ics_content.contains("DTSTART:20251013T100000Z\r\n"));
    assert!(ics_content.contains("X-WR-TIMEZONE:UTC\r\n"));

    // after the clocks go back London matches UTC
    let winter = Term::from_date_str("2025-11-03", 8).unwrap();
    let ics_content = IcsGenerator::default()
        .generate(&timetable, &algorithms, &winter)
        .unwrap();
    assert!(ics_content.contains("DTSTART:20251103T100000Z\r\n"));
}

#[test]
fn test_optional_description_and_reminder() {
    let timetable = timetable(vec![(
        Weekday::Monday,
        slot("Algorithms", "10:00", "12:00", 1, "a1"),
    )]);
    let generator = IcsGenerator::new(IcsOptions {
        include_description: false,
        reminder_minutes: Some(15),
        ..Default::default()
    });

    let ics_content = generator
        .generate(&timetable, &selection(&["Algorithms"]), &Term::default())
        .unwrap();
    assert!(!ics_content.contains("DESCRIPTION:Dr Knuth"));
    assert!(ics_content.contains("BEGIN:VALARM\r\n"));
    assert!(ics_content.contains("TRIGGER:-PT15M\r\n"));
}

#[test]
fn test_description_format() {
    let generator = IcsGenerator::default();
    let mut lecture = slot("Algorithms", "10:00", "12:00", 1, "a1");
    lecture.notes = Some("Recorded".to_string());

    assert_eq!(
        generator.build_description(&lecture),
        "Dr Knuth\nAlgorithms - Huxley 340\nCategory: Lecture\nGroups: C2\nDepartment: Computing\nRecorded"
    );

    lecture.published_online_link = Some("https://teams.example/algo".to_string());
    assert!(
        generator
            .build_description(&lecture)
            .ends_with("\nRecorded\nOnline: https://teams.example/algo")
    );
    lecture.published_online_link = Some(String::new());
    assert!(generator.build_description(&lecture).ends_with("\nRecorded"));

    let bare = ModuleSlot {
        staff: String::new(),
        location: String::new(),
        groups: String::new(),
        event_category: String::new(),
        department: String::new(),
        ..slot("Algorithms", "10:00", "12:00", 1, "a1")
    };
    assert_eq!(generator.build_description(&bare), "Algorithms");
}

#[test]
fn test_filename_ignores_selection_order() {
    let date = NaiveDate::from_ymd_opt(2025, 10, 6).unwrap();
    let forward = ics_filename("imperial_calendar", ["Algorithms", "Databases"], date);
    let backward = ics_filename("imperial_calendar", ["Databases", "Algorithms"], date);

    assert_eq!(forward, backward);
    assert_eq!(forward, "imperial_calendar_Algorithms_Databases_2025-10-06.ics");
}

#[test]
fn test_filename_tokens_are_sanitized() {
    let date = NaiveDate::from_ymd_opt(2025, 10, 6).unwrap();
    assert_eq!(
        ics_filename("cal", ["Computer Networks", "C++ / Systems"], date),
        "cal_C-Systems_Computer-Networks_2025-10-06.ics"
    );
    assert_eq!(ics_filename("cal", Vec::<String>::new(), date), "cal_2025-10-06.ics");
}

#[test]
fn test_long_lines_are_folded() {
    let mut lecture = slot("Algorithms", "10:00", "12:00", 1, "a1");
    lecture.notes = Some("Ω".repeat(60));
    let timetable = timetable(vec![(Weekday::Monday, lecture.clone())]);

    let generator = IcsGenerator::default();
    let ics_content = generator
        .generate(&timetable, &selection(&["Algorithms"]), &Term::default())
        .unwrap();
    assert!(ics_content.contains("\r\n "));
    assert!(ics_content.split("\r\n").all(|line| line.len() <= 75));

    let parsed = read_events_str(&ics_content).unwrap();
    assert_eq!(
        parsed[0].description.as_deref(),
        Some(generator.build_description(&lecture).as_str())
    );
}

#[test]
fn test_whitespace_runs_survive_folding() {
    let generator = IcsGenerator::default();
    for k in 0..80 {
        let mut lecture = slot("Algorithms", "10:00", "12:00", 1, "a1");
        lecture.notes = Some(format!("{}  {}", "x".repeat(k), "y".repeat(30)));
        let timetable = timetable(vec![(Weekday::Monday, lecture.clone())]);

        let ics_content = generator
            .generate(&timetable, &selection(&["Algorithms"]), &Term::default())
            .unwrap();
        for line in ics_content.split("\r\n") {
            assert!(line.len() <= 75, "line too long at k={k}: {line}");
            assert_eq!(line, line.trim_end(), "segment ends in whitespace at k={k}");
        }

        let parsed = read_events_str(&ics_content).unwrap();
        assert_eq!(
            parsed[0].description.as_deref(),
            Some(generator.build_description(&lecture).as_str()),
            "description changed at k={k}"
        );
    }
}

#[test]
fn test_nonexistent_local_time_is_rejected() {
    // London clocks jump from 01:00 to 02:00
    let date = NaiveDate::from_ymd_opt(2026, 3, 29).unwrap();
    let result = IcsGenerator::default().resolve_local(date, ClockTime::new(1, 30).unwrap());
    assert!(matches!(result, Err(Error::MalformedTimeInterval(_))));
}

#[test]
fn test_ambiguous_local_time_takes_earlier_instant() {
    // 01:30 happens twice when London leaves BST
    let date = NaiveDate::from_ymd_opt(2025, 10, 26).unwrap();
    let instant = IcsGenerator::default()
        .resolve_local(date, ClockTime::new(1, 30).unwrap())
        .unwrap();
    assert_eq!(instant.format(ICS_DATETIME_FORMAT).to_string(), "20251026T003000Z");
}

#[test]
fn test_base36() {
    assert_eq!(to_base36(0), "0");
    assert_eq!(to_base36(35), "z");
    assert_eq!(to_base36(36), "10");
}
