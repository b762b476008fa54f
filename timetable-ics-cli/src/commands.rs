use std::{collections::BTreeSet, fs, time::Duration};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use timetable_ics_core::{
    links::links_for_events,
    prelude::*,
    push::{self, PushPlan, PushReport},
};

use crate::{
    ScheduleArgs,
    opener::{BrowserOpener, PrintOpener},
};

/// 默认导出文件名前缀
const FILENAME_PREFIX: &str = "imperial_calendar";

/// 生成ICS命令参数
pub struct GenerateParams {
    pub schedule: ScheduleArgs,
    pub output: Option<String>,
    pub calendar_name: Option<String>,
    pub include_description: bool,
    pub reminder_minutes: Option<u32>,
}

/// 解析后的课表、选课与学期
struct Schedule {
    timetable: WeeklyTimetable,
    selection: BTreeSet<String>,
    term: Term,
    options: IcsOptions,
}

impl Schedule {
    fn load(args: &ScheduleArgs) -> Result<Self> {
        let timetable = WeeklyTimetable::from_path(&args.timetable)
            .with_context(|| format!("failed to load timetable {}", args.timetable))?;
        let selection: BTreeSet<String> = args.modules.iter().cloned().collect();

        let term = match (&args.start_date, &args.first_day) {
            (Some(start), _) => Term::from_date_str(start, args.weeks)?,
            (None, Some(first_day)) => {
                let first_day = NaiveDate::parse_from_str(first_day.trim(), "%Y-%m-%d")
                    .with_context(|| format!("invalid first day '{first_day}'"))?;
                Term::second_monday_on_or_after(first_day, args.weeks)?
            }
            (None, None) => Term::from_date_str(DEFAULT_TERM_START, args.weeks)?,
        };

        let known = timetable.module_names();
        for module in &selection {
            if !known.contains(module) {
                tracing::warn!("Module '{}' does not appear in the timetable", module);
            }
        }

        let options = IcsOptions {
            timezone: parse_timezone(&args.timezone)?,
            ..Default::default()
        };

        tracing::info!(
            "Using term anchor {} for {} weeks in {}",
            term.start(),
            term.occurrences(),
            options.timezone.name()
        );

        Ok(Self {
            timetable,
            selection,
            term,
            options,
        })
    }

    fn events(&self) -> Result<Vec<RecurringEvent>> {
        let generator = IcsGenerator::new(self.options.clone());
        Ok(generator.events(&self.timetable, &self.selection, &self.term)?)
    }
}

/// 生成ICS命令
pub async fn generate_command(params: GenerateParams) -> Result<()> {
    let mut schedule = Schedule::load(&params.schedule)?;
    if let Some(name) = params.calendar_name {
        schedule.options.calendar_name = name;
    }
    schedule.options.include_description = params.include_description;
    schedule.options.reminder_minutes = params.reminder_minutes;

    println!("生成ICS日历文件...");
    let generator = IcsGenerator::new(schedule.options.clone());
    let ics_content = generator.generate(&schedule.timetable, &schedule.selection, &schedule.term)?;

    // 确定输出文件名
    let output_file = params.output.unwrap_or_else(|| {
        ics_filename(
            FILENAME_PREFIX,
            &schedule.selection,
            Local::now().date_naive(),
        )
    });

    fs::write(&output_file, ics_content)
        .with_context(|| format!("failed to write {output_file}"))?;
    println!("✓ ICS文件已保存到: {output_file} ({ICS_MIME_TYPE})");

    Ok(())
}

/// 列出课程命令
pub async fn modules_command(timetable: String) -> Result<()> {
    let timetable = WeeklyTimetable::from_path(&timetable)
        .with_context(|| format!("failed to load timetable {timetable}"))?;
    let modules = timetable.module_names();

    if modules.is_empty() {
        println!("课表中没有课程");
    } else {
        println!("可选课程 ({}):", modules.len());
        for module in modules {
            println!("  {module}");
        }
    }

    Ok(())
}

/// 打印深链接命令
pub async fn links_command(args: ScheduleArgs, host: String) -> Result<()> {
    let schedule = Schedule::load(&args)?;
    let links = links_for_events(&schedule.events()?, &host)?;

    for link in links {
        println!("{}\n  {}", link.summary, link.url);
    }

    Ok(())
}

/// 推送到网页日历命令
pub async fn push_command(
    args: ScheduleArgs,
    host: String,
    stagger_ms: u64,
    dry_run: bool,
) -> Result<()> {
    let schedule = Schedule::load(&args)?;
    let links = links_for_events(&schedule.events()?, &host)?;
    let plan = PushPlan::new(links, Duration::from_millis(stagger_ms));

    println!("推送 {} 个事件到网页日历...", plan.len());
    let report = if dry_run {
        dispatch(plan, PrintOpener).await?
    } else {
        dispatch(plan, BrowserOpener).await?
    };

    println!("✓ 已打开 {} 个链接", report.opened);
    if report.failed > 0 {
        println!("✗ {} 个链接未能打开", report.failed);
    }

    Ok(())
}

async fn dispatch<O>(plan: PushPlan, opener: O) -> Result<PushReport>
where
    O: LinkOpener + 'static,
{
    let (queue, scheduler) = push::channel(opener);
    let handle = tokio::spawn(scheduler.run());

    queue.enqueue_plan(plan)?;
    drop(queue);

    Ok(handle.await?)
}

/// 查看ICS命令
pub async fn inspect_command(file: String, timezone: String) -> Result<()> {
    let tz = parse_timezone(&timezone)?;
    let content = fs::read_to_string(&file).with_context(|| format!("failed to read {file}"))?;
    let events = read_events_str(&content)?;

    println!("{file}: {} 个事件", events.len());
    for event in events {
        let start = event.start.with_timezone(&tz);
        let end = event.end.with_timezone(&tz);
        println!(
            "  {} {} {}-{} {}",
            start.format("%a %Y-%m-%d"),
            event.summary,
            start.format("%H:%M"),
            end.format("%H:%M"),
            event.rrule.as_deref().unwrap_or("")
        );
        if let Some(location) = event.location.filter(|l| !l.is_empty()) {
            println!("    @ {location}");
        }
    }

    Ok(())
}
