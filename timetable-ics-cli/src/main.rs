mod commands;
mod opener;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "timetable-ics")]
#[command(about = "Export a weekly lecture timetable to your calendar")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 启用详细日志
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// 课表与选课参数
#[derive(Args, Debug, Clone)]
pub struct ScheduleArgs {
    /// 课表JSON文件路径
    #[arg(short, long)]
    pub timetable: String,

    /// 选中的课程名称（可重复）
    #[arg(short, long = "module", required = true)]
    pub modules: Vec<String>,

    /// 学期锚点周一（格式：YYYY-MM-DD，如 2025-10-13）
    #[arg(short = 's', long, env = "TIMETABLE_ICS_TERM_START", conflicts_with = "first_day")]
    pub start_date: Option<String>,

    /// 学期第一天；锚点取其后的第二个周一
    #[arg(long)]
    pub first_day: Option<String>,

    /// 重复周数
    #[arg(short, long, env = "TIMETABLE_ICS_WEEKS", default_value = "8")]
    pub weeks: u32,

    /// 课程时间所在时区
    #[arg(long, env = "TIMETABLE_ICS_TIMEZONE", default_value = "Europe/London")]
    pub timezone: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 生成ICS文件
    Generate {
        #[command(flatten)]
        schedule: ScheduleArgs,

        /// 输出文件路径
        #[arg(short, long)]
        output: Option<String>,

        /// 日历名称
        #[arg(long)]
        calendar_name: Option<String>,

        /// 不包含课程描述
        #[arg(long)]
        no_description: bool,

        /// 提醒时间（分钟）
        #[arg(long)]
        reminder_minutes: Option<u32>,
    },

    /// 列出课表中的课程
    Modules {
        /// 课表JSON文件路径
        #[arg(short, long)]
        timetable: String,
    },

    /// 打印每个事件的网页日历链接
    Links {
        #[command(flatten)]
        schedule: ScheduleArgs,

        /// 网页日历主机
        #[arg(long, default_value = timetable_ics_core::links::DEFAULT_CALENDAR_HOST)]
        host: String,
    },

    /// 在浏览器中逐个打开网页日历链接
    Push {
        #[command(flatten)]
        schedule: ScheduleArgs,

        /// 网页日历主机
        #[arg(long, default_value = timetable_ics_core::links::DEFAULT_CALENDAR_HOST)]
        host: String,

        /// 两次打开之间的间隔（毫秒）
        #[arg(long, default_value = "300")]
        stagger_ms: u64,

        /// 只打印，不打开浏览器
        #[arg(long)]
        dry_run: bool,
    },

    /// 查看ICS文件中的事件
    Inspect {
        /// ICS文件路径
        file: String,

        /// 显示时间所用的时区
        #[arg(long, env = "TIMETABLE_ICS_TIMEZONE", default_value = "Europe/London")]
        timezone: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 设置日志级别
    let log_level = if cli.verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("timetable_ics_cli={log_level},timetable_ics_core={log_level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Generate {
            schedule,
            output,
            calendar_name,
            no_description,
            reminder_minutes,
        } => {
            commands::generate_command(commands::GenerateParams {
                schedule,
                output,
                calendar_name,
                include_description: !no_description,
                reminder_minutes,
            })
            .await
        }

        Commands::Modules { timetable } => commands::modules_command(timetable).await,

        Commands::Links { schedule, host } => commands::links_command(schedule, host).await,

        Commands::Push {
            schedule,
            host,
            stagger_ms,
            dry_run,
        } => commands::push_command(schedule, host, stagger_ms, dry_run).await,

        Commands::Inspect { file, timezone } => commands::inspect_command(file, timezone).await,
    }
}
