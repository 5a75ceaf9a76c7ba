//! Startup configuration.
//!
//! Every option can be passed as a flag or through the environment (a `.env`
//! file is loaded first by `main`).

use chrono::{NaiveTime, Weekday};
use clap::Args;
use std::fmt;
use std::path::PathBuf;

use crate::deadline::Deadline;
use crate::extract::SheetLayout;
use crate::worker::WorkerSettings;

pub const DEFAULT_LATE_NOTICE: &str =
    "Вы опоздали! Приём файлов на этой неделе закрыт, напишите администратору.";

#[derive(Clone, Args)]
pub struct BotConfig {
    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Chat id that receives the weekly summary
    #[arg(long, env = "ADMIN_USER_ID", allow_negative_numbers = true)]
    pub admin_user_id: i64,

    /// Secondary contact chat id
    #[arg(long, env = "SECONDARY_USER_ID", allow_negative_numbers = true)]
    pub secondary_user_id: Option<i64>,

    /// Deadline weekday: 0 = Monday … 6 = Sunday, or a weekday name
    #[arg(long, env = "DEADLINE_DAY", default_value = "4", value_parser = parse_weekday)]
    pub deadline_day: Weekday,

    /// Deadline time of day, 24-hour "HH:MM"
    #[arg(long, env = "DEADLINE_TIME", default_value = "16:00", value_parser = parse_hhmm)]
    pub deadline_time: NaiveTime,

    /// Directory uploaded files are written to
    #[arg(long, env = "UPLOAD_FOLDER", default_value = "uploads")]
    pub upload_folder: PathBuf,

    /// Reply sent to late submitters
    #[arg(long, env = "LATE_NOTICE", default_value = DEFAULT_LATE_NOTICE)]
    pub late_notice: String,

    /// Seconds between scheduler checks
    #[arg(
        long,
        env = "TICK_INTERVAL_SECS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub tick_interval_secs: u64,

    /// Long-poll timeout for getUpdates, in seconds
    #[arg(long, env = "POLL_TIMEOUT_SECS", default_value_t = 30)]
    pub poll_timeout_secs: u64,
}

impl BotConfig {
    pub fn deadline(&self) -> Deadline {
        Deadline::new(self.deadline_day, self.deadline_time)
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.upload_folder.join("summaries")
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            admin_chat_id: self.admin_user_id,
            deadline: self.deadline(),
            upload_dir: self.upload_folder.clone(),
            archive_dir: self.archive_dir(),
            late_notice: self.late_notice.clone(),
            layout: SheetLayout::default(),
        }
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &"<redacted>")
            .field("admin_user_id", &self.admin_user_id)
            .field("secondary_user_id", &self.secondary_user_id)
            .field("deadline_day", &self.deadline_day)
            .field("deadline_time", &self.deadline_time)
            .field("upload_folder", &self.upload_folder)
            .field("tick_interval_secs", &self.tick_interval_secs)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

/// Parses a weekday given as 0–6 (Monday first) or as an English name.
pub fn parse_weekday(s: &str) -> Result<Weekday, String> {
    let s = s.trim();
    if let Ok(n) = s.parse::<u8>() {
        return Weekday::try_from(n)
            .map_err(|_| format!("weekday number must be 0-6, got {n}"));
    }
    s.parse::<Weekday>()
        .map_err(|_| format!("'{s}' is not a weekday"))
}

/// Parses a zero-padded 24-hour "HH:MM" time.
pub fn parse_hhmm(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|_| format!("'{s}' is not a HH:MM time"))
}
