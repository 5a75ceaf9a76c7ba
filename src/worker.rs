//! The single consumer of the bot's event queue.
//!
//! Incoming documents and the weekly cutoff both arrive as [`Event`]s and are
//! handled one at a time, so a submission always lands either in the period
//! being summarized or in the next one.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::accumulator::Accumulator;
use crate::archive;
use crate::deadline::Deadline;
use crate::extract::{SheetLayout, extract_path};
use crate::summary::{MESSAGE_LIMIT, group_totals, paginate, summarize};
use crate::transport::BotApi;

pub const ACCEPTED_REPLY: &str = "Файл принят. Спасибо!";
pub const EMPTY_REPLY: &str =
    "В файле не найдено ни одной заполненной строки. Проверьте, что таблица заполнена по шаблону.";
pub const FAILED_REPLY: &str =
    "Не удалось обработать файл. Проверьте, что это таблица Excel, и отправьте её ещё раз.";

/// A document sent to the bot.
#[derive(Debug, Clone)]
pub struct Submission {
    pub chat_id: i64,
    pub file_id: String,
    pub file_name: String,
    /// Local time the message was sent.
    pub sent_at: NaiveDateTime,
}

#[derive(Debug)]
pub enum Event {
    Document(Submission),
    /// The weekly cutoff at `cutoff` has passed.
    PeriodClosed { cutoff: NaiveDateTime },
}

/// What happened to a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Accepted { rows: usize },
    Late,
    ClosedPeriod,
    Empty { dropped: usize },
    Failed,
}

/// Result of closing a period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodReport {
    pub batches: usize,
    pub rows: usize,
    pub archived: Option<PathBuf>,
    pub delivered: bool,
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub admin_chat_id: i64,
    pub deadline: Deadline,
    pub upload_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub late_notice: String,
    pub layout: SheetLayout,
}

pub struct Worker<B> {
    bot: B,
    settings: WorkerSettings,
    accumulator: Accumulator,
}

impl<B: BotApi> Worker<B> {
    pub fn new(bot: B, settings: WorkerSettings) -> Self {
        Self {
            bot,
            settings,
            accumulator: Accumulator::new(),
        }
    }

    pub fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    /// Consumes events until every sender is dropped.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Event>) {
        info!("Worker started");
        while let Some(event) = rx.recv().await {
            let now = Local::now().naive_local();
            match event {
                Event::Document(submission) => {
                    if let Err(e) = self.handle_document(submission, now).await {
                        error!(error = %e, "Failed to reply to submitter");
                    }
                }
                Event::PeriodClosed { cutoff } => {
                    self.close_period(cutoff).await;
                }
            }
        }
        info!("Event queue closed, worker stopping");
    }

    /// Checks the deadline, ingests the file if it is on time, and replies
    /// to the submitter.
    #[tracing::instrument(
        skip(self, submission),
        fields(chat_id = submission.chat_id, file_name = %submission.file_name)
    )]
    pub async fn handle_document(
        &mut self,
        submission: Submission,
        now: NaiveDateTime,
    ) -> Result<Outcome> {
        let deadline = self.settings.deadline;

        let outcome = if !deadline.should_accept(submission.sent_at) {
            info!(sent_at = %submission.sent_at, "Late submission rejected");
            Outcome::Late
        } else if !deadline.is_current_period(submission.sent_at, now) {
            info!(sent_at = %submission.sent_at, "Submission from a closed period rejected");
            Outcome::ClosedPeriod
        } else {
            self.ingest(&submission).await
        };

        let reply = match outcome {
            Outcome::Accepted { .. } => ACCEPTED_REPLY,
            Outcome::Late | Outcome::ClosedPeriod => self.settings.late_notice.as_str(),
            Outcome::Empty { .. } => EMPTY_REPLY,
            Outcome::Failed => FAILED_REPLY,
        };
        self.bot.send_message(submission.chat_id, reply).await?;

        Ok(outcome)
    }

    async fn ingest(&mut self, submission: &Submission) -> Outcome {
        let path = match self.store(submission).await {
            Ok(path) => path,
            Err(e) => {
                error!(error = %e, "Failed to store submission");
                return Outcome::Failed;
            }
        };

        match extract_path(&path, &self.settings.layout) {
            Ok(batch) if batch.is_empty() => {
                warn!(dropped = batch.dropped, "Submission has no complete rows");
                Outcome::Empty {
                    dropped: batch.dropped,
                }
            }
            Ok(batch) => {
                let rows = batch.rows.len();
                info!(rows, dropped = batch.dropped, "Submission accepted");
                self.accumulator.append(batch);
                Outcome::Accepted { rows }
            }
            Err(e) => {
                error!(error = %e, path = %path.display(), "Failed to extract submission");
                Outcome::Failed
            }
        }
    }

    /// Downloads the file and writes it into the upload directory under its
    /// original name, replacing any earlier file of the same name.
    async fn store(&self, submission: &Submission) -> Result<PathBuf> {
        let bytes = self
            .bot
            .download_file(&submission.file_id)
            .await
            .context("downloading submission")?;

        std::fs::create_dir_all(&self.settings.upload_dir)?;
        let path = self
            .settings
            .upload_dir
            .join(safe_file_name(&submission.file_name));
        std::fs::write(&path, &bytes)
            .with_context(|| format!("writing {}", path.display()))?;

        info!(path = %path.display(), bytes = bytes.len(), "Submission stored");
        Ok(path)
    }

    /// Takes every batch out of the accumulator, then archives and sends the
    /// report. The accumulator is empty afterwards even when sending fails.
    #[tracing::instrument(skip(self, cutoff), fields(cutoff = %cutoff))]
    pub async fn close_period(&mut self, cutoff: NaiveDateTime) -> PeriodReport {
        let batches = self.accumulator.drain_all();
        let totals = group_totals(&batches);
        let report_text = summarize(&batches);

        let archived = if totals.is_empty() {
            None
        } else {
            match archive::append_summary(&self.settings.archive_dir, cutoff, &totals) {
                Ok(path) => Some(path),
                Err(e) => {
                    error!(error = %e, "Failed to archive summary");
                    None
                }
            }
        };

        info!(
            batches = batches.len(),
            rows = totals.len(),
            report = %report_text,
            "Sending weekly summary"
        );

        let mut delivered = true;
        for page in paginate(&report_text, MESSAGE_LIMIT) {
            if let Err(e) = self.bot.send_message(self.settings.admin_chat_id, &page).await {
                error!(error = %e, "Failed to send summary");
                delivered = false;
                break;
            }
        }

        PeriodReport {
            batches: batches.len(),
            rows: totals.len(),
            archived,
            delivered,
        }
    }
}

/// Keeps only the final path component of a user supplied file name.
fn safe_file_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.xlsx".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("week.xlsx"), "week.xlsx");
        assert_eq!(safe_file_name("../../etc/passwd"), "passwd");
        assert_eq!(safe_file_name("dir/week.xlsx"), "week.xlsx");
        assert_eq!(safe_file_name(".."), "document.xlsx");
        assert_eq!(safe_file_name(""), "document.xlsx");
    }
}
