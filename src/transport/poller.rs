use anyhow::Result;
use chrono::{DateTime, Local};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::BotApi;
use super::types::Update;
use crate::worker::{Event, Submission};

const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Long-polls the bot for updates and forwards every document message to the
/// event queue. Returns once the queue is closed.
#[tracing::instrument(skip(bot, tx))]
pub async fn poll_documents<B: BotApi>(
    bot: B,
    tx: mpsc::Sender<Event>,
    timeout_secs: u64,
) -> Result<()> {
    let mut offset = 0;

    loop {
        if tx.is_closed() {
            info!("Event queue closed, stopping poller");
            return Ok(());
        }

        let updates = match bot.get_updates(offset, timeout_secs).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "getUpdates failed, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let update_id = update.update_id;

            let Some(submission) = to_submission(update) else {
                debug!(update_id, "Ignoring update without a document");
                continue;
            };

            info!(
                update_id,
                chat_id = submission.chat_id,
                file_name = %submission.file_name,
                "Document received"
            );
            if tx.send(Event::Document(submission)).await.is_err() {
                info!("Event queue closed, stopping poller");
                return Ok(());
            }
        }
    }
}

/// Converts a document message into a [`Submission`], using local time for
/// the send timestamp.
pub(crate) fn to_submission(update: Update) -> Option<Submission> {
    let message = update.message?;
    let document = message.document?;

    let sent_at = DateTime::from_timestamp(message.date, 0)?
        .with_timezone(&Local)
        .naive_local();
    let file_name = document
        .file_name
        .unwrap_or_else(|| format!("document-{}.xlsx", message.message_id));

    Some(Submission {
        chat_id: message.chat.id,
        file_id: document.file_id,
        file_name,
        sent_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::types::{Chat, Document, Message};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn update(id: i64, file_name: Option<&str>, with_document: bool) -> Update {
        Update {
            update_id: id,
            message: Some(Message {
                message_id: id * 10,
                date: 1_760_623_200,
                chat: Chat { id: 42 },
                document: with_document.then(|| Document {
                    file_id: format!("file-{id}"),
                    file_name: file_name.map(str::to_string),
                }),
            }),
        }
    }

    struct ScriptedBot {
        rounds: Mutex<VecDeque<Vec<Update>>>,
        offsets: Mutex<Vec<i64>>,
    }

    #[async_trait::async_trait]
    impl BotApi for ScriptedBot {
        async fn get_updates(&self, offset: i64, _timeout_secs: u64) -> Result<Vec<Update>> {
            self.offsets.lock().unwrap().push(offset);
            let next = self.rounds.lock().unwrap().pop_front();
            match next {
                Some(round) => Ok(round),
                None => {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok(Vec::new())
                }
            }
        }

        async fn send_message(&self, _chat_id: i64, _text: &str) -> Result<()> {
            Ok(())
        }

        async fn download_file(&self, _file_id: &str) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_to_submission() {
        let submission = to_submission(update(3, Some("week.xlsx"), true)).unwrap();
        assert_eq!(submission.chat_id, 42);
        assert_eq!(submission.file_id, "file-3");
        assert_eq!(submission.file_name, "week.xlsx");
    }

    #[test]
    fn test_to_submission_without_name() {
        let submission = to_submission(update(3, None, true)).unwrap();
        assert_eq!(submission.file_name, "document-30.xlsx");
    }

    #[test]
    fn test_to_submission_skips_plain_messages() {
        assert!(to_submission(update(3, None, false)).is_none());
        assert!(
            to_submission(Update {
                update_id: 1,
                message: None
            })
            .is_none()
        );
    }

    #[tokio::test]
    async fn test_poller_forwards_documents_and_advances_offset() {
        let bot = std::sync::Arc::new(ScriptedBot {
            rounds: Mutex::new(VecDeque::from([
                vec![update(10, Some("a.xlsx"), true), update(11, None, false)],
                vec![update(12, Some("b.xlsx"), true)],
            ])),
            offsets: Mutex::new(Vec::new()),
        });
        let (tx, mut rx) = mpsc::channel(8);

        let handle = tokio::spawn(poll_documents(bot.clone(), tx, 0));

        let mut names = Vec::new();
        for _ in 0..2 {
            match rx.recv().await {
                Some(Event::Document(s)) => names.push(s.file_name),
                other => panic!("unexpected event: {other:?}"),
            }
        }
        drop(rx);
        handle.await.unwrap().unwrap();

        assert_eq!(names, ["a.xlsx", "b.xlsx"]);
        let offsets = bot.offsets.lock().unwrap();
        assert_eq!(offsets[..2], [0, 12]);
    }
}
