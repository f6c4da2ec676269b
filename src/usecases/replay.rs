//! Replays a recorded room script through a live session.
//!
//! A script is JSON lines, one step per line. Blank lines and lines
//! starting with `#` are skipped.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    domain::{
        identity::ChatIdentity,
        ids::RoomId,
        message::ChatMessage,
        message_store::{DropReason, UpsertOutcome},
        metadata::PollMetadata,
    },
    transport::{
        frames::decode_message_batch,
        recording::{PublishedFrame, RecordingTransport},
    },
    usecases::{
        load_history::HistorySource,
        room_session::{RoomSession, SessionError, SessionSettings},
        send_message::SendMessageCommand,
    },
};

const REPLAY_STEP_FAILED: &str = "CHAT_REPLAY_STEP_FAILED";
const REPLAY_FINISHED: &str = "CHAT_REPLAY_FINISHED";

/// One scripted event. Frame-carrying steps keep the recorded body as raw
/// JSON and go through the same decoding as live frames, so a bad frame
/// fails its own step only.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScriptStep {
    History(Vec<Value>),
    Message(Value),
    Read(Value),
    Unread(Value),
    Send(SendMessageCommand),
    Vote(PollMetadata),
    MarkAllRead,
}

impl ScriptStep {
    fn action(&self) -> &'static str {
        match self {
            Self::History(_) => "history",
            Self::Message(_) => "message",
            Self::Read(_) => "read",
            Self::Unread(_) => "unread",
            Self::Send(_) => "send",
            Self::Vote(_) => "vote",
            Self::MarkAllRead => "markAllRead",
        }
    }
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("script line {line} is not a valid step: {source}")]
    InvalidStep {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to enter room: {0}")]
    Enter(#[source] SessionError),
}

#[derive(Debug, Error)]
enum StepError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("message dropped: {0}")]
    Dropped(#[source] DropReason),
}

pub fn parse_script(script: &str) -> Result<Vec<ScriptStep>, ReplayError> {
    script
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line, text)| {
            serde_json::from_str(text).map_err(|source| ReplayError::InvalidStep { line, source })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOptions {
    pub room_id: RoomId,
    pub identity: ChatIdentity,
    pub settings: SessionSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub action: &'static str,
    pub outcome: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    pub room_id: RoomId,
    pub messages: Vec<ChatMessage>,
    pub transcript: Vec<String>,
    pub pending_unread: usize,
    pub orphan_updates: usize,
    pub published: Vec<PublishedFrame>,
    pub steps: Vec<StepReport>,
    pub failed_steps: usize,
}

/// Enters the room, applies every step in order and leaves.
///
/// Only a failed room entry aborts the replay; a failing step is logged,
/// reported and skipped.
pub fn run_replay(
    steps: Vec<ScriptStep>,
    history: &dyn HistorySource,
    options: ReplayOptions,
) -> Result<ReplaySummary, ReplayError> {
    let mut session = RoomSession::new(
        options.room_id,
        options.identity,
        RecordingTransport::new(),
        options.settings,
    );
    session.enter(history).map_err(ReplayError::Enter)?;

    let mut reports = Vec::with_capacity(steps.len());
    let mut failed_steps = 0;

    for (index, step) in steps.into_iter().enumerate() {
        let action = step.action();
        let outcome = match apply_step(&mut session, step) {
            Ok(outcome) => outcome,
            Err(error) => {
                failed_steps += 1;
                tracing::warn!(
                    code = REPLAY_STEP_FAILED,
                    step = index + 1,
                    action,
                    error = %error,
                    "replay step failed"
                );
                format!("failed: {error}")
            }
        };
        reports.push(StepReport {
            step: index + 1,
            action,
            outcome,
        });
    }

    let store = session.store();
    let messages = store.messages().to_vec();
    let pending_unread = store.pending_unread_len();
    let orphan_updates = store.orphan_update_len();
    let room_id = session.room_id();
    let transport = session.leave();

    tracing::info!(
        code = REPLAY_FINISHED,
        room_id = %room_id,
        steps = reports.len(),
        failed_steps,
        messages = messages.len(),
        "replay finished"
    );

    Ok(ReplaySummary {
        room_id,
        transcript: messages.iter().map(transcript_line).collect(),
        messages,
        pending_unread,
        orphan_updates,
        published: transport.frames(),
        steps: reports,
        failed_steps,
    })
}

fn apply_step(
    session: &mut RoomSession<RecordingTransport>,
    step: ScriptStep,
) -> Result<String, StepError> {
    let outcome = match step {
        ScriptStep::History(entries) => {
            let (batch, skipped) = decode_message_batch(entries);
            let report = session.reload_history(batch);
            format!(
                "loaded {} (dropped {}, duplicates {})",
                report.loaded,
                report.dropped + skipped,
                report.duplicates
            )
        }
        ScriptStep::Message(frame) => match session.handle_message_frame(&frame.to_string())? {
            UpsertOutcome::Dropped(reason) => return Err(StepError::Dropped(reason)),
            outcome => outcome.label().to_owned(),
        },
        ScriptStep::Read(frame) => {
            if session.handle_read_frame(&frame.to_string())? {
                "decremented".to_owned()
            } else {
                "ignored".to_owned()
            }
        }
        ScriptStep::Unread(frame) => {
            format!("{:?}", session.handle_unread_frame(&frame.to_string())?)
        }
        ScriptStep::Send(command) => {
            session.send(command)?;
            "sent".to_owned()
        }
        ScriptStep::Vote(poll) => {
            if session.update_vote(poll) {
                "vote_updated".to_owned()
            } else {
                "no_matching_poll".to_owned()
            }
        }
        ScriptStep::MarkAllRead => {
            session.mark_all_read();
            "marked".to_owned()
        }
    };

    Ok(outcome)
}

/// One human-readable line per message, e.g. `10:04 Mina: [Poll] Lunch? (3 votes, 2 unread)`.
fn transcript_line(message: &ChatMessage) -> String {
    let time = message
        .sent_at_time()
        .map(|time| time.format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_owned());
    let sender = if message.sender_nickname.is_empty() {
        "?"
    } else {
        message.sender_nickname.as_str()
    };

    let mut notes = Vec::new();
    if let Some(poll) = message.metadata.as_poll() {
        notes.push(format!("{} votes", poll.total_votes()));
    }
    if message.unread_count > 0 {
        notes.push(format!("{} unread", message.unread_count));
    }

    let line = format!("{time} {sender}: {}", message.display_content());
    if notes.is_empty() {
        line
    } else {
        format!("{line} ({})", notes.join(", "))
    }
}
