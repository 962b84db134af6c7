use crate::helper::sanitization_helpers::{normalize_display_name, strip_markup};
use crate::models::remote_models::NewMessage;
use crate::models::remote_operations::{MessageRemote, RemoteError};
use crate::models::{Countdown, Message};
use crate::store::MessageStore;
use chrono::{Local, NaiveDateTime};
use thiserror::Error;

pub const MESSAGE_MAX_CHARS: usize = 500;

#[derive(Error, Debug)]
pub enum MessageSubmitError {
    #[error("Author is empty")]
    EmptyAuthor,
    #[error("Content is empty")]
    EmptyContent,
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),
}

impl MessageSubmitError {
    pub fn notice(&self) -> &'static str {
        match self {
            MessageSubmitError::EmptyAuthor => "Escribe tu nombre.",
            MessageSubmitError::EmptyContent => "Escribe un mensaje para los novios.",
            MessageSubmitError::Remote(_) => "No se pudo enviar tu mensaje. Inténtalo de nuevo.",
        }
    }
}

/// Time left until `target`, both as local wall-clock times.
pub fn countdown_between(target: NaiveDateTime, now: NaiveDateTime) -> Countdown {
    let remaining = (target - now).num_seconds();
    if remaining <= 0 {
        return Countdown { days: 0, hours: 0, minutes: 0, seconds: 0, finished: true };
    }
    Countdown {
        days: remaining / 86_400,
        hours: (remaining % 86_400) / 3_600,
        minutes: (remaining % 3_600) / 60,
        seconds: remaining % 60,
        finished: false,
    }
}

pub fn countdown_to(target: NaiveDateTime) -> Countdown {
    countdown_between(target, Local::now().naive_local())
}

/// Applies the entry cap: anything past the limit is cut off, never rejected.
pub fn compose_message_content(input: &str) -> String {
    input.chars().take(MESSAGE_MAX_CHARS).collect()
}

/// Validates and sends a guestbook entry, then hands the created record to the store.
pub async fn submit_message(
    remote: &dyn MessageRemote,
    store: &MessageStore,
    author: &str,
    content: &str,
) -> Result<Message, MessageSubmitError> {
    let author = normalize_display_name(author);
    let content = strip_markup(&compose_message_content(content)).trim().to_string();

    if author.is_empty() {
        return Err(MessageSubmitError::EmptyAuthor);
    }
    if content.is_empty() {
        return Err(MessageSubmitError::EmptyContent);
    }

    let created = remote.create(&NewMessage { author, content }).await?;
    log::info!("Guestbook message {} created by '{}'.", created.id, created.author);
    store.add(created.clone());
    Ok(created)
}
