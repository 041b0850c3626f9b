// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message CRUD operations.

use chatlog_core::ChatlogError;
use chatlog_core::types::{ChatId, Message, MessageId};
use rusqlite::{OptionalExtension, Row, TransactionBehavior, params};
use tracing::debug;

use crate::database::{Database, map_tr_err};
use crate::sequence::{self, Scope};

const SELECT_MESSAGE: &str =
    "SELECT id, chat_id, number, body, created_at, updated_at FROM messages";

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: MessageId(row.get(0)?),
        chat_id: ChatId(row.get(1)?),
        number: row.get(2)?,
        body: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Allocate the next message number for the chat and insert the message.
pub async fn create_message(
    db: &Database,
    chat_id: ChatId,
    body: &str,
) -> Result<Message, ChatlogError> {
    let body = body.to_string();
    let message = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let scope = Scope::Chat(chat_id);
            let number = sequence::allocate_next(&tx, scope)?;
            tx.execute(
                "INSERT INTO messages (chat_id, number, body) VALUES (?1, ?2, ?3)",
                params![chat_id.0, number, body],
            )?;
            let id = tx.last_insert_rowid();
            sequence::bump_count(&tx, scope)?;
            let message = tx.query_row(
                &format!("{SELECT_MESSAGE} WHERE id = ?1"),
                [id],
                row_to_message,
            )?;
            tx.commit()?;
            Ok(message)
        })
        .await
        .map_err(map_tr_err)?;
    debug!(chat_id = chat_id.0, number = message.number, "message created");
    Ok(message)
}

/// Replace a message's body. The number is never touched.
pub async fn update_message_body(
    db: &Database,
    message_id: MessageId,
    body: &str,
) -> Result<Message, ChatlogError> {
    let body = body.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages \
                 SET body = ?1, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
                 WHERE id = ?2",
                params![body, message_id.0],
            )?;
            conn.query_row(
                &format!("{SELECT_MESSAGE} WHERE id = ?1"),
                [message_id.0],
                row_to_message,
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Resolve `(chat, number)` to the message's internal id.
pub async fn message_id_by_number(
    db: &Database,
    chat_id: ChatId,
    number: i64,
) -> Result<Option<MessageId>, ChatlogError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id FROM messages WHERE chat_id = ?1 AND number = ?2",
                [chat_id.0, number],
                |row| row.get(0).map(MessageId),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// All messages of a chat, ordered by number.
pub async fn list_messages(db: &Database, chat_id: ChatId) -> Result<Vec<Message>, ChatlogError> {
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("{SELECT_MESSAGE} WHERE chat_id = ?1 ORDER BY number"))?;
            let messages = stmt
                .query_map([chat_id.0], row_to_message)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch one message by its number within the chat.
pub async fn get_message(
    db: &Database,
    chat_id: ChatId,
    number: i64,
) -> Result<Option<Message>, ChatlogError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("{SELECT_MESSAGE} WHERE chat_id = ?1 AND number = ?2"),
                [chat_id.0, number],
                row_to_message,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}
