// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat CRUD operations.

use chatlog_core::ChatlogError;
use chatlog_core::types::{ApplicationId, Chat, ChatId};
use rusqlite::{OptionalExtension, Row, TransactionBehavior, params};
use tracing::debug;

use crate::database::{Database, map_tr_err};
use crate::sequence::{self, Scope};

const SELECT_CHAT: &str = "SELECT id, application_id, number, subject, messages_count, \
     created_at, updated_at FROM chats";

fn row_to_chat(row: &Row<'_>) -> rusqlite::Result<Chat> {
    Ok(Chat {
        id: ChatId(row.get(0)?),
        application_id: ApplicationId(row.get(1)?),
        number: row.get(2)?,
        subject: row.get(3)?,
        messages_count: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Allocate the next chat number for the application and insert the chat.
///
/// Allocation, insert, and the `chats_count` bump share one immediate
/// transaction.
pub async fn create_chat(
    db: &Database,
    application_id: ApplicationId,
    subject: &str,
) -> Result<Chat, ChatlogError> {
    let subject = subject.to_string();
    let chat = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let scope = Scope::Application(application_id);
            let number = sequence::allocate_next(&tx, scope)?;
            tx.execute(
                "INSERT INTO chats (application_id, number, subject) VALUES (?1, ?2, ?3)",
                params![application_id.0, number, subject],
            )?;
            let id = tx.last_insert_rowid();
            sequence::bump_count(&tx, scope)?;
            let chat = tx.query_row(&format!("{SELECT_CHAT} WHERE id = ?1"), [id], row_to_chat)?;
            tx.commit()?;
            Ok(chat)
        })
        .await
        .map_err(map_tr_err)?;
    debug!(
        application_id = application_id.0,
        number = chat.number,
        "chat created"
    );
    Ok(chat)
}

/// Replace a chat's subject. The number is never touched.
pub async fn update_chat_subject(
    db: &Database,
    chat_id: ChatId,
    subject: &str,
) -> Result<Chat, ChatlogError> {
    let subject = subject.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE chats \
                 SET subject = ?1, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
                 WHERE id = ?2",
                params![subject, chat_id.0],
            )?;
            conn.query_row(
                &format!("{SELECT_CHAT} WHERE id = ?1"),
                [chat_id.0],
                row_to_chat,
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Resolve `(application, number)` to the chat's internal id.
pub async fn chat_id_by_number(
    db: &Database,
    application_id: ApplicationId,
    number: i64,
) -> Result<Option<ChatId>, ChatlogError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id FROM chats WHERE application_id = ?1 AND number = ?2",
                [application_id.0, number],
                |row| row.get(0).map(ChatId),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// All chats of an application, ordered by number.
pub async fn list_chats(
    db: &Database,
    application_id: ApplicationId,
) -> Result<Vec<Chat>, ChatlogError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_CHAT} WHERE application_id = ?1 ORDER BY number"
            ))?;
            let chats = stmt
                .query_map([application_id.0], row_to_chat)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(chats)
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch one chat by its number within the application.
pub async fn get_chat(
    db: &Database,
    application_id: ApplicationId,
    number: i64,
) -> Result<Option<Chat>, ChatlogError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("{SELECT_CHAT} WHERE application_id = ?1 AND number = ?2"),
                [application_id.0, number],
                row_to_chat,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}
