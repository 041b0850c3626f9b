// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-scope sequence allocation.
//!
//! Chats are numbered within their application and messages within their chat.
//! Numbers start at 1 and never skip or repeat. Allocation reads the current
//! maximum inside the caller's transaction, so it is only safe when that
//! transaction was opened with [`TransactionBehavior::Immediate`]: the write
//! lock is then held from `BEGIN` until the insert commits, and a second
//! allocator for the same scope waits (up to the busy timeout) instead of
//! reading a stale maximum. The `UNIQUE (scope, number)` constraints catch
//! anything that slips past.
//!
//! [`TransactionBehavior::Immediate`]: rusqlite::TransactionBehavior::Immediate

use chatlog_core::{ApplicationId, ChatId};
use rusqlite::Transaction;

/// The owner a new number is allocated under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Chat numbers within one application.
    Application(ApplicationId),
    /// Message numbers within one chat.
    Chat(ChatId),
}

impl Scope {
    fn max_query(self) -> (&'static str, i64) {
        match self {
            Scope::Application(id) => (
                "SELECT COALESCE(MAX(number), 0) + 1 FROM chats WHERE application_id = ?1",
                id.0,
            ),
            Scope::Chat(id) => (
                "SELECT COALESCE(MAX(number), 0) + 1 FROM messages WHERE chat_id = ?1",
                id.0,
            ),
        }
    }

    fn counter_update(self) -> (&'static str, i64) {
        match self {
            Scope::Application(id) => (
                "UPDATE applications SET chats_count = chats_count + 1 WHERE id = ?1",
                id.0,
            ),
            Scope::Chat(id) => (
                "UPDATE chats SET messages_count = messages_count + 1 WHERE id = ?1",
                id.0,
            ),
        }
    }
}

/// Returns the next number for `scope`.
///
/// Must be followed, in the same transaction, by the insert that claims it.
pub fn allocate_next(tx: &Transaction<'_>, scope: Scope) -> rusqlite::Result<i64> {
    let (sql, key) = scope.max_query();
    tx.query_row(sql, [key], |row| row.get(0))
}

/// Bumps the owner's denormalized child counter.
///
/// Fails with [`rusqlite::Error::QueryReturnedNoRows`] when the owner does not exist.
pub fn bump_count(tx: &Transaction<'_>, scope: Scope) -> rusqlite::Result<()> {
    let (sql, key) = scope.counter_update();
    match tx.execute(sql, [key])? {
        0 => Err(rusqlite::Error::QueryReturnedNoRows),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::{Connection, TransactionBehavior};

    fn setup() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        crate::migrations::run_migrations(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO applications (id, name, token) VALUES (1, 'app', 'tok')",
            [],
        )
        .unwrap();
        conn
    }

    fn insert_chat(conn: &mut Connection, app: i64) -> i64 {
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .unwrap();
        let scope = Scope::Application(ApplicationId(app));
        let number = allocate_next(&tx, scope).unwrap();
        tx.execute(
            "INSERT INTO chats (application_id, number, subject) VALUES (?1, ?2, 's')",
            [app, number],
        )
        .unwrap();
        bump_count(&tx, scope).unwrap();
        tx.commit().unwrap();
        number
    }

    #[test]
    fn first_number_in_empty_scope_is_one() {
        let mut conn = setup();
        let tx = conn.transaction().unwrap();
        assert_eq!(
            allocate_next(&tx, Scope::Application(ApplicationId(1))).unwrap(),
            1
        );
        assert_eq!(allocate_next(&tx, Scope::Chat(ChatId(99))).unwrap(), 1);
    }

    #[test]
    fn numbers_are_contiguous_and_counted() {
        let mut conn = setup();
        let numbers: Vec<i64> = (0..5).map(|_| insert_chat(&mut conn, 1)).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);

        let count: i64 = conn
            .query_row("SELECT chats_count FROM applications WHERE id = 1", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(count, 5);
    }

    #[test]
    fn scopes_are_independent() {
        let mut conn = setup();
        conn.execute(
            "INSERT INTO applications (id, name, token) VALUES (2, 'other', 'tok2')",
            [],
        )
        .unwrap();

        assert_eq!(insert_chat(&mut conn, 1), 1);
        assert_eq!(insert_chat(&mut conn, 1), 2);
        assert_eq!(insert_chat(&mut conn, 2), 1);
    }

    #[test]
    fn rolled_back_allocation_leaves_no_gap() {
        let mut conn = setup();
        assert_eq!(insert_chat(&mut conn, 1), 1);

        {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .unwrap();
            let number = allocate_next(&tx, Scope::Application(ApplicationId(1))).unwrap();
            assert_eq!(number, 2);
            // Dropped without commit.
        }

        assert_eq!(insert_chat(&mut conn, 1), 2);
    }

    #[test]
    fn duplicate_number_is_rejected_by_constraint() {
        let conn = setup();
        conn.execute(
            "INSERT INTO chats (application_id, number, subject) VALUES (1, 1, 'a')",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO chats (application_id, number, subject) VALUES (1, 1, 'b')",
            [],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn bumping_a_missing_owner_fails() {
        let mut conn = setup();
        let tx = conn.transaction().unwrap();
        let err = bump_count(&tx, Scope::Chat(ChatId(404))).unwrap_err();
        assert!(matches!(err, rusqlite::Error::QueryReturnedNoRows));
    }
}
