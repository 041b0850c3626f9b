// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Application CRUD operations.

use chatlog_core::ChatlogError;
use chatlog_core::types::{Application, ApplicationId};
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err};

const SELECT_APPLICATION: &str =
    "SELECT id, name, token, chats_count, created_at, updated_at FROM applications";

fn row_to_application(row: &Row<'_>) -> rusqlite::Result<Application> {
    Ok(Application {
        id: ApplicationId(row.get(0)?),
        name: row.get(1)?,
        token: row.get(2)?,
        chats_count: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Insert a new application.
pub async fn create_application(
    db: &Database,
    name: &str,
    token: &str,
) -> Result<Application, ChatlogError> {
    let name = name.to_string();
    let token = token.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO applications (name, token) VALUES (?1, ?2)",
                params![name, token],
            )?;
            let id = conn.last_insert_rowid();
            conn.query_row(
                &format!("{SELECT_APPLICATION} WHERE id = ?1"),
                [id],
                row_to_application,
            )
        })
        .await
        .map_err(map_tr_err)
}

/// All applications in creation order.
pub async fn list_applications(db: &Database) -> Result<Vec<Application>, ChatlogError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_APPLICATION} ORDER BY id"))?;
            let apps = stmt
                .query_map([], row_to_application)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(apps)
        })
        .await
        .map_err(map_tr_err)
}

/// Look up an application by its token.
pub async fn get_application(
    db: &Database,
    token: &str,
) -> Result<Option<Application>, ChatlogError> {
    let token = token.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("{SELECT_APPLICATION} WHERE token = ?1"),
                [token],
                row_to_application,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Rename an application. Returns `None` when the token is unknown.
pub async fn update_application_name(
    db: &Database,
    token: &str,
    name: &str,
) -> Result<Option<Application>, ChatlogError> {
    let token = token.to_string();
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE applications \
                 SET name = ?1, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
                 WHERE token = ?2",
                params![name, token],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            conn.query_row(
                &format!("{SELECT_APPLICATION} WHERE token = ?1"),
                [token],
                row_to_application,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Resolve a token to the application's internal id.
pub async fn application_id_by_token(
    db: &Database,
    token: &str,
) -> Result<Option<ApplicationId>, ChatlogError> {
    let token = token.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id FROM applications WHERE token = ?1",
                [token],
                |row| row.get(0).map(ApplicationId),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn create_and_get_application() {
        let (db, _dir) = setup_db().await;
        let created = create_application(&db, "support", "tok-1").await.unwrap();
        assert_eq!(created.name, "support");
        assert_eq!(created.chats_count, 0);

        let fetched = get_application(&db, "tok-1").await.unwrap().unwrap();
        assert_eq!(fetched, created);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_token_resolves_to_none() {
        let (db, _dir) = setup_db().await;
        assert!(get_application(&db, "missing").await.unwrap().is_none());
        assert!(
            application_id_by_token(&db, "missing")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn duplicate_token_is_rejected() {
        let (db, _dir) = setup_db().await;
        create_application(&db, "a", "same").await.unwrap();
        let err = create_application(&db, "b", "same").await.unwrap_err();
        assert!(matches!(err, ChatlogError::Storage { .. }));
    }

    #[tokio::test]
    async fn rename_keeps_token() {
        let (db, _dir) = setup_db().await;
        let created = create_application(&db, "old", "tok").await.unwrap();

        let renamed = update_application_name(&db, "tok", "new")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renamed.id, created.id);
        assert_eq!(renamed.name, "new");
        assert_eq!(renamed.token, "tok");

        assert!(
            update_application_name(&db, "nope", "x")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn list_returns_creation_order() {
        let (db, _dir) = setup_db().await;
        create_application(&db, "first", "t1").await.unwrap();
        create_application(&db, "second", "t2").await.unwrap();

        let names: Vec<String> = list_applications(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }
}
