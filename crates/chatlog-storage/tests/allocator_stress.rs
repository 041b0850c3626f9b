// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Concurrent sequence allocation through independent connections.

use std::sync::Arc;

use chatlog_storage::Database;
use chatlog_storage::queries::{applications, chats, messages};
use futures::future::join_all;

const PER_HANDLE: usize = 25;

async fn open_pair(path: &str) -> (Arc<Database>, Arc<Database>) {
    let a = Database::open(path).await.unwrap();
    let b = Database::open(path).await.unwrap();
    (Arc::new(a), Arc::new(b))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_chat_creates_never_duplicate_or_skip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stress.db");
    let (a, b) = open_pair(path.to_str().unwrap()).await;

    let app_id = applications::create_application(&a, "app", "tok")
        .await
        .unwrap()
        .id;

    let mut handles = Vec::new();
    for db in [a.clone(), b.clone()] {
        for i in 0..PER_HANDLE {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                chats::create_chat(&db, app_id, &format!("chat {i}"))
                    .await
                    .map(|c| c.number)
            }));
        }
    }

    let mut numbers: Vec<i64> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();
    numbers.sort_unstable();

    let expected: Vec<i64> = (1..=(2 * PER_HANDLE) as i64).collect();
    assert_eq!(numbers, expected);

    let stored = applications::get_application(&b, "tok").await.unwrap().unwrap();
    assert_eq!(stored.chats_count, (2 * PER_HANDLE) as i64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_message_creates_never_duplicate_or_skip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stress-messages.db");
    let (a, b) = open_pair(path.to_str().unwrap()).await;

    let app = applications::create_application(&a, "app", "tok").await.unwrap();
    let chat_id = chats::create_chat(&a, app.id, "busy").await.unwrap().id;

    let mut handles = Vec::new();
    for db in [a.clone(), b.clone()] {
        for _ in 0..PER_HANDLE {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                messages::create_message(&db, chat_id, "hi")
                    .await
                    .map(|m| m.number)
            }));
        }
    }

    let mut numbers: Vec<i64> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();
    numbers.sort_unstable();

    let expected: Vec<i64> = (1..=(2 * PER_HANDLE) as i64).collect();
    assert_eq!(numbers, expected);

    let listed: Vec<i64> = messages::list_messages(&a, chat_id)
        .await
        .unwrap()
        .iter()
        .map(|m| m.number)
        .collect();
    assert_eq!(listed, expected);
}
