// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests of the write pipeline over temp SQLite databases.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chatlog_core::{ChatlogError, ResourceKind, TaskId, TaskKind, TaskOutput};
use chatlog_pipeline::coordinator::{INDEX_FAILED, TIMED_OUT};
use chatlog_pipeline::{TaskState, WorkerOutcome};
use chatlog_test_utils::TestHarness;
use futures::future::join_all;

fn chat_number(output: &Option<TaskOutput>) -> i64 {
    match output {
        Some(TaskOutput::Chat { number, .. }) => *number,
        other => panic!("expected chat output, got {other:?}"),
    }
}

fn message_number(output: &Option<TaskOutput>) -> i64 {
    match output {
        Some(TaskOutput::Message { number, .. }) => *number,
        other => panic!("expected message output, got {other:?}"),
    }
}

#[tokio::test]
async fn create_chat_completes_with_first_number() {
    let harness = TestHarness::start().await.unwrap();
    harness.create_application("demo", "tok").await.unwrap();

    let handle = harness.dispatcher.create_chat("tok", "Hello").await.unwrap();
    let snapshot = harness.wait_for_terminal(&handle.task_id).await.unwrap();

    assert_eq!(snapshot.status, TaskState::Completed);
    assert_eq!(
        snapshot.result,
        Some(TaskOutput::Chat {
            number: 1,
            subject: "Hello".into()
        })
    );
    assert!(snapshot.error.is_none());

    let app = harness.storage.get_application("tok").await.unwrap().unwrap();
    assert_eq!(app.chats_count, 1);
}

#[tokio::test]
async fn concurrent_chat_creation_yields_contiguous_numbers() {
    let harness = TestHarness::start().await.unwrap();
    let app = harness.create_application("demo", "tok").await.unwrap();

    let submits = (0..20).map(|i| {
        let dispatcher = Arc::clone(&harness.dispatcher);
        tokio::spawn(async move { dispatcher.create_chat("tok", &format!("chat {i}")).await })
    });
    let handles: Vec<_> = join_all(submits)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let mut numbers = BTreeSet::new();
    for handle in &handles {
        let snapshot = harness.wait_for_terminal(&handle.task_id).await.unwrap();
        assert_eq!(snapshot.status, TaskState::Completed);
        assert!(numbers.insert(chat_number(&snapshot.result)));
    }
    assert_eq!(numbers, (1..=20).collect::<BTreeSet<i64>>());

    let stored: Vec<i64> = harness
        .storage
        .list_chats(app.id)
        .await
        .unwrap()
        .iter()
        .map(|c| c.number)
        .collect();
    assert_eq!(stored, (1..=20).collect::<Vec<i64>>());
}

#[tokio::test]
async fn messages_are_numbered_in_submission_order_per_chat() {
    let harness = TestHarness::start().await.unwrap();
    harness.create_application("demo", "tok").await.unwrap();
    harness.create_chat_and_wait("tok", "first").await.unwrap();
    harness.create_chat_and_wait("tok", "second").await.unwrap();

    let mut first = Vec::new();
    let mut second = Vec::new();
    for i in 1..=5 {
        first.push(
            harness
                .dispatcher
                .create_message("tok", 1, &format!("one-{i}"))
                .await
                .unwrap(),
        );
        second.push(
            harness
                .dispatcher
                .create_message("tok", 2, &format!("two-{i}"))
                .await
                .unwrap(),
        );
    }

    for (i, handle) in first.iter().enumerate() {
        let snapshot = harness.wait_for_terminal(&handle.task_id).await.unwrap();
        let expected = i as i64 + 1;
        assert_eq!(
            snapshot.result,
            Some(TaskOutput::Message {
                number: expected,
                body: format!("one-{expected}")
            })
        );
    }
    for (i, handle) in second.iter().enumerate() {
        let snapshot = harness.wait_for_terminal(&handle.task_id).await.unwrap();
        assert_eq!(message_number(&snapshot.result), i as i64 + 1);
    }
}

#[tokio::test]
async fn updates_apply_and_reindex() {
    let harness = TestHarness::start().await.unwrap();
    let app = harness.create_application("demo", "tok").await.unwrap();
    harness.create_chat_and_wait("tok", "old subject").await.unwrap();

    let handle = harness
        .dispatcher
        .update_chat("tok", 1, "new subject")
        .await
        .unwrap();
    let snapshot = harness.wait_for_terminal(&handle.task_id).await.unwrap();
    assert_eq!(
        snapshot.result,
        Some(TaskOutput::Chat {
            number: 1,
            subject: "new subject".into()
        })
    );

    let created = harness
        .dispatcher
        .create_message("tok", 1, "original words")
        .await
        .unwrap();
    harness.wait_for_terminal(&created.task_id).await.unwrap();
    let updated = harness
        .dispatcher
        .update_message("tok", 1, 1, "replacement text")
        .await
        .unwrap();
    let snapshot = harness.wait_for_terminal(&updated.task_id).await.unwrap();
    assert_eq!(snapshot.status, TaskState::Completed);

    let chat = harness.storage.get_chat(app.id, 1).await.unwrap().unwrap();
    assert_eq!(chat.subject, "new subject");
    assert_eq!(chat.messages_count, 1);

    let hits = harness.search.search(chat.id, "replacement", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].number, 1);
    assert!(
        harness
            .search
            .search(chat.id, "original", 10)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn unresolvable_scope_enqueues_nothing() {
    let harness = TestHarness::start().await.unwrap();
    harness.create_application("demo", "tok").await.unwrap();

    let err = harness.dispatcher.create_chat("nope", "x").await.unwrap_err();
    assert!(matches!(err, ChatlogError::NotFound { entity: "application", .. }));

    let err = harness
        .dispatcher
        .create_message("tok", 99, "x")
        .await
        .unwrap_err();
    assert!(matches!(err, ChatlogError::NotFound { entity: "chat", .. }));

    harness.create_chat_and_wait("tok", "only").await.unwrap();
    let before = harness.status.len();

    let err = harness
        .dispatcher
        .update_message("tok", 1, 5, "x")
        .await
        .unwrap_err();
    assert!(matches!(err, ChatlogError::NotFound { entity: "message", .. }));

    let err = harness.dispatcher.create_chat("tok", "  ").await.unwrap_err();
    assert!(matches!(err, ChatlogError::Validation(_)));

    assert_eq!(harness.status.len(), before);
}

#[tokio::test]
async fn unknown_task_status_is_not_found() {
    let harness = TestHarness::start().await.unwrap();
    let err = harness
        .dispatcher
        .status(&TaskId("no-such-task".into()))
        .unwrap_err();
    assert!(matches!(err, ChatlogError::NotFound { entity: "task", .. }));
}

#[tokio::test]
async fn full_queue_rejects_without_tracking() {
    let harness = TestHarness::builder()
        .with_queue_capacity(1)
        .with_gated_storage()
        .build()
        .await
        .unwrap();
    harness.create_application("demo", "tok").await.unwrap();
    let gate = harness.gate.clone().unwrap();

    // The worker takes the first task off the queue and parks on the gate.
    let first = harness.dispatcher.create_chat("tok", "a").await.unwrap();
    gate.wait_entered(1).await;
    let second = harness.dispatcher.create_chat("tok", "b").await.unwrap();
    assert_eq!(harness.coordinator.queue_depth(ResourceKind::Chats), 1);

    let err = harness.dispatcher.create_chat("tok", "c").await.unwrap_err();
    assert!(matches!(
        err,
        ChatlogError::QueueFull {
            kind: ResourceKind::Chats
        }
    ));
    assert_eq!(harness.status.len(), 2);
    assert_eq!(harness.status.pending_count(), 2);

    gate.open();
    let a = harness.wait_for_terminal(&first.task_id).await.unwrap();
    let b = harness.wait_for_terminal(&second.task_id).await.unwrap();
    assert_eq!(chat_number(&a.result), 1);
    assert_eq!(chat_number(&b.result), 2);
}

#[tokio::test]
async fn shutdown_drains_admitted_tasks_and_refuses_new_ones() {
    let harness = TestHarness::builder()
        .with_gated_storage()
        .build()
        .await
        .unwrap();
    harness.create_application("demo", "tok").await.unwrap();
    let gate = harness.gate.clone().unwrap();

    let mut handles = Vec::new();
    for i in 0..5 {
        handles.push(
            harness
                .dispatcher
                .create_chat("tok", &format!("chat {i}"))
                .await
                .unwrap(),
        );
    }
    gate.wait_entered(1).await;

    let coordinator = Arc::clone(&harness.coordinator);
    let stopping = tokio::spawn(async move { coordinator.shutdown().await });
    while !harness.coordinator.is_shutting_down() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let err = harness.dispatcher.create_chat("tok", "late").await.unwrap_err();
    assert!(matches!(err, ChatlogError::ShuttingDown));

    gate.open();
    stopping.await.unwrap();

    let mut numbers = Vec::new();
    for handle in &handles {
        let snapshot = harness.dispatcher.status(&handle.task_id).unwrap();
        assert_eq!(snapshot.status, TaskState::Completed);
        numbers.push(chat_number(&snapshot.result));
    }
    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);

    let mut kinds = Vec::new();
    for _ in 0..2 {
        let exit = harness.next_exit().await.unwrap();
        assert_eq!(exit.outcome, WorkerOutcome::Clean);
        kinds.push(exit.kind);
    }
    kinds.sort_by_key(|k| k.to_string());
    assert_eq!(kinds, vec![ResourceKind::Chats, ResourceKind::Messages]);
}

#[tokio::test]
async fn index_failure_keeps_stored_message() {
    let harness = TestHarness::builder()
        .with_failing_search()
        .build()
        .await
        .unwrap();
    let app = harness.create_application("demo", "tok").await.unwrap();
    harness.create_chat_and_wait("tok", "chat").await.unwrap();

    let handle = harness
        .dispatcher
        .create_message("tok", 1, "hi")
        .await
        .unwrap();
    let snapshot = harness.wait_for_terminal(&handle.task_id).await.unwrap();
    assert_eq!(snapshot.status, TaskState::Error);
    assert_eq!(snapshot.error.as_deref(), Some(INDEX_FAILED));
    assert_eq!(
        snapshot.result,
        Some(TaskOutput::Message {
            number: 1,
            body: "hi".into()
        })
    );

    // The committed row stays, and the worker keeps going.
    let chat = harness.storage.get_chat(app.id, 1).await.unwrap().unwrap();
    let stored = harness.storage.list_messages(chat.id).await.unwrap();
    assert_eq!(stored.len(), 1);

    let next = harness
        .dispatcher
        .create_message("tok", 1, "again")
        .await
        .unwrap();
    let snapshot = harness.wait_for_terminal(&next.task_id).await.unwrap();
    assert_eq!(message_number(&snapshot.result), 2);
}

#[tokio::test]
async fn slow_task_times_out_and_reports_the_late_commit() {
    let harness = TestHarness::builder()
        .with_gated_storage()
        .with_task_timeout_secs(1)
        .build()
        .await
        .unwrap();
    harness.create_application("demo", "tok").await.unwrap();
    let gate = harness.gate.clone().unwrap();

    let stuck = harness.dispatcher.create_chat("tok", "stuck").await.unwrap();
    gate.wait_entered(1).await;
    tokio::time::sleep(Duration::from_millis(1500)).await;
    // Past the timeout, but the write has not settled yet.
    let snapshot = harness.dispatcher.status(&stuck.task_id).unwrap();
    assert_eq!(snapshot.status, TaskState::Pending);

    gate.open();
    let snapshot = harness.wait_for_terminal(&stuck.task_id).await.unwrap();
    assert_eq!(snapshot.status, TaskState::Error);
    assert_eq!(snapshot.error.as_deref(), Some(TIMED_OUT));
    assert_eq!(
        snapshot.result,
        Some(TaskOutput::Chat {
            number: 1,
            subject: "stuck".into()
        })
    );

    let snapshot = harness.create_chat_and_wait("tok", "fine").await.unwrap();
    assert_eq!(snapshot.status, TaskState::Completed);
    assert_eq!(chat_number(&snapshot.result), 2);
}

#[tokio::test]
async fn write_blocked_on_database_lock_is_not_duplicated_by_resubmit() {
    let harness = TestHarness::builder()
        .with_task_timeout_secs(1)
        .build()
        .await
        .unwrap();
    let app = harness.create_application("demo", "tok").await.unwrap();

    // A second connection holds the write lock past the task timeout but
    // inside the busy timeout, so the insert lands after the timer fires.
    let path = harness.config.storage.database_path.clone();
    let (locked_tx, locked_rx) = tokio::sync::oneshot::channel();
    let holder = tokio::task::spawn_blocking(move || {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch("BEGIN IMMEDIATE").unwrap();
        locked_tx.send(()).unwrap();
        std::thread::sleep(Duration::from_millis(2500));
        conn.execute_batch("COMMIT").unwrap();
    });
    locked_rx.await.unwrap();

    let handle = harness.dispatcher.create_chat("tok", "Hello").await.unwrap();
    let snapshot = harness.wait_for_terminal(&handle.task_id).await.unwrap();
    holder.await.unwrap();

    assert_eq!(snapshot.status, TaskState::Error);
    assert_eq!(snapshot.error.as_deref(), Some(TIMED_OUT));
    let committed = Some(TaskOutput::Chat {
        number: 1,
        subject: "Hello".into(),
    });
    assert_eq!(snapshot.result, committed);

    // The result tells the client the chat exists, so it reads instead of
    // resubmitting.
    let stored = harness.storage.list_chats(app.id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].number, 1);
    assert_eq!(stored[0].subject, "Hello");
}

#[tokio::test]
async fn rejected_submission_does_not_evict_finished_tasks() {
    let harness = TestHarness::builder()
        .with_queue_capacity(1)
        .with_max_tracked_tasks(3)
        .with_gated_storage()
        .build()
        .await
        .unwrap();
    harness.create_application("demo", "tok").await.unwrap();
    let gate = harness.gate.clone().unwrap();

    let finished = TaskId("finished-earlier".into());
    harness.status.create(finished.clone(), TaskKind::CreateChat);
    harness.status.set_error(&finished, "failed to create chat").unwrap();

    let first = harness.dispatcher.create_chat("tok", "a").await.unwrap();
    gate.wait_entered(1).await;
    let second = harness.dispatcher.create_chat("tok", "b").await.unwrap();
    assert_eq!(harness.status.len(), 3);

    let err = harness.dispatcher.create_chat("tok", "c").await.unwrap_err();
    assert!(matches!(err, ChatlogError::QueueFull { .. }));
    assert!(harness.status.get(&finished).is_some());
    assert_eq!(harness.status.len(), 3);

    gate.open();
    harness.wait_for_terminal(&first.task_id).await.unwrap();
    harness.wait_for_terminal(&second.task_id).await.unwrap();
}
