mod support;

use std::collections::BTreeSet;

use chat_core::models::{NewMessage, NewSummary, Session};
use chat_core::repos::StoreError;
use chrono::{Duration, Utc};
use serde_json::json;
use serial_test::serial;
use uuid::Uuid;

#[tokio::test]
#[serial]
async fn sessions_round_trip_and_list_newest_first() {
    let Some(store) = support::test_store().await else {
        return;
    };

    let user_id = Uuid::new_v4();
    let now = Utc::now();
    let older = store
        .insert_session(Session::new(user_id, now - Duration::minutes(5)))
        .await
        .expect("older session should insert");
    let newer = store
        .insert_session(Session::new(user_id, now))
        .await
        .expect("newer session should insert");
    store
        .insert_session(Session::new(Uuid::new_v4(), now))
        .await
        .expect("other user's session should insert");

    let listed = store
        .list_sessions(user_id)
        .await
        .expect("list should succeed");
    assert_eq!(
        listed.iter().map(|session| session.id).collect::<Vec<_>>(),
        vec![newer.id, older.id]
    );

    let fetched = store
        .get_session(older.id)
        .await
        .expect("get should succeed")
        .expect("session should exist");
    assert_eq!(fetched.context_window, "{}");
    assert_eq!(fetched.analysis_parameters, older.analysis_parameters);
    assert!(fetched.is_active);

    assert!(
        store
            .update_session_details(older.id, "Contract Law", "Verbal Contracts")
            .await
            .expect("details update should succeed")
    );
    assert!(
        store
            .set_session_active(older.id, false)
            .await
            .expect("close should succeed")
    );
    assert!(
        !store
            .set_session_active(Uuid::new_v4(), false)
            .await
            .expect("closing unknown session should not error")
    );

    let fetched = store
        .get_session(older.id)
        .await
        .expect("get should succeed")
        .expect("session should exist");
    assert_eq!(fetched.legal_topics, "Contract Law");
    assert_eq!(fetched.title.as_deref(), Some("Verbal Contracts"));
    assert!(!fetched.is_active);
}

#[tokio::test]
#[serial]
async fn concurrent_inserts_receive_dense_sequence_numbers() {
    let Some(store) = support::test_store().await else {
        return;
    };

    let session = store
        .insert_session(Session::new(Uuid::new_v4(), Utc::now()))
        .await
        .expect("session should insert");

    let mut tasks = Vec::new();
    for index in 0..8 {
        let store = store.clone();
        let session_id = session.id;
        tasks.push(tokio::spawn(async move {
            store
                .insert_message(NewMessage {
                    session_id,
                    prompt: format!("question {index}"),
                    response: format!("answer {index}"),
                    metadata: json!({ "sources": [] }),
                    created_at: Utc::now(),
                })
                .await
                .expect("message should insert")
                .sequence_number
        }));
    }

    let mut sequence_numbers = BTreeSet::new();
    for task in tasks {
        sequence_numbers.insert(task.await.expect("insert task should join"));
    }
    assert_eq!(sequence_numbers, (1..=8).collect::<BTreeSet<i32>>());

    let messages = store
        .list_messages(session.id)
        .await
        .expect("list should succeed");
    assert_eq!(
        messages
            .iter()
            .map(|message| message.sequence_number)
            .collect::<Vec<_>>(),
        (1..=8).collect::<Vec<i32>>()
    );
    let last = store
        .last_message(session.id)
        .await
        .expect("last message should load")
        .expect("last message should exist");
    assert_eq!(last.sequence_number, 8);
}

#[tokio::test]
#[serial]
async fn message_insert_for_missing_session_is_not_found() {
    let Some(store) = support::test_store().await else {
        return;
    };

    let err = store
        .insert_message(NewMessage {
            session_id: Uuid::new_v4(),
            prompt: "orphan".to_string(),
            response: "orphan".to_string(),
            metadata: json!({}),
            created_at: Utc::now(),
        })
        .await
        .expect_err("orphan message should be refused");

    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
#[serial]
async fn recent_summaries_are_newest_first_and_limited() {
    let Some(store) = support::test_store().await else {
        return;
    };

    let session = store
        .insert_session(Session::new(Uuid::new_v4(), Utc::now()))
        .await
        .expect("session should insert");

    let base = Utc::now();
    let mut ids = Vec::new();
    for offset in 0..4 {
        let summary = store
            .insert_summary(NewSummary {
                session_id: session.id,
                summary_text: format!("summary {offset}"),
                embedding: Some(vec![0.1, 0.2]),
                created_at: base + Duration::seconds(offset),
            })
            .await
            .expect("summary should insert");
        ids.push(summary.id);
    }

    let recent = store
        .recent_summaries(session.id, 3)
        .await
        .expect("recent summaries should load");
    assert_eq!(
        recent.iter().map(|summary| summary.id).collect::<Vec<_>>(),
        vec![ids[3], ids[2], ids[1]]
    );

    let fetched = store
        .get_summary(ids[0])
        .await
        .expect("summary should load")
        .expect("summary should exist");
    assert_eq!(fetched.summary_text, "summary 0");
    assert_eq!(fetched.embedding, Some(vec![0.1, 0.2]));
}

#[tokio::test]
#[serial]
async fn sessions_with_children_cannot_be_deleted_first() {
    let Some(store) = support::test_store().await else {
        return;
    };

    let session = store
        .insert_session(Session::new(Uuid::new_v4(), Utc::now()))
        .await
        .expect("session should insert");
    store
        .insert_message(NewMessage {
            session_id: session.id,
            prompt: "question".to_string(),
            response: "answer".to_string(),
            metadata: json!({}),
            created_at: Utc::now(),
        })
        .await
        .expect("message should insert");

    let err = store
        .delete_session(session.id)
        .await
        .expect_err("parent delete should violate the foreign key");
    assert!(matches!(err, StoreError::Database(_)));

    let ids = [session.id];
    assert_eq!(
        store
            .delete_messages_for_sessions(&ids)
            .await
            .expect("messages should delete"),
        1
    );
    assert!(
        store
            .delete_session(session.id)
            .await
            .expect("session should delete")
    );
}

#[tokio::test]
#[serial]
async fn message_metadata_can_be_back_filled() {
    let Some(store) = support::test_store().await else {
        return;
    };
    store.ping().await.expect("database should answer");

    let session = store
        .insert_session(Session::new(Uuid::new_v4(), Utc::now()))
        .await
        .expect("session should insert");
    let message = store
        .insert_message(NewMessage {
            session_id: session.id,
            prompt: "question".to_string(),
            response: "answer".to_string(),
            metadata: json!({ "sources": [] }),
            created_at: Utc::now(),
        })
        .await
        .expect("message should insert");

    let metadata = json!({ "sources": [{
        "url": "https://www.bailii.org/uk/cases/UKSC/2021/5.html",
        "title": "Uber BV v Aslam",
        "source_type": "Supreme Court Case",
        "citation": "[2021] UKSC 5",
        "website": "bailii.org"
    }] });
    assert!(
        store
            .update_message_metadata(message.id, metadata)
            .await
            .expect("metadata should update")
    );

    let stored = store
        .last_message(session.id)
        .await
        .expect("last message should load")
        .expect("message should exist");
    let citations = stored.citations();
    assert_eq!(citations.len(), 1);
    assert_eq!(citations[0].citation, "[2021] UKSC 5");
}
