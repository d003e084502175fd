//! Integration tests for storing cleaned channel messages.
//!
//! Tests cover:
//! - Replacing a message table wholesale
//! - Rejecting table names that cannot be spliced into SQL

mod common;

use chanvision::core::cleaning::{MessageCleaner, MessageRecord};
use common::*;

fn message(id: i64, text: &str) -> MessageRecord {
    MessageRecord {
        channel_title: Some("Lobelia Cosmetics".to_string()),
        channel_username: Some("@lobelia4cosmetics".to_string()),
        message_id: id,
        text: Some(text.to_string()),
        date: Some("2024-10-10T08:15:00Z".to_string()),
        media_path: Some(format!("photos/{id}.jpg")),
    }
}

#[tokio::test]
async fn test_replace_messages_overwrites_table() -> anyhow::Result<()> {
    let (db, _temp_dir) = create_test_db().await;

    let first = vec![message(1, "vitamin c"), message(2, "sunscreen")];
    assert_eq!(db.replace_messages("cleaned_messages", &first).await?, 2);
    assert_eq!(db.get_messages("cleaned_messages").await?, first);

    let second = vec![message(3, "paracetamol")];
    assert_eq!(db.replace_messages("cleaned_messages", &second).await?, 1);
    assert_eq!(db.get_messages("cleaned_messages").await?, second);

    // Detections are untouched by message storage.
    assert_eq!(db.count_detections().await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_cleaned_rows_round_trip_through_table() -> anyhow::Result<()> {
    let (db, _temp_dir) = create_test_db().await;

    let mut cleaner = MessageCleaner::new(vec![
        message(1, "  vitamin   c "),
        message(1, "  vitamin   c "),
        MessageRecord {
            text: None,
            ..message(2, "")
        },
    ]);
    cleaner.remove_duplicates();
    cleaner.remove_missing_values();
    cleaner.remove_whitespaces();

    db.replace_messages("messages", cleaner.rows()).await?;
    let stored = db.get_messages("messages").await?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].text.as_deref(), Some("vitamin c"));

    Ok(())
}

#[tokio::test]
async fn test_invalid_table_names_are_rejected() -> anyhow::Result<()> {
    let (db, _temp_dir) = create_test_db().await;

    for table in ["", "1messages", "messages; DROP TABLE detections", "detections"] {
        let result = db.replace_messages(table, &[message(1, "x")]).await;
        assert!(
            matches!(result, Err(StoreError::InvalidTableName(_))),
            "{table:?} should be rejected"
        );
    }

    Ok(())
}
