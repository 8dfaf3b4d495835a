use super::*;
use shared::domain::MessageSource;

fn msg(key: &str, text: &str, ts: &str, source: MessageSource) -> Message {
    Message::new(key, text, ts, source)
}

fn timestamps(store: &MessageStore, key: &str) -> Vec<String> {
    store
        .query_by_conversation(&ConversationKey::new(key))
        .iter()
        .map(|m| m.timestamp.to_string())
        .collect()
}

#[test]
fn duplicate_push_is_not_inserted() {
    let mut store = MessageStore::new();
    let message = msg("911111111111", "hello", "2024-05-01T10:00:00Z", MessageSource::User);

    assert!(store.ingest_push(message.clone()));
    let revision = store.revision();
    assert!(!store.ingest_push(message));
    assert_eq!(store.len(), 1);
    assert_eq!(store.revision(), revision);
}

#[test]
fn same_text_from_different_source_is_distinct() {
    let mut store = MessageStore::new();
    assert!(store.ingest_push(msg("911111111111", "ok", "2024-05-01T10:00:00Z", MessageSource::User)));
    assert!(store.ingest_push(msg("911111111111", "ok", "2024-05-01T10:00:00Z", MessageSource::Ai)));
    assert_eq!(store.len(), 2);
}

#[test]
fn conversation_query_is_sorted_regardless_of_arrival() {
    let mut store = MessageStore::new();
    store.ingest_bulk(
        vec![
            msg("911111111111", "c", "2024-05-01T10:03:00Z", MessageSource::User),
            msg("911111111111", "a", "2024-05-01T10:01:00Z", MessageSource::User),
        ],
        true,
    );
    store.ingest_push(msg("911111111111", "d", "2024-05-01T10:04:00Z", MessageSource::Ai));
    store.ingest_backfill(&[msg("911111111111", "0", "2024-05-01T09:00:00Z", MessageSource::User)]);
    store.ingest_bulk(
        vec![msg("911111111111", "b", "2024-05-01T10:02:00Z", MessageSource::Agent)],
        false,
    );

    assert_eq!(
        timestamps(&store, "911111111111"),
        vec![
            "2024-05-01T09:00:00Z",
            "2024-05-01T10:01:00Z",
            "2024-05-01T10:02:00Z",
            "2024-05-01T10:03:00Z",
            "2024-05-01T10:04:00Z",
        ]
    );
}

#[test]
fn first_chunk_replaces_and_later_chunks_append_deduplicated() {
    let mut store = MessageStore::new();
    store.ingest_push(msg("919999999999", "stale", "2024-04-01T00:00:00Z", MessageSource::User));

    let a = msg("911111111111", "a", "2024-05-01T10:00:00Z", MessageSource::User);
    let b = msg("911111111111", "b", "2024-05-01T10:01:00Z", MessageSource::Ai);
    let c = msg("912222222222", "c", "2024-05-01T10:02:00Z", MessageSource::User);

    assert_eq!(store.ingest_bulk(vec![a.clone(), b.clone()], true), 2);
    assert_eq!(store.ingest_bulk(vec![b.clone(), c.clone()], false), 1);

    assert_eq!(store.len(), 3);
    assert!(store.query_by_conversation(&ConversationKey::new("919999999999")).is_empty());
    for message in [&a, &b, &c] {
        assert!(store.contains(message));
    }
}

#[test]
fn pushes_are_prepended_to_the_feed() {
    let mut store = MessageStore::new();
    store.ingest_bulk(
        vec![msg("911111111111", "bulk", "2024-05-01T10:00:00Z", MessageSource::User)],
        true,
    );
    store.ingest_push(msg("912222222222", "live", "2024-05-01T11:00:00Z", MessageSource::User));

    let texts: Vec<&str> = store.feed().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["live", "bulk"]);
}

#[test]
fn equal_timestamps_keep_arrival_order() {
    let mut store = MessageStore::new();
    store.ingest_push(msg("911111111111", "first", "2024-05-01T10:00:00Z", MessageSource::User));
    store.ingest_push(msg("911111111111", "second", "2024-05-01T10:00:00Z", MessageSource::Ai));

    let texts: Vec<&str> = store
        .query_by_conversation(&ConversationKey::new("911111111111"))
        .iter()
        .map(|m| m.text.as_str())
        .collect();
    assert_eq!(texts, vec!["first", "second"]);
}

#[test]
fn reset_clears_everything_and_bumps_revision() {
    let mut store = MessageStore::new();
    store.ingest_push(msg("911111111111", "x", "2024-05-01T10:00:00Z", MessageSource::User));
    let revision = store.revision();
    store.reset();
    assert!(store.is_empty());
    assert!(store.revision() > revision);
}
