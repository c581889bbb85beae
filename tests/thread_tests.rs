// tests/thread_tests.rs

mod common;

use std::collections::HashSet;

use comment_engine::{
    config::CommentSettings,
    error::CommentError,
    models::comment::{PageParams, ThreadItem},
    services::TreeAssembler,
    utils::cursor::ReplyCursor,
};
use common::{post, setup, setup_with, text};

fn page(cursor: Option<String>, limit: i64) -> PageParams {
    PageParams {
        cursor,
        limit: Some(limit),
    }
}

async fn collect_thread(threads: &TreeAssembler, limit: i64) -> Vec<Vec<i64>> {
    let mut pages = Vec::new();
    let mut cursor = None;
    loop {
        let result = threads
            .fetch_thread(post(1), &page(cursor.take(), limit))
            .await
            .unwrap();
        pages.push(result.items.iter().map(|i: &ThreadItem| i.comment.id).collect());
        match result.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    pages
}

#[tokio::test]
async fn thread_pages_are_newest_first_and_complete() {
    let app = setup().await;
    let mut ids = Vec::new();
    for i in 0..7 {
        let c = app
            .state
            .comments
            .create(1, text(post(1), None, &format!("c{}", i)))
            .await
            .unwrap();
        ids.push(c.id);
    }

    let pages = collect_thread(&app.state.threads, 3).await;
    let lengths: Vec<usize> = pages.iter().map(Vec::len).collect();
    assert_eq!(lengths, vec![3, 3, 1]);

    let flat: Vec<i64> = pages.into_iter().flatten().collect();
    ids.reverse();
    assert_eq!(flat, ids);
}

#[tokio::test]
async fn new_comments_do_not_shift_later_pages() {
    let app = setup().await;
    let mut existing = HashSet::new();
    for i in 0..6 {
        let c = app
            .state
            .comments
            .create(1, text(post(1), None, &format!("c{}", i)))
            .await
            .unwrap();
        existing.insert(c.id);
    }

    let first = app
        .state
        .threads
        .fetch_thread(post(1), &page(None, 2))
        .await
        .unwrap();
    let mut seen: Vec<i64> = first.items.iter().map(|i| i.comment.id).collect();
    let mut cursor = first.next_cursor;

    // Written after the first page was served
    let late = app
        .state
        .comments
        .create(2, text(post(1), None, "late"))
        .await
        .unwrap();

    while let Some(raw) = cursor {
        let next = app
            .state
            .threads
            .fetch_thread(post(1), &page(Some(raw), 2))
            .await
            .unwrap();
        seen.extend(next.items.iter().map(|i| i.comment.id));
        cursor = next.next_cursor;
    }

    let unique: HashSet<i64> = seen.iter().copied().collect();
    assert_eq!(unique.len(), seen.len(), "duplicate in pages: {:?}", seen);
    assert_eq!(unique, existing);
    assert!(!unique.contains(&late.id));
}

#[tokio::test]
async fn identical_timestamps_break_ties_by_id() {
    let app = setup().await;
    let mut ids = Vec::new();
    for i in 0..5 {
        let c = app
            .state
            .comments
            .create(1, text(post(1), None, &format!("c{}", i)))
            .await
            .unwrap();
        ids.push(c.id);
    }
    sqlx::query("UPDATE comments SET created_at = '2025-01-01T00:00:00.000000Z'")
        .execute(&app.pool)
        .await
        .unwrap();

    let flat: Vec<i64> = collect_thread(&app.state.threads, 2)
        .await
        .into_iter()
        .flatten()
        .collect();

    ids.reverse();
    assert_eq!(flat, ids);
}

#[tokio::test]
async fn thread_lists_only_published_top_level_comments() {
    let app = setup().await;
    let store = &app.state.comments;

    let visible = store.create(1, text(post(1), None, "visible")).await.unwrap();
    let gone = store.create(1, text(post(1), None, "gone")).await.unwrap();
    store.create(1, text(post(1), Some(visible.id), "reply")).await.unwrap();
    store.create(1, text(post(2), None, "other post")).await.unwrap();
    store.delete(gone.id, 1).await.unwrap();

    let thread = app
        .state
        .threads
        .fetch_thread(post(1), &PageParams::default())
        .await
        .unwrap();

    let ids: Vec<i64> = thread.items.iter().map(|i| i.comment.id).collect();
    assert_eq!(ids, vec![visible.id]);
    assert!(thread.next_cursor.is_none());
}

#[tokio::test]
async fn long_reply_lists_continue_with_a_cursor() {
    let app = setup_with(CommentSettings {
        inline_replies: 2,
        ..CommentSettings::default()
    })
    .await;
    let store = &app.state.comments;

    let root = store.create(1, text(post(1), None, "root")).await.unwrap();
    let quiet = store.create(1, text(post(1), None, "quiet")).await.unwrap();
    let mut reply_ids = Vec::new();
    for i in 0..5 {
        let r = store
            .create(2, text(post(1), Some(root.id), &format!("r{}", i)))
            .await
            .unwrap();
        reply_ids.push(r.id);
    }

    let thread = app
        .state
        .threads
        .fetch_thread(post(1), &PageParams::default())
        .await
        .unwrap();

    let quiet_item = thread.items.iter().find(|i| i.comment.id == quiet.id).unwrap();
    assert!(quiet_item.replies.is_empty());
    assert!(quiet_item.replies_cursor.is_none());

    let item = thread.items.iter().find(|i| i.comment.id == root.id).unwrap();
    let inline: Vec<i64> = item.replies.iter().map(|r| r.id).collect();
    assert_eq!(inline, reply_ids[..2].to_vec());

    let rest = app
        .state
        .threads
        .fetch_replies(root.id, &page(item.replies_cursor.clone(), 20))
        .await
        .unwrap();
    let rest_ids: Vec<i64> = rest.items.iter().map(|r| r.id).collect();
    assert_eq!(rest_ids, reply_ids[2..].to_vec());
    assert!(rest.next_cursor.is_none());
}

#[tokio::test]
async fn reply_pages_walk_forward_by_id() {
    let app = setup().await;
    let store = &app.state.comments;

    let root = store.create(1, text(post(1), None, "root")).await.unwrap();
    let mut reply_ids = Vec::new();
    for i in 0..5 {
        let r = store
            .create(2, text(post(1), Some(root.id), &format!("r{}", i)))
            .await
            .unwrap();
        reply_ids.push(r.id);
    }

    let first = app
        .state
        .threads
        .fetch_replies(root.id, &page(None, 2))
        .await
        .unwrap();
    let second = app
        .state
        .threads
        .fetch_replies(root.id, &page(first.next_cursor.clone(), 2))
        .await
        .unwrap();
    let third = app
        .state
        .threads
        .fetch_replies(root.id, &page(second.next_cursor.clone(), 2))
        .await
        .unwrap();

    let walked: Vec<i64> = [first.items, second.items, third.items]
        .into_iter()
        .flatten()
        .map(|c| c.id)
        .collect();
    assert_eq!(walked, reply_ids);
    assert!(third.next_cursor.is_none());
}

#[tokio::test]
async fn malformed_or_foreign_cursors_are_rejected() {
    let app = setup().await;
    let store = &app.state.comments;
    let a = store.create(1, text(post(1), None, "a")).await.unwrap();
    let b = store.create(1, text(post(1), None, "b")).await.unwrap();

    let result = app
        .state
        .threads
        .fetch_thread(post(1), &page(Some("garbage".to_string()), 10))
        .await;
    assert!(matches!(result, Err(CommentError::InvalidCursor)));

    let for_a = ReplyCursor {
        parent_id: a.id,
        after_id: 1,
    }
    .encode();
    let result = app
        .state
        .threads
        .fetch_replies(b.id, &page(Some(for_a.clone()), 10))
        .await;
    assert!(matches!(result, Err(CommentError::InvalidCursor)));

    // A reply cursor is not a thread cursor
    let result = app
        .state
        .threads
        .fetch_thread(post(1), &page(Some(for_a), 10))
        .await;
    assert!(matches!(result, Err(CommentError::InvalidCursor)));
}

#[tokio::test]
async fn inline_replies_and_their_continuation_share_one_order() {
    let app = setup_with(CommentSettings {
        inline_replies: 2,
        ..CommentSettings::default()
    })
    .await;
    let store = &app.state.comments;

    let root = store.create(1, text(post(1), None, "root")).await.unwrap();
    let mut reply_ids = Vec::new();
    for i in 0..4 {
        let r = store
            .create(2, text(post(1), Some(root.id), &format!("r{}", i)))
            .await
            .unwrap();
        reply_ids.push(r.id);
    }

    // A timestamp out of step with its id must not reorder the stream
    sqlx::query("UPDATE comments SET created_at = '2999-01-01T00:00:00.000000Z' WHERE id = ?")
        .bind(reply_ids[0])
        .execute(&app.pool)
        .await
        .unwrap();

    let thread = app
        .state
        .threads
        .fetch_thread(post(1), &PageParams::default())
        .await
        .unwrap();
    let item = &thread.items[0];
    let mut streamed: Vec<i64> = item.replies.iter().map(|r| r.id).collect();

    let rest = app
        .state
        .threads
        .fetch_replies(root.id, &page(item.replies_cursor.clone(), 20))
        .await
        .unwrap();
    streamed.extend(rest.items.iter().map(|r| r.id));

    assert_eq!(streamed, reply_ids);
}
