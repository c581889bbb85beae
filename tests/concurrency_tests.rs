// tests/concurrency_tests.rs
//
// Runs on a database file shared by several pooled connections, so writers
// really contend for the SQLite write lock.

mod common;

use comment_engine::{
    config::CommentSettings, error::CommentError, services::relation_index::RelationIndex,
};
use common::{count_rows, file_pool, post, remove_database, setup_on, text};

const WRITERS: i64 = 20;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_likes_from_different_users_all_count() {
    let (pool, path) = file_pool(5).await;
    let app = setup_on(pool.clone(), CommentSettings::default()).await;
    let c = app
        .state
        .comments
        .create(1, text(post(1), None, "popular"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for user_id in 100..100 + WRITERS {
        let store = app.state.comments.clone();
        handles.push(tokio::spawn(async move {
            store.toggle_like(c.id, user_id).await
        }));
    }

    for handle in handles {
        let outcome = handle.await.unwrap().expect("like failed under contention");
        assert!(outcome.liked);
    }

    let stored = app.state.comments.get(c.id).await.unwrap();
    assert_eq!(stored.like_count, WRITERS);
    assert_eq!(stored.hot_score, WRITERS);
    assert_eq!(
        count_rows(&pool, "SELECT COUNT(*) FROM comment_likes").await,
        WRITERS
    );

    drop(app);
    remove_database(pool, path).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_replies_under_one_parent_all_land() {
    let (pool, path) = file_pool(5).await;
    let app = setup_on(pool.clone(), CommentSettings::default()).await;
    let root = app
        .state
        .comments
        .create(1, text(post(1), None, "root"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for author_id in 0..WRITERS {
        let store = app.state.comments.clone();
        handles.push(tokio::spawn(async move {
            store
                .create(author_id, text(post(1), Some(root.id), "reply"))
                .await
        }));
    }

    let mut reply_ids = Vec::new();
    for handle in handles {
        let reply = handle.await.unwrap().expect("reply failed under contention");
        reply_ids.push(reply.id);
    }

    assert_eq!(
        app.state.comments.get(root.id).await.unwrap().reply_count,
        WRITERS
    );

    // Root self row plus two rows per reply
    assert_eq!(
        count_rows(&pool, "SELECT COUNT(*) FROM comment_relations").await,
        1 + 2 * WRITERS
    );
    for id in reply_ids {
        let chain = RelationIndex::ancestors_of(&pool, id).await.unwrap();
        let pairs: Vec<(i64, i64)> = chain.iter().map(|r| (r.ancestor_id, r.depth)).collect();
        assert_eq!(pairs, vec![(root.id, 1), (id, 0)]);
    }

    drop(app);
    remove_database(pool, path).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_deletes_uncount_the_reply_once() {
    let (pool, path) = file_pool(5).await;
    let app = setup_on(pool.clone(), CommentSettings::default()).await;
    let store = &app.state.comments;

    let root = store.create(1, text(post(1), None, "root")).await.unwrap();
    let reply = store
        .create(2, text(post(1), Some(root.id), "reply"))
        .await
        .unwrap();

    let first = store.clone();
    let second = store.clone();
    let (a, b) = tokio::join!(
        tokio::spawn(async move { first.delete(reply.id, 2).await }),
        tokio::spawn(async move { second.delete(reply.id, 2).await }),
    );
    let results = [a.unwrap(), b.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(CommentError::AlreadyDeleted)))
    );
    assert_eq!(store.get(root.id).await.unwrap().reply_count, 0);

    drop(app);
    remove_database(pool, path).await;
}
