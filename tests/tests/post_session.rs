use std::{sync::Arc, time::Duration};

use natter_client::{
    api::{self, NewPost, NewUser, PostId, UserId, Uuid},
    fetch_post, PostView, SessionConfig, Store, ViewState,
};
use natter_mock_server::{MockServer, MockStore};
use tokio::sync::Mutex;

fn pid(id: u128) -> PostId {
    PostId(Uuid::from_u128(id))
}

/// A mock server with users alice and bob, and two posts
fn server() -> Arc<Mutex<MockServer>> {
    let mut s = MockServer::new();
    for (id, name) in [(1, "alice"), (2, "bob")] {
        s.admin_create_user(NewUser::new(UserId(Uuid::from_u128(id)), String::from(name)))
            .expect("creating user");
    }
    for (id, title) in [(1, "first"), (2, "second")] {
        s.admin_create_post(NewPost {
            id: pid(id),
            title: String::from(title),
            body: format!("body of the {title} post"),
        })
        .expect("creating post");
    }
    Arc::new(Mutex::new(s))
}

fn messages(view: &PostView) -> Vec<String> {
    view.tree()
        .expect("post is not loaded")
        .comments()
        .iter()
        .map(|c| c.message.clone())
        .collect()
}

#[tokio::test]
async fn local_state_follows_store_answers() {
    let server = server();
    let alice = MockStore::login(server.clone(), "alice").await.unwrap();
    let bob = MockStore::login(server.clone(), "bob").await.unwrap();
    let config = SessionConfig::default();

    let mut view = PostView::new();
    view.open(&alice, pid(1), &config).await;
    assert!(view.tree().unwrap().root_comments().is_empty());

    let root = view
        .create_comment(&alice, None, String::from("root"))
        .await
        .unwrap();
    let reply = view
        .create_comment(&alice, Some(root.id), String::from("reply"))
        .await
        .unwrap();
    assert_eq!(messages(&view), vec!["reply", "root"]);
    let tree = view.tree().unwrap();
    assert_eq!(tree.root_comments()[0].id, root.id);
    assert_eq!(tree.replies(Some(root.id))[0].id, reply.id);
    assert_eq!(tree.replies(Some(root.id))[0].user.name, "alice");

    // Bob sees the same thread, and likes the root
    let mut bob_view = PostView::new();
    bob_view.open(&bob, pid(1), &config).await;
    assert_eq!(messages(&bob_view), vec!["reply", "root"]);
    assert!(bob_view.toggle_like(&bob, root.id).await.unwrap());
    let liked = bob_view.tree().unwrap().get(root.id).unwrap().clone();
    assert_eq!((liked.like_count, liked.liked_by_me), (1, true));

    // The local copy matches a fresh fetch
    let fresh = bob.get_post(pid(1)).await.unwrap();
    let local = bob_view.tree().unwrap().comments();
    assert_eq!(
        fresh.comments,
        local.iter().map(|c| (**c).clone()).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn foreign_comments_cannot_be_mutated() {
    let server = server();
    let alice = MockStore::login(server.clone(), "alice").await.unwrap();
    let bob = MockStore::login(server.clone(), "bob").await.unwrap();
    let config = SessionConfig::default();

    let mut alice_view = PostView::new();
    alice_view.open(&alice, pid(1), &config).await;
    let mine = alice_view
        .create_comment(&alice, None, String::from("mine"))
        .await
        .unwrap();

    let mut bob_view = PostView::new();
    bob_view.open(&bob, pid(1), &config).await;
    let before = bob_view.tree().unwrap().comments().clone();

    let err = bob_view
        .update_comment(&bob, mine.id, String::from("not yours"))
        .await
        .unwrap_err();
    assert_eq!(err.api(), Some(&api::Error::PermissionDenied));
    let err = bob_view.delete_comment(&bob, mine.id).await.unwrap_err();
    assert_eq!(err.api(), Some(&api::Error::PermissionDenied));
    let err = bob_view
        .create_comment(&bob, Some(mine.id), String::new())
        .await
        .unwrap_err();
    assert_eq!(err.api(), Some(&api::Error::MessageRequired));

    assert!(Arc::ptr_eq(&before, bob_view.tree().unwrap().comments()));
    assert_eq!(messages(&bob_view), vec!["mine"]);
}

#[tokio::test]
async fn deletion_keeps_local_orphans() {
    let server = server();
    let alice = MockStore::login(server.clone(), "alice").await.unwrap();
    let bob = MockStore::login(server.clone(), "bob").await.unwrap();
    let config = SessionConfig::default();

    let mut view = PostView::new();
    view.open(&alice, pid(2), &config).await;
    let root = view
        .create_comment(&alice, None, String::from("root"))
        .await
        .unwrap();
    view.create_comment(&alice, Some(root.id), String::from("reply"))
        .await
        .unwrap();
    view.delete_comment(&alice, root.id).await.unwrap();

    // Locally the reply stays, hanging off a parent that is gone
    let tree = view.tree().unwrap();
    assert!(tree.root_comments().is_empty());
    assert_eq!(tree.replies(Some(root.id)).len(), 1);

    // The store dropped it along with its parent
    let mut bob_view = PostView::new();
    bob_view.open(&bob, pid(2), &config).await;
    assert!(messages(&bob_view).is_empty());
}

#[tokio::test]
async fn slow_fetch_of_previous_post_is_discarded() {
    let server = server();
    let alice = MockStore::login(server.clone(), "alice").await.unwrap();
    let slow = alice.clone().with_fetch_latency(Duration::from_millis(50));
    let config = SessionConfig::default();

    let mut view = PostView::new();
    let first = view.navigate(pid(1)).unwrap();
    let second = view.navigate(pid(2)).unwrap();
    let (slow_res, fast_res) = tokio::join!(
        fetch_post(&slow, first, &config),
        fetch_post(&alice, second, &config),
    );
    assert!(view.settle(second, fast_res));
    assert!(!view.settle(first, slow_res));
    let post = view.post().unwrap();
    assert_eq!((post.id, post.title.as_str()), (pid(2), "second"));
}

#[tokio::test]
async fn fetch_failures_are_reported() {
    let server = server();
    let alice = MockStore::login(server.clone(), "alice").await.unwrap();

    let mut view = PostView::new();
    let state = view.open(&alice, pid(42), &SessionConfig::default()).await;
    assert!(matches!(state, ViewState::Failed(msg) if msg == "Not found: post"));

    let slow = alice.with_fetch_latency(Duration::from_secs(5));
    let config = SessionConfig {
        fetch_timeout: Some(Duration::from_millis(20)),
    };
    let state = view.open(&slow, pid(1), &config).await;
    assert!(matches!(state, ViewState::Failed(msg) if msg.contains("timed out")));
}

#[tokio::test]
async fn closed_sessions_are_rejected() {
    let server = server();
    let alice = MockStore::login(server.clone(), "alice").await.unwrap();
    server.lock().await.unauth(alice.token()).unwrap();

    let mut view = PostView::new();
    let state = view.open(&alice, pid(1), &SessionConfig::default()).await;
    assert!(matches!(state, ViewState::Failed(msg) if msg == "Permission denied"));
    assert!(MockStore::login(server, "eve").await.is_err());
}
