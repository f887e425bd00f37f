use std::{sync::Arc, time::Duration};

use crate::{
    api::{Comment, CommentId, NewComment, Post, PostId, UpdateComment},
    CommentTree, Error, Store,
};

#[derive(Clone, Debug, Default)]
pub struct SessionConfig {
    /// If set, a post fetch taking longer than this fails
    pub fetch_timeout: Option<Duration>,
}

/// Identifies one fetch, so that its result can be dropped if the view moved
/// on to another post in the meantime
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FetchTicket {
    post_id: PostId,
    generation: u64,
}

impl FetchTicket {
    pub fn post_id(&self) -> PostId {
        self.post_id
    }
}

/// Everything a loaded post view exposes to the code rendering it
#[derive(Clone, Debug)]
pub struct PostContext {
    pub id: PostId,
    pub title: String,
    pub body: String,
    pub tree: CommentTree,
}

#[derive(Clone, Debug)]
pub enum ViewState {
    Idle,
    Loading,
    Failed(String),
    Loaded(PostContext),
}

/// One post-viewing slot
///
/// Navigating to a post hands out a `FetchTicket`, and the result of the
/// fetch is only applied if that ticket is still the current one when it
/// settles.
#[derive(Debug)]
pub struct PostView {
    current: Option<FetchTicket>,
    generation: u64,
    state: ViewState,
}

pub async fn fetch_post<S>(
    store: &S,
    ticket: FetchTicket,
    config: &SessionConfig,
) -> Result<Post, Error>
where
    S: Store + ?Sized,
{
    let fetch = store.get_post(ticket.post_id);
    match config.fetch_timeout {
        None => fetch.await,
        Some(limit) => match tokio::time::timeout(limit, fetch).await {
            Ok(res) => res,
            Err(_) => Err(Error::Timeout(limit)),
        },
    }
}

impl PostView {
    pub fn new() -> PostView {
        PostView {
            current: None,
            generation: 0,
            state: ViewState::Idle,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn current_post(&self) -> Option<PostId> {
        self.current.map(|t| t.post_id)
    }

    pub fn post(&self) -> Option<&PostContext> {
        match &self.state {
            ViewState::Loaded(p) => Some(p),
            _ => None,
        }
    }

    pub fn tree(&self) -> Option<&CommentTree> {
        self.post().map(|p| &p.tree)
    }

    pub fn tree_mut(&mut self) -> Option<&mut CommentTree> {
        match &mut self.state {
            ViewState::Loaded(p) => Some(&mut p.tree),
            _ => None,
        }
    }

    /// Points the view at `post_id`. Returns the ticket of the fetch to run,
    /// or `None` if the view already shows (or is loading) this very post.
    pub fn navigate(&mut self, post_id: PostId) -> Option<FetchTicket> {
        if self.current_post() == Some(post_id) {
            return None;
        }
        self.generation += 1;
        let ticket = FetchTicket {
            post_id,
            generation: self.generation,
        };
        tracing::debug!(?post_id, generation = self.generation, "navigating to post");
        self.current = Some(ticket);
        self.state = ViewState::Loading;
        Some(ticket)
    }

    /// Tears the view down; any fetch still in flight will be ignored
    pub fn close(&mut self) {
        self.generation += 1;
        self.current = None;
        self.state = ViewState::Idle;
    }

    /// Applies the outcome of the fetch for `ticket`. Returns false, leaving
    /// the view untouched, if that fetch is stale.
    pub fn settle(&mut self, ticket: FetchTicket, result: Result<Post, Error>) -> bool {
        if self.current != Some(ticket) {
            tracing::debug!(post_id = ?ticket.post_id, "discarding result of stale fetch");
            return false;
        }
        self.state = match result {
            Ok(post) => ViewState::Loaded(PostContext {
                id: ticket.post_id,
                title: post.title,
                body: post.body,
                tree: CommentTree::new(post.comments),
            }),
            Err(err) => {
                tracing::info!(post_id = ?ticket.post_id, %err, "failed fetching post");
                ViewState::Failed(err.to_string())
            }
        };
        true
    }

    /// Navigates to `post_id` and waits for the fetch, if one is needed
    pub async fn open<S>(
        &mut self,
        store: &S,
        post_id: PostId,
        config: &SessionConfig,
    ) -> &ViewState
    where
        S: Store + ?Sized,
    {
        if let Some(ticket) = self.navigate(post_id) {
            let res = fetch_post(store, ticket, config).await;
            self.settle(ticket, res);
        }
        &self.state
    }

    fn loaded_post_id(&self) -> Result<PostId, Error> {
        self.post().map(|p| p.id).ok_or(Error::NotLoaded)
    }

    fn loaded_tree(&mut self) -> Result<&mut CommentTree, Error> {
        self.tree_mut().ok_or(Error::NotLoaded)
    }

    /// Creates a comment on the store, then adds the store's copy of it
    /// locally
    pub async fn create_comment<S>(
        &mut self,
        store: &S,
        parent_id: Option<CommentId>,
        message: String,
    ) -> Result<Arc<Comment>, Error>
    where
        S: Store + ?Sized,
    {
        let post = self.loaded_post_id()?;
        let new = NewComment { parent_id, message };
        new.validate()?;
        let comment = store.create_comment(post, &new).await?;
        let tree = self.loaded_tree()?;
        tree.create_local_comment(comment);
        Ok(tree.comments()[0].clone())
    }

    pub async fn update_comment<S>(
        &mut self,
        store: &S,
        id: CommentId,
        message: String,
    ) -> Result<(), Error>
    where
        S: Store + ?Sized,
    {
        let post = self.loaded_post_id()?;
        let update = UpdateComment { message };
        update.validate()?;
        let res = store.update_comment(post, id, &update).await?;
        self.loaded_tree()?.update_local_comment(id, res.message);
        Ok(())
    }

    pub async fn delete_comment<S>(&mut self, store: &S, id: CommentId) -> Result<(), Error>
    where
        S: Store + ?Sized,
    {
        let post = self.loaded_post_id()?;
        let res = store.delete_comment(post, id).await?;
        if res.id != id {
            tracing::warn!(requested = ?id, deleted = ?res.id, "store deleted another comment");
        }
        self.loaded_tree()?.delete_local_comment(res.id);
        Ok(())
    }

    pub async fn toggle_like<S>(&mut self, store: &S, id: CommentId) -> Result<bool, Error>
    where
        S: Store + ?Sized,
    {
        let post = self.loaded_post_id()?;
        let res = store.toggle_like(post, id).await?;
        self.loaded_tree()?.toggle_local_comment_like(id, res.added_like);
        Ok(res.added_like)
    }
}

impl Default for PostView {
    fn default() -> PostView {
        PostView::new()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        api::{
            self, CommentMessage, DeletedComment, LikeToggled, PostSummary, User, UserId, Uuid,
        },
        forest::tests::{cid, comment},
    };

    fn pid(id: u128) -> PostId {
        PostId(Uuid::from_u128(id))
    }

    #[derive(Default)]
    struct FakeStore {
        posts: HashMap<PostId, Post>,
        delay: Option<Duration>,
        deny_mutations: bool,
        fetches: AtomicUsize,
        mutations: AtomicUsize,
        next_id: Mutex<u128>,
    }

    impl FakeStore {
        fn with_post(id: PostId, comments: Vec<Comment>) -> FakeStore {
            let mut store = FakeStore::default();
            store.add_post(id, comments);
            store
        }

        fn add_post(&mut self, id: PostId, comments: Vec<Comment>) {
            self.posts.insert(
                id,
                Post {
                    title: format!("post {}", id.0),
                    body: String::from("body"),
                    comments,
                },
            );
        }

        fn mutate(&self) -> Result<(), Error> {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            match self.deny_mutations {
                true => Err(Error::Api(api::Error::PermissionDenied)),
                false => Ok(()),
            }
        }
    }

    #[async_trait]
    impl Store for FakeStore {
        async fn list_posts(&self) -> Result<Vec<PostSummary>, Error> {
            Ok(self
                .posts
                .iter()
                .map(|(id, p)| PostSummary {
                    id: *id,
                    title: p.title.clone(),
                })
                .collect())
        }

        async fn get_post(&self, post: PostId) -> Result<Post, Error> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.posts
                .get(&post)
                .cloned()
                .ok_or_else(|| Error::Api(api::Error::NotFound(String::from("post"))))
        }

        async fn create_comment(&self, _: PostId, c: &NewComment) -> Result<Comment, Error> {
            self.mutate()?;
            let id = {
                let mut next_id = self.next_id.lock().unwrap();
                *next_id += 1;
                1000 + *next_id
            };
            Ok(Comment {
                message: c.message.clone(),
                user: User {
                    id: UserId::stub(),
                    name: String::from("server"),
                },
                ..comment(id, c.parent_id.map(|p| p.0.as_u128()), "")
            })
        }

        async fn update_comment(
            &self,
            _: PostId,
            _: CommentId,
            u: &UpdateComment,
        ) -> Result<CommentMessage, Error> {
            self.mutate()?;
            Ok(CommentMessage {
                message: u.message.clone(),
            })
        }

        async fn delete_comment(&self, _: PostId, id: CommentId) -> Result<DeletedComment, Error> {
            self.mutate()?;
            Ok(DeletedComment { id })
        }

        async fn toggle_like(&self, _: PostId, _: CommentId) -> Result<LikeToggled, Error> {
            self.mutate()?;
            Ok(LikeToggled { added_like: true })
        }
    }

    fn loaded_ids(view: &PostView) -> Vec<CommentId> {
        view.tree()
            .expect("view is not loaded")
            .comments()
            .iter()
            .map(|c| c.id)
            .collect()
    }

    #[tokio::test]
    async fn open_seeds_tree_from_fetch() {
        let store = FakeStore::with_post(
            pid(1),
            vec![comment(2, Some(1), "reply"), comment(1, None, "root")],
        );
        let mut view = PostView::new();
        assert!(matches!(view.state(), ViewState::Idle));
        view.open(&store, pid(1), &SessionConfig::default()).await;
        let post = view.post().expect("post did not load");
        assert_eq!(post.id, pid(1));
        assert_eq!(post.body, "body");
        assert_eq!(post.tree.root_comments()[0].id, cid(1));
        assert_eq!(post.tree.replies(Some(cid(1)))[0].id, cid(2));
    }

    #[tokio::test]
    async fn same_post_is_fetched_once() {
        let store = FakeStore::with_post(pid(1), vec![comment(1, None, "root")]);
        let mut view = PostView::new();
        let config = SessionConfig::default();
        view.open(&store, pid(1), &config).await;
        view.open(&store, pid(1), &config).await;
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
        assert!(view.navigate(pid(1)).is_none());
    }

    #[tokio::test]
    async fn fetch_failure_is_reported() {
        let store = FakeStore::default();
        let mut view = PostView::new();
        match view.open(&store, pid(7), &SessionConfig::default()).await {
            ViewState::Failed(msg) => assert_eq!(msg, "Not found: post"),
            s => panic!("unexpected state {s:?}"),
        }
        assert!(view.tree().is_none());
    }

    #[tokio::test]
    async fn fetch_timeout_is_a_failure() {
        let mut store = FakeStore::with_post(pid(1), Vec::new());
        store.delay = Some(Duration::from_secs(5));
        let config = SessionConfig {
            fetch_timeout: Some(Duration::from_millis(10)),
        };
        let mut view = PostView::new();
        match view.open(&store, pid(1), &config).await {
            ViewState::Failed(msg) => assert!(msg.contains("timed out"), "{msg}"),
            s => panic!("unexpected state {s:?}"),
        }
    }

    #[tokio::test]
    async fn stale_fetch_is_discarded() {
        let mut store = FakeStore::with_post(pid(1), vec![comment(1, None, "from a")]);
        store.add_post(pid(2), vec![comment(2, None, "from b")]);
        let config = SessionConfig::default();
        let mut view = PostView::new();

        let ticket_a = view.navigate(pid(1)).unwrap();
        let ticket_b = view.navigate(pid(2)).unwrap();
        let (res_a, res_b) = tokio::join!(
            fetch_post(&store, ticket_a, &config),
            fetch_post(&store, ticket_b, &config),
        );

        assert!(view.settle(ticket_b, res_b));
        assert!(!view.settle(ticket_a, res_a));
        assert_eq!(view.post().unwrap().id, pid(2));
        assert_eq!(loaded_ids(&view), vec![cid(2)]);
    }

    #[tokio::test]
    async fn stale_fetch_settling_first_is_discarded() {
        let mut store = FakeStore::with_post(pid(1), vec![comment(1, None, "from a")]);
        store.add_post(pid(2), vec![comment(2, None, "from b")]);
        let config = SessionConfig::default();
        let mut view = PostView::new();

        let ticket_a = view.navigate(pid(1)).unwrap();
        let res_a = fetch_post(&store, ticket_a, &config).await;
        let ticket_b = view.navigate(pid(2)).unwrap();
        assert!(!view.settle(ticket_a, res_a));
        assert!(matches!(view.state(), ViewState::Loading));

        let res_b = fetch_post(&store, ticket_b, &config).await;
        assert!(view.settle(ticket_b, res_b));
        assert_eq!(loaded_ids(&view), vec![cid(2)]);
    }

    #[tokio::test]
    async fn coming_back_to_a_post_refetches() {
        let mut store = FakeStore::with_post(pid(1), Vec::new());
        store.add_post(pid(2), Vec::new());
        let config = SessionConfig::default();
        let mut view = PostView::new();
        let first = view.navigate(pid(1)).unwrap();
        view.navigate(pid(2)).unwrap();
        let second = view.navigate(pid(1)).unwrap();
        assert_ne!(first, second);
        let res = fetch_post(&store, first, &config).await;
        assert!(!view.settle(first, res));
        let res = fetch_post(&store, second, &config).await;
        assert!(view.settle(second, res));
    }

    #[tokio::test]
    async fn closed_view_ignores_fetch() {
        let store = FakeStore::with_post(pid(1), Vec::new());
        let mut view = PostView::new();
        let ticket = view.navigate(pid(1)).unwrap();
        view.close();
        let res = fetch_post(&store, ticket, &SessionConfig::default()).await;
        assert!(!view.settle(ticket, res));
        assert!(matches!(view.state(), ViewState::Idle));
    }

    #[tokio::test]
    async fn mutations_apply_store_answers() {
        let store = FakeStore::with_post(pid(1), vec![comment(1, None, "root")]);
        let mut view = PostView::new();
        view.open(&store, pid(1), &SessionConfig::default()).await;

        let created = view
            .create_comment(&store, Some(cid(1)), String::from("hello"))
            .await
            .unwrap();
        assert_eq!(created.user.name, "server");
        assert_eq!(loaded_ids(&view), vec![created.id, cid(1)]);
        assert_eq!(view.tree().unwrap().replies(Some(cid(1)))[0].id, created.id);

        view.update_comment(&store, created.id, String::from("edited"))
            .await
            .unwrap();
        assert_eq!(view.tree().unwrap().get(created.id).unwrap().message, "edited");

        assert!(view.toggle_like(&store, cid(1)).await.unwrap());
        assert_eq!(view.tree().unwrap().get(cid(1)).unwrap().like_count, 1);

        view.delete_comment(&store, cid(1)).await.unwrap();
        assert!(view.tree().unwrap().root_comments().is_empty());
        assert_eq!(loaded_ids(&view), vec![created.id]);
    }

    #[tokio::test]
    async fn empty_message_never_reaches_store() {
        let store = FakeStore::with_post(pid(1), vec![comment(1, None, "root")]);
        let mut view = PostView::new();
        view.open(&store, pid(1), &SessionConfig::default()).await;
        let before = view.tree().unwrap().comments().clone();

        let err = view
            .create_comment(&store, None, String::new())
            .await
            .unwrap_err();
        assert_eq!(err.api(), Some(&api::Error::MessageRequired));
        let err = view
            .update_comment(&store, cid(1), String::new())
            .await
            .unwrap_err();
        assert_eq!(err.api(), Some(&api::Error::MessageRequired));

        assert_eq!(store.mutations.load(Ordering::SeqCst), 0);
        assert!(Arc::ptr_eq(&before, view.tree().unwrap().comments()));
    }

    #[tokio::test]
    async fn rejected_mutations_leave_tree_untouched() {
        let mut store = FakeStore::with_post(pid(1), vec![comment(1, None, "root")]);
        store.deny_mutations = true;
        let mut view = PostView::new();
        view.open(&store, pid(1), &SessionConfig::default()).await;
        let before = view.tree().unwrap().comments().clone();

        let denied = Some(&api::Error::PermissionDenied);
        let res = view.create_comment(&store, None, String::from("hi")).await;
        assert_eq!(res.unwrap_err().api(), denied);
        let res = view.update_comment(&store, cid(1), String::from("hi")).await;
        assert_eq!(res.unwrap_err().api(), denied);
        let res = view.delete_comment(&store, cid(1)).await;
        assert_eq!(res.unwrap_err().api(), denied);
        let res = view.toggle_like(&store, cid(1)).await;
        assert_eq!(res.unwrap_err().api(), denied);

        assert_eq!(store.mutations.load(Ordering::SeqCst), 4);
        assert!(Arc::ptr_eq(&before, view.tree().unwrap().comments()));
    }

    #[tokio::test]
    async fn mutations_need_a_loaded_post() {
        let store = FakeStore::default();
        let mut view = PostView::new();
        let res = view.create_comment(&store, None, String::from("hi")).await;
        assert!(matches!(res, Err(Error::NotLoaded)));
        assert_eq!(store.mutations.load(Ordering::SeqCst), 0);
    }
}
