use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use natter_client::{
    api::{
        AuthToken, Comment, CommentId, CommentMessage, DeletedComment, LikeToggled, NewComment,
        NewSession, Post, PostId, PostSummary, UpdateComment,
    },
    Error, Store,
};
use tokio::sync::Mutex;

use crate::MockServer;

/// A `Store` backed by a shared `MockServer`, acting as one user
#[derive(Clone)]
pub struct MockStore {
    server: Arc<Mutex<MockServer>>,
    token: AuthToken,
    fetch_latency: Option<Duration>,
}

impl MockStore {
    pub async fn login(server: Arc<Mutex<MockServer>>, user: &str) -> Result<MockStore, Error> {
        let token = server.lock().await.auth(NewSession {
            user: String::from(user),
        })?;
        Ok(MockStore {
            server,
            token,
            fetch_latency: None,
        })
    }

    /// Makes every post fetch of this store wait for `latency` first
    pub fn with_fetch_latency(self, latency: Duration) -> MockStore {
        MockStore {
            fetch_latency: Some(latency),
            ..self
        }
    }

    pub fn token(&self) -> AuthToken {
        self.token
    }
}

#[async_trait]
impl Store for MockStore {
    async fn list_posts(&self) -> Result<Vec<PostSummary>, Error> {
        Ok(self.server.lock().await.list_posts(self.token)?)
    }

    async fn get_post(&self, post: PostId) -> Result<Post, Error> {
        if let Some(latency) = self.fetch_latency {
            tokio::time::sleep(latency).await;
        }
        tracing::trace!(?post, "mock store fetching post");
        Ok(self.server.lock().await.get_post(self.token, post)?)
    }

    async fn create_comment(&self, post: PostId, comment: &NewComment) -> Result<Comment, Error> {
        Ok(self
            .server
            .lock()
            .await
            .create_comment(self.token, post, comment.clone())?)
    }

    async fn update_comment(
        &self,
        post: PostId,
        comment: CommentId,
        update: &UpdateComment,
    ) -> Result<CommentMessage, Error> {
        Ok(self
            .server
            .lock()
            .await
            .update_comment(self.token, post, comment, update.clone())?)
    }

    async fn delete_comment(
        &self,
        post: PostId,
        comment: CommentId,
    ) -> Result<DeletedComment, Error> {
        Ok(self
            .server
            .lock()
            .await
            .delete_comment(self.token, post, comment)?)
    }

    async fn toggle_like(&self, post: PostId, comment: CommentId) -> Result<LikeToggled, Error> {
        Ok(self
            .server
            .lock()
            .await
            .toggle_like(self.token, post, comment)?)
    }
}
