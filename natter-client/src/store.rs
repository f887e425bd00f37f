use async_trait::async_trait;

use crate::{
    api::{
        Comment, CommentId, CommentMessage, DeletedComment, LikeToggled, NewComment, Post, PostId,
        PostSummary, UpdateComment,
    },
    Error,
};

/// The comment store, as seen by one acting user
#[async_trait]
pub trait Store: Send + Sync {
    async fn list_posts(&self) -> Result<Vec<PostSummary>, Error>;

    /// Fetches a post, with its comments newest first and the like state of
    /// the acting user
    async fn get_post(&self, post: PostId) -> Result<Post, Error>;

    async fn create_comment(&self, post: PostId, comment: &NewComment) -> Result<Comment, Error>;

    async fn update_comment(
        &self,
        post: PostId,
        comment: CommentId,
        update: &UpdateComment,
    ) -> Result<CommentMessage, Error>;

    async fn delete_comment(&self, post: PostId, comment: CommentId)
        -> Result<DeletedComment, Error>;

    async fn toggle_like(&self, post: PostId, comment: CommentId) -> Result<LikeToggled, Error>;
}
