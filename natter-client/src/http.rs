use anyhow::Context;
use async_trait::async_trait;
use reqwest::Method;

use crate::{
    api::{
        self, AuthToken, Comment, CommentId, CommentMessage, DeletedComment, LikeToggled,
        NewComment, NewSession, Post, PostId, PostSummary, UpdateComment,
    },
    Error, Store,
};

/// A `Store` talking to a natter server over HTTP
#[derive(Clone, Debug)]
pub struct HttpStore {
    client: reqwest::Client,
    host: String,
    token: AuthToken,
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp
        .bytes()
        .await
        .with_context(|| format!("receiving body of {status} response"))?;
    let err = api::Error::parse(&body)
        .with_context(|| format!("parsing body of {status} response: {body:?}"))?;
    Err(Error::Api(err))
}

impl HttpStore {
    pub fn new(host: String, token: AuthToken) -> HttpStore {
        HttpStore {
            client: reqwest::Client::new(),
            host,
            token,
        }
    }

    /// Opens a session on `host` acting as `user`
    pub async fn login(host: String, user: String) -> Result<HttpStore, Error> {
        let client = reqwest::Client::new();
        let resp = client
            .post(format!("{}/api/auth", host))
            .json(&NewSession { user })
            .send()
            .await
            .context("sending auth request")?;
        let token = check_status(resp)
            .await?
            .json()
            .await
            .context("parsing auth token")?;
        Ok(HttpStore {
            client,
            host,
            token,
        })
    }

    pub async fn logout(self) -> Result<(), Error> {
        let resp = self
            .client
            .post(format!("{}/api/unauth", self.host))
            .bearer_auth(self.token.0)
            .send()
            .await
            .context("sending unauth request")?;
        check_status(resp).await?;
        Ok(())
    }

    pub fn token(&self) -> AuthToken {
        self.token
    }

    async fn call<B, R>(&self, method: Method, path: &str, body: Option<&B>) -> Result<R, Error>
    where
        B: serde::Serialize + Sync,
        R: for<'de> serde::Deserialize<'de>,
    {
        let url = format!("{}/api/{}", self.host, path);
        tracing::trace!(%method, %url, "sending request to store");
        let req = self
            .client
            .request(method, &url)
            .bearer_auth(self.token.0);
        let req = match body {
            Some(body) => req.json(body),
            None => req,
        };
        let resp = req
            .send()
            .await
            .with_context(|| format!("sending request to {url}"))?;
        Ok(check_status(resp)
            .await?
            .json()
            .await
            .with_context(|| format!("parsing response from {url}"))?)
    }
}

#[async_trait]
impl Store for HttpStore {
    async fn list_posts(&self) -> Result<Vec<PostSummary>, Error> {
        self.call::<(), _>(Method::GET, "posts", None).await
    }

    async fn get_post(&self, post: PostId) -> Result<Post, Error> {
        self.call::<(), _>(Method::GET, &format!("posts/{}", post.0), None)
            .await
    }

    async fn create_comment(&self, post: PostId, comment: &NewComment) -> Result<Comment, Error> {
        self.call(
            Method::POST,
            &format!("posts/{}/comments", post.0),
            Some(comment),
        )
        .await
    }

    async fn update_comment(
        &self,
        post: PostId,
        comment: CommentId,
        update: &UpdateComment,
    ) -> Result<CommentMessage, Error> {
        self.call(
            Method::PUT,
            &format!("posts/{}/comments/{}", post.0, comment.0),
            Some(update),
        )
        .await
    }

    async fn delete_comment(
        &self,
        post: PostId,
        comment: CommentId,
    ) -> Result<DeletedComment, Error> {
        self.call::<(), _>(
            Method::DELETE,
            &format!("posts/{}/comments/{}", post.0, comment.0),
            None,
        )
        .await
    }

    async fn toggle_like(&self, post: PostId, comment: CommentId) -> Result<LikeToggled, Error> {
        self.call::<(), _>(
            Method::POST,
            &format!("posts/{}/comments/{}/toggle-like", post.0, comment.0),
            None,
        )
        .await
    }
}
