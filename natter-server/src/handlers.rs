use anyhow::Context;
use axum::{extract::Path, Json};
use natter_api::{
    AuthToken, Comment, CommentId, CommentMessage, DeletedComment, LikeToggled, NewComment,
    NewPost, NewSession, NewUser, Post, PostId, PostSummary, UpdateComment, UserId, Uuid,
};

use crate::{db, extractors::*, Error};

pub async fn admin_create_user(
    AdminAuth: AdminAuth,
    mut conn: SqliteConn,
    Json(data): Json<NewUser>,
) -> Result<(), Error> {
    data.validate()?;
    db::create_user(&mut *conn, data).await
}

pub async fn admin_create_post(
    AdminAuth: AdminAuth,
    mut conn: SqliteConn,
    Json(data): Json<NewPost>,
) -> Result<(), Error> {
    data.validate()?;
    db::create_post(&mut *conn, data).await
}

pub async fn auth(
    mut conn: SqliteConn,
    Json(data): Json<NewSession>,
) -> Result<Json<AuthToken>, Error> {
    data.validate()?;
    Ok(Json(
        db::login_user(&mut *conn, &data)
            .await
            .context("logging user in")?
            .ok_or(Error::permission_denied())?,
    ))
}

pub async fn unauth(user: PreAuth, mut conn: SqliteConn) -> Result<(), Error> {
    match db::logout_user(&mut *conn, &user.0).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(Error::permission_denied()),
        Err(e) => Err(Error::Anyhow(e)),
    }
}

pub async fn whoami(Auth(user): Auth) -> Json<UserId> {
    Json(user)
}

pub async fn list_posts(
    Auth(user): Auth,
    mut conn: SqliteConn,
) -> Result<Json<Vec<PostSummary>>, Error> {
    Ok(Json(
        db::list_posts(&mut *conn)
            .await
            .with_context(|| format!("listing posts for {:?}", user))?,
    ))
}

pub async fn get_post(
    Auth(user): Auth,
    Path(post): Path<Uuid>,
    mut conn: SqliteConn,
) -> Result<Json<Post>, Error> {
    Ok(Json(db::fetch_post(&mut *conn, user, PostId(post)).await?))
}

pub async fn create_comment(
    Auth(user): Auth,
    Path(post): Path<Uuid>,
    mut conn: SqliteConn,
    Json(data): Json<NewComment>,
) -> Result<Json<Comment>, Error> {
    data.validate()?;
    let comment = db::create_comment(&mut *conn, user, PostId(post), &data).await?;
    tracing::debug!(?user, id = ?comment.id, "created comment");
    Ok(Json(comment))
}

pub async fn update_comment(
    Auth(user): Auth,
    Path((post, comment)): Path<(Uuid, Uuid)>,
    mut conn: SqliteConn,
    Json(data): Json<UpdateComment>,
) -> Result<Json<CommentMessage>, Error> {
    data.validate()?;
    Ok(Json(
        db::update_comment(
            &mut *conn,
            user,
            PostId(post),
            CommentId(comment),
            data.message,
        )
        .await?,
    ))
}

pub async fn delete_comment(
    Auth(user): Auth,
    Path((post, comment)): Path<(Uuid, Uuid)>,
    mut conn: SqliteConn,
) -> Result<Json<DeletedComment>, Error> {
    Ok(Json(
        db::delete_comment(&mut *conn, user, PostId(post), CommentId(comment)).await?,
    ))
}

pub async fn toggle_like(
    Auth(user): Auth,
    Path((post, comment)): Path<(Uuid, Uuid)>,
    mut conn: SqliteConn,
) -> Result<Json<LikeToggled>, Error> {
    Ok(Json(
        db::toggle_like(&mut *conn, user, PostId(post), CommentId(comment)).await?,
    ))
}
