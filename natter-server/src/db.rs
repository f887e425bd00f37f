use anyhow::Context;
use chrono::Utc;
use futures::TryStreamExt;
use natter_api::{
    AuthToken, Comment, CommentId, CommentMessage, DeletedComment, LikeToggled, NewComment,
    NewPost, NewSession, NewUser, Post, PostId, PostSummary, User, UserId, Uuid,
};
use sqlx::{sqlite::SqliteRow, Row};

use crate::Error;

// ?1 is the viewer, for whom `liked_by_me` is computed
const SELECT_COMMENTS: &str = "
    SELECT
        c.id,
        c.parent_id,
        c.message,
        c.created_at,
        c.owner_id,
        u.name AS owner_name,
        (SELECT COUNT(*) FROM likes l WHERE l.comment_id = c.id) AS like_count,
        EXISTS (
            SELECT 1 FROM likes l WHERE l.comment_id = c.id AND l.user_id = ?1
        ) AS liked_by_me
    FROM comments c
    INNER JOIN users u
        ON u.id = c.owner_id
";

pub async fn create_user(conn: &mut sqlx::SqliteConnection, u: NewUser) -> Result<(), Error> {
    let name_taken = sqlx::query("SELECT 1 FROM users WHERE name = ?1")
        .bind(&u.name)
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("checking whether name {:?} is taken", u.name))?
        .is_some();
    if name_taken {
        return Err(Error::name_already_used(u.name));
    }

    let id_taken = sqlx::query("SELECT 1 FROM users WHERE id = ?1")
        .bind(u.id.0)
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("checking whether user id {:?} is taken", u.id))?
        .is_some();
    if id_taken {
        return Err(Error::uuid_already_used(u.id.0));
    }

    sqlx::query("INSERT INTO users (id, name) VALUES (?1, ?2)")
        .bind(u.id.0)
        .bind(&u.name)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("inserting user {:?}", u.id))?;
    Ok(())
}

pub async fn create_post(conn: &mut sqlx::SqliteConnection, p: NewPost) -> Result<(), Error> {
    let id_taken = sqlx::query("SELECT 1 FROM posts WHERE id = ?1")
        .bind(p.id.0)
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("checking whether post id {:?} is taken", p.id))?
        .is_some();
    if id_taken {
        return Err(Error::uuid_already_used(p.id.0));
    }

    sqlx::query("INSERT INTO posts (id, title, body) VALUES (?1, ?2, ?3)")
        .bind(p.id.0)
        .bind(&p.title)
        .bind(&p.body)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("inserting post {:?}", p.id))?;
    Ok(())
}

pub async fn login_user(
    conn: &mut sqlx::SqliteConnection,
    s: &NewSession,
) -> anyhow::Result<Option<AuthToken>> {
    let user = sqlx::query("SELECT id FROM users WHERE name = ?1")
        .bind(&s.user)
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("looking up user {:?}", s.user))?;
    let user: Uuid = match user {
        None => return Ok(None),
        Some(row) => row.try_get("id").context("retrieving the id field")?,
    };

    let token = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO sessions (id, user_id, login_time, last_active) VALUES (?1, ?2, ?3, ?3)",
    )
    .bind(token)
    .bind(user)
    .bind(now)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("opening session for user {:?}", s.user))?;
    Ok(Some(AuthToken(token)))
}

/// Returns false if there was no such session
pub async fn logout_user(
    conn: &mut sqlx::SqliteConnection,
    token: &AuthToken,
) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM sessions WHERE id = ?1")
        .bind(token.0)
        .execute(&mut *conn)
        .await
        .context("closing session")?;
    Ok(res.rows_affected() == 1)
}

pub async fn recover_session(
    conn: &mut sqlx::SqliteConnection,
    token: AuthToken,
) -> Result<UserId, Error> {
    let row = sqlx::query("SELECT user_id FROM sessions WHERE id = ?1")
        .bind(token.0)
        .fetch_optional(&mut *conn)
        .await
        .context("looking up session")?
        .ok_or_else(Error::permission_denied)?;
    let user = UserId(
        row.try_get("user_id")
            .context("retrieving the user_id field")?,
    );

    sqlx::query("UPDATE sessions SET last_active = ?1 WHERE id = ?2")
        .bind(Utc::now())
        .bind(token.0)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("refreshing session of user {:?}", user))?;
    Ok(user)
}

pub async fn list_posts(conn: &mut sqlx::SqliteConnection) -> anyhow::Result<Vec<PostSummary>> {
    let mut posts = Vec::new();
    let mut query = sqlx::query("SELECT id, title FROM posts ORDER BY title, id").fetch(conn);
    while let Some(p) = query.try_next().await.context("querying posts table")? {
        posts.push(PostSummary {
            id: PostId(p.try_get("id").context("retrieving the id field")?),
            title: p.try_get("title").context("retrieving the title field")?,
        });
    }
    Ok(posts)
}

fn comment_from_row(row: &SqliteRow) -> anyhow::Result<Comment> {
    let like_count: i64 = row
        .try_get("like_count")
        .context("retrieving the like_count field")?;
    Ok(Comment {
        id: CommentId(row.try_get("id").context("retrieving the id field")?),
        message: row
            .try_get("message")
            .context("retrieving the message field")?,
        parent_id: row
            .try_get::<Option<Uuid>, _>("parent_id")
            .context("retrieving the parent_id field")?
            .map(CommentId),
        created_at: row
            .try_get("created_at")
            .context("retrieving the created_at field")?,
        user: User {
            id: UserId(
                row.try_get("owner_id")
                    .context("retrieving the owner_id field")?,
            ),
            name: row
                .try_get("owner_name")
                .context("retrieving the owner_name field")?,
        },
        like_count: u64::try_from(like_count).context("like count is negative")?,
        liked_by_me: row
            .try_get("liked_by_me")
            .context("retrieving the liked_by_me field")?,
    })
}

/// Fetches `post` along with all its comments, newest first
pub async fn fetch_post(
    conn: &mut sqlx::SqliteConnection,
    viewer: UserId,
    post: PostId,
) -> Result<Post, Error> {
    let p = sqlx::query("SELECT title, body FROM posts WHERE id = ?1")
        .bind(post.0)
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("fetching post {:?}", post))?
        .ok_or_else(|| Error::not_found("post"))?;
    let title = p.try_get("title").context("retrieving the title field")?;
    let body = p.try_get("body").context("retrieving the body field")?;

    let sql = format!(
        "{SELECT_COMMENTS} WHERE c.post_id = ?2 ORDER BY c.created_at DESC, c.rowid DESC"
    );
    let mut comments = Vec::new();
    let mut query = sqlx::query(&sql)
        .bind(viewer.0)
        .bind(post.0)
        .fetch(&mut *conn);
    while let Some(c) = query.try_next().await.context("querying comments table")? {
        comments.push(comment_from_row(&c)?);
    }

    Ok(Post {
        title,
        body,
        comments,
    })
}

async fn fetch_comment(
    conn: &mut sqlx::SqliteConnection,
    viewer: UserId,
    comment: CommentId,
) -> anyhow::Result<Option<Comment>> {
    let sql = format!("{SELECT_COMMENTS} WHERE c.id = ?2");
    sqlx::query(&sql)
        .bind(viewer.0)
        .bind(comment.0)
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("fetching comment {:?}", comment))?
        .map(|row| comment_from_row(&row))
        .transpose()
}

/// Returns the owner of `comment`, which must be a comment of `post`
async fn comment_owner(
    conn: &mut sqlx::SqliteConnection,
    post: PostId,
    comment: CommentId,
) -> Result<UserId, Error> {
    let row = sqlx::query("SELECT owner_id FROM comments WHERE id = ?1 AND post_id = ?2")
        .bind(comment.0)
        .bind(post.0)
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("looking up comment {:?}", comment))?
        .ok_or_else(|| Error::not_found("comment"))?;
    Ok(UserId(
        row.try_get("owner_id")
            .context("retrieving the owner_id field")?,
    ))
}

pub async fn create_comment(
    conn: &mut sqlx::SqliteConnection,
    owner: UserId,
    post: PostId,
    c: &NewComment,
) -> Result<Comment, Error> {
    let post_exists = sqlx::query("SELECT 1 FROM posts WHERE id = ?1")
        .bind(post.0)
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("looking up post {:?}", post))?
        .is_some();
    if !post_exists {
        return Err(Error::not_found("post"));
    }

    if let Some(parent) = c.parent_id {
        let parent_exists = sqlx::query("SELECT 1 FROM comments WHERE id = ?1 AND post_id = ?2")
            .bind(parent.0)
            .bind(post.0)
            .fetch_optional(&mut *conn)
            .await
            .with_context(|| format!("looking up parent comment {:?}", parent))?
            .is_some();
        if !parent_exists {
            return Err(Error::not_found("parent comment"));
        }
    }

    // The parent must still exist when the row lands
    let id = CommentId(Uuid::new_v4());
    let inserted = sqlx::query(
        "
            INSERT INTO comments (id, post_id, parent_id, owner_id, message, created_at)
            SELECT ?1, ?2, ?3, ?4, ?5, ?6
            WHERE ?3 IS NULL
                OR EXISTS (SELECT 1 FROM comments WHERE id = ?3 AND post_id = ?2)
        ",
    )
    .bind(id.0)
    .bind(post.0)
    .bind(c.parent_id.map(|p| p.0))
    .bind(owner.0)
    .bind(&c.message)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .with_context(|| format!("inserting comment {:?}", id))?;
    if inserted.rows_affected() == 0 {
        return Err(Error::not_found("parent comment"));
    }

    // A concurrent deletion of the parent also takes the new reply away
    fetch_comment(&mut *conn, owner, id)
        .await?
        .ok_or_else(|| Error::not_found("parent comment"))
}

pub async fn update_comment(
    conn: &mut sqlx::SqliteConnection,
    user: UserId,
    post: PostId,
    comment: CommentId,
    message: String,
) -> Result<CommentMessage, Error> {
    if comment_owner(&mut *conn, post, comment).await? != user {
        return Err(Error::permission_denied());
    }
    let updated = sqlx::query("UPDATE comments SET message = ?1 WHERE id = ?2")
        .bind(&message)
        .bind(comment.0)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("updating comment {:?}", comment))?;
    if updated.rows_affected() == 0 {
        return Err(Error::not_found("comment"));
    }
    Ok(CommentMessage { message })
}

/// Deletes `comment` along with all its replies and their likes
pub async fn delete_comment(
    conn: &mut sqlx::SqliteConnection,
    user: UserId,
    post: PostId,
    comment: CommentId,
) -> Result<DeletedComment, Error> {
    if comment_owner(&mut *conn, post, comment).await? != user {
        return Err(Error::permission_denied());
    }
    sqlx::query(
        "
            DELETE FROM comments WHERE id IN (
                WITH RECURSIVE doomed (id) AS (
                    SELECT ?1
                    UNION ALL
                    SELECT c.id
                        FROM comments c
                    INNER JOIN doomed d
                        ON c.parent_id = d.id
                )
                SELECT id FROM doomed
            )
        ",
    )
    .bind(comment.0)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("deleting comment {:?}", comment))?;
    Ok(DeletedComment { id: comment })
}

/// Adds the like of `user` on `comment`, or removes it if it was already there
///
/// Retries until either statement changed a row, so that concurrent toggles by
/// the same user each flip the like exactly once.
pub async fn toggle_like(
    conn: &mut sqlx::SqliteConnection,
    user: UserId,
    post: PostId,
    comment: CommentId,
) -> Result<LikeToggled, Error> {
    loop {
        comment_owner(&mut *conn, post, comment).await?;
        let added = sqlx::query(
            "
                INSERT OR IGNORE INTO likes (user_id, comment_id)
                SELECT ?1, ?2
                WHERE EXISTS (SELECT 1 FROM comments WHERE id = ?2)
            ",
        )
        .bind(user.0)
        .bind(comment.0)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("adding like of {:?} on {:?}", user, comment))?;
        if added.rows_affected() > 0 {
            return Ok(LikeToggled { added_like: true });
        }
        let removed = sqlx::query("DELETE FROM likes WHERE user_id = ?1 AND comment_id = ?2")
            .bind(user.0)
            .bind(comment.0)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("removing like of {:?} on {:?}", user, comment))?;
        if removed.rows_affected() > 0 {
            return Ok(LikeToggled { added_like: false });
        }
        tracing::debug!(?user, ?comment, "like changed under our feet, retrying toggle");
    }
}
