use chrono::Utc;

pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<Utc>;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

mod auth;
pub use auth::{AuthToken, NewSession};

mod comment;
pub use comment::{
    Comment, CommentId, CommentMessage, DeletedComment, LikeToggled, NewComment, UpdateComment,
};

mod error;
pub use error::Error;

mod post;
pub use post::{NewPost, Post, PostId, PostSummary};

mod user;
pub use user::{NewUser, User, UserId};

fn null_as_empty<'de, D>(d: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(<Option<String> as serde::Deserialize>::deserialize(d)?.unwrap_or_default())
}

pub fn validate_string(s: &str) -> Result<(), Error> {
    if s.contains('\0') {
        return Err(Error::NullByteInString(String::from(s)));
    }
    Ok(())
}

/// Validates a comment message: it must be present and non-empty
pub fn validate_message(msg: &str) -> Result<(), Error> {
    if msg.is_empty() {
        return Err(Error::MessageRequired);
    }
    validate_string(msg)
}
