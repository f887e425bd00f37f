use uuid::Uuid;

use crate::{Error, Time, User, STUB_UUID};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CommentId(pub Uuid);

impl CommentId {
    pub fn stub() -> CommentId {
        CommentId(STUB_UUID)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub message: String,

    /// None for root comments
    pub parent_id: Option<CommentId>,

    pub created_at: Time,

    /// Author of the comment
    pub user: User,

    pub like_count: u64,

    /// Whether the user who fetched this comment liked it
    pub liked_by_me: bool,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub parent_id: Option<CommentId>,

    /// A missing or null message reads as empty, and fails validation
    #[serde(default, deserialize_with = "crate::null_as_empty")]
    pub message: String,
}

impl NewComment {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_message(&self.message)
    }
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct UpdateComment {
    #[serde(default, deserialize_with = "crate::null_as_empty")]
    pub message: String,
}

impl UpdateComment {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_message(&self.message)
    }
}

/// Answer to a comment update
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CommentMessage {
    pub message: String,
}

/// Answer to a comment deletion
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct DeletedComment {
    pub id: CommentId,
}

/// Answer to a like toggle
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeToggled {
    /// true if the like was just added, false if it was just removed
    pub added_like: bool,
}
