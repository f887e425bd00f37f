mod error;
pub use error::Error;

mod forest;
pub use forest::{CommentForest, ParentKey};

mod http;
pub use http::HttpStore;

mod session;
pub use session::{fetch_post, FetchTicket, PostContext, PostView, SessionConfig, ViewState};

mod store;
pub use store::Store;

mod tree;
pub use tree::CommentTree;

pub mod api {
    pub use natter_api::*;
}
