use std::{collections::HashMap, sync::Arc};

use crate::api::{Comment, CommentId};

/// Key grouping sibling comments. `None` is the group of root comments, and
/// cannot collide with any comment id.
pub type ParentKey = Option<CommentId>;

/// Comments grouped by parent, each group keeping the order of the flat list
/// it was derived from
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommentForest {
    groups: HashMap<ParentKey, Vec<Arc<Comment>>>,
}

impl CommentForest {
    pub fn derive(comments: &[Arc<Comment>]) -> CommentForest {
        let mut groups: HashMap<ParentKey, Vec<Arc<Comment>>> = HashMap::new();
        for c in comments {
            groups
                .entry(c.parent_id)
                .or_insert_with(Vec::new)
                .push(c.clone());
        }
        CommentForest { groups }
    }

    /// Direct children of `parent`, empty if it has none
    pub fn replies(&self, parent: ParentKey) -> &[Arc<Comment>] {
        self.groups.get(&parent).map(|g| &g[..]).unwrap_or(&[])
    }

    pub fn roots(&self) -> &[Arc<Comment>] {
        self.replies(None)
    }

    pub fn groups(&self) -> impl Iterator<Item = (ParentKey, &[Arc<Comment>])> {
        self.groups.iter().map(|(k, g)| (*k, &g[..]))
    }

    /// Total number of comments across all groups
    pub fn len(&self) -> usize {
        self.groups.values().map(|g| g.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
