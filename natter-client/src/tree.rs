use std::sync::Arc;

use crate::{
    api::{Comment, CommentId},
    CommentForest, ParentKey,
};

/// The comments of one post, as a flat newest-first list plus the forest
/// derived from it.
///
/// The flat list is the only thing that is ever written to. Every write
/// replaces it with a new list, and the forest is re-derived exactly when the
/// list identity changes. Writes that would not change anything keep the
/// current list, and thus the current forest.
#[derive(Clone, Debug)]
pub struct CommentTree {
    comments: Arc<Vec<Arc<Comment>>>,
    forest: CommentForest,
}

impl CommentTree {
    pub fn new(comments: Vec<Comment>) -> CommentTree {
        let comments = Arc::new(comments.into_iter().map(Arc::new).collect::<Vec<_>>());
        let forest = CommentForest::derive(&comments);
        CommentTree { comments, forest }
    }

    pub fn empty() -> CommentTree {
        CommentTree::new(Vec::new())
    }

    /// The flat list, newest first
    pub fn comments(&self) -> &Arc<Vec<Arc<Comment>>> {
        &self.comments
    }

    pub fn forest(&self) -> &CommentForest {
        &self.forest
    }

    pub fn get(&self, id: CommentId) -> Option<&Arc<Comment>> {
        self.comments.iter().find(|c| c.id == id)
    }

    pub fn replies(&self, parent: ParentKey) -> &[Arc<Comment>] {
        self.forest.replies(parent)
    }

    pub fn root_comments(&self) -> &[Arc<Comment>] {
        self.forest.roots()
    }

    fn set_comments(&mut self, comments: Arc<Vec<Arc<Comment>>>) {
        if Arc::ptr_eq(&self.comments, &comments) {
            return;
        }
        self.forest = CommentForest::derive(&comments);
        self.comments = comments;
    }

    /// Rewrites the comment with id `id`, keeping the current list if there is
    /// no such comment
    fn map_comment(&mut self, id: CommentId, f: impl Fn(&Comment) -> Comment) {
        if self.get(id).is_none() {
            tracing::debug!(?id, "local mutation on a comment that is not in the list");
            return;
        }
        let comments = self
            .comments
            .iter()
            .map(|c| match c.id == id {
                true => Arc::new(f(c)),
                false => c.clone(),
            })
            .collect();
        self.set_comments(Arc::new(comments));
    }

    /// Prepends `comment`, which must come fresh from the store
    pub fn create_local_comment(&mut self, comment: Comment) {
        let comments = std::iter::once(Arc::new(comment))
            .chain(self.comments.iter().cloned())
            .collect();
        self.set_comments(Arc::new(comments));
    }

    pub fn update_local_comment(&mut self, id: CommentId, message: String) {
        self.map_comment(id, |c| Comment {
            message: message.clone(),
            ..c.clone()
        });
    }

    /// Removes the comment with id `id`. Its replies are left in place, under
    /// a parent that is no longer in the list.
    pub fn delete_local_comment(&mut self, id: CommentId) {
        if self.get(id).is_none() {
            tracing::debug!(?id, "local deletion of a comment that is not in the list");
            return;
        }
        let comments = self
            .comments
            .iter()
            .filter(|c| c.id != id)
            .cloned()
            .collect();
        self.set_comments(Arc::new(comments));
    }

    pub fn toggle_local_comment_like(&mut self, id: CommentId, added_like: bool) {
        self.map_comment(id, |c| Comment {
            like_count: match added_like {
                true => c.like_count + 1,
                false => c.like_count.saturating_sub(1),
            },
            liked_by_me: added_like,
            ..c.clone()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::tests::{cid, comment};

    fn ids(comments: &[Arc<Comment>]) -> Vec<CommentId> {
        comments.iter().map(|c| c.id).collect()
    }

    fn scenario_2() -> CommentTree {
        CommentTree::new(vec![comment(1, None, "root"), comment(2, Some(1), "reply")])
    }

    #[test]
    fn single_root() {
        let tree = CommentTree::new(vec![comment(1, None, "root")]);
        assert_eq!(ids(tree.root_comments()), vec![cid(1)]);
        assert!(tree.replies(Some(cid(1))).is_empty());
    }

    #[test]
    fn root_with_reply() {
        let tree = scenario_2();
        assert_eq!(ids(tree.root_comments()), vec![cid(1)]);
        assert_eq!(ids(tree.replies(Some(cid(1)))), vec![cid(2)]);
        assert!(tree.replies(Some(cid(2))).is_empty());
    }

    #[test]
    fn created_comment_is_prepended() {
        let mut tree = scenario_2();
        tree.create_local_comment(comment(3, None, "new"));
        assert_eq!(ids(tree.root_comments()), vec![cid(3), cid(1)]);
        assert_eq!(ids(tree.comments()), vec![cid(3), cid(1), cid(2)]);

        tree.create_local_comment(comment(4, Some(1), "another reply"));
        assert_eq!(ids(tree.replies(Some(cid(1)))), vec![cid(4), cid(2)]);
    }

    #[test]
    fn created_comment_is_first_reply() {
        bolero::check!()
            .with_type::<(Vec<Option<u8>>, Option<u8>)>()
            .for_each(|(spec, parent)| {
                let mut tree = CommentTree::new(
                    spec.iter()
                        .enumerate()
                        .map(|(i, p)| comment(i as u128, p.map(u128::from), "m"))
                        .collect(),
                );
                let new = comment(1000, parent.map(u128::from), "new");
                tree.create_local_comment(new.clone());
                assert_eq!(*tree.replies(new.parent_id)[0], new);
                assert_eq!(tree.comments().len(), spec.len() + 1);
            });
    }

    #[test]
    fn update_changes_only_the_message() {
        let mut tree = scenario_2();
        tree.toggle_local_comment_like(cid(2), true);
        let before = tree.get(cid(2)).unwrap().clone();
        tree.update_local_comment(cid(2), String::from("edited"));
        let after = tree.get(cid(2)).unwrap();
        assert_eq!(after.message, "edited");
        assert_eq!(
            **after,
            Comment {
                message: String::from("edited"),
                ..(*before).clone()
            }
        );
        assert_eq!(tree.get(cid(1)).unwrap().message, "root");
        assert_eq!(tree.replies(Some(cid(1)))[0].message, "edited");
    }

    #[test]
    fn update_of_unknown_comment_keeps_list_identity() {
        let mut tree = scenario_2();
        let before = tree.comments().clone();
        tree.update_local_comment(cid(42), String::from("edited"));
        assert!(Arc::ptr_eq(&before, tree.comments()));
        tree.delete_local_comment(cid(42));
        assert!(Arc::ptr_eq(&before, tree.comments()));
        tree.toggle_local_comment_like(cid(42), true);
        assert!(Arc::ptr_eq(&before, tree.comments()));
    }

    #[test]
    fn every_write_changes_list_identity() {
        let mut tree = scenario_2();
        let before = tree.comments().clone();
        tree.update_local_comment(cid(1), String::from("same length"));
        assert!(!Arc::ptr_eq(&before, tree.comments()));
    }

    #[test]
    fn delete_keeps_orphans() {
        let mut tree = scenario_2();
        tree.delete_local_comment(cid(1));
        assert!(tree.root_comments().is_empty());
        assert_eq!(ids(tree.replies(Some(cid(1)))), vec![cid(2)]);
        assert_eq!(ids(tree.comments()), vec![cid(2)]);
    }

    #[test]
    fn delete_removes_exactly_one() {
        let mut tree = CommentTree::new(vec![
            comment(4, Some(2), "d"),
            comment(3, None, "c"),
            comment(2, Some(1), "b"),
            comment(1, None, "a"),
        ]);
        tree.delete_local_comment(cid(2));
        assert_eq!(ids(tree.comments()), vec![cid(4), cid(3), cid(1)]);
        assert_eq!(ids(tree.replies(Some(cid(2)))), vec![cid(4)]);
        assert!(tree.replies(Some(cid(1))).is_empty());
    }

    #[test]
    fn like_toggles_adjust_count() {
        let mut tree = scenario_2();
        tree.toggle_local_comment_like(cid(1), true);
        let c = tree.get(cid(1)).unwrap();
        assert_eq!((c.like_count, c.liked_by_me), (1, true));
        tree.toggle_local_comment_like(cid(1), false);
        let c = tree.get(cid(1)).unwrap();
        assert_eq!((c.like_count, c.liked_by_me), (0, false));
        tree.toggle_local_comment_like(cid(1), false);
        assert_eq!(tree.get(cid(1)).unwrap().like_count, 0);
    }
}
