use std::collections::{btree_map, BTreeMap, BTreeSet, HashMap};

use natter_client::api::{
    AuthToken, Comment, CommentId, CommentMessage, DeletedComment, Error, LikeToggled, NewComment,
    NewPost, NewSession, NewUser, Post, PostId, PostSummary, Time, UpdateComment, User, UserId,
    Uuid,
};

mod store;
pub use store::MockStore;

/// An in-memory comment store, answering exactly like the real server
pub struct MockServer {
    users: BTreeMap<UserId, String>,
    sessions: HashMap<AuthToken, UserId>,
    posts: BTreeMap<PostId, DbPost>,
}

#[derive(Debug)]
struct DbPost {
    title: String,
    body: String,

    // Oldest first
    comments: Vec<DbComment>,
}

#[derive(Debug)]
struct DbComment {
    id: CommentId,
    parent_id: Option<CommentId>,
    message: String,
    created_at: Time,
    owner: UserId,
    likes: BTreeSet<UserId>,
}

impl DbPost {
    fn comment(&self, id: CommentId) -> Result<&DbComment, Error> {
        self.comments
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::NotFound(String::from("comment")))
    }

    fn comment_mut(&mut self, id: CommentId) -> Result<&mut DbComment, Error> {
        self.comments
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::NotFound(String::from("comment")))
    }
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer {
            users: BTreeMap::new(),
            sessions: HashMap::new(),
            posts: BTreeMap::new(),
        }
    }

    /// Return the name of user number `id`
    pub fn test_get_user_name(&self, id: usize) -> &str {
        self.users
            .values()
            .nth(id)
            .unwrap_or_else(|| panic!("getting user {id} among {}", self.users.len()))
    }

    /// Return the current number of users
    pub fn test_num_users(&self) -> usize {
        self.users.len()
    }

    pub fn admin_create_user(&mut self, u: NewUser) -> Result<(), Error> {
        u.validate()?;

        if self.users.values().any(|name| *name == u.name) {
            return Err(Error::NameAlreadyUsed(u.name));
        }

        match self.users.entry(u.id) {
            btree_map::Entry::Occupied(_) => Err(Error::UuidAlreadyUsed(u.id.0)),
            btree_map::Entry::Vacant(entry) => {
                entry.insert(u.name);
                Ok(())
            }
        }
    }

    pub fn admin_create_post(&mut self, p: NewPost) -> Result<(), Error> {
        p.validate()?;

        match self.posts.entry(p.id) {
            btree_map::Entry::Occupied(_) => Err(Error::UuidAlreadyUsed(p.id.0)),
            btree_map::Entry::Vacant(entry) => {
                entry.insert(DbPost {
                    title: p.title,
                    body: p.body,
                    comments: Vec::new(),
                });
                Ok(())
            }
        }
    }

    pub fn auth(&mut self, s: NewSession) -> Result<AuthToken, Error> {
        s.validate()?;
        let uid = self
            .users
            .iter()
            .find(|(_, name)| **name == s.user)
            .map(|(uid, _)| *uid)
            .ok_or(Error::PermissionDenied)?;
        let tok = AuthToken(Uuid::new_v4());
        self.sessions.insert(tok, uid);
        Ok(tok)
    }

    fn resolve(&self, tok: AuthToken) -> Result<UserId, Error> {
        self.sessions
            .get(&tok)
            .copied()
            .ok_or(Error::PermissionDenied)
    }

    pub fn unauth(&mut self, tok: AuthToken) -> Result<(), Error> {
        self.resolve(tok)?;
        self.sessions.remove(&tok);
        Ok(())
    }

    pub fn whoami(&self, tok: AuthToken) -> Result<UserId, Error> {
        self.resolve(tok)
    }

    fn user(&self, id: UserId) -> User {
        User {
            id,
            name: self.users.get(&id).cloned().unwrap_or_default(),
        }
    }

    fn render(&self, c: &DbComment, viewer: UserId) -> Comment {
        Comment {
            id: c.id,
            message: c.message.clone(),
            parent_id: c.parent_id,
            created_at: c.created_at,
            user: self.user(c.owner),
            like_count: c.likes.len() as u64,
            liked_by_me: c.likes.contains(&viewer),
        }
    }

    pub fn list_posts(&self, tok: AuthToken) -> Result<Vec<PostSummary>, Error> {
        self.resolve(tok)?;
        let mut res = self
            .posts
            .iter()
            .map(|(id, p)| PostSummary {
                id: *id,
                title: p.title.clone(),
            })
            .collect::<Vec<_>>();
        res.sort_by(|a, b| (&a.title, a.id).cmp(&(&b.title, b.id)));
        Ok(res)
    }

    pub fn get_post(&self, tok: AuthToken, post: PostId) -> Result<Post, Error> {
        let viewer = self.resolve(tok)?;
        let p = self
            .posts
            .get(&post)
            .ok_or_else(|| Error::NotFound(String::from("post")))?;
        Ok(Post {
            title: p.title.clone(),
            body: p.body.clone(),
            comments: p
                .comments
                .iter()
                .rev()
                .map(|c| self.render(c, viewer))
                .collect(),
        })
    }

    pub fn create_comment(
        &mut self,
        tok: AuthToken,
        post: PostId,
        c: NewComment,
    ) -> Result<Comment, Error> {
        let owner = self.resolve(tok)?;
        c.validate()?;
        let p = self
            .posts
            .get_mut(&post)
            .ok_or_else(|| Error::NotFound(String::from("post")))?;
        if let Some(parent) = c.parent_id {
            if p.comment(parent).is_err() {
                return Err(Error::NotFound(String::from("parent comment")));
            }
        }
        p.comments.push(DbComment {
            id: CommentId(Uuid::new_v4()),
            parent_id: c.parent_id,
            message: c.message,
            created_at: chrono::Utc::now(),
            owner,
            likes: BTreeSet::new(),
        });
        let created = &self.posts[&post].comments;
        Ok(self.render(&created[created.len() - 1], owner))
    }

    pub fn update_comment(
        &mut self,
        tok: AuthToken,
        post: PostId,
        comment: CommentId,
        u: UpdateComment,
    ) -> Result<CommentMessage, Error> {
        let uid = self.resolve(tok)?;
        u.validate()?;
        let c = self
            .posts
            .get_mut(&post)
            .ok_or_else(|| Error::NotFound(String::from("comment")))?
            .comment_mut(comment)?;
        if c.owner != uid {
            return Err(Error::PermissionDenied);
        }
        c.message = u.message;
        Ok(CommentMessage {
            message: c.message.clone(),
        })
    }

    pub fn delete_comment(
        &mut self,
        tok: AuthToken,
        post: PostId,
        comment: CommentId,
    ) -> Result<DeletedComment, Error> {
        let uid = self.resolve(tok)?;
        let p = self
            .posts
            .get_mut(&post)
            .ok_or_else(|| Error::NotFound(String::from("comment")))?;
        if p.comment(comment)?.owner != uid {
            return Err(Error::PermissionDenied);
        }

        // Replies go away along with their parent
        let mut doomed = BTreeSet::from([comment]);
        loop {
            let before = doomed.len();
            for c in p.comments.iter() {
                if c.parent_id.map(|parent| doomed.contains(&parent)).unwrap_or(false) {
                    doomed.insert(c.id);
                }
            }
            if doomed.len() == before {
                break;
            }
        }
        p.comments.retain(|c| !doomed.contains(&c.id));
        Ok(DeletedComment { id: comment })
    }

    pub fn toggle_like(
        &mut self,
        tok: AuthToken,
        post: PostId,
        comment: CommentId,
    ) -> Result<LikeToggled, Error> {
        let uid = self.resolve(tok)?;
        let c = self
            .posts
            .get_mut(&post)
            .ok_or_else(|| Error::NotFound(String::from("comment")))?
            .comment_mut(comment)?;
        let added_like = match c.likes.remove(&uid) {
            true => false,
            false => c.likes.insert(uid),
        };
        Ok(LikeToggled { added_like })
    }
}

impl Default for MockServer {
    fn default() -> MockServer {
        MockServer::new()
    }
}
