#![cfg(test)]

use async_recursion::async_recursion;
use bolero::generator::TypeGenerator;
use axum::{
    extract::FromRequestParts,
    http::{self, request},
};
use natter_api::{
    Comment, CommentId, CommentMessage, Error as ApiError, NewComment, NewPost, NewSession,
    NewUser, Post, PostId, PostSummary, UpdateComment, UserId, STUB_UUID,
};
use natter_mock_server::MockServer;
use std::{cmp, fmt::Debug, ops::RangeTo, panic::AssertUnwindSafe, path::Path};
use tower::{Service, ServiceExt};

use crate::{extractors::*, *};

macro_rules! do_tokio_test {
    ( $name:ident, $typ:ty, $fn:expr ) => {
        #[test]
        fn $name() {
            let runtime = AssertUnwindSafe(
                tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed initializing tokio runtime"),
            );
            bolero::check!()
                .with_type::<$typ>()
                .cloned()
                .for_each(move |v| {
                    let () = runtime.block_on($fn(v));
                })
        }
    };
}

async fn create_test_pool(dir: &Path) -> SqlitePool {
    let path = dir.join("test.db");
    let path = path.to_str().expect("tempdir is not valid utf8");
    let pool = create_sqlx_pool(&format!("sqlite://{path}?mode=rwc"))
        .await
        .expect("creating sqlx pool");
    MIGRATOR
        .run(&mut *pool.acquire().await.expect("getting migrator connection"))
        .await
        .expect("failed applying migrations");
    pool
}

macro_rules! do_sqlx_test {
    ( $name:ident, $gen:expr, $fn:expr ) => {
        #[test]
        fn $name() {
            if std::env::var("RUST_LOG").is_ok() {
                tracing_subscriber::fmt::init();
            }
            let datadir = tempfile::tempdir().expect("creating tempdir");
            let runtime = AssertUnwindSafe(
                tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed initializing tokio runtime"),
            );
            let pool = AssertUnwindSafe(runtime.block_on(create_test_pool(datadir.path())));
            bolero::check!()
                .with_generator($gen)
                .cloned()
                .for_each(move |v| {
                    let pool = pool.clone();
                    // run the test
                    let idle_before = pool.num_idle();
                    let v_str = format!("{v:?}");
                    let idle_after_res: Result<usize, _> = {
                        let pool = pool.clone();
                        std::panic::catch_unwind(AssertUnwindSafe(|| {
                            runtime.block_on(async move {
                                let () = $fn(pool.clone(), v).await;
                                let mut idle_after = pool.num_idle();
                                let wait_release_since = std::time::Instant::now();
                                while idle_after < idle_before
                                    && wait_release_since.elapsed()
                                        <= std::time::Duration::from_secs(1)
                                {
                                    tokio::task::yield_now().await;
                                    idle_after = pool.num_idle();
                                }
                                idle_after
                            })
                        }))
                    };
                    runtime.block_on(async move {
                        // cleanup
                        let mut conn =
                            pool.acquire().await.expect("getting db cleanup connection");
                        sqlx::query(include_str!("../reset-test-db.sql"))
                            .execute(&mut *conn)
                            .await
                            .expect("failed cleaning up database");
                    });
                    // resume the panics
                    match idle_after_res {
                        Err(e) => std::panic::resume_unwind(e),
                        Ok(idle_after) => assert!(
                            idle_after >= idle_before,
                            "test {} held onto pool after exiting test: before there were {idle_before} connections, and after there were {idle_after} with value {v_str}",
                            stringify!($name)
                        ),
                    }
                });
        }
    };
}

do_tokio_test!(fuzz_preauth_extractor, String, |token| async move {
    if let Ok(req) = http::Request::builder()
        .method(http::Method::GET)
        .uri("/")
        .header(http::header::AUTHORIZATION, token)
        .body(())
    {
        let mut req = req.into_parts().0;
        let res = PreAuth::from_request_parts(&mut req, &()).await;
        match res {
            Ok(_) => (),
            Err(Error::Api(ApiError::PermissionDenied)) => (),
            Err(e) => panic!("got unexpected error: {e}"),
        }
    }
});

/// Ids, names and messages are kept small so that conflicts, invalid names
/// and empty messages actually happen
#[derive(Clone, Debug, bolero::generator::TypeGenerator)]
enum FuzzOp {
    CreateUser {
        id: u8,
        #[generator(bolero::generator::gen_with::<String>().len(0..4usize))]
        name: String,
    },
    CreatePost {
        id: u8,
        #[generator(bolero::generator::gen_with::<String>().len(0..4usize))]
        title: String,
        #[generator(bolero::generator::gen_with::<String>().len(0..4usize))]
        body: String,
    },
    Auth {
        uid: usize,
    },
    Unauth {
        sid: usize,
    },
    Whoami {
        sid: usize,
    },
    ListPosts {
        sid: usize,
    },
    GetPost {
        sid: usize,
        pid: usize,
    },
    CreateComment {
        sid: usize,
        pid: usize,
        parent: Option<usize>,
        #[generator(bolero::generator::gen_with::<String>().len(0..4usize))]
        message: String,
    },
    UpdateComment {
        sid: usize,
        cid: usize,
        pid: Option<usize>,
        #[generator(bolero::generator::gen_with::<String>().len(0..4usize))]
        message: String,
    },
    DeleteComment {
        sid: usize,
        cid: usize,
        pid: Option<usize>,
    },
    ToggleLike {
        sid: usize,
        cid: usize,
        pid: Option<usize>,
    },
}

async fn call<Req, Resp>(
    app: &mut Router,
    req: request::Request<axum::body::Body>,
    req_body: &Req,
) -> Result<Resp, ApiError>
where
    Req: Debug,
    Resp: 'static + for<'de> serde::Deserialize<'de>,
{
    app.ready().await.expect("waiting for app to be ready");
    let resp = app.call(req).await.expect("running request");
    let status = resp.status();
    let body = hyper::body::to_bytes(resp.into_body())
        .await
        .expect("recovering resp bytes");
    if status == http::StatusCode::OK {
        if std::any::TypeId::of::<Resp>() == std::any::TypeId::of::<()>() {
            // the server returns an empty string in this situation, which does not parse properly with serde_json
            return Ok(serde_json::from_slice(b"null").unwrap());
        } else {
            return Ok(serde_json::from_slice(&body).unwrap_or_else(|err| {
                panic!(
                    r#"
                        Failed parsing resp body!

                        The error is the following:
                        ---
                        {err}
                        ---

                        Response body is:
                        ---
                        {body:?}
                        ---

                        Request was:
                        ---
                        {req_body:?}
                        ---
                    "#
                )
            }));
        }
    }
    Err(ApiError::parse(&body)
        .unwrap_or_else(|err| panic!("parsing error response body {err}, body is {body:?}")))
}

async fn run_on_app<Req, Resp>(
    app: &mut Router,
    method: &str,
    uri: &str,
    token: Option<Uuid>,
    body: &Req,
) -> Result<Resp, ApiError>
where
    Req: Debug + serde::Serialize,
    Resp: 'static + for<'de> serde::Deserialize<'de>,
{
    let req = request::Builder::new()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json");
    let req = match token {
        Some(token) => req.header(http::header::AUTHORIZATION, format!("bearer {token}")),
        None => req,
    };
    let req = req
        .body(axum::body::Body::from(
            serde_json::to_vec(body).expect("serializing request body to json"),
        ))
        .expect("building request");
    call(app, req, body).await
}

fn compare<T>(name: &str, app_res: Result<T, ApiError>, mock_res: Result<T, ApiError>)
where
    T: Debug + PartialEq,
{
    assert_eq!(
        app_res, mock_res,
        "app and mock did not return the same result for {name}"
    );
}

fn resize_int(fuzz_id: usize, RangeTo { end }: RangeTo<usize>) -> Option<usize> {
    if end == 0 {
        return None;
    }
    let bucket_size = cmp::max(1, usize::MAX / end); // in case we rounded to 0
    let id = fuzz_id / bucket_size;
    Some(cmp::min(id, end - 1)) // in case id was actually over end - 1 due to rounding
}

struct Session {
    app: AuthToken,
    mock: AuthToken,
}

/// The same comment, as named by the app and by the mock
struct CommentIds {
    app: CommentId,
    mock: CommentId,
    post: PostId,
}

#[derive(Clone, Copy)]
enum Side {
    App,
    Mock,
}

/// A comment stripped of what legitimately differs between app and mock:
/// comment ids are replaced by their creation index, and dates are dropped
#[derive(Debug, PartialEq)]
struct SeenComment {
    idx: Option<usize>,
    parent_idx: Option<Option<usize>>,
    message: String,
    author: String,
    like_count: u64,
    liked_by_me: bool,
}

struct ComparativeFuzzer {
    admin_token: Uuid,
    app: Router,
    mock: MockServer,
    sessions: Vec<Session>,
    posts: Vec<PostId>,
    comments: Vec<CommentIds>,
}

impl ComparativeFuzzer {
    fn new(pool: SqlitePool) -> ComparativeFuzzer {
        let admin_token = Uuid::new_v4();
        let app = app(pool, Some(AuthToken(admin_token)));
        ComparativeFuzzer {
            admin_token,
            app,
            mock: MockServer::new(),
            sessions: Vec::new(),
            posts: Vec::new(),
            comments: Vec::new(),
        }
    }

    fn comment_idx(&self, side: Side, id: CommentId) -> Option<usize> {
        self.comments.iter().position(|c| match side {
            Side::App => c.app == id,
            Side::Mock => c.mock == id,
        })
    }

    fn see(&self, side: Side, c: Comment) -> SeenComment {
        SeenComment {
            idx: self.comment_idx(side, c.id),
            parent_idx: c.parent_id.map(|p| self.comment_idx(side, p)),
            message: c.message,
            author: c.user.name,
            like_count: c.like_count,
            liked_by_me: c.liked_by_me,
        }
    }

    fn see_post(&self, side: Side, p: Post) -> (String, String, Vec<SeenComment>) {
        let comments = p.comments.into_iter().map(|c| self.see(side, c)).collect();
        (p.title, p.body, comments)
    }

    fn post(&self, pid: usize) -> PostId {
        resize_int(pid, ..self.posts.len())
            .map(|i| self.posts[i])
            .unwrap_or_else(PostId::stub)
    }

    /// Resolves the comment to act on, along with the post it is looked up in
    fn comment(&self, cid: usize, pid: Option<usize>) -> (PostId, CommentId, CommentId) {
        match resize_int(cid, ..self.comments.len()) {
            None => (
                self.post(pid.unwrap_or(0)),
                CommentId(STUB_UUID),
                CommentId(STUB_UUID),
            ),
            Some(i) => {
                let c = &self.comments[i];
                let post = pid.map(|p| self.post(p)).unwrap_or(c.post);
                (post, c.app, c.mock)
            }
        }
    }

    /// Returns the session number `sid`, opening one first if there is none
    #[async_recursion]
    async fn session(&mut self, sid: usize) -> usize {
        match resize_int(sid, ..self.sessions.len()) {
            Some(s) => s,
            None => {
                self.execute_fuzz_op(FuzzOp::Auth { uid: sid }).await;
                self.sessions.len() - 1
            }
        }
    }

    #[async_recursion]
    async fn execute_fuzz_op(&mut self, op: FuzzOp) {
        match op {
            FuzzOp::CreateUser { id, name } => {
                let new_user = NewUser::new(UserId(Uuid::from_u128(id as u128)), name);
                compare(
                    "CreateUser",
                    run_on_app(
                        &mut self.app,
                        "POST",
                        "/api/admin/create-user",
                        Some(self.admin_token),
                        &new_user,
                    )
                    .await,
                    self.mock.admin_create_user(new_user),
                )
            }
            FuzzOp::CreatePost { id, title, body } => {
                let new_post = NewPost {
                    id: PostId(Uuid::from_u128(id as u128)),
                    title,
                    body,
                };
                let app_res = run_on_app(
                    &mut self.app,
                    "POST",
                    "/api/admin/create-post",
                    Some(self.admin_token),
                    &new_post,
                )
                .await;
                let mock_res = self.mock.admin_create_post(new_post.clone());
                if mock_res.is_ok() {
                    self.posts.push(new_post.id);
                }
                compare("CreatePost", app_res, mock_res);
            }
            FuzzOp::Auth { uid } => {
                if let Some(uid) = resize_int(uid, ..self.mock.test_num_users()) {
                    let session = NewSession {
                        user: String::from(self.mock.test_get_user_name(uid)),
                    };
                    let app_tok =
                        run_on_app(&mut self.app, "POST", "/api/auth", None, &session).await;
                    let mock_tok = self.mock.auth(session);
                    if let (&Ok(app), &Ok(mock)) = (&app_tok, &mock_tok) {
                        self.sessions.push(Session { app, mock });
                    }
                    compare("Auth", app_tok.map(|_| ()), mock_tok.map(|_| ()));
                } else {
                    self.execute_fuzz_op(FuzzOp::CreateUser {
                        id: 0,
                        name: String::from("user"),
                    })
                    .await;
                    self.execute_fuzz_op(FuzzOp::Auth { uid }).await;
                }
            }
            FuzzOp::Unauth { sid } => {
                let s = self.session(sid).await;
                let Session { app, mock } = self.sessions[s];
                compare(
                    "Unauth",
                    run_on_app(&mut self.app, "POST", "/api/unauth", Some(app.0), &()).await,
                    self.mock.unauth(mock),
                );
            }
            FuzzOp::Whoami { sid } => {
                let s = self.session(sid).await;
                let Session { app, mock } = self.sessions[s];
                compare(
                    "Whoami",
                    run_on_app(&mut self.app, "GET", "/api/whoami", Some(app.0), &()).await,
                    self.mock.whoami(mock),
                );
            }
            FuzzOp::ListPosts { sid } => {
                let s = self.session(sid).await;
                let Session { app, mock } = self.sessions[s];
                compare::<Vec<PostSummary>>(
                    "ListPosts",
                    run_on_app(&mut self.app, "GET", "/api/posts", Some(app.0), &()).await,
                    self.mock.list_posts(mock),
                );
            }
            FuzzOp::GetPost { sid, pid } => {
                let s = self.session(sid).await;
                let Session { app, mock } = self.sessions[s];
                let post = self.post(pid);
                let app_res: Result<Post, _> = run_on_app(
                    &mut self.app,
                    "GET",
                    &format!("/api/posts/{}", post.0),
                    Some(app.0),
                    &(),
                )
                .await;
                let mock_res = self.mock.get_post(mock, post);
                compare(
                    "GetPost",
                    app_res.map(|p| self.see_post(Side::App, p)),
                    mock_res.map(|p| self.see_post(Side::Mock, p)),
                );
            }
            FuzzOp::CreateComment {
                sid,
                pid,
                parent,
                message,
            } => {
                let s = self.session(sid).await;
                let Session { app, mock } = self.sessions[s];
                let post = self.post(pid);
                let (app_parent, mock_parent) = match parent {
                    None => (None, None),
                    Some(parent) => {
                        let (_, app_parent, mock_parent) = self.comment(parent, None);
                        (Some(app_parent), Some(mock_parent))
                    }
                };
                let app_res: Result<Comment, _> = run_on_app(
                    &mut self.app,
                    "POST",
                    &format!("/api/posts/{}/comments", post.0),
                    Some(app.0),
                    &NewComment {
                        parent_id: app_parent,
                        message: message.clone(),
                    },
                )
                .await;
                let mock_res = self.mock.create_comment(
                    mock,
                    post,
                    NewComment {
                        parent_id: mock_parent,
                        message,
                    },
                );
                if let (Ok(a), Ok(m)) = (&app_res, &mock_res) {
                    self.comments.push(CommentIds {
                        app: a.id,
                        mock: m.id,
                        post,
                    });
                }
                compare(
                    "CreateComment",
                    app_res.map(|c| self.see(Side::App, c)),
                    mock_res.map(|c| self.see(Side::Mock, c)),
                );
            }
            FuzzOp::UpdateComment {
                sid,
                cid,
                pid,
                message,
            } => {
                let s = self.session(sid).await;
                let Session { app, mock } = self.sessions[s];
                let (post, app_comment, mock_comment) = self.comment(cid, pid);
                let update = UpdateComment { message };
                compare(
                    "UpdateComment",
                    run_on_app(
                        &mut self.app,
                        "PUT",
                        &format!("/api/posts/{}/comments/{}", post.0, app_comment.0),
                        Some(app.0),
                        &update,
                    )
                    .await,
                    self.mock
                        .update_comment(mock, post, mock_comment, update.clone()),
                );
            }
            FuzzOp::DeleteComment { sid, cid, pid } => {
                let s = self.session(sid).await;
                let Session { app, mock } = self.sessions[s];
                let (post, app_comment, mock_comment) = self.comment(cid, pid);
                let app_res: Result<natter_api::DeletedComment, _> = run_on_app(
                    &mut self.app,
                    "DELETE",
                    &format!("/api/posts/{}/comments/{}", post.0, app_comment.0),
                    Some(app.0),
                    &(),
                )
                .await;
                let mock_res = self.mock.delete_comment(mock, post, mock_comment);
                compare(
                    "DeleteComment",
                    app_res.map(|d| self.comment_idx(Side::App, d.id)),
                    mock_res.map(|d| self.comment_idx(Side::Mock, d.id)),
                );
            }
            FuzzOp::ToggleLike { sid, cid, pid } => {
                let s = self.session(sid).await;
                let Session { app, mock } = self.sessions[s];
                let (post, app_comment, mock_comment) = self.comment(cid, pid);
                compare(
                    "ToggleLike",
                    run_on_app(
                        &mut self.app,
                        "POST",
                        &format!(
                            "/api/posts/{}/comments/{}/toggle-like",
                            post.0, app_comment.0
                        ),
                        Some(app.0),
                        &(),
                    )
                    .await,
                    self.mock.toggle_like(mock, post, mock_comment),
                );
            }
        }
    }
}

do_sqlx_test!(
    compare_with_mock,
    bolero::generator::gen_with::<Vec<FuzzOp>>().len(1..100usize),
    |pool, test: Vec<FuzzOp>| async move {
        let mut fuzzer = ComparativeFuzzer::new(pool);
        for op in test {
            fuzzer.execute_fuzz_op(op).await;
        }
    }
);

#[test]
fn thread_lifecycle() {
    let datadir = tempfile::tempdir().expect("creating tempdir");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed initializing tokio runtime");
    runtime.block_on(async move {
        let pool = create_test_pool(datadir.path()).await;
        let mut fuzzer = ComparativeFuzzer::new(pool);
        let ops = vec![
            FuzzOp::CreateUser {
                id: 1,
                name: String::from("alice"),
            },
            FuzzOp::CreateUser {
                id: 2,
                name: String::from("bob"),
            },
            FuzzOp::CreatePost {
                id: 1,
                title: String::from("hi"),
                body: String::from("there"),
            },
            FuzzOp::Auth { uid: 0 },
            FuzzOp::Auth { uid: usize::MAX },
            FuzzOp::CreateComment {
                sid: 0,
                pid: 0,
                parent: None,
                message: String::from("root"),
            },
            FuzzOp::CreateComment {
                sid: usize::MAX,
                pid: 0,
                parent: Some(0),
                message: String::from("reply"),
            },
            FuzzOp::CreateComment {
                sid: 0,
                pid: 0,
                parent: Some(0),
                message: String::new(),
            },
            FuzzOp::ToggleLike {
                sid: usize::MAX,
                cid: 0,
                pid: None,
            },
            FuzzOp::UpdateComment {
                sid: usize::MAX,
                cid: 0,
                pid: None,
                message: String::from("not mine"),
            },
            FuzzOp::UpdateComment {
                sid: 0,
                cid: 0,
                pid: None,
                message: String::from("edited"),
            },
            FuzzOp::GetPost { sid: 0, pid: 0 },
            FuzzOp::GetPost {
                sid: usize::MAX,
                pid: 0,
            },
            FuzzOp::DeleteComment {
                sid: 0,
                cid: 0,
                pid: None,
            },
            FuzzOp::GetPost { sid: 0, pid: 0 },
            FuzzOp::ToggleLike {
                sid: 0,
                cid: usize::MAX,
                pid: None,
            },
            FuzzOp::Unauth { sid: 0 },
            FuzzOp::Whoami { sid: 0 },
            FuzzOp::ListPosts { sid: usize::MAX },
        ];
        for op in ops {
            fuzzer.execute_fuzz_op(op).await;
        }

        // The deletion took the reply away with the root
        let bob = fuzzer.sessions[1].mock;
        let post = fuzzer.posts[0];
        assert!(fuzzer.mock.get_post(bob, post).unwrap().comments.is_empty());
    });
}

fn run_with_test_pool<F, Fut>(f: F)
where
    F: FnOnce(SqlitePool) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let datadir = tempfile::tempdir().expect("creating tempdir");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed initializing tokio runtime");
    runtime.block_on(async move {
        let pool = create_test_pool(datadir.path()).await;
        f(pool).await
    });
}

#[test]
fn null_or_missing_message_is_required() {
    run_with_test_pool(|pool| async move {
        let admin = Uuid::new_v4();
        let mut app = app(pool, Some(AuthToken(admin)));
        let user = NewUser::new(UserId(Uuid::new_v4()), String::from("alice"));
        let post = NewPost {
            id: PostId(Uuid::new_v4()),
            title: String::from("title"),
            body: String::from("body"),
        };
        let res: Result<(), ApiError> = run_on_app(
            &mut app,
            "POST",
            "/api/admin/create-user",
            Some(admin),
            &user,
        )
        .await;
        res.expect("creating user");
        let res: Result<(), ApiError> = run_on_app(
            &mut app,
            "POST",
            "/api/admin/create-post",
            Some(admin),
            &post,
        )
        .await;
        res.expect("creating post");
        let session = NewSession {
            user: user.name.clone(),
        };
        let tok: AuthToken = run_on_app(&mut app, "POST", "/api/auth", None, &session)
            .await
            .expect("opening session");

        let comments = format!("/api/posts/{}/comments", post.id.0);
        for body in [
            serde_json::json!({ "parentId": null, "message": null }),
            serde_json::json!({ "parentId": null }),
        ] {
            let res: Result<Comment, ApiError> =
                run_on_app(&mut app, "POST", &comments, Some(tok.0), &body).await;
            assert_eq!(res, Err(ApiError::MessageRequired), "for {body}");
        }

        let created: Comment = run_on_app(
            &mut app,
            "POST",
            &comments,
            Some(tok.0),
            &NewComment {
                parent_id: None,
                message: String::from("hello"),
            },
        )
        .await
        .expect("creating comment");
        let comment = format!("{comments}/{}", created.id.0);
        for body in [serde_json::json!({ "message": null }), serde_json::json!({})] {
            let res: Result<CommentMessage, ApiError> =
                run_on_app(&mut app, "PUT", &comment, Some(tok.0), &body).await;
            assert_eq!(res, Err(ApiError::MessageRequired), "for {body}");
        }
    });
}

/// Creates a user, a post and a root comment directly in the database
async fn seed_comment(pool: &SqlitePool) -> (UserId, PostId, CommentId) {
    let mut conn = pool.acquire().await.expect("acquiring connection");
    let user = UserId(Uuid::new_v4());
    let post = PostId(Uuid::new_v4());
    db::create_user(&mut *conn, NewUser::new(user, String::from("alice")))
        .await
        .expect("creating user");
    db::create_post(
        &mut *conn,
        NewPost {
            id: post,
            title: String::from("title"),
            body: String::from("body"),
        },
    )
    .await
    .expect("creating post");
    let root = db::create_comment(
        &mut *conn,
        user,
        post,
        &NewComment {
            parent_id: None,
            message: String::from("root"),
        },
    )
    .await
    .expect("creating comment");
    (user, post, root.id)
}

#[test]
fn concurrent_like_toggles_each_flip_once() {
    run_with_test_pool(|pool| async move {
        let (user, post, comment) = seed_comment(&pool).await;
        let toggles = (0..16).map(|_| {
            let pool = pool.clone();
            async move {
                let mut conn = pool.acquire().await.expect("acquiring connection");
                db::toggle_like(&mut *conn, user, post, comment).await
            }
        });
        let added = futures::future::join_all(toggles)
            .await
            .into_iter()
            .map(|res| res.expect("toggling like").added_like)
            .filter(|added| *added)
            .count();
        assert_eq!(added, 8);

        let mut conn = pool.acquire().await.expect("acquiring connection");
        let post = db::fetch_post(&mut *conn, user, post)
            .await
            .expect("fetching post");
        assert_eq!(post.comments[0].like_count, 0);
        assert!(!post.comments[0].liked_by_me);
    });
}

#[test]
fn replies_racing_parent_deletion_are_not_found() {
    run_with_test_pool(|pool| async move {
        let (user, post, root) = seed_comment(&pool).await;
        let replies = (0..8).map(|i| {
            let pool = pool.clone();
            async move {
                let mut conn = pool.acquire().await.expect("acquiring connection");
                let reply = NewComment {
                    parent_id: Some(root),
                    message: format!("reply {i}"),
                };
                db::create_comment(&mut *conn, user, post, &reply).await
            }
        });
        let delete = async {
            let mut conn = pool.acquire().await.expect("acquiring connection");
            db::delete_comment(&mut *conn, user, post, root)
                .await
                .expect("deleting root");
        };
        let (results, ()) = tokio::join!(futures::future::join_all(replies), delete);
        for res in results {
            match res {
                Ok(_) => (),
                Err(Error::Api(ApiError::NotFound(what))) if what == "parent comment" => (),
                Err(e) => panic!("got unexpected error: {e}"),
            }
        }

        let mut conn = pool.acquire().await.expect("acquiring connection");
        let post = db::fetch_post(&mut *conn, user, post)
            .await
            .expect("fetching post");
        assert!(post.comments.is_empty());
    });
}
