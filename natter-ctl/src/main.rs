use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use natter_client::{
    api::{AuthToken, CommentId, NewPost, NewUser, PostId, UserId, Uuid},
    HttpStore, PostView, SessionConfig, Store, ViewState,
};

mod render;

#[derive(structopt::StructOpt)]
struct Opt {
    #[structopt(short, long)]
    host: String,

    /// Name of the user to act as, for all non-admin commands
    #[structopt(short, long)]
    user: Option<String>,

    /// Give up on fetching a post after this many milliseconds
    #[structopt(long)]
    fetch_timeout_ms: Option<u64>,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(Debug, structopt::StructOpt)]
enum Command {
    /// Create a user (admin)
    CreateUser {
        /// Username
        name: String,
    },

    /// Create a post (admin)
    CreatePost { title: String, body: String },

    /// List all posts
    ListPosts,

    /// Show a post with its comment tree
    ShowPost { post: Uuid },

    /// Comment on a post
    Comment {
        post: Uuid,

        message: String,

        /// Comment to reply to
        #[structopt(long)]
        parent: Option<Uuid>,
    },

    /// Edit the message of one of your comments
    Edit {
        post: Uuid,
        comment: Uuid,
        message: String,
    },

    /// Delete one of your comments
    Delete { post: Uuid, comment: Uuid },

    /// Like a comment, or remove your like if it is already there
    Like { post: Uuid, comment: Uuid },
}

fn admin_token() -> anyhow::Result<AuthToken> {
    let tok =
        std::env::var("ADMIN_TOKEN").context("retrieving ADMIN_TOKEN environment variable")?;
    let tok = Uuid::try_parse(&tok).context("parsing ADMIN_TOKEN as an auth token")?;
    Ok(AuthToken(tok))
}

async fn admin_call<T: serde::Serialize>(
    host: &str,
    endpoint: &str,
    body: &T,
) -> anyhow::Result<()> {
    reqwest::Client::new()
        .post(format!("{}/api/admin/{}", host, endpoint))
        .json(body)
        .bearer_auth(admin_token()?.0)
        .send()
        .await
        .with_context(|| format!("sending {endpoint} request"))?
        .error_for_status()
        .with_context(|| format!("running {endpoint}"))?;
    Ok(())
}

async fn open_post(
    store: &HttpStore,
    post: Uuid,
    config: &SessionConfig,
) -> anyhow::Result<PostView> {
    let mut view = PostView::new();
    view.open(store, PostId(post), config).await;
    match view.state() {
        ViewState::Loaded(_) => Ok(view),
        ViewState::Failed(msg) => bail!("fetching post {post}: {msg}"),
        state => bail!("fetching post {post} did not complete: {state:?}"),
    }
}

fn print_post(view: &PostView) {
    print!("{}", render::render_state(view.state()));
}

async fn run_as_user(
    store: &HttpStore,
    cmd: Command,
    config: &SessionConfig,
) -> anyhow::Result<()> {
    match cmd {
        Command::CreateUser { .. } | Command::CreatePost { .. } => {
            bail!("{cmd:?} is an admin command")
        }
        Command::ListPosts => {
            for p in store.list_posts().await.context("listing posts")? {
                println!("{} {}", p.id.0, p.title);
            }
        }
        Command::ShowPost { post } => {
            print_post(&open_post(store, post, config).await?);
        }
        Command::Comment {
            post,
            message,
            parent,
        } => {
            let mut view = open_post(store, post, config).await?;
            let created = view
                .create_comment(store, parent.map(CommentId), message)
                .await
                .context("creating comment")?;
            println!("Created comment {}\n", created.id.0);
            print_post(&view);
        }
        Command::Edit {
            post,
            comment,
            message,
        } => {
            let mut view = open_post(store, post, config).await?;
            view.update_comment(store, CommentId(comment), message)
                .await
                .context("editing comment")?;
            print_post(&view);
        }
        Command::Delete { post, comment } => {
            let mut view = open_post(store, post, config).await?;
            view.delete_comment(store, CommentId(comment))
                .await
                .context("deleting comment")?;
            print_post(&view);
        }
        Command::Like { post, comment } => {
            let mut view = open_post(store, post, config).await?;
            let added = view
                .toggle_like(store, CommentId(comment))
                .await
                .context("toggling like")?;
            println!("{}\n", if added { "Liked" } else { "Unliked" });
            print_post(&view);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let opt = <Opt as structopt::StructOpt>::from_args();
    let config = SessionConfig {
        fetch_timeout: opt.fetch_timeout_ms.map(Duration::from_millis),
    };

    match opt.cmd {
        Command::CreateUser { name } => {
            let id = UserId(Uuid::new_v4());
            admin_call(&opt.host, "create-user", &NewUser::new(id, name)).await?;
            println!("{}", id.0);
        }
        Command::CreatePost { title, body } => {
            let id = PostId(Uuid::new_v4());
            admin_call(&opt.host, "create-post", &NewPost { id, title, body }).await?;
            println!("{}", id.0);
        }
        cmd => {
            let user = opt
                .user
                .ok_or_else(|| anyhow!("--user is required for {cmd:?}"))?;
            let store = HttpStore::login(opt.host, user)
                .await
                .context("logging in")?;
            let res = run_as_user(&store, cmd, &config).await;
            store.logout().await.context("logging out")?;
            res?;
        }
    }

    Ok(())
}
