use chrono::{Duration, TimeZone, Utc};
use rand::{seq::SliceRandom, Rng};
use uuid::Uuid;

const NUM_USERS: usize = 5;
const NUM_POSTS: usize = 10;
const POST_BODY_LEN: usize = 60;

const NUM_COMMENTS: usize = 300;
const COMMENT_MAX_WORDS: usize = 30;
const REPLY_PROBABILITY: f64 = 0.6;

const NUM_LIKES: usize = 500;

fn gen_n_items(table: &str, n: usize, mut f: impl FnMut(usize) -> String) {
    println!("INSERT INTO {} VALUES", table);
    for i in 0..n {
        if i != 0 {
            println!(",");
        }
        print!("    {}", f(i));
    }
    println!();
    println!("ON CONFLICT DO NOTHING;");
}

fn blob(id: &Uuid) -> String {
    format!("X'{}'", id.simple())
}

fn text(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn main() {
    let mut rng = rand::thread_rng();

    // Generate users
    let mut users = Vec::new();
    gen_n_items("users (id, name)", NUM_USERS, |i| {
        let uuid = Uuid::new_v4();
        users.push(uuid);
        format!("({}, 'user{}')", blob(&uuid), i)
    });

    // Generate posts
    let mut posts = Vec::new();
    gen_n_items("posts (id, title, body)", NUM_POSTS, |_| {
        let uuid = Uuid::new_v4();
        posts.push(uuid);
        format!(
            "({}, {}, {})",
            blob(&uuid),
            text(&lipsum::lipsum_title()),
            text(&lipsum::lipsum_words(POST_BODY_LEN)),
        )
    });

    // Generate comments, each reply coming after the comment it answers
    let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    let mut comments: Vec<(Uuid, Uuid)> = Vec::new();
    gen_n_items(
        "comments (id, post_id, parent_id, owner_id, message, created_at)",
        NUM_COMMENTS,
        |i| {
            let uuid = Uuid::new_v4();
            let post = *posts.choose(&mut rng).unwrap();
            let siblings = comments
                .iter()
                .filter(|(_, p)| *p == post)
                .map(|(c, _)| *c)
                .collect::<Vec<_>>();
            let parent = match rng.gen_bool(REPLY_PROBABILITY) {
                true => siblings.choose(&mut rng).copied(),
                false => None,
            };
            comments.push((uuid, post));
            let date = start + Duration::minutes(i as i64 * 7);
            format!(
                "({}, {}, {}, {}, {}, '{}')",
                blob(&uuid),
                blob(&post),
                parent.as_ref().map(blob).unwrap_or_else(|| String::from("NULL")),
                blob(users.choose(&mut rng).unwrap()),
                text(&lipsum::lipsum_words(rng.gen_range(1..=COMMENT_MAX_WORDS))),
                date.to_rfc3339(),
            )
        },
    );

    // Generate likes
    gen_n_items("likes (user_id, comment_id)", NUM_LIKES, |_| {
        format!(
            "({}, {})",
            blob(users.choose(&mut rng).unwrap()),
            blob(&comments.choose(&mut rng).unwrap().0),
        )
    });
}
