use std::fmt::Write;

use natter_client::{api::Comment, CommentTree, ParentKey, PostContext, ViewState};

fn render_comment(out: &mut String, c: &Comment, depth: usize) {
    let indent = "  ".repeat(depth);
    let liked = if c.liked_by_me { ", liked by you" } else { "" };
    let _ = writeln!(
        out,
        "{indent}* {} on {} ({} likes{liked}) [{}]",
        c.user.name,
        c.created_at.format("%Y-%m-%d %H:%M"),
        c.like_count,
        c.id.0,
    );
    for line in c.message.lines() {
        let _ = writeln!(out, "{indent}  {line}");
    }
}

fn render_replies(out: &mut String, tree: &CommentTree, parent: ParentKey, depth: usize) {
    for c in tree.replies(parent) {
        render_comment(out, c, depth);
        render_replies(out, tree, Some(c.id), depth + 1);
    }
}

/// Renders the comments reachable from the roots, each reply indented under
/// its parent
pub fn render_tree(tree: &CommentTree) -> String {
    let mut out = String::new();
    render_replies(&mut out, tree, None, 0);
    out
}

pub fn render_post(post: &PostContext) -> String {
    let mut out = format!("# {}\n\n{}\n\n", post.title, post.body);
    match post.tree.root_comments().is_empty() {
        true => out.push_str("No comments yet\n"),
        false => out.push_str(&render_tree(&post.tree)),
    }
    out
}

pub fn render_state(state: &ViewState) -> String {
    match state {
        ViewState::Idle => String::new(),
        ViewState::Loading => String::from("Loading...\n"),
        ViewState::Failed(msg) => format!("Error: {msg}\n"),
        ViewState::Loaded(post) => render_post(post),
    }
}
