//! Comment model and thread assembly.
//!
//! Comments are stored flat with an optional parent key. Threads are rebuilt
//! per read from an arena indexed by parent, so no record ever holds a live
//! reference to another.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::UserSummary;

/// A comment on a post, optionally replying to another comment on the same post.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub body: String,
    pub author: UserSummary,
    pub post_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub like_count: i64,
    pub is_accepted: bool,
    pub is_edited: bool,
    pub created_at: String,
    pub updated_at: String,
    /// Set when the comment was removed. Removed comments only appear as
    /// tombstones above live replies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
}

impl Comment {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A comment with its replies nested beneath it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}

/// Request body for creating a comment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    #[serde(default, alias = "content")]
    pub body: String,
    #[serde(default)]
    pub post_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// Request body for editing a comment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCommentRequest {
    #[serde(default, alias = "content")]
    pub body: String,
}

/// Deepest reply level that nests. Replies below it are listed flat, in
/// thread order, under their ancestor at this level.
pub const MAX_THREAD_DEPTH: usize = 32;

/// Assemble threads from a post's comments.
///
/// `comments` must be ordered oldest first. Replies keep that order at every
/// level; top-level threads come back newest first. A removed comment is kept
/// as a tombstone with an empty body while it still has live replies below
/// it, and dropped otherwise.
///
/// The walk uses explicit stacks, so arbitrarily long reply chains never
/// recurse, and the returned tree is at most `MAX_THREAD_DEPTH + 1` levels
/// deep.
pub fn build_comment_tree(comments: Vec<Comment>) -> Vec<CommentNode> {
    let count = comments.len();

    let index_of: HashMap<&str, usize> = comments
        .iter()
        .enumerate()
        .map(|(idx, comment)| (comment.id.as_str(), idx))
        .collect();

    let mut roots = Vec::new();
    let mut kids: Vec<Vec<usize>> = vec![Vec::new(); count];
    for (idx, comment) in comments.iter().enumerate() {
        match comment.parent_id.as_deref() {
            None => roots.push(idx),
            // Replies to a comment outside this post are never reached.
            Some(parent) => {
                if let Some(&parent_idx) = index_of.get(parent) {
                    kids[parent_idx].push(idx);
                }
            }
        }
    }
    drop(index_of);

    // Pre-order from the roots. A subtree occupies a contiguous run of
    // `order` right after its root.
    let mut depth = vec![0usize; count];
    let mut seen = vec![false; count];
    let mut order = Vec::with_capacity(count);
    let mut stack: Vec<usize> = roots.iter().rev().copied().collect();
    while let Some(idx) = stack.pop() {
        if std::mem::replace(&mut seen[idx], true) {
            continue;
        }
        order.push(idx);
        for &kid in kids[idx].iter().rev() {
            if !seen[kid] {
                depth[kid] = depth[idx] + 1;
                stack.push(kid);
            }
        }
    }

    // Replies come after their parent in pre-order, so a reverse pass sees
    // every reply before the comment it answers.
    let mut visible = vec![false; count];
    for &idx in order.iter().rev() {
        let live_below = kids[idx].iter().any(|&kid| visible[kid]);
        visible[idx] = !comments[idx].is_deleted() || live_below;
    }

    let mut arena: Vec<Option<Comment>> = comments.into_iter().map(Some).collect();
    let mut built: Vec<Option<CommentNode>> = (0..count).map(|_| None).collect();

    for pos in (0..order.len()).rev() {
        let idx = order[pos];
        if !visible[idx] || depth[idx] > MAX_THREAD_DEPTH {
            continue;
        }
        let Some(comment) = take_visible(&mut arena, idx) else {
            continue;
        };

        let replies = if depth[idx] < MAX_THREAD_DEPTH {
            kids[idx]
                .iter()
                .filter_map(|&kid| built[kid].take())
                .collect()
        } else {
            order[pos + 1..]
                .iter()
                .take_while(|&&below| depth[below] > MAX_THREAD_DEPTH)
                .filter(|&&below| visible[below])
                .filter_map(|&below| take_visible(&mut arena, below))
                .map(|comment| CommentNode {
                    comment,
                    replies: Vec::new(),
                })
                .collect()
        };

        built[idx] = Some(CommentNode { comment, replies });
    }

    let mut threads: Vec<CommentNode> = roots
        .iter()
        .filter_map(|&idx| built[idx].take())
        .collect();
    threads.reverse();
    threads
}

/// Move a comment out of the arena, blanking the body of a removed one.
fn take_visible(arena: &mut [Option<Comment>], idx: usize) -> Option<Comment> {
    let mut comment = arena.get_mut(idx)?.take()?;
    if comment.is_deleted() {
        comment.body.clear();
    }
    Some(comment)
}
