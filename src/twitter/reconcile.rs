//! Turn raw fetch output into a clean [`Thread`].
//!
//! Rules:
//! - posts are unique by id; on collision the instance with more media and
//!   referenced-post metadata wins, and on a tie the first-seen instance is
//!   kept (batches are passed in source priority order)
//! - posts are sorted by `created_at` ascending, ties by id ascending
//! - each post carries exactly the media its `attachment_media_keys` name
//! - each distinct author appears once

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use super::models::{Author, Media, Post, PostBatch, Thread, ThreadPost};

/// Reverse a newest-first batch (search results) into chronological order.
#[must_use]
pub fn from_newest_first(mut batch: PostBatch) -> PostBatch {
    batch.posts.reverse();
    batch
}

/// Merge batches into a thread for `conversation_id`.
///
/// Posts belonging to other conversations (quoted or referenced posts that
/// came back from a bulk lookup) are dropped.
#[must_use]
pub fn reconcile(conversation_id: &str, batches: Vec<PostBatch>) -> Thread {
    let mut posts: Vec<Post> = Vec::new();
    let mut index_by_id: HashMap<String, usize> = HashMap::new();
    let mut authors: HashMap<String, Author> = HashMap::new();
    let mut media: HashMap<String, Media> = HashMap::new();

    for batch in batches {
        for author in batch.authors {
            authors.entry(author.id.clone()).or_insert(author);
        }
        for item in batch.media {
            media.entry(item.key.clone()).or_insert(item);
        }
        for post in batch.posts {
            if post.conversation_id != conversation_id {
                continue;
            }
            match index_by_id.get(&post.id) {
                Some(&existing) => {
                    if post.metadata_density() > posts[existing].metadata_density() {
                        posts[existing] = post;
                    }
                }
                None => {
                    index_by_id.insert(post.id.clone(), posts.len());
                    posts.push(post);
                }
            }
        }
    }

    posts.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| compare_ids(&a.id, &b.id))
    });

    let thread_posts = posts
        .into_iter()
        .map(|post| {
            let attached = post
                .attachment_media_keys
                .iter()
                .filter_map(|key| media.get(key).cloned())
                .collect();
            ThreadPost {
                post,
                media: attached,
            }
        })
        .collect();

    with_referenced_authors(thread_posts, &authors)
}

/// Keep only posts whose author handle equals `handle` (case-insensitive).
/// Posts whose author could not be resolved are dropped too.
#[must_use]
pub fn retain_author(thread: Thread, handle: &str) -> Thread {
    let Thread { posts, authors } = thread;
    let posts = posts
        .into_iter()
        .filter(|entry| {
            authors
                .get(&entry.post.author_id)
                .is_some_and(|a| a.handle.eq_ignore_ascii_case(handle))
        })
        .collect();
    let authors: HashMap<String, Author> = authors.into_iter().collect();
    with_referenced_authors(posts, &authors)
}

fn with_referenced_authors(posts: Vec<ThreadPost>, authors: &HashMap<String, Author>) -> Thread {
    let mut referenced = BTreeMap::new();
    for entry in &posts {
        if let Some(author) = authors.get(&entry.post.author_id) {
            referenced
                .entry(author.id.clone())
                .or_insert_with(|| author.clone());
        }
    }
    Thread {
        posts,
        authors: referenced,
    }
}

/// Numeric order for snowflake ids, lexicographic otherwise.
fn compare_ids(a: &str, b: &str) -> Ordering {
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|c| c.is_ascii_digit());
    if numeric(a) && numeric(b) {
        let (a, b) = (a.trim_start_matches('0'), b.trim_start_matches('0'));
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    } else {
        a.cmp(b)
    }
}
