use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Back-reference from a post to another post (reply, quote, retweet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencedPost {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

/// A single post as returned by a source. Never mutated after fetching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub conversation_id: String,
    pub referenced_posts: Vec<ReferencedPost>,
    pub attachment_media_keys: Vec<String>,
}

impl Post {
    /// How much cross-referenced metadata this instance carries.
    #[must_use]
    pub fn metadata_density(&self) -> usize {
        self.attachment_media_keys.len() + self.referenced_posts.len()
    }

    #[must_use]
    pub fn is_conversation_root(&self) -> bool {
        self.conversation_id == self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    pub id: String,
    pub display_name: String,
    pub handle: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Media {
    pub key: String,
    pub kind: String,
    pub preview_url: String,
    pub url: Option<String>,
}

/// Raw output of one fetch: posts plus the authors and media they reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostBatch {
    pub posts: Vec<Post>,
    pub authors: Vec<Author>,
    pub media: Vec<Media>,
}

impl PostBatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    #[must_use]
    pub fn author(&self, author_id: &str) -> Option<&Author> {
        self.authors.iter().find(|a| a.id == author_id)
    }

    /// Append another batch to this one without deduplicating.
    pub fn extend(&mut self, other: Self) {
        self.posts.extend(other.posts);
        self.authors.extend(other.authors);
        self.media.extend(other.media);
    }
}

/// A post together with the media it attaches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadPost {
    pub post: Post,
    pub media: Vec<Media>,
}

/// Reconstructed conversation: ascending by creation time, unique ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Thread {
    pub posts: Vec<ThreadPost>,
    /// One entry per distinct author id referenced by `posts`.
    pub authors: BTreeMap<String, Author>,
}

impl Thread {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.posts.len()
    }

    #[must_use]
    pub fn author_of(&self, post: &Post) -> Option<&Author> {
        self.authors.get(&post.author_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.posts.iter().map(|p| p.post.id.as_str())
    }
}
