//! HTML document handed to the downstream storage pipeline.
//!
//! The head carries the metadata extractors look for (site name, content
//! type, creator, description, published time); the body holds the oEmbed
//! fragment followed by the reconstructed thread, if any.

use maud::{html, Markup, PreEscaped, Render, DOCTYPE};

use super::models::{Thread, ThreadPost};
use super::status_url;
use crate::constants::TWITTER_SITE_NAME;
use crate::text::{format_timestamp, to_iso8601};

/// Content type advertised in `og:type`.
pub const TWEET_CONTENT_TYPE: &str = "tweet";

#[derive(Debug, Clone)]
pub struct DocumentMeta<'a> {
    pub title: &'a str,
    pub creator: &'a str,
    pub creator_url: Option<&'a str>,
    pub description: &'a str,
    pub published_time: Option<&'a str>,
}

/// Renders a reconstructed thread as a list of posts.
pub struct ThreadView<'a> {
    pub thread: &'a Thread,
    pub web_base_url: &'a str,
}

impl ThreadView<'_> {
    fn render_post(&self, entry: &ThreadPost) -> Markup {
        let post = &entry.post;
        let author = self.thread.author_of(post);
        let handle = author.map_or("i", |a| a.handle.as_str());
        let permalink = status_url(self.web_base_url, handle, &post.id);

        html! {
            article class="tweet" data-tweet-id=(post.id) {
                @if let Some(author) = author {
                    header class="tweet-author" {
                        @if let Some(avatar) = &author.avatar_url {
                            img class="tweet-avatar" src=(avatar) alt=(author.display_name);
                        }
                        strong { (author.display_name) }
                        " "
                        span class="tweet-handle" { "@" (author.handle) }
                    }
                }
                p class="tweet-text" { (post.text) }
                @for media in &entry.media {
                    @if let Some(full) = &media.url {
                        a href=(full) {
                            img class="tweet-media" src=(media.preview_url) data-media-type=(media.kind);
                        }
                    } @else {
                        img class="tweet-media" src=(media.preview_url) data-media-type=(media.kind);
                    }
                }
                footer {
                    a href=(permalink) {
                        time datetime=(to_iso8601(post.created_at)) { (format_timestamp(post.created_at)) }
                    }
                }
            }
        }
    }
}

impl Render for ThreadView<'_> {
    fn render(&self) -> Markup {
        html! {
            @if !self.thread.is_empty() {
                section class="tweet-thread" {
                    @for entry in &self.thread.posts {
                        (self.render_post(entry))
                    }
                }
            }
        }
    }
}

/// Assemble the full document.
#[must_use]
pub fn render_document(
    meta: &DocumentMeta<'_>,
    embed_html: &str,
    thread: &Thread,
    web_base_url: &str,
) -> String {
    let view = ThreadView {
        thread,
        web_base_url,
    };

    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                meta property="og:site_name" content=(TWITTER_SITE_NAME);
                meta property="og:type" content=(TWEET_CONTENT_TYPE);
                meta property="dc:creator" content=(meta.creator);
                @if let Some(profile) = meta.creator_url {
                    link rel="author" href=(profile);
                }
                meta property="og:description" content=(meta.description);
                @if let Some(published) = meta.published_time {
                    meta property="article:published_time" content=(published);
                }
                title { (meta.title) }
            }
            body {
                div class="tweet-embed" { (PreEscaped(embed_html)) }
                (view)
            }
        }
    }
    .into_string()
}
