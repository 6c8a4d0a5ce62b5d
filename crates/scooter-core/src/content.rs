//! # Content Store
//!
//! Posts and the feeds built from them.
//!
//! A post is three items:
//! - the primary row, keyed by post id
//! - a pointer in the author's partition, sorted by `{time}#{id}`
//! - a pointer in the global feed partition, sorted the same way
//!
//! The primary row and the author pointer are written first and surface
//! errors. The feed pointer is a secondary write. Readers hydrate pointers
//! into rows and skip pointers whose row is gone.
//!
//! ## Feeds
//!
//! The following feed is fan-out-on-read: the viewer's own posts plus up to
//! 20 posts from each of up to 500 followees, merged newest first and
//! truncated to 50. A viewer who follows no one gets the global feed.
//!
//! ## Author snapshots
//!
//! Each post carries the author's handle and avatar as of writing. With
//! `snapshot.refresh_on_read`, reads serve the current profile values and
//! rewrite stale snapshots with a compare-and-swap.

use crate::context::{Change, Context};
use crate::directory::{Directory, normalize_media_key};
use crate::fanout::Fanout;
use crate::graph::Graph;
use crate::primitives::{FEED_LIMIT, FOLLOWING_SCAN_LIMIT, MAX_TEXT_CHARS, PER_FOLLOWEE_LIMIT};
use crate::storage::{Key, Query, Table, time_key};
use crate::{AuthorSnapshot, Caller, Post, PostId, PostPointer, Profile, ScooterError, UserId, mentions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Partition of the global recency index.
pub const FEED_PARTITION: &str = "FEED";

/// Trim and bound post or comment text.
pub(crate) fn normalize_text(raw: &str) -> Result<String, ScooterError> {
    let text = raw.trim();
    if text.chars().count() > MAX_TEXT_CHARS {
        return Err(ScooterError::validation(format!(
            "Text must be at most {MAX_TEXT_CHARS} characters"
        )));
    }
    Ok(text.to_string())
}

fn post_key(id: &PostId) -> Key {
    Key::single(id.as_str())
}

fn author_pointer_key(post: &Post) -> Key {
    Key::new(post.author_id.as_str(), time_key(post.created_at, post.id.as_str()))
}

fn feed_pointer_key(post: &Post) -> Key {
    Key::new(FEED_PARTITION, time_key(post.created_at, post.id.as_str()))
}

// =============================================================================
// VIEWS
// =============================================================================

/// A post as served to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: PostId,
    pub user_id: UserId,
    /// Author display name.
    pub username: String,
    pub handle: Option<String>,
    pub avatar_key: Option<String>,
    pub avatar_url: Option<String>,
    pub text: String,
    pub image_key: Option<String>,
    pub image_url: Option<String>,
    pub created_at: i64,
    pub edited_at: Option<i64>,
}

/// Fields changed by [`Content::edit_post`]. An empty image key removes the image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPatch {
    pub text: Option<String>,
    pub image_key: Option<String>,
}

// =============================================================================
// CONTENT STORE
// =============================================================================

/// The Content Store component.
#[derive(Debug, Clone)]
pub struct Content {
    ctx: Context,
    directory: Directory,
    fanout: Fanout,
    graph: Graph,
}

impl Content {
    pub(crate) fn new(ctx: Context, directory: Directory, fanout: Fanout, graph: Graph) -> Self {
        Self {
            ctx,
            directory,
            fanout,
            graph,
        }
    }

    fn snapshot_of(&self, caller: &Caller, profile: Option<&Profile>, now: i64) -> AuthorSnapshot {
        AuthorSnapshot {
            display_name: profile
                .and_then(|p| p.handle.clone())
                .unwrap_or_else(|| caller.fallback_name()),
            handle: profile.and_then(|p| p.handle.clone()),
            avatar_key: profile.and_then(|p| p.avatar_key.clone()),
            stamped_at: now,
        }
    }

    /// Publish a post. Mentioned users are notified.
    pub fn create_post(
        &self,
        caller: &Caller,
        text: &str,
        image_key: Option<&str>,
    ) -> Result<PostView, ScooterError> {
        let text = normalize_text(text)?;
        let image_key = normalize_media_key(image_key)?;
        if text.is_empty() && image_key.is_none() {
            return Err(ScooterError::validation("Post needs text or an image"));
        }

        let author = &caller.user_id;
        let profile = self.directory.profile(author)?;
        let now = self.ctx.now();
        let post = Post {
            id: PostId::generate(),
            author_id: author.clone(),
            text,
            image_key,
            created_at: now,
            edited_at: None,
            author: self.snapshot_of(caller, profile.as_ref(), now),
        };

        if !self.ctx.create(Table::Posts, &post_key(&post.id), &post)? {
            return Err(ScooterError::Conflict("Post id collision".to_string()));
        }
        let pointer = PostPointer {
            post_id: post.id.clone(),
            author_id: author.clone(),
            created_at: now,
        };
        self.ctx
            .save(Table::AuthorPosts, &author_pointer_key(&post), &pointer)?;
        if let Err(error) = self.ctx.save(Table::Feed, &feed_pointer_key(&post), &pointer) {
            warn!(post_id = %post.id, %error, "failed to index post in global feed");
        }

        self.fanout
            .mention(author, &mentions::extract(&post.text), &post.id, None);
        debug!(post_id = %post.id, author = %author, "post created");
        Ok(self.view(&post, &post.author))
    }

    /// Primary row of a post.
    pub fn load_post(&self, id: &PostId) -> Result<Option<Post>, ScooterError> {
        self.ctx.load(Table::Posts, &post_key(id))
    }

    /// Load a post or fail with NotFound.
    pub(crate) fn require_post(&self, id: &PostId) -> Result<Post, ScooterError> {
        self.load_post(id)?
            .ok_or_else(|| ScooterError::not_found("Post not found"))
    }

    pub fn get_post(&self, id: &PostId) -> Result<PostView, ScooterError> {
        let post = self.require_post(id)?;
        self.render(post)
    }

    /// Change text and/or image. Author only. Mention notifications follow
    /// the new text.
    pub fn edit_post(
        &self,
        author: &UserId,
        id: &PostId,
        patch: &PostPatch,
    ) -> Result<PostView, ScooterError> {
        let text = patch.text.as_deref().map(normalize_text).transpose()?;
        let image_key = match patch.image_key.as_deref() {
            Some(raw) => Some(normalize_media_key(Some(raw))?),
            None => None,
        };

        let existing = self.require_post(id)?;
        if existing.author_id != *author {
            return Err(ScooterError::Forbidden("Not your post".to_string()));
        }

        let now = self.ctx.now();
        let mut previous_text = String::new();
        let updated = self
            .ctx
            .update::<Post, _>(Table::Posts, &post_key(id), |current| {
                let Some(mut post) = current else {
                    return Err(ScooterError::not_found("Post not found"));
                };
                if post.author_id != *author {
                    return Err(ScooterError::Forbidden("Not your post".to_string()));
                }
                previous_text.clone_from(&post.text);
                if let Some(text) = &text {
                    post.text.clone_from(text);
                }
                if let Some(image) = &image_key {
                    post.image_key.clone_from(image);
                }
                if post.text.is_empty() && post.image_key.is_none() {
                    return Err(ScooterError::validation("Post needs text or an image"));
                }
                post.edited_at = Some(now);
                Ok(Change::Put(post))
            })?
            .ok_or_else(|| ScooterError::not_found("Post not found"))?;

        let (added, removed) = mentions::diff(&previous_text, &updated.text);
        self.fanout.mention(author, &added, id, None);
        self.fanout.unmention(author, &removed, id, None);

        debug!(post_id = %id, "post edited");
        self.render(updated)
    }

    /// Delete a post row and its index pointers. Author only.
    ///
    /// Returns the deleted post so interactions can be cascaded.
    pub fn delete_post(&self, author: &UserId, id: &PostId) -> Result<Post, ScooterError> {
        let post = self.require_post(id)?;
        if post.author_id != *author {
            return Err(ScooterError::Forbidden("Not your post".to_string()));
        }

        self.ctx.remove(Table::Posts, &post_key(id))?;

        for (table, key) in [
            (Table::AuthorPosts, author_pointer_key(&post)),
            (Table::Feed, feed_pointer_key(&post)),
        ] {
            if let Err(error) = self.ctx.remove(table, &key) {
                warn!(post_id = %id, table = table.name(), %error, "failed to remove post pointer");
            }
        }
        self.fanout
            .unmention(author, &mentions::extract(&post.text), id, None);

        debug!(post_id = %id, "post deleted");
        Ok(post)
    }

    // =========================================================================
    // FEEDS
    // =========================================================================

    /// Newest posts of one author.
    pub fn list_posts_by_author(
        &self,
        author: &UserId,
        limit: usize,
    ) -> Result<Vec<PostView>, ScooterError> {
        let pointers = self.ctx.query::<PostPointer>(
            Table::AuthorPosts,
            author.as_str(),
            &Query::all().descending().limit(limit),
        )?;
        self.hydrate(pointers)
    }

    /// Newest posts of everyone.
    pub fn global_feed(&self, limit: usize) -> Result<Vec<PostView>, ScooterError> {
        let pointers = self.ctx.query::<PostPointer>(
            Table::Feed,
            FEED_PARTITION,
            &Query::all().descending().limit(limit),
        )?;
        self.hydrate(pointers)
    }

    /// Own posts plus followees' posts, newest first.
    pub fn following_feed(&self, viewer: &UserId) -> Result<Vec<PostView>, ScooterError> {
        let mut authors = self.graph.following_ids(viewer, FOLLOWING_SCAN_LIMIT)?;
        if authors.is_empty() {
            return self.global_feed(FEED_LIMIT);
        }
        authors.push(viewer.clone());

        let mut pointers = Vec::new();
        for author in &authors {
            pointers.extend(self.ctx.query::<PostPointer>(
                Table::AuthorPosts,
                author.as_str(),
                &Query::all().descending().limit(PER_FOLLOWEE_LIMIT),
            )?);
        }
        pointers.sort_by(|(a, _), (b, _)| b.sort.cmp(&a.sort));
        pointers.truncate(FEED_LIMIT);
        self.hydrate(pointers)
    }

    fn hydrate(&self, pointers: Vec<(Key, PostPointer)>) -> Result<Vec<PostView>, ScooterError> {
        let keys: Vec<Key> = pointers.iter().map(|(_, p)| post_key(&p.post_id)).collect();
        let rows = self.ctx.load_many::<Post>(Table::Posts, &keys)?;

        let mut posts = Vec::with_capacity(rows.len());
        for ((_, pointer), row) in pointers.iter().zip(rows) {
            match row {
                Some(post) => posts.push(post),
                None => debug!(post_id = %pointer.post_id, "skipping pointer to missing post"),
            }
        }
        self.views(posts)
    }

    fn render(&self, post: Post) -> Result<PostView, ScooterError> {
        self.views(vec![post])?
            .pop()
            .ok_or_else(|| ScooterError::StorageError("post rendered no view".to_string()))
    }

    /// Render posts, refreshing stale author snapshots when configured.
    fn views(&self, posts: Vec<Post>) -> Result<Vec<PostView>, ScooterError> {
        if !self.ctx.config.snapshot.refresh_on_read {
            return Ok(posts.iter().map(|p| self.view(p, &p.author)).collect());
        }

        let authors: Vec<UserId> = posts.iter().map(|p| p.author_id.clone()).collect();
        let profiles = self.directory.profiles(&authors)?;
        let mut refreshed: BTreeMap<PostId, AuthorSnapshot> = BTreeMap::new();

        let views = posts
            .iter()
            .map(|post| match profiles.get(&post.author_id) {
                Some(profile) if is_stale(&post.author, profile) => {
                    let fresh = AuthorSnapshot {
                        display_name: profile
                            .handle
                            .clone()
                            .unwrap_or_else(|| post.author.display_name.clone()),
                        handle: profile.handle.clone(),
                        avatar_key: profile.avatar_key.clone(),
                        stamped_at: self.ctx.now(),
                    };
                    let view = self.view(post, &fresh);
                    refreshed.insert(post.id.clone(), fresh);
                    view
                }
                _ => self.view(post, &post.author),
            })
            .collect();

        for post in &posts {
            if let Some(fresh) = refreshed.remove(&post.id) {
                self.rewrite_snapshot(post, fresh);
            }
        }
        Ok(views)
    }

    /// Replace a stale snapshot if the row still carries it. Best effort.
    fn rewrite_snapshot(&self, post: &Post, fresh: AuthorSnapshot) {
        let result = self
            .ctx
            .update::<Post, _>(Table::Posts, &post_key(&post.id), |current| {
                Ok(match current {
                    Some(mut row) if row.author == post.author => {
                        row.author = fresh.clone();
                        Change::Put(row)
                    }
                    _ => Change::Keep,
                })
            });
        match result {
            Ok(_) => debug!(post_id = %post.id, "author snapshot refreshed"),
            Err(error) => warn!(post_id = %post.id, %error, "failed to refresh author snapshot"),
        }
    }

    fn view(&self, post: &Post, author: &AuthorSnapshot) -> PostView {
        let config = &self.ctx.config;
        PostView {
            id: post.id.clone(),
            user_id: post.author_id.clone(),
            username: author.display_name.clone(),
            handle: author.handle.clone(),
            avatar_key: author.avatar_key.clone(),
            avatar_url: config.media_url(author.avatar_key.as_deref()),
            text: post.text.clone(),
            image_key: post.image_key.clone(),
            image_url: config.media_url(post.image_key.as_deref()),
            created_at: post.created_at,
            edited_at: post.edited_at,
        }
    }
}

fn is_stale(snapshot: &AuthorSnapshot, profile: &Profile) -> bool {
    snapshot.handle != profile.handle || snapshot.avatar_key != profile.avatar_key
}
