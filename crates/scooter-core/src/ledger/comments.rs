//! Comments.
//!
//! Rows live in the post's partition sorted by `{time}#{comment id}`, so a
//! partition query returns them oldest first and the sort key doubles as the
//! pagination cursor.
//!
//! Every notification a comment produces carries the comment id as its
//! cause. Deleting the comment retracts exactly those.

use super::Ledger;
use crate::config::Feature;
use crate::content::normalize_text;
use crate::context::Change;
use crate::fanout::{NotificationDraft, Retraction};
use crate::primitives::COMMENT_PAGE_SIZE;
use crate::storage::{Key, Query, Table, time_key};
use crate::{Caller, Comment, CommentId, NotificationKind, PostId, ScooterError, UserId, formats, mentions};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A comment as served to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: CommentId,
    pub post_id: PostId,
    pub user_id: UserId,
    pub username: String,
    pub handle: Option<String>,
    pub avatar_key: Option<String>,
    pub avatar_url: Option<String>,
    pub text: String,
    pub created_at: i64,
    pub edited_at: Option<i64>,
}

/// One page of comments, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPage {
    pub items: Vec<CommentView>,
    /// Sort key of the last returned comment when more remain.
    pub next_cursor: Option<String>,
}

fn non_empty_text(raw: &str) -> Result<String, ScooterError> {
    let text = normalize_text(raw)?;
    if text.is_empty() {
        return Err(ScooterError::validation("Comment text is required"));
    }
    Ok(text)
}

impl Ledger {
    fn require_comments(&self) -> Result<(), ScooterError> {
        self.ctx.config.features.require(Feature::Comments)
    }

    /// Comment on a post. Notifies mentioned users and the post author.
    pub fn add_comment(
        &self,
        caller: &Caller,
        post_id: &PostId,
        text: &str,
    ) -> Result<CommentView, ScooterError> {
        self.require_comments()?;
        let text = non_empty_text(text)?;
        let post = self.content.require_post(post_id)?;

        let author = &caller.user_id;
        let now = self.ctx.now();
        let comment = Comment {
            id: CommentId::generate(),
            post_id: post_id.clone(),
            author_id: author.clone(),
            text,
            created_at: now,
            edited_at: None,
        };
        let key = Key::new(post_id.as_str(), time_key(now, comment.id.as_str()));
        if !self.ctx.create(Table::Comments, &key, &comment)? {
            return Err(ScooterError::Conflict("Comment id collision".to_string()));
        }

        self.fanout.mention(
            author,
            &mentions::extract(&comment.text),
            post_id,
            Some(&comment.id),
        );
        if post.author_id != *author {
            let name = self
                .directory
                .summary(author)
                .map_or_else(|_| caller.fallback_name(), |s| s.mention_name());
            self.fanout.emit_best_effort(
                NotificationDraft::new(
                    NotificationKind::Comment,
                    author,
                    &post.author_id,
                    format!("{name} commented on your post"),
                )
                .about(post_id)
                .caused_by(&comment.id),
            );
        }

        debug!(post_id = %post_id, comment_id = %comment.id, "comment added");
        self.comment_view(comment)
    }

    /// Locate a comment by id within its post partition.
    fn find_comment(
        &self,
        post_id: &PostId,
        comment_id: &CommentId,
    ) -> Result<(Key, Comment), ScooterError> {
        let suffix = format!("#{comment_id}");
        for item in self
            .ctx
            .store
            .query(Table::Comments, post_id.as_str(), &Query::all())?
        {
            if item.key.sort.ends_with(&suffix) {
                let comment: Comment = formats::decode(&item.value)?;
                if comment.id == *comment_id {
                    return Ok((item.key, comment));
                }
            }
        }
        Err(ScooterError::not_found("Comment not found"))
    }

    /// Replace a comment's text. Author only.
    pub fn edit_comment(
        &self,
        author: &UserId,
        post_id: &PostId,
        comment_id: &CommentId,
        text: &str,
    ) -> Result<CommentView, ScooterError> {
        self.require_comments()?;
        let text = non_empty_text(text)?;
        let (key, existing) = self.find_comment(post_id, comment_id)?;
        if existing.author_id != *author {
            return Err(ScooterError::Forbidden("Not your comment".to_string()));
        }

        let now = self.ctx.now();
        let mut previous_text = String::new();
        let updated = self
            .ctx
            .update::<Comment, _>(Table::Comments, &key, |current| {
                let Some(mut comment) = current else {
                    return Err(ScooterError::not_found("Comment not found"));
                };
                if comment.author_id != *author {
                    return Err(ScooterError::Forbidden("Not your comment".to_string()));
                }
                previous_text.clone_from(&comment.text);
                comment.text.clone_from(&text);
                comment.edited_at = Some(now);
                Ok(Change::Put(comment))
            })?
            .ok_or_else(|| ScooterError::not_found("Comment not found"))?;

        let (added, removed) = mentions::diff(&previous_text, &updated.text);
        self.fanout.mention(author, &added, post_id, Some(comment_id));
        self.fanout.unmention(author, &removed, post_id, Some(comment_id));

        self.comment_view(updated)
    }

    /// Delete a comment and retract the notifications it caused. Author only.
    pub fn delete_comment(
        &self,
        author: &UserId,
        post_id: &PostId,
        comment_id: &CommentId,
    ) -> Result<(), ScooterError> {
        self.require_comments()?;
        let (key, comment) = self.find_comment(post_id, comment_id)?;
        if comment.author_id != *author {
            return Err(ScooterError::Forbidden("Not your comment".to_string()));
        }

        self.ctx.remove(Table::Comments, &key)?;

        let post_author = self.content.load_post(post_id).ok().flatten().map(|p| p.author_id);
        self.forget_comment(&comment, post_author.as_ref());
        debug!(post_id = %post_id, comment_id = %comment_id, "comment deleted");
        Ok(())
    }

    /// Retract every notification `comment` caused. Best effort.
    pub(super) fn forget_comment(&self, comment: &Comment, post_author: Option<&UserId>) {
        if let Some(post_author) = post_author {
            self.fanout.retract_best_effort(
                &Retraction::new(post_author, NotificationKind::Comment)
                    .from(&comment.author_id)
                    .about(&comment.post_id)
                    .caused_by(&comment.id),
            );
        }
        self.fanout.unmention(
            &comment.author_id,
            &mentions::extract(&comment.text),
            &comment.post_id,
            Some(&comment.id),
        );
    }

    /// A page of comments, oldest first, starting after `cursor`.
    pub fn list_comments(
        &self,
        post_id: &PostId,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<CommentPage, ScooterError> {
        self.require_comments()?;
        let limit = limit.clamp(1, COMMENT_PAGE_SIZE);
        let mut rows = self.ctx.query::<Comment>(
            Table::Comments,
            post_id.as_str(),
            &Query::all()
                .after(cursor.map(str::to_string))
                .limit(limit + 1),
        )?;

        let next_cursor = if rows.len() > limit {
            rows.truncate(limit);
            rows.last().map(|(key, _)| key.sort.clone())
        } else {
            None
        };
        let comments = rows.into_iter().map(|(_, c)| c).collect();
        Ok(CommentPage {
            items: self.comment_views(comments)?,
            next_cursor,
        })
    }

    fn comment_view(&self, comment: Comment) -> Result<CommentView, ScooterError> {
        self.comment_views(vec![comment])?
            .pop()
            .ok_or_else(|| ScooterError::StorageError("comment rendered no view".to_string()))
    }

    fn comment_views(&self, comments: Vec<Comment>) -> Result<Vec<CommentView>, ScooterError> {
        let authors: Vec<UserId> = comments.iter().map(|c| c.author_id.clone()).collect();
        let users = self.directory.summaries(&authors)?;
        Ok(comments
            .into_iter()
            .map(|c| {
                let user = users.get(&c.author_id);
                CommentView {
                    username: user.map_or_else(|| c.author_id.to_string(), |u| u.display_name.clone()),
                    handle: user.and_then(|u| u.handle.clone()),
                    avatar_key: user.and_then(|u| u.avatar_key.clone()),
                    avatar_url: user.and_then(|u| u.avatar_url.clone()),
                    id: c.id,
                    post_id: c.post_id,
                    user_id: c.author_id,
                    text: c.text,
                    created_at: c.created_at,
                    edited_at: c.edited_at,
                }
            })
            .collect())
    }
}
