//! # Notification Fanout
//!
//! Derived notification events in each user's inbox.
//!
//! Every notification is two items:
//! - the inbox row, in the target's partition, sorted by `{time}#{id}`
//! - an index entry, in the target's partition of the index table, sorted by
//!   `{kind}#{source}#{post or -}#{id}`
//!
//! The index is written first. A dangling index entry (row write failed) is
//! harmless: dedup checks the row and repairs the entry, retraction deletes
//! whatever is left. Retraction and dedup therefore never scan the inbox.

use crate::context::{Change, Context};
use crate::directory::Directory;
use crate::primitives::{NOTIFICATION_LIMIT, UNREAD_SCAN_LIMIT};
use crate::storage::{Key, Query, Table, time_key};
use crate::{
    CommentId, IndexEntry, Notification, NotificationId, NotificationKind, PostId, ScooterError,
    UserId,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A notification about to be emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub target: UserId,
    pub kind: NotificationKind,
    pub source: UserId,
    pub post_id: Option<PostId>,
    pub cause: Option<String>,
    pub message: String,
}

impl NotificationDraft {
    #[must_use]
    pub fn new(
        kind: NotificationKind,
        source: &UserId,
        target: &UserId,
        message: impl Into<String>,
    ) -> Self {
        Self {
            target: target.clone(),
            kind,
            source: source.clone(),
            post_id: None,
            cause: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn about(mut self, post: &PostId) -> Self {
        self.post_id = Some(post.clone());
        self
    }

    #[must_use]
    pub fn caused_by(mut self, comment: &CommentId) -> Self {
        self.cause = Some(comment.to_string());
        self
    }
}

/// Filter on the comment that caused a notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CauseFilter {
    #[default]
    Any,
    /// Only notifications not caused by a comment.
    Absent,
    /// Only notifications caused by this comment.
    Comment(String),
}

/// Selects notifications in one inbox for retraction.
///
/// Unset filters match anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retraction {
    pub target: UserId,
    pub kind: NotificationKind,
    pub source: Option<UserId>,
    pub post_id: Option<PostId>,
    pub cause: CauseFilter,
}

impl Retraction {
    #[must_use]
    pub fn new(target: &UserId, kind: NotificationKind) -> Self {
        Self {
            target: target.clone(),
            kind,
            source: None,
            post_id: None,
            cause: CauseFilter::Any,
        }
    }

    #[must_use]
    pub fn from(mut self, source: &UserId) -> Self {
        self.source = Some(source.clone());
        self
    }

    #[must_use]
    pub fn about(mut self, post: &PostId) -> Self {
        self.post_id = Some(post.clone());
        self
    }

    #[must_use]
    pub fn caused_by(mut self, comment: &CommentId) -> Self {
        self.cause = CauseFilter::Comment(comment.to_string());
        self
    }

    #[must_use]
    pub fn without_cause(mut self) -> Self {
        self.cause = CauseFilter::Absent;
        self
    }

    fn matches(&self, entry: &IndexEntry) -> bool {
        entry.kind == self.kind
            && self.source.as_ref().is_none_or(|s| *s == entry.source)
            && self
                .post_id
                .as_ref()
                .is_none_or(|p| entry.post_id.as_ref() == Some(p))
            && match &self.cause {
                CauseFilter::Any => true,
                CauseFilter::Absent => entry.cause.is_none(),
                CauseFilter::Comment(c) => entry.cause.as_ref() == Some(c),
            }
    }
}

/// Inbox row hydrated with the source user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub from_user_id: UserId,
    pub from_handle: Option<String>,
    pub from_name: String,
    pub avatar_key: Option<String>,
    pub avatar_url: Option<String>,
    pub post_id: Option<PostId>,
    pub message: String,
    pub read: bool,
    pub created_at: i64,
}

fn index_prefix(kind: NotificationKind, source: Option<&UserId>) -> String {
    match source {
        Some(source) => format!("{}#{}#", kind.as_str(), source),
        None => format!("{}#", kind.as_str()),
    }
}

fn index_sort(entry: &IndexEntry) -> String {
    format!(
        "{}#{}#{}#{}",
        entry.kind.as_str(),
        entry.source,
        entry.post_id.as_ref().map_or("-", PostId::as_str),
        entry.notification_id
    )
}

/// The Notification Fanout component.
#[derive(Debug, Clone)]
pub struct Fanout {
    ctx: Context,
    directory: Directory,
}

impl Fanout {
    pub(crate) fn new(ctx: Context, directory: Directory) -> Self {
        Self { ctx, directory }
    }

    /// Append a notification to the target's inbox.
    ///
    /// No-op (returns `None`) when target and source are the same user.
    pub fn emit(&self, draft: NotificationDraft) -> Result<Option<NotificationId>, ScooterError> {
        if draft.target == draft.source {
            return Ok(None);
        }

        let id = NotificationId::generate();
        let created_at = self.ctx.now();
        let row_sort = time_key(created_at, id.as_str());
        let entry = IndexEntry {
            notification_id: id.clone(),
            row_sort: row_sort.clone(),
            kind: draft.kind,
            source: draft.source.clone(),
            post_id: draft.post_id.clone(),
            cause: draft.cause.clone(),
        };
        let target = draft.target.as_str();
        self.ctx.save(
            Table::NotificationIndex,
            &Key::new(target, index_sort(&entry)),
            &entry,
        )?;

        let notification = Notification {
            id: id.clone(),
            target: draft.target.clone(),
            kind: draft.kind,
            source: draft.source,
            post_id: draft.post_id,
            cause: draft.cause,
            message: draft.message,
            read: false,
            created_at,
        };
        self.ctx
            .save(Table::Notifications, &Key::new(target, row_sort), &notification)?;

        debug!(target_user = %notification.target, kind = %notification.kind, id = %id, "notification emitted");
        Ok(Some(id))
    }

    /// Emit, logging instead of failing. For secondary writes.
    pub(crate) fn emit_best_effort(&self, draft: NotificationDraft) {
        let (target, kind) = (draft.target.clone(), draft.kind);
        if let Err(error) = self.emit(draft) {
            warn!(target_user = %target, %kind, %error, "failed to emit notification");
        }
    }

    fn entries(
        &self,
        target: &UserId,
        kind: NotificationKind,
        source: Option<&UserId>,
    ) -> Result<Vec<(Key, IndexEntry)>, ScooterError> {
        self.ctx.query::<IndexEntry>(
            Table::NotificationIndex,
            target.as_str(),
            &Query::prefix(index_prefix(kind, source)),
        )
    }

    /// Delete every matching notification. Returns how many rows were removed.
    pub fn retract(&self, selector: &Retraction) -> Result<usize, ScooterError> {
        let mut removed = 0;
        for (index_key, entry) in self.entries(&selector.target, selector.kind, selector.source.as_ref())? {
            if !selector.matches(&entry) {
                continue;
            }
            let row_key = Key::new(selector.target.as_str(), entry.row_sort.as_str());
            if self.ctx.remove(Table::Notifications, &row_key)? {
                removed += 1;
            }
            self.ctx.remove(Table::NotificationIndex, &index_key)?;
        }

        if removed > 0 {
            debug!(target_user = %selector.target, kind = %selector.kind, removed, "notifications retracted");
        }
        Ok(removed)
    }

    /// Retract, logging instead of failing. For secondary writes.
    pub(crate) fn retract_best_effort(&self, selector: &Retraction) {
        if let Err(error) = self.retract(selector) {
            warn!(
                target_user = %selector.target,
                kind = %selector.kind,
                post_id = ?selector.post_id,
                %error,
                "failed to retract notifications"
            );
        }
    }

    /// Whether a live notification of `kind` from `source` sits in `target`'s inbox.
    ///
    /// Index entries whose row is gone are removed on the way.
    pub fn exists_pending(
        &self,
        target: &UserId,
        kind: NotificationKind,
        source: &UserId,
    ) -> Result<bool, ScooterError> {
        for (index_key, entry) in self.entries(target, kind, Some(source))? {
            if entry.source != *source {
                continue;
            }
            let row_key = Key::new(target.as_str(), entry.row_sort.as_str());
            if self.ctx.store.get(Table::Notifications, &row_key)?.is_some() {
                return Ok(true);
            }
            debug!(target_user = %target, %kind, "removing dangling notification index entry");
            self.ctx.remove(Table::NotificationIndex, &index_key)?;
        }
        Ok(false)
    }

    /// Most recent notifications first, hydrated with the source user.
    ///
    /// With `mark_read`, every returned unread row is flipped to read and
    /// returned as read.
    pub fn list(
        &self,
        target: &UserId,
        limit: usize,
        mark_read: bool,
    ) -> Result<Vec<NotificationView>, ScooterError> {
        let limit = limit.clamp(1, NOTIFICATION_LIMIT);
        let rows = self.ctx.query::<Notification>(
            Table::Notifications,
            target.as_str(),
            &Query::all().descending().limit(limit),
        )?;

        let mut notifications = Vec::with_capacity(rows.len());
        for (key, mut notification) in rows {
            if mark_read && !notification.read {
                match self.mark_read(&key) {
                    Ok(Some(updated)) => notification = updated,
                    Ok(None) => continue,
                    Err(error) => {
                        warn!(target_user = %target, id = %notification.id, %error, "failed to mark notification read");
                    }
                }
            }
            notifications.push(notification);
        }

        let sources: Vec<UserId> = notifications.iter().map(|n| n.source.clone()).collect();
        let users = self.directory.summaries(&sources)?;

        Ok(notifications
            .into_iter()
            .map(|n| {
                let user = users.get(&n.source);
                NotificationView {
                    id: n.id,
                    kind: n.kind,
                    from_handle: user.and_then(|u| u.handle.clone()),
                    from_name: user.map_or_else(|| n.source.to_string(), |u| u.display_name.clone()),
                    avatar_key: user.and_then(|u| u.avatar_key.clone()),
                    avatar_url: user.and_then(|u| u.avatar_url.clone()),
                    from_user_id: n.source,
                    post_id: n.post_id,
                    message: n.message,
                    read: n.read,
                    created_at: n.created_at,
                }
            })
            .collect())
    }

    fn mark_read(&self, key: &Key) -> Result<Option<Notification>, ScooterError> {
        self.ctx
            .update::<Notification, _>(Table::Notifications, key, |current| {
                Ok(match current {
                    Some(mut n) if !n.read => {
                        n.read = true;
                        Change::Put(n)
                    }
                    _ => Change::Keep,
                })
            })
    }

    /// Unread rows among the most recent inbox entries.
    pub fn unread_count(&self, target: &UserId) -> Result<usize, ScooterError> {
        let rows = self.ctx.query::<Notification>(
            Table::Notifications,
            target.as_str(),
            &Query::all().descending().limit(UNREAD_SCAN_LIMIT),
        )?;
        Ok(rows.iter().filter(|(_, n)| !n.read).count())
    }

    /// Notify every resolvable handle in `handles` that `author` mentioned
    /// them. Unknown handles and the author are skipped. Best effort.
    ///
    /// Returns the users that were notified.
    pub(crate) fn mention(
        &self,
        author: &UserId,
        handles: &[String],
        post: &PostId,
        cause: Option<&CommentId>,
    ) -> Vec<UserId> {
        if handles.is_empty() {
            return Vec::new();
        }
        let name = self
            .directory
            .summary(author)
            .map_or_else(|_| author.to_string(), |s| s.mention_name());
        let place = if cause.is_some() { "a comment" } else { "a post" };

        let mut notified = Vec::new();
        for handle in handles {
            let target = match self.directory.lookup_handle(handle) {
                Ok(Some(reservation)) => reservation.user_id,
                Ok(None) => continue,
                Err(error) => {
                    warn!(handle = %handle, %error, "failed to resolve mention");
                    continue;
                }
            };
            if target == *author || notified.contains(&target) {
                continue;
            }
            let mut draft = NotificationDraft::new(
                NotificationKind::Mention,
                author,
                &target,
                format!("{name} mentioned you in {place}"),
            )
            .about(post);
            if let Some(comment) = cause {
                draft = draft.caused_by(comment);
            }
            self.emit_best_effort(draft);
            notified.push(target);
        }
        notified
    }

    /// Retract mentions of `handles` made by `author` in `post` (or in the
    /// comment `cause`). Best effort.
    pub(crate) fn unmention(
        &self,
        author: &UserId,
        handles: &[String],
        post: &PostId,
        cause: Option<&CommentId>,
    ) {
        for handle in handles {
            let target = match self.directory.lookup_handle(handle) {
                Ok(Some(reservation)) => reservation.user_id,
                Ok(None) => continue,
                Err(error) => {
                    warn!(handle = %handle, %error, "failed to resolve mention");
                    continue;
                }
            };
            let mut selector = Retraction::new(&target, NotificationKind::Mention)
                .from(author)
                .about(post);
            selector = match cause {
                Some(comment) => selector.caused_by(comment),
                None => selector.without_cause(),
            };
            self.retract_best_effort(&selector);
        }
    }

    /// Retract notifications of each kind about `post` from `target`'s inbox.
    pub(crate) fn retract_post(&self, target: &UserId, kinds: &[NotificationKind], post: &PostId) {
        for kind in kinds {
            self.retract_best_effort(&Retraction::new(target, *kind).about(post));
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
