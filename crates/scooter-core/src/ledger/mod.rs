//! # Interaction Ledger
//!
//! Comments and emoji reactions attached to posts.
//!
//! - [`comments`]: ordered comment rows with mention and comment notifications
//! - [`reactions`]: one active emoji per user per post, plus derived counters
//!
//! Both live in the post's partition. Deleting a post cascades through this
//! ledger on a best effort basis ([`Ledger::purge_post`]).

pub mod comments;
pub mod reactions;

pub use comments::{CommentPage, CommentView};
pub use reactions::{CounterCorrection, ReactionSummary, ReactionTransition, ReconcileReport, ToggleOutcome};

use crate::content::Content;
use crate::context::Context;
use crate::directory::Directory;
use crate::fanout::Fanout;
use crate::storage::{Query, Table};
use crate::{Comment, NotificationKind, Post, formats};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// What a post cascade removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeReport {
    pub comments: usize,
    pub reaction_items: usize,
    /// Steps that failed and were left for a later sweep.
    pub failures: usize,
}

/// The Interaction Ledger component.
#[derive(Debug, Clone)]
pub struct Ledger {
    ctx: Context,
    directory: Directory,
    fanout: Fanout,
    content: Content,
}

impl Ledger {
    pub(crate) fn new(ctx: Context, directory: Directory, fanout: Fanout, content: Content) -> Self {
        Self {
            ctx,
            directory,
            fanout,
            content,
        }
    }

    /// Remove every comment, reaction and derived notification of a deleted post.
    ///
    /// Never fails; each failed step is logged and counted.
    pub fn purge_post(&self, post: &Post) -> PurgeReport {
        let mut report = PurgeReport::default();
        let partition = post.id.as_str();

        match self.ctx.store.query(Table::Comments, partition, &Query::all()) {
            Ok(items) => {
                for item in items {
                    match formats::decode::<Comment>(&item.value) {
                        Ok(comment) => {
                            self.forget_comment(&comment, Some(&post.author_id));
                        }
                        Err(error) => {
                            warn!(post_id = %post.id, %error, "undecodable comment during purge");
                            report.failures += 1;
                        }
                    }
                    match self.ctx.remove(Table::Comments, &item.key) {
                        Ok(_) => report.comments += 1,
                        Err(error) => {
                            warn!(post_id = %post.id, %error, "failed to delete comment during purge");
                            report.failures += 1;
                        }
                    }
                }
            }
            Err(error) => {
                warn!(post_id = %post.id, %error, "failed to list comments during purge");
                report.failures += 1;
            }
        }

        match self.ctx.store.query(Table::Reactions, partition, &Query::all()) {
            Ok(items) => {
                for item in items {
                    match self.ctx.remove(Table::Reactions, &item.key) {
                        Ok(_) => report.reaction_items += 1,
                        Err(error) => {
                            warn!(post_id = %post.id, %error, "failed to delete reaction during purge");
                            report.failures += 1;
                        }
                    }
                }
            }
            Err(error) => {
                warn!(post_id = %post.id, %error, "failed to list reactions during purge");
                report.failures += 1;
            }
        }

        self.fanout.retract_post(
            &post.author_id,
            &[NotificationKind::Comment, NotificationKind::Reaction],
            &post.id,
        );

        debug!(
            post_id = %post.id,
            comments = report.comments,
            reaction_items = report.reaction_items,
            failures = report.failures,
            "post interactions purged"
        );
        report
    }
}
