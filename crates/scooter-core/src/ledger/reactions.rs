//! Reactions.
//!
//! Each user has at most one active emoji per post, stored as the row
//! `USER#{user}` in the post's partition. Per-emoji totals are derived
//! counters stored as `COUNT#{emoji}`.
//!
//! Toggling is a three-state machine driven by a compare-and-swap on the
//! user's row:
//!
//! | current | pressed | next    | counters            |
//! |---------|---------|---------|---------------------|
//! | none    | e       | e       | e + 1               |
//! | e       | e       | none    | e - 1               |
//! | a       | b       | b       | b + 1, a - 1        |
//!
//! The row swap serializes concurrent toggles by the same user. Counters are
//! adjusted afterwards by their own bounded retry loop; a failed adjustment
//! is logged and repaired by [`Ledger::reconcile_reaction_counts`].

use super::Ledger;
use crate::config::Feature;
use crate::context::Change;
use crate::directory::UserSummary;
use crate::fanout::{NotificationDraft, Retraction};
use crate::primitives::MAX_EMOJI_CHARS;
use crate::storage::{Key, Query, Table};
use crate::{NotificationKind, PostId, ReactionRow, ScooterError, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

const COUNT_PREFIX: &str = "COUNT#";
const USER_PREFIX: &str = "USER#";

fn counter_key(post: &PostId, emoji: &str) -> Key {
    Key::new(post.as_str(), format!("{COUNT_PREFIX}{emoji}"))
}

fn row_key(post: &PostId, user: &UserId) -> Key {
    Key::new(post.as_str(), format!("{USER_PREFIX}{user}"))
}

/// Trim and bound an emoji.
pub(crate) fn normalize_emoji(raw: &str) -> Result<String, ScooterError> {
    let emoji = raw.trim();
    if emoji.is_empty() {
        return Err(ScooterError::validation("Emoji is required"));
    }
    if emoji.chars().count() > MAX_EMOJI_CHARS || emoji.chars().any(char::is_control) {
        return Err(ScooterError::validation(format!(
            "Emoji must be at most {MAX_EMOJI_CHARS} characters"
        )));
    }
    Ok(emoji.to_string())
}

/// The state change a toggle performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReactionTransition {
    Set { emoji: String },
    Cleared { emoji: String },
    Switched { from: String, to: String },
}

/// Reaction totals of a post as seen by one viewer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionSummary {
    /// Per-emoji totals, never negative. Emptied counters stay at zero.
    pub counts: BTreeMap<String, i64>,
    /// The viewer's active emoji.
    pub mine: Option<String>,
    /// Reacting users per emoji, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub who: Option<BTreeMap<String, Vec<UserSummary>>>,
}

impl ReactionSummary {
    /// Total for one emoji, zero when absent.
    #[must_use]
    pub fn count(&self, emoji: &str) -> i64 {
        self.counts.get(emoji).copied().unwrap_or(0)
    }
}

/// Result of [`Ledger::toggle_reaction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleOutcome {
    pub transition: ReactionTransition,
    #[serde(flatten)]
    pub summary: ReactionSummary,
}

/// One counter rewritten by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterCorrection {
    pub emoji: String,
    pub stored: i64,
    pub actual: i64,
}

/// Result of [`Ledger::reconcile_reaction_counts`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub post_id: PostId,
    pub corrections: Vec<CounterCorrection>,
}

impl Ledger {
    fn require_reactions(&self) -> Result<(), ScooterError> {
        self.ctx.config.features.require(Feature::Reactions)
    }

    /// Press `emoji` on a post.
    pub fn toggle_reaction(
        &self,
        user: &UserId,
        post_id: &PostId,
        emoji: &str,
    ) -> Result<ToggleOutcome, ScooterError> {
        self.require_reactions()?;
        let emoji = normalize_emoji(emoji)?;
        let post = self.content.require_post(post_id)?;

        let now = self.ctx.now();
        let mut transition = None;
        self.ctx
            .update::<ReactionRow, _>(Table::Reactions, &row_key(post_id, user), |current| {
                let (next, change) = match current {
                    None => (
                        ReactionTransition::Set {
                            emoji: emoji.clone(),
                        },
                        Change::Put(ReactionRow {
                            user_id: user.clone(),
                            emoji: emoji.clone(),
                            reacted_at: now,
                        }),
                    ),
                    Some(row) if row.emoji == emoji => (
                        ReactionTransition::Cleared {
                            emoji: emoji.clone(),
                        },
                        Change::Remove,
                    ),
                    Some(row) => (
                        ReactionTransition::Switched {
                            from: row.emoji,
                            to: emoji.clone(),
                        },
                        Change::Put(ReactionRow {
                            user_id: user.clone(),
                            emoji: emoji.clone(),
                            reacted_at: now,
                        }),
                    ),
                };
                transition = Some(next);
                Ok(change)
            })?;
        let transition = transition
            .ok_or_else(|| ScooterError::StorageError("reaction toggle made no decision".to_string()))?;
        debug!(post_id = %post_id, user = %user, ?transition, "reaction toggled");

        match &transition {
            ReactionTransition::Set { emoji } => {
                self.bump(post_id, emoji, 1);
            }
            ReactionTransition::Cleared { emoji } => {
                self.bump(post_id, emoji, -1);
            }
            ReactionTransition::Switched { from, to } => {
                self.bump(post_id, to, 1);
                self.bump(post_id, from, -1);
            }
        }

        let retract = Retraction::new(&post.author_id, NotificationKind::Reaction)
            .from(user)
            .about(post_id);
        match &transition {
            ReactionTransition::Set { emoji } => self.notify_reaction(user, &post.author_id, post_id, emoji),
            ReactionTransition::Cleared { .. } => self.fanout.retract_best_effort(&retract),
            ReactionTransition::Switched { to, .. } => {
                self.fanout.retract_best_effort(&retract);
                self.notify_reaction(user, &post.author_id, post_id, to);
            }
        }

        let summary = self.reaction_summary(post_id, Some(user), false)?;
        Ok(ToggleOutcome {
            transition,
            summary,
        })
    }

    /// Adjust a counter, logging failures.
    fn bump(&self, post_id: &PostId, emoji: &str, delta: i64) {
        if let Err(error) = self
            .ctx
            .adjust_counter(Table::Reactions, &counter_key(post_id, emoji), delta)
        {
            warn!(post_id = %post_id, emoji, delta, %error, "failed to adjust reaction counter");
        }
    }

    fn notify_reaction(&self, user: &UserId, post_author: &UserId, post_id: &PostId, emoji: &str) {
        if user == post_author {
            return;
        }
        let name = self
            .directory
            .summary(user)
            .map_or_else(|_| user.to_string(), |s| s.mention_name());
        self.fanout.emit_best_effort(
            NotificationDraft::new(
                NotificationKind::Reaction,
                user,
                post_author,
                format!("{name} reacted {emoji} to your post"),
            )
            .about(post_id),
        );
    }

    fn reaction_rows(&self, post_id: &PostId) -> Result<Vec<ReactionRow>, ScooterError> {
        Ok(self
            .ctx
            .query::<ReactionRow>(Table::Reactions, post_id.as_str(), &Query::prefix(USER_PREFIX))?
            .into_iter()
            .map(|(_, row)| row)
            .collect())
    }

    fn stored_counts(&self, post_id: &PostId) -> Result<BTreeMap<String, i64>, ScooterError> {
        Ok(self
            .ctx
            .query::<i64>(Table::Reactions, post_id.as_str(), &Query::prefix(COUNT_PREFIX))?
            .into_iter()
            .filter_map(|(key, count)| {
                key.sort
                    .strip_prefix(COUNT_PREFIX)
                    .map(|emoji| (emoji.to_string(), count))
            })
            .collect())
    }

    /// Per-emoji totals, the viewer's emoji and optionally who reacted.
    pub fn reaction_summary(
        &self,
        post_id: &PostId,
        viewer: Option<&UserId>,
        include_who: bool,
    ) -> Result<ReactionSummary, ScooterError> {
        self.require_reactions()?;
        let counts = self
            .stored_counts(post_id)?
            .into_iter()
            .map(|(emoji, count)| (emoji, count.max(0)))
            .collect();

        let mine = match viewer {
            Some(viewer) => self
                .ctx
                .load::<ReactionRow>(Table::Reactions, &row_key(post_id, viewer))?
                .map(|row| row.emoji),
            None => None,
        };

        let who = if include_who {
            let rows = self.reaction_rows(post_id)?;
            let users: Vec<UserId> = rows.iter().map(|r| r.user_id.clone()).collect();
            let summaries = self.directory.summaries(&users)?;
            let mut grouped: BTreeMap<String, Vec<UserSummary>> = BTreeMap::new();
            for row in rows {
                if let Some(summary) = summaries.get(&row.user_id) {
                    grouped.entry(row.emoji).or_default().push(summary.clone());
                }
            }
            Some(grouped)
        } else {
            None
        };

        Ok(ReactionSummary { counts, mine, who })
    }

    /// Recompute counters from the per-user rows and fix any drift.
    pub fn reconcile_reaction_counts(&self, post_id: &PostId) -> Result<ReconcileReport, ScooterError> {
        let mut actual: BTreeMap<String, i64> = BTreeMap::new();
        for row in self.reaction_rows(post_id)? {
            *actual.entry(row.emoji).or_insert(0) += 1;
        }
        let stored = self.stored_counts(post_id)?;

        let mut emojis: Vec<&String> = actual.keys().chain(stored.keys()).collect();
        emojis.sort_unstable();
        emojis.dedup();

        let mut corrections = Vec::new();
        for emoji in emojis {
            let want = actual.get(emoji).copied().unwrap_or(0);
            let have = stored.get(emoji).copied().unwrap_or(0);
            if want == have {
                continue;
            }
            self.ctx.update::<i64, _>(
                Table::Reactions,
                &counter_key(post_id, emoji),
                |_| Ok(Change::Put(want)),
            )?;
            corrections.push(CounterCorrection {
                emoji: emoji.clone(),
                stored: have,
                actual: want,
            });
        }

        if !corrections.is_empty() {
            info!(post_id = %post_id, corrected = corrections.len(), "reaction counters reconciled");
        }
        Ok(ReconcileReport {
            post_id: post_id.clone(),
            corrections,
        })
    }
}
