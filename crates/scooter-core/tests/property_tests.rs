//! # Property-Based Tests
//!
//! Invariants that must hold for arbitrary operation sequences.

use proptest::collection::vec;
use proptest::prelude::*;
use scooter_core::{Caller, CoreConfig, ManualClock, MemoryStore, Social, UserId};
use std::collections::BTreeMap;
use std::sync::Arc;

const EMOJIS: [&str; 3] = ["👍", "🔥", "🎉"];

fn social() -> Social {
    Social::new(
        Arc::new(MemoryStore::new()),
        Arc::new(ManualClock::default()),
        CoreConfig::default(),
    )
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Counters always equal the number of users holding each emoji, and
    /// every user holds what a simple model predicts.
    #[test]
    fn reaction_counts_match_rows(
        presses in vec((0usize..4, 0usize..EMOJIS.len()), 1..40)
    ) {
        let social = social();
        let author = Caller::new("u-author", None);
        let post = social.content().create_post(&author, "post", None).expect("post");
        let users: Vec<UserId> = (0..4).map(|i| UserId::new(format!("u-{i}"))).collect();

        let mut model: BTreeMap<usize, &str> = BTreeMap::new();
        for (who, which) in presses {
            let emoji = EMOJIS[which];
            let outcome = social
                .ledger()
                .toggle_reaction(&users[who], &post.id, emoji)
                .expect("toggle");

            if model.get(&who) == Some(&emoji) {
                model.remove(&who);
            } else {
                model.insert(who, emoji);
            }
            prop_assert_eq!(outcome.summary.mine.as_deref(), model.get(&who).copied());
        }

        let summary = social
            .ledger()
            .reaction_summary(&post.id, None, false)
            .expect("summary");
        for emoji in EMOJIS {
            let expected = model.values().filter(|e| **e == emoji).count() as i64;
            prop_assert_eq!(summary.count(emoji), expected);
        }

        let report = social
            .ledger()
            .reconcile_reaction_counts(&post.id)
            .expect("reconcile");
        prop_assert!(report.corrections.is_empty());
    }

    /// A handle resolves to the first claimant no matter who tries later.
    #[test]
    fn handle_claims_are_exclusive(
        claimants in vec(0usize..5, 1..12),
        handle in "[a-z][a-z0-9_]{2,19}"
    ) {
        let social = social();
        let callers: Vec<Caller> = (0..5).map(|i| Caller::new(format!("u-{i}"), None)).collect();
        let first = claimants[0];

        for who in &claimants {
            let result = social.directory().claim(&callers[*who], &handle);
            if *who == first {
                prop_assert!(result.is_ok());
            } else {
                prop_assert_eq!(result.expect_err("taken").status_code(), 409);
            }
        }

        prop_assert_eq!(
            social.directory().resolve_handle(&handle).expect("resolve"),
            callers[first].user_id.clone()
        );
    }

    /// Following-feed of a viewer who follows nobody is the global feed.
    #[test]
    fn lone_viewer_feed_is_global(authors in vec(0usize..3, 0..20)) {
        let social = social();
        for (i, author) in authors.iter().enumerate() {
            let caller = Caller::new(format!("u-{author}"), None);
            social
                .content()
                .create_post(&caller, &format!("post {i}"), None)
                .expect("post");
        }
        let viewer = UserId::new("u-viewer");
        prop_assert_eq!(
            social.content().following_feed(&viewer).expect("feed"),
            social.content().global_feed(50).expect("global")
        );
    }
}
