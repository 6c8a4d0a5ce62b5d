//! # Identity Directory
//!
//! Maps user ids to profiles and globally unique handles.
//!
//! ## Handle arbitration
//!
//! The conditional insert of the handle reservation is the single arbiter of
//! uniqueness. The profile's handle field is written afterwards by a
//! compare-and-swap loop. If that write fails, the claim compensates by
//! removing its own reservation. A reservation orphaned by a crash between
//! the two writes belongs to the same user and is adopted on retry.

use crate::context::{Change, Context};
use crate::primitives::{MAX_FULL_NAME_CHARS, MAX_HANDLE_LEN, MAX_MEDIA_KEY_LEN, MIN_HANDLE_LEN};
use crate::storage::{Key, Query, Table};
use crate::{Caller, HandleReservation, Profile, ScooterError, UserId, primitives};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Partition holding every handle reservation.
pub const HANDLE_PARTITION: &str = "HANDLE";

/// Trim, lower-case and validate a handle.
pub fn normalize_handle(raw: &str) -> Result<String, ScooterError> {
    let handle = raw.trim().to_lowercase();
    let well_formed = (MIN_HANDLE_LEN..=MAX_HANDLE_LEN).contains(&handle.len())
        && handle
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
    if well_formed {
        Ok(handle)
    } else {
        Err(ScooterError::validation(format!(
            "Handle must be {MIN_HANDLE_LEN}-{MAX_HANDLE_LEN} characters of a-z, 0-9 or _"
        )))
    }
}

/// Validate an optional media key. Empty means "clear".
pub(crate) fn normalize_media_key(raw: Option<&str>) -> Result<Option<String>, ScooterError> {
    let Some(key) = raw.map(str::trim) else {
        return Ok(None);
    };
    if key.is_empty() {
        return Ok(None);
    }
    if key.len() > MAX_MEDIA_KEY_LEN || key.chars().any(char::is_control) {
        return Err(ScooterError::validation("Invalid media key"));
    }
    Ok(Some(key.to_string()))
}

fn user_key(user: &UserId) -> Key {
    Key::single(user.as_str())
}

fn handle_key(handle: &str) -> Key {
    Key::new(HANDLE_PARTITION, handle)
}

// =============================================================================
// VIEWS
// =============================================================================

/// Public, hydrated view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub user_id: UserId,
    pub handle: Option<String>,
    /// Handle, else email, else user id.
    pub display_name: String,
    pub full_name: Option<String>,
    pub avatar_key: Option<String>,
    pub avatar_url: Option<String>,
}

impl UserSummary {
    /// `@handle` when claimed, else the display name.
    #[must_use]
    pub fn mention_name(&self) -> String {
        self.handle
            .as_ref()
            .map_or_else(|| self.display_name.clone(), |h| format!("@{h}"))
    }
}

/// The caller's own profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub user_id: UserId,
    pub email: Option<String>,
    pub handle: Option<String>,
    pub display_name: String,
    pub full_name: Option<String>,
    pub avatar_key: Option<String>,
    pub avatar_url: Option<String>,
}

/// Fields merged by [`Directory::update_profile`]. An empty string clears.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    pub full_name: Option<String>,
    pub avatar_key: Option<String>,
}

// =============================================================================
// DIRECTORY
// =============================================================================

/// The Identity Directory component.
#[derive(Debug, Clone)]
pub struct Directory {
    ctx: Context,
}

impl Directory {
    pub(crate) fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    /// Profile row, if the user has written one.
    pub fn profile(&self, user: &UserId) -> Result<Option<Profile>, ScooterError> {
        self.ctx.load(Table::Users, &user_key(user))
    }

    /// Reservation for a handle, if claimed.
    pub fn lookup_handle(&self, raw: &str) -> Result<Option<HandleReservation>, ScooterError> {
        let handle = raw.trim().trim_start_matches('@').to_lowercase();
        if handle.is_empty() {
            return Ok(None);
        }
        self.ctx.load(Table::Handles, &handle_key(&handle))
    }

    /// Resolve a handle to its owner.
    pub fn resolve_handle(&self, raw: &str) -> Result<UserId, ScooterError> {
        self.lookup_handle(raw)?
            .map(|r| r.user_id)
            .ok_or_else(|| ScooterError::not_found("User not found"))
    }

    /// The caller's own profile view. Never fails for a missing profile.
    pub fn me(&self, caller: &Caller) -> Result<ProfileView, ScooterError> {
        let profile = self
            .profile(&caller.user_id)?
            .unwrap_or_else(|| Profile::empty(caller.user_id.clone(), 0));
        let email = profile.email.clone().or_else(|| caller.email.clone());
        let display_name = profile
            .handle
            .clone()
            .unwrap_or_else(|| caller.fallback_name());
        Ok(ProfileView {
            avatar_url: self.ctx.config.media_url(profile.avatar_key.as_deref()),
            user_id: profile.user_id,
            email,
            handle: profile.handle,
            display_name,
            full_name: profile.full_name,
            avatar_key: profile.avatar_key,
        })
    }

    /// Claim a handle for `caller`. Idempotent for the same user and handle.
    pub fn claim(&self, caller: &Caller, raw: &str) -> Result<Profile, ScooterError> {
        let handle = normalize_handle(raw)?;
        let user = &caller.user_id;
        let current = self.profile(user)?;

        if let Some(profile) = &current {
            if let Some(existing) = &profile.handle {
                if *existing == handle {
                    return Ok(profile.clone());
                }
                return Err(ScooterError::Conflict(
                    "Handle already set and cannot be changed".to_string(),
                ));
            }
        }

        // Arbitration: whoever creates the reservation owns the handle.
        let now = self.ctx.now();
        let reservation = HandleReservation {
            handle: handle.clone(),
            user_id: user.clone(),
            avatar_key: current.as_ref().and_then(|p| p.avatar_key.clone()),
            claimed_at: now,
        };
        let key = handle_key(&handle);
        if !self.ctx.create(Table::Handles, &key, &reservation)? {
            match self.ctx.load::<HandleReservation>(Table::Handles, &key)? {
                Some(holder) if holder.user_id == *user => {
                    debug!(handle = %handle, "adopting orphaned handle reservation");
                }
                _ => return Err(ScooterError::Conflict("Handle already taken".to_string())),
            }
        }

        let email = caller.email.clone();
        let written = self.ctx.update::<Profile, _>(Table::Users, &user_key(user), |current| {
            let mut profile = current.unwrap_or_else(|| Profile::empty(user.clone(), now));
            match profile.handle.as_deref() {
                Some(existing) if existing == handle => Ok(Change::Keep),
                Some(_) => Err(ScooterError::Conflict(
                    "Handle already set and cannot be changed".to_string(),
                )),
                None => {
                    profile.handle = Some(handle.clone());
                    if profile.email.is_none() {
                        profile.email.clone_from(&email);
                    }
                    profile.updated_at = now;
                    Ok(Change::Put(profile))
                }
            }
        });

        match written {
            Ok(Some(profile)) => {
                if profile.avatar_key != reservation.avatar_key {
                    self.republish_avatar(&handle, user, profile.avatar_key.clone());
                }
                Ok(profile)
            }
            Ok(None) => Err(ScooterError::StorageError(
                "profile vanished during handle claim".to_string(),
            )),
            Err(e) => {
                self.release_reservation(&handle, user);
                Err(e)
            }
        }
    }

    /// Remove `user`'s own reservation after a failed claim.
    fn release_reservation(&self, handle: &str, user: &UserId) {
        let released = self
            .ctx
            .update::<HandleReservation, _>(Table::Handles, &handle_key(handle), |current| {
                Ok(match current {
                    Some(r) if r.user_id == *user => Change::Remove,
                    _ => Change::Keep,
                })
            });
        if let Err(error) = released {
            warn!(handle, user = %user, %error, "failed to release handle reservation");
        }
    }

    /// Copy the profile avatar onto the handle reservation. Best effort.
    fn republish_avatar(&self, handle: &str, user: &UserId, avatar_key: Option<String>) {
        let result = self
            .ctx
            .update::<HandleReservation, _>(Table::Handles, &handle_key(handle), |current| {
                Ok(match current {
                    Some(mut r) if r.user_id == *user && r.avatar_key != avatar_key => {
                        r.avatar_key.clone_from(&avatar_key);
                        Change::Put(r)
                    }
                    _ => Change::Keep,
                })
            });
        if let Err(error) = result {
            warn!(handle, user = %user, %error, "failed to republish avatar");
        }
    }

    /// Merge profile fields, creating the profile if needed.
    pub fn update_profile(
        &self,
        caller: &Caller,
        patch: &ProfilePatch,
    ) -> Result<Profile, ScooterError> {
        let full_name = match patch.full_name.as_deref().map(str::trim) {
            Some(name) if name.chars().count() > MAX_FULL_NAME_CHARS => {
                return Err(ScooterError::validation(format!(
                    "Full name must be at most {MAX_FULL_NAME_CHARS} characters"
                )));
            }
            Some(name) if name.chars().any(char::is_control) => {
                return Err(ScooterError::validation("Full name contains control characters"));
            }
            Some(name) => Some((!name.is_empty()).then(|| name.to_string())),
            None => None,
        };
        let avatar_key = match patch.avatar_key.as_deref() {
            Some(raw) => Some(normalize_media_key(Some(raw))?),
            None => None,
        };

        let now = self.ctx.now();
        let user = &caller.user_id;
        let mut previous_avatar = None;
        let profile = self
            .ctx
            .update::<Profile, _>(Table::Users, &user_key(user), |current| {
                let mut profile = current.unwrap_or_else(|| Profile::empty(user.clone(), now));
                previous_avatar.clone_from(&profile.avatar_key);
                if let Some(name) = &full_name {
                    profile.full_name.clone_from(name);
                }
                if let Some(avatar) = &avatar_key {
                    profile.avatar_key.clone_from(avatar);
                }
                if profile.email.is_none() {
                    profile.email.clone_from(&caller.email);
                }
                profile.updated_at = now;
                Ok(Change::Put(profile))
            })?
            .ok_or_else(|| ScooterError::StorageError("profile write lost".to_string()))?;

        if let Some(handle) = &profile.handle {
            if profile.avatar_key != previous_avatar {
                self.republish_avatar(handle, user, profile.avatar_key.clone());
            }
        }
        Ok(profile)
    }

    // =========================================================================
    // HYDRATION
    // =========================================================================

    fn summary_of(&self, user: &UserId, profile: Option<Profile>) -> UserSummary {
        match profile {
            Some(p) => UserSummary {
                display_name: p.display_name(),
                avatar_url: self.ctx.config.media_url(p.avatar_key.as_deref()),
                user_id: p.user_id,
                handle: p.handle,
                full_name: p.full_name,
                avatar_key: p.avatar_key,
            },
            None => UserSummary {
                user_id: user.clone(),
                handle: None,
                display_name: user.to_string(),
                full_name: None,
                avatar_key: None,
                avatar_url: None,
            },
        }
    }

    /// Batch-hydrate users. Unknown users get a bare summary.
    pub fn summaries(
        &self,
        users: &[UserId],
    ) -> Result<BTreeMap<UserId, UserSummary>, ScooterError> {
        let unique: Vec<UserId> = users
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let keys: Vec<Key> = unique.iter().map(user_key).collect();
        let profiles = self.ctx.load_many::<Profile>(Table::Users, &keys)?;

        Ok(unique
            .into_iter()
            .zip(profiles)
            .map(|(user, profile)| {
                let summary = self.summary_of(&user, profile);
                (user, summary)
            })
            .collect())
    }

    /// Profiles of the given users that exist.
    pub fn profiles(&self, users: &[UserId]) -> Result<BTreeMap<UserId, Profile>, ScooterError> {
        let unique: Vec<UserId> = users
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let keys: Vec<Key> = unique.iter().map(user_key).collect();
        Ok(unique
            .into_iter()
            .zip(self.ctx.load_many::<Profile>(Table::Users, &keys)?)
            .filter_map(|(user, profile)| profile.map(|p| (user, p)))
            .collect())
    }

    /// Hydrate one user.
    pub fn summary(&self, user: &UserId) -> Result<UserSummary, ScooterError> {
        let profile = self.profile(user)?;
        Ok(self.summary_of(user, profile))
    }

    /// Users whose handle or full name starts with `raw` (leading `@` ignored).
    ///
    /// Handle matches come first, in handle order.
    pub fn search(&self, raw: &str, limit: usize) -> Result<Vec<UserSummary>, ScooterError> {
        let needle = raw.trim().trim_start_matches('@').to_lowercase();
        if needle.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let mut found: Vec<UserId> = Vec::new();
        let handle_like = needle
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
        if handle_like {
            let query = Query::prefix(needle.as_str()).limit(limit);
            for (_, reservation) in
                self.ctx
                    .query::<HandleReservation>(Table::Handles, HANDLE_PARTITION, &query)?
            {
                found.push(reservation.user_id);
            }
        }

        if found.len() < limit {
            let rows = self
                .ctx
                .store
                .scan(Table::Users, Some(primitives::SEARCH_SCAN_LIMIT))?;
            for item in rows {
                let profile: Profile = crate::formats::decode(&item.value)?;
                let matches = profile.full_name.as_deref().is_some_and(|name| {
                    let name = name.to_lowercase();
                    name.starts_with(&needle)
                        || name.split_whitespace().any(|word| word.starts_with(&needle))
                });
                if matches && !found.contains(&profile.user_id) {
                    found.push(profile.user_id);
                    if found.len() >= limit {
                        break;
                    }
                }
            }
        }

        let mut summaries = self.summaries(&found)?;
        Ok(found
            .iter()
            .filter_map(|user| summaries.remove(user))
            .collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CoreConfig;
    use crate::context::tests::memory_context;

    fn directory() -> Directory {
        Directory::new(memory_context(CoreConfig::default()))
    }

    #[test]
    fn normalize_handle_rules() {
        assert_eq!(normalize_handle("  Alice_1 ").expect("valid"), "alice_1");
        assert!(normalize_handle("ab").is_err());
        assert!(normalize_handle("this_handle_is_way_too_long").is_err());
        assert!(normalize_handle("bad-char").is_err());
        assert!(normalize_handle("émile").is_err());
    }

    #[test]
    fn claim_is_exclusive_and_idempotent() {
        let dir = directory();
        let alice = Caller::new("u-alice", Some("alice@example.com"));
        let mallory = Caller::new("u-mallory", None);

        let profile = dir.claim(&alice, "Alice").expect("claim");
        assert_eq!(profile.handle.as_deref(), Some("alice"));
        assert_eq!(profile.email.as_deref(), Some("alice@example.com"));

        // Same user, same handle: no-op.
        dir.claim(&alice, "alice").expect("idempotent");

        let err = dir.claim(&mallory, "alice").expect_err("taken");
        assert_eq!(err.status_code(), 409);
        assert!(dir.profile(&mallory.user_id).expect("load").is_none());

        let err = dir.claim(&alice, "alice2").expect_err("immutable");
        assert_eq!(err.status_code(), 409);
        assert_eq!(
            dir.resolve_handle("@ALICE").expect("resolve"),
            alice.user_id
        );
    }

    #[test]
    fn orphaned_reservation_is_adopted() {
        let dir = directory();
        let bob = Caller::new("u-bob", None);
        let orphan = HandleReservation {
            handle: "bob".to_string(),
            user_id: bob.user_id.clone(),
            avatar_key: None,
            claimed_at: 1,
        };
        dir.ctx
            .save(Table::Handles, &handle_key("bob"), &orphan)
            .expect("seed orphan");

        let profile = dir.claim(&bob, "bob").expect("adopt");
        assert_eq!(profile.handle.as_deref(), Some("bob"));
    }

    #[test]
    fn avatar_is_republished_to_reservation() {
        let dir = directory();
        let carol = Caller::new("u-carol", None);
        dir.claim(&carol, "carol").expect("claim");

        let patch = ProfilePatch {
            avatar_key: Some("avatars/carol.png".to_string()),
            full_name: Some("Carol Danvers".to_string()),
        };
        dir.update_profile(&carol, &patch).expect("update");

        let reservation = dir.lookup_handle("carol").expect("lookup").expect("exists");
        assert_eq!(reservation.avatar_key.as_deref(), Some("avatars/carol.png"));

        let cleared = dir
            .update_profile(
                &carol,
                &ProfilePatch {
                    avatar_key: Some(String::new()),
                    full_name: None,
                },
            )
            .expect("clear");
        assert!(cleared.avatar_key.is_none());
        assert_eq!(cleared.full_name.as_deref(), Some("Carol Danvers"));
    }

    #[test]
    fn oversized_full_name_is_rejected_before_write() {
        let dir = directory();
        let dave = Caller::new("u-dave", None);
        let patch = ProfilePatch {
            full_name: Some("x".repeat(MAX_FULL_NAME_CHARS + 1)),
            avatar_key: None,
        };
        assert_eq!(
            dir.update_profile(&dave, &patch).expect_err("too long").status_code(),
            400
        );
        assert!(dir.profile(&dave.user_id).expect("load").is_none());
    }

    #[test]
    fn search_by_handle_and_name() {
        let dir = directory();
        let alice = Caller::new("u-alice", None);
        let albert = Caller::new("u-albert", None);
        let zed = Caller::new("u-zed", None);
        dir.claim(&alice, "alice").expect("claim");
        dir.claim(&albert, "albert").expect("claim");
        dir.claim(&zed, "zed").expect("claim");
        dir.update_profile(
            &zed,
            &ProfilePatch {
                full_name: Some("Alfred Zed".to_string()),
                avatar_key: None,
            },
        )
        .expect("name");

        let hits = dir.search("@al", 25).expect("search");
        let handles: Vec<_> = hits.iter().filter_map(|s| s.handle.as_deref()).collect();
        assert_eq!(handles, vec!["albert", "alice", "zed"]);

        assert_eq!(dir.search("al", 1).expect("search").len(), 1);
        assert!(dir.search("   ", 25).expect("search").is_empty());
    }

    #[test]
    fn summaries_fall_back_for_unknown_users() {
        let dir = directory();
        let ghost = UserId::new("u-ghost");
        let map = dir.summaries(&[ghost.clone(), ghost.clone()]).expect("hydrate");
        assert_eq!(map.len(), 1);
        assert_eq!(map[&ghost].display_name, "u-ghost");
    }
}
