//! # Invites
//!
//! Admin-issued invite codes with a bounded number of uses.
//!
//! A code is one item in the `invites` table. Issuing is a conditional
//! insert (a colliding code is regenerated). Redeeming decrements the
//! remaining uses with a compare-and-swap, so two redeemers can never both
//! take the last use.

use crate::config::Feature;
use crate::context::{Change, Context};
use crate::primitives::{INVITE_CODE_LEN, INVITE_MAX_USES};
use crate::storage::{Key, Table};
use crate::{Caller, Invite, ScooterError, UserId};
use tracing::{info, warn};

const ISSUE_ATTEMPTS: usize = 4;

fn invite_key(code: &str) -> Key {
    Key::single(code)
}

/// Random code of [`INVITE_CODE_LEN`] upper-case hex characters.
fn fresh_code() -> String {
    let mut code = uuid::Uuid::new_v4().simple().to_string();
    code.truncate(INVITE_CODE_LEN);
    code.to_uppercase()
}

fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// The invite component.
#[derive(Debug, Clone)]
pub struct Invites {
    ctx: Context,
}

impl Invites {
    pub(crate) fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    /// Issue a code on behalf of `caller`, who must be an administrator.
    pub fn issue_for(&self, caller: &Caller, uses: Option<u32>) -> Result<Invite, ScooterError> {
        self.ctx.config.features.require(Feature::Invites)?;
        if !self.ctx.config.is_admin(caller.email.as_deref()) {
            return Err(ScooterError::Forbidden("Admins only".to_string()));
        }
        self.issue(&caller.user_id, uses)
    }

    /// Issue a code without an admin check. Uses are clamped to `1..=100`.
    pub fn issue(&self, issuer: &UserId, uses: Option<u32>) -> Result<Invite, ScooterError> {
        self.ctx.config.features.require(Feature::Invites)?;
        let uses_remaining = uses.unwrap_or(1).clamp(1, INVITE_MAX_USES);

        for _ in 0..ISSUE_ATTEMPTS {
            let invite = Invite {
                code: fresh_code(),
                uses_remaining,
                created_by: issuer.clone(),
                created_at: self.ctx.now(),
            };
            if self
                .ctx
                .create(Table::Invites, &invite_key(&invite.code), &invite)?
            {
                info!(code = %invite.code, uses = uses_remaining, "invite issued");
                return Ok(invite);
            }
            warn!(code = %invite.code, "invite code collision, regenerating");
        }
        Err(ScooterError::Conflict("Could not allocate an invite code".to_string()))
    }

    /// Look up a code.
    pub fn get(&self, code: &str) -> Result<Option<Invite>, ScooterError> {
        self.ctx.load(Table::Invites, &invite_key(&normalize_code(code)))
    }

    /// Take one use of a code. Returns the invite after the decrement.
    pub fn redeem(&self, code: &str) -> Result<Invite, ScooterError> {
        self.ctx.config.features.require(Feature::Invites)?;
        let code = normalize_code(code);
        if code.is_empty() {
            return Err(ScooterError::validation("Invite code is required"));
        }

        self.ctx
            .update::<Invite, _>(Table::Invites, &invite_key(&code), |current| {
                let Some(mut invite) = current else {
                    return Err(ScooterError::not_found("Invalid invite code"));
                };
                if invite.uses_remaining == 0 {
                    return Err(ScooterError::Conflict("Invite code exhausted".to_string()));
                }
                invite.uses_remaining -= 1;
                Ok(Change::Put(invite))
            })?
            .ok_or_else(|| ScooterError::not_found("Invalid invite code"))
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

    fn invites() -> Invites {
        Invites::new(memory_context(
            CoreConfig::default().with_admin_emails(["Admin@Example.com"]),
        ))
    }

    #[test]
    fn codes_are_upper_hex() {
        let code = fresh_code();
        assert_eq!(code.len(), INVITE_CODE_LEN);
        assert!(code.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b)));
    }

    #[test]
    fn only_admins_issue() {
        let invites = invites();
        let admin = Caller::new("u-admin", Some("admin@example.com"));
        let plain = Caller::new("u-plain", Some("someone@example.com"));
        let anonymous = Caller::new("u-anon", None);

        assert!(invites.issue_for(&admin, Some(3)).is_ok());
        assert_eq!(invites.issue_for(&plain, None).expect_err("plain").status_code(), 403);
        assert_eq!(invites.issue_for(&anonymous, None).expect_err("anon").status_code(), 403);
    }

    #[test]
    fn uses_are_clamped() {
        let invites = invites();
        let issuer = UserId::new("u-admin");
        assert_eq!(invites.issue(&issuer, Some(0)).expect("zero").uses_remaining, 1);
        assert_eq!(invites.issue(&issuer, Some(1_000)).expect("many").uses_remaining, 100);
        assert_eq!(invites.issue(&issuer, None).expect("default").uses_remaining, 1);
    }

    #[test]
    fn redeem_counts_down_then_conflicts() {
        let invites = invites();
        let invite = invites.issue(&UserId::new("u-admin"), Some(2)).expect("issue");

        let lower = invite.code.to_lowercase();
        assert_eq!(invites.redeem(&lower).expect("first").uses_remaining, 1);
        assert_eq!(invites.redeem(&invite.code).expect("second").uses_remaining, 0);
        assert_eq!(invites.redeem(&invite.code).expect_err("spent").status_code(), 409);
        assert_eq!(invites.redeem("NOPE0000").expect_err("unknown").status_code(), 404);
    }
}
