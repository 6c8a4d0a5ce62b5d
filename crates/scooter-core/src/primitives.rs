//! # Primitives
//!
//! Hardcoded limits and constants for the Scooter core.
//!
//! Every read is bounded by one of these values. They are compiled into the
//! binary; only feature toggles and the admin list are configurable.

// =============================================================================
// RECORD FORMAT
// =============================================================================

/// Version byte prefixed to every stored record.
///
/// Increment this when making breaking changes to a record layout.
pub const RECORD_FORMAT_VERSION: u8 = 1;

/// Maximum size of a single encoded record.
///
/// Validated before decoding so a corrupted row cannot trigger a large
/// allocation.
pub const MAX_RECORD_SIZE: usize = 64 * 1024;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length of post and comment text, in characters.
pub const MAX_TEXT_CHARS: usize = 500;

/// Minimum handle length.
pub const MIN_HANDLE_LEN: usize = 3;

/// Maximum handle length.
pub const MAX_HANDLE_LEN: usize = 20;

/// Maximum length of a reaction emoji, in characters.
pub const MAX_EMOJI_CHARS: usize = 8;

/// Maximum length of a profile full name, in characters.
pub const MAX_FULL_NAME_CHARS: usize = 100;

/// Maximum length of an opaque media key.
pub const MAX_MEDIA_KEY_LEN: usize = 512;

// =============================================================================
// READ BOUNDS
// =============================================================================

/// Number of posts in a feed page.
pub const FEED_LIMIT: usize = 50;

/// Posts fetched per followee when building the following feed.
pub const PER_FOLLOWEE_LIMIT: usize = 20;

/// Maximum followees considered when building the following feed.
pub const FOLLOWING_SCAN_LIMIT: usize = 500;

/// Maximum results of a user search.
pub const SEARCH_LIMIT: usize = 25;

/// Maximum profile rows examined by a full-name search.
pub const SEARCH_SCAN_LIMIT: usize = 1000;

/// Comments per page.
pub const COMMENT_PAGE_SIZE: usize = 50;

/// Posts shown on a profile page.
pub const PROFILE_POSTS_LIMIT: usize = 50;

/// Default and maximum inbox page size.
pub const NOTIFICATION_LIMIT: usize = 50;

/// Most recent inbox rows examined by the unread counter.
pub const UNREAD_SCAN_LIMIT: usize = 200;

// =============================================================================
// CONCURRENCY
// =============================================================================

/// Attempts of a compare-and-swap loop before giving up.
pub const MAX_CAS_RETRIES: usize = 8;

// =============================================================================
// INVITES
// =============================================================================

/// Upper bound of uses for a single invite code.
pub const INVITE_MAX_USES: u32 = 100;

/// Length of an invite code.
pub const INVITE_CODE_LEN: usize = 8;

// Compile-time sanity checks.
const _: () = {
    assert!(PER_FOLLOWEE_LIMIT <= FEED_LIMIT);
    assert!(MIN_HANDLE_LEN <= MAX_HANDLE_LEN);
    assert!(NOTIFICATION_LIMIT <= UNREAD_SCAN_LIMIT);
    assert!(INVITE_CODE_LEN <= 32);
};
