mod memory_store;
mod store;

use chrono::{DateTime, Utc};
pub use memory_store::InMemorySessionStore;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
pub use store::{Committed, CreateOutcome, SessionStore};

use crate::SessionError;

/// Catalog item identifier (e.g. a TMDB movie id).
pub type ItemId = u64;

/// Process-local anonymous participant token.
///
/// Carries no authentication guarantee and no cross-session meaning.
pub type ParticipantId = String;

/// Sessions hold at most two participants.
pub const MAX_PARTICIPANTS: usize = 2;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const PARTICIPANT_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generates a fresh anonymous participant token (`user_` + 9 random
/// base36 characters).
pub fn generate_participant_id() -> ParticipantId {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| PARTICIPANT_ALPHABET[rng.gen_range(0..PARTICIPANT_ALPHABET.len())] as char)
        .collect();
    format!("user_{}", suffix)
}

/// A 6-character `[A-Z0-9]` session code.
///
/// Codes are case-insensitive on input and stored uppercase. Use
/// [`SessionCode::generate`] for a fresh random code and
/// [`SessionCode::parse`] to normalize caller-supplied input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionCode(String);

impl SessionCode {
    /// Length of every session code.
    pub const LENGTH: usize = 6;

    /// Generates a random code. Uniqueness is the store's concern, not
    /// this function's.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code: String = (0..Self::LENGTH)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Normalizes caller input to an uppercase code.
    ///
    /// Surrounding whitespace is trimmed and lowercase letters are accepted;
    /// anything that could never name a session fails with
    /// [`SessionError::InvalidCode`].
    pub fn parse(input: &str) -> Result<Self, SessionError> {
        let normalized = input.trim().to_ascii_uppercase();
        let valid = normalized.len() == Self::LENGTH
            && normalized
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
        if valid {
            Ok(Self(normalized))
        } else {
            Err(SessionError::InvalidCode(input.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable proof that both participants liked the same item.
///
/// Metadata fields are `None` while the record awaits catalog enrichment;
/// enrichment only fills empty fields, it never rewrites populated ones, and
/// a record is never removed once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub item_id: ItemId,
    pub title: Option<String>,
    pub image_path: Option<String>,
    pub rating_score: Option<f64>,
    pub matched_at: DateTime<Utc>,
}

impl MatchRecord {
    /// A record with catalog metadata already in hand.
    pub fn new(
        item_id: ItemId,
        title: String,
        image_path: Option<String>,
        rating_score: f64,
    ) -> Self {
        Self {
            item_id,
            title: Some(title),
            image_path,
            rating_score: Some(rating_score),
            matched_at: Utc::now(),
        }
    }

    /// A record written before catalog metadata could be fetched.
    pub fn placeholder(item_id: ItemId) -> Self {
        Self {
            item_id,
            title: None,
            image_path: None,
            rating_score: None,
            matched_at: Utc::now(),
        }
    }

    /// Whether catalog metadata has been filled in.
    pub fn is_enriched(&self) -> bool {
        self.title.is_some()
    }
}

/// One two-party matching session, the unit the store persists and the
/// notifier pushes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub code: SessionCode,
    pub created_at: DateTime<Utc>,
    pub created_by: ParticipantId,
    /// Insertion-ordered, at most [`MAX_PARTICIPANTS`] entries.
    pub users: Vec<ParticipantId>,
    /// item id -> participant id -> liked.
    pub swipes: HashMap<ItemId, HashMap<ParticipantId, bool>>,
    /// Append-only; see [`MatchRecord`].
    pub matches: Vec<MatchRecord>,
    /// Soft lifecycle marker. No hard expiry policy is defined.
    pub active: bool,
}

impl Session {
    /// A fresh session with its creator as the only participant.
    pub fn new(code: SessionCode, created_by: ParticipantId) -> Self {
        Self {
            code,
            created_at: Utc::now(),
            created_by: created_by.clone(),
            users: vec![created_by],
            swipes: HashMap::new(),
            matches: Vec::new(),
            active: true,
        }
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.users.iter().any(|u| u == user_id)
    }

    /// Records or overwrites one participant's vote on one item.
    ///
    /// A later vote from the same participant replaces the earlier one;
    /// there is never more than one vote per participant per item.
    pub fn record_vote(&mut self, item_id: ItemId, user_id: ParticipantId, liked: bool) {
        self.swipes.entry(item_id).or_default().insert(user_id, liked);
    }

    pub fn has_match_for(&self, item_id: ItemId) -> bool {
        self.matches.iter().any(|m| m.item_id == item_id)
    }

    /// Appends a match record unless one already exists for the item.
    ///
    /// Returns whether the record was appended. The no-op branch is what
    /// keeps concurrent double-append attempts idempotent.
    pub fn append_match(&mut self, record: MatchRecord) -> bool {
        if self.has_match_for(record.item_id) {
            return false;
        }
        self.matches.push(record);
        true
    }
}
