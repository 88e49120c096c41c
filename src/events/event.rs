use chrono::{DateTime, Utc};

use crate::session::{ItemId, ParticipantId, SessionCode};

/// Session events emitted by coordinator operations.
///
/// Events are always fired from operations. If no listeners are registered,
/// they are silently ignored (no-op). Register listeners via
/// [`register_event_listeners`](crate::register_event_listeners) to handle
/// events.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    // session lifecycle
    SessionCreated {
        code: SessionCode,
        created_by: ParticipantId,
        at: DateTime<Utc>,
    },
    ParticipantJoined {
        code: SessionCode,
        user_id: ParticipantId,
        at: DateTime<Utc>,
    },
    SessionLeft {
        code: SessionCode,
        user_id: ParticipantId,
        at: DateTime<Utc>,
    },

    // voting
    VoteRecorded {
        code: SessionCode,
        item_id: ItemId,
        user_id: ParticipantId,
        liked: bool,
        at: DateTime<Utc>,
    },

    // matches
    MatchFound {
        code: SessionCode,
        item_id: ItemId,
        at: DateTime<Utc>,
    },
    MatchEnriched {
        code: SessionCode,
        item_id: ItemId,
        at: DateTime<Utc>,
    },
    EnrichmentFailed {
        code: SessionCode,
        item_id: ItemId,
        reason: String,
        at: DateTime<Utc>,
    },
}

impl SessionEvent {
    /// Returns a dot-separated event name for logging/tracing.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionCreated { .. } => "session.created",
            Self::ParticipantJoined { .. } => "session.participant.joined",
            Self::SessionLeft { .. } => "session.left",
            Self::VoteRecorded { .. } => "session.vote.recorded",
            Self::MatchFound { .. } => "session.match.found",
            Self::MatchEnriched { .. } => "session.match.enriched",
            Self::EnrichmentFailed { .. } => "session.match.enrichment_failed",
        }
    }

    /// Returns the timestamp when this event occurred.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::SessionCreated { at, .. }
            | Self::ParticipantJoined { at, .. }
            | Self::SessionLeft { at, .. }
            | Self::VoteRecorded { at, .. }
            | Self::MatchFound { at, .. }
            | Self::MatchEnriched { at, .. }
            | Self::EnrichmentFailed { at, .. } => *at,
        }
    }
}
