//! seqsync-schemas
//!
//! Wire data model for server-pushed state updates.
//!
//! Sequence identifiers arrive from several producers and are not always
//! well-typed on the wire (numbers, numeric strings, `null`). Parsing is
//! lenient by contract: a malformed identifier becomes `None` and never fails
//! the surrounding batch. Callers that need a concrete value use
//! [`UpdateBatch::previous_or_sentinel`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

// ---------------------------------------------------------------------------
// SequenceId
// ---------------------------------------------------------------------------

/// Position of a client in the server's update stream.
///
/// Monotonically non-decreasing per client. [`SequenceId::NONE`] is the
/// "no identifier" sentinel used when a batch omits its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceId(u64);

impl SequenceId {
    /// Sentinel for "no identifier".
    pub const NONE: SequenceId = SequenceId(0);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

impl From<u64> for SequenceId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parse a sequence identifier from an arbitrary JSON value.
///
/// Accepts non-negative integers, integral floats and numeric strings.
/// Everything else (negative, fractional, `null`, objects, garbage strings)
/// yields `None`.
pub fn parse_sequence(v: &Value) -> Option<SequenceId> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            })
            .map(SequenceId),
        Value::String(s) => s.trim().parse::<u64>().ok().map(SequenceId),
        _ => None,
    }
}

fn lenient_sequence<'de, D>(d: D) -> Result<Option<SequenceId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(d)?;
    Ok(raw.as_ref().and_then(parse_sequence))
}

// ---------------------------------------------------------------------------
// StateUpdate
// ---------------------------------------------------------------------------

/// How a [`StateUpdate`] mutates its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateOp {
    /// Replace the stored value.
    Set,
    /// Shallow object merge; non-object values replace.
    Merge,
    /// Delete the key.
    Remove,
}

/// One keyed mutation of local state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub key: String,
    pub op: UpdateOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl StateUpdate {
    pub fn set(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            op: UpdateOp::Set,
            value: Some(value),
        }
    }

    pub fn merge(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            op: UpdateOp::Merge,
            value: Some(value),
        }
    }

    pub fn remove(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            op: UpdateOp::Remove,
            value: None,
        }
    }
}

// ---------------------------------------------------------------------------
// UpdateBatch
// ---------------------------------------------------------------------------

/// A batch of state updates pushed by the server.
///
/// Transient: built by the transport per push, consumed by one reconcile
/// call, then dropped (or captured for deferred catch-up).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBatch {
    /// Sequence the server believes the client was at before this batch.
    #[serde(
        rename = "previousSequenceID",
        default,
        deserialize_with = "lenient_sequence",
        skip_serializing_if = "Option::is_none"
    )]
    pub previous_sequence_id: Option<SequenceId>,

    /// Sequence the client reaches once this batch is applied.
    #[serde(
        rename = "lastSequenceID",
        default,
        deserialize_with = "lenient_sequence",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_sequence_id: Option<SequenceId>,

    #[serde(default)]
    pub updates: Vec<StateUpdate>,

    /// Server withheld the payload (size limit); the client must fetch up to
    /// `pending_sequence_id` separately.
    #[serde(default)]
    pub requires_pending_fetch: bool,

    #[serde(
        rename = "pendingSequenceID",
        default,
        deserialize_with = "lenient_sequence",
        skip_serializing_if = "Option::is_none"
    )]
    pub pending_sequence_id: Option<SequenceId>,
}

impl UpdateBatch {
    /// A regular batch moving the client from `previous` to `last`.
    pub fn new(previous: u64, last: u64, updates: Vec<StateUpdate>) -> Self {
        Self {
            previous_sequence_id: Some(SequenceId(previous)),
            last_sequence_id: Some(SequenceId(last)),
            updates,
            requires_pending_fetch: false,
            pending_sequence_id: None,
        }
    }

    /// A payload-less batch telling the client to fetch up to `pending`.
    pub fn pending_fetch(pending: u64) -> Self {
        Self {
            requires_pending_fetch: true,
            pending_sequence_id: Some(SequenceId(pending)),
            ..Self::default()
        }
    }

    /// Declared predecessor, or [`SequenceId::NONE`] when absent or malformed.
    pub fn previous_or_sentinel(&self) -> SequenceId {
        self.previous_sequence_id.unwrap_or(SequenceId::NONE)
    }
}

// ---------------------------------------------------------------------------
// ReconciliationRequest
// ---------------------------------------------------------------------------

/// Caller-supplied context for one reconcile call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationRequest {
    /// Last sequence the client applied. `None` = unknown.
    pub client_last_sequence_id: Option<SequenceId>,
    /// `true` runs the full catch-up now; `false` records the batch for later.
    pub run_synchronous_catch_up: bool,
}

impl ReconciliationRequest {
    pub fn new(client_last_sequence_id: Option<SequenceId>, run_synchronous_catch_up: bool) -> Self {
        Self {
            client_last_sequence_id,
            run_synchronous_catch_up,
        }
    }
}
