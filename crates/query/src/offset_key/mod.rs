//! Offset keys: serialized enumeration positions.
//!
//! Wire layout (format version 1):
//!
//! ```text
//! [format_version: u8][shape_fingerprint: u64 LE][node_state_count: varint][node_state ...]
//! ```
//!
//! Node states appear in plan pre-order; each starts with its node kind tag
//! (see `NodeKind::tag`). Decoding validates the version, the fingerprint,
//! the state count and every kind tag before any cursor is touched, and
//! rejects trailing bytes. Any failure is an `InvalidOffsetKey`.

mod state;
mod token;
mod wire;

pub use state::{
    GroupState, JoinState, LookupState, NodeState, ScanPosition, ScanState, SortPosition, SortState,
    WindowState,
};
pub use token::{decode_token, encode_token, TokenDecodeError, MAX_TOKEN_HEX_LEN};

use crate::error::{EngineResult, OffsetKeyError};
use crate::executor::{ExecutionEnumerator, RowSource};
use crate::planner::{PlanTemplate, ShapeFingerprint};
use resumedb_core::Value;
use std::fmt;
use std::sync::Arc;
use tracing::warn;
use wire::{KeyReader, KeyWriter};

/// Current format version.
pub const FORMAT_VERSION: u8 = 1;

/// Upper bound on an accepted offset key.
pub const MAX_OFFSET_KEY_LEN: usize = 64 * 1024;

/// version byte + fingerprint
const HEADER_LEN: usize = 1 + 8;

/// An opaque, immutable resumption token. Owned by the caller; may be
/// handed to any worker.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OffsetKey(Box<[u8]>);

impl OffsetKey {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into().into_boxed_slice())
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0.into_vec()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fingerprint of the plan the key was captured from, if the header is
    /// intact.
    pub fn fingerprint(&self) -> Option<ShapeFingerprint> {
        let bytes: [u8; 8] = self.0.get(1..HEADER_LEN)?.try_into().ok()?;
        Some(ShapeFingerprint(u64::from_le_bytes(bytes)))
    }

    pub fn to_hex_token(&self) -> String {
        encode_token(&self.0)
    }

    pub fn from_hex_token(token: &str) -> Result<Self, OffsetKeyError> {
        Ok(Self::from_bytes(decode_token(token)?))
    }
}

impl fmt::Debug for OffsetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OffsetKey({})", self.to_hex_token())
    }
}

/// Serializes node states captured from a plan with `fingerprint`.
/// Deterministic: equal inputs give byte-identical keys.
pub(crate) fn encode_states(fingerprint: ShapeFingerprint, states: &[NodeState]) -> OffsetKey {
    let mut w = KeyWriter::new();
    w.u8(FORMAT_VERSION);
    w.u64(fingerprint.value());
    w.varint(states.len() as u64);
    for state in states {
        state.write(&mut w);
    }
    OffsetKey::from_bytes(w.into_bytes())
}

/// Parses and validates `key` against `template`.
pub(crate) fn decode_states(key: &OffsetKey, template: &PlanTemplate) -> Result<Vec<NodeState>, OffsetKeyError> {
    let bytes = key.as_bytes();
    if bytes.is_empty() {
        return Err(OffsetKeyError::Empty);
    }
    if bytes.len() > MAX_OFFSET_KEY_LEN {
        return Err(OffsetKeyError::TooLarge {
            len: bytes.len(),
            max: MAX_OFFSET_KEY_LEN,
        });
    }

    let mut r = KeyReader::new(bytes);
    let version = r.u8()?;
    if version != FORMAT_VERSION {
        return Err(OffsetKeyError::UnsupportedVersion(version));
    }
    let fingerprint = ShapeFingerprint(r.u64()?);
    if fingerprint != template.fingerprint() {
        return Err(OffsetKeyError::FingerprintMismatch {
            key: fingerprint,
            plan: template.fingerprint(),
        });
    }
    let count = r.varint()?;
    if count != template.node_count() as u64 {
        return Err(OffsetKeyError::NodeCountMismatch {
            key: count,
            plan: template.node_count(),
        });
    }

    let mut states = Vec::with_capacity(template.node_count());
    for (position, node) in template.plan().preorder().into_iter().enumerate() {
        states.push(NodeState::read(&mut r, node, position)?);
    }
    if r.remaining() != 0 {
        return Err(OffsetKeyError::TrailingBytes(r.remaining()));
    }
    Ok(states)
}

/// Captures the position of `enumerator`. See
/// `ExecutionEnumerator::capture_offset_key`.
pub fn encode(enumerator: &ExecutionEnumerator) -> Option<OffsetKey> {
    enumerator.capture_offset_key()
}

/// Binds a new enumerator for `template` on `source`, positioned just after
/// the row `key` was captured at.
pub fn decode(
    key: &OffsetKey,
    template: Arc<PlanTemplate>,
    source: Box<dyn RowSource>,
    params: Vec<Value>,
) -> EngineResult<ExecutionEnumerator> {
    let states = decode_states(key, &template).map_err(|err| {
        warn!(
            error = %err,
            plan = %template.fingerprint(),
            query = template.query(),
            "offset key rejected"
        );
        err
    })?;
    ExecutionEnumerator::resume(template, source, params, states)
}
