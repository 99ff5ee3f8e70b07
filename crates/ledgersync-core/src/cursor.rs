//! Opaque pagination cursor codec (component C1).
//!
//! A cursor is the pair `(updatedAtMs, uid)` used to key pull pagination.
//! Callers outside this module must treat the encoded form as opaque;
//! nothing besides [`Cursor::encode`]/[`Cursor::decode`] understands the
//! wire representation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use uuid::Uuid;

/// A decoded pagination position: a millisecond timestamp and a tie-break
/// uid. Ordering is lexicographic on `(ms, uid)`, so pulls stay total even
/// when many rows share a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor {
    pub ms: i64,
    pub uid: Uuid,
}

impl Cursor {
    /// The cursor that compares less than every real row: `(0, Uuid::nil())`.
    pub const EPOCH: Cursor = Cursor {
        ms: 0,
        uid: Uuid::nil(),
    };

    pub fn new(ms: i64, uid: Uuid) -> Self {
        Self { ms, uid }
    }

    /// Encodes this cursor as an opaque base64url string.
    pub fn encode(&self) -> String {
        let mut bytes = Vec::with_capacity(24);
        bytes.extend_from_slice(&self.ms.to_be_bytes());
        bytes.extend_from_slice(self.uid.as_bytes());
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Decodes an opaque cursor string. Any malformed or missing input
    /// (empty string, bad base64, wrong length) decodes to [`Cursor::EPOCH`]
    /// rather than erroring — pull callers always get a usable starting
    /// point.
    pub fn decode(raw: Option<&str>) -> Cursor {
        let Some(raw) = raw.filter(|s| !s.is_empty()) else {
            return Cursor::EPOCH;
        };
        let Ok(bytes) = URL_SAFE_NO_PAD.decode(raw) else {
            return Cursor::EPOCH;
        };
        if bytes.len() != 24 {
            return Cursor::EPOCH;
        }
        let ms = i64::from_be_bytes(bytes[0..8].try_into().expect("checked length"));
        let uid = Uuid::from_slice(&bytes[8..24]).expect("checked length");
        Cursor { ms, uid }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_any_valid_cursor() {
        let c = Cursor::new(1_700_000_000_123, Uuid::new_v4());
        let encoded = c.encode();
        assert_eq!(Cursor::decode(Some(&encoded)), c);
    }

    #[test]
    fn missing_cursor_decodes_to_epoch() {
        assert_eq!(Cursor::decode(None), Cursor::EPOCH);
    }

    #[test]
    fn empty_cursor_decodes_to_epoch() {
        assert_eq!(Cursor::decode(Some("")), Cursor::EPOCH);
    }

    #[test]
    fn malformed_cursor_decodes_to_epoch() {
        assert_eq!(Cursor::decode(Some("not valid base64!!")), Cursor::EPOCH);
        assert_eq!(Cursor::decode(Some("aGVsbG8")), Cursor::EPOCH); // valid b64, wrong length
    }

    #[test]
    fn epoch_sorts_before_every_real_cursor() {
        let c = Cursor::new(1, Uuid::nil());
        assert!(Cursor::EPOCH < c);
    }

    #[test]
    fn ms_is_primary_sort_key() {
        let a = Cursor::new(1, Uuid::max());
        let b = Cursor::new(2, Uuid::nil());
        assert!(a < b);
    }

    #[test]
    fn uid_is_secondary_sort_key_on_ms_tie() {
        let a = Cursor::new(5, Uuid::nil());
        let b = Cursor::new(5, Uuid::max());
        assert!(a < b);
    }
}
