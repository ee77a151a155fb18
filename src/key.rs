//! Index key type with stable ordering and byte encoding
//!
//! Keys are the indexed property values. Ordering is deterministic:
//! Bool < Int < Float < Text < Composite, and must stay stable for the
//! lifetime of an index because the storage backend sorts by the encoded
//! bytes.

use serde::{Deserialize, Serialize};

/// An indexed property value.
///
/// Supports booleans, integers, floats (stored as total-order bits),
/// text, and composite keys built from other keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IndexKey {
    /// Boolean value (false < true)
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Float value (stored as bits for total ordering)
    Float(u64),
    /// Text value
    Text(String),
    /// Composite value, ordered element-wise
    Composite(Vec<IndexKey>),
}

/// Encoding tag bytes. Tag order mirrors the variant order so scalar
/// encodings sort the same way the enum does.
const TAG_BOOL: u8 = 0x01;
const TAG_INT: u8 = 0x02;
const TAG_FLOAT: u8 = 0x03;
const TAG_TEXT: u8 = 0x04;
const TAG_COMPOSITE: u8 = 0x05;

impl IndexKey {
    /// Create a key from a boolean
    pub fn from_bool(v: bool) -> Self {
        IndexKey::Bool(v)
    }

    /// Create a key from an integer
    pub fn from_int(v: i64) -> Self {
        IndexKey::Int(v)
    }

    /// Create a key from a float.
    ///
    /// Uses bit representation for total ordering: negative floats flip
    /// all bits, positive floats flip the sign bit.
    pub fn from_float(v: f64) -> Self {
        let bits = v.to_bits();
        let ordered = if (bits >> 63) == 1 {
            !bits
        } else {
            bits ^ (1 << 63)
        };
        IndexKey::Float(ordered)
    }

    /// Create a key from text
    pub fn from_text(v: impl Into<String>) -> Self {
        IndexKey::Text(v.into())
    }

    /// Create a composite key from parts
    pub fn composite(parts: Vec<IndexKey>) -> Self {
        IndexKey::Composite(parts)
    }

    /// Create a key from a JSON value.
    ///
    /// Arrays of indexable values become composite keys. Objects and
    /// nulls are not indexable and return `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(IndexKey::from_bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(IndexKey::from_int(i))
                } else {
                    n.as_f64().map(IndexKey::from_float)
                }
            }
            serde_json::Value::String(s) => Some(IndexKey::from_text(s)),
            serde_json::Value::Array(items) => {
                let parts: Option<Vec<IndexKey>> = items.iter().map(IndexKey::from_json).collect();
                parts.map(IndexKey::Composite)
            }
            _ => None,
        }
    }

    /// Encode the key into a stable, injective byte sequence.
    ///
    /// Scalar encodings are order-preserving (sign-flipped big-endian
    /// integers, total-order float bits, raw UTF-8 text). Composite
    /// elements are length-prefixed, which keeps the encoding injective
    /// and stable; equality lookups are the contract, not collation.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            IndexKey::Bool(b) => {
                out.push(TAG_BOOL);
                out.push(u8::from(*b));
            }
            IndexKey::Int(i) => {
                out.push(TAG_INT);
                // Flip the sign bit so negative values sort before positive
                let flipped = (*i as u64) ^ (1 << 63);
                out.extend_from_slice(&flipped.to_be_bytes());
            }
            IndexKey::Float(bits) => {
                out.push(TAG_FLOAT);
                out.extend_from_slice(&bits.to_be_bytes());
            }
            IndexKey::Text(s) => {
                out.push(TAG_TEXT);
                out.extend_from_slice(s.as_bytes());
            }
            IndexKey::Composite(parts) => {
                out.push(TAG_COMPOSITE);
                out.extend_from_slice(&(parts.len() as u32).to_be_bytes());
                for part in parts {
                    let mut encoded = Vec::new();
                    part.encode_into(&mut encoded);
                    out.extend_from_slice(&(encoded.len() as u32).to_be_bytes());
                    out.extend_from_slice(&encoded);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ordering() {
        let keys = vec![
            IndexKey::from_bool(false),
            IndexKey::from_bool(true),
            IndexKey::from_int(-100),
            IndexKey::from_int(0),
            IndexKey::from_int(100),
            IndexKey::from_text("aaa"),
            IndexKey::from_text("zzz"),
        ];

        for i in 1..keys.len() {
            assert!(keys[i - 1] < keys[i], "keys should be ordered");
        }
    }

    #[test]
    fn test_float_total_order() {
        let values = [-1000.5, -1.0, -0.25, 0.0, 0.25, 1.0, 1000.5];
        for w in values.windows(2) {
            assert!(IndexKey::from_float(w[0]) < IndexKey::from_float(w[1]));
        }
    }

    #[test]
    fn test_scalar_encoding_preserves_order() {
        let ints = [i64::MIN, -100, -1, 0, 1, 100, i64::MAX];
        for w in ints.windows(2) {
            let a = IndexKey::from_int(w[0]).encode();
            let b = IndexKey::from_int(w[1]).encode();
            assert!(a < b, "{} should encode below {}", w[0], w[1]);
        }
    }

    #[test]
    fn test_encoding_injective_across_variants() {
        let keys = [
            IndexKey::from_bool(true),
            IndexKey::from_int(1),
            IndexKey::from_float(1.0),
            IndexKey::from_text("1"),
            IndexKey::composite(vec![IndexKey::from_int(1)]),
            IndexKey::composite(vec![IndexKey::from_int(1), IndexKey::from_int(2)]),
            IndexKey::composite(vec![IndexKey::from_text("ab")]),
            IndexKey::composite(vec![IndexKey::from_text("a"), IndexKey::from_text("b")]),
        ];

        for (i, a) in keys.iter().enumerate() {
            for (j, b) in keys.iter().enumerate() {
                if i != j {
                    assert_ne!(a.encode(), b.encode(), "{:?} vs {:?}", a, b);
                }
            }
        }
    }

    #[test]
    fn test_from_json() {
        assert_eq!(
            IndexKey::from_json(&serde_json::json!(true)),
            Some(IndexKey::Bool(true))
        );
        assert_eq!(
            IndexKey::from_json(&serde_json::json!(42)),
            Some(IndexKey::Int(42))
        );
        assert_eq!(
            IndexKey::from_json(&serde_json::json!("hello")),
            Some(IndexKey::Text("hello".to_string()))
        );
        assert_eq!(
            IndexKey::from_json(&serde_json::json!([1, "a"])),
            Some(IndexKey::Composite(vec![
                IndexKey::Int(1),
                IndexKey::Text("a".to_string()),
            ]))
        );
        assert_eq!(IndexKey::from_json(&serde_json::json!({"a": 1})), None);
        assert_eq!(IndexKey::from_json(&serde_json::Value::Null), None);
    }
}
