use serde::Serialize;
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of the value's canonical JSON form.
///
/// All digested types serialize as struct trees with `Vec` collections, so
/// field order is declaration order and the bytes are deterministic.
pub(crate) fn of<T: Serialize>(value: &T) -> String {
    // Serialization of a plain struct tree cannot fail.
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Sample {
        label: String,
        value: i64,
    }

    #[test]
    fn digest_is_stable_for_equal_values() {
        let a = Sample {
            label: "x".into(),
            value: 1,
        };
        let b = Sample {
            label: "x".into(),
            value: 1,
        };
        assert_eq!(of(&a), of(&b));
        assert_eq!(of(&a).len(), 64);
    }

    #[test]
    fn digest_differs_when_a_field_changes() {
        let a = Sample {
            label: "x".into(),
            value: 1,
        };
        let b = Sample {
            label: "x".into(),
            value: 2,
        };
        assert_ne!(of(&a), of(&b));
    }
}
