//! Domain invariants for the Execution Layer
//!
//! Checks the block driver runs on its own history. A failing check means the
//! ordering machinery is broken, not that a deploy failed.

use super::value_objects::{DeployKey, STATE_HASH_LENGTH};

/// Every deploy runs strictly after the previous one in key order.
pub fn invariant_strictly_ascending(previous: Option<DeployKey>, next: DeployKey) -> bool {
    previous.map_or(true, |prev| prev < next)
}

/// Stored state hashes are exactly the engine's hash width.
pub fn invariant_state_hash_width(bytes: &[u8]) -> bool {
    bytes.len() == STATE_HASH_LENGTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strictly_ascending() {
        assert!(invariant_strictly_ascending(None, DeployKey::new(4, 2)));
        assert!(invariant_strictly_ascending(
            Some(DeployKey::new(0, 5)),
            DeployKey::new(1, 0)
        ));
        assert!(!invariant_strictly_ascending(
            Some(DeployKey::new(1, 0)),
            DeployKey::new(1, 0)
        ));
        assert!(!invariant_strictly_ascending(
            Some(DeployKey::new(2, 0)),
            DeployKey::new(1, 3)
        ));
    }

    #[test]
    fn test_hash_width() {
        assert!(invariant_state_hash_width(&[0; 32]));
        assert!(!invariant_state_hash_width(&[0; 33]));
    }
}
