//! Random identifiers and the bounded retry used to keep them unique.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::rand::{SecureRandom, SystemRandom};

use super::LinkError;

/// Generation attempts before a collision is reported as fatal.
pub const MAX_ID_ATTEMPTS: usize = 8;

/// 18 bytes -> 24 base64url characters.
const TOKEN_ID_BYTES: usize = 18;

/// 6 bytes -> 8 base64url characters.
const SHORT_KEY_BYTES: usize = 6;

/// Source of random bytes for identifiers.
pub trait Entropy: Send + Sync {
    fn fill(&self, dest: &mut [u8]) -> Result<(), LinkError>;
}

/// Operating system CSPRNG.
pub struct SystemEntropy {
    rng: SystemRandom,
}

impl SystemEntropy {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for SystemEntropy {
    fn default() -> Self {
        Self::new()
    }
}

impl Entropy for SystemEntropy {
    fn fill(&self, dest: &mut [u8]) -> Result<(), LinkError> {
        self.rng.fill(dest).map_err(|_| LinkError::Entropy)
    }
}

pub fn token_id(entropy: &dyn Entropy) -> Result<String, LinkError> {
    let mut bytes = [0u8; TOKEN_ID_BYTES];
    entropy.fill(&mut bytes)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

pub fn short_key(entropy: &dyn Entropy) -> Result<String, LinkError> {
    let mut bytes = [0u8; SHORT_KEY_BYTES];
    entropy.fill(&mut bytes)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

pub fn session_id(entropy: &dyn Entropy) -> Result<String, LinkError> {
    let mut bytes = [0u8; 16];
    entropy.fill(&mut bytes)?;
    Ok(uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .to_string())
}

/// Generate candidates until one is not `taken`, giving up after `attempts`.
pub fn generate_unique<G, T>(attempts: usize, mut generate: G, mut taken: T) -> Result<String, LinkError>
where
    G: FnMut() -> Result<String, LinkError>,
    T: FnMut(&str) -> bool,
{
    for attempt in 1..=attempts {
        let candidate = generate()?;
        if !taken(&candidate) {
            return Ok(candidate);
        }
        tracing::debug!(attempt, "Identifier collision, regenerating");
    }
    Err(LinkError::IdentifierCollision { attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Always yields the same bytes.
    struct Stuck;

    impl Entropy for Stuck {
        fn fill(&self, dest: &mut [u8]) -> Result<(), LinkError> {
            dest.fill(7);
            Ok(())
        }
    }

    /// Counts upward, one value per call.
    struct Counter(AtomicU64);

    impl Entropy for Counter {
        fn fill(&self, dest: &mut [u8]) -> Result<(), LinkError> {
            let n = self.0.fetch_add(1, Ordering::SeqCst).to_be_bytes();
            dest.fill(0);
            let len = dest.len();
            let take = len.min(n.len());
            dest[len - take..].copy_from_slice(&n[n.len() - take..]);
            Ok(())
        }
    }

    #[test]
    fn identifier_shapes() {
        let entropy = SystemEntropy::new();
        let token = token_id(&entropy).unwrap();
        let key = short_key(&entropy).unwrap();
        let session = session_id(&entropy).unwrap();

        assert_eq!(token.len(), 24);
        assert_eq!(key.len(), 8);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(uuid::Uuid::parse_str(&session).unwrap().get_version_num(), 4);
    }

    #[test]
    fn retries_past_collisions() {
        let entropy = Counter(AtomicU64::new(0));
        let taken: HashSet<String> = (0..3).map(|_| short_key(&entropy).unwrap()).collect();
        entropy.0.store(0, Ordering::SeqCst);

        let mut calls = 0;
        let key = generate_unique(
            MAX_ID_ATTEMPTS,
            || {
                calls += 1;
                short_key(&entropy)
            },
            |c| taken.contains(c),
        )
        .unwrap();

        assert_eq!(calls, 4);
        assert!(!taken.contains(&key));
    }

    #[test]
    fn gives_up_after_bounded_attempts() {
        let taken = short_key(&Stuck).unwrap();
        let err = generate_unique(MAX_ID_ATTEMPTS, || short_key(&Stuck), |c| c == taken).unwrap_err();
        assert!(matches!(err, LinkError::IdentifierCollision { attempts: MAX_ID_ATTEMPTS }));
    }
}
