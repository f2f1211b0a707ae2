use rand::RngCore;
use sha2::{Digest, Sha256};

/// A unique, deterministic learner identifier.
///
/// Derived from the learner's `(host, port)` endpoint so that re-adding the
/// same endpoint always yields the same id. Unlike [`AuthToken`] it is not
/// meant to be secret.
#[derive(Eq, PartialEq, Hash, Copy, Clone, Serialize, Deserialize)]
pub struct LearnerId([u8; 16]);

impl LearnerId {
    /// Derive the id of the learner listening at `host:port`.
    ///
    /// Truncates a SHA-256 digest of the endpoint to 16 bytes: enough entropy
    /// to make collisions between distinct endpoints practically impossible,
    /// while remaining stable across coordinator restarts.
    pub fn generate(host: &str, port: u16) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(host.as_bytes());
        hasher.update(b":");
        hasher.update(&port.to_be_bytes());
        let digest = hasher.finalize();
        let mut id = [0u8; 16];
        id.copy_from_slice(&digest[..16]);
        Self(id)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl ::std::fmt::Display for LearnerId {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl ::std::fmt::Debug for LearnerId {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        write!(f, "LearnerId({})", self.to_hex())
    }
}

/// An opaque, cryptographically unguessable token handed to a learner on
/// admission and required on every subsequent authenticated call.
#[derive(Eq, PartialEq, Hash, Clone, Serialize, Deserialize)]
pub struct AuthToken(String);

impl AuthToken {
    /// Generate a fresh token backed by 32 bytes from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(&bytes))
    }

    /// Build a token from an already-known string, e.g. one received over
    /// the wire from a learner.
    pub fn from_str(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl ::std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        write!(f, "AuthToken(<redacted>)")
    }
}
