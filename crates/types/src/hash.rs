use {
    data_encoding::BASE64,
    sha2::{Digest, Sha256},
    std::fmt,
};

/// Length in bytes of a SHA-256 digest.
pub const HASH_LEN: usize = 32;

/// A fixed-width, 32-byte SHA-256 digest.
///
/// This is the hash type used throughout the tree: leaf hashes, branch
/// hashes, and root hashes are all `Hash`es.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Hash([u8; HASH_LEN]);

impl Hash {
    pub const fn from_array(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Build a `Hash` from a slice. Panics if the slice isn't exactly 32 bytes.
    ///
    /// Intended for constants and test fixtures, where the length is known
    /// statically; use `TryFrom` for fallible construction from untrusted input.
    pub const fn from_slice(bytes: &[u8]) -> Self {
        assert!(bytes.len() == HASH_LEN, "hash must be exactly 32 bytes");
        let mut out = [0u8; HASH_LEN];
        let mut i = 0;
        while i < HASH_LEN {
            out[i] = bytes[i];
            i += 1;
        }
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn to_vec(self) -> Vec<u8> {
        self.0.to_vec()
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.0)
    }

    pub fn from_base64(s: &str) -> Result<Self, DecodeHashError> {
        let bytes = BASE64.decode(s.as_bytes()).map_err(|_| DecodeHashError::InvalidBase64)?;
        Self::try_from(bytes.as_slice())
    }
}

impl TryFrom<&[u8]> for Hash {
    type Error = DecodeHashError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; HASH_LEN] =
            bytes.try_into().map_err(|_| DecodeHashError::WrongLength(bytes.len()))?;
        Ok(Self(array))
    }
}

impl TryFrom<Vec<u8>> for Hash {
    type Error = DecodeHashError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        Self::try_from(bytes.as_slice())
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeHashError {
    #[error("invalid base64 string")]
    InvalidBase64,
    #[error("expected a 32-byte hash, got {0} bytes")]
    WrongLength(usize),
}

/// `u32be(n)`: big-endian, fixed-width 4-byte encoding.
#[inline]
pub fn u32be(n: u32) -> [u8; 4] {
    n.to_be_bytes()
}

/// `u64be(n)`: big-endian, fixed-width 8-byte encoding. Used for version
/// numbers in contexts (orphan keys, version table keys) that want a stable
/// sort order even past 2^32 versions.
#[inline]
pub fn u64be(n: u64) -> [u8; 8] {
    n.to_be_bytes()
}

/// `sha256(a, b, ...)`: SHA-256 over the concatenation of the arguments.
pub fn sha256(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    Hash(hasher.finalize().into())
}
