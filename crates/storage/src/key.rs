use iavl_types::{u32be, Hash, TreeError, TreeResult};

/// The tree's version counter: a 4-byte big-endian unsigned integer,
/// `u32be`-encoded everywhere it appears in a hash or a key.
pub type Version = u32;

/// A key type that can be encoded to/decoded from a fixed-width byte string,
/// for use as a `Map`/`Set` key (possibly as one component of a composite
/// key). All keys this crate needs are fixed-width, so there is no need for
/// the variable-length-tail machinery a general-purpose storage crate would
/// carry.
pub trait MapKey: Sized {
    const ENCODED_LEN: usize;

    fn encode(&self) -> Vec<u8>;

    fn decode(bytes: &[u8]) -> TreeResult<Self>;
}

impl MapKey for Version {
    const ENCODED_LEN: usize = 4;

    fn encode(&self) -> Vec<u8> {
        u32be(*self).to_vec()
    }

    fn decode(bytes: &[u8]) -> TreeResult<Self> {
        let array: [u8; 4] = bytes
            .try_into()
            .map_err(|_| TreeError::MalformedDescriptor("bad version key".into()))?;
        Ok(u32::from_be_bytes(array))
    }
}

impl MapKey for Hash {
    const ENCODED_LEN: usize = 32;

    fn encode(&self) -> Vec<u8> {
        self.to_vec()
    }

    fn decode(bytes: &[u8]) -> TreeResult<Self> {
        Hash::try_from(bytes).map_err(|err| TreeError::MalformedDescriptor(err.to_string()))
    }
}

impl<A: MapKey, B: MapKey> MapKey for (A, B) {
    const ENCODED_LEN: usize = A::ENCODED_LEN + B::ENCODED_LEN;

    fn encode(&self) -> Vec<u8> {
        let mut out = self.0.encode();
        out.extend(self.1.encode());
        out
    }

    fn decode(bytes: &[u8]) -> TreeResult<Self> {
        let (a, b) = bytes.split_at(A::ENCODED_LEN);
        Ok((A::decode(a)?, B::decode(b)?))
    }
}

impl<A: MapKey, B: MapKey, C: MapKey> MapKey for (A, B, C) {
    const ENCODED_LEN: usize = A::ENCODED_LEN + B::ENCODED_LEN + C::ENCODED_LEN;

    fn encode(&self) -> Vec<u8> {
        let mut out = self.0.encode();
        out.extend(self.1.encode());
        out.extend(self.2.encode());
        out
    }

    fn decode(bytes: &[u8]) -> TreeResult<Self> {
        let (a, rest) = bytes.split_at(A::ENCODED_LEN);
        let (b, c) = rest.split_at(B::ENCODED_LEN);
        Ok((A::decode(a)?, B::decode(b)?, C::decode(c)?))
    }
}
