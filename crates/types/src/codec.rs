use {
    crate::{TreeError, TreeResult},
    serde::{de::DeserializeOwned, Serialize},
};

/// The pluggable value codec.
///
/// User values and the compact on-disk node forms used in snapshot chunks
/// are packed with this codec before they touch storage. Implemented over
/// MessagePack: a compact, self-describing binary format with stable
/// round-trip equality at the byte level.
pub fn pack<T: Serialize>(value: &T) -> TreeResult<Vec<u8>> {
    rmp_serde::to_vec(value).map_err(|err| TreeError::Codec(err.to_string()))
}

pub fn unpack<T: DeserializeOwned>(bytes: &[u8]) -> TreeResult<T> {
    rmp_serde::from_slice(bytes).map_err(|err| TreeError::Codec(err.to_string()))
}
