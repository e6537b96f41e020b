mod codec;
mod error;
mod hash;
mod op;
mod storage;

pub use crate::{
    codec::{pack, unpack},
    error::{TreeError, TreeResult},
    hash::{sha256, u32be, u64be, DecodeHashError, Hash, HASH_LEN},
    op::{Batch, Op, Order, Record},
    storage::Storage,
};
