mod cache;
mod file;
mod key;
mod map;
mod mem;
mod namespace;
mod set;

pub use {
    cache::CacheStore,
    file::FileStorage,
    key::{MapKey, Version},
    map::Map,
    mem::MemStorage,
    namespace::{namespace_bounds, prefixed_key},
    set::Set,
};
