mod avl;
mod config;
mod node;
#[cfg(test)]
mod property_tests;
mod proof;
#[cfg(test)]
mod scenario_tests;
mod store;
mod tree;

pub use {
    config::TreeConfig,
    node::{CompactNode, Node},
    proof::{
        build_existence_proof, build_non_existence_proof, to_external_spec, verify_existence, verify_non_existence,
        ExistenceProof, ExternalExistenceProof, ExternalInnerOp, LeafTriple, NonExistenceProof, SiblingTriple,
    },
    store::{RootHash, Store},
    tree::Tree,
};
