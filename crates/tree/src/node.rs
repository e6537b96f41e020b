use {
    iavl_storage::Version,
    iavl_types::{sha256, Hash},
    serde::{Deserialize, Serialize},
};

/// The on-disk compact form of a node.
///
/// Distinguished purely by tuple arity: three elements for a Leaf, six for
/// a Branch, with no separate type tag. `#[serde(untagged)]` on tuple
/// variants serializes exactly that shape with MessagePack, and
/// deserialization falls through to the variant whose arity matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompactNode {
    Leaf(Vec<u8>, Vec<u8>, Version),
    Branch(Vec<u8>, Version, u32, u32, Hash, Hash),
}

/// A child reference: either unresolved (known only by hash, the common case
/// for a subtree untouched by the current mutation) or materialized (loaded
/// or freshly built in memory).
#[derive(Debug, Clone)]
pub enum Child {
    Hash(Hash),
    Node(Box<Node>),
    /// Transient placeholder used while a child is taken out of its parent
    /// for recursion; never observed once the recursive step returns.
    Taken,
}

impl Child {
    /// The child's hash, if known without materializing it.
    pub fn hash(&self) -> Option<Hash> {
        match self {
            Child::Hash(h) => Some(*h),
            Child::Node(n) if !n.is_dirty() => Some(n.hash()),
            Child::Node(_) | Child::Taken => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LeafNode {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub version: Version,
    hash: Hash,
    dirty: bool,
    /// `(hash, version)` this node was persisted under before the in-progress
    /// mutation, if any. `None` for a node that has never touched storage.
    prev: Option<(Hash, Version)>,
}

impl LeafNode {
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            key,
            value,
            version: 0,
            hash: placeholder_hash(),
            dirty: true,
            prev: None,
        }
    }

    pub fn from_compact(hash: Hash, key: Vec<u8>, value: Vec<u8>, version: Version) -> Self {
        Self { key, value, version, hash, dirty: false, prev: Some((hash, version)) }
    }

    pub fn to_compact(&self) -> CompactNode {
        CompactNode::Leaf(self.key.clone(), self.value.clone(), self.version)
    }

    /// Update the value of an existing leaf in place. Marks the node dirty
    /// regardless of whether the value actually changed.
    pub fn set_value(&mut self, value: Vec<u8>) {
        self.value = value;
        self.dirty = true;
    }

    pub fn prev_identity(&self) -> Option<(Hash, Version)> {
        self.prev
    }
}

#[derive(Debug, Clone)]
pub struct BranchNode {
    pub key: Vec<u8>,
    pub version: Version,
    hash: Hash,
    dirty: bool,
    prev: Option<(Hash, Version)>,
    pub left: Child,
    pub right: Child,
    left_height: u32,
    right_height: u32,
}

impl BranchNode {
    pub fn new(key: Vec<u8>, left: Node, right: Node) -> Self {
        let left_height = left.height();
        let right_height = right.height();
        Self {
            key,
            version: 0,
            hash: placeholder_hash(),
            dirty: true,
            prev: None,
            left: Child::Node(Box::new(left)),
            right: Child::Node(Box::new(right)),
            left_height,
            right_height,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn from_compact(
        hash: Hash,
        key: Vec<u8>,
        version: Version,
        left_height: u32,
        right_height: u32,
        left_hash: Hash,
        right_hash: Hash,
    ) -> Self {
        Self {
            key,
            version,
            hash,
            dirty: false,
            prev: Some((hash, version)),
            left: Child::Hash(left_hash),
            right: Child::Hash(right_hash),
            left_height,
            right_height,
        }
    }

    pub fn to_compact(&self) -> CompactNode {
        let left_hash = self.left.hash().expect("left child must be persisted before to_compact");
        let right_hash = self.right.hash().expect("right child must be persisted before to_compact");
        CompactNode::Branch(
            self.key.clone(),
            self.version,
            self.left_height,
            self.right_height,
            left_hash,
            right_hash,
        )
    }

    pub fn left_height(&self) -> u32 {
        self.left_height
    }

    pub fn right_height(&self) -> u32 {
        self.right_height
    }

    /// `leftHeight - rightHeight`.
    pub fn balance_factor(&self) -> i64 {
        self.left_height as i64 - self.right_height as i64
    }

    pub fn height(&self) -> u32 {
        1 + self.left_height.max(self.right_height)
    }

    pub fn take_left(&mut self) -> Child {
        std::mem::replace(&mut self.left, Child::Taken)
    }

    pub fn take_right(&mut self) -> Child {
        std::mem::replace(&mut self.right, Child::Taken)
    }

    pub fn set_left(&mut self, node: Node) {
        self.left_height = node.height();
        self.dirty = self.dirty || node.is_dirty();
        self.left = Child::Node(Box::new(node));
    }

    pub fn set_right(&mut self, node: Node) {
        self.right_height = node.height();
        self.dirty = self.dirty || node.is_dirty();
        self.right = Child::Node(Box::new(node));
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Set `key` to the leftmost key of `right`, restored after deleting
    /// the minimum of the right subtree.
    pub fn set_key(&mut self, key: Vec<u8>) {
        self.key = key;
    }

    pub fn prev_identity(&self) -> Option<(Hash, Version)> {
        self.prev
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Leaf(LeafNode),
    Branch(BranchNode),
}

impl Node {
    pub fn leaf(key: Vec<u8>, value: Vec<u8>) -> Self {
        Node::Leaf(LeafNode::new(key, value))
    }

    pub fn branch(key: Vec<u8>, left: Node, right: Node) -> Self {
        Node::Branch(BranchNode::new(key, left, right))
    }

    pub fn key(&self) -> &[u8] {
        match self {
            Node::Leaf(l) => &l.key,
            Node::Branch(b) => &b.key,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Node::Leaf(_) => 0,
            Node::Branch(b) => b.height(),
        }
    }

    pub fn is_dirty(&self) -> bool {
        match self {
            Node::Leaf(l) => l.dirty,
            Node::Branch(b) => b.dirty,
        }
    }

    pub fn hash(&self) -> Hash {
        match self {
            Node::Leaf(l) => l.hash,
            Node::Branch(b) => b.hash,
        }
    }

    pub fn version(&self) -> Version {
        match self {
            Node::Leaf(l) => l.version,
            Node::Branch(b) => b.version,
        }
    }

    pub fn prev_identity(&self) -> Option<(Hash, Version)> {
        match self {
            Node::Leaf(l) => l.prev,
            Node::Branch(b) => b.prev,
        }
    }

    pub fn to_compact(&self) -> CompactNode {
        match self {
            Node::Leaf(l) => l.to_compact(),
            Node::Branch(b) => b.to_compact(),
        }
    }

    /// `(leftHash, rightHash)` for a Branch, `None` for a Leaf. Used by the
    /// snapshot pre-order walk to descend without borrowing the private
    /// `Child` representation.
    pub fn child_hashes(&self) -> Option<(Hash, Hash)> {
        match self {
            Node::Leaf(_) => None,
            Node::Branch(b) => Some((
                b.left.hash().expect("left child hash known for a loaded node"),
                b.right.hash().expect("right child hash known for a loaded node"),
            )),
        }
    }

    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match self {
            Node::Leaf(l) => Some(l),
            Node::Branch(_) => None,
        }
    }

    pub fn as_branch(&self) -> Option<&BranchNode> {
        match self {
            Node::Branch(b) => Some(b),
            Node::Leaf(_) => None,
        }
    }

    /// Assign a fresh hash/version once this node is being written out.
    /// Called only from `persist`.
    pub(crate) fn finalize(&mut self, version: Version, hash: Hash) {
        match self {
            Node::Leaf(l) => {
                l.version = version;
                l.hash = hash;
                l.dirty = false;
                l.prev = Some((hash, version));
            },
            Node::Branch(b) => {
                b.version = version;
                b.hash = hash;
                b.dirty = false;
                b.prev = Some((hash, version));
            },
        }
    }
}

fn placeholder_hash() -> Hash {
    Hash::from_array([0u8; 32])
}

/// `Leaf.hash = SHA256(u32be(version) ‖ key ‖ value)`.
pub fn leaf_hash(version: Version, key: &[u8], value: &[u8]) -> Hash {
    sha256(&[&version.to_be_bytes(), key, value])
}

/// `Branch.hash = SHA256(u32be(version) ‖ leftHash ‖ rightHash)`.
pub fn branch_hash(version: Version, left_hash: &Hash, right_hash: &Hash) -> Hash {
    sha256(&[&version.to_be_bytes(), left_hash.as_bytes(), right_hash.as_bytes()])
}
