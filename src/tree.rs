//! Huffman tree construction, serialization and traversal.
//!
//! Nodes live in a flat arena and refer to their children by index. Every
//! walk over the tree uses an explicit stack, so a badly skewed tree costs
//! heap space rather than call depth.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::fmt::{self, Display};
use std::io::{Read, Write};

use tracing::trace;

use crate::bit_io::{BitReader, BitWriter};
use crate::code::Code;
use crate::error::{Error, Result};
use crate::{Count, FrequencyTable};

/// index of a node in its tree's arena
pub type NodeId = usize;

/// no well formed tree over byte values has more nodes than this
const MAX_NODES: usize = 2 * 256 - 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Node {
    Leaf(u8),
    Internal { left: NodeId, right: NodeId },
}

#[derive(Clone, Debug)]
pub struct HuffmanTree {
    nodes: Vec<Node>,
    root: NodeId,
}

/// Arena plus the weight of every node, only needed while building
struct Construction {
    nodes: Vec<Node>,
    weights: Vec<Count>,
    root: NodeId,
}

impl Construction {
    fn push(&mut self, node: Node, weight: Count) -> NodeId {
        self.nodes.push(node);
        self.weights.push(weight);
        self.nodes.len() - 1
    }
}

/// Builds the tree bottom-up, merging the two lightest nodes until one is
/// left. Ties are broken on arena index: leaves are added in ascending byte
/// order and internal nodes after them in creation order, so the result
/// depends only on the frequencies.
fn construct(frequencies: &FrequencyTable) -> Option<Construction> {
    let mut build = Construction {
        nodes: Vec::with_capacity(MAX_NODES),
        weights: Vec::with_capacity(MAX_NODES),
        root: 0,
    };
    let mut heap = BinaryHeap::new();
    for (value, count) in frequencies.iter() {
        let id = build.push(Node::Leaf(value), count);
        heap.push(Reverse((count, id)));
    }

    if heap.len() == 1 {
        // a lone symbol still needs a one bit code, so it gets a sibling
        // that never occurs
        let Reverse((count, only)) = heap.pop()?;
        let value = match build.nodes[only] {
            Node::Leaf(value) => value,
            Node::Internal { .. } => return None,
        };
        let filler = build.push(Node::Leaf(value.wrapping_add(1)), 0);
        build.root = build.push(
            Node::Internal {
                left: only,
                right: filler,
            },
            count,
        );
        return Some(build);
    }

    while heap.len() > 1 {
        let Reverse((right_weight, right)) = heap.pop()?;
        let Reverse((left_weight, left)) = heap.pop()?;
        let weight = left_weight + right_weight;
        let id = build.push(Node::Internal { left, right }, weight);
        trace!(left, right, weight, "merged nodes");
        heap.push(Reverse((weight, id)));
    }
    let Reverse((_, root)) = heap.pop()?;
    build.root = root;
    Some(build)
}

impl HuffmanTree {
    /// `None` when every count is zero
    pub fn from_frequencies(
        frequencies: &FrequencyTable,
    ) -> Option<HuffmanTree> {
        construct(frequencies).map(|build| HuffmanTree {
            nodes: build.nodes,
            root: build.root,
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Node {
        self.nodes[id]
    }

    /// the child reached from `id` by `bit` (`true` is right), or `None`
    /// if `id` is a leaf
    pub fn branch(&self, id: NodeId, bit: bool) -> Option<NodeId> {
        match self.nodes[id] {
            Node::Leaf(_) => None,
            Node::Internal { left, right } => {
                Some(if bit { right } else { left })
            }
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, Node::Leaf(_)))
            .count()
    }

    /// Writes the tree depth first, pre-order: `1` then the left and right
    /// subtrees for an internal node, `0` then the 8 bit value for a leaf.
    pub fn serialize<W: Write>(&self, out: &mut BitWriter<W>) -> Result<()> {
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            match self.nodes[id] {
                Node::Leaf(value) => {
                    out.write_bit(false)?;
                    out.write_byte(value)?;
                }
                Node::Internal { left, right } => {
                    out.write_bit(true)?;
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
        Ok(())
    }

    /// number of bits `serialize` writes
    pub fn serialized_bits(&self) -> u64 {
        self.nodes
            .iter()
            .map(|node| match node {
                Node::Leaf(_) => 9,
                Node::Internal { .. } => 1,
            })
            .sum()
    }

    /// Reads a tree written by [`HuffmanTree::serialize`], consuming
    /// exactly the bits it wrote
    pub fn deserialize<R: Read>(
        input: &mut BitReader<R>,
    ) -> Result<HuffmanTree> {
        let truncated = |e: Error| match e {
            Error::EndOfStream => Error::TruncatedTree,
            e => e,
        };

        let mut nodes: Vec<Node> = Vec::new();
        let mut seen = [false; 256];
        // internal nodes still waiting for children, with the left child
        // once it is complete
        let mut open: Vec<(NodeId, Option<NodeId>)> = Vec::new();

        loop {
            if nodes.len() >= MAX_NODES {
                return Err(Error::InvalidTree("too many nodes"));
            }
            let mut done = if input.read_bit().map_err(truncated)? {
                // placeholder, overwritten once both children are read
                nodes.push(Node::Leaf(0));
                open.push((nodes.len() - 1, None));
                continue;
            } else {
                let value = input.read_byte().map_err(truncated)?;
                if seen[value as usize] {
                    return Err(Error::InvalidTree("repeated leaf value"));
                }
                seen[value as usize] = true;
                nodes.push(Node::Leaf(value));
                nodes.len() - 1
            };

            // hand the finished subtree up until a parent still needs
            // its right child
            loop {
                match open.last_mut() {
                    None => return Ok(HuffmanTree { nodes, root: 0 }),
                    Some((_, left @ None)) => {
                        *left = Some(done);
                        break;
                    }
                    Some((parent, Some(left))) => {
                        let (parent, left) = (*parent, *left);
                        nodes[parent] = Node::Internal { left, right: done };
                        open.pop();
                        done = parent;
                    }
                }
            }
        }
    }

    /// Maps every leaf value to the path leading to it
    pub fn dictionary(&self) -> Dictionary {
        let mut codes = BTreeMap::new();
        let mut stack = vec![(self.root, Code::new())];
        while let Some((id, path)) = stack.pop() {
            match self.nodes[id] {
                Node::Leaf(value) => {
                    codes.insert(value, path);
                }
                Node::Internal { left, right } => {
                    stack.push((right, path.with(true)));
                    stack.push((left, path.with(false)));
                }
            }
        }
        Dictionary { codes }
    }
}

/// Byte value to Huffman code
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dictionary {
    codes: BTreeMap<u8, Code>,
}

impl Dictionary {
    pub fn get(&self, value: u8) -> Option<&Code> {
        self.codes.get(&value)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &Code)> {
        self.codes.iter().map(|(value, code)| (*value, code))
    }

    /// total payload bits for input with these frequencies
    pub fn encoded_bits(&self, frequencies: &FrequencyTable) -> u64 {
        frequencies
            .iter()
            .map(|(value, count)| {
                count * self.get(value).map_or(0, |code| code.len() as u64)
            })
            .sum()
    }
}

impl Display for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (value, code) in self.iter() {
            writeln!(f, "{}: {}", value as char, code)?;
        }
        Ok(())
    }
}
