//! YM-008: Dependency graph and linearization.
//!
//! Nodes live in an arena owned by the [`Dag`]; edges are arena indices.
//! A node is part of the graph once it is registered under its target
//! string. Linearization first tries a C3 merge (the MRO algorithm) from
//! the root, which gives a deterministic depth-first, left-to-right order,
//! and falls back to a plain topological sort over registration order
//! when the merge has no consistent solution.

use super::error::{Error, Result};
use super::recipe::Recipe;
use indexmap::{IndexMap, IndexSet};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::rc::Rc;

/// Arena index of a node.
pub type NodeId = usize;

/// Deeper requirement chains are handed to the topological fallback.
const MAX_C3_DEPTH: usize = 2048;

/// A concrete target in the graph.
#[derive(Debug, Clone)]
pub struct Node {
    pub target: String,
    /// `None` for a plain file with no recipe
    pub recipe: Option<Rc<Recipe>>,
    /// Requirements, first occurrence order
    pub requires: Vec<NodeId>,
    /// Reverse edges
    pub required_by: IndexSet<NodeId>,
    /// Seconds since the epoch, `+inf` means "always newest"
    pub timestamp: f64,
    pub should_build: bool,
}

impl Node {
    /// A node built by a specified recipe.
    pub fn new(recipe: Rc<Recipe>) -> Self {
        let mut node = Self::bare(&recipe.target);
        node.recipe = Some(recipe);
        node
    }

    /// A leaf that is just a file on disk.
    pub fn bare(target: &str) -> Self {
        Self {
            target: target.to_string(),
            recipe: None,
            requires: Vec::new(),
            required_by: IndexSet::new(),
            timestamp: 0.0,
            should_build: false,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.target)
    }
}

/// Node identity is the target string.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
    }
}

impl Eq for Node {}

/// Which algorithm produced the execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linearization {
    C3,
    Topological,
}

/// Dependency graph rooted at the requested target.
#[derive(Debug)]
pub struct Dag {
    nodes: Vec<Node>,
    mapping: IndexMap<String, NodeId>,
    root: NodeId,
    ordered: Option<Vec<NodeId>>,
}

impl Dag {
    pub fn new(root: Node) -> Self {
        let mut mapping = IndexMap::new();
        mapping.insert(root.target.clone(), 0);
        Self {
            nodes: vec![root],
            mapping,
            root: 0,
            ordered: None,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Put a node in the arena without registering it.
    pub fn alloc(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Register an allocated node under its target.
    pub fn register(&mut self, id: NodeId) {
        let target = self.nodes[id].target.clone();
        self.mapping.insert(target, id);
    }

    /// Allocate and register.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = self.alloc(node);
        self.register(id);
        id
    }

    pub fn get(&self, target: &str) -> Option<NodeId> {
        self.mapping.get(target).copied()
    }

    pub fn contains(&self, target: &str) -> bool {
        self.mapping.contains_key(target)
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Add an edge `parent -> child`. Returns `false` for a duplicate,
    /// which is ignored.
    pub fn add_requirement(&mut self, parent: NodeId, child: NodeId) -> bool {
        if self.nodes[parent].requires.contains(&child) {
            return false;
        }
        self.nodes[parent].requires.push(child);
        self.nodes[child].required_by.insert(parent);
        true
    }

    /// The linearized order, once computed.
    pub fn ordered(&self) -> Option<&[NodeId]> {
        self.ordered.as_deref()
    }

    /// Linearized order if computed, registration order otherwise.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        let ids: Vec<NodeId> = match self.ordered {
            Some(ref ordered) => ordered.clone(),
            None => self.mapping.values().copied().collect(),
        };
        ids.into_iter()
    }

    /// Linearize, falling back to a topological sort if C3 fails.
    pub fn sort(&mut self) -> Result<Linearization> {
        match self.c3_sort() {
            Ok(()) => Ok(Linearization::C3),
            Err(Error::CannotLinearize) => {
                self.topological_sort()?;
                Ok(Linearization::Topological)
            }
            Err(e) => Err(e),
        }
    }

    /// C3 linearization from the root, reversed so requirements come first.
    pub fn c3_sort(&mut self) -> Result<()> {
        let mut memo = HashMap::new();
        let mut visiting = HashSet::new();
        let mut ordered = self.linearize(self.root, 0, &mut visiting, &mut memo)?;
        ordered.reverse();
        self.ordered = Some(ordered);
        Ok(())
    }

    /// Repeatedly place the first registered node whose requirements are
    /// all placed.
    pub fn topological_sort(&mut self) -> Result<()> {
        let mut remaining: Vec<NodeId> = self.mapping.values().copied().collect();
        let mut placed = HashSet::with_capacity(remaining.len());
        let mut ordered = Vec::with_capacity(remaining.len());

        while !remaining.is_empty() {
            let position = remaining
                .iter()
                .position(|&id| self.nodes[id].requires.iter().all(|r| placed.contains(r)))
                .ok_or(Error::CyclicDependencies)?;
            let id = remaining.remove(position);
            placed.insert(id);
            ordered.push(id);
        }

        self.ordered = Some(ordered);
        Ok(())
    }

    fn linearize(
        &self,
        id: NodeId,
        depth: usize,
        visiting: &mut HashSet<NodeId>,
        memo: &mut HashMap<NodeId, Vec<NodeId>>,
    ) -> Result<Vec<NodeId>> {
        if let Some(done) = memo.get(&id) {
            return Ok(done.clone());
        }
        if depth > MAX_C3_DEPTH || !visiting.insert(id) {
            return Err(Error::CannotLinearize);
        }

        let requires = &self.nodes[id].requires;
        let mut out = vec![id];
        if !requires.is_empty() {
            let mut lists = Vec::with_capacity(requires.len() + 1);
            for &req in requires {
                lists.push(self.linearize(req, depth + 1, visiting, memo)?);
            }
            lists.push(requires.clone());
            out.extend(merge(lists)?);
        }

        visiting.remove(&id);
        memo.insert(id, out.clone());
        Ok(out)
    }
}

impl Index<NodeId> for Dag {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }
}

impl IndexMut<NodeId> for Dag {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }
}

/// C3 merge: take the first head absent from every tail, strip it, repeat.
fn merge(mut unmerged: Vec<Vec<NodeId>>) -> Result<Vec<NodeId>> {
    let mut result = Vec::new();
    while !unmerged.is_empty() {
        let head = unmerged
            .iter()
            .map(|list| list[0])
            .find(|head| unmerged.iter().all(|list| !list[1..].contains(head)))
            .ok_or(Error::CannotLinearize)?;
        result.push(head);
        unmerged = unmerged
            .into_iter()
            .filter_map(|mut list| {
                if list[0] == head {
                    list.remove(0);
                }
                (!list.is_empty()).then_some(list)
            })
            .collect();
    }
    Ok(result)
}
