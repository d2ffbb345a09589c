
use crate::haplotype_paths::{HaplotypePath, HaplotypePaths};
use crate::linkage::AlleleLinkage;

use log::{debug, trace, warn};
use rustc_hash::FxHashSet as HashSet;

/// Placeholder allele label carried by the root node
pub const ROOT_ALLELE: u8 = b'x';
/// Weight assigned to edges that are assumed rather than observed
pub const UNIFORM_WEIGHT: f64 = 1.0;

/// Controls what happens when linkage evidence names an upstream allele that is not in the frontier
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, strum_macros::Display)]
pub enum MismatchPolicy {
    /// Reject the level with an error
    #[default]
    Strict,
    /// Inject a node for the allele into the frontier, wired from the level before it
    Patch
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum DagError {
    #[error("add_level requires at least one linkage; unlinked transitions must use add_unlinked_level")]
    EmptyLinkage,
    #[error("add_unlinked_level requires at least one allele")]
    EmptyLevel,
    #[error("linkage allele {allele} is not present in frontier level {level}")]
    UnknownFrontierAllele { allele: char, level: usize },
    #[error("linkage allele {allele} cannot be patched into the root level")]
    UnpatchableAllele { allele: char }
}

/// A node in the allele graph; each non-root node is one allele at one variant site.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DagNode {
    /// this node's index
    node_index: usize,
    /// the allele this node represents, `ROOT_ALLELE` for the root
    allele: u8,
    /// distance from the root
    level: usize
}

impl DagNode {
    pub fn node_index(&self) -> usize {
        self.node_index
    }

    pub fn allele(&self) -> u8 {
        self.allele
    }

    pub fn level(&self) -> usize {
        self.level
    }
}

/// A directed edge between nodes on consecutive levels
#[derive(Clone, Debug, PartialEq)]
pub struct DagEdge {
    /// the upstream node index
    source: usize,
    /// the downstream node index
    target: usize,
    /// log-likelihood of this transition, `UNIFORM_WEIGHT` when assumed
    weight: f64,
    /// raw joint observation count, 0 when assumed
    link_count: u64
}

impl DagEdge {
    pub fn source(&self) -> usize {
        self.source
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn link_count(&self) -> u64 {
        self.link_count
    }

    /// Returns true if this edge was backed by read observations
    pub fn is_observed(&self) -> bool {
        self.link_count > 0
    }
}

/// Layered graph of allele choices.
/// Level 0 holds only the root, and each following level holds the alleles of one variant site in ascending coordinate order.
/// Edges only ever point from the current frontier (last level) into a newly added level, so the graph is acyclic by construction.
#[derive(Debug)]
pub struct AlleleDag {
    /// all nodes, indexed by node index
    nodes: Vec<DagNode>,
    /// outgoing edges for each node, in insertion order
    edges: Vec<Vec<DagEdge>>,
    /// incoming node indices for each node, in insertion order
    parent_nodes: Vec<Vec<usize>>,
    /// node indices in each level; the last one is the frontier
    levels: Vec<Vec<usize>>,
    /// how inconsistent linkage evidence is handled
    mismatch_policy: MismatchPolicy
}

impl Default for AlleleDag {
    fn default() -> Self {
        Self::new()
    }
}

impl AlleleDag {
    /// Creates a new graph containing only the root, which is also the frontier.
    pub fn new() -> AlleleDag {
        Self::with_policy(MismatchPolicy::Strict)
    }

    /// Creates a new graph with a specific policy for inconsistent linkages.
    /// # Arguments
    /// * `mismatch_policy` - what `add_level` does when a linkage names an allele missing from the frontier
    pub fn with_policy(mismatch_policy: MismatchPolicy) -> AlleleDag {
        let mut dag = AlleleDag {
            nodes: vec![],
            edges: vec![],
            parent_nodes: vec![],
            levels: vec![],
            mismatch_policy
        };
        let root_index = dag.add_node(ROOT_ALLELE, 0);
        dag.levels.push(vec![root_index]);
        dag
    }

    /// Adds a node to the arena and returns its index
    fn add_node(&mut self, allele: u8, level: usize) -> usize {
        let node_index: usize = self.nodes.len();
        self.nodes.push(DagNode {
            node_index,
            allele,
            level
        });
        self.edges.push(vec![]);
        self.parent_nodes.push(vec![]);
        node_index
    }

    /// Adds an edge between two nodes, ignoring it if the pair is already connected.
    /// # Panics
    /// * if `target` is not exactly one level below `source`
    fn add_edge(&mut self, source: usize, target: usize, weight: f64, link_count: u64) {
        assert_eq!(self.nodes[source].level + 1, self.nodes[target].level);
        if self.edges[source].iter().any(|e| e.target == target) {
            trace!("Skipping duplicate edge {} -> {}", source, target);
            return;
        }
        trace!("Adding edge {}({}) -> {}({}), weight={:.4}, links={}",
            source, self.nodes[source].allele as char, target, self.nodes[target].allele as char, weight, link_count
        );
        self.edges[source].push(DagEdge {
            source,
            target,
            weight,
            link_count
        });
        self.parent_nodes[target].push(source);
    }

    /// Adds a level with no linkage evidence.
    /// Every frontier node is connected to every new node with a uniform weight, and the new nodes become the frontier.
    /// # Arguments
    /// * `alleles` - the alleles for the new level; duplicates are collapsed, first occurrence order is kept
    /// # Errors
    /// * `EmptyLevel` if `alleles` is empty, since that would leave the frontier with no children
    pub fn add_unlinked_level(&mut self, alleles: &[u8]) -> Result<(), DagError> {
        if alleles.is_empty() {
            return Err(DagError::EmptyLevel);
        }

        let level: usize = self.levels.len();
        let frontier: Vec<usize> = self.frontier().to_vec();
        let mut new_level: Vec<usize> = vec![];
        let mut seen: HashSet<u8> = Default::default();
        for &allele in alleles.iter() {
            if !seen.insert(allele) {
                continue;
            }
            let node_index = self.add_node(allele, level);
            for &f in frontier.iter() {
                self.add_edge(f, node_index, UNIFORM_WEIGHT, 0);
            }
            new_level.push(node_index);
        }

        debug!("Added unlinked level {} with {} nodes", level, new_level.len());
        self.levels.push(new_level);
        Ok(())
    }

    /// Adds a level constrained by linkage evidence.
    /// One node is created per distinct downstream allele.
    /// Each frontier node gets one edge per linkage whose upstream allele matches it; frontier nodes that match no linkage get uniform edges to every new node.
    /// # Arguments
    /// * `linkages` - the retained allele pairs for this transition
    /// # Errors
    /// * `EmptyLinkage` if `linkages` is empty, these must go through `add_unlinked_level`
    /// * `UnknownFrontierAllele` if a linkage upstream allele is not in the frontier and the policy is `Strict`
    /// * `UnpatchableAllele` if patching is required but the frontier is the root level
    pub fn add_level(&mut self, linkages: &[AlleleLinkage]) -> Result<(), DagError> {
        self.add_certified_level(linkages, &[])
    }

    /// Same as `add_level`, but upstream alleles in `certified_alleles` are always patched into the frontier when missing.
    /// Linked levels only keep the downstream alleles of the retained pairs, so a called allele can drop out of the frontier.
    /// # Arguments
    /// * `linkages` - the retained allele pairs for this transition
    /// * `certified_alleles` - the alleles called at the frontier's site
    /// # Errors
    /// * same as `add_level`, `UnknownFrontierAllele` only applies to alleles outside `certified_alleles`
    pub fn add_certified_level(&mut self, linkages: &[AlleleLinkage], certified_alleles: &[u8]) -> Result<(), DagError> {
        if linkages.is_empty() {
            return Err(DagError::EmptyLinkage);
        }

        // check everything up front so a failure leaves the graph untouched
        let frontier_level: usize = self.levels.len() - 1;
        let mut missing_alleles: Vec<u8> = vec![];
        for linkage in linkages.iter() {
            let first: u8 = linkage.first();
            if self.find_frontier_node(first).is_none() && !missing_alleles.contains(&first) {
                missing_alleles.push(first);
            }
        }
        if self.mismatch_policy == MismatchPolicy::Strict {
            if let Some(&allele) = missing_alleles.iter().find(|&&a| !certified_alleles.contains(&a)) {
                return Err(DagError::UnknownFrontierAllele { allele: allele as char, level: frontier_level });
            }
        }
        if let Some(&allele) = missing_alleles.first() {
            if frontier_level == 0 {
                return Err(DagError::UnpatchableAllele { allele: allele as char });
            }
        }

        for &allele in missing_alleles.iter() {
            self.patch_frontier(allele);
        }

        // create the downstream nodes
        let level: usize = frontier_level + 1;
        let mut new_level: Vec<usize> = vec![];
        let mut allele_to_node: Vec<(u8, usize)> = vec![];
        for linkage in linkages.iter() {
            let second: u8 = linkage.second();
            if !allele_to_node.iter().any(|&(a, _n)| a == second) {
                let node_index = self.add_node(second, level);
                allele_to_node.push((second, node_index));
                new_level.push(node_index);
            }
        }
        let lookup = |allele: u8| -> usize {
            allele_to_node.iter()
                .find(|&&(a, _n)| a == allele)
                .map(|&(_a, n)| n)
                .expect("every second allele was just added")
        };

        // now wire up the frontier
        let frontier: Vec<usize> = self.frontier().to_vec();
        for &f in frontier.iter() {
            let frontier_allele: u8 = self.nodes[f].allele;
            let mut linked: bool = false;
            for linkage in linkages.iter().filter(|l| l.first() == frontier_allele) {
                self.add_edge(f, lookup(linkage.second()), linkage.weight(), linkage.count());
                linked = true;
            }

            if !linked {
                // no observation for this allele, so allow everything
                trace!("Frontier allele {} has no linkage, adding uniform edges", frontier_allele as char);
                for &n in new_level.iter() {
                    self.add_edge(f, n, UNIFORM_WEIGHT, 0);
                }
            }
        }

        debug!("Added linked level {} with {} nodes from {} linkages", level, new_level.len(), linkages.len());
        self.levels.push(new_level);
        Ok(())
    }

    /// Injects a node for `allele` into the frontier level, connected from every parent of the existing frontier.
    fn patch_frontier(&mut self, allele: u8) {
        let frontier_level: usize = self.levels.len() - 1;
        let mut predecessors: Vec<usize> = vec![];
        for &f in self.levels[frontier_level].iter() {
            for &p in self.parent_nodes[f].iter() {
                if !predecessors.contains(&p) {
                    predecessors.push(p);
                }
            }
        }
        assert!(!predecessors.is_empty());

        warn!("Linkage allele {} missing from frontier level {}, patching it in", allele as char, frontier_level);
        let node_index = self.add_node(allele, frontier_level);
        for &p in predecessors.iter() {
            self.add_edge(p, node_index, UNIFORM_WEIGHT, 0);
        }
        self.levels[frontier_level].push(node_index);
    }

    /// Finds the frontier node carrying `allele`, if any
    fn find_frontier_node(&self, allele: u8) -> Option<usize> {
        self.frontier().iter()
            .copied()
            .find(|&n| self.nodes[n].allele == allele)
    }

    pub fn mismatch_policy(&self) -> MismatchPolicy {
        self.mismatch_policy
    }

    /// Returns the index of the root node
    pub fn root(&self) -> usize {
        0
    }

    /// Returns the node indices of the last level added
    pub fn frontier(&self) -> &[usize] {
        self.levels.last().expect("the root level always exists")
    }

    /// Returns the number of levels, including the root level
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Returns the node indices in a given level
    pub fn level(&self, level: usize) -> &[usize] {
        &self.levels[level]
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.iter().map(|e| e.len()).sum()
    }

    pub fn node(&self, node_index: usize) -> &DagNode {
        &self.nodes[node_index]
    }

    /// Returns the outgoing edges of a node, in insertion order
    pub fn edges(&self, node_index: usize) -> &[DagEdge] {
        &self.edges[node_index]
    }

    /// Returns the incoming node indices of a node
    pub fn parent_nodes(&self, node_index: usize) -> &[usize] {
        &self.parent_nodes[node_index]
    }

    /// Returns the edge connecting two nodes, if present
    pub fn edge(&self, source: usize, target: usize) -> Option<&DagEdge> {
        self.edges[source].iter().find(|e| e.target == target)
    }

    /// Returns a lazy iterator over every root-to-frontier path.
    /// Each call starts a fresh enumeration.
    pub fn paths(&self) -> HaplotypePaths<'_> {
        HaplotypePaths::new(self)
    }

    /// Converts a path of node indices into the corresponding allele labels
    pub fn path_alleles(&self, path: &HaplotypePath) -> Vec<u8> {
        path.node_indices().iter()
            .map(|&n| self.nodes[n].allele)
            .collect()
    }

    /// Collects every root-to-frontier path as allele labels, root excluded.
    /// The order is reproducible for a fixed construction order but carries no likelihood ranking.
    pub fn get_paths(&self) -> Vec<Vec<u8>> {
        self.paths()
            .map(|p| self.path_alleles(&p))
            .collect()
    }
}
