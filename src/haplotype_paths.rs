
use crate::allele_dag::AlleleDag;

/// One fully resolved phasing: the node chosen at every site level, root excluded.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct HaplotypePath {
    /// node indices from the first site level to the frontier
    node_indices: Vec<usize>
}

impl HaplotypePath {
    pub fn new(node_indices: Vec<usize>) -> HaplotypePath {
        HaplotypePath {
            node_indices
        }
    }

    pub fn node_indices(&self) -> &[usize] {
        &self.node_indices
    }

    pub fn len(&self) -> usize {
        self.node_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_indices.is_empty()
    }
}

/// Lazy depth-first enumeration of every path from the root to a frontier node.
/// Only the current path is held in memory, so graphs with many unlinked levels can be streamed.
/// Children are visited in edge insertion order, which makes the output order reproducible.
pub struct HaplotypePaths<'a> {
    /// the graph being walked
    dag: &'a AlleleDag,
    /// true for each node index that is in the frontier
    is_frontier: Vec<bool>,
    /// current path as (node index, next child to visit)
    stack: Vec<(usize, usize)>,
    /// set when the root itself is the frontier and the empty path has not been returned yet
    pending_empty: bool
}

impl<'a> HaplotypePaths<'a> {
    /// Creates a new enumeration over a graph
    pub fn new(dag: &'a AlleleDag) -> HaplotypePaths<'a> {
        let mut is_frontier: Vec<bool> = vec![false; dag.num_nodes()];
        for &n in dag.frontier().iter() {
            is_frontier[n] = true;
        }
        let mut paths = HaplotypePaths {
            dag,
            is_frontier,
            stack: vec![],
            pending_empty: false
        };
        paths.reset();
        paths
    }

    /// Restarts the enumeration from the first path
    pub fn reset(&mut self) {
        let root: usize = self.dag.root();
        self.stack = vec![(root, 0)];
        self.pending_empty = self.is_frontier[root];
    }
}

impl Iterator for HaplotypePaths<'_> {
    type Item = HaplotypePath;

    fn next(&mut self) -> Option<HaplotypePath> {
        if self.pending_empty {
            // nothing beyond the root, so there is exactly one empty haplotype
            self.pending_empty = false;
            self.stack.clear();
            return Some(HaplotypePath::new(vec![]));
        }

        while let Some(top) = self.stack.last_mut() {
            let edges = self.dag.edges(top.0);
            if top.1 < edges.len() {
                let target: usize = edges[top.1].target();
                top.1 += 1;
                self.stack.push((target, 0));

                if self.is_frontier[target] {
                    // skip the root when reporting
                    let node_indices: Vec<usize> = self.stack[1..].iter()
                        .map(|&(n, _c)| n)
                        .collect();
                    return Some(HaplotypePath::new(node_indices));
                }
            } else {
                self.stack.pop();
            }
        }
        None
    }
}
