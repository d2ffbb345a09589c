
use crate::data_types::aligned_read::AlignedRead;
use crate::data_types::variant_site::VariantSite;

use bio::data_structures::interval_tree::IntervalTree;
use log::{debug, trace};
use rustc_hash::FxHashMap as HashMap;
use simple_error::bail;
use std::sync::{Arc, mpsc};
use threadpool::ThreadPool;

/// The maximum number of allele pairs retained per transition; matches the biallelic model
pub const MAX_LINKAGE_STATES: usize = 2;

/// A single observed pairing of alleles at two neighboring variant sites.
#[derive(Clone, Debug, PartialEq)]
pub struct AlleleLinkage {
    /// allele at the upstream site
    first: u8,
    /// allele at the downstream site
    second: u8,
    /// the number of clone-weighted reads observing this pair
    count: u64,
    /// natural log of this pair's share of the retained counts
    weight: f64
}

impl AlleleLinkage {
    pub fn new(first: u8, second: u8, count: u64, weight: f64) -> AlleleLinkage {
        AlleleLinkage {
            first,
            second,
            count,
            weight
        }
    }

    pub fn first(&self) -> u8 {
        self.first
    }

    pub fn second(&self) -> u8 {
        self.second
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }
}

/// The evidence connecting two consecutive variant sites
#[derive(Clone, Debug, PartialEq)]
pub enum LinkageEstimate {
    /// no read spans both sites
    Unlinked,
    /// the most frequent allele pairs, most frequent first; never empty
    Linked(Vec<AlleleLinkage>)
}

/// The linkage between one pair of consecutive variant sites
#[derive(Clone, Debug, PartialEq)]
pub struct SiteTransition {
    /// the upstream variant site coordinate
    position0: usize,
    /// the downstream variant site coordinate
    position1: usize,
    /// what the reads say about this transition
    estimate: LinkageEstimate
}

impl SiteTransition {
    /// Creates a new transition between two variant sites.
    /// # Panics
    /// * if `position0 >= position1`
    pub fn new(position0: usize, position1: usize, estimate: LinkageEstimate) -> SiteTransition {
        assert!(position0 < position1);
        SiteTransition {
            position0,
            position1,
            estimate
        }
    }

    pub fn position0(&self) -> usize {
        self.position0
    }

    pub fn position1(&self) -> usize {
        self.position1
    }

    pub fn estimate(&self) -> &LinkageEstimate {
        &self.estimate
    }
}

/// Converts a collection of weighted pair counts into the retained linkage set.
/// Only the `MAX_LINKAGE_STATES` most frequent pairs are kept, ties broken by ascending pair.
/// Weights are normalized over the retained pairs only.
/// # Arguments
/// * `pair_counts` - map from (first allele, second allele) to clone-weighted count
pub fn retain_top_linkages(pair_counts: &HashMap<(u8, u8), u64>) -> LinkageEstimate {
    let mut ranked: Vec<((u8, u8), u64)> = pair_counts.iter()
        .filter(|(_pair, count)| **count > 0)
        .map(|(&pair, &count)| (pair, count))
        .collect();
    if ranked.is_empty() {
        return LinkageEstimate::Unlinked;
    }
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(MAX_LINKAGE_STATES);

    let total: u64 = ranked.iter().map(|(_pair, count)| count).sum();
    let linkages: Vec<AlleleLinkage> = ranked.into_iter()
        .map(|((first, second), count)| {
            let weight: f64 = (count as f64 / total as f64).ln();
            AlleleLinkage::new(first, second, count, weight)
        })
        .collect();
    LinkageEstimate::Linked(linkages)
}

/// Indexes uniquely mapped reads by their reference span so that reads covering two sites can be found quickly.
pub struct LinkageEstimator {
    /// all uniquely mapped reads
    reads: Vec<AlignedRead>,
    /// read span -> index into `reads`
    read_tree: IntervalTree<usize, usize>
}

impl LinkageEstimator {
    /// Builds the estimator from a collection of reads, dropping any that map to multiple regions.
    /// # Arguments
    /// * `reads` - all loaded reads
    pub fn new(reads: &[AlignedRead]) -> LinkageEstimator {
        let reads: Vec<AlignedRead> = reads.iter()
            .filter(|r| r.is_uniquely_mapped())
            .cloned()
            .collect();
        let mut read_tree: IntervalTree<usize, usize> = IntervalTree::new();
        for (read_index, read) in reads.iter().enumerate() {
            read_tree.insert(read.get_range(), read_index);
        }
        LinkageEstimator {
            reads,
            read_tree
        }
    }

    pub fn num_reads(&self) -> usize {
        self.reads.len()
    }

    /// Returns every read that spans both coordinates.
    /// # Arguments
    /// * `position0` - the upstream coordinate
    /// * `position1` - the downstream coordinate, must be > `position0`
    pub fn joint_reads(&self, position0: usize, position1: usize) -> Vec<&AlignedRead> {
        assert!(position0 < position1);
        self.read_tree.find(position0..(position1+1))
            .map(|entry| &self.reads[*entry.data()])
            .filter(|read| read.covers(position0) && read.covers(position1))
            .collect()
    }

    /// Tallies the clone-weighted allele pairs observed by reads spanning both coordinates and keeps the most frequent.
    /// # Arguments
    /// * `position0` - the upstream coordinate
    /// * `position1` - the downstream coordinate, must be > `position0`
    pub fn estimate(&self, position0: usize, position1: usize) -> LinkageEstimate {
        let mut pair_counts: HashMap<(u8, u8), u64> = Default::default();
        for read in self.joint_reads(position0, position1) {
            // joint_reads guarantees both are covered
            if let (Some(a0), Some(a1)) = (read.allele_at(position0), read.allele_at(position1)) {
                *pair_counts.entry((a0, a1)).or_insert(0) += read.clone_count();
            }
        }

        let estimate = retain_top_linkages(&pair_counts);
        match &estimate {
            LinkageEstimate::Unlinked => {
                debug!("Transition {}->{}: no spanning reads", position0, position1);
            },
            LinkageEstimate::Linked(linkages) => {
                debug!("Transition {}->{}: {} observed pairs, {} retained", position0, position1, pair_counts.len(), linkages.len());
                for l in linkages.iter() {
                    trace!("\t{}{} => {} ({:.4})", l.first() as char, l.second() as char, l.count(), l.weight());
                }
            }
        };
        estimate
    }
}

/// Estimates the linkage for every consecutive pair of variant sites.
/// Transitions are independent, so with `threads > 1` they are distributed over a thread pool and re-ordered afterwards.
/// # Arguments
/// * `estimator` - the indexed reads
/// * `variant_sites` - the called variant sites in ascending coordinate order
/// * `threads` - the number of worker threads to use
/// # Errors
/// * if any worker in the thread pool panics
pub fn estimate_linkages(estimator: Arc<LinkageEstimator>, variant_sites: &[VariantSite], threads: usize) -> Result<Vec<SiteTransition>, Box<dyn std::error::Error>> {
    let positions: Vec<(usize, usize)> = variant_sites.windows(2)
        .map(|w| (w[0].position(), w[1].position()))
        .collect();

    let estimates: Vec<LinkageEstimate> = if threads <= 1 || positions.len() <= 1 {
        positions.iter()
            .map(|&(p0, p1)| estimator.estimate(p0, p1))
            .collect()
    } else {
        debug!("Starting linkage pool with {} threads...", threads);
        let pool = ThreadPool::new(threads);
        let (tx, rx) = mpsc::channel();
        for (transition_index, &(p0, p1)) in positions.iter().enumerate() {
            let tx = tx.clone();
            let estimator = estimator.clone();
            pool.execute(move|| {
                let estimate = estimator.estimate(p0, p1);
                tx.send((transition_index, estimate)).expect("channel will be there waiting for the pool");
            });
        }
        drop(tx);

        let mut results: Vec<(usize, LinkageEstimate)> = rx.iter().collect();
        if pool.panic_count() > 0 || results.len() != positions.len() {
            bail!("Panic detected in linkage ThreadPool, {} of {} transitions completed", results.len(), positions.len());
        }
        results.sort_by_key(|(transition_index, _e)| *transition_index);
        results.into_iter()
            .map(|(_i, e)| e)
            .collect()
    };

    Ok(positions.into_iter()
        .zip(estimates)
        .map(|((position0, position1), estimate)| SiteTransition::new(position0, position1, estimate))
        .collect())
}
