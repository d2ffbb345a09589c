
use crate::data_types::aligned_read::AlignedRead;
use crate::data_types::variant_site::VariantSite;

use log::{debug, trace};
use rustc_hash::FxHashMap as HashMap;

/// The default fraction of the top allele count that a competing allele must exceed
pub const DEFAULT_VARIANT_THRESHOLD: f64 = 0.1;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum VariantCallError {
    #[error("position {position} has {} credible alleles ({}), but at most 2 are allowed", .alleles.len(), format_alleles(.alleles))]
    InvalidPloidy { position: usize, alleles: Vec<(u8, u64)> },
    #[error("variant threshold fraction must be in the range [0.0, 1.0), but got {0}")]
    InvalidThreshold(f64)
}

/// Formats allele counts as "A:100,C:60" for error messages
fn format_alleles(alleles: &[(u8, u64)]) -> String {
    alleles.iter()
        .map(|&(a, c)| format!("{}:{}", a as char, c))
        .collect::<Vec<String>>()
        .join(",")
}

/// Weighted multiset of the alleles observed at a single reference coordinate.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AlleleCounts {
    /// allele -> sum of clone counts observing it
    counts: HashMap<u8, u64>
}

impl AlleleCounts {
    pub fn new() -> AlleleCounts {
        Default::default()
    }

    /// Adds `weight` observations of `allele`
    pub fn add(&mut self, allele: u8, weight: u64) {
        *self.counts.entry(allele).or_insert(0) += weight;
    }

    pub fn get(&self, allele: u8) -> u64 {
        self.counts.get(&allele).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Total weighted observations at this coordinate
    pub fn coverage(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Returns all (allele, count) pairs sorted by descending count.
    /// Ties are broken by ascending allele so the order never depends on hashing.
    pub fn ranked(&self) -> Vec<(u8, u64)> {
        let mut ranked: Vec<(u8, u64)> = self.counts.iter()
            .map(|(&a, &c)| (a, c))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
    }

    /// Returns the most frequently observed allele, if any
    pub fn majority_allele(&self) -> Option<u8> {
        self.ranked().first().map(|&(a, _c)| a)
    }

    /// Returns the alleles whose count is strictly greater than `threshold_fraction` times the top count, most frequent first.
    /// # Arguments
    /// * `threshold_fraction` - fraction of the top allele count that another allele must exceed
    pub fn credible_alleles(&self, threshold_fraction: f64) -> Vec<(u8, u64)> {
        let ranked = self.ranked();
        let top_count: u64 = match ranked.first() {
            Some(&(_a, c)) => c,
            None => return vec![]
        };
        let threshold: f64 = top_count as f64 * threshold_fraction;
        ranked.into_iter()
            .filter(|&(_a, c)| c as f64 > threshold)
            .collect()
    }
}

/// Per-coordinate allele tallies over every uniquely mapped read.
#[derive(Clone, Debug, Default)]
pub struct SiteTally {
    /// indexed by reference coordinate, length is the highest covered coordinate + 1
    sites: Vec<AlleleCounts>,
    /// number of read records that were counted
    accepted_reads: u64,
    /// number of read records skipped because they mapped to multiple regions
    skipped_reads: u64
}

impl SiteTally {
    /// Tallies the observed alleles at every coordinate from a collection of reads.
    /// Reads that map to more than one region are skipped entirely.
    /// # Arguments
    /// * `reads` - all loaded reads, multi-region reads included
    pub fn from_reads(reads: &[AlignedRead]) -> SiteTally {
        let mut tally: SiteTally = Default::default();
        for read in reads.iter() {
            if !read.is_uniquely_mapped() {
                trace!("Skipping read at {} mapped to {} regions", read.start(), read.region_count());
                tally.skipped_reads += 1;
                continue;
            }

            if tally.sites.len() < read.end() {
                tally.sites.resize_with(read.end(), Default::default);
            }
            let weight: u64 = read.clone_count();
            for (offset, &allele) in read.sequence().iter().enumerate() {
                tally.sites[read.start() + offset].add(allele, weight);
            }
            tally.accepted_reads += 1;
        }
        debug!("Tallied {} reads ({} multi-region reads skipped) across {} coordinates", tally.accepted_reads, tally.skipped_reads, tally.sites.len());
        tally
    }

    /// Returns the number of coordinates spanned, i.e. the highest covered coordinate + 1
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Returns the counts at a coordinate, or None if no accepted read covers it
    pub fn counts(&self, position: usize) -> Option<&AlleleCounts> {
        self.sites.get(position).filter(|ac| !ac.is_empty())
    }

    /// Iterates over every covered coordinate in ascending order
    pub fn covered_sites(&self) -> impl Iterator<Item = (usize, &AlleleCounts)> {
        self.sites.iter()
            .enumerate()
            .filter(|(_p, ac)| !ac.is_empty())
    }

    pub fn accepted_reads(&self) -> u64 {
        self.accepted_reads
    }

    pub fn skipped_reads(&self) -> u64 {
        self.skipped_reads
    }
}

/// Decides whether a single coordinate is a variant site.
/// Returns `Ok(None)` for monomorphic (or uncovered) coordinates.
/// # Arguments
/// * `position` - the coordinate being classified
/// * `counts` - the allele counts at that coordinate
/// * `threshold_fraction` - fraction of the top allele count that another allele must exceed to be credible
/// # Errors
/// * `InvalidPloidy` if more than two alleles are credible
pub fn classify_site(position: usize, counts: &AlleleCounts, threshold_fraction: f64) -> Result<Option<VariantSite>, VariantCallError> {
    let credible: Vec<(u8, u64)> = counts.credible_alleles(threshold_fraction);
    match credible.len() {
        0 | 1 => Ok(None),
        2 => Ok(Some(VariantSite::new(
            position,
            [credible[0].0, credible[1].0],
            [credible[0].1, credible[1].1],
            counts.coverage()
        ))),
        _ => Err(VariantCallError::InvalidPloidy { position, alleles: credible })
    }
}

/// Calls every variant site in a tally, returned in ascending coordinate order.
/// # Arguments
/// * `tally` - the per-coordinate allele counts
/// * `threshold_fraction` - fraction of the top allele count that another allele must exceed to be credible
/// # Errors
/// * `InvalidThreshold` if `threshold_fraction` is outside [0.0, 1.0)
/// * `InvalidPloidy` on the first coordinate with more than two credible alleles
pub fn call_variants(tally: &SiteTally, threshold_fraction: f64) -> Result<Vec<VariantSite>, VariantCallError> {
    if !(0.0..1.0).contains(&threshold_fraction) {
        return Err(VariantCallError::InvalidThreshold(threshold_fraction));
    }

    let mut variant_sites: Vec<VariantSite> = vec![];
    for (position, counts) in tally.covered_sites() {
        if let Some(site) = classify_site(position, counts, threshold_fraction)? {
            debug!("Variant site at {}: {}/{} ({}/{} of {})",
                position, site.alleles()[0] as char, site.alleles()[1] as char,
                site.counts()[0], site.counts()[1], site.coverage()
            );
            variant_sites.push(site);
        }
    }
    Ok(variant_sites)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_counts(values: &[(u8, u64)]) -> AlleleCounts {
        let mut counts = AlleleCounts::new();
        for &(a, c) in values.iter() {
            counts.add(a, c);
        }
        counts
    }

    #[test]
    fn test_allele_counts() {
        let counts = build_counts(&[(b'C', 5), (b'A', 7), (b'G', 5), (b'A', 3)]);
        assert_eq!(counts.get(b'A'), 10);
        assert_eq!(counts.get(b'T'), 0);
        assert_eq!(counts.coverage(), 20);
        // ties on count are ordered by allele
        assert_eq!(counts.ranked(), vec![(b'A', 10), (b'C', 5), (b'G', 5)]);
        assert_eq!(counts.majority_allele(), Some(b'A'));
        assert_eq!(AlleleCounts::new().majority_allele(), None);
    }

    #[test]
    fn test_single_dominant_allele() {
        // threshold = 10, only A exceeds it
        let counts = build_counts(&[(b'A', 100), (b'C', 5), (b'G', 3)]);
        assert_eq!(counts.credible_alleles(0.1), vec![(b'A', 100)]);
        assert_eq!(classify_site(7, &counts, 0.1), Ok(None));
    }

    #[test]
    fn test_too_many_alleles() {
        // threshold = 10, everything exceeds it
        let counts = build_counts(&[(b'A', 100), (b'C', 60), (b'G', 55)]);
        let result = classify_site(7, &counts, 0.1);
        assert_eq!(result, Err(VariantCallError::InvalidPloidy {
            position: 7,
            alleles: vec![(b'A', 100), (b'C', 60), (b'G', 55)]
        }));
        let message = result.unwrap_err().to_string();
        assert!(message.contains("A:100,C:60,G:55"));
    }

    #[test]
    fn test_threshold_is_strict() {
        // C is exactly at the threshold and should not be credible
        let counts = build_counts(&[(b'A', 100), (b'C', 10)]);
        assert_eq!(classify_site(0, &counts, 0.1), Ok(None));

        let counts = build_counts(&[(b'A', 100), (b'C', 11)]);
        let site = classify_site(0, &counts, 0.1).unwrap().unwrap();
        assert_eq!(site.alleles(), &[b'A', b'C']);
        assert_eq!(site.counts(), &[100, 11]);
        assert_eq!(site.coverage(), 111);
    }

    #[test]
    fn test_site_tally() {
        let reads = vec![
            AlignedRead::new(b"ACG".to_vec(), 2, 1, 1, vec![0]).unwrap(),
            AlignedRead::new(b"ATG".to_vec(), 1, 1, 1, vec![0]).unwrap(),
            // this one is ignored because it maps to two regions
            AlignedRead::new(b"TTTTTT".to_vec(), 5, 2, 0, vec![0, 0]).unwrap()
        ];
        let tally = SiteTally::from_reads(&reads);
        assert_eq!(tally.len(), 4);
        assert_eq!(tally.accepted_reads(), 2);
        assert_eq!(tally.skipped_reads(), 1);
        assert!(tally.counts(0).is_none());
        assert_eq!(tally.counts(1).unwrap().ranked(), vec![(b'A', 3)]);
        assert_eq!(tally.counts(2).unwrap().ranked(), vec![(b'C', 2), (b'T', 1)]);
        assert!(tally.counts(4).is_none());
        assert_eq!(tally.covered_sites().map(|(p, _c)| p).collect::<Vec<usize>>(), vec![1, 2, 3]);

        let variant_sites = call_variants(&tally, 0.1).unwrap();
        assert_eq!(variant_sites.len(), 1);
        assert_eq!(variant_sites[0].position(), 2);
        assert_eq!(variant_sites[0].alleles(), &[b'C', b'T']);

        // at 0.5, a weight of 1 vs 2 is not enough
        assert!(call_variants(&tally, 0.5).unwrap().is_empty());
    }

    #[test]
    fn test_bad_threshold() {
        let tally = SiteTally::default();
        assert_eq!(call_variants(&tally, 1.0), Err(VariantCallError::InvalidThreshold(1.0)));
        assert_eq!(call_variants(&tally, -0.1), Err(VariantCallError::InvalidThreshold(-0.1)));
        assert!(call_variants(&tally, f64::NAN).is_err());
        assert_eq!(call_variants(&tally, 0.0), Ok(vec![]));
    }
}
