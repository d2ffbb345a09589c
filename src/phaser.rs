
use crate::allele_dag::{AlleleDag, DagError, MismatchPolicy};
use crate::data_types::aligned_read::AlignedRead;
use crate::data_types::variant_site::VariantSite;
use crate::linkage::{estimate_linkages, AlleleLinkage, LinkageEstimate, LinkageEstimator, SiteTransition};
use crate::sequence_reconstruction::{ConsensusBackbone, ReconstructionError};
use crate::variant_calling::{call_variants, SiteTally, VariantCallError, DEFAULT_VARIANT_THRESHOLD};

use log::{debug, info, warn};
use std::sync::Arc;

/// Core settings for a single phasing run
#[derive(Clone, Debug, PartialEq)]
pub struct PhaseConfig {
    /// an allele is credible if its count is strictly greater than this fraction of the top count
    pub variant_threshold_fraction: f64,
    /// number of threads used for linkage estimation
    pub threads: usize,
    /// how linkage alleles outside the credible set are handled
    pub mismatch_policy: MismatchPolicy
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            variant_threshold_fraction: DEFAULT_VARIANT_THRESHOLD,
            threads: 1,
            mismatch_policy: MismatchPolicy::Strict
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PhaseError {
    #[error("variant calling failed: {0}")]
    VariantCall(#[from] VariantCallError),
    #[error("linkage estimation failed: {0}")]
    LinkageEstimation(String),
    #[error("linkage {first}->{second} between positions {position0} and {position1} uses an allele that is not credible at its site")]
    LinkageAlleleMismatch { position0: usize, position1: usize, first: char, second: char },
    #[error("haplotype graph construction failed: {0}")]
    Dag(#[from] DagError)
}

/// Overall outcome of a phasing run
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum_macros::Display)]
pub enum PhaseStatus {
    /// at least one variant site was found and phased
    Phased,
    /// no variant sites, only the consensus haplotype is reported
    NoVariantSites
}

/// Everything produced by one phasing run
#[derive(Debug)]
pub struct PhaseResult {
    /// overall status of the run
    pub status: PhaseStatus,
    /// number of read records that contributed to the tally
    pub accepted_reads: u64,
    /// number of read records skipped for mapping to multiple regions
    pub skipped_reads: u64,
    /// the called variant sites, ascending by position
    pub variant_sites: Vec<VariantSite>,
    /// linkage estimates between consecutive variant sites
    pub transitions: Vec<SiteTransition>,
    /// the haplotype graph, one level per variant site
    pub dag: AlleleDag,
    /// consensus sequence with placeholders at the variant sites
    pub backbone: ConsensusBackbone
}

impl PhaseResult {
    /// Lazily reconstructs every candidate haplotype, in path enumeration order.
    pub fn haplotype_sequences(&self) -> impl Iterator<Item = Result<Vec<u8>, ReconstructionError>> + '_ {
        self.dag.paths()
            .map(move |path| self.backbone.reconstruct(&self.dag.path_alleles(&path)))
    }

    /// Counts the candidate haplotypes without reconstructing them
    pub fn num_haplotypes(&self) -> usize {
        self.dag.paths().count()
    }
}

/// Checks that every allele in a linkage is one of the alleles called at its site.
/// # Arguments
/// * `source` - the upstream variant site
/// * `target` - the downstream variant site
/// * `linkages` - the retained linkages between the two sites
/// # Errors
/// * `LinkageAlleleMismatch` for the first linkage that uses an allele not called at its site
pub fn validate_linkages(source: &VariantSite, target: &VariantSite, linkages: &[AlleleLinkage]) -> Result<(), PhaseError> {
    for linkage in linkages.iter() {
        if !source.is_credible(linkage.first()) || !target.is_credible(linkage.second()) {
            return Err(PhaseError::LinkageAlleleMismatch {
                position0: source.position(),
                position1: target.position(),
                first: linkage.first() as char,
                second: linkage.second() as char
            });
        }
    }
    Ok(())
}

/// Builds the haplotype graph with one level per variant site.
/// The first site and any site after an unlinked transition get an unconstrained level.
/// # Arguments
/// * `variant_sites` - the called variant sites in ascending order
/// * `transitions` - one linkage estimate per consecutive pair of sites
/// * `mismatch_policy` - controls validation of linkage alleles
/// # Errors
/// * `LinkageAlleleMismatch` if a linkage allele is not called at its site and the policy is `Strict`
/// * `Dag` if the graph rejects a level
/// # Panics
/// * if the number of transitions does not match the number of sites
pub fn build_dag(variant_sites: &[VariantSite], transitions: &[SiteTransition], mismatch_policy: MismatchPolicy) -> Result<AlleleDag, PhaseError> {
    let mut dag = AlleleDag::with_policy(mismatch_policy);
    if variant_sites.is_empty() {
        assert!(transitions.is_empty());
        return Ok(dag);
    }
    assert_eq!(transitions.len() + 1, variant_sites.len());

    dag.add_unlinked_level(variant_sites[0].alleles())?;
    for (sites, transition) in variant_sites.windows(2).zip(transitions.iter()) {
        let (source, target) = (&sites[0], &sites[1]);
        assert_eq!(source.position(), transition.position0());
        assert_eq!(target.position(), transition.position1());
        match transition.estimate() {
            LinkageEstimate::Unlinked => {
                debug!("No joint reads for {} -> {}, adding unlinked level", source.position(), target.position());
                dag.add_unlinked_level(target.alleles())?;
            },
            LinkageEstimate::Linked(linkages) => {
                if mismatch_policy == MismatchPolicy::Strict {
                    validate_linkages(source, target, linkages)?;
                }
                // called alleles can be missing from a frontier built by a linked level
                dag.add_certified_level(linkages, source.alleles())?;
            }
        }
    }
    Ok(dag)
}

/// Runs the full pipeline on one locus: tally, variant calling, linkage estimation, and graph construction.
/// # Arguments
/// * `reads` - all loaded reads; multi-region reads are skipped
/// * `config` - run settings
/// # Errors
/// * if variant calling fails, e.g. a site has more than two credible alleles
/// * if linkage estimation fails
/// * if the graph cannot be built under the configured mismatch policy
pub fn solve_locus(reads: &[AlignedRead], config: &PhaseConfig) -> Result<PhaseResult, PhaseError> {
    let tally = SiteTally::from_reads(reads);
    info!("Tallied {} coordinates from {} reads, {} multi-region reads skipped", tally.len(), tally.accepted_reads(), tally.skipped_reads());

    let variant_sites: Vec<VariantSite> = call_variants(&tally, config.variant_threshold_fraction)?;
    info!("Called {} variant sites", variant_sites.len());
    for site in variant_sites.iter() {
        debug!("Variant site {}: {:?}", site.position(), site);
    }
    let backbone = ConsensusBackbone::new(&tally, &variant_sites);

    let (status, transitions) = if variant_sites.is_empty() {
        warn!("No variant sites found, reporting the consensus haplotype only");
        (PhaseStatus::NoVariantSites, vec![])
    } else {
        let estimator = Arc::new(LinkageEstimator::new(reads));
        let transitions = estimate_linkages(estimator, &variant_sites, config.threads)
            .map_err(|e| PhaseError::LinkageEstimation(e.to_string()))?;
        let num_unlinked: usize = transitions.iter()
            .filter(|t| *t.estimate() == LinkageEstimate::Unlinked)
            .count();
        info!("Estimated {} transitions, {} unlinked", transitions.len(), num_unlinked);
        (PhaseStatus::Phased, transitions)
    };

    let dag = build_dag(&variant_sites, &transitions, config.mismatch_policy)?;
    info!("Built haplotype graph with {} levels, {} nodes, and {} edges", dag.num_levels(), dag.num_nodes(), dag.num_edges());

    Ok(PhaseResult {
        status,
        accepted_reads: tally.accepted_reads(),
        skipped_reads: tally.skipped_reads(),
        variant_sites,
        transitions,
        dag,
        backbone
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(sequence: &str, clone_count: u64, start: usize) -> AlignedRead {
        AlignedRead::new(sequence.as_bytes().to_vec(), clone_count, 1, start, vec![0]).unwrap()
    }

    /// Reads where positions 10 and 11 are linked as (A, C) x8 and (G, T) x2
    fn linked_reads() -> Vec<AlignedRead> {
        vec![
            read("TTACGG", 8, 8),
            read("TTGTGG", 2, 8)
        ]
    }

    #[test]
    fn test_linked_pair() {
        let result = solve_locus(&linked_reads(), &PhaseConfig::default()).unwrap();
        assert_eq!(result.status, PhaseStatus::Phased);
        assert_eq!(result.variant_sites.len(), 2);
        assert_eq!(result.variant_sites[0].position(), 10);
        assert_eq!(result.variant_sites[1].position(), 11);

        assert_eq!(result.transitions.len(), 1);
        match result.transitions[0].estimate() {
            LinkageEstimate::Linked(linkages) => {
                assert_eq!(linkages.len(), 2);
                assert!((linkages[0].weight() - 0.8_f64.ln()).abs() < 1e-9);
                assert!((linkages[1].weight() - 0.2_f64.ln()).abs() < 1e-9);
            },
            LinkageEstimate::Unlinked => panic!("expected linked transition")
        };

        let haplotypes: Vec<Vec<u8>> = result.haplotype_sequences()
            .collect::<Result<Vec<Vec<u8>>, _>>()
            .unwrap();
        assert_eq!(result.num_haplotypes(), 2);
        assert_eq!(haplotypes, vec![b"--------TTACGG".to_vec(), b"--------TTGTGG".to_vec()]);

        // the two haplotypes differ only at the variant sites
        let differences: Vec<usize> = (0..haplotypes[0].len())
            .filter(|&i| haplotypes[0][i] != haplotypes[1][i])
            .collect();
        assert_eq!(differences, vec![10, 11]);
    }

    #[test]
    fn test_threaded_matches_serial() {
        let mut reads = linked_reads();
        reads.push(read("CCAAAT", 5, 20));
        reads.push(read("CCGAAC", 5, 20));
        let serial = solve_locus(&reads, &PhaseConfig::default()).unwrap();
        let threaded = solve_locus(&reads, &PhaseConfig { threads: 4, ..Default::default() }).unwrap();
        assert_eq!(serial.transitions, threaded.transitions);

        let serial_haps: Vec<Vec<u8>> = serial.haplotype_sequences().map(|h| h.unwrap()).collect();
        let threaded_haps: Vec<Vec<u8>> = threaded.haplotype_sequences().map(|h| h.unwrap()).collect();
        assert_eq!(serial_haps, threaded_haps);
        // 10-11 linked, 11-22 has no joint reads, 22-25 linked
        assert_eq!(serial.variant_sites.len(), 4);
        assert_eq!(serial_haps.len(), 4);
    }

    #[test]
    fn test_no_variant_sites() {
        let reads = vec![
            read("ACGT", 3, 0),
            read("CGTA", 2, 1)
        ];
        let result = solve_locus(&reads, &PhaseConfig::default()).unwrap();
        assert_eq!(result.status, PhaseStatus::NoVariantSites);
        assert!(result.transitions.is_empty());
        let haplotypes: Vec<Vec<u8>> = result.haplotype_sequences().map(|h| h.unwrap()).collect();
        assert_eq!(haplotypes, vec![b"ACGTA".to_vec()]);
    }

    #[test]
    fn test_multi_region_reads_skipped() {
        let mut reads = linked_reads();
        reads.push(AlignedRead::new(b"TTTTGG".to_vec(), 50, 2, 8, vec![10, 10]).unwrap());
        let result = solve_locus(&reads, &PhaseConfig::default()).unwrap();
        assert_eq!(result.skipped_reads, 1);
        assert_eq!(result.num_haplotypes(), 2);
    }

    #[test]
    fn test_invalid_ploidy() {
        let reads = vec![
            read("A", 100, 0),
            read("C", 60, 0),
            read("G", 55, 0)
        ];
        let result = solve_locus(&reads, &PhaseConfig::default());
        assert!(matches!(result, Err(PhaseError::VariantCall(VariantCallError::InvalidPloidy { position: 0, .. }))));
    }

    /// Position 10 calls (A, G) while N is below threshold, but the joint reads keep (A, C) and (N, T).
    fn mismatched_reads() -> Vec<AlignedRead> {
        vec![
            read("AC", 10, 10),
            read("NT", 5, 10),
            read("GT", 1, 10),
            read("A", 40, 10),
            read("G", 9, 10)
        ]
    }

    #[test]
    fn test_strict_mismatch() {
        let result = solve_locus(&mismatched_reads(), &PhaseConfig::default());
        match result {
            Err(PhaseError::LinkageAlleleMismatch { position0, position1, first, second }) => {
                assert_eq!((position0, position1), (10, 11));
                assert_eq!((first, second), ('N', 'T'));
            },
            other => panic!("expected LinkageAlleleMismatch, got {other:?}")
        };
    }

    #[test]
    fn test_called_allele_missing_from_frontier() {
        // 10->11 only retains pairs ending in C, but T is called at 11 and linked to 12
        let reads = vec![
            read("AC", 8, 10),
            read("GC", 5, 10),
            read("CG", 6, 11),
            read("TA", 6, 11)
        ];
        let result = solve_locus(&reads, &PhaseConfig::default()).unwrap();
        assert_eq!(result.status, PhaseStatus::Phased);
        assert_eq!(result.variant_sites.iter().map(|s| s.position()).collect::<Vec<usize>>(), vec![10, 11, 12]);
        assert_eq!(result.dag.get_paths(), vec![b"ACG".to_vec(), b"ATA".to_vec(), b"GCG".to_vec(), b"GTA".to_vec()]);

        let haplotypes: Vec<Vec<u8>> = result.haplotype_sequences().map(|h| h.unwrap()).collect();
        assert_eq!(haplotypes.len(), 4);
        assert_eq!(haplotypes[1], b"----------ATA".to_vec());
    }

    #[test]
    fn test_patch_mismatch() {
        let config = PhaseConfig {
            mismatch_policy: MismatchPolicy::Patch,
            ..Default::default()
        };
        let result = solve_locus(&mismatched_reads(), &config).unwrap();
        assert_eq!(result.status, PhaseStatus::Phased);

        let site_alleles: Vec<Vec<u8>> = result.dag.get_paths();
        assert_eq!(site_alleles, vec![b"AC".to_vec(), b"GC".to_vec(), b"GT".to_vec(), b"NT".to_vec()]);
        let haplotypes: Vec<Vec<u8>> = result.haplotype_sequences().map(|h| h.unwrap()).collect();
        assert_eq!(haplotypes.len(), 4);
        assert!(haplotypes.iter().all(|h| h.len() == 12));
        assert_eq!(&haplotypes[3][10..], b"NT");
    }

    #[test]
    fn test_validate_linkages() {
        let source = VariantSite::new(10, [b'A', b'G'], [8, 2], 10);
        let target = VariantSite::new(11, [b'C', b'T'], [8, 2], 10);
        let good = vec![AlleleLinkage::new(b'A', b'C', 8, 0.8_f64.ln())];
        assert!(validate_linkages(&source, &target, &good).is_ok());
        let bad = vec![AlleleLinkage::new(b'A', b'G', 8, 0.0)];
        assert!(matches!(validate_linkages(&source, &target, &bad), Err(PhaseError::LinkageAlleleMismatch { .. })));
    }
}
