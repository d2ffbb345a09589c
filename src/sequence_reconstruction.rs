
use crate::data_types::variant_site::VariantSite;
use crate::variant_calling::SiteTally;

use log::debug;

/// Marker for coordinates that no accepted read covers
pub const NO_DATA: u8 = b'-';
/// Marker held at variant coordinates in the backbone until a haplotype fills them in
pub const VARIANT_PLACEHOLDER: u8 = b'?';

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ReconstructionError {
    #[error("haplotype has {found} alleles, but the backbone has {expected} variant sites")]
    AlleleCountMismatch { expected: usize, found: usize }
}

/// Returns the majority allele at every coordinate in the tally, with `NO_DATA` for uncovered coordinates.
/// # Arguments
/// * `tally` - the per-coordinate allele counts
pub fn majority_consensus(tally: &SiteTally) -> Vec<u8> {
    (0..tally.len())
        .map(|position| {
            tally.counts(position)
                .and_then(|c| c.majority_allele())
                .unwrap_or(NO_DATA)
        })
        .collect()
}

/// The shared sequence that every haplotype is projected onto.
/// Non-variant coordinates hold the consensus allele, variant coordinates hold a placeholder.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConsensusBackbone {
    /// backbone sequence spanning coordinate 0 through the highest covered coordinate
    sequence: Vec<u8>,
    /// the variant coordinates, ascending
    variant_positions: Vec<usize>
}

impl ConsensusBackbone {
    /// Builds the backbone from the tally and the called variant sites.
    /// # Arguments
    /// * `tally` - the per-coordinate allele counts
    /// * `variant_sites` - the called variant sites in ascending coordinate order
    /// # Panics
    /// * if a variant site is outside the tallied range or the sites are not ascending
    pub fn new(tally: &SiteTally, variant_sites: &[VariantSite]) -> ConsensusBackbone {
        let mut sequence: Vec<u8> = majority_consensus(tally);
        let mut variant_positions: Vec<usize> = Vec::with_capacity(variant_sites.len());
        for site in variant_sites.iter() {
            let position: usize = site.position();
            assert!(position < sequence.len());
            if let Some(&previous) = variant_positions.last() {
                assert!(previous < position);
            }
            sequence[position] = VARIANT_PLACEHOLDER;
            variant_positions.push(position);
        }
        debug!("Built backbone of length {} with {} variant placeholders", sequence.len(), variant_positions.len());
        ConsensusBackbone {
            sequence,
            variant_positions
        }
    }

    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn variant_positions(&self) -> &[usize] {
        &self.variant_positions
    }

    /// Fills in the variant coordinates with one haplotype's alleles, in site order.
    /// # Arguments
    /// * `alleles` - one allele per variant site
    /// # Errors
    /// * if the number of alleles does not match the number of variant sites
    pub fn reconstruct(&self, alleles: &[u8]) -> Result<Vec<u8>, ReconstructionError> {
        if alleles.len() != self.variant_positions.len() {
            return Err(ReconstructionError::AlleleCountMismatch {
                expected: self.variant_positions.len(),
                found: alleles.len()
            });
        }
        let mut haplotype: Vec<u8> = self.sequence.clone();
        for (&position, &allele) in self.variant_positions.iter().zip(alleles.iter()) {
            haplotype[position] = allele;
        }
        Ok(haplotype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allele_dag::AlleleDag;
    use crate::data_types::aligned_read::AlignedRead;
    use crate::variant_calling::call_variants;

    fn read(sequence: &str, clone_count: u64, start: usize) -> AlignedRead {
        AlignedRead::new(sequence.as_bytes().to_vec(), clone_count, 1, start, vec![0]).unwrap()
    }

    #[test]
    fn test_backbone() {
        let reads = vec![
            read("ACGTA", 5, 2),
            read("ACTTA", 4, 2),
            read("GG", 1, 9)
        ];
        let tally = SiteTally::from_reads(&reads);
        assert_eq!(majority_consensus(&tally), b"--ACGTA--GG".to_vec());

        let variant_sites = call_variants(&tally, 0.1).unwrap();
        assert_eq!(variant_sites.len(), 1);
        let backbone = ConsensusBackbone::new(&tally, &variant_sites);
        assert_eq!(backbone.sequence(), b"--AC?TA--GG");
        assert_eq!(backbone.len(), 11);
        assert_eq!(backbone.variant_positions(), &[4]);

        assert_eq!(backbone.reconstruct(b"G").unwrap(), b"--ACGTA--GG".to_vec());
        assert_eq!(backbone.reconstruct(b"T").unwrap(), b"--ACTTA--GG".to_vec());
        assert_eq!(backbone.reconstruct(b""), Err(ReconstructionError::AlleleCountMismatch { expected: 1, found: 0 }));
    }

    #[test]
    fn test_consensus_roundtrip() {
        // single-allele levels built from the majority alleles reproduce the consensus
        let reads = vec![
            read("AACCGGTT", 6, 0),
            read("ATCCGCTT", 3, 0),
            read("AACCGGTT", 1, 0)
        ];
        let tally = SiteTally::from_reads(&reads);
        let variant_sites = call_variants(&tally, 0.1).unwrap();
        assert_eq!(variant_sites.iter().map(|s| s.position()).collect::<Vec<usize>>(), vec![1, 5]);

        let backbone = ConsensusBackbone::new(&tally, &variant_sites);
        let mut dag = AlleleDag::new();
        for site in variant_sites.iter() {
            dag.add_unlinked_level(&[site.alleles()[0]]).unwrap();
        }
        let paths = dag.get_paths();
        assert_eq!(paths.len(), 1);
        assert_eq!(backbone.reconstruct(&paths[0]).unwrap(), majority_consensus(&tally));
    }

    #[test]
    fn test_empty_backbone() {
        let tally = SiteTally::from_reads(&[]);
        let backbone = ConsensusBackbone::new(&tally, &[]);
        assert!(backbone.is_empty());
        assert_eq!(backbone.reconstruct(&[]).unwrap(), Vec::<u8>::new());
    }
}
