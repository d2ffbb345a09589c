
/// A reference coordinate that was called as polymorphic.
/// Always holds exactly two credible alleles, ordered by descending observed weight.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VariantSite {
    /// the 0-based reference coordinate
    position: usize,
    /// the two credible alleles, most frequent first
    alleles: [u8; 2],
    /// the weighted observation count for each allele in `alleles`
    counts: [u64; 2],
    /// the total weighted coverage at this coordinate, including non-credible alleles
    coverage: u64
}

impl VariantSite {
    /// Creates a new variant site.
    /// # Arguments
    /// * `position` - the 0-based reference coordinate
    /// * `alleles` - the two credible alleles, most frequent first
    /// * `counts` - the weighted counts for each allele
    /// * `coverage` - total weighted coverage at the position
    /// # Panics
    /// * if the alleles are identical or not ordered by count
    /// * if the allele counts exceed the coverage
    pub fn new(position: usize, alleles: [u8; 2], counts: [u64; 2], coverage: u64) -> VariantSite {
        assert_ne!(alleles[0], alleles[1]);
        assert!(counts[0] >= counts[1]);
        assert!(counts[0] + counts[1] <= coverage);
        VariantSite {
            position,
            alleles,
            counts,
            coverage
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn alleles(&self) -> &[u8; 2] {
        &self.alleles
    }

    pub fn counts(&self) -> &[u64; 2] {
        &self.counts
    }

    pub fn coverage(&self) -> u64 {
        self.coverage
    }

    /// Returns true if `allele` is one of the two credible alleles here
    pub fn is_credible(&self, allele: u8) -> bool {
        self.alleles.contains(&allele)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_site() {
        let site = VariantSite::new(10, [b'A', b'G'], [8, 2], 11);
        assert_eq!(site.position(), 10);
        assert_eq!(site.alleles(), &[b'A', b'G']);
        assert_eq!(site.counts(), &[8, 2]);
        assert_eq!(site.coverage(), 11);
        assert!(site.is_credible(b'A'));
        assert!(site.is_credible(b'G'));
        assert!(!site.is_credible(b'T'));
    }

    #[test]
    #[should_panic]
    fn test_unordered_counts() {
        VariantSite::new(0, [b'A', b'G'], [2, 8], 10);
    }
}
