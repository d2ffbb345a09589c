
/// Contains the AlignedRead record type loaded from the alignment source
pub mod aligned_read;
/// Contains the VariantSite type produced by variant calling
pub mod variant_site;
