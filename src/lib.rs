/// Layered allele graph where each level holds the alleles of one variant site
pub mod allele_dag;
/// CLI functionality and checks
pub mod cli;
/// Contains the core data types for reads and variant sites
pub mod data_types;
/// Lazy enumeration of every root-to-frontier path through the allele graph
pub mod haplotype_paths;
/// Estimates allele linkage between consecutive variant sites from reads that span both
pub mod linkage;
/// Organizes the primary workflow: tally, variant calling, linkage estimation, and graph construction, bundled into one result
pub mod phaser;
/// Components for loading aligned read records from FASTA-formatted alignment output
pub mod read_parsing;
/// Consensus backbone construction and projection of haplotype alleles onto it
pub mod sequence_reconstruction;
/// Per-coordinate allele tallies and credible-allele variant calling
pub mod variant_calling;
/// Contains all the various output writer functionality
pub mod writers;
