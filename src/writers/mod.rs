/// Contains the writer for reconstructed haplotype sequences
pub mod haplotype_writer;
/// Contains the writer for the transition linkage table
pub mod linkage_writer;
/// Contains the writer for the variant site table
pub mod site_writer;
