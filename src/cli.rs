
use clap::Parser;
use chrono::Datelike;
use lazy_static::lazy_static;
use log::{error, info, warn};
use std::path::{Path, PathBuf};

use crate::allele_dag::MismatchPolicy;
use crate::phaser::PhaseConfig;

lazy_static! {
    /// Stores the full version string we plan to use.
    /// # Examples
    /// * `0.3.0-6bb9635-dirty` - while on a dirty branch
    /// * `0.3.0-6bb9635` - with a fresh commit
    pub static ref FULL_VERSION: String = format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("VERGEN_GIT_DESCRIBE"));
}

#[derive(Clone, Parser)]
#[clap(author,
    version = &**FULL_VERSION,
    about,
    after_help = format!("Copyright (C) 2023-{}     The hladag developers
This program comes with ABSOLUTELY NO WARRANTY; it is intended for
Research Use Only and not for use in diagnostic procedures.", chrono::Utc::now().year()))]
pub struct Settings {
    /// Input read alignments in FASTA format, gzip allowed
    #[clap(required = true)]
    #[clap(short = 'd')]
    #[clap(long = "data")]
    #[clap(value_name = "FASTA")]
    #[clap(help_heading = Some("Input/Output"))]
    pub data_filename: PathBuf,

    /// Output haplotype sequences, one per line
    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output")]
    #[clap(value_name = "FILE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_filename: PathBuf,

    /// Output variant site table (optional, csv/tsv)
    #[clap(long = "sites-file")]
    #[clap(value_name = "FILE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub sites_filename: Option<PathBuf>,

    /// Output linkage table (optional, csv/tsv)
    #[clap(long = "linkage-file")]
    #[clap(value_name = "FILE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub linkage_filename: Option<PathBuf>,

    /// Number of threads to use for linkage estimation
    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    pub threads: usize,

    /// Enable verbose output
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// An allele is credible if its count is greater than this fraction of the most frequent allele
    #[clap(long = "variant-threshold")]
    #[clap(value_name = "FRAC")]
    #[clap(default_value = "0.1")]
    #[clap(help_heading = Some("Variant Calling"))]
    pub variant_threshold: f64,

    /// Patch linkage alleles missing from the previous site into the graph instead of failing
    #[clap(long = "patch-linkage-mismatch")]
    #[clap(help_heading = Some("Haplotype Graph"))]
    pub patch_linkage_mismatch: bool
}

/// Checks if a file exists and will otherwise exit
/// # Arguments
/// * `filename` - the file path to check for
/// * `label` - the label to use for error messages
fn check_required_filename(filename: &Path, label: &str) {
    if !filename.exists() {
        error!("{} does not exist: \"{}\"", label, filename.display());
        std::process::exit(exitcode::NOINPUT);
    } else {
        info!("{}: \"{}\"", label, filename.display());
    }
}

/// Checks that the folder an output file will be written into exists
/// # Arguments
/// * `filename` - the output file path
/// * `label` - the label to use for error messages
fn check_output_filename(filename: &Path, label: &str) {
    match filename.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            error!("{} folder does not exist: \"{}\"", label, parent.display());
            std::process::exit(exitcode::CANTCREAT);
        },
        _ => {
            info!("{}: \"{}\"", label, filename.display());
        }
    }
}

impl Settings {
    /// Wrapper function to build the core phasing configuration from our CLI settings
    pub fn phase_config(&self) -> PhaseConfig {
        PhaseConfig {
            variant_threshold_fraction: self.variant_threshold,
            threads: self.threads,
            mismatch_policy: if self.patch_linkage_mismatch { MismatchPolicy::Patch } else { MismatchPolicy::Strict }
        }
    }
}

pub fn get_raw_settings() -> Settings {
    Settings::parse()
}

/// Do some additional checks here, we may increase these as we go.
/// Also can modify settings if needed since we're passing it around.
/// # Arguments
/// * `settings` - the raw settings, nothing has been checked other than what clap does for us.
pub fn check_settings(mut settings: Settings) -> Settings {
    check_required_filename(&settings.data_filename, "Alignment file");
    check_output_filename(&settings.output_filename, "Haplotype output");
    if let Some(filename) = settings.sites_filename.as_ref() {
        check_output_filename(filename, "Variant site table");
    }
    if let Some(filename) = settings.linkage_filename.as_ref() {
        check_output_filename(filename, "Linkage table");
    }

    if !(0.0..1.0).contains(&settings.variant_threshold) {
        error!("--variant-threshold must be in the range [0.0, 1.0)");
        std::process::exit(exitcode::USAGE);
    }

    // 0 doesn't make sense, so lets just error proof it up to 1
    if settings.threads == 0 {
        warn!("--threads was set to 0, using 1 thread instead");
        settings.threads = 1;
    }

    // dump stuff to the logger
    info!("Variant calling:");
    info!("\tCredible allele threshold: {}", settings.variant_threshold);
    info!("Haplotype graph:");
    info!("\tLinkage mismatch handling: {}", if settings.patch_linkage_mismatch { MismatchPolicy::Patch } else { MismatchPolicy::Strict });
    info!("Processing threads: {}", settings.threads);

    //send the settings back
    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_config() {
        let settings = Settings::parse_from(["hladag", "-d", "reads.fa", "-o", "haplotypes.txt"]);
        assert_eq!(settings.phase_config(), PhaseConfig::default());

        let settings = Settings::parse_from([
            "hladag", "--data", "reads.fa.gz", "--output", "haplotypes.txt",
            "--variant-threshold", "0.25", "--patch-linkage-mismatch", "-t", "4", "-vv"
        ]);
        assert_eq!(settings.verbosity, 2);
        assert_eq!(settings.phase_config(), PhaseConfig {
            variant_threshold_fraction: 0.25,
            threads: 4,
            mismatch_policy: MismatchPolicy::Patch
        });
    }
}
