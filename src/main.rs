
use hladag::cli::{Settings, check_settings, get_raw_settings};
use hladag::data_types::aligned_read::AlignedRead;
use hladag::phaser::{PhaseResult, PhaseStatus, solve_locus};
use hladag::read_parsing::load_alignments;
use hladag::writers::haplotype_writer::HaplotypeWriter;
use hladag::writers::linkage_writer::LinkageWriter;
use hladag::writers::site_writer::VariantSiteWriter;

use log::{LevelFilter, debug, error, info};
use std::time::Instant;

fn main() {
    // get the settings
    let settings: Settings = get_raw_settings();
    let filter_level: LevelFilter = match settings.verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace
    };

    // immediately setup logging first
    env_logger::builder()
        .format_timestamp_millis()
        .filter_level(filter_level)
        .init();

    // okay, now we can check all the other settings
    let cli_settings: Settings = check_settings(settings);
    let start_time = Instant::now();

    let reads: Vec<AlignedRead> = match load_alignments(&cli_settings.data_filename) {
        Ok(r) => r,
        Err(e) => {
            error!("Error while loading alignments: {}", e);
            std::process::exit(exitcode::DATAERR);
        }
    };

    let phase_result: PhaseResult = match solve_locus(&reads, &cli_settings.phase_config()) {
        Ok(pr) => pr,
        Err(e) => {
            error!("Error while phasing: {}", e);
            std::process::exit(exitcode::SOFTWARE);
        }
    };
    debug!("Backbone: {}", String::from_utf8_lossy(phase_result.backbone.sequence()));

    if let Some(filename) = cli_settings.sites_filename.as_ref() {
        info!("Saving variant sites to {:?}...", filename);
        let result: Result<(), Box<dyn std::error::Error>> = VariantSiteWriter::new(filename)
            .map_err(|e| e.into())
            .and_then(|mut w| w.write_sites(&phase_result.variant_sites));
        if let Err(e) = result {
            error!("Error while writing variant site table: {}", e);
            std::process::exit(exitcode::IOERR);
        }
    }

    if let Some(filename) = cli_settings.linkage_filename.as_ref() {
        info!("Saving linkages to {:?}...", filename);
        let result: Result<(), Box<dyn std::error::Error>> = LinkageWriter::new(filename)
            .map_err(|e| e.into())
            .and_then(|mut w| w.write_transitions(&phase_result.transitions));
        if let Err(e) = result {
            error!("Error while writing linkage table: {}", e);
            std::process::exit(exitcode::IOERR);
        }
    }

    info!("Saving haplotypes to {:?}...", cli_settings.output_filename);
    let mut haplotype_writer = match HaplotypeWriter::new(&cli_settings.output_filename) {
        Ok(w) => w,
        Err(e) => {
            error!("Error while opening haplotype output: {}", e);
            std::process::exit(exitcode::CANTCREAT);
        }
    };
    let num_haplotypes: usize = match haplotype_writer.write_haplotypes(&phase_result) {
        Ok(n) => n,
        Err(e) => {
            error!("Error while writing haplotypes: {}", e);
            std::process::exit(exitcode::IOERR);
        }
    };

    if phase_result.status == PhaseStatus::NoVariantSites {
        info!("Wrote the consensus haplotype only ({})", phase_result.status);
    } else {
        info!("Wrote {} haplotypes across {} variant sites", num_haplotypes, phase_result.variant_sites.len());
    }
    info!("Finished successfully after {} seconds.", start_time.elapsed().as_secs_f64());
}
