
use serde::Serialize;
use std::fs::File;
use std::path::Path;

use crate::linkage::{LinkageEstimate, SiteTransition};

/// Writes the linkage estimate of every transition to a csv/tsv table
pub struct LinkageWriter {
    /// Handle for the CSV writer
    csv_writer: csv::Writer<File>
}

/// Contains all the data written to each row of the linkage table
#[derive(Debug, PartialEq, Serialize)]
struct LinkageRow {
    /// index of the transition, 0 is between the first and second variant sites
    transition: usize,
    /// coordinate of the upstream site
    position0: usize,
    /// coordinate of the downstream site
    position1: usize,
    /// upstream allele, empty for unlinked transitions
    allele0: String,
    /// downstream allele, empty for unlinked transitions
    allele1: String,
    /// weighted number of reads observing the pair
    link_count: u64,
    /// log-normalized weight, empty for unlinked transitions
    weight: Option<f64>
}

/// Flattens a transition into one row per retained linkage, or a single placeholder row if unlinked
fn transition_rows(transition_index: usize, transition: &SiteTransition) -> Vec<LinkageRow> {
    match transition.estimate() {
        LinkageEstimate::Unlinked => vec![LinkageRow {
            transition: transition_index,
            position0: transition.position0(),
            position1: transition.position1(),
            allele0: String::new(),
            allele1: String::new(),
            link_count: 0,
            weight: None
        }],
        LinkageEstimate::Linked(linkages) => linkages.iter()
            .map(|linkage| LinkageRow {
                transition: transition_index,
                position0: transition.position0(),
                position1: transition.position1(),
                allele0: (linkage.first() as char).to_string(),
                allele1: (linkage.second() as char).to_string(),
                link_count: linkage.count(),
                weight: Some(linkage.weight())
            })
            .collect()
    }
}

impl LinkageWriter {
    /// Creates a new writer for a given filename
    /// # Arguments
    /// * `filename` - the path to write the table to; ".csv" files are comma-delimited, anything else is tab-delimited
    pub fn new(filename: &Path) -> csv::Result<LinkageWriter> {
        let is_csv: bool = filename.extension().unwrap_or_default() == "csv";
        let delimiter: u8 = if is_csv { b',' } else { b'\t' };
        let csv_writer: csv::Writer<File> = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(filename)?;
        Ok(LinkageWriter {
            csv_writer
        })
    }

    /// Writes all transitions in order.
    /// # Errors
    /// * if the csv_writer has any errors
    pub fn write_transitions(&mut self, transitions: &[SiteTransition]) -> Result<(), Box<dyn std::error::Error>> {
        for (transition_index, transition) in transitions.iter().enumerate() {
            for row in transition_rows(transition_index, transition) {
                self.csv_writer.serialize(&row)?;
            }
        }
        self.csv_writer.flush()?;
        Ok(())
    }
}
