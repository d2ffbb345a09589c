
use serde::Serialize;
use std::fs::File;
use std::path::Path;

use crate::data_types::variant_site::VariantSite;

/// Writes the called variant sites to a csv/tsv table
pub struct VariantSiteWriter {
    /// Handle for the CSV writer
    csv_writer: csv::Writer<File>
}

/// Contains all the data written to each row of the site table
#[derive(Debug, PartialEq, Serialize)]
struct SiteRow {
    /// 0-based coordinate of the site
    position: usize,
    /// the most frequent credible allele
    allele0: String,
    /// the second credible allele
    allele1: String,
    /// weighted count of allele0
    count0: u64,
    /// weighted count of allele1
    count1: u64,
    /// total weighted coverage at the site
    coverage: u64
}

impl From<&VariantSite> for SiteRow {
    fn from(site: &VariantSite) -> Self {
        let alleles = site.alleles();
        let counts = site.counts();
        SiteRow {
            position: site.position(),
            allele0: (alleles[0] as char).to_string(),
            allele1: (alleles[1] as char).to_string(),
            count0: counts[0],
            count1: counts[1],
            coverage: site.coverage()
        }
    }
}

impl VariantSiteWriter {
    /// Creates a new writer for a given filename
    /// # Arguments
    /// * `filename` - the path to write the table to; ".csv" files are comma-delimited, anything else is tab-delimited
    pub fn new(filename: &Path) -> csv::Result<VariantSiteWriter> {
        // modify the delimiter to "," if it ends with .csv
        let is_csv: bool = filename.extension().unwrap_or_default() == "csv";
        let delimiter: u8 = if is_csv { b',' } else { b'\t' };
        let csv_writer: csv::Writer<File> = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(filename)?;
        Ok(VariantSiteWriter {
            csv_writer
        })
    }

    /// Writes every variant site, one row each.
    /// # Errors
    /// * if the csv_writer has any errors
    pub fn write_sites(&mut self, variant_sites: &[VariantSite]) -> Result<(), Box<dyn std::error::Error>> {
        for site in variant_sites.iter() {
            let row: SiteRow = site.into();
            self.csv_writer.serialize(&row)?;
        }
        self.csv_writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_row() {
        let site = VariantSite::new(10, [b'A', b'G'], [8, 2], 11);
        let row: SiteRow = (&site).into();
        assert_eq!(row, SiteRow {
            position: 10,
            allele0: "A".to_string(),
            allele1: "G".to_string(),
            count0: 8,
            count1: 2,
            coverage: 11
        });
    }
}
