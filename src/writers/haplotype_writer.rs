
use log::debug;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::phaser::PhaseResult;

/// Writes one reconstructed haplotype sequence per line
pub struct HaplotypeWriter<W: Write> {
    /// Handle for the underlying output
    writer: BufWriter<W>
}

impl HaplotypeWriter<File> {
    /// Creates a new writer for a given filename
    /// # Arguments
    /// * `filename` - the path to write all haplotypes to
    pub fn new(filename: &Path) -> std::io::Result<HaplotypeWriter<File>> {
        let file: File = File::create(filename)?;
        Ok(HaplotypeWriter::from_writer(file))
    }
}

impl<W: Write> HaplotypeWriter<W> {
    /// Wraps any output stream
    pub fn from_writer(writer: W) -> HaplotypeWriter<W> {
        HaplotypeWriter {
            writer: BufWriter::new(writer)
        }
    }

    /// Streams every candidate haplotype from a result, returning the number written.
    /// Haplotypes are reconstructed one at a time, so the full set is never held in memory.
    /// # Arguments
    /// * `phase_result` - the result to write
    /// # Errors
    /// * if reconstruction fails or the output cannot be written
    pub fn write_haplotypes(&mut self, phase_result: &PhaseResult) -> Result<usize, Box<dyn std::error::Error>> {
        let mut num_written: usize = 0;
        for haplotype in phase_result.haplotype_sequences() {
            self.writer.write_all(&haplotype?)?;
            self.writer.write_all(b"\n")?;
            num_written += 1;
        }
        self.writer.flush()?;
        debug!("Wrote {} haplotypes", num_written);
        Ok(num_written)
    }

    /// Flushes and returns the underlying stream
    pub fn into_inner(self) -> Result<W, Box<dyn std::error::Error>> {
        self.writer.into_inner()
            .map_err(|e| e.into_error().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::aligned_read::AlignedRead;
    use crate::phaser::{solve_locus, PhaseConfig};

    #[test]
    fn test_write_haplotypes() {
        let reads = vec![
            AlignedRead::new(b"TTACGG".to_vec(), 8, 1, 0, vec![0]).unwrap(),
            AlignedRead::new(b"TTGTGG".to_vec(), 2, 1, 0, vec![0]).unwrap()
        ];
        let result = solve_locus(&reads, &PhaseConfig::default()).unwrap();

        let mut writer = HaplotypeWriter::from_writer(Vec::<u8>::new());
        assert_eq!(writer.write_haplotypes(&result).unwrap(), 2);
        let output: Vec<u8> = writer.into_inner().unwrap();
        assert_eq!(output, b"TTACGG\nTTGTGG\n".to_vec());
    }
}
