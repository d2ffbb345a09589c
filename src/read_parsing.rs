
use crate::data_types::aligned_read::{AlignedRead, AlignedReadError};

use bio::io::fasta;
use flate2::bufread::MultiGzDecoder;
use log::{debug, info, trace, warn};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Symbol that pads read sequences in the alignment output
const SEQUENCE_PADDING: u8 = b'~';

#[derive(thiserror::Error, Debug)]
pub enum ReadParseError {
    #[error("malformed read header {header:?}: {reason}")]
    MalformedHeader { header: String, reason: String },
    #[error("invalid read record {header:?}: {source}")]
    InvalidRecord { header: String, source: AlignedReadError }
}

/// The fields encoded in a read header, e.g. `clones_3:regions_1:scores_0x42:start_101`
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReadHeader {
    /// the number of identical reads collapsed into this record
    pub clone_count: u64,
    /// the number of regions the read mapped to
    pub region_count: u32,
    /// alignment score for each mapped region
    pub scores: Vec<i64>,
    /// 0-based start coordinate; the header stores it 1-based
    pub start: usize
}

/// Splits a `tag_value` token and verifies the tag
fn tagged_value<'a>(header: &str, token: &'a str, tag: &str) -> Result<&'a str, ReadParseError> {
    match token.split_once('_') {
        Some((t, value)) if t == tag => Ok(value),
        _ => Err(ReadParseError::MalformedHeader {
            header: header.to_string(),
            reason: format!("expected \"{tag}_<value>\", found {token:?}")
        })
    }
}

/// Parses a numeric value, converting failures into a header error
fn parse_number<T: std::str::FromStr>(header: &str, value: &str, label: &str) -> Result<T, ReadParseError> {
    value.parse::<T>().map_err(|_| ReadParseError::MalformedHeader {
        header: header.to_string(),
        reason: format!("could not parse {label} from {value:?}")
    })
}

/// Parses the colon-delimited header of a single read record.
/// # Arguments
/// * `header` - the header text without the leading '>'
/// # Errors
/// * if the header does not have exactly 4 tagged fields
/// * if any numeric field fails to parse
/// * if the 1-based start is 0
pub fn parse_header(header: &str) -> Result<ReadHeader, ReadParseError> {
    let tokens: Vec<&str> = header.split(':').collect();
    if tokens.len() != 4 {
        return Err(ReadParseError::MalformedHeader {
            header: header.to_string(),
            reason: format!("expected 4 ':'-delimited fields, found {}", tokens.len())
        });
    }

    let clone_count: u64 = parse_number(header, tagged_value(header, tokens[0], "clones")?, "clone count")?;
    let region_count: u32 = parse_number(header, tagged_value(header, tokens[1], "regions")?, "region count")?;

    // scores look like "scores_0x42_1x40", one entry per mapped region
    let mut scores: Vec<i64> = vec![];
    for score_token in tagged_value(header, tokens[2], "scores")?.split('_').filter(|s| !s.is_empty()) {
        let score_value: &str = match score_token.split_once('x') {
            Some((_region, value)) => value,
            None => {
                return Err(ReadParseError::MalformedHeader {
                    header: header.to_string(),
                    reason: format!("expected \"<region>x<score>\", found {score_token:?}")
                });
            }
        };
        scores.push(parse_number(header, score_value, "score")?);
    }

    let one_based_start: usize = parse_number(header, tagged_value(header, tokens[3], "start")?, "start")?;
    if one_based_start == 0 {
        return Err(ReadParseError::MalformedHeader {
            header: header.to_string(),
            reason: "start coordinate is 1-based and cannot be 0".to_string()
        });
    }

    Ok(ReadHeader {
        clone_count,
        region_count,
        scores,
        start: one_based_start - 1
    })
}

/// Strips leading and trailing padding symbols from a sequence
fn trim_padding(sequence: &[u8]) -> &[u8] {
    let start: usize = sequence.iter()
        .position(|&c| c != SEQUENCE_PADDING)
        .unwrap_or(sequence.len());
    let end: usize = sequence.iter()
        .rposition(|&c| c != SEQUENCE_PADDING)
        .map_or(start, |i| i + 1);
    &sequence[start..end]
}

/// Converts one FASTA record into an aligned read.
/// # Errors
/// * if the header is malformed or the resulting read fails validation
pub fn parse_record(record: &fasta::Record) -> Result<AlignedRead, ReadParseError> {
    let header: &str = record.id();
    let fields: ReadHeader = parse_header(header)?;
    if fields.scores.len() != fields.region_count as usize {
        trace!("Read {:?} has {} scores for {} regions", header, fields.scores.len(), fields.region_count);
    }

    let sequence: Vec<u8> = trim_padding(record.seq()).to_vec();
    AlignedRead::new(sequence, fields.clone_count, fields.region_count, fields.start, fields.scores)
        .map_err(|source| ReadParseError::InvalidRecord {
            header: header.to_string(),
            source
        })
}

/// Parses every read record from a FASTA-formatted stream.
/// # Arguments
/// * `reader` - the stream to parse
/// # Errors
/// * if the stream is not valid FASTA
/// * if any record fails to parse
pub fn read_alignments<R: Read>(reader: R) -> Result<Vec<AlignedRead>, Box<dyn std::error::Error>> {
    let fasta_reader = fasta::Reader::new(reader);
    let mut reads: Vec<AlignedRead> = vec![];
    for entry in fasta_reader.records() {
        let record: fasta::Record = entry?;
        reads.push(parse_record(&record)?);
    }
    Ok(reads)
}

/// Loads all the read records from a file, gzip is allowed.
/// # Arguments
/// * `filename` - the alignment file to load
/// # Errors
/// This will pass through any error detected from opening the file or parsing the records.
pub fn load_alignments(filename: &Path) -> Result<Vec<AlignedRead>, Box<dyn std::error::Error>> {
    info!("Loading {:?}...", filename);
    let file: std::fs::File = std::fs::File::open(filename)?;
    let file_reader = BufReader::new(file);
    let reader: Box<dyn BufRead> = if filename.extension().unwrap_or_default() == "gz" {
        debug!("Detected gzip extension, loading alignments with MultiGzDecoder...");
        Box::new(BufReader::new(MultiGzDecoder::new(file_reader)))
    } else {
        debug!("Loading alignments as plain-text file...");
        Box::new(file_reader)
    };

    let reads = read_alignments(reader)?;
    let num_unique: usize = reads.iter().filter(|r| r.is_uniquely_mapped()).count();
    let total_clones: u64 = reads.iter().map(|r| r.clone_count()).sum();
    info!("Finished loading {} read records ({} clones), {} uniquely mapped.", reads.len(), total_clones, num_unique);
    if num_unique == 0 {
        warn!("No uniquely mapped reads were found in {:?}", filename);
    }
    Ok(reads)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        let header = parse_header("clones_3:regions_2:scores_0x42_1x-7:start_101").unwrap();
        assert_eq!(header, ReadHeader {
            clone_count: 3,
            region_count: 2,
            scores: vec![42, -7],
            start: 100
        });
    }

    #[test]
    fn test_bad_headers() {
        let bad_headers = [
            "clones_3:regions_1:scores_0x42",
            "clones_3:regions_1:scores_0x42:start_1:extra_1",
            "clone_3:regions_1:scores_0x42:start_1",
            "clones_three:regions_1:scores_0x42:start_1",
            "clones_3:regions_1:scores_42:start_1",
            "clones_3:regions_1:scores_0x42:start_0",
            "clones_3:regions_1:scores_0x42:start"
        ];
        for &h in bad_headers.iter() {
            let result = parse_header(h);
            assert!(matches!(result, Err(ReadParseError::MalformedHeader { .. })), "{h} should fail");
        }
    }

    #[test]
    fn test_read_alignments() {
        let data = "\
>clones_3:regions_1:scores_0x42:start_11
~~ACGT~~
>clones_1:regions_2:scores_0x40_1x38:start_5
GGA
";
        let reads = read_alignments(data.as_bytes()).unwrap();
        assert_eq!(reads.len(), 2);
        assert_eq!(reads[0].sequence(), b"ACGT");
        assert_eq!(reads[0].clone_count(), 3);
        assert_eq!(reads[0].start(), 10);
        assert!(reads[0].is_uniquely_mapped());
        assert_eq!(reads[1].sequence(), b"GGA");
        assert_eq!(reads[1].region_count(), 2);
        assert_eq!(reads[1].scores(), &[40, 38]);
        assert!(!reads[1].is_uniquely_mapped());
    }

    #[test]
    fn test_invalid_records() {
        let zero_clones = ">clones_0:regions_1:scores_0x42:start_1\nACGT\n";
        assert!(read_alignments(zero_clones.as_bytes()).is_err());

        let only_padding = ">clones_1:regions_1:scores_0x42:start_1\n~~~~\n";
        assert!(read_alignments(only_padding.as_bytes()).is_err());

        let bad_header = ">clones_1:regions_1\nACGT\n";
        assert!(read_alignments(bad_header.as_bytes()).is_err());
    }

    #[test]
    fn test_trim_padding() {
        assert_eq!(trim_padding(b"~~AC~GT~"), b"AC~GT");
        assert_eq!(trim_padding(b"~\xffAC\xfe~~"), b"\xffAC\xfe");
        assert_eq!(trim_padding(b"ACGT"), b"ACGT");
        assert!(trim_padding(b"~~~").is_empty());
        assert!(trim_padding(b"").is_empty());

        // non-UTF-8 sequences are still trimmed
        let record = fasta::Record::with_attrs("clones_1:regions_1:scores_0x42:start_1", None, b"~~\xe9AC~~");
        let read = parse_record(&record).unwrap();
        assert_eq!(read.sequence(), b"\xe9AC");
    }

    #[test]
    fn test_empty_input() {
        let reads = read_alignments("".as_bytes()).unwrap();
        assert!(reads.is_empty());
    }
}
