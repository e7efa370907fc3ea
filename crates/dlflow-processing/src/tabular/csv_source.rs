//! Delimited-text reader: encoding detection, delimiter sniffing, header parsing.

use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read};
use std::path::Path;

use serde_json::Value;

use super::encoding::{self, TextEncoding, DETECTION_WINDOW};
use crate::error::ProcessingError;

const DELIMITER_CANDIDATES: &[u8] = &[b',', b';', b'\t', b'|'];
const SNIFF_LINES: usize = 10;

type RecordIter = csv::ByteRecordsIntoIter<Box<dyn Read + Send>>;

/// What the reader learned about the file's text layout.
#[derive(Debug, Clone)]
pub struct CsvLayout {
    pub encoding: TextEncoding,
    pub encoding_confidence: f64,
    pub delimiter: u8,
}

pub struct CsvRows {
    pub layout: CsvLayout,
    pub headers: Vec<String>,
    records: RecordIter,
}

impl CsvRows {
    pub fn open(path: &Path) -> Result<Self, ProcessingError> {
        let mut file = File::open(path)?;
        let mut head = Vec::with_capacity(DETECTION_WINDOW);
        (&mut file).take(DETECTION_WINDOW as u64).read_to_end(&mut head)?;
        if head.is_empty() {
            return Err(ProcessingError::Empty);
        }

        let (encoding, encoding_confidence) = encoding::detect(&head);
        let sample_text = encoding.decode(&head);
        let delimiter = sniff_delimiter(&sample_text);

        let reader: Box<dyn Read + Send> = if encoding.is_utf8_compatible() {
            let mut buffered = BufReader::new(File::open(path)?);
            let bom = encoding.bom_len();
            if bom > 0 {
                buffered.fill_buf()?;
                buffered.consume(bom);
            }
            Box::new(buffered)
        } else {
            let mut raw = Vec::new();
            File::open(path)?.read_to_end(&mut raw)?;
            Box::new(Cursor::new(encoding.decode(&raw).into_bytes()))
        };

        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .byte_headers()?
            .iter()
            .map(|h| String::from_utf8_lossy(h).trim().to_string())
            .collect();
        if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
            return Err(ProcessingError::Empty);
        }

        Ok(Self {
            layout: CsvLayout {
                encoding,
                encoding_confidence,
                delimiter,
            },
            headers,
            records: csv_reader.into_byte_records(),
        })
    }
}

impl Iterator for CsvRows {
    type Item = Result<Vec<Value>, ProcessingError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(
            record
                .map(|r| {
                    r.iter()
                        .map(|cell| Value::String(String::from_utf8_lossy(cell).into_owned()))
                        .collect()
                })
                .map_err(ProcessingError::from),
        )
    }
}

/// Pick the candidate delimiter that appears a consistent, non-zero number of
/// times across the first lines. Falls back to a comma.
pub fn sniff_delimiter(sample: &str) -> u8 {
    let lines: Vec<&str> = sample
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();
    // The last line may be cut by the detection window.
    let complete = if lines.len() > 1 {
        &lines[..lines.len() - 1]
    } else {
        &lines[..]
    };

    let mut best = (b',', 0usize, false);
    for &candidate in DELIMITER_CANDIDATES {
        let counts: Vec<usize> = complete
            .iter()
            .map(|l| l.bytes().filter(|&b| b == candidate).count())
            .collect();
        let Some(&first) = counts.first() else {
            continue;
        };
        if first == 0 {
            continue;
        }
        let consistent = counts.iter().all(|&c| c == first);
        let better = match (consistent, best.2) {
            (true, false) => true,
            (false, true) => false,
            _ => first > best.1,
        };
        if better {
            best = (candidate, first, consistent);
        }
    }
    best.0
}

pub fn delimiter_name(delimiter: u8) -> String {
    match delimiter {
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
