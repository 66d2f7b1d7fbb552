//! Writers for batch results and index listings.
//!
//! A batch result is either printed whole (the same object the upload
//! endpoint returns) or streamed as JSON Lines: one line per processed image,
//! one per failure, then a closing summary line.

use serde::Serialize;
use std::io::{self, Write};

use crate::index::BlurEntries;
use crate::types::{BatchResult, BatchSummary, FailedUpload, ProcessedImage};

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Single JSON document
    Json,
    /// One JSON object per line (newline-delimited JSON)
    JsonLines,
}

/// One JSON Lines record of a batch.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum BatchRecord<'a> {
    Image(&'a ProcessedImage),
    Failure(&'a FailedUpload),
    Summary {
        success: bool,
        #[serde(flatten)]
        summary: &'a BatchSummary,
    },
}

/// One JSON Lines record of the blur index.
#[derive(Serialize)]
struct IndexRecord<'a> {
    key: &'a str,
    #[serde(rename = "blurDataURL")]
    blur_data_url: &'a str,
}

/// Serializes results to JSON or JSONL.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
    records_written: usize,
}

impl<W: Write> OutputWriter<W> {
    /// `pretty` only affects the JSON format.
    pub fn new(writer: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
            records_written: 0,
        }
    }

    /// Write a batch result.
    pub fn write_batch(&mut self, result: &BatchResult) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => self.write_document(result),
            OutputFormat::JsonLines => {
                for image in &result.images {
                    self.write_line(&BatchRecord::Image(image))?;
                }
                for failure in &result.failures {
                    self.write_line(&BatchRecord::Failure(failure))?;
                }
                self.write_line(&BatchRecord::Summary {
                    success: result.success,
                    summary: &result.summary,
                })
            }
        }
    }

    /// Write blur index entries.
    pub fn write_entries(&mut self, entries: &BlurEntries) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => self.write_document(entries),
            OutputFormat::JsonLines => {
                for (key, blur_data_url) in entries {
                    self.write_line(&IndexRecord { key, blur_data_url })?;
                }
                Ok(())
            }
        }
    }

    /// Number of JSON values written so far.
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    fn write_document<T: Serialize + ?Sized>(&mut self, item: &T) -> io::Result<()> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, item).map_err(io::Error::other)?;
        } else {
            serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?;
        }
        writeln!(self.writer)?;
        self.records_written += 1;
        Ok(())
    }

    fn write_line<T: Serialize>(&mut self, item: &T) -> io::Result<()> {
        // JSONL is never pretty-printed (one object per line)
        serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?;
        writeln!(self.writer)?;
        self.records_written += 1;
        Ok(())
    }
}
