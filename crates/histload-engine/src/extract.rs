//! Numbered, size-checked chunk stream over a source reader.

use arrow::record_batch::RecordBatch;
use histload_sdk::connector::ChunkReader;

use crate::errors::TableError;

/// One extracted batch and its 1-based position in the table run.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub number: u32,
    pub batch: RecordBatch,
}

/// Wraps a [`ChunkReader`], numbering chunks and rejecting any batch larger
/// than the configured chunk size.
pub struct ChunkExtractor<R> {
    reader: R,
    chunk_size: usize,
    yielded: u32,
}

impl<R: ChunkReader> ChunkExtractor<R> {
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size,
            yielded: 0,
        }
    }

    /// Next chunk, or `None` once the table is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::Extraction`] on a reader failure or an
    /// oversized batch. The stream is not restartable after an error.
    pub async fn next_chunk(&mut self) -> Result<Option<Chunk>, TableError> {
        let Some(batch) = self
            .reader
            .next_chunk()
            .await
            .map_err(TableError::extraction)?
        else {
            return Ok(None);
        };

        if batch.num_rows() > self.chunk_size {
            return Err(TableError::Extraction(format!(
                "reader returned {} rows, more than the chunk size {}",
                batch.num_rows(),
                self.chunk_size
            )));
        }

        self.yielded += 1;
        Ok(Some(Chunk {
            number: self.yielded,
            batch,
        }))
    }

    pub fn chunks_yielded(&self) -> u32 {
        self.yielded
    }
}
