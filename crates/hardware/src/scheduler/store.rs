//! Per-channel DRAM contents.
//!
//! Rows are allocated on first write so that large memories cost nothing until
//! touched. Unwritten bytes read as zero.

use std::collections::HashMap;

use crate::common::constants::WORD_BYTES;
use crate::transaction::memory::masked_copy;

/// Byte contents of one channel, addressed by bank, row and column.
#[derive(Debug, Clone)]
pub struct DramStore {
    row_size: usize,
    rows: HashMap<(u32, u32), Box<[u8]>>,
}

impl DramStore {
    /// Creates an empty store with `row_size`-byte rows.
    pub fn new(row_size: u32) -> Self {
        Self {
            row_size: row_size as usize,
            rows: HashMap::new(),
        }
    }

    /// Byte range inside a row, clamped to the row end.
    fn span(&self, col: u32, len: usize) -> (usize, usize) {
        let start = (col * WORD_BYTES) as usize;
        let start = start.min(self.row_size);
        (start, (start + len).min(self.row_size))
    }

    /// Copies bytes starting at `col` into `out`.
    pub fn read(&self, bank: u32, row: u32, col: u32, out: &mut [u8]) {
        let (start, end) = self.span(col, out.len());
        match self.rows.get(&(bank, row)) {
            Some(bytes) => out[..end - start].copy_from_slice(&bytes[start..end]),
            None => out.fill(0),
        }
    }

    /// Stores `data` at `col`, honouring an optional word mask.
    pub fn write(&mut self, bank: u32, row: u32, col: u32, data: &[u8], mask: Option<&[u32]>) {
        let (start, end) = self.span(col, data.len());
        let row_size = self.row_size;
        let bytes = self
            .rows
            .entry((bank, row))
            .or_insert_with(|| vec![0; row_size].into_boxed_slice());
        let src = &data[..end - start];
        match mask {
            Some(mask) => masked_copy(&mut bytes[start..end], src, mask),
            None => bytes[start..end].copy_from_slice(src),
        }
    }

    /// Rows touched so far.
    pub fn allocated_rows(&self) -> usize {
        self.rows.len()
    }
}
