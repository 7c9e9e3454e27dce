//! Staging area for files dragged onto a computer's terminal.

use ccnet_core::ComputerId;
use ccnet_net::protocol::{FileHeader, FileSlice, MAX_UPLOAD_SIZE};
use std::fmt;
use std::ops::Range;

/// Why an upload was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFailure {
    /// The announced files exceed the total size cap.
    TooLarge,
    /// A slice pointed outside its file.
    OutOfBounds,
    /// A slice named a file index that was never announced.
    UnknownFile,
    /// Not every byte of every file arrived before `finished`.
    Incomplete,
    /// The computer is off and cannot receive files.
    ComputerOff,
    /// The computer no longer exists.
    NoComputer,
}

impl fmt::Display for UploadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UploadFailure::TooLarge => "Files are too large",
            UploadFailure::OutOfBounds => "Upload slice out of bounds",
            UploadFailure::UnknownFile => "Upload slice for unknown file",
            UploadFailure::Incomplete => "Upload incomplete",
            UploadFailure::ComputerOff => "Computer is off",
            UploadFailure::NoComputer => "Computer no longer exists",
        })
    }
}

struct StagedFile {
    name: String,
    contents: Vec<u8>,
    /// Written byte ranges, sorted, disjoint and non-adjacent.
    covered: Vec<Range<usize>>,
}

impl StagedFile {
    fn mark_written(&mut self, written: Range<usize>) {
        if written.is_empty() {
            return;
        }
        let mut merged = written;
        let mut kept = Vec::with_capacity(self.covered.len() + 1);
        for range in self.covered.drain(..) {
            if range.end < merged.start || range.start > merged.end {
                kept.push(range);
            } else {
                merged = merged.start.min(range.start)..merged.end.max(range.end);
            }
        }
        let at = kept.partition_point(|range| range.start < merged.start);
        kept.insert(at, merged);
        self.covered = kept;
    }

    fn is_complete(&self) -> bool {
        match self.covered.as_slice() {
            [] => self.contents.is_empty(),
            [only] => *only == (0..self.contents.len()),
            _ => false,
        }
    }
}

/// An upload that has been announced but not yet finished.
pub struct PendingUpload {
    computer: ComputerId,
    files: Vec<StagedFile>,
}

impl PendingUpload {
    /// Start an upload of `headers` to `computer`.
    pub fn start(computer: ComputerId, headers: Vec<FileHeader>) -> Result<Self, UploadFailure> {
        let total = headers
            .iter()
            .fold(0usize, |acc, h| acc.saturating_add(h.size as usize));
        if total > MAX_UPLOAD_SIZE {
            return Err(UploadFailure::TooLarge);
        }

        let files = headers
            .into_iter()
            .map(|header| StagedFile {
                name: header.name,
                contents: vec![0; header.size as usize],
                covered: Vec::new(),
            })
            .collect();
        Ok(Self { computer, files })
    }

    /// Target computer.
    pub fn computer(&self) -> ComputerId {
        self.computer
    }

    /// Copy slices into their files.
    pub fn apply(&mut self, slices: &[FileSlice]) -> Result<(), UploadFailure> {
        for slice in slices {
            let file = self
                .files
                .get_mut(slice.file as usize)
                .ok_or(UploadFailure::UnknownFile)?;

            let start = slice.offset as usize;
            let end = start
                .checked_add(slice.bytes.len())
                .filter(|&end| end <= file.contents.len())
                .ok_or(UploadFailure::OutOfBounds)?;

            file.contents[start..end].copy_from_slice(&slice.bytes);
            file.mark_written(start..end);
        }
        Ok(())
    }

    /// Finish the upload, returning `(name, contents)` per file.
    pub fn finish(self) -> Result<Vec<(String, Vec<u8>)>, UploadFailure> {
        if !self.files.iter().all(StagedFile::is_complete) {
            return Err(UploadFailure::Incomplete);
        }
        Ok(self
            .files
            .into_iter()
            .map(|file| (file.name, file.contents))
            .collect())
    }
}
