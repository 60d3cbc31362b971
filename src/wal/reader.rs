//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use crate::error::{LogError, Result};
use super::entry::{FrameHeader, HEADER_SIZE, MAX_RECORD_SIZE};
use super::WalEntry;

/// Reads entries from the WAL file in order
#[derive(Debug)]
pub struct WalReader {
    reader: BufReader<File>,

    /// Offset just past the last complete, valid record
    position: u64,

    /// Set when the file ends inside a record
    torn: bool,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            torn: false,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// Returns `Ok(None)` at the end of the file, including when the file
    /// ends part-way through a record (see [`WalReader::is_torn`]). A record
    /// that is complete but fails validation is `WalCorruption`.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        if self.torn {
            return Ok(None);
        }

        let mut header = [0u8; HEADER_SIZE];
        let read = read_full(&mut self.reader, &mut header)?;
        if read == 0 {
            return Ok(None);
        }
        if read < HEADER_SIZE {
            self.torn = true;
            return Ok(None);
        }

        let header = FrameHeader::parse(&header);
        if header.len > MAX_RECORD_SIZE {
            return Err(LogError::WalCorruption(format!(
                "record length {} at offset {} exceeds the {} byte limit",
                header.len, self.position, MAX_RECORD_SIZE
            )));
        }

        let mut data = vec![0u8; header.len];
        if read_full(&mut self.reader, &mut data)? < header.len {
            self.torn = true;
            return Ok(None);
        }

        let entry = WalEntry::decode_body(&header, &data)?;
        self.position += (HEADER_SIZE + header.len) as u64;
        Ok(Some(entry))
    }

    /// Offset just past the last valid record read so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Whether the file ended inside a record
    pub fn is_torn(&self) -> bool {
        self.torn
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over WAL entries; stops after the first error
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Fill `buf` as far as the input allows; returns the bytes read
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
