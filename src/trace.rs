/// Memory access trace files.
///
/// A trace is a fixed header followed by fixed size records, all little endian:
///
/// | Offset | Size | Field |
/// |---|---|---|
/// | 0 | 4 | magic `SHTR` |
/// | 4 | 2 | format version |
/// | 6 | 2 | record size in bytes |
///
/// Each record:
///
/// | Offset | Size | Field |
/// |---|---|---|
/// | 0 | 4 | address (PC for execution records) |
/// | 4 | 4 | opcode, 0 if unknown |
/// | 8 | 4 | category bits (`TraceMask`) |
/// | 12 | 8 | hit mask of the access |

use std::io::{self, Read, Write};

use bitflags::bitflags;

use crate::{
    common::bit,
    error::{Error, Result},
};

pub const TRACE_MAGIC: [u8; 4] = *b"SHTR";
pub const TRACE_VERSION: u16 = 1;
pub const TRACE_HEADER_SIZE: usize = 8;
pub const TRACE_RECORD_SIZE: usize = 20;

bitflags! {
    /// Access categories that can be traced.
    pub struct TraceMask: u32 {
        const EXEC  = bit(0);
        const READ  = bit(1);
        const WRITE = bit(2);
    }
}

impl Default for TraceMask {
    fn default() -> Self {
        TraceMask::all()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TraceRecord {
    pub addr: u32,
    pub opcode: u32,
    pub category: TraceMask,
    pub hits: u64,
}

impl TraceRecord {
    pub fn to_bytes(&self) -> [u8; TRACE_RECORD_SIZE] {
        let mut out = [0; TRACE_RECORD_SIZE];
        out[0..4].copy_from_slice(&self.addr.to_le_bytes());
        out[4..8].copy_from_slice(&self.opcode.to_le_bytes());
        out[8..12].copy_from_slice(&self.category.bits().to_le_bytes());
        out[12..20].copy_from_slice(&self.hits.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; TRACE_RECORD_SIZE]) -> Self {
        let word = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let mut hits = [0; 8];
        hits.copy_from_slice(&bytes[12..20]);
        Self {
            addr: word(0),
            opcode: word(4),
            category: TraceMask::from_bits_truncate(word(8)),
            hits: u64::from_le_bytes(hits),
        }
    }
}

/// An open trace sink.
///
/// The header is written on creation. The engine wraps trace files in a
/// `BufWriter`, which flushes when the session is dropped.
pub struct TraceSession<W: Write> {
    writer: W,
    records: u64,
}

impl<W: Write> TraceSession<W> {
    pub fn new(mut writer: W) -> Result<Self> {
        writer.write_all(&TRACE_MAGIC)?;
        writer.write_all(&TRACE_VERSION.to_le_bytes())?;
        writer.write_all(&(TRACE_RECORD_SIZE as u16).to_le_bytes())?;
        Ok(Self {
            writer,
            records: 0,
        })
    }

    pub fn write_record(&mut self, record: &TraceRecord) -> io::Result<()> {
        self.writer.write_all(&record.to_bytes())?;
        self.records += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Records written so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Flush and hand back the writer.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Reads a trace back for offline analysis.
pub struct TraceReader<R: Read> {
    reader: R,
    pub version: u16,
}

impl<R: Read> TraceReader<R> {
    pub fn open(mut reader: R) -> Result<Self> {
        let mut header = [0; TRACE_HEADER_SIZE];
        reader.read_exact(&mut header)?;
        if header[0..4] != TRACE_MAGIC {
            return Err(Error::InvalidTrace("bad magic"));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != TRACE_VERSION {
            return Err(Error::InvalidTrace("unsupported version"));
        }
        let record_size = u16::from_le_bytes([header[6], header[7]]) as usize;
        if record_size != TRACE_RECORD_SIZE {
            return Err(Error::InvalidTrace("unexpected record size"));
        }
        Ok(Self { reader, version })
    }

    /// Read the next record. Returns `None` at a clean end of file.
    pub fn next_record(&mut self) -> Result<Option<TraceRecord>> {
        let mut bytes = [0; TRACE_RECORD_SIZE];
        let mut filled = 0;
        while filled < TRACE_RECORD_SIZE {
            match self.reader.read(&mut bytes[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => return Err(Error::InvalidTrace("truncated record")),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
                Err(e) => return Err(e.into()),
            }
        }
        Ok(Some(TraceRecord::from_bytes(&bytes)))
    }
}

impl<R: Read> Iterator for TraceReader<R> {
    type Item = Result<TraceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
