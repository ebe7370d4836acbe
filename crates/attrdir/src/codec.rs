//! # Record Codec
//!
//! Binary layout of attribute records and object headers as they are written to the
//! byte store. All integers are little-endian. Every block ends with a CRC-32
//! (iSCSI polynomial) over the bytes before it.
//!
//! ## Attribute record
//!
//! ```text
//! offset size  field
//!      0    1  version (1)
//!      1    1  flags (bit 0: creation order tracked)
//!      2    1  charset tag
//!      3    1  reserved
//!      4    2  name length
//!      6    4  data size
//!     10    8  datatype handle
//!     18    8  dataspace handle
//!     26    8  creation order
//!     34    n  name bytes
//!    34+n   d  value bytes
//!      …    4  crc32
//! ```
//!
//! ## Object header
//!
//! ```text
//! "OHDR" version:u8 mode:u8 flags:u8 reserved:u8
//! max_compact:u16 min_dense:u16 next_order:u64 count:u32
//! compact: count × (len:u32, record bytes)
//! dense:   count × block address:u64, in creation order
//! crc32
//! ```
//!
//! In compact mode the records live inside the header block itself. In dense mode the
//! header only lists where each record block lives; the two indices are rebuilt from
//! the records on load.

use crate::error::{AttrError, Result};
use crate::model::{AttributeRecord, CharSet, DataspaceRef, DatatypeRef};
use crate::store::backend::BlockAddr;
use crate::store::{PhaseChange, StorageMode};
use crc::{Crc, CRC_32_ISCSI};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

pub const RECORD_VERSION: u8 = 1;
pub const HEADER_VERSION: u8 = 1;
pub const HEADER_MAGIC: &[u8; 4] = b"OHDR";

const RECORD_FIXED_LEN: usize = 34;
const FLAG_CORDER_TRACKED: u8 = 0b0000_0001;

/// Directory-level fields stored in the object header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderMeta {
    pub mode: StorageMode,
    pub track_order: bool,
    pub phase: PhaseChange,
    pub next_order: u64,
}

/// Header payload as written.
pub enum HeaderBodyRef<'a> {
    Compact(Vec<&'a AttributeRecord>),
    Dense(Vec<BlockAddr>),
}

/// Header payload as read back.
#[derive(Debug, PartialEq, Eq)]
pub enum HeaderBody {
    Compact(Vec<AttributeRecord>),
    Dense(Vec<BlockAddr>),
}

pub fn encode_record(rec: &AttributeRecord) -> Vec<u8> {
    let name = rec.name.as_bytes();
    let mut out = Vec::with_capacity(RECORD_FIXED_LEN + name.len() + rec.value.len() + 4);
    out.push(RECORD_VERSION);
    out.push(if rec.corder_valid {
        FLAG_CORDER_TRACKED
    } else {
        0
    });
    out.push(rec.charset.tag());
    out.push(0);
    out.extend_from_slice(&(name.len() as u16).to_le_bytes());
    out.extend_from_slice(&(rec.value.len() as u32).to_le_bytes());
    out.extend_from_slice(&rec.datatype.0.to_le_bytes());
    out.extend_from_slice(&rec.dataspace.0.to_le_bytes());
    out.extend_from_slice(&rec.creation_order.to_le_bytes());
    out.extend_from_slice(name);
    out.extend_from_slice(&rec.value);
    seal(&mut out);
    out
}

pub fn decode_record(buf: &[u8]) -> Result<AttributeRecord> {
    let body = unseal(buf, "attribute record")?;
    let mut r = Reader::new(body);
    let rec = read_record(&mut r)?;
    if r.remaining() != 0 {
        return Err(AttrError::Codec(format!(
            "{} trailing bytes after attribute record",
            r.remaining()
        )));
    }
    Ok(rec)
}

pub fn encode_header(meta: &HeaderMeta, body: &HeaderBodyRef<'_>) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(HEADER_MAGIC);
    out.push(HEADER_VERSION);
    out.push(match meta.mode {
        StorageMode::Compact => 0,
        StorageMode::Dense => 1,
    });
    out.push(if meta.track_order {
        FLAG_CORDER_TRACKED
    } else {
        0
    });
    out.push(0);
    out.extend_from_slice(&meta.phase.max_compact.to_le_bytes());
    out.extend_from_slice(&meta.phase.min_dense.to_le_bytes());
    out.extend_from_slice(&meta.next_order.to_le_bytes());
    match body {
        HeaderBodyRef::Compact(records) => {
            out.extend_from_slice(&(records.len() as u32).to_le_bytes());
            for rec in records {
                let encoded = encode_record(rec);
                out.extend_from_slice(&(encoded.len() as u32).to_le_bytes());
                out.extend_from_slice(&encoded);
            }
        }
        HeaderBodyRef::Dense(addrs) => {
            out.extend_from_slice(&(addrs.len() as u32).to_le_bytes());
            for addr in addrs {
                out.extend_from_slice(&addr.0.to_le_bytes());
            }
        }
    }
    seal(&mut out);
    out
}

pub fn decode_header(buf: &[u8]) -> Result<(HeaderMeta, HeaderBody)> {
    let body = unseal(buf, "object header")?;
    let mut r = Reader::new(body);

    if r.bytes(4)? != HEADER_MAGIC {
        return Err(AttrError::Codec("bad object header magic".to_string()));
    }
    let version = r.u8()?;
    if version != HEADER_VERSION {
        return Err(AttrError::Codec(format!(
            "unsupported object header version {}",
            version
        )));
    }
    let mode = match r.u8()? {
        0 => StorageMode::Compact,
        1 => StorageMode::Dense,
        other => {
            return Err(AttrError::Codec(format!("unknown storage mode {}", other)));
        }
    };
    let flags = r.u8()?;
    let _reserved = r.u8()?;
    let phase = PhaseChange {
        max_compact: r.u16()?,
        min_dense: r.u16()?,
    };
    let next_order = r.u64()?;
    let count = r.u32()? as usize;

    let meta = HeaderMeta {
        mode,
        track_order: flags & FLAG_CORDER_TRACKED != 0,
        phase,
        next_order,
    };

    let body = match mode {
        StorageMode::Compact => {
            let mut records = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                let len = r.u32()? as usize;
                records.push(decode_record(r.bytes(len)?)?);
            }
            HeaderBody::Compact(records)
        }
        StorageMode::Dense => {
            let mut addrs = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                addrs.push(BlockAddr(r.u64()?));
            }
            HeaderBody::Dense(addrs)
        }
    };

    if r.remaining() != 0 {
        return Err(AttrError::Codec(format!(
            "{} trailing bytes after object header",
            r.remaining()
        )));
    }
    Ok((meta, body))
}

fn seal(out: &mut Vec<u8>) {
    let sum = CRC32.checksum(out);
    out.extend_from_slice(&sum.to_le_bytes());
}

fn unseal<'a>(buf: &'a [u8], what: &str) -> Result<&'a [u8]> {
    if buf.len() < 4 {
        return Err(AttrError::Codec(format!("{} is truncated", what)));
    }
    let (body, tail) = buf.split_at(buf.len() - 4);
    let stored = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
    if CRC32.checksum(body) != stored {
        return Err(AttrError::Codec(format!("{} checksum mismatch", what)));
    }
    Ok(body)
}

fn read_record(r: &mut Reader<'_>) -> Result<AttributeRecord> {
    let version = r.u8()?;
    if version != RECORD_VERSION {
        return Err(AttrError::Codec(format!(
            "unsupported attribute record version {}",
            version
        )));
    }
    let flags = r.u8()?;
    let charset_tag = r.u8()?;
    let charset = CharSet::from_tag(charset_tag)
        .ok_or_else(|| AttrError::Codec(format!("unknown charset tag {}", charset_tag)))?;
    let _reserved = r.u8()?;
    let name_len = r.u16()? as usize;
    let data_size = r.u32()? as usize;
    let datatype = DatatypeRef(r.u64()?);
    let dataspace = DataspaceRef(r.u64()?);
    let creation_order = r.u64()?;
    let name = std::str::from_utf8(r.bytes(name_len)?)
        .map_err(|e| AttrError::Codec(format!("attribute name is not UTF-8: {}", e)))?
        .to_string();
    let value = r.bytes(data_size)?.to_vec();

    Ok(AttributeRecord {
        name,
        charset,
        datatype,
        dataspace,
        value,
        creation_order,
        corder_valid: flags & FLAG_CORDER_TRACKED != 0,
    })
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(AttrError::Codec(format!(
                "truncated at offset {}: need {} bytes, have {}",
                self.pos,
                n,
                self.remaining()
            )));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let b = self.bytes(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(u64::from_le_bytes(arr))
    }
}
