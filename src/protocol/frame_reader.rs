//! Decode-side framing: walks chained DSS frames and parses the
//! length/codepoint tagged object tree inside them.
//!
//! The reader owns an explicit cursor, the stack of remaining collection
//! lengths, and the per-frame byte counter; nothing is global, so any number
//! of connections can decode independently.

use crate::protocol::{ccsid::CcsidManager, dss};
use crate::{Db2Error, Db2Result};
use byteorder::{BigEndian, ByteOrder};
use std::{cell::RefCell, rc::Rc};

/// Outcome of peeking at the next tagged object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peek {
    CodePoint(u16),
    EndOfCollection,
    EndOfChain,
}

#[derive(Debug, Clone, Copy)]
struct PeekedHeader {
    codepoint: u16,
    payload_len: usize,
    ext_bytes: usize,
}

#[derive(Debug)]
pub struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
    ccsid: Rc<RefCell<CcsidManager>>,

    // Payload bytes remaining in the current frame.
    dss_length: usize,
    dss_continued: bool,
    dss_chained_same_id: bool,
    // Correlation id the next frame header must carry.
    correlation_id: u16,

    // Payload bytes remaining in the scalar object being read.
    ddm_scalar_len: usize,
    // Remaining lengths of the enclosing collections, innermost last.
    collection_stack: Vec<usize>,

    peeked: Option<PeekedHeader>,
    // Total scalar payload bytes consumed so far; lets parsers that use the
    // unchecked readers reconcile against the object length afterwards.
    consumed: usize,
}

impl<'a> FrameReader<'a> {
    pub fn new(buf: &'a [u8], ccsid: Rc<RefCell<CcsidManager>>) -> Self {
        Self {
            buf,
            pos: 0,
            ccsid,
            dss_length: 0,
            dss_continued: false,
            dss_chained_same_id: false,
            correlation_id: 1,
            ddm_scalar_len: 0,
            collection_stack: Vec::with_capacity(4),
            peeked: None,
            consumed: 0,
        }
    }

    // ── chain boundaries ─────────────────────────────────

    /// Starts parsing the next same-id chain group by reading its leading
    /// DSS header.
    pub fn start_same_id_chain(&mut self) -> Db2Result<()> {
        self.read_dss_header()
    }

    /// Verifies that the group was consumed exactly: collection stack empty,
    /// frame drained, no dangling same-id chaining.
    pub fn end_of_same_id_chain(&self) -> Db2Result<()> {
        if !self.collection_stack.is_empty() {
            return Err(Db2Error::syntax(
                "collection stack not empty at end of chain",
            ));
        }
        if self.dss_length != 0 {
            return Err(Db2Error::syntax(format!(
                "{} unconsumed bytes in frame at end of chain",
                self.dss_length
            )));
        }
        if self.dss_chained_same_id {
            return Err(Db2Error::syntax("frame still chained at end of chain"));
        }
        Ok(())
    }

    fn read_dss_header(&mut self) -> Db2Result<()> {
        if self.pos + dss::DSS_HEADER_LENGTH > self.buf.len() {
            return Err(Db2Error::syntax("truncated DSS header"));
        }
        let header = &self.buf[self.pos..self.pos + dss::DSS_HEADER_LENGTH];
        let length_field = BigEndian::read_u16(header);
        let magic = header[2];
        let format = header[3];
        let correlation_id = BigEndian::read_u16(&header[4..6]);
        self.pos += dss::DSS_HEADER_LENGTH;

        let frame_len = if length_field & 0x8000 == 0x8000 {
            self.dss_continued = true;
            dss::MAX_DSS_LENGTH
        } else {
            self.dss_continued = false;
            usize::from(length_field)
        };
        if frame_len < dss::DSS_HEADER_LENGTH {
            return Err(Db2Error::syntax(format!(
                "DSS length {frame_len} is less than the header size"
            )));
        }
        if magic != dss::MAGIC {
            return Err(Db2Error::syntax(format!(
                "DSS magic byte is 0x{magic:02X}, expected 0xD0"
            )));
        }
        if !dss::is_valid_type(format) {
            return Err(Db2Error::syntax(format!(
                "unsupported DSS format byte 0x{format:02X}"
            )));
        }

        let next_correlation_id = if format & dss::CHAINED != 0 {
            if format & dss::CHAINED_SAME_ID != 0 {
                self.dss_chained_same_id = true;
                self.correlation_id
            } else {
                self.dss_chained_same_id = false;
                self.correlation_id + 1
            }
        } else {
            if format & dss::CHAINED_SAME_ID != 0 {
                return Err(Db2Error::syntax(
                    "same-correlator bit set on an unchained frame",
                ));
            }
            if format & dss::ERROR_CONTINUE != 0 {
                return Err(Db2Error::syntax(
                    "error-continue bit set on an unchained frame",
                ));
            }
            self.dss_chained_same_id = false;
            1
        };

        if correlation_id != self.correlation_id
            && correlation_id != dss::CORRELATION_ERROR_SENTINEL
        {
            return Err(Db2Error::syntax(format!(
                "correlation id {correlation_id}, expected {}",
                self.correlation_id
            )));
        }
        self.correlation_id = next_correlation_id;
        self.dss_length = frame_len - dss::DSS_HEADER_LENGTH;
        trace!(
            "frame header: len={frame_len} corr={correlation_id} continued={} chained_same_id={}",
            self.dss_continued,
            self.dss_chained_same_id
        );
        Ok(())
    }

    fn read_continuation_header(&mut self) -> Db2Result<()> {
        if self.pos + 2 > self.buf.len() {
            return Err(Db2Error::syntax("truncated DSS continuation header"));
        }
        let value = BigEndian::read_u16(&self.buf[self.pos..self.pos + 2]);
        self.pos += 2;
        if value == dss::CONTINUATION_SENTINEL {
            self.dss_length = dss::MAX_CONTINUATION_DATA;
            self.dss_continued = true;
        } else {
            let chunk = usize::from(value);
            if chunk < 2 || chunk > dss::MAX_DSS_LENGTH {
                return Err(Db2Error::syntax(format!(
                    "invalid continuation chunk length {chunk}"
                )));
            }
            self.dss_length = chunk - 2;
            self.dss_continued = false;
        }
        Ok(())
    }

    // ── peek / expect ────────────────────────────────────

    /// Non-destructively inspects the next object's codepoint. Transparently
    /// reads the next frame header when the current frame is exhausted but
    /// the chain continues; repeated peeks return the same value.
    pub fn peek_code_point(&mut self) -> Db2Result<Peek> {
        if let Some(peeked) = self.peeked {
            return Ok(Peek::CodePoint(peeked.codepoint));
        }
        if let Some(&remaining) = self.collection_stack.last() {
            if remaining == 0 {
                return Ok(Peek::EndOfCollection);
            }
            if remaining < 4 {
                return Err(Db2Error::syntax(format!(
                    "collection remainder {remaining} cannot hold a tagged object"
                )));
            }
        }
        while self.dss_length == 0 {
            if self.dss_continued {
                self.read_continuation_header()?;
            } else if self.dss_chained_same_id {
                self.read_dss_header()?;
            } else {
                return Ok(Peek::EndOfChain);
            }
        }

        if self.dss_length < 4 {
            return Err(Db2Error::syntax(
                "tagged object header split across a continuation boundary",
            ));
        }
        if self.pos + 4 > self.buf.len() {
            return Err(Db2Error::syntax("truncated tagged object header"));
        }
        let length_field = BigEndian::read_u16(&self.buf[self.pos..]);
        let codepoint = BigEndian::read_u16(&self.buf[self.pos + 2..]);

        let peeked = if length_field & 0x8000 == 0x8000 {
            let ext_bytes = usize::from(length_field & 0x7FFF);
            match ext_bytes {
                0 => {
                    return Err(Db2Error::Unsupported(
                        "streamed object of unknown length",
                    ))
                }
                4 | 6 | 8 => {
                    if self.dss_length < 4 + ext_bytes {
                        return Err(Db2Error::syntax(
                            "tagged object header split across a continuation boundary",
                        ));
                    }
                    if self.pos + 4 + ext_bytes > self.buf.len() {
                        return Err(Db2Error::syntax("truncated extended length"));
                    }
                    #[allow(clippy::cast_possible_truncation)]
                    let payload_len =
                        BigEndian::read_uint(&self.buf[self.pos + 4..], ext_bytes) as usize;
                    PeekedHeader {
                        codepoint,
                        payload_len,
                        ext_bytes,
                    }
                }
                n => {
                    return Err(Db2Error::syntax(format!(
                        "incorrect extended length indicator {n}"
                    )))
                }
            }
        } else {
            let length = usize::from(length_field);
            if length < 4 {
                return Err(Db2Error::syntax(format!(
                    "tagged object length {length} is less than its own header"
                )));
            }
            PeekedHeader {
                codepoint,
                payload_len: length - 4,
                ext_bytes: 0,
            }
        };
        self.peeked = Some(peeked);
        Ok(Peek::CodePoint(peeked.codepoint))
    }

    /// Consumes the next length/codepoint pair and fails unless it matches
    /// `expected`.
    pub fn expect(&mut self, expected: u16) -> Db2Result<()> {
        match self.peek_code_point()? {
            Peek::CodePoint(actual) if actual == expected => {
                let peeked = self.peeked.take().expect("peek just succeeded");
                let header_len = 4 + peeked.ext_bytes;
                self.pos += header_len;
                self.dss_length -= header_len;
                self.adjust_collections(header_len)?;
                self.ddm_scalar_len = peeked.payload_len;
                Ok(())
            }
            Peek::CodePoint(actual) => Err(Db2Error::syntax(format!(
                "expected codepoint 0x{expected:04X}, got 0x{actual:04X}"
            ))),
            Peek::EndOfCollection => Err(Db2Error::syntax(format!(
                "expected codepoint 0x{expected:04X}, got end of collection"
            ))),
            Peek::EndOfChain => Err(Db2Error::syntax(format!(
                "expected codepoint 0x{expected:04X}, got end of chain"
            ))),
        }
    }

    // ── collections ──────────────────────────────────────

    /// Enters the collection whose header was just consumed with
    /// [`FrameReader::expect`].
    pub fn push_collection(&mut self) {
        self.collection_stack.push(self.ddm_scalar_len);
        self.ddm_scalar_len = 0;
    }

    /// Leaves the innermost collection; leaving before its remainder reaches
    /// zero is a protocol error.
    pub fn pop_collection(&mut self) -> Db2Result<()> {
        match self.collection_stack.pop() {
            Some(0) => Ok(()),
            Some(remaining) => Err(Db2Error::syntax(format!(
                "collection popped with {remaining} bytes remaining"
            ))),
            None => Err(Db2Error::syntax("collection stack imbalance")),
        }
    }

    // ── length bookkeeping ───────────────────────────────

    fn adjust_collections(&mut self, n: usize) -> Db2Result<()> {
        for remaining in &mut self.collection_stack {
            *remaining = remaining.checked_sub(n).ok_or_else(|| {
                Db2Error::syntax("object ran past the end of its enclosing collection")
            })?;
        }
        Ok(())
    }

    fn adjust_scalar(&mut self, n: usize) -> Db2Result<()> {
        self.ddm_scalar_len = self
            .ddm_scalar_len
            .checked_sub(n)
            .ok_or_else(|| Db2Error::syntax("read ran past the end of the scalar object"))?;
        self.adjust_collections(n)
    }

    /// Remaining payload length of the scalar whose header was last
    /// consumed.
    pub fn scalar_len(&self) -> usize {
        self.ddm_scalar_len
    }

    /// Total scalar payload bytes consumed so far; pairs with
    /// [`FrameReader::finish_scalar`].
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Reconciles a scalar that was parsed with the unchecked readers:
    /// verifies the parse did not overrun `payload_len`, skips whatever it
    /// left unread, and settles the collection counters.
    pub fn finish_scalar(&mut self, consumed_before: usize, payload_len: usize) -> Db2Result<()> {
        let parsed = self.consumed - consumed_before;
        let leftover = payload_len
            .checked_sub(parsed)
            .ok_or_else(|| Db2Error::syntax("parse ran past the end of the scalar object"))?;
        if leftover > 0 {
            self.take(leftover)?;
        }
        self.ddm_scalar_len = 0;
        self.adjust_collections(payload_len)
    }

    // The low-level payload read: advances the cursor across continuation
    // boundaries, updating only the frame counter.
    fn take(&mut self, n: usize) -> Db2Result<Vec<u8>> {
        let mut out = Vec::with_capacity(n);
        let mut remaining = n;
        while remaining > 0 {
            if self.dss_length == 0 {
                if self.dss_continued {
                    self.read_continuation_header()?;
                    continue;
                }
                return Err(Db2Error::syntax("read ran past the end of the frame"));
            }
            let chunk = remaining.min(self.dss_length);
            if self.pos + chunk > self.buf.len() {
                return Err(Db2Error::syntax("truncated frame payload"));
            }
            out.extend_from_slice(&self.buf[self.pos..self.pos + chunk]);
            self.pos += chunk;
            self.dss_length -= chunk;
            remaining -= chunk;
        }
        self.consumed += n;
        Ok(out)
    }

    // ── bounds-checked scalar readers ────────────────────
    // Each decrements the innermost scalar and every enclosing collection.

    pub fn read_u8(&mut self) -> Db2Result<u8> {
        self.adjust_scalar(1)?;
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Db2Result<u16> {
        self.adjust_scalar(2)?;
        Ok(BigEndian::read_u16(&self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Db2Result<u32> {
        self.adjust_scalar(4)?;
        Ok(BigEndian::read_u32(&self.take(4)?))
    }

    pub fn read_u64(&mut self) -> Db2Result<u64> {
        self.adjust_scalar(8)?;
        Ok(BigEndian::read_u64(&self.take(8)?))
    }

    pub fn read_bytes(&mut self, n: usize) -> Db2Result<Vec<u8>> {
        self.adjust_scalar(n)?;
        self.take(n)
    }

    /// Reads the remaining payload of the current scalar as raw bytes.
    pub fn read_all_bytes(&mut self) -> Db2Result<Vec<u8>> {
        self.read_bytes(self.ddm_scalar_len)
    }

    /// Reads the remaining payload of the current scalar as a string in the
    /// active character set.
    pub fn read_string(&mut self) -> Db2Result<String> {
        let bytes = self.read_all_bytes()?;
        self.ccsid.borrow().decode(&bytes)
    }

    /// Decodes externally held bytes with the active character set.
    pub fn decode_string(&self, bytes: &[u8]) -> Db2Result<String> {
        self.ccsid.borrow().decode(bytes)
    }

    /// Reads the remaining payload as a list of unsigned shorts.
    pub fn read_u16_list(&mut self) -> Db2Result<Vec<u16>> {
        let len = self.ddm_scalar_len;
        if len % 2 != 0 {
            return Err(Db2Error::syntax("odd length for a list of shorts"));
        }
        let bytes = self.read_bytes(len)?;
        Ok(bytes.chunks_exact(2).map(BigEndian::read_u16).collect())
    }

    pub fn skip(&mut self, n: usize) -> Db2Result<()> {
        self.adjust_scalar(n)?;
        self.take(n).map(|_| ())
    }

    pub fn skip_scalar(&mut self) -> Db2Result<()> {
        self.skip(self.ddm_scalar_len)
    }

    // ── unchecked ("fast") readers ───────────────────────
    // Used inside self-describing row payloads (SQLCA, SQLDA, QRYDTA) where
    // the caller settles the length bookkeeping once via finish_scalar().

    pub fn read_fast_u8(&mut self) -> Db2Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_fast_u16(&mut self) -> Db2Result<u16> {
        Ok(BigEndian::read_u16(&self.take(2)?))
    }

    pub fn read_fast_i16(&mut self) -> Db2Result<i16> {
        Ok(BigEndian::read_i16(&self.take(2)?))
    }

    pub fn read_fast_i32(&mut self) -> Db2Result<i32> {
        Ok(BigEndian::read_i32(&self.take(4)?))
    }

    pub fn read_fast_i64(&mut self) -> Db2Result<i64> {
        Ok(BigEndian::read_i64(&self.take(8)?))
    }

    pub fn read_fast_u64(&mut self) -> Db2Result<u64> {
        Ok(BigEndian::read_u64(&self.take(8)?))
    }

    pub fn read_fast_f64(&mut self) -> Db2Result<f64> {
        Ok(BigEndian::read_f64(&self.take(8)?))
    }

    pub fn read_fast_string(&mut self, n: usize) -> Db2Result<String> {
        let bytes = self.take(n)?;
        self.ccsid.borrow().decode(&bytes)
    }

    pub fn skip_fast(&mut self, n: usize) -> Db2Result<()> {
        self.take(n).map(|_| ())
    }

    /// Variable character string: two-byte length followed by the bytes.
    pub fn read_fast_vcs(&mut self) -> Db2Result<String> {
        let len = usize::from(self.read_fast_u16()?);
        self.read_fast_string(len)
    }

    /// Length-delimited byte string; a zero length means absent.
    pub fn read_fast_ld_bytes(&mut self) -> Db2Result<Option<Vec<u8>>> {
        let len = usize::from(self.read_fast_u16()?);
        if len == 0 {
            return Ok(None);
        }
        self.take(len).map(Some)
    }

    /// Nullable mixed/single-byte character string pair (NVCM then NVCS);
    /// at most one of the two may be non-null.
    pub fn read_fast_nvcm_nvcs(&mut self) -> Db2Result<Option<String>> {
        let mut result = None;
        if self.read_fast_u8()? != super::codepoint::NULLDATA {
            let len = usize::from(self.read_fast_u16()?);
            if len > 0 {
                result = Some(self.read_fast_string(len)?);
            }
            if self.read_fast_u8()? != super::codepoint::NULLDATA {
                return Err(Db2Error::syntax("NVCM and NVCS both non-null"));
            }
        } else if self.read_fast_u8()? != super::codepoint::NULLDATA {
            let len = usize::from(self.read_fast_u16()?);
            if len > 0 {
                result = Some(self.read_fast_string(len)?);
            }
        }
        Ok(result)
    }

    pub fn skip_fast_nvcm_nvcs(&mut self) -> Db2Result<()> {
        self.read_fast_nvcm_nvcs().map(|_| ())
    }
}

/// Determines the byte length of the next complete reply chain in `buf`:
/// every DSS frame (with its continuations) up to and including the first
/// frame without the chaining bit. Returns `None` while the chain is still
/// incomplete.
pub fn chain_length(buf: &[u8]) -> Db2Result<Option<usize>> {
    let mut pos = 0_usize;
    loop {
        if pos + dss::DSS_HEADER_LENGTH > buf.len() {
            return Ok(None);
        }
        let length_field = BigEndian::read_u16(&buf[pos..]);
        if buf[pos + 2] != dss::MAGIC {
            return Err(Db2Error::syntax(format!(
                "DSS magic byte is 0x{:02X}, expected 0xD0",
                buf[pos + 2]
            )));
        }
        let format = buf[pos + 3];

        let mut continued = length_field & 0x8000 == 0x8000;
        let frame_len = if continued {
            dss::MAX_DSS_LENGTH
        } else {
            usize::from(length_field)
        };
        if frame_len < dss::DSS_HEADER_LENGTH {
            return Err(Db2Error::syntax(format!(
                "DSS length {frame_len} is less than the header size"
            )));
        }
        pos += frame_len;
        while continued {
            if pos + 2 > buf.len() {
                return Ok(None);
            }
            let chunk_field = BigEndian::read_u16(&buf[pos..]);
            if chunk_field == dss::CONTINUATION_SENTINEL {
                pos += dss::MAX_DSS_LENGTH;
            } else {
                let chunk = usize::from(chunk_field);
                if chunk < 2 || chunk > dss::MAX_DSS_LENGTH {
                    return Err(Db2Error::syntax(format!(
                        "invalid continuation chunk length {chunk}"
                    )));
                }
                pos += chunk;
                continued = false;
            }
        }
        if pos > buf.len() {
            return Ok(None);
        }
        if format & dss::CHAINED == 0 {
            return Ok(Some(pos));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::protocol::{codepoint as cp, FrameWriter};

    fn shared_ccsid() -> Rc<RefCell<CcsidManager>> {
        let mgr = CcsidManager::default();
        Rc::new(RefCell::new(mgr))
    }

    fn writer() -> FrameWriter {
        FrameWriter::new(shared_ccsid())
    }

    fn reader(buf: &[u8]) -> FrameReader {
        FrameReader::new(buf, shared_ccsid())
    }

    #[test]
    fn test_bytes_roundtrip_at_length_boundaries() {
        // Covers the non-extended, boundary and extended-length paths, and
        // frame continuation for everything beyond the DSS limit.
        for len in [0_usize, 1, 32766, 32767, 32768, 65535, 100_000] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let mut wr = writer();
            wr.start_request();
            wr.mark_length(cp::SECTKN);
            wr.write_bytes(&payload);
            wr.update_length();
            let bytes = wr.into_bytes();

            let mut rdr = reader(&bytes);
            rdr.start_same_id_chain().unwrap();
            rdr.expect(cp::SECTKN).unwrap();
            assert_eq!(rdr.scalar_len(), len, "length mismatch for {len}");
            assert_eq!(rdr.read_all_bytes().unwrap(), payload, "payload for {len}");
            rdr.end_of_same_id_chain().unwrap();
        }
    }

    #[test]
    fn test_scalars_and_strings_roundtrip() {
        let mut wr = writer();
        wr.start_request();
        wr.mark_length(cp::EXCSAT);
        wr.write_scalar_u8(cp::TYPSQLDA, 4);
        wr.write_scalar_u16(cp::SECMEC, 0x0003);
        wr.write_scalar_u32(cp::QRYBLKSZ, 32767);
        wr.write_scalar_string(cp::RDBNAM, "testdb", 18, 1024).unwrap();
        wr.update_length();
        let bytes = wr.into_bytes();

        let mut rdr = reader(&bytes);
        rdr.start_same_id_chain().unwrap();
        rdr.expect(cp::EXCSAT).unwrap();
        rdr.push_collection();
        rdr.expect(cp::TYPSQLDA).unwrap();
        assert_eq!(rdr.read_u8().unwrap(), 4);
        rdr.expect(cp::SECMEC).unwrap();
        assert_eq!(rdr.read_u16().unwrap(), 3);
        rdr.expect(cp::QRYBLKSZ).unwrap();
        assert_eq!(rdr.read_u32().unwrap(), 32767);
        rdr.expect(cp::RDBNAM).unwrap();
        // Fixed-width field comes back space-padded.
        assert_eq!(rdr.read_string().unwrap(), format!("{:<18}", "testdb"));
        assert_eq!(rdr.peek_code_point().unwrap(), Peek::EndOfCollection);
        rdr.pop_collection().unwrap();
        rdr.end_of_same_id_chain().unwrap();
    }

    #[test]
    fn test_peek_is_idempotent() {
        let mut wr = writer();
        wr.start_request();
        wr.write_scalar_u16(cp::SECMEC, 3);
        let bytes = wr.into_bytes();

        let mut rdr = reader(&bytes);
        rdr.start_same_id_chain().unwrap();
        for _ in 0..3 {
            assert_eq!(
                rdr.peek_code_point().unwrap(),
                Peek::CodePoint(cp::SECMEC)
            );
        }
        rdr.expect(cp::SECMEC).unwrap();
        assert_eq!(rdr.read_u16().unwrap(), 3);
    }

    #[test]
    fn test_frame_splitting_layout() {
        let len = 100_000_usize;
        let payload: Vec<u8> = (0..len).map(|i| (i % 163) as u8).collect();
        let mut wr = writer();
        wr.start_request();
        wr.mark_length(cp::SECTKN);
        wr.write_bytes(&payload);
        wr.update_length();
        let bytes = wr.into_bytes();

        // First frame carries the continuation sentinel.
        assert_eq!(BigEndian::read_u16(&bytes[0..2]), 0xFFFF);
        assert_eq!(bytes[2], dss::MAGIC);
        // Two full continuation chunks follow, then the remainder.
        let total_object = 8 + len; // extended LLCP plus payload
        let tail = total_object - (dss::MAX_DSS_LENGTH - dss::DSS_HEADER_LENGTH)
            - 2 * dss::MAX_CONTINUATION_DATA;
        assert_eq!(
            BigEndian::read_u16(&bytes[dss::MAX_DSS_LENGTH..]),
            0xFFFF
        );
        assert_eq!(
            BigEndian::read_u16(&bytes[2 * dss::MAX_DSS_LENGTH..]),
            0xFFFF
        );
        assert_eq!(
            BigEndian::read_u16(&bytes[3 * dss::MAX_DSS_LENGTH..]) as usize,
            tail + 2
        );
        assert_eq!(bytes.len(), 3 * dss::MAX_DSS_LENGTH + tail + 2);

        // And the reader reassembles the exact payload.
        let mut rdr = reader(&bytes);
        rdr.start_same_id_chain().unwrap();
        rdr.expect(cp::SECTKN).unwrap();
        assert_eq!(rdr.read_all_bytes().unwrap(), payload);
        rdr.end_of_same_id_chain().unwrap();
    }

    #[test]
    fn test_nested_collections_balance() {
        let mut wr = writer();
        wr.start_request();
        wr.mark_length(cp::ACCRDB);
        wr.mark_length(cp::TYPDEFOVR);
        wr.write_scalar_u16(cp::CCSIDSBC, 1208);
        wr.update_length();
        wr.write_scalar_u8(cp::RDBALWUPD, cp::FALSE);
        wr.update_length();
        let bytes = wr.into_bytes();

        let mut rdr = reader(&bytes);
        rdr.start_same_id_chain().unwrap();
        rdr.expect(cp::ACCRDB).unwrap();
        rdr.push_collection();
        rdr.expect(cp::TYPDEFOVR).unwrap();
        rdr.push_collection();
        rdr.expect(cp::CCSIDSBC).unwrap();
        assert_eq!(rdr.read_u16().unwrap(), 1208);
        assert_eq!(rdr.peek_code_point().unwrap(), Peek::EndOfCollection);
        rdr.pop_collection().unwrap();
        rdr.expect(cp::RDBALWUPD).unwrap();
        assert_eq!(rdr.read_u8().unwrap(), cp::FALSE);
        rdr.pop_collection().unwrap();
        rdr.end_of_same_id_chain().unwrap();
    }

    #[test]
    fn test_popping_unfinished_collection_is_fatal() {
        let mut wr = writer();
        wr.start_request();
        wr.mark_length(cp::ACCRDB);
        wr.write_scalar_u16(cp::SECMEC, 3);
        wr.update_length();
        let bytes = wr.into_bytes();

        let mut rdr = reader(&bytes);
        rdr.start_same_id_chain().unwrap();
        rdr.expect(cp::ACCRDB).unwrap();
        rdr.push_collection();
        assert!(matches!(
            rdr.pop_collection(),
            Err(Db2Error::ProtocolSyntax(_))
        ));
    }

    #[test]
    fn test_streamed_length_is_unsupported() {
        // LLCP length 0x8000: extended form with zero length bytes, i.e. a
        // streamed object of unknown length.
        let mut frame = vec![0x00, 0x0A, 0xD0, 0x02, 0x00, 0x01];
        frame.extend_from_slice(&[0x80, 0x00, 0x24, 0x08]);
        let mut rdr = reader(&frame);
        rdr.start_same_id_chain().unwrap();
        assert!(matches!(
            rdr.peek_code_point(),
            Err(Db2Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_bad_magic_is_fatal() {
        let frame = [0x00, 0x0A, 0xC0, 0x02, 0x00, 0x01, 0, 6, 0x11, 0xA2];
        let mut rdr = reader(&frame);
        assert!(matches!(
            rdr.start_same_id_chain(),
            Err(Db2Error::ProtocolSyntax(_))
        ));
    }

    #[test]
    fn test_correlation_mismatch_is_fatal() {
        // Correlation id 5 where 1 is expected.
        let frame = [0x00, 0x0A, 0xD0, 0x02, 0x00, 0x05, 0, 6, 0x11, 0xA2];
        let mut rdr = reader(&frame);
        assert!(matches!(
            rdr.start_same_id_chain(),
            Err(Db2Error::ProtocolSyntax(_))
        ));
    }

    #[test]
    fn test_error_sentinel_correlation_is_accepted() {
        let frame = [0x00, 0x0A, 0xD0, 0x02, 0xFF, 0xFF, 0x00, 0x06, 0x11, 0xA2];
        let mut rdr = reader(&frame);
        rdr.start_same_id_chain().unwrap();
        assert_eq!(
            rdr.peek_code_point().unwrap(),
            Peek::CodePoint(cp::SECMEC)
        );
    }

    #[test]
    fn test_chain_length_waits_for_complete_chains() {
        let mut wr = writer();
        wr.start_request();
        wr.write_scalar_u16(cp::SECMEC, 3);
        wr.start_request();
        wr.write_scalar_u16(cp::SECMEC, 4);
        let bytes = wr.into_bytes();

        // Both frames belong to one chain; a partial buffer is not enough.
        assert_eq!(chain_length(&bytes[..5]).unwrap(), None);
        assert_eq!(chain_length(&bytes[..bytes.len() - 1]).unwrap(), None);
        assert_eq!(chain_length(&bytes).unwrap(), Some(bytes.len()));
    }
}
