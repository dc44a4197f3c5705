//! Encode-side framing: builds chained DSS frames containing
//! length/codepoint tagged objects.
//!
//! The writer is append-only and self-finalizing: starting a new frame
//! finalizes the previous one (length backpatch plus chain bits), and
//! [`FrameWriter::into_bytes`] finalizes the last frame, splitting it into
//! continuation chunks when it exceeds the DSS size limit.

use crate::protocol::{ccsid::CcsidManager, dss};
use crate::{Db2Error, Db2Result};
use byteorder::{BigEndian, ByteOrder};
use std::{cell::RefCell, rc::Rc};

#[derive(Debug)]
pub struct FrameWriter {
    buf: Vec<u8>,
    ccsid: Rc<RefCell<CcsidManager>>,

    // Offsets of pending two-byte object length fields, innermost last.
    mark_stack: Vec<usize>,

    // Location of the current DSS header's length bytes, updated when the
    // frame is finalized.
    dss_start: usize,

    // Correlation id of the most recently started request frame.
    correlation_id: u16,
}

impl FrameWriter {
    pub fn new(ccsid: Rc<RefCell<CcsidManager>>) -> Self {
        Self {
            buf: Vec::with_capacity(1024),
            ccsid,
            mark_stack: Vec::with_capacity(4),
            dss_start: 0,
            correlation_id: 0,
        }
    }

    /// Starts a request DSS for a new command. Any frame already in the
    /// buffer is finalized and chained to this one (new correlation id).
    pub fn start_request(&mut self) {
        let corr = self.correlation_id + 1;
        self.build_dss(dss::TYPE_REQUEST, corr, false);
        self.correlation_id = corr;
    }

    /// Starts an object DSS carrying command data for the current command.
    /// The previous frame is finalized and chained with the same-correlator
    /// bit set.
    pub fn start_command_data(&mut self) {
        let corr = self.correlation_id;
        self.build_dss(dss::TYPE_OBJECT, corr, true);
    }

    fn build_dss(&mut self, dss_type: u8, corr: u16, same_correlator: bool) {
        if !self.buf.is_empty() {
            self.finalize_frame_length();
            let format_pos = self.dss_start + 3;
            self.buf[format_pos] |= dss::CHAINED;
            if same_correlator {
                self.buf[format_pos] |= dss::CHAINED_SAME_ID;
            }
        }
        self.dss_start = self.buf.len();
        // Placeholder length, patched on finalize.
        self.write_u16(0xFFFF);
        self.write_u8(dss::MAGIC);
        self.write_u8(dss_type);
        self.write_u16(corr);
    }

    /// Finalizes the last frame and yields the wire bytes.
    pub fn into_bytes(mut self) -> Vec<u8> {
        if !self.buf.is_empty() {
            self.finalize_frame_length();
        }
        trace!("outbound frame: {}", hex::encode(&self.buf));
        self.buf
    }

    /// Computes the total size of the current DSS and patches its length
    /// field. A frame larger than the DSS limit is split right here: the
    /// payload is shifted to make room for two-byte continuation headers,
    /// one per chunk beyond the first.
    #[allow(clippy::cast_possible_truncation)]
    fn finalize_frame_length(&mut self) {
        let total_size = self.buf.len() - self.dss_start;

        let length_field = if total_size > dss::MAX_DSS_LENGTH {
            let mut bytes_requiring_cont = total_size - dss::MAX_DSS_LENGTH;
            let mut cont_header_count = bytes_requiring_cont / dss::MAX_CONTINUATION_DATA;
            if bytes_requiring_cont % dss::MAX_CONTINUATION_DATA != 0 {
                cont_header_count += 1;
            }
            trace!(
                "splitting frame of {} bytes into {} continuation chunks",
                total_size,
                cont_header_count
            );

            // Shift the tail right, rightmost chunk first, inserting each
            // chunk's continuation header as we go.
            let mut data_byte = self.buf.len() - 1;
            let mut shift_offset = cont_header_count * 2;
            self.buf.resize(self.buf.len() + shift_offset, 0);

            let mut first_pass = true;
            loop {
                let mut data_to_shift = bytes_requiring_cont % dss::MAX_CONTINUATION_DATA;
                if data_to_shift == 0 {
                    data_to_shift = dss::MAX_CONTINUATION_DATA;
                }
                data_byte -= data_to_shift;
                self.buf.copy_within(
                    data_byte + 1..=data_byte + data_to_shift,
                    data_byte + shift_offset + 1,
                );

                // The rightmost chunk keeps its true length, even when it is
                // exactly the DSS limit; every other chunk is continued.
                let mut header = (data_to_shift + 2) as u16;
                if first_pass {
                    first_pass = false;
                } else if usize::from(header) == dss::MAX_DSS_LENGTH {
                    header = dss::CONTINUATION_SENTINEL;
                }
                let header_pos = data_byte + shift_offset - 1;
                BigEndian::write_u16(&mut self.buf[header_pos..header_pos + 2], header);

                bytes_requiring_cont -= data_to_shift;
                shift_offset -= 2;
                if bytes_requiring_cont == 0 {
                    break;
                }
            }
            dss::CONTINUATION_SENTINEL
        } else {
            total_size as u16
        };

        BigEndian::write_u16(
            &mut self.buf[self.dss_start..self.dss_start + 2],
            length_field,
        );
    }

    // ── length/codepoint objects ─────────────────────────

    /// Marks the location of a two-byte object length field, skips it, and
    /// writes the codepoint. The length is patched by the matching
    /// [`FrameWriter::update_length`].
    pub fn mark_length(&mut self, codepoint: u16) {
        self.mark_stack.push(self.buf.len());
        self.write_u16(0);
        self.write_u16(codepoint);
    }

    /// Patches the most recently marked length field (lengths are updated in
    /// the reverse order they were marked). Spans beyond the two-byte range
    /// shift the payload right and switch to the extended-length form.
    #[allow(clippy::cast_possible_truncation)]
    pub fn update_length(&mut self) {
        let mark = self
            .mark_stack
            .pop()
            .expect("update_length without matching mark_length");
        let span = self.buf.len() - mark;
        let payload = span - 4;

        let length_field = if span <= 0x7FFF {
            span as u16
        } else {
            let ext_count: usize = if payload <= 0x7FFF_FFFF {
                4
            } else if payload <= 0x7FFF_FFFF_FFFF {
                6
            } else {
                8
            };
            // Splice the extension bytes in right after the codepoint.
            let ext_pos = mark + 4;
            let mut ext = [0_u8; 8];
            BigEndian::write_uint(&mut ext[..ext_count], payload as u64, ext_count);
            self.buf.splice(ext_pos..ext_pos, ext[..ext_count].iter().copied());
            0x8000 | ext_count as u16
        };
        BigEndian::write_u16(&mut self.buf[mark..mark + 2], length_field);
    }

    /// Writes a four-byte length/codepoint pair with an explicit length
    /// value (the value is not adjusted).
    pub fn write_length_codepoint(&mut self, length: u16, codepoint: u16) {
        self.write_u16(length);
        self.write_u16(codepoint);
    }

    // ── scalar objects ───────────────────────────────────

    pub fn write_scalar_u8(&mut self, codepoint: u16, value: u8) {
        self.write_length_codepoint(5, codepoint);
        self.write_u8(value);
    }

    pub fn write_scalar_u16(&mut self, codepoint: u16, value: u16) {
        self.write_length_codepoint(6, codepoint);
        self.write_u16(value);
    }

    pub fn write_scalar_u32(&mut self, codepoint: u16, value: u32) {
        self.write_length_codepoint(8, codepoint);
        self.write_u32(value);
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn write_scalar_bytes(&mut self, codepoint: u16, bytes: &[u8]) -> Db2Result<()> {
        if bytes.len() + 4 > 0x7FFF {
            return Err(Db2Error::Usage("scalar byte object too large"));
        }
        self.write_length_codepoint(bytes.len() as u16 + 4, codepoint);
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Writes a length/codepoint pair plus character data in the active
    /// character set. The value is space-padded up to `min_len` bytes;
    /// exceeding `max_len` encoded bytes is a caller error, detected before
    /// anything is written.
    #[allow(clippy::cast_possible_truncation)]
    pub fn write_scalar_string(
        &mut self,
        codepoint: u16,
        value: &str,
        min_len: usize,
        max_len: usize,
    ) -> Db2Result<()> {
        let (mut encoded, pad) = {
            let ccsid = self.ccsid.borrow();
            (ccsid.encode(value)?, ccsid.space())
        };
        if encoded.len() > max_len {
            return Err(Db2Error::UsageDetailed(format!(
                "string for codepoint 0x{codepoint:04X} is {} bytes, limit is {max_len}",
                encoded.len()
            )));
        }
        if encoded.len() < min_len {
            encoded.resize(min_len, pad);
        }
        self.write_length_codepoint(encoded.len() as u16 + 4, codepoint);
        self.buf.extend_from_slice(&encoded);
        Ok(())
    }

    /// Writes `bytes` padded (or an error if over-long) to exactly
    /// `fixed_len` bytes, without any length prefix.
    pub fn write_padded_bytes(
        &mut self,
        bytes: &[u8],
        fixed_len: usize,
        pad: u8,
    ) -> Db2Result<()> {
        if bytes.len() > fixed_len {
            return Err(Db2Error::Usage("identifier exceeds its fixed field width"));
        }
        self.buf.extend_from_slice(bytes);
        for _ in bytes.len()..fixed_len {
            self.buf.push(pad);
        }
        Ok(())
    }

    /// Encodes `value` in the active character set without writing it.
    pub fn encode_string(&self, value: &str) -> Db2Result<Vec<u8>> {
        self.ccsid.borrow().encode(value)
    }

    // ── raw writes ───────────────────────────────────────

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        let mut b = [0_u8; 2];
        BigEndian::write_u16(&mut b, value);
        self.buf.extend_from_slice(&b);
    }

    pub fn write_u32(&mut self, value: u32) {
        let mut b = [0_u8; 4];
        BigEndian::write_u32(&mut b, value);
        self.buf.extend_from_slice(&b);
    }

    pub fn write_i16(&mut self, value: i16) {
        let mut b = [0_u8; 2];
        BigEndian::write_i16(&mut b, value);
        self.buf.extend_from_slice(&b);
    }

    pub fn write_i32(&mut self, value: i32) {
        let mut b = [0_u8; 4];
        BigEndian::write_i32(&mut b, value);
        self.buf.extend_from_slice(&b);
    }

    pub fn write_i64(&mut self, value: i64) {
        let mut b = [0_u8; 8];
        BigEndian::write_i64(&mut b, value);
        self.buf.extend_from_slice(&b);
    }

    pub fn write_f64(&mut self, value: f64) {
        let mut b = [0_u8; 8];
        BigEndian::write_f64(&mut b, value);
        self.buf.extend_from_slice(&b);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Current write position; used to snapshot spans for caching.
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn bytes_since(&self, position: usize) -> &[u8] {
        &self.buf[position..]
    }
}
