//! Character set conversion for the connection.
//!
//! A DRDA conversation starts in EBCDIC (code page 1047) and may switch to
//! UTF-8 once the handshake has negotiated a unicode-capable server. The
//! active encoding is connection-scoped state: it is switched synchronously
//! during the handshake and must not change while a command is in flight.

use crate::{Db2Error, Db2Result};

/// CCSID number flown on the wire for UTF-8.
pub const CCSID_UTF8: u16 = 1208;
/// CCSID number flown on the wire for the EBCDIC code page.
pub const CCSID_EBCDIC: u16 = 500;

/// The two encodings this client can speak.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ccsid {
    Ebcdic,
    Utf8,
}

/// Holds the currently active encoding of one connection.
#[derive(Debug)]
pub struct CcsidManager {
    current: Ccsid,
}

impl Default for CcsidManager {
    fn default() -> Self {
        Self {
            current: Ccsid::Ebcdic,
        }
    }
}

impl CcsidManager {
    pub fn set(&mut self, ccsid: Ccsid) {
        trace!("switching ccsid to {ccsid:?}");
        self.current = ccsid;
    }

    pub fn ccsid_number(&self) -> u16 {
        match self.current {
            Ccsid::Utf8 => CCSID_UTF8,
            Ccsid::Ebcdic => CCSID_EBCDIC,
        }
    }

    /// The encoded space character, used for padding fixed-width fields.
    pub fn space(&self) -> u8 {
        match self.current {
            Ccsid::Utf8 => b' ',
            Ccsid::Ebcdic => 0x40,
        }
    }

    pub fn encode(&self, s: &str) -> Db2Result<Vec<u8>> {
        match self.current {
            Ccsid::Utf8 => Ok(s.as_bytes().to_vec()),
            Ccsid::Ebcdic => s
                .chars()
                .map(|c| {
                    u32::from(c)
                        .try_into()
                        .ok()
                        .map(|b: u8| LATIN1_TO_EBCDIC[b as usize])
                        .ok_or_else(|| {
                            Db2Error::UsageDetailed(format!(
                                "character {c:?} is not representable in EBCDIC"
                            ))
                        })
                })
                .collect(),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Db2Result<String> {
        match self.current {
            Ccsid::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| Db2Error::syntax(format!("invalid utf-8 in character data: {e}"))),
            Ccsid::Ebcdic => Ok(bytes
                .iter()
                .map(|&b| char::from(EBCDIC_TO_LATIN1[b as usize]))
                .collect()),
        }
    }
}

// Code page 1047, EBCDIC byte -> latin-1 byte.
#[rustfmt::skip]
const EBCDIC_TO_LATIN1: [u8; 256] = [
    0x00, 0x01, 0x02, 0x03, 0x9C, 0x09, 0x86, 0x7F, 0x97, 0x8D, 0x8E, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
    0x10, 0x11, 0x12, 0x13, 0x9D, 0x0A, 0x08, 0x87, 0x18, 0x19, 0x92, 0x8F, 0x1C, 0x1D, 0x1E, 0x1F,
    0x80, 0x81, 0x82, 0x83, 0x84, 0x85, 0x17, 0x1B, 0x88, 0x89, 0x8A, 0x8B, 0x8C, 0x05, 0x06, 0x07,
    0x90, 0x91, 0x16, 0x93, 0x94, 0x95, 0x96, 0x04, 0x98, 0x99, 0x9A, 0x9B, 0x14, 0x15, 0x9E, 0x1A,
    0x20, 0xA0, 0xE2, 0xE4, 0xE0, 0xE1, 0xE3, 0xE5, 0xE7, 0xF1, 0xA2, 0x2E, 0x3C, 0x28, 0x2B, 0x7C,
    0x26, 0xE9, 0xEA, 0xEB, 0xE8, 0xED, 0xEE, 0xEF, 0xEC, 0xDF, 0x21, 0x24, 0x2A, 0x29, 0x3B, 0x5E,
    0x2D, 0x2F, 0xC2, 0xC4, 0xC0, 0xC1, 0xC3, 0xC5, 0xC7, 0xD1, 0xA6, 0x2C, 0x25, 0x5F, 0x3E, 0x3F,
    0xF8, 0xC9, 0xCA, 0xCB, 0xC8, 0xCD, 0xCE, 0xCF, 0xCC, 0x60, 0x3A, 0x23, 0x40, 0x27, 0x3D, 0x22,
    0xD8, 0x61, 0x62, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69, 0xAB, 0xBB, 0xF0, 0xFD, 0xFE, 0xB1,
    0xB0, 0x6A, 0x6B, 0x6C, 0x6D, 0x6E, 0x6F, 0x70, 0x71, 0x72, 0xAA, 0xBA, 0xE6, 0xB8, 0xC6, 0xA4,
    0xB5, 0x7E, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7A, 0xA1, 0xBF, 0xD0, 0x5B, 0xDE, 0xAE,
    0xAC, 0xA3, 0xA5, 0xB7, 0xA9, 0xA7, 0xB6, 0xBC, 0xBD, 0xBE, 0xDD, 0xA8, 0xAF, 0x5D, 0xB4, 0xD7,
    0x7B, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49, 0xAD, 0xF4, 0xF6, 0xF2, 0xF3, 0xF5,
    0x7D, 0x4A, 0x4B, 0x4C, 0x4D, 0x4E, 0x4F, 0x50, 0x51, 0x52, 0xB9, 0xFB, 0xFC, 0xF9, 0xFA, 0xFF,
    0x5C, 0xF7, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5A, 0xB2, 0xD4, 0xD6, 0xD2, 0xD3, 0xD5,
    0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0xB3, 0xDB, 0xDC, 0xD9, 0xDA, 0x9F,
];

lazy_static! {
    static ref LATIN1_TO_EBCDIC: [u8; 256] = {
        let mut table = [0u8; 256];
        for (ebcdic, &latin1) in EBCDIC_TO_LATIN1.iter().enumerate() {
            table[latin1 as usize] = ebcdic as u8;
        }
        table
    };
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ebcdic_roundtrip() {
        let mgr = CcsidManager::default();
        assert_eq!(mgr.ccsid_number(), CCSID_EBCDIC);
        let s = "The quick brown Fox jumps over 13 lazy dogs, @once.";
        let encoded = mgr.encode(s).unwrap();
        assert_ne!(encoded, s.as_bytes());
        assert_eq!(mgr.decode(&encoded).unwrap(), s);
    }

    #[test]
    fn test_ebcdic_known_bytes() {
        let mgr = CcsidManager::default();
        assert_eq!(mgr.encode("A0 z").unwrap(), vec![0xC1, 0xF0, 0x40, 0xA9]);
        assert_eq!(mgr.space(), 0x40);
    }

    #[test]
    fn test_utf8_passthrough() {
        let mut mgr = CcsidManager::default();
        mgr.set(Ccsid::Utf8);
        assert_eq!(mgr.encode("Grüße").unwrap(), "Grüße".as_bytes());
        assert_eq!(mgr.decode("Grüße".as_bytes()).unwrap(), "Grüße");
        assert_eq!(mgr.ccsid_number(), 1208);
    }

    #[test]
    fn test_unmappable_char_is_rejected() {
        let mgr = CcsidManager::default();
        assert!(mgr.encode("snowman ☃").is_err());
    }
}
