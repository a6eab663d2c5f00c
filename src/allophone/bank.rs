//! `SP56` sample bank decoder.
//!
//! The allophone PCM data ships as a compressed binary asset:
//!
//! ```text
//! Header  (8 bytes):  "SP56" | method: u8 | count: u8 | reserved: u16
//! Index   (8 * count): orig_len: u16 | comp_len: u16 | offset: u32
//! Payload: concatenated compressed entries, offsets relative to here
//! ```
//!
//! All integers little-endian. Samples are stored unsigned 8-bit with 0x80
//! as the silence midpoint and recentered to `i8` while decoding, so the
//! rest of the firmware only ever sees signed PCM.
//!
//! Decoding happens once at startup, outside the real-time paths.

/// File signature.
pub const BANK_MAGIC: [u8; 4] = *b"SP56";

/// Header length in bytes.
const HEADER_LEN: usize = 8;

/// Index record length in bytes.
const RECORD_LEN: usize = 8;

/// Most entries a bank may carry (the chip's address space).
const MAX_ENTRIES: usize = super::ALLOPHONE_COUNT;

/// Per-entry compression method, bank-wide.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Compression {
    /// Raw unsigned samples.
    None = 0,
    /// First sample literal, then clamped signed deltas.
    Delta = 1,
    /// Two samples per byte, high nibble first (lossy).
    FourBit = 2,
    /// (value, run-length) byte pairs.
    Rle = 3,
}

impl Compression {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Compression::None),
            1 => Some(Compression::Delta),
            2 => Some(Compression::FourBit),
            3 => Some(Compression::Rle),
            _ => None,
        }
    }
}

/// Why a bank failed to parse or decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BankError {
    /// File does not start with `SP56`.
    BadMagic,
    /// Method byte is not a known compression scheme.
    UnknownMethod,
    /// File shorter than its fixed header.
    TruncatedHeader,
    /// File shorter than header + declared index.
    TruncatedIndex,
    /// More entries declared than the chip can address.
    TooManyEntries,
    /// An index record declares zero decoded samples.
    EmptyEntry,
    /// An index record points outside the payload.
    EntryOutOfBounds,
    /// Decoded sample count does not match the record's `orig_len`.
    LengthMismatch,
    /// Destination pool too small for the decoded entry.
    PoolExhausted,
    /// Table construction requires exactly 64 entries.
    WrongEntryCount,
}

impl BankError {
    /// Short diagnostic text.
    pub fn message(&self) -> &'static str {
        match self {
            Self::BadMagic => "bad magic",
            Self::UnknownMethod => "unknown compression method",
            Self::TruncatedHeader => "truncated header",
            Self::TruncatedIndex => "truncated index",
            Self::TooManyEntries => "too many entries",
            Self::EmptyEntry => "empty entry",
            Self::EntryOutOfBounds => "entry out of bounds",
            Self::LengthMismatch => "decoded length mismatch",
            Self::PoolExhausted => "sample pool exhausted",
            Self::WrongEntryCount => "bank must hold 64 entries",
        }
    }
}

impl core::fmt::Display for BankError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.message())
    }
}

/// One index record.
#[derive(Clone, Copy, Debug, Default)]
struct BankRecord {
    orig_len: u16,
    comp_len: u16,
    offset: u32,
}

/// A parsed (not yet decoded) bank, borrowing the raw asset bytes.
pub struct AllophoneBank<'a> {
    method: Compression,
    count: usize,
    index: [BankRecord; MAX_ENTRIES],
    payload: &'a [u8],
}

/// Recenter a stored unsigned sample onto the signed axis (0x80 -> 0).
#[inline]
fn recenter(raw: u8) -> i8 {
    (raw ^ 0x80) as i8
}

impl<'a> AllophoneBank<'a> {
    /// Parse and validate a bank image.
    ///
    /// Every index record is bounds-checked against the payload here, so
    /// [`decode_into`] never has to fail on out-of-range reads.
    ///
    /// [`decode_into`]: Self::decode_into
    pub fn parse(bytes: &'a [u8]) -> Result<Self, BankError> {
        if bytes.len() < HEADER_LEN {
            return Err(BankError::TruncatedHeader);
        }
        if bytes[0..4] != BANK_MAGIC {
            return Err(BankError::BadMagic);
        }

        let method = Compression::from_u8(bytes[4]).ok_or(BankError::UnknownMethod)?;
        let count = bytes[5] as usize;
        if count > MAX_ENTRIES {
            return Err(BankError::TooManyEntries);
        }

        let index_end = HEADER_LEN + count * RECORD_LEN;
        if bytes.len() < index_end {
            return Err(BankError::TruncatedIndex);
        }
        let payload = &bytes[index_end..];

        let mut index = [BankRecord::default(); MAX_ENTRIES];
        for (i, record) in index.iter_mut().take(count).enumerate() {
            let at = HEADER_LEN + i * RECORD_LEN;
            let orig_len = u16::from_le_bytes([bytes[at], bytes[at + 1]]);
            let comp_len = u16::from_le_bytes([bytes[at + 2], bytes[at + 3]]);
            let offset = u32::from_le_bytes([
                bytes[at + 4],
                bytes[at + 5],
                bytes[at + 6],
                bytes[at + 7],
            ]);

            if orig_len == 0 {
                return Err(BankError::EmptyEntry);
            }
            let end = offset as usize + comp_len as usize;
            if end > payload.len() {
                return Err(BankError::EntryOutOfBounds);
            }

            *record = BankRecord {
                orig_len,
                comp_len,
                offset,
            };
        }

        Ok(Self {
            method,
            count,
            index,
            payload,
        })
    }

    /// Number of entries in the bank.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.count
    }

    /// Bank-wide compression method.
    #[inline]
    pub fn method(&self) -> Compression {
        self.method
    }

    /// Decoded sample count of entry `i` (its index `orig_len`).
    pub fn decoded_len(&self, i: usize) -> usize {
        if i < self.count {
            self.index[i].orig_len as usize
        } else {
            0
        }
    }

    /// Decode entry `i` into `out`, returning the sample count written.
    pub fn decode_into(&self, i: usize, out: &mut [i8]) -> Result<usize, BankError> {
        if i >= self.count {
            return Err(BankError::EntryOutOfBounds);
        }
        let record = self.index[i];
        let orig_len = record.orig_len as usize;
        if out.len() < orig_len {
            return Err(BankError::PoolExhausted);
        }

        let start = record.offset as usize;
        let data = &self.payload[start..start + record.comp_len as usize];

        let written = match self.method {
            Compression::None => Self::decode_raw(data, out),
            Compression::Delta => Self::decode_delta(data, out),
            Compression::FourBit => Self::decode_4bit(data, out, orig_len),
            Compression::Rle => Self::decode_rle(data, out)?,
        };

        if written != orig_len {
            return Err(BankError::LengthMismatch);
        }
        Ok(written)
    }

    fn decode_raw(data: &[u8], out: &mut [i8]) -> usize {
        for (slot, &raw) in out.iter_mut().zip(data) {
            *slot = recenter(raw);
        }
        data.len()
    }

    fn decode_delta(data: &[u8], out: &mut [i8]) -> usize {
        if data.is_empty() {
            return 0;
        }

        let mut current = data[0] as i16;
        out[0] = recenter(data[0]);

        for (slot, &raw) in out[1..].iter_mut().zip(&data[1..]) {
            let delta = raw as i8 as i16;
            current = (current + delta).clamp(0, 255);
            *slot = recenter(current as u8);
        }
        data.len()
    }

    fn decode_4bit(data: &[u8], out: &mut [i8], orig_len: usize) -> usize {
        let mut written = 0;
        for &packed in data {
            if written >= orig_len {
                break;
            }
            out[written] = recenter((packed >> 4) << 4);
            written += 1;

            if written < orig_len {
                out[written] = recenter((packed & 0x0F) << 4);
                written += 1;
            }
        }
        written
    }

    fn decode_rle(data: &[u8], out: &mut [i8]) -> Result<usize, BankError> {
        let mut written = 0;
        // Trailing odd byte is ignored, as in the original encoder.
        for pair in data.chunks_exact(2) {
            let sample = recenter(pair[0]);
            let run = pair[1] as usize;
            if written + run > out.len() {
                return Err(BankError::PoolExhausted);
            }
            for slot in &mut out[written..written + run] {
                *slot = sample;
            }
            written += run;
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Assemble a bank image from (orig_len, payload bytes) entries.
    fn build_bank(method: u8, entries: &[(u16, &[u8])]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&BANK_MAGIC);
        bytes.push(method);
        bytes.push(entries.len() as u8);
        bytes.extend_from_slice(&0u16.to_le_bytes());

        let mut offset = 0u32;
        for (orig_len, payload) in entries {
            bytes.extend_from_slice(&orig_len.to_le_bytes());
            bytes.extend_from_slice(&(payload.len() as u16).to_le_bytes());
            bytes.extend_from_slice(&offset.to_le_bytes());
            offset += payload.len() as u32;
        }
        for (_, payload) in entries {
            bytes.extend_from_slice(payload);
        }
        bytes
    }

    #[test]
    fn test_raw_entry_recentered() {
        let image = build_bank(0, &[(4, &[0x80, 0xFF, 0x00, 0x81])]);
        let bank = AllophoneBank::parse(&image).unwrap();

        let mut out = [0i8; 8];
        let written = bank.decode_into(0, &mut out).unwrap();
        assert_eq!(written, 4);
        assert_eq!(&out[..4], &[0, 127, -128, 1]);
    }

    #[test]
    fn test_delta_round_trip() {
        // Encode [0x80, 0x82, 0x7F, 0x7F] as first + deltas
        let compressed = [0x80u8, 2, (-3i8) as u8, 0];
        let image = build_bank(1, &[(4, &compressed)]);
        let bank = AllophoneBank::parse(&image).unwrap();

        let mut out = [0i8; 4];
        bank.decode_into(0, &mut out).unwrap();
        assert_eq!(out, [0, 2, -1, -1]);
    }

    #[test]
    fn test_delta_clamps_at_rails() {
        // 0xFF + 100 would overflow the unsigned axis; must clamp to 255
        let compressed = [0xFFu8, 100, (-1i8) as u8];
        let image = build_bank(1, &[(3, &compressed)]);
        let bank = AllophoneBank::parse(&image).unwrap();

        let mut out = [0i8; 3];
        bank.decode_into(0, &mut out).unwrap();
        assert_eq!(out, [127, 127, 126]);
    }

    #[test]
    fn test_rle_expands_runs() {
        // (0x80 x 3), (0x90 x 2)
        let compressed = [0x80u8, 3, 0x90, 2];
        let image = build_bank(3, &[(5, &compressed)]);
        let bank = AllophoneBank::parse(&image).unwrap();

        let mut out = [99i8; 8];
        let written = bank.decode_into(0, &mut out).unwrap();
        assert_eq!(written, 5);
        assert_eq!(&out[..5], &[0, 0, 0, 16, 16]);
    }

    #[test]
    fn test_4bit_high_nibble_first() {
        // 0xF8 -> samples 0xF0, 0x80; 0x08 -> 0x00 (orig_len 3 drops low nibble)
        let compressed = [0xF8u8, 0x08];
        let image = build_bank(2, &[(3, &compressed)]);
        let bank = AllophoneBank::parse(&image).unwrap();

        let mut out = [0i8; 4];
        let written = bank.decode_into(0, &mut out).unwrap();
        assert_eq!(written, 3);
        assert_eq!(&out[..3], &[112, 0, -128]);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut image = build_bank(0, &[(1, &[0x80])]);
        image[0] = b'X';
        assert!(matches!(
            AllophoneBank::parse(&image),
            Err(BankError::BadMagic)
        ));
    }

    #[test]
    fn test_unknown_method_rejected() {
        let image = build_bank(7, &[(1, &[0x80])]);
        assert!(matches!(
            AllophoneBank::parse(&image),
            Err(BankError::UnknownMethod)
        ));
    }

    #[test]
    fn test_truncated_index_rejected() {
        let image = build_bank(0, &[(1, &[0x80])]);
        // Cut into the index
        assert!(matches!(
            AllophoneBank::parse(&image[..10]),
            Err(BankError::TruncatedIndex)
        ));
        assert!(matches!(
            AllophoneBank::parse(&image[..4]),
            Err(BankError::TruncatedHeader)
        ));
    }

    #[test]
    fn test_overlength_record_rejected() {
        let mut image = build_bank(0, &[(4, &[0x80, 0x80, 0x80, 0x80])]);
        // Inflate comp_len past the payload
        image[10] = 200;
        assert!(matches!(
            AllophoneBank::parse(&image),
            Err(BankError::EntryOutOfBounds)
        ));
    }

    #[test]
    fn test_zero_length_entry_rejected() {
        let image = build_bank(0, &[(0, &[])]);
        assert!(matches!(
            AllophoneBank::parse(&image),
            Err(BankError::EmptyEntry)
        ));
    }

    #[test]
    fn test_length_mismatch_detected() {
        // Record promises 5 samples but raw payload has 4
        let image = build_bank(0, &[(5, &[0x80, 0x80, 0x80, 0x80])]);
        let bank = AllophoneBank::parse(&image).unwrap();

        let mut out = [0i8; 8];
        assert!(matches!(
            bank.decode_into(0, &mut out),
            Err(BankError::LengthMismatch)
        ));
    }

    #[test]
    fn test_pool_exhausted() {
        let image = build_bank(0, &[(4, &[0x80, 0x80, 0x80, 0x80])]);
        let bank = AllophoneBank::parse(&image).unwrap();

        let mut out = [0i8; 2];
        assert!(matches!(
            bank.decode_into(0, &mut out),
            Err(BankError::PoolExhausted)
        ));
    }

    #[test]
    fn test_multiple_entries() {
        let image = build_bank(0, &[(2, &[0x80, 0x90]), (3, &[0x70, 0x80, 0x90])]);
        let bank = AllophoneBank::parse(&image).unwrap();

        assert_eq!(bank.entry_count(), 2);
        assert_eq!(bank.decoded_len(0), 2);
        assert_eq!(bank.decoded_len(1), 3);

        let mut out = [0i8; 4];
        assert_eq!(bank.decode_into(1, &mut out).unwrap(), 3);
        assert_eq!(&out[..3], &[-16, 0, 16]);
    }
}
