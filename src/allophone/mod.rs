//! Allophone descriptor table.
//!
//! Immutable lookup of the 64 SP0256-AL2 allophones: id, canonical
//! mnemonic, and the pre-rendered sample buffer. Built once at startup,
//! read-only afterwards, shared by the protocol monitor (name/id
//! diagnostics) and the playback engine (sample data).
//!
//! Two construction paths:
//! - [`AllophoneTable::from_bank`] decodes the `SP56` binary asset into a
//!   caller-provided sample pool (see [`bank`]).
//! - [`AllophoneTable::placeholder`] is the fallback when no asset is
//!   present: pauses PA1-PA5 are exact, voiced entries are short silence.

pub mod bank;

pub use bank::{AllophoneBank, BankError, Compression};

/// Total number of allophones the chip addresses.
pub const ALLOPHONE_COUNT: usize = 64;

/// Highest valid address on the 6-bit bus.
pub const ADDRESS_MAX: u8 = 63;

/// Output sample rate of the original chip's PCM data.
pub const SAMPLE_RATE_HZ: u32 = 11025;

/// Canonical SP0256-AL2 mnemonics, indexed by allophone id.
pub static ALLOPHONE_NAMES: [&str; ALLOPHONE_COUNT] = [
    "PA1", "PA2", "PA3", "PA4", "PA5", "OY", "AY", "EH", "KK3", "PP", //
    "JH", "NN1", "IH", "TT2", "RR1", "AX", "MM", "TT1", "DH1", "IY", //
    "EY", "DD1", "UW1", "AO", "AA", "YY2", "AE", "HH1", "BB1", "TH", //
    "UH", "UW2", "AW", "DD2", "GG3", "VV", "GG1", "SH", "ZH", "RR2", //
    "FF", "KK2", "KK1", "ZZ", "NG", "LL", "WW", "XR", "WH", "YY1", //
    "CH", "ER1", "ER2", "OW", "DH2", "SS", "NN2", "HH2", "OR", "AR", //
    "YR", "GG2", "EL", "BB2",
];

/// Number of samples in a pause of the given length at the chip rate.
const fn pause_samples(ms: u32) -> usize {
    (ms * SAMPLE_RATE_HZ / 1000) as usize
}

// Pre-rendered pauses. Silence is data: a pause plays exactly like a
// voiced allophone, so the render loop has no special case for it.
static PA1_SAMPLES: [i8; pause_samples(10)] = [0; pause_samples(10)];
static PA2_SAMPLES: [i8; pause_samples(30)] = [0; pause_samples(30)];
static PA3_SAMPLES: [i8; pause_samples(50)] = [0; pause_samples(50)];
static PA4_SAMPLES: [i8; pause_samples(100)] = [0; pause_samples(100)];
static PA5_SAMPLES: [i8; pause_samples(200)] = [0; pause_samples(200)];

/// Placeholder body for voiced entries when no sample bank is present
/// (~18 ms of silence, matching the original firmware's fallback).
static PLACEHOLDER_VOICED: [i8; 200] = [0; 200];

/// One allophone: identity plus its immutable sample buffer.
///
/// Samples are signed 8-bit PCM centered on 0; the playback engine expands
/// them to the output driver's resolution.
#[derive(Clone, Copy, Debug)]
pub struct AllophoneDescriptor<'a> {
    id: u8,
    name: &'static str,
    samples: &'a [i8],
}

impl<'a> AllophoneDescriptor<'a> {
    /// Allophone id (0-63).
    #[inline]
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Canonical mnemonic, e.g. "HH1".
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The sample buffer. Never empty.
    #[inline]
    pub fn samples(&self) -> &'a [i8] {
        self.samples
    }

    /// Sample count.
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// True for the five pause allophones PA1-PA5.
    #[inline]
    pub fn is_pause(&self) -> bool {
        self.id <= 4
    }

    /// Nominal playback duration at the chip sample rate.
    #[inline]
    pub fn nominal_duration_us(&self) -> i64 {
        self.samples.len() as i64 * 1_000_000 / SAMPLE_RATE_HZ as i64
    }
}

/// Immutable table of all 64 allophones.
pub struct AllophoneTable<'a> {
    entries: [AllophoneDescriptor<'a>; ALLOPHONE_COUNT],
}

impl AllophoneTable<'static> {
    /// Build the fallback table: exact pauses, silent voiced entries.
    ///
    /// Timing-correct for the pauses and for protocol exercise; voiced
    /// output is silent until a real bank is flashed.
    pub fn placeholder() -> Self {
        let entries = core::array::from_fn(|id| {
            let samples: &'static [i8] = match id {
                0 => &PA1_SAMPLES,
                1 => &PA2_SAMPLES,
                2 => &PA3_SAMPLES,
                3 => &PA4_SAMPLES,
                4 => &PA5_SAMPLES,
                _ => &PLACEHOLDER_VOICED,
            };
            AllophoneDescriptor {
                id: id as u8,
                name: ALLOPHONE_NAMES[id],
                samples,
            }
        });
        Self { entries }
    }
}

impl<'a> AllophoneTable<'a> {
    /// Decode a parsed bank into `pool` and build the table over it.
    ///
    /// The bank must carry exactly [`ALLOPHONE_COUNT`] entries; a partial
    /// bank would surface later as `UnknownAllophone` mid-synthesis, so it
    /// is rejected here at startup instead.
    pub fn from_bank(bank: &AllophoneBank<'_>, pool: &'a mut [i8]) -> Result<Self, BankError> {
        if bank.entry_count() != ALLOPHONE_COUNT {
            return Err(BankError::WrongEntryCount);
        }

        let mut spans = [(0usize, 0usize); ALLOPHONE_COUNT];
        let mut used = 0usize;

        for id in 0..ALLOPHONE_COUNT {
            let written = bank.decode_into(id, &mut pool[used..])?;
            spans[id] = (used, written);
            used += written;
        }

        let pool: &'a [i8] = pool;
        let entries = core::array::from_fn(|id| {
            let (offset, len) = spans[id];
            AllophoneDescriptor {
                id: id as u8,
                name: ALLOPHONE_NAMES[id],
                samples: &pool[offset..offset + len],
            }
        });

        Ok(Self { entries })
    }

    /// Look up by id. O(1). `None` only for addresses above 63.
    #[inline]
    pub fn get(&self, id: u8) -> Option<&AllophoneDescriptor<'a>> {
        self.entries.get(id as usize)
    }

    /// Look up by mnemonic, case-insensitive. O(n) over 64 entries.
    pub fn by_name(&self, name: &str) -> Option<&AllophoneDescriptor<'a>> {
        self.entries
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
    }

    /// All entries in id order, for diagnostic listings.
    pub fn iter(&self) -> impl Iterator<Item = &AllophoneDescriptor<'a>> {
        self.entries.iter()
    }

    /// Total sample count across the table.
    pub fn total_samples(&self) -> usize {
        self.entries.iter().map(|entry| entry.len()).sum()
    }
}
