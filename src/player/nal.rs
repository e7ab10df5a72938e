use super::Decoder;
use anyhow::Result;
use std::collections::BTreeMap;

/// NAL unit type from the first header byte.
pub fn nal_type(nal: &[u8]) -> Option<u8> {
    nal.first().map(|header| header & 0x1f)
}

/// Short name of an H.264 NAL unit type.
pub fn nal_type_name(nal_type: u8) -> &'static str {
    match nal_type {
        1 => "slice",
        2..=4 => "slice partition",
        5 => "IDR slice",
        6 => "SEI",
        7 => "SPS",
        8 => "PPS",
        9 => "access unit delimiter",
        10 => "end of sequence",
        11 => "end of stream",
        12 => "filler",
        _ => "other",
    }
}

/// Decoder stand-in that tallies NAL unit types.
///
/// Coded slices (types 1 and 5) count as pictures.
#[derive(Debug, Default)]
pub struct NalCounter {
    counts: BTreeMap<u8, u64>,
    bytes: u64,
    pictures: u64,
}

impl NalCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Units seen per NAL type.
    pub fn counts(&self) -> &BTreeMap<u8, u64> {
        &self.counts
    }

    pub fn total_units(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Payload bytes submitted.
    pub fn total_bytes(&self) -> u64 {
        self.bytes
    }

    pub fn pictures(&self) -> u64 {
        self.pictures
    }
}

impl Decoder for NalCounter {
    fn decode(&mut self, nal: &[u8]) -> Result<bool> {
        let Some(nal_type) = nal_type(nal) else {
            anyhow::bail!("Empty NAL unit");
        };
        if nal[0] & 0x80 != 0 {
            tracing::warn!("NAL unit with forbidden_zero_bit set (type {})", nal_type);
        }

        *self.counts.entry(nal_type).or_default() += 1;
        self.bytes += nal.len() as u64;

        let picture = matches!(nal_type, 1 | 5);
        if picture {
            self.pictures += 1;
        }
        Ok(picture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_types_and_pictures() {
        let mut counter = NalCounter::new();
        assert!(!counter.decode(&[0x67, 0x64]).unwrap());
        assert!(!counter.decode(&[0x68, 0xEE]).unwrap());
        assert!(counter.decode(&[0x65, 0x88, 0x84]).unwrap());
        assert!(counter.decode(&[0x41, 0x9A]).unwrap());
        assert!(counter.decode(&[0x41, 0x9B]).unwrap());

        assert_eq!(counter.pictures(), 3);
        assert_eq!(counter.total_units(), 5);
        assert_eq!(counter.total_bytes(), 11);
        assert_eq!(counter.counts().get(&1), Some(&2));
        assert_eq!(counter.counts().get(&7), Some(&1));
    }

    #[test]
    fn test_empty_unit_is_an_error() {
        let mut counter = NalCounter::new();
        assert!(counter.decode(&[]).is_err());
        assert_eq!(counter.total_units(), 0);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(nal_type(&[0x65]), Some(5));
        assert_eq!(nal_type_name(5), "IDR slice");
        assert_eq!(nal_type_name(7), "SPS");
        assert_eq!(nal_type_name(31), "other");
    }
}
