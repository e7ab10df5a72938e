/// Four-character box type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub const FTYP: Self = Self(*b"ftyp");
    pub const MOOV: Self = Self(*b"moov");
    pub const MVHD: Self = Self(*b"mvhd");
    pub const TRAK: Self = Self(*b"trak");
    pub const TKHD: Self = Self(*b"tkhd");
    pub const MDIA: Self = Self(*b"mdia");
    pub const MDHD: Self = Self(*b"mdhd");
    pub const HDLR: Self = Self(*b"hdlr");
    pub const MINF: Self = Self(*b"minf");
    pub const STBL: Self = Self(*b"stbl");
    pub const STSD: Self = Self(*b"stsd");
    pub const AVC1: Self = Self(*b"avc1");
    pub const MP4A: Self = Self(*b"mp4a");
    pub const ESDS: Self = Self(*b"esds");
    pub const AVCC: Self = Self(*b"avcC");
    pub const BTRT: Self = Self(*b"btrt");
    pub const STTS: Self = Self(*b"stts");
    pub const STSS: Self = Self(*b"stss");
    pub const STSC: Self = Self(*b"stsc");
    pub const STSZ: Self = Self(*b"stsz");
    pub const STCO: Self = Self(*b"stco");
    pub const SMHD: Self = Self(*b"smhd");
    pub const MDAT: Self = Self(*b"mdat");

    /// Handler types.
    pub const VIDE: Self = Self(*b"vide");
    pub const SOUN: Self = Self(*b"soun");

    /// Get the 4-char code as a string.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }

    /// Human readable name of the box kinds the parser decodes.
    pub fn description(&self) -> Option<&'static str> {
        let name = match &self.0 {
            b"ftyp" => "File Type Box",
            b"moov" => "Movie Box",
            b"mvhd" => "Movie Header Box",
            b"trak" => "Track Box",
            b"tkhd" => "Track Header Box",
            b"mdia" => "Media Box",
            b"mdhd" => "Media Header Box",
            b"hdlr" => "Handler Reference Box",
            b"minf" => "Media Information Box",
            b"stbl" => "Sample Table Box",
            b"stsd" => "Sample Description Box",
            b"avc1" => "AVC Sample Entry",
            b"mp4a" => "MPEG-4 Audio Sample Entry",
            b"esds" => "Elementary Stream Descriptor",
            b"avcC" => "AVC Configuration Box",
            b"btrt" => "Bit Rate Box",
            b"stts" => "Decoding Time to Sample Box",
            b"stss" => "Sync Sample Box",
            b"stsc" => "Sample to Chunk Box",
            b"stsz" => "Sample Size Box",
            b"stco" => "Chunk Offset Box",
            b"smhd" => "Sound Media Header Box",
            b"mdat" => "Media Data Box",
            _ => return None,
        };
        Some(name)
    }
}

impl std::fmt::Display for FourCc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&[u8; 4]> for FourCc {
    fn from(bytes: &[u8; 4]) -> Self {
        Self(*bytes)
    }
}

#[cfg(feature = "serialize")]
impl serde::Serialize for FourCc {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_description() {
        assert_eq!(FourCc::STSC.to_string(), "stsc");
        assert_eq!(FourCc::AVCC.description(), Some("AVC Configuration Box"));
        assert_eq!(FourCc(*b"free").description(), None);
        assert_eq!(FourCc([0xA9, b'n', b'a', b'm']).as_str(), "????");
    }
}
