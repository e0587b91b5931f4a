//! Submode bitmap and coding-info interpretation.

use bitflags::bitflags;

bitflags! {
    /// The submode byte carried (twice, redundantly) in a Mode 2 subheader.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SubMode: u8 {
        const END_OF_RECORD = 0x01;
        const VIDEO         = 0x02;
        const AUDIO         = 0x04;
        const DATA          = 0x08;
        const TRIGGER       = 0x10;
        const FORM2         = 0x20;
        const REAL_TIME     = 0x40;
        const END_OF_FILE   = 0x80;
    }
}

impl SubMode {
    pub fn is_form2(self) -> bool {
        self.contains(SubMode::FORM2)
    }

    pub fn is_eof(self) -> bool {
        self.contains(SubMode::END_OF_FILE)
    }

    pub fn is_eor(self) -> bool {
        self.contains(SubMode::END_OF_RECORD)
    }

    pub fn is_video(self) -> bool {
        self.contains(SubMode::VIDEO)
    }

    pub fn is_audio(self) -> bool {
        self.contains(SubMode::AUDIO)
    }

    pub fn is_data(self) -> bool {
        self.contains(SubMode::DATA)
    }

    pub fn is_real_time(self) -> bool {
        self.contains(SubMode::REAL_TIME)
    }

    /// At most one of VIDEO/AUDIO/DATA should be set.
    pub fn is_valid(self) -> bool {
        let kind_bits = (self & (SubMode::VIDEO | SubMode::AUDIO | SubMode::DATA)).bits();
        kind_bits.count_ones() <= 1
    }
}

/// Video coding method named by the low nibble of a video sector's coding
/// info byte. `Mpeg` is signalled by the full byte being `0x0F`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCoding {
    Clut4,
    Clut7,
    Clut8,
    Rl3,
    Rl7,
    Dyuv,
    Rgb555L,
    Rgb555U,
    Qhy,
    Mpeg,
    Reserved(u8),
}

impl VideoCoding {
    pub fn from_nibble(n: u8) -> Self {
        match n & 0x0F {
            0x00 => VideoCoding::Clut4,
            0x01 => VideoCoding::Clut7,
            0x02 => VideoCoding::Clut8,
            0x03 => VideoCoding::Rl3,
            0x04 => VideoCoding::Rl7,
            0x05 => VideoCoding::Dyuv,
            0x06 => VideoCoding::Rgb555L,
            0x07 => VideoCoding::Rgb555U,
            0x08 => VideoCoding::Qhy,
            0x0F => VideoCoding::Mpeg,
            other => VideoCoding::Reserved(other),
        }
    }
}

/// Decoded view of a sector's coding-info byte. The same byte means
/// different things for audio and video sectors; callers pick the
/// interpretation based on `SubMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodingInfo(pub u8);

impl CodingInfo {
    pub fn video_coding(self) -> VideoCoding {
        if self.0 == 0x0F {
            VideoCoding::Mpeg
        } else {
            VideoCoding::from_nibble(self.0)
        }
    }

    pub fn is_mpeg_audio(self) -> bool {
        self.0 == 0x7F
    }

    pub fn is_stereo(self) -> bool {
        self.0 & 0x01 != 0
    }

    /// `true` for 18.9 kHz, `false` for 37.8 kHz.
    pub fn is_half_sample_rate(self) -> bool {
        self.0 & 0x04 != 0
    }

    /// `true` for 4-bit ADPCM level B, `false` for 8-bit level A.
    pub fn is_4bit(self) -> bool {
        self.0 & 0x10 == 0
    }

    pub fn has_emphasis(self) -> bool {
        self.0 & 0x40 != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submode_rejects_multiple_kinds() {
        let bad = SubMode::VIDEO | SubMode::AUDIO;
        assert!(!bad.is_valid());
        assert!(SubMode::VIDEO.is_valid());
    }

    #[test]
    fn video_coding_maps_dyuv_and_mpeg() {
        assert_eq!(CodingInfo(0x05).video_coding(), VideoCoding::Dyuv);
        assert_eq!(CodingInfo(0x0F).video_coding(), VideoCoding::Mpeg);
    }

    #[test]
    fn audio_coding_flags() {
        let ci = CodingInfo(0x7F);
        assert!(ci.is_mpeg_audio());
        let stereo_8bit = CodingInfo(0x01);
        assert!(stereo_8bit.is_stereo());
        assert!(stereo_8bit.is_4bit());
    }
}
