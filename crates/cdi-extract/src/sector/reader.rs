use std::io::{Read, Seek, SeekFrom};

use super::classify::{CodingInfo, SubMode, VideoCoding};
use super::{FORM1_DATA_SIZE, FORM2_DATA_SIZE, HEADER_SIZE, SECTOR_SIZE, SUBHEADER_SIZE, SYNC_PATTERN};
use crate::error::{CdiError, Result};
use crate::util::{address_to_image_block, descramble};

/// One decoded sector: header fields plus the raw 2352-byte payload it was
/// parsed from.
#[derive(Clone)]
pub struct Sector {
    pub block: u32,
    pub mode: u8,
    pub file_number: u8,
    pub channel_number: u8,
    pub submode: SubMode,
    pub coding_info: CodingInfo,
    raw: Box<[u8; SECTOR_SIZE]>,
    data_offset: usize,
    data_len: usize,
}

impl Sector {
    pub fn parse(raw: [u8; SECTOR_SIZE]) -> Result<Self> {
        if raw[..SYNC_PATTERN.len()] != SYNC_PATTERN {
            return Err(CdiError::Corruption("sector sync pattern mismatch".into()));
        }

        let block = address_to_image_block(raw[12], raw[13], raw[14]);
        let mode = raw[15];

        let (file_number, channel_number, submode, coding_info, data_offset, data_len) = match mode
        {
            1 => (0, 0, SubMode::DATA, CodingInfo(0), HEADER_SIZE, FORM1_DATA_SIZE),
            2 => {
                let sub = &raw[HEADER_SIZE..HEADER_SIZE + SUBHEADER_SIZE];
                if sub[0..4] != sub[4..8] {
                    return Err(CdiError::Corruption(
                        "subheader copies disagree".into(),
                    ));
                }
                let submode = SubMode::from_bits_truncate(sub[2]);
                if !submode.is_valid() {
                    return Err(CdiError::Corruption("invalid submode bitmap".into()));
                }
                let data_offset = HEADER_SIZE + SUBHEADER_SIZE;
                let data_len = if submode.is_form2() {
                    FORM2_DATA_SIZE
                } else {
                    FORM1_DATA_SIZE
                };
                (sub[0], sub[1], submode, CodingInfo(sub[3]), data_offset, data_len)
            }
            other => {
                return Err(CdiError::Corruption(format!("unsupported sector mode {other}")))
            }
        };

        Ok(Sector {
            block,
            mode,
            file_number,
            channel_number,
            submode,
            coding_info,
            raw: Box::new(raw),
            data_offset,
            data_len,
        })
    }

    pub fn payload(&self) -> &[u8] {
        &self.raw[self.data_offset..self.data_offset + self.data_len]
    }

    pub fn raw(&self) -> &[u8; SECTOR_SIZE] {
        &self.raw
    }

    pub fn is_mode1(&self) -> bool {
        self.mode == 1
    }

    pub fn is_mode2(&self) -> bool {
        self.mode == 2
    }

    pub fn is_form1(&self) -> bool {
        !self.submode.is_form2()
    }

    pub fn is_form2(&self) -> bool {
        self.submode.is_form2()
    }

    pub fn is_eof(&self) -> bool {
        self.submode.is_eof()
    }

    pub fn is_eor(&self) -> bool {
        self.submode.is_eor()
    }

    pub fn is_video(&self) -> bool {
        self.submode.is_video()
    }

    pub fn is_audio(&self) -> bool {
        self.submode.is_audio()
    }

    /// A plain directory/path-table/file-data sector: Form 1, DATA submode.
    pub fn is_message(&self) -> bool {
        self.submode.is_data() && self.is_form1()
    }

    pub fn is_mpeg_audio(&self) -> bool {
        self.is_audio() && self.coding_info.is_mpeg_audio()
    }

    pub fn is_mpeg_video(&self) -> bool {
        self.is_video() && self.coding_info.video_coding() == VideoCoding::Mpeg
    }

    pub fn is_empty(&self) -> bool {
        self.payload().iter().all(|&b| b == 0)
    }

    pub fn is_valid(&self) -> bool {
        self.submode.is_valid()
    }
}

/// Stateful reader over a raw track image: locates the first sector sync
/// pattern once, then serves sectors sequentially or after an explicit
/// `seek_to_block`.
pub struct SectorReader<R> {
    inner: R,
    sync_offset: u64,
    failed: bool,
}

impl<R: Read + Seek> SectorReader<R> {
    pub fn new(mut inner: R) -> Result<Self> {
        let sync_offset = match Self::locate_first_sync(&mut inner) {
            Ok(offset) => offset,
            Err(e) => return Err(e),
        };
        Ok(SectorReader {
            inner,
            sync_offset,
            failed: false,
        })
    }

    fn locate_first_sync(inner: &mut R) -> Result<u64> {
        inner.seek(SeekFrom::Start(0))?;
        // Scan the first several sectors' worth of bytes for the sync
        // pattern; real track images keep it block-aligned from the start,
        // but we don't assume that here.
        let mut buf = vec![0u8; SECTOR_SIZE * 4];
        let mut total_read = 0usize;
        loop {
            let n = inner.read(&mut buf[total_read..])?;
            if n == 0 {
                break;
            }
            total_read += n;
            if total_read == buf.len() {
                break;
            }
        }
        buf.truncate(total_read);
        if buf.len() < SYNC_PATTERN.len() {
            return Err(CdiError::NotFound);
        }
        for offset in 0..=buf.len() - SYNC_PATTERN.len() {
            if buf[offset..offset + SYNC_PATTERN.len()] == SYNC_PATTERN {
                return Ok(offset as u64);
            }
        }
        Err(CdiError::NotFound)
    }

    /// Seek so that the next `fetch_next()` returns the sector at
    /// image-relative `block`. After this call,
    /// `fetch_next()?.block == block`.
    pub fn seek_to_block(&mut self, block: u32) -> Result<()> {
        let offset = self.sync_offset + (block as u64) * SECTOR_SIZE as u64;
        match self.inner.seek(SeekFrom::Start(offset)) {
            Ok(_) => Ok(()),
            Err(e) => {
                self.failed = true;
                Err(CdiError::Io(e))
            }
        }
    }

    pub fn fetch_next(&mut self) -> Result<Sector> {
        let mut buf = [0u8; SECTOR_SIZE];
        if let Err(e) = self.inner.read_exact(&mut buf) {
            self.failed = true;
            return Err(CdiError::Io(e));
        }
        descramble(&mut buf[12..]);
        match Sector::parse(buf) {
            Ok(sector) => Ok(sector),
            Err(e) => {
                self.failed = true;
                Err(e)
            }
        }
    }

    /// Set after any I/O or parse error, matching the documented intent
    /// (never cleared back to `false` by a failing operation).
    pub fn failed(&self) -> bool {
        self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::bcd_encode;
    use std::io::Cursor;

    fn make_mode1_sector(block_incl_pregap: u32) -> [u8; SECTOR_SIZE] {
        let mut raw = [0u8; SECTOR_SIZE];
        raw[..SYNC_PATTERN.len()].copy_from_slice(&SYNC_PATTERN);
        let frame = block_incl_pregap % 75;
        let total_sec = block_incl_pregap / 75;
        let sec = total_sec % 60;
        let min = total_sec / 60;
        raw[12] = bcd_encode(min);
        raw[13] = bcd_encode(sec);
        raw[14] = bcd_encode(frame);
        raw[15] = 1;
        raw
    }

    #[test]
    fn parse_mode1_header() {
        let raw = make_mode1_sector(150);
        let sector = Sector::parse(raw).unwrap();
        assert_eq!(sector.block, 0);
        assert!(sector.is_mode1());
        assert!(sector.is_form1());
    }

    fn scrambled(mut raw: [u8; SECTOR_SIZE]) -> [u8; SECTOR_SIZE] {
        descramble(&mut raw[12..]);
        raw
    }

    #[test]
    fn seek_then_fetch_round_trips_block_number() {
        let sectors: Vec<[u8; SECTOR_SIZE]> = (150..150 + 10)
            .map(make_mode1_sector)
            .map(scrambled)
            .collect();
        let mut bytes = Vec::new();
        for s in &sectors {
            bytes.extend_from_slice(s);
        }
        let mut reader = SectorReader::new(Cursor::new(bytes)).unwrap();
        reader.seek_to_block(5).unwrap();
        let sector = reader.fetch_next().unwrap();
        assert_eq!(sector.block, 5);
        assert!(!reader.failed());
    }

    #[test]
    fn fetch_past_end_sets_failed() {
        let raw = scrambled(make_mode1_sector(150));
        let mut reader = SectorReader::new(Cursor::new(raw.to_vec())).unwrap();
        reader.fetch_next().unwrap();
        assert!(reader.fetch_next().is_err());
        assert!(reader.failed());
    }
}
