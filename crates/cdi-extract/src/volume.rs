//! CD-i's ISO-9660-derived volume structures: disc label, path table,
//! directory entries, and the absolute-path catalog built from them.

use std::collections::HashMap;
use std::io::{Read, Seek};

use crate::error::{CdiError, Result};
use crate::sector::{SectorReader, FORM1_DATA_SIZE};
use crate::util::read_be_u32;

/// Block holding the primary volume descriptor, a CD-i convention.
const DISC_LABEL_BLOCK: u32 = 16;

const RECORD_TYPE_PRIMARY: u8 = 1;
const RECORD_TYPE_TERMINATOR: u8 = 255;

#[derive(Debug, Clone)]
pub struct DiscLabel {
    pub record_type: u8,
    pub volume_id: String,
    pub path_table_size: u32,
    pub path_table_address: u32,
}

impl DiscLabel {
    fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < FORM1_DATA_SIZE {
            return Err(CdiError::Corruption("disc label sector too short".into()));
        }
        let record_type = data[0];
        if record_type != RECORD_TYPE_PRIMARY && record_type != RECORD_TYPE_TERMINATOR {
            return Err(CdiError::Corruption(format!(
                "unexpected disc label record type {record_type}"
            )));
        }
        let volume_id = String::from_utf8_lossy(&data[40..72]).trim_end().to_string();
        let path_table_size = read_be_u32(data[136..140].try_into().unwrap());
        let path_table_address = read_be_u32(data[148..152].try_into().unwrap());
        Ok(DiscLabel {
            record_type,
            volume_id,
            path_table_size,
            path_table_address,
        })
    }

    pub fn is_terminator(&self) -> bool {
        self.record_type == RECORD_TYPE_TERMINATOR
    }
}

/// One fixed-size entry of the (big-endian) path table.
#[derive(Debug, Clone)]
pub struct PathTableEntry {
    pub name: String,
    pub directory_address: u32,
    pub parent_directory_number: u16,
}

/// Extended record CD-i appends after each directory entry's name: 8 bytes
/// of owner id, file attributes, a reserved byte, and the file number.
#[derive(Debug, Clone, Copy)]
pub struct DirectoryEntryEx {
    pub owner_id: u32,
    pub file_attr: u16,
    pub file_number: u8,
}

impl DirectoryEntryEx {
    pub fn is_directory(&self) -> bool {
        self.file_attr & 0x80 != 0
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    pub name: String,
    pub extent_block: u32,
    pub extent_length: u32,
    pub ex: DirectoryEntryEx,
}

impl DirectoryEntry {
    pub fn is_directory(&self) -> bool {
        self.ex.is_directory()
    }
}

/// Maps absolute disc paths (e.g. `/A/B.DAT`) to their path-table entry,
/// built by walking entries in on-disc emission order and resolving each
/// entry's parent via `parent_directory_number`.
#[derive(Debug, Default)]
pub struct Catalog {
    by_path: HashMap<String, PathTableEntry>,
}

impl Catalog {
    fn build(entries: &[PathTableEntry]) -> Self {
        // Path-table entry 1 (1-based) is always the root; its name is
        // empty/NUL and its own parent number is 1.
        let mut paths = vec![String::new(); entries.len() + 1];
        if !entries.is_empty() {
            paths[1] = "/".to_string();
        }
        for (i, entry) in entries.iter().enumerate() {
            let number = i + 1;
            if number == 1 {
                continue;
            }
            let parent = entry.parent_directory_number as usize;
            let parent_path = paths.get(parent).cloned().unwrap_or_default();
            let full = if parent_path == "/" {
                format!("/{}", entry.name)
            } else {
                format!("{parent_path}/{}", entry.name)
            };
            paths[number] = full;
        }

        let mut by_path = HashMap::new();
        for (i, entry) in entries.iter().enumerate() {
            let number = i + 1;
            if let Some(path) = paths.get(number) {
                by_path.insert(path.clone(), entry.clone());
            }
        }
        Catalog { by_path }
    }

    pub fn lookup(&self, path: &str) -> Option<&PathTableEntry> {
        self.by_path.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.by_path.keys().map(|s| s.as_str())
    }
}

/// Reads the volume structures (disc label, path table, directories) and
/// individual files out of a CD-i track image.
pub struct VolumeReader<R> {
    reader: SectorReader<R>,
    pub label: DiscLabel,
    pub catalog: Catalog,
    path_table: Vec<PathTableEntry>,
}

impl<R: Read + Seek> VolumeReader<R> {
    pub fn open(inner: R) -> Result<Self> {
        let mut reader = SectorReader::new(inner)?;

        reader.seek_to_block(DISC_LABEL_BLOCK)?;

        // The label set is a run of Form 1 data sectors starting at
        // DISC_LABEL_BLOCK: zero or more non-primary descriptors, the
        // primary descriptor, and a terminator (255). Read until the
        // terminator, keeping the first primary descriptor we see.
        let mut primary = None;
        loop {
            let sector = reader.fetch_next()?;
            if !sector.is_message() {
                return Err(CdiError::Corruption(
                    "expected a Form 1 data sector while scanning for the disc label".into(),
                ));
            }
            let label = DiscLabel::parse(sector.payload())?;
            let is_terminator = label.is_terminator();
            if label.record_type == RECORD_TYPE_PRIMARY && primary.is_none() {
                primary = Some(label);
            }
            if is_terminator {
                break;
            }
        }
        let label = primary
            .ok_or_else(|| CdiError::Corruption("no primary disc label found".into()))?;
        tracing::info!(volume_id = %label.volume_id, "parsed disc label");

        let path_table = Self::read_path_table(&mut reader, &label)?;
        tracing::info!(entries = path_table.len(), "parsed path table");
        let catalog = Catalog::build(&path_table);

        Ok(VolumeReader {
            reader,
            label,
            catalog,
            path_table,
        })
    }

    fn read_path_table(
        reader: &mut SectorReader<R>,
        label: &DiscLabel,
    ) -> Result<Vec<PathTableEntry>> {
        let raw = Self::read_sectors_from(
            reader,
            label.path_table_address,
            label.path_table_size as usize,
        )?;

        let mut entries = Vec::new();
        let mut offset = 0usize;
        while offset + 8 <= raw.len() {
            let name_len = raw[offset] as usize;
            if name_len == 0 {
                break;
            }
            let ext_attr_len = raw[offset + 1];
            let _ = ext_attr_len;
            let directory_address = read_be_u32(raw[offset + 2..offset + 6].try_into().unwrap());
            let parent_directory_number =
                u16::from_be_bytes(raw[offset + 6..offset + 8].try_into().unwrap());
            let name_start = offset + 8;
            let name_end = name_start + name_len;
            if name_end > raw.len() {
                return Err(CdiError::Corruption("path table entry overruns extent".into()));
            }
            let name = String::from_utf8_lossy(&raw[name_start..name_end]).to_string();
            let padded_len = name_len + (name_len % 2);
            offset = name_end + (padded_len - name_len);

            entries.push(PathTableEntry {
                name,
                directory_address,
                parent_directory_number,
            });
        }
        Ok(entries)
    }

    /// Read `byte_len` bytes starting at `start_block`, concatenating Form 1
    /// sector payloads (2048 bytes each) sequentially.
    fn read_sectors_from(
        reader: &mut SectorReader<R>,
        start_block: u32,
        byte_len: usize,
    ) -> Result<Vec<u8>> {
        reader.seek_to_block(start_block)?;
        let mut out = Vec::with_capacity(byte_len);
        while out.len() < byte_len {
            let sector = reader.fetch_next()?;
            let remaining = byte_len - out.len();
            let take = remaining.min(sector.payload().len());
            out.extend_from_slice(&sector.payload()[..take]);
        }
        Ok(out)
    }

    /// List the directory entries directly under `dir_entry`.
    ///
    /// The directory's own byte length isn't in the path table; it lives in
    /// the directory's own self-referencing (`.`) record, which is always
    /// the first record of the first sector of its extent.
    pub fn read_directory(&mut self, dir_entry: &PathTableEntry) -> Result<Vec<DirectoryEntry>> {
        self.reader.seek_to_block(dir_entry.directory_address)?;

        let first_sector = self.reader.fetch_next()?;
        let first_record_len = first_sector.payload()[0] as usize;
        let self_entry = parse_directory_entry(&first_sector.payload()[..first_record_len])?;
        let total_len = self_entry.extent_length as usize;

        let mut raw = Vec::with_capacity(total_len);
        raw.extend_from_slice(first_sector.payload());
        while raw.len() < total_len {
            let sector = self.reader.fetch_next()?;
            raw.extend_from_slice(sector.payload());
        }
        raw.truncate(total_len);

        let mut entries = Vec::new();
        let mut offset = 0usize;
        while offset < raw.len() {
            let record_len = raw[offset] as usize;
            if record_len == 0 {
                // Directory records never span a sector boundary; a zero
                // byte marks unused space at the end of one.
                let next = (offset / FORM1_DATA_SIZE + 1) * FORM1_DATA_SIZE;
                if next <= offset || next > raw.len() {
                    break;
                }
                offset = next;
                continue;
            }
            let record = &raw[offset..offset + record_len];
            let entry = parse_directory_entry(record)?;
            if entry.name != "\u{0}" && entry.name != "\u{1}" {
                entries.push(entry);
            }
            offset += record_len;
        }

        Ok(entries)
    }

    /// Read an entire file's contents, demultiplexing interleaved sectors
    /// by `file_number` when the file occupies a shared extent (e.g. real
    /// time MPEG streams sharing a directory's address range). A
    /// `file_number` of `0` disables filtering (every sector in range is
    /// taken).
    pub fn read_file(&mut self, entry: &DirectoryEntry) -> Result<Vec<u8>> {
        self.reader.seek_to_block(entry.extent_block)?;
        let mut out = Vec::with_capacity(entry.extent_length as usize);
        let filter_file_number = entry.ex.file_number;

        loop {
            let sector = self.reader.fetch_next()?;
            let matches = filter_file_number == 0 || sector.file_number == filter_file_number;
            if matches {
                out.extend_from_slice(sector.payload());
            }
            if sector.is_eof() && matches {
                break;
            }
            if out.len() as u32 >= entry.extent_length && matches {
                break;
            }
        }
        out.truncate(entry.extent_length as usize);
        Ok(out)
    }

    /// Stream the raw sectors of a file (rather than just its payload
    /// bytes), used by the extraction orchestrator for MPEG and DYUV
    /// channel demuxing where submode/coding-info must be inspected.
    pub fn scan_file<F: FnMut(&crate::sector::Sector) -> bool>(
        &mut self,
        entry: &DirectoryEntry,
        mut visit: F,
    ) -> Result<()> {
        self.reader.seek_to_block(entry.extent_block)?;
        loop {
            let sector = self.reader.fetch_next()?;
            let keep_going = visit(&sector);
            if !keep_going || sector.is_eof() {
                break;
            }
        }
        Ok(())
    }

    pub fn path_table(&self) -> &[PathTableEntry] {
        &self.path_table
    }
}

/// Parse one fixed-prefix directory entry plus its CD-i extended record.
/// The extended record's offset is computed with this crate's own padding
/// convention (`name_len` rounds up to even by adding a pad byte when
/// `name_len` is *odd*... except CD-i inverts the usual ISO-9660 rule: the
/// pad byte is present when `name_len` is even, not odd). That inversion is
/// preserved verbatim here rather than "corrected" to the ISO-9660 norm.
fn parse_directory_entry(record: &[u8]) -> Result<DirectoryEntry> {
    const FIXED_PREFIX: usize = 33;
    if record.len() < FIXED_PREFIX {
        return Err(CdiError::Corruption("directory record too short".into()));
    }
    let extent_block = read_be_u32(record[6..10].try_into().unwrap());
    let extent_length = read_be_u32(record[14..18].try_into().unwrap());
    let name_len = record[32] as usize;
    let name_start = FIXED_PREFIX;
    let name_end = name_start + name_len;
    if name_end > record.len() {
        return Err(CdiError::Corruption("directory record name overruns record".into()));
    }
    let raw_name = &record[name_start..name_end];
    let name = if raw_name == [0] {
        "\u{0}".to_string()
    } else if raw_name == [1] {
        "\u{1}".to_string()
    } else {
        strip_version_suffix(&String::from_utf8_lossy(raw_name))
    };

    // Preserved verbatim: pad byte present when name_len is even.
    let ex_offset = FIXED_PREFIX + name_len + if name_len % 2 == 0 { 1 } else { 0 };
    if ex_offset + 8 > record.len() {
        return Err(CdiError::Corruption(
            "directory record extended fields overrun record".into(),
        ));
    }
    let owner_id = read_be_u32(record[ex_offset..ex_offset + 4].try_into().unwrap());
    let file_attr = u16::from_be_bytes(record[ex_offset + 4..ex_offset + 6].try_into().unwrap());
    // record[ex_offset + 6] is reserved.
    let file_number = record[ex_offset + 7];

    Ok(DirectoryEntry {
        name,
        extent_block,
        extent_length,
        ex: DirectoryEntryEx {
            owner_id,
            file_attr,
            file_number,
        },
    })
}

/// Strip the `;1` version suffix ISO-9660 file identifiers carry.
fn strip_version_suffix(name: &str) -> String {
    match name.rfind(';') {
        Some(idx) => name[..idx].to_string(),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_suffix_is_stripped() {
        assert_eq!(strip_version_suffix("A B ;1"), "A B ");
        assert_eq!(strip_version_suffix("A;1"), "A");
        assert_eq!(strip_version_suffix("A"), "A");
    }

    #[test]
    fn catalog_keys_by_absolute_path() {
        let entries = vec![
            PathTableEntry {
                name: String::new(),
                directory_address: 100,
                parent_directory_number: 1,
            },
            PathTableEntry {
                name: "SUBDIR".to_string(),
                directory_address: 200,
                parent_directory_number: 1,
            },
            PathTableEntry {
                name: "NESTED".to_string(),
                directory_address: 300,
                parent_directory_number: 2,
            },
        ];
        let catalog = Catalog::build(&entries);
        assert!(catalog.contains("/SUBDIR"));
        assert!(catalog.contains("/SUBDIR/NESTED"));
    }
}
