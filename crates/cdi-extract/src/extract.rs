//! Extraction orchestrator: walks the catalog and drives the configured
//! output mode over every file it finds.

use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use crate::dyuv::{decode_dyuv, DyuvOptions};
use crate::error::Result;
use crate::sink::{write_file_atomically, write_png, ChannelDemuxer};
use crate::volume::{DirectoryEntry, PathTableEntry, VolumeReader};

/// What the orchestrator should do with each file it visits.
pub enum ExtractMode {
    /// Print `(disc_path, is_directory)` pairs only.
    List,
    /// Copy ordinary files' contents to `output_dir`, preserving structure.
    CopyFiles,
    /// Demux real-time MPEG streams into per-channel files under
    /// `<name>.MEDIA/{audio,video}_channel_<n>.mpeg`.
    ExtractMpeg,
    /// Decode DYUV-coded sectors into PNGs.
    ExtractDyuv(DyuvOptions),
}

#[derive(Debug, Default, Clone)]
pub struct ExtractionStats {
    pub files_visited: usize,
    pub files_written: usize,
    pub errors: usize,
}

/// Called once per visited disc path; returning `false` stops the walk.
pub type ProgressCallback<'a> = dyn FnMut(&str) -> bool + 'a;

pub fn run<R: Read + Seek>(
    volume: &mut VolumeReader<R>,
    output_dir: &Path,
    mode: &ExtractMode,
    mut on_progress: Option<&mut ProgressCallback<'_>>,
) -> Result<ExtractionStats> {
    let mut stats = ExtractionStats::default();
    let root = volume
        .catalog
        .lookup("/")
        .cloned()
        .unwrap_or(PathTableEntry {
            name: String::new(),
            directory_address: 0,
            parent_directory_number: 1,
        });

    // Every extracted artifact is rooted under the disc's own volume id so
    // output from different images never collides in the same directory.
    let volume_root = output_dir.join(&volume.label.volume_id);

    walk_directory(volume, &root, "", &volume_root, mode, &mut stats, &mut on_progress)?;
    Ok(stats)
}

fn walk_directory<R: Read + Seek>(
    volume: &mut VolumeReader<R>,
    dir: &PathTableEntry,
    prefix: &str,
    output_dir: &Path,
    mode: &ExtractMode,
    stats: &mut ExtractionStats,
    on_progress: &mut Option<&mut ProgressCallback<'_>>,
) -> Result<()> {
    let entries = volume.read_directory(dir)?;
    for entry in entries {
        let disc_path = format!("{prefix}/{}", entry.name);
        stats.files_visited += 1;

        if let Some(cb) = on_progress.as_deref_mut() {
            if !cb(&disc_path) {
                return Ok(());
            }
        }

        if entry.is_directory() {
            if let Some(sub) = volume.catalog.lookup(&disc_path).cloned() {
                walk_directory(volume, &sub, &disc_path, output_dir, mode, stats, on_progress)?;
            }
            continue;
        }

        match mode {
            ExtractMode::List => {}
            ExtractMode::CopyFiles => {
                if !entry.is_directory() {
                    match copy_file(volume, &entry, &disc_path, output_dir) {
                        Ok(()) => stats.files_written += 1,
                        Err(e) => {
                            tracing::warn!(path = %disc_path, error = %e, "failed to copy file");
                            stats.errors += 1;
                        }
                    }
                }
            }
            ExtractMode::ExtractMpeg => {
                if entry.ex.file_number != 0 || volume_entry_is_realtime(volume, &entry)? {
                    match extract_mpeg(volume, &entry, &disc_path, output_dir) {
                        Ok(n) => stats.files_written += n,
                        Err(e) => {
                            tracing::warn!(path = %disc_path, error = %e, "failed to demux mpeg");
                            stats.errors += 1;
                        }
                    }
                }
            }
            ExtractMode::ExtractDyuv(opts) => {
                match extract_dyuv(volume, &entry, &disc_path, output_dir, opts) {
                    Ok(true) => stats.files_written += 1,
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(path = %disc_path, error = %e, "failed to decode dyuv");
                        stats.errors += 1;
                    }
                }
            }
        }
    }
    Ok(())
}

fn volume_entry_is_realtime<R: Read + Seek>(
    volume: &mut VolumeReader<R>,
    entry: &DirectoryEntry,
) -> Result<bool> {
    let mut found = false;
    volume.scan_file(entry, |sector| {
        if sector.submode.is_real_time() {
            found = true;
        }
        !found
    })?;
    Ok(found)
}

fn copy_file<R: Read + Seek>(
    volume: &mut VolumeReader<R>,
    entry: &DirectoryEntry,
    disc_path: &str,
    output_dir: &Path,
) -> Result<()> {
    let data = volume.read_file(entry)?;
    let out_path = output_dir.join(disc_path.trim_start_matches('/'));
    write_file_atomically(&out_path, &data)
}

fn extract_mpeg<R: Read + Seek>(
    volume: &mut VolumeReader<R>,
    entry: &DirectoryEntry,
    disc_path: &str,
    output_dir: &Path,
) -> Result<usize> {
    let mut audio = ChannelDemuxer::new();
    let mut video = ChannelDemuxer::new();

    volume.scan_file(entry, |sector| {
        if sector.is_mpeg_audio() {
            audio.push(sector.channel_number, sector.payload());
        } else if sector.is_mpeg_video() {
            video.push(sector.channel_number, sector.payload());
        }
        true
    })?;

    let name = Path::new(disc_path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "STREAM".to_string());
    let media_dir = output_dir.join(format!("{name}.MEDIA"));

    let mut written = audio.flush(&media_dir, "audio")?;
    written.extend(video.flush(&media_dir, "video")?);
    Ok(written.len())
}

fn extract_dyuv<R: Read + Seek>(
    volume: &mut VolumeReader<R>,
    entry: &DirectoryEntry,
    disc_path: &str,
    output_dir: &Path,
    opts: &DyuvOptions,
) -> Result<bool> {
    let mut payload = Vec::new();
    let mut any_dyuv = false;
    volume.scan_file(entry, |sector| {
        if sector.is_video()
            && sector.coding_info.video_coding() == crate::sector::VideoCoding::Dyuv
        {
            any_dyuv = true;
            payload.extend_from_slice(sector.payload());
        }
        true
    })?;

    if !any_dyuv {
        return Ok(false);
    }

    let rgb = decode_dyuv(&payload, opts);
    let out_path = output_dir
        .join(disc_path.trim_start_matches('/'))
        .with_extension("png");
    write_png(&out_path, opts.size.width, opts.size.height, &rgb)?;
    Ok(true)
}
