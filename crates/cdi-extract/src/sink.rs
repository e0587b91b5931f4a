//! Output sinks: a file writer that cleans up partial output on failure,
//! and a per-channel splitter for interleaved real-time streams.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Write `data` to `path`, removing the file again if the write fails
/// partway through so callers never observe a truncated artifact.
pub fn write_file_atomically(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(path)?;
        file.write_all(data)?;
        file.flush()
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(path);
        return Err(e.into());
    }
    Ok(())
}

/// Accumulates sector payload bytes per (sub-stream) channel number, for
/// splitting a real-time MPEG extent into `audio_channel_N.mpeg` /
/// `video_channel_N.mpeg` files.
#[derive(Default)]
pub struct ChannelDemuxer {
    channels: HashMap<u8, Vec<u8>>,
}

impl ChannelDemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, channel: u8, payload: &[u8]) {
        self.channels.entry(channel).or_default().extend_from_slice(payload);
    }

    /// Write each accumulated channel to `dir/{kind}_channel_{n}.mpeg`.
    pub fn flush(&self, dir: &Path, kind: &str) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for (channel, data) in &self.channels {
            let path = dir.join(format!("{kind}_channel_{channel}.mpeg"));
            write_file_atomically(&path, data)?;
            written.push(path);
        }
        Ok(written)
    }
}

/// Encode an RGB8 buffer as a PNG file via the `image` crate.
pub fn write_png(path: &Path, width: u32, height: u32, rgb: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let result = image::save_buffer(path, rgb, width, height, image::ColorType::Rgb8);
    if let Err(e) = result {
        let _ = fs::remove_file(path);
        return Err(crate::error::CdiError::Corruption(format!("PNG encode failed: {e}")));
    }
    Ok(())
}
