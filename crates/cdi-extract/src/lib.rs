//! # cdi-extract
//!
//! A read-only reader for CD-i track images: the raw sector engine, the
//! ISO-9660-derived volume structures CD-i layers on top of it, and a DYUV
//! still-image decoder. Writing images, EDC/ECC correction, ADPCM audio
//! decode, and the other CD-i video codecs (CLUT/RL/RGB555/QHY) are out of
//! scope; this crate gets you from a `.bin`/track image to files, MPEG
//! streams and decoded stills.
//!
//! ```no_run
//! use cdi_extract::volume::VolumeReader;
//! use std::fs::File;
//!
//! let file = File::open("disc.bin")?;
//! let mut volume = VolumeReader::open(file)?;
//! println!("volume: {}", volume.label.volume_id);
//! # Ok::<(), cdi_extract::error::CdiError>(())
//! ```

pub mod dyuv;
pub mod error;
pub mod extract;
pub mod sector;
pub mod sink;
pub mod util;
pub mod volume;

pub use error::{CdiError, Result};
