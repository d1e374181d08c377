pub use crate::codecs::{AudioBuffer, Codec, SampleFormat};
pub use anyhow::{Result as R, anyhow};
pub use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};

pub use memmap2::MmapOptions;
pub use rayon::prelude::*;
pub use std::io::{Cursor, Read, Seek, SeekFrom, Write};
