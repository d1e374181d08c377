//! ID3v1 trailers and ID3v2.3 headers: rendering, in-place tagging, and
//! stripping. Only the shapes this crate itself writes are supported for
//! stripping: ID3v2.3.0 with no flags set, and the 128-byte ID3v1.1 trailer.

use crate::prelude::*;
use std::path::Path;

// ID3v1
const ID3V1_IDENTIFIER: &[u8; 3] = b"TAG";
pub const ID3V1_TAG_LEN: usize = 128;
const V1_COMMENT_LEN: usize = 28; // v1.1 layout: zero byte + track follow
const V1_GENRE_NONE: u8 = 255;

// ID3v2, per the informal standard at https://id3.org/id3v2.3.0
const ID3V2_IDENTIFIER: &[u8; 3] = b"ID3";
pub const ID3V2_HEADER_LEN: usize = 10;
const ID3V2_FRAME_HEADER_LEN: usize = 10;
const SUPPORTED_ID3V2_MAJOR: u8 = 3;
const MAX_SYNCSAFE: usize = 0x0FFF_FFFF;

const COMMENT_FRAME_ID: &[u8; 4] = b"COMM";
const COMMENT_LANGUAGE: &[u8; 3] = b"eng";
const ENCODING_LATIN1: u8 = 0;

/// The fixed-size trailing tag block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Id3v1Tag {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: String,
    pub comment: String,
    pub track: u8,
    pub genre: u8,
}

impl Default for Id3v1Tag {
    fn default() -> Self {
        Self {
            title: String::new(),
            artist: String::new(),
            album: String::new(),
            year: String::new(),
            comment: String::new(),
            track: 0,
            genre: V1_GENRE_NONE,
        }
    }
}

impl Id3v1Tag {
    pub fn with_comment(comment: &str) -> Self {
        Self {
            comment: comment.to_string(),
            ..Self::default()
        }
    }

    /// Render the exact 128-byte trailer (ID3v1.1 layout).
    pub fn render(&self) -> [u8; ID3V1_TAG_LEN] {
        let mut block = [0u8; ID3V1_TAG_LEN];
        block[0..3].copy_from_slice(ID3V1_IDENTIFIER);
        put_fixed_field(&mut block[3..33], &self.title);
        put_fixed_field(&mut block[33..63], &self.artist);
        put_fixed_field(&mut block[63..93], &self.album);
        put_fixed_field(&mut block[93..97], &self.year);
        put_fixed_field(&mut block[97..125], &self.comment);
        block[125] = 0;
        block[126] = self.track;
        block[127] = self.genre;
        block
    }

    /// Parse a 128-byte trailer. `block` must start at the `TAG` marker.
    pub fn parse(block: &[u8]) -> R<Self> {
        if block.len() < ID3V1_TAG_LEN || &block[0..3] != ID3V1_IDENTIFIER {
            return Err(anyhow!("Not an ID3v1 tag block"));
        }

        // v1.1 reserves comment byte 28 as zero and byte 29 as track number
        let (comment_end, track) = if block[125] == 0 && block[126] != 0 {
            (125, block[126])
        } else {
            (127, 0)
        };

        Ok(Self {
            title: read_fixed_field(&block[3..33]),
            artist: read_fixed_field(&block[33..63]),
            album: read_fixed_field(&block[63..93]),
            year: read_fixed_field(&block[93..97]),
            comment: read_fixed_field(&block[97..comment_end]),
            track,
            genre: block[127],
        })
    }
}

/// Offset of the ID3v1 trailer, when present.
pub fn find_id3v1(data: &[u8]) -> Option<usize> {
    if data.len() >= ID3V1_TAG_LEN {
        let start = data.len() - ID3V1_TAG_LEN;
        if &data[start..start + 3] == ID3V1_IDENTIFIER {
            return Some(start);
        }
    }
    None
}

/// Parse the trailer of `data`, if one is present.
pub fn read_id3v1(data: &[u8]) -> R<Option<Id3v1Tag>> {
    match find_id3v1(data) {
        Some(start) => Ok(Some(Id3v1Tag::parse(&data[start..])?)),
        None => Ok(None),
    }
}

/// `data` without its ID3v1 trailer. Absence of a trailer is not an error.
pub fn strip_id3v1(data: &[u8]) -> &[u8] {
    match find_id3v1(data) {
        Some(start) => &data[..start],
        None => data,
    }
}

/// Append (or replace) the ID3v1 trailer of the file in place.
pub fn write_id3v1(path: &Path, tag: &Id3v1Tag) -> R<()> {
    let file = std::fs::File::open(path)?;
    let mapped_file = unsafe { MmapOptions::new().map(&file)? };

    let body = strip_id3v1(&mapped_file);
    let mut out = Vec::with_capacity(body.len() + ID3V1_TAG_LEN);
    out.extend_from_slice(body);
    out.extend_from_slice(&tag.render());

    drop(mapped_file);
    drop(file);
    crate::write_atomic(path, &out)
}

/// Parsed ID3v2 tag header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Id3v2Header {
    pub major_version: u8,
    pub revision: u8,
    pub unsynchronisation: bool,
    pub extended_header: bool,
    pub experimental: bool,
    /// Size of the tag body, excluding this 10-byte header.
    pub tag_size: usize,
}

impl Id3v2Header {
    /// Parse the header at the start of `data`. Errors when the `ID3`
    /// identifier is missing or the version/size bytes are malformed.
    pub fn parse(data: &[u8]) -> R<Self> {
        if data.len() < ID3V2_HEADER_LEN || &data[0..3] != ID3V2_IDENTIFIER {
            return Err(anyhow!("File does not contain an ID3v2 header"));
        }

        let major_version = data[3];
        let revision = data[4];
        if major_version == 0xFF || revision == 0xFF {
            return Err(anyhow!("Encountered an invalid ID3v2 version"));
        }

        let flags = data[5];
        // Only the top three flag bits are defined in v2.3
        let unsynchronisation = flags & 0x80 != 0;
        let extended_header = flags & 0x40 != 0;
        let experimental = flags & 0x20 != 0;

        // Syncsafe size: 4 bytes of 7 bits, most significant bit always 0.
        // "The ID3v2 tag size is the size of the complete tag after
        // unsynchronisation, including padding, excluding the header."
        let mut tag_size = 0usize;
        for &byte in &data[6..10] {
            if byte >= 0x80 {
                return Err(anyhow!("Encountered an invalid ID3v2 size"));
            }
            tag_size = (tag_size << 7) | byte as usize;
        }

        Ok(Self {
            major_version,
            revision,
            unsynchronisation,
            extended_header,
            experimental,
            tag_size,
        })
    }

    /// Header plus body length in bytes.
    pub fn total_len(&self) -> usize {
        ID3V2_HEADER_LEN + self.tag_size
    }

    fn any_flag_set(&self) -> bool {
        self.unsynchronisation || self.extended_header || self.experimental
    }
}

/// Whether `data` starts with an ID3v2 identifier.
pub fn has_id3v2(data: &[u8]) -> bool {
    data.len() >= ID3V2_HEADER_LEN && &data[0..3] == ID3V2_IDENTIFIER
}

/// A minimal ID3v2.3.0 tag: optional text frames plus one comment frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Id3v2Tag {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub comment: String,
}

impl Id3v2Tag {
    pub fn with_comment(comment: &str) -> Self {
        Self {
            comment: comment.to_string(),
            ..Self::default()
        }
    }

    /// Render the complete tag block: header, text frames for non-empty
    /// fields, and a COMM frame. No padding is written.
    pub fn render(&self) -> R<Vec<u8>> {
        let mut frames = Vec::new();

        for (id, value) in [
            (b"TIT2", &self.title),
            (b"TPE1", &self.artist),
            (b"TALB", &self.album),
        ] {
            if !value.is_empty() {
                write_text_frame(&mut frames, id, value)?;
            }
        }
        write_comment_frame(&mut frames, &self.comment)?;

        let mut out = Vec::with_capacity(ID3V2_HEADER_LEN + frames.len());
        out.extend_from_slice(ID3V2_IDENTIFIER);
        out.push(SUPPORTED_ID3V2_MAJOR);
        out.push(0); // revision
        out.push(0); // flags
        out.extend_from_slice(&syncsafe(frames.len())?);
        out.extend_from_slice(&frames);
        Ok(out)
    }
}

fn write_text_frame(out: &mut Vec<u8>, id: &[u8; 4], value: &str) -> R<()> {
    let content_len = 1 + value.len(); // encoding byte + text
    out.extend_from_slice(id);
    out.write_u32::<BigEndian>(content_len as u32)?;
    out.write_u16::<BigEndian>(0)?; // frame flags
    out.push(ENCODING_LATIN1);
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

fn write_comment_frame(out: &mut Vec<u8>, comment: &str) -> R<()> {
    // encoding byte + language + empty description terminator + text
    let content_len = 1 + COMMENT_LANGUAGE.len() + 1 + comment.len();
    out.extend_from_slice(COMMENT_FRAME_ID);
    out.write_u32::<BigEndian>(content_len as u32)?;
    out.write_u16::<BigEndian>(0)?; // frame flags
    out.push(ENCODING_LATIN1);
    out.extend_from_slice(COMMENT_LANGUAGE);
    out.push(0); // empty short description
    out.extend_from_slice(comment.as_bytes());
    Ok(())
}

fn syncsafe(size: usize) -> R<[u8; 4]> {
    if size > MAX_SYNCSAFE {
        return Err(anyhow!("ID3v2 tag body too large: {} bytes", size));
    }
    Ok([
        ((size >> 21) & 0x7F) as u8,
        ((size >> 14) & 0x7F) as u8,
        ((size >> 7) & 0x7F) as u8,
        (size & 0x7F) as u8,
    ])
}

/// `data` without its leading ID3v2 block. Errors when no ID3v2 header is
/// present, or when the tag is a shape this crate does not handle
/// (anything other than v2.3.0 with blank flags).
pub fn strip_id3v2(data: &[u8]) -> R<&[u8]> {
    let header = Id3v2Header::parse(data)?;

    if header.major_version != SUPPORTED_ID3V2_MAJOR {
        return Err(anyhow!(
            "Only ID3v2.{}.0 tags are currently supported (got ID3v2.{}.{})",
            SUPPORTED_ID3V2_MAJOR,
            header.major_version,
            header.revision
        ));
    }
    if header.any_flag_set() {
        return Err(anyhow!(
            "Only blank ID3v2 flags (no flags set) are currently supported"
        ));
    }
    if header.total_len() > data.len() {
        return Err(anyhow!("ID3v2 tag size exceeds the file size"));
    }

    Ok(&data[header.total_len()..])
}

/// Remove whichever legacy tag blocks are present; absence is not an error.
pub fn strip_tags(data: &[u8]) -> R<&[u8]> {
    let without_v2 = if has_id3v2(data) {
        strip_id3v2(data)?
    } else {
        data
    };
    Ok(strip_id3v1(without_v2))
}

/// Prepend (or replace) the ID3v2 block of the file in place.
pub fn write_id3v2(path: &Path, tag: &Id3v2Tag) -> R<()> {
    let file = std::fs::File::open(path)?;
    let mapped_file = unsafe { MmapOptions::new().map(&file)? };

    let body = if has_id3v2(&mapped_file) {
        strip_id3v2(&mapped_file)?
    } else {
        &mapped_file[..]
    };

    let rendered = tag.render()?;
    let mut out = Vec::with_capacity(rendered.len() + body.len());
    out.extend_from_slice(&rendered);
    out.extend_from_slice(body);

    drop(mapped_file);
    drop(file);
    crate::write_atomic(path, &out)
}

/// Extract the comment text of the first COMM frame in a leading ID3v2.3
/// block, if any.
pub fn read_id3v2_comment(data: &[u8]) -> R<Option<String>> {
    let header = Id3v2Header::parse(data)?;
    let body_end = header.total_len().min(data.len());
    let body = &data[ID3V2_HEADER_LEN..body_end];

    let mut offset = 0;
    while offset + ID3V2_FRAME_HEADER_LEN <= body.len() {
        let frame_id = &body[offset..offset + 4];
        if frame_id == [0, 0, 0, 0] {
            break; // padding
        }

        let frame_size = u32::from_be_bytes([
            body[offset + 4],
            body[offset + 5],
            body[offset + 6],
            body[offset + 7],
        ]) as usize;
        if frame_size == 0 || offset + ID3V2_FRAME_HEADER_LEN + frame_size > body.len() {
            break;
        }

        let frame_data =
            &body[offset + ID3V2_FRAME_HEADER_LEN..offset + ID3V2_FRAME_HEADER_LEN + frame_size];

        if frame_id == COMMENT_FRAME_ID && frame_data.len() > 4 {
            // Skip encoding byte and language, then the null-terminated
            // short description
            let mut text_start = 4;
            while text_start < frame_data.len() && frame_data[text_start] != 0 {
                text_start += 1;
            }
            text_start += 1;

            if text_start <= frame_data.len() {
                let text = String::from_utf8_lossy(&frame_data[text_start..])
                    .trim_end_matches('\0')
                    .to_string();
                return Ok(Some(text));
            }
        }

        offset += ID3V2_FRAME_HEADER_LEN + frame_size;
    }

    Ok(None)
}

fn put_fixed_field(slot: &mut [u8], value: &str) {
    let bytes = value.as_bytes();
    let len = bytes.len().min(slot.len());
    slot[..len].copy_from_slice(&bytes[..len]);
}

fn read_fixed_field(slot: &[u8]) -> String {
    String::from_utf8_lossy(slot)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}
