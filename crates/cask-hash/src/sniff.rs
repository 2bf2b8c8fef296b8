//! Media type detection from magic bytes.
//!
//! Only the leading bytes of a file are inspected (see
//! [`DEFAULT_SNIFF_WINDOW`](crate::DEFAULT_SNIFF_WINDOW)). Binary formats are
//! matched against fixed signatures; anything else is classified as
//! `text/plain` when it looks like UTF-8 text and
//! `application/octet-stream` otherwise.
//!
//! ZIP and ISO base media files are containers for many formats. For those
//! the window is inspected further: the ZIP local headers it covers (an
//! embedded `mimetype` entry, OOXML part names, a JAR manifest) and the
//! `ftyp` major brand. When the window is too short to tell, the generic
//! container type is reported and [`MediaTypeRules`](crate::MediaTypeRules)
//! decides whether it satisfies the declared type.

use cask_types::MediaType;

/// A set of byte runs that must all match at their offsets.
struct Signature {
    media_type: &'static str,
    parts: &'static [(usize, &'static [u8])],
}

impl Signature {
    fn matches(&self, head: &[u8]) -> bool {
        self.parts.iter().all(|(offset, bytes)| {
            head.get(*offset..offset + bytes.len())
                .is_some_and(|window| window == *bytes)
        })
    }
}

/// Ordered most-specific first: RIFF containers before anything shorter.
const SIGNATURES: &[Signature] = &[
    Signature { media_type: "image/webp", parts: &[(0, b"RIFF"), (8, b"WEBP")] },
    Signature { media_type: "audio/wav", parts: &[(0, b"RIFF"), (8, b"WAVE")] },
    Signature { media_type: "video/x-msvideo", parts: &[(0, b"RIFF"), (8, b"AVI ")] },
    Signature { media_type: "image/png", parts: &[(0, b"\x89PNG\r\n\x1a\n")] },
    Signature { media_type: "image/jpeg", parts: &[(0, b"\xff\xd8\xff")] },
    Signature { media_type: "image/gif", parts: &[(0, b"GIF87a")] },
    Signature { media_type: "image/gif", parts: &[(0, b"GIF89a")] },
    Signature { media_type: "image/tiff", parts: &[(0, b"II*\x00")] },
    Signature { media_type: "image/tiff", parts: &[(0, b"MM\x00*")] },
    Signature { media_type: "image/x-icon", parts: &[(0, b"\x00\x00\x01\x00")] },
    Signature { media_type: "image/bmp", parts: &[(0, b"BM")] },
    Signature { media_type: "application/pdf", parts: &[(0, b"%PDF-")] },
    Signature { media_type: "application/zip", parts: &[(0, b"PK\x03\x04")] },
    Signature { media_type: "application/zip", parts: &[(0, b"PK\x05\x06")] },
    Signature { media_type: "application/zip", parts: &[(0, b"PK\x07\x08")] },
    Signature { media_type: "application/gzip", parts: &[(0, b"\x1f\x8b")] },
    Signature { media_type: "application/x-7z-compressed", parts: &[(0, b"7z\xbc\xaf\x27\x1c")] },
    Signature { media_type: "application/x-rar-compressed", parts: &[(0, b"Rar!\x1a\x07")] },
    Signature { media_type: "application/x-tar", parts: &[(257, b"ustar")] },
    Signature { media_type: "application/x-sqlite3", parts: &[(0, b"SQLite format 3\x00")] },
    Signature { media_type: "application/wasm", parts: &[(0, b"\x00asm")] },
    Signature { media_type: "audio/mpeg", parts: &[(0, b"ID3")] },
    Signature { media_type: "audio/ogg", parts: &[(0, b"OggS")] },
    Signature { media_type: "audio/flac", parts: &[(0, b"fLaC")] },
    Signature { media_type: "video/mp4", parts: &[(4, b"ftyp")] },
    Signature { media_type: "video/webm", parts: &[(0, b"\x1a\x45\xdf\xa3")] },
];

/// Detect the media type of content from its leading bytes.
pub fn sniff(head: &[u8]) -> MediaType {
    if let Some(sig) = SIGNATURES.iter().find(|sig| sig.matches(head)) {
        let refined = match sig.media_type {
            "application/zip" => zip_subtype(head),
            "video/mp4" => iso_brand_type(head),
            _ => None,
        };
        return refined.unwrap_or_else(|| MediaType::from_static(sig.media_type));
    }
    if !looks_like_text(head) {
        return MediaType::octet_stream();
    }
    markup_type(head).unwrap_or_else(|| MediaType::from_static(MediaType::TEXT_PLAIN))
}

/// UTF-8 without NUL bytes. A multi-byte sequence cut off by the end of
/// the window still counts as text.
fn looks_like_text(head: &[u8]) -> bool {
    if head.contains(&0) {
        return false;
    }
    match std::str::from_utf8(head) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    }
}

const LOCAL_HEADER: &[u8] = b"PK\x03\x04";
const LOCAL_HEADER_LEN: usize = 30;

/// One ZIP local file header, as far as the window covers it.
struct ZipEntry<'a> {
    name: &'a [u8],
    /// Stored bytes of the entry, truncated to the window.
    data: &'a [u8],
}

fn le_u16(buf: &[u8], at: usize) -> Option<usize> {
    let b = buf.get(at..at + 2)?;
    Some(u16::from_le_bytes([b[0], b[1]]) as usize)
}

fn le_u32(buf: &[u8], at: usize) -> Option<usize> {
    let b = buf.get(at..at + 4)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
}

fn zip_entry_at(head: &[u8], at: usize) -> Option<ZipEntry<'_>> {
    let header = head.get(at..at + LOCAL_HEADER_LEN)?;
    if &header[..4] != LOCAL_HEADER {
        return None;
    }
    let compressed = le_u32(header, 18)?;
    let name_len = le_u16(header, 26)?;
    let extra_len = le_u16(header, 28)?;
    let name_start = at + LOCAL_HEADER_LEN;
    let name = head.get(name_start..name_start + name_len)?;
    let data_start = (name_start + name_len + extra_len).min(head.len());
    let data_end = data_start.saturating_add(compressed).min(head.len());
    Some(ZipEntry {
        name,
        data: &head[data_start..data_end],
    })
}

/// Every local header that starts inside the window.
fn zip_entries(head: &[u8]) -> impl Iterator<Item = ZipEntry<'_>> {
    head.windows(LOCAL_HEADER.len())
        .enumerate()
        .filter(|(_, w)| *w == LOCAL_HEADER)
        .filter_map(move |(at, _)| zip_entry_at(head, at))
}

fn zip_subtype(head: &[u8]) -> Option<MediaType> {
    let first = zip_entry_at(head, 0)?;
    match first.name {
        // ODF and EPUB store their media type uncompressed as the first entry.
        b"mimetype" => std::str::from_utf8(first.data)
            .ok()
            .and_then(|s| MediaType::parse(s.trim()).ok()),
        b"META-INF/MANIFEST.MF" | b"META-INF/" => {
            Some(MediaType::from_static("application/java-archive"))
        }
        _ => zip_entries(head).find_map(|entry| ooxml_type(entry.name)),
    }
}

fn ooxml_type(name: &[u8]) -> Option<MediaType> {
    const PARTS: &[(&[u8], &str)] = &[
        (
            b"word/",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ),
        (
            b"xl/",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ),
        (
            b"ppt/",
            "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        ),
    ];
    PARTS
        .iter()
        .find(|(prefix, _)| name.starts_with(prefix))
        .map(|(_, media_type)| MediaType::from_static(*media_type))
}

/// Media type named by the `ftyp` major brand. Unknown brands stay MP4.
fn iso_brand_type(head: &[u8]) -> Option<MediaType> {
    let brand = head.get(8..12)?;
    let media_type = match brand {
        b"qt  " => "video/quicktime",
        b"M4A " | b"M4B " => "audio/mp4",
        b"M4V " | b"M4VH" | b"M4VP" => "video/x-m4v",
        b"heic" | b"heix" | b"heim" | b"heis" => "image/heic",
        b"mif1" | b"msf1" => "image/heif",
        b"avif" | b"avis" => "image/avif",
        _ if brand.starts_with(b"3g2") => "video/3gpp2",
        _ if brand.starts_with(b"3g") => "video/3gpp",
        _ => return None,
    };
    Some(MediaType::from_static(media_type))
}

fn markup_type(head: &[u8]) -> Option<MediaType> {
    let start = head.iter().position(|b| !b.is_ascii_whitespace())?;
    let body = &head[start..];
    let prefix = |p: &[u8]| body.len() >= p.len() && body[..p.len()].eq_ignore_ascii_case(p);

    if prefix(b"<?xml") {
        Some(MediaType::from_static("text/xml"))
    } else if prefix(b"<!doctype html") || prefix(b"<html") {
        Some(MediaType::from_static("text/html"))
    } else {
        None
    }
}
