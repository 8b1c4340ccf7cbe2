//! Program image loading.
//!
//! An image is a sequence of big-endian 16-bit words. The first word is
//! the origin; the rest are stored from the origin upward:
//!
//! ```text
//! +--------+--------+--------+-----
//! | origin | word 0 | word 1 | ...      word i -> mem[origin + i]
//! +--------+--------+--------+-----
//! ```
//!
//! Reading stops at `0xFFFF`; anything after that in the source is left
//! unread. A trailing odd byte is dropped. Byte order is fixed, so the same file loads identically on any
//! host.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ReadBytesExt};
use thiserror::Error;

use crate::device::memory::Memory;
use crate::device::memory_map::MEMORY_MAX;

/// Errors from loading an image.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The image file could not be opened.
    #[error("cannot open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading the image failed partway.
    #[error("read failed: {0}")]
    Read(#[from] io::Error),

    /// The image is shorter than one word.
    #[error("image has no origin word")]
    MissingOrigin,
}

/// Summary of a loaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedImage {
    /// Address of the first program word.
    pub origin: u16,
    /// Program words stored.
    pub words: usize,
    /// The image continued past the memory ceiling.
    pub truncated: bool,
}

/// Load the image at `path` into `mem`.
pub fn load_file(path: impl AsRef<Path>, mem: &mut Memory) -> Result<LoadedImage, LoadError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let image = load_reader(BufReader::new(file), mem)?;
    log::info!(
        "loaded {}: {} words at 0x{:04X}",
        path.display(),
        image.words,
        image.origin
    );
    Ok(image)
}

/// Load an image from any reader.
pub fn load_reader<R: Read>(mut reader: R, mem: &mut Memory) -> Result<LoadedImage, LoadError> {
    let origin = match reader.read_u16::<BigEndian>() {
        Ok(origin) => origin,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(LoadError::MissingOrigin),
        Err(e) => return Err(e.into()),
    };

    let room = MEMORY_MAX - origin as usize;
    let mut words = Vec::new();
    while words.len() < room {
        match reader.read_u16::<BigEndian>() {
            Ok(word) => words.push(word),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
    }

    // Peek one word past the ceiling; the rest of the source is never read.
    let truncated = words.len() == room
        && match reader.read_u16::<BigEndian>() {
            Ok(_) => true,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => false,
            Err(e) => return Err(e.into()),
        };
    if truncated {
        log::warn!(
            "image at 0x{:04X} runs past the top of memory, remainder ignored",
            origin
        );
    }

    let stored = mem.load_at(origin, &words);
    Ok(LoadedImage {
        origin,
        words: stored,
        truncated,
    })
}

/// Load an image held in memory.
pub fn load_bytes(bytes: &[u8], mem: &mut Memory) -> Result<LoadedImage, LoadError> {
    load_reader(bytes, mem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_bytes_big_endian() {
        let mut mem = Memory::new();
        let image = load_bytes(&[0x30, 0x00, 0x12, 0x34, 0xF0, 0x25], &mut mem).unwrap();

        assert_eq!(
            image,
            LoadedImage { origin: 0x3000, words: 2, truncated: false }
        );
        assert_eq!(mem.get(0x3000), 0x1234);
        assert_eq!(mem.get(0x3001), 0xF025);
    }

    #[test]
    fn test_origin_only() {
        let mut mem = Memory::new();
        let image = load_bytes(&[0x40, 0x00], &mut mem).unwrap();
        assert_eq!(image.words, 0);
        assert_eq!(mem.used_words(), 0);
    }

    #[test]
    fn test_empty_image() {
        let mut mem = Memory::new();
        assert!(matches!(load_bytes(&[], &mut mem), Err(LoadError::MissingOrigin)));
        assert!(matches!(load_bytes(&[0x30], &mut mem), Err(LoadError::MissingOrigin)));
    }

    #[test]
    fn test_trailing_odd_byte_ignored() {
        let mut mem = Memory::new();
        let image = load_bytes(&[0x30, 0x00, 0x00, 0x07, 0xAA], &mut mem).unwrap();
        assert_eq!(image.words, 1);
        assert_eq!(mem.get(0x3000), 7);
        assert_eq!(mem.get(0x3001), 0);
    }

    #[test]
    fn test_stops_at_ceiling() {
        let mut mem = Memory::new();
        let bytes = [0xFF, 0xFE, 0x00, 0x01, 0x00, 0x02, 0x00, 0x03];
        let image = load_bytes(&bytes, &mut mem).unwrap();

        assert_eq!(image.words, 2);
        assert!(image.truncated);
        assert_eq!(mem.get(0xFFFE), 1);
        assert_eq!(mem.get(0xFFFF), 2);
        // Nothing wrapped around to low memory.
        assert_eq!(mem.get(0x0000), 0);
    }

    #[test]
    fn test_reading_stops_at_ceiling() {
        let mut bytes = vec![0x00, 0x00];
        bytes.extend(std::iter::repeat(0x11).take(MEMORY_MAX * 2));
        bytes.extend(std::iter::repeat(0x22).take(4000));
        let mut reader = io::Cursor::new(bytes);

        let mut mem = Memory::new();
        let image = load_reader(&mut reader, &mut mem).unwrap();
        assert_eq!(image.words, MEMORY_MAX);
        assert!(image.truncated);
        assert_eq!(mem.get(0xFFFF), 0x1111);

        // Only the one word past the ceiling was consumed.
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        assert_eq!(rest.len(), 4000 - 2);
    }

    #[test]
    fn test_endless_source() {
        let mut mem = Memory::new();
        let image = load_reader(io::repeat(0x30), &mut mem).unwrap();
        assert_eq!(image.origin, 0x3030);
        assert_eq!(image.words, MEMORY_MAX - 0x3030);
        assert!(image.truncated);
    }

    #[test]
    fn test_image_ending_at_ceiling_is_not_truncated() {
        let mut mem = Memory::new();
        let image = load_bytes(&[0xFF, 0xFF, 0x00, 0x09], &mut mem).unwrap();
        assert_eq!(image.words, 1);
        assert!(!image.truncated);
    }

    #[test]
    fn test_load_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0x30, 0x00, 0x10, 0x25, 0xF0, 0x25]).unwrap();

        let mut mem = Memory::new();
        let image = load_file(file.path(), &mut mem).unwrap();
        assert_eq!(image.origin, 0x3000);
        assert_eq!(mem.read_slice(0x3000, 2), vec![0x1025, 0xF025]);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut mem = Memory::new();
        let err = load_file(dir.path().join("nope.obj"), &mut mem).unwrap_err();
        assert!(matches!(err, LoadError::Open { .. }));
        assert!(err.to_string().contains("nope.obj"));
    }

    #[test]
    fn test_memory_image_reloads() {
        let mut mem = Memory::new();
        mem.set(0x0000, 0xBEEF);
        mem.set(0x3000, 0x1025);
        mem.set(0xFFFF, 0x0042);

        let mut bytes = Vec::new();
        mem.write_image(&mut bytes).unwrap();

        let mut back = Memory::new();
        let image = load_bytes(&bytes, &mut back).unwrap();
        assert_eq!(image.words, MEMORY_MAX);
        assert_eq!(back.as_slice(), mem.as_slice());
    }
}
