use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::UncompressError;

const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// Unpacks uploads and packs archived artifacts.
///
/// Uploads arrive either as a zip with a single metadata file or as the
/// plain file itself; both end up as one plain file in the destination.
#[derive(Debug, Clone, Default)]
pub struct Uncompressor;

impl Uncompressor {
    pub fn new() -> Self {
        Self
    }

    /// Places the uncompressed content of `input` in `destination_dir` and
    /// returns its path.
    pub fn uncompress_file(
        &self,
        input: &Path,
        destination_dir: &Path,
    ) -> Result<PathBuf, UncompressError> {
        std::fs::create_dir_all(destination_dir).map_err(|e| UncompressError::Write {
            path: destination_dir.to_path_buf(),
            source: e,
        })?;

        if is_zip(input)? {
            extract_first_entry(input, destination_dir)
        } else {
            let target = destination_dir.join(file_name_of(input));
            std::fs::copy(input, &target).map_err(|e| UncompressError::Write {
                path: target.clone(),
                source: e,
            })?;
            Ok(target)
        }
    }

    /// Deflates `input` into a zip at `destination` holding a single entry
    /// named after the input file.
    pub fn compress_file(&self, input: &Path, destination: &Path) -> Result<PathBuf, UncompressError> {
        let mut source = File::open(input).map_err(|e| UncompressError::Open {
            path: input.to_path_buf(),
            source: e,
        })?;
        let target = File::create(destination).map_err(|e| UncompressError::Write {
            path: destination.to_path_buf(),
            source: e,
        })?;

        let mut writer = ZipWriter::new(target);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        writer
            .start_file(file_name_of(input), options)
            .map_err(|e| UncompressError::Compress {
                path: destination.to_path_buf(),
                source: e,
            })?;
        std::io::copy(&mut source, &mut writer).map_err(|e| UncompressError::Write {
            path: destination.to_path_buf(),
            source: e,
        })?;
        let mut file = writer.finish().map_err(|e| UncompressError::Compress {
            path: destination.to_path_buf(),
            source: e,
        })?;
        file.flush().map_err(|e| UncompressError::Write {
            path: destination.to_path_buf(),
            source: e,
        })?;

        Ok(destination.to_path_buf())
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("input")
        .to_string()
}

fn is_zip(path: &Path) -> Result<bool, UncompressError> {
    let mut file = File::open(path).map_err(|e| UncompressError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(&magic == ZIP_MAGIC),
        // Shorter than a zip header, so it's a (tiny) plain file.
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(UncompressError::Open {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn extract_first_entry(input: &Path, destination_dir: &Path) -> Result<PathBuf, UncompressError> {
    let file = File::open(input).map_err(|e| UncompressError::Open {
        path: input.to_path_buf(),
        source: e,
    })?;
    let mut archive = ZipArchive::new(file).map_err(|e| UncompressError::Corrupt {
        path: input.to_path_buf(),
        source: e,
    })?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| UncompressError::Corrupt {
            path: input.to_path_buf(),
            source: e,
        })?;
        if entry.is_dir() {
            continue;
        }

        // Only the base name is used; entries can't place files elsewhere.
        let name = entry
            .enclosed_name()
            .and_then(|p| p.file_name().map(|n| n.to_owned()))
            .ok_or_else(|| UncompressError::Empty(input.to_path_buf()))?;
        let target = destination_dir.join(name);

        let mut out = File::create(&target).map_err(|e| UncompressError::Write {
            path: target.clone(),
            source: e,
        })?;
        std::io::copy(&mut entry, &mut out).map_err(|e| UncompressError::Write {
            path: target.clone(),
            source: e,
        })?;
        return Ok(target);
    }

    Err(UncompressError::Empty(input.to_path_buf()))
}
