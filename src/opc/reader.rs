//! Archive reading.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use zip::ZipArchive;

use super::normalize_name;
use crate::error::{Error, Result};

/// Chunk size used by [`PackageReader::stream`].
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// One archive member.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Index inside the archive.
    pub index: usize,
    /// Member name with separators normalized to `/`.
    pub name: String,
    /// Uncompressed size in bytes.
    pub size: u64,
}

/// Read side of the archive layer.
pub struct PackageReader<R: Read + Seek> {
    archive: ZipArchive<R>,
}

/// Open an archive on disk for reading.
pub fn open_path(path: &Path) -> Result<PackageReader<BufReader<File>>> {
    let to_open_error = |reason: String| Error::ArchiveOpen {
        path: path.display().to_string(),
        reason,
    };
    let file = File::open(path).map_err(|e| to_open_error(e.to_string()))?;
    let archive = ZipArchive::new(BufReader::new(file)).map_err(|e| to_open_error(e.to_string()))?;
    Ok(PackageReader { archive })
}

impl<R: Read + Seek> PackageReader<R> {
    /// Wrap an in-memory or already open archive.
    pub fn new(reader: R) -> Result<Self> {
        let archive = ZipArchive::new(reader).map_err(|e| Error::ArchiveOpen {
            path: String::from("<reader>"),
            reason: e.to_string(),
        })?;
        Ok(Self { archive })
    }

    /// Enumerate all members with normalized names and uncompressed sizes.
    pub fn entries(&mut self) -> Result<Vec<Entry>> {
        let mut entries = Vec::with_capacity(self.archive.len());
        for index in 0..self.archive.len() {
            let file = self.archive.by_index(index).map_err(|e| Error::MemberRead {
                name: format!("#{index}"),
                reason: e.to_string(),
            })?;
            entries.push(Entry {
                index,
                name: normalize_name(file.name()),
                size: file.size(),
            });
        }
        Ok(entries)
    }

    /// Locate a member by name, case-insensitively.
    pub fn find(&mut self, name: &str) -> Result<Option<Entry>> {
        let wanted = normalize_name(name);
        Ok(self
            .entries()?
            .into_iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(&wanted)))
    }

    /// Read a whole member into memory.
    pub fn read_to_memory(&mut self, entry: &Entry) -> Result<Vec<u8>> {
        let mut file = self
            .archive
            .by_index(entry.index)
            .map_err(|e| Error::MemberRead {
                name: entry.name.clone(),
                reason: e.to_string(),
            })?;
        let mut data = Vec::with_capacity(entry.size as usize);
        file.read_to_end(&mut data).map_err(|e| Error::MemberRead {
            name: entry.name.clone(),
            reason: e.to_string(),
        })?;
        Ok(data)
    }

    /// Stream a member through `sink` in chunks.
    ///
    /// The sink receives the byte offset of the chunk, the chunk itself, and
    /// whether it is the last one. Any error from the sink aborts the stream.
    pub fn stream<F>(&mut self, entry: &Entry, mut sink: F) -> Result<()>
    where
        F: FnMut(u64, &[u8], bool) -> Result<()>,
    {
        let mut file = self
            .archive
            .by_index(entry.index)
            .map_err(|e| Error::MemberRead {
                name: entry.name.clone(),
                reason: e.to_string(),
            })?;

        let mut buffer = vec![0u8; STREAM_CHUNK_SIZE];
        let mut offset = 0u64;
        loop {
            let n = file.read(&mut buffer).map_err(|e| Error::MemberRead {
                name: entry.name.clone(),
                reason: e.to_string(),
            })?;
            if n == 0 {
                break;
            }
            let last = offset + n as u64 == entry.size;
            sink(offset, &buffer[..n], last)?;
            offset += n as u64;
        }
        Ok(())
    }

    /// A decompressing reader over a member, for streaming parsers.
    pub fn member_reader<'a>(&'a mut self, entry: &Entry) -> Result<impl Read + 'a> {
        self.archive
            .by_index(entry.index)
            .map_err(|e| Error::MemberRead {
                name: entry.name.clone(),
                reason: e.to_string(),
            })
    }
}
