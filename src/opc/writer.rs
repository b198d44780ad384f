//! Archive writing.

use std::io::{Seek, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Error, Result};

/// Write side of the archive layer.
///
/// Members are added as in-memory buffers and deflated at the default level.
/// On write failure the caller is expected to drop the writer and remove the
/// target file; [`crate::store_3mf`] does exactly that.
pub struct PackageWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
}

impl<W: Write + Seek> PackageWriter<W> {
    /// Start writing an archive into `inner`.
    pub fn new(inner: W) -> Self {
        Self {
            zip: ZipWriter::new(inner),
        }
    }

    /// Add a member with the given content.
    pub fn add(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.zip
            .start_file(name, options)
            .map_err(|e| Error::MemberWrite {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        self.zip.write_all(data).map_err(|e| Error::MemberWrite {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    /// Write the central directory and return the inner writer.
    pub fn finish(self) -> Result<W> {
        self.zip
            .finish()
            .map_err(|e| Error::FinalizeFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opc::PackageReader;
    use std::io::Cursor;

    #[test]
    fn written_members_read_back() {
        let mut writer = PackageWriter::new(Cursor::new(Vec::new()));
        writer.add("a/b.txt", b"content").unwrap();
        writer.add("c.txt", b"more").unwrap();
        let cursor = writer.finish().unwrap();

        let mut reader = PackageReader::new(cursor).unwrap();
        let entry = reader.find("A/B.TXT").unwrap().unwrap();
        assert_eq!(reader.read_to_memory(&entry).unwrap(), b"content");
    }
}
