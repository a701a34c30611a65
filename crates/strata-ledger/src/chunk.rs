//! Fixed-size chunking of large record bodies.

use std::path::Path;

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Default chunk size (256 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// One piece of a chunked body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub index: u64,
    pub offset: u64,
    pub data: Bytes,
}

/// Reads a file as a sequence of `chunk_size` chunks (the last may be short).
pub struct ChunkReader {
    file: File,
    chunk_size: usize,
    total_size: u64,
    offset: u64,
    index: u64,
}

impl ChunkReader {
    pub async fn open(path: &Path, chunk_size: usize) -> std::io::Result<Self> {
        let file = File::open(path).await?;
        let total_size = file.metadata().await?.len();
        Ok(Self {
            file,
            chunk_size: chunk_size.max(1),
            total_size,
            offset: 0,
            index: 0,
        })
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn total_chunks(&self) -> u64 {
        self.total_size.div_ceil(self.chunk_size as u64)
    }

    /// The next chunk, or `None` at end of file.
    pub async fn next_chunk(&mut self) -> std::io::Result<Option<Chunk>> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.file.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);
        let chunk = Chunk {
            index: self.index,
            offset: self.offset,
            data: Bytes::from(buf),
        };
        self.index += 1;
        self.offset += filled as u64;
        Ok(Some(chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn splits_into_fixed_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("body");
        std::fs::write(&path, vec![1u8; 10]).unwrap();

        let mut reader = ChunkReader::open(&path, 4).await.unwrap();
        assert_eq!(reader.total_chunks(), 3);

        let mut sizes = Vec::new();
        let mut offsets = Vec::new();
        while let Some(chunk) = reader.next_chunk().await.unwrap() {
            sizes.push(chunk.data.len());
            offsets.push(chunk.offset);
        }
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(offsets, vec![0, 4, 8]);
    }

    #[tokio::test]
    async fn empty_file_has_no_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        std::fs::write(&path, b"").unwrap();
        let mut reader = ChunkReader::open(&path, 4).await.unwrap();
        assert_eq!(reader.total_chunks(), 0);
        assert!(reader.next_chunk().await.unwrap().is_none());
    }
}
