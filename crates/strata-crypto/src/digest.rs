use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest as _, Sha256};
use strata_types::Digest;

const READ_BUFFER: usize = 64 * 1024;

/// SHA-256 content digester for manifests and blobs.
///
/// The registry protocol names content by `sha256:<hex>` of the raw bytes, so
/// unlike record ids there is no domain separation here.
pub struct ContentDigester;

impl ContentDigester {
    /// Digest an in-memory body.
    pub fn digest(data: &[u8]) -> Digest {
        Digest::from_sha256(Sha256::digest(data).into())
    }

    /// Digest everything a reader yields, returning the digest and byte count.
    pub fn digest_reader<R: Read>(mut reader: R) -> io::Result<(Digest, u64)> {
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; READ_BUFFER];
        let mut total = 0u64;
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            total += n as u64;
        }
        Ok((Digest::from_sha256(hasher.finalize().into()), total))
    }

    /// Digest a file on disk. Blocking; call from a blocking context.
    pub fn digest_file(path: &Path) -> io::Result<(Digest, u64)> {
        Self::digest_reader(File::open(path)?)
    }

    /// Verify that data produces the expected digest.
    pub fn verify(data: &[u8], expected: &Digest) -> bool {
        Self::digest(data) == *expected
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const ABC: &str = "sha256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn known_vector() {
        assert_eq!(ContentDigester::digest(b"abc").to_string(), ABC);
    }

    #[test]
    fn empty_object_manifest() {
        assert_eq!(
            ContentDigester::digest(b"{}").to_string(),
            "sha256:44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }

    #[test]
    fn reader_matches_in_memory() {
        let data = vec![7u8; READ_BUFFER * 2 + 13];
        let (digest, len) = ContentDigester::digest_reader(&data[..]).unwrap();
        assert_eq!(digest, ContentDigester::digest(&data));
        assert_eq!(len, data.len() as u64);
    }

    #[test]
    fn file_digest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();
        let (digest, len) = ContentDigester::digest_file(file.path()).unwrap();
        assert_eq!(digest.to_string(), ABC);
        assert_eq!(len, 3);
    }

    #[test]
    fn verify_detects_tampering() {
        let digest = ContentDigester::digest(b"original");
        assert!(ContentDigester::verify(b"original", &digest));
        assert!(!ContentDigester::verify(b"tampered", &digest));
    }
}
