//! SHA-256 helpers for target identifiers and file checksums.
//!
//! # Examples
//!
//! ```
//! use kumihimo::hasher::target_id;
//!
//! assert_eq!(target_id("", "app", "exe"), "app@exe");
//! let nested = target_id("src/lib", "core", "sta");
//! assert!(nested.ends_with("@@core@sta"));
//! assert_eq!(nested.len(), "0000000@@core@sta".len());
//! ```

use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, Read};

use camino::Utf8Path;
use digest::Digest;
use sha2::Sha256;

const ID_HASH_LEN: usize = 7;

/// Hex-encoded SHA-256 of `data`.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    encode_hex(&Sha256::digest(data))
}

/// Identifier of a target defined in `subdir`.
///
/// Top-level targets use `name@kind`; others are prefixed with a short
/// digest of their directory so that equal names in different directories
/// stay distinct.
#[must_use]
pub fn target_id(subdir: &str, name: &str, kind: &str) -> String {
    let own = format!("{name}@{kind}");
    if subdir.is_empty() {
        return own;
    }
    let mut digest = sha256_hex(subdir.as_bytes());
    digest.truncate(ID_HASH_LEN);
    format!("{digest}@@{own}")
}

/// Hex-encoded SHA-256 of the file at `path`, read in chunks.
///
/// # Errors
///
/// Returns any I/O error raised while opening or reading the file.
pub fn file_sha256(path: &Utf8Path) -> io::Result<String> {
    hash_stream::<Sha256>(path)
}

fn hash_stream<H: Digest>(path: &Utf8Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = H::new();
    let mut buffer = [0_u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        let chunk = buffer.get(..read).unwrap_or_else(|| {
            debug_assert!(false, "read beyond buffer capacity: {read} bytes");
            buffer.as_slice()
        });
        hasher.update(chunk);
    }
    Ok(encode_hex(&hasher.finalize()))
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        if let Err(err) = write!(&mut out, "{byte:02x}") {
            debug_assert!(false, "format hex byte failed: {err}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn digest_of_known_input() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[rstest]
    #[case("", "prog@exe")]
    #[case("sub", "@@prog@exe")]
    #[case("sub/deeper", "@@prog@exe")]
    fn ids(#[case] subdir: &str, #[case] suffix: &str) {
        let id = target_id(subdir, "prog", "exe");
        assert!(id.ends_with(suffix), "{id}");
        if !subdir.is_empty() {
            assert_eq!(&id[..7], &sha256_hex(subdir.as_bytes())[..7]);
        }
    }

    #[test]
    fn file_digest_matches_in_memory_digest() -> std::io::Result<()> {
        let mut tmp = tempfile::NamedTempFile::new()?;
        std::io::Write::write_all(&mut tmp, b"abc")?;
        let path = Utf8Path::from_path(tmp.path()).expect("utf-8 temp path");
        assert_eq!(file_sha256(path)?, sha256_hex(b"abc"));
        Ok(())
    }
}
