//! Tarball unpacking.

use std::fs;
use std::path::Path;

use flate2::read::GzDecoder;

use crate::ForgeError;

/// Unpack a gzip-compressed tarball into `target`, keeping the archived
/// modification times so up-to-date checks compare source ages.
pub fn unpack_tar_gz(path: &Path, target: &Path) -> Result<(), ForgeError> {
    let file = fs::File::open(path).map_err(|source| extract_error(path, source))?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive.set_preserve_mtime(true);
    archive
        .unpack(target)
        .map_err(|source| extract_error(path, source))
}

fn extract_error(path: &Path, source: std::io::Error) -> ForgeError {
    ForgeError::Extract {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Read;

    #[test]
    fn unpack_restores_paths_and_contents() {
        let dir = tempfile::tempdir().unwrap();
        let tarball = dir.path().join("widget.tar.gz");

        let file = fs::File::create(&tarball).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let content = b"hello\n".to_vec();
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(1_000_000);
        header.set_cksum();
        builder
            .append_data(&mut header, "widget-1.0/README", content.as_slice())
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let target = dir.path().join("out");
        fs::create_dir_all(&target).unwrap();
        unpack_tar_gz(&tarball, &target).unwrap();

        let mut restored = String::new();
        fs::File::open(target.join("widget-1.0/README"))
            .unwrap()
            .read_to_string(&mut restored)
            .unwrap();
        assert_eq!(restored, "hello\n");
    }

    #[test]
    fn unpack_reports_the_archive_path_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.tar.gz");
        match unpack_tar_gz(&missing, dir.path()) {
            Err(ForgeError::Extract { path, .. }) => {
                assert!(path.ends_with("missing.tar.gz"))
            }
            other => panic!("expected an extract error, got {:?}", other.ok()),
        }
    }
}
