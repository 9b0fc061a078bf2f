//! Archive extraction.

use crate::error::{DataError, Result};
use crate::registry::DataKind;
use flate2::read::GzDecoder;
use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::path::Path;
use tracing::debug;

/// Extract an in-memory archive into `dest`.
///
/// Entries are unpacked into a staging directory next to `dest`, which then
/// replaces `dest` in one rename. A failed extraction leaves `dest` as it was.
/// Entries whose path would land outside the target (`..` components) are
/// rejected before anything is written for them.
pub fn extract(bytes: &[u8], kind: DataKind, dest: &Path) -> Result<()> {
    let parent = staging_parent(dest)?;
    let staging = tempfile::Builder::new().prefix(".partial-").tempdir_in(parent)?;

    match kind {
        DataKind::Zip => extract_zip(bytes, staging.path())?,
        DataKind::Tar => extract_tar(Cursor::new(bytes), staging.path())?,
        DataKind::TarGz => extract_tar(GzDecoder::new(Cursor::new(bytes)), staging.path())?,
        DataKind::File => {
            return Err(DataError::Archive("payload is not an archive".into()));
        }
    }

    remove_existing(dest)?;
    fs::rename(staging.path(), dest)?;
    debug!(kind = %kind, dest = %dest.display(), "extracted archive");
    Ok(())
}

/// Write `bytes` to `dest` through a temporary file in the same directory
pub fn write_atomic(bytes: &[u8], dest: &Path) -> Result<()> {
    let parent = staging_parent(dest)?;
    let mut tmp = tempfile::Builder::new().prefix(".partial-").tempfile_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    remove_existing_dir(dest)?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

/// Directory that will hold `dest`, created if missing
fn staging_parent(dest: &Path) -> Result<&Path> {
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    Ok(parent)
}

fn remove_existing(dest: &Path) -> Result<()> {
    match fs::symlink_metadata(dest) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(dest)?,
        Ok(_) => fs::remove_file(dest)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn remove_existing_dir(dest: &Path) -> Result<()> {
    if dest.is_dir() {
        fs::remove_dir_all(dest)?;
    }
    Ok(())
}

fn extract_zip(bytes: &[u8], dest: &Path) -> Result<()> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let relative = file
            .enclosed_name()
            .map(Path::to_path_buf)
            .ok_or_else(|| DataError::Archive(format!("entry escapes target directory: {}", file.name())))?;
        let target = dest.join(relative);

        if file.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&target)?;
        io::copy(&mut file, &mut out)?;
    }
    Ok(())
}

fn extract_tar<R: Read>(reader: R, dest: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    for entry in archive.entries()? {
        let mut entry = entry?;
        // unpack_in refuses paths with `..` and reports it as `false`
        if !entry.unpack_in(dest)? {
            let name = entry.path()?.display().to_string();
            return Err(DataError::Archive(format!("entry escapes target directory: {}", name)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer
                .start_file(*name, zip::write::FileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn tar_gz_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_extract_zip_with_subdirectories() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("naip");
        let bytes = zip_bytes(&[("readme.txt", b"hello"), ("landsat/band4.tif", b"II*\0")]);

        extract(&bytes, DataKind::Zip, &dest).unwrap();

        assert_eq!(fs::read(dest.join("readme.txt")).unwrap(), b"hello");
        assert!(dest.join("landsat").join("band4.tif").is_file());
        // Only the target is left behind, no staging directory
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_extract_tar_gz() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("scene");
        let bytes = tar_gz_bytes(&[("scene/meta.json", b"{}")]);

        extract(&bytes, DataKind::TarGz, &dest).unwrap();

        assert_eq!(fs::read_to_string(dest.join("scene").join("meta.json")).unwrap(), "{}");
    }

    #[test]
    fn test_zip_escape_is_rejected() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("inner");
        let bytes = zip_bytes(&[("../evil.txt", b"x")]);

        let err = extract(&bytes, DataKind::Zip, &dest).unwrap_err();
        assert!(matches!(err, DataError::Archive(_)));
        assert!(!dir.path().join("evil.txt").exists());
        assert!(!dest.exists());
    }

    #[test]
    fn test_corrupt_archive_leaves_no_target() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("cold-springs-fire");

        let err = extract(b"<html>proxy error</html>", DataKind::Zip, &dest).unwrap_err();
        assert!(matches!(err, DataError::Archive(_)));
        assert!(!dest.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

        assert!(extract(b"plain", DataKind::File, &dest).is_err());
    }

    #[test]
    fn test_failed_replace_keeps_previous_extract() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("scene");
        extract(&zip_bytes(&[("old.txt", b"1")]), DataKind::Zip, &dest).unwrap();

        assert!(extract(b"truncated", DataKind::Zip, &dest).is_err());
        assert!(dest.join("old.txt").is_file());

        extract(&zip_bytes(&[("new.txt", b"2")]), DataKind::Zip, &dest).unwrap();
        assert!(dest.join("new.txt").is_file());
        assert!(!dest.join("old.txt").exists());
    }

    #[test]
    fn test_write_atomic_replaces_file() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("downloads").join("tweets.json");

        write_atomic(b"[1]", &dest).unwrap();
        write_atomic(b"[2]", &dest).unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "[2]");
        assert_eq!(fs::read_dir(dest.parent().unwrap()).unwrap().count(), 1);
    }
}
