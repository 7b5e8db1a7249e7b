//! Selective extraction from taxonomy dump archives
//!
//! # Supported Formats
//!
//! - **Tar.gz** (`taxdump.tar.gz`, `new_taxdump.tar.gz`): streamed, reading
//!   stops once every requested entry has been written
//! - **Zip** (`taxdmp_YYYY-MM-DD.zip` archives): requested entries are read
//!   by name, the rest of the archive is never inflated
//!
//! The format is detected from the file's magic bytes.

use flate2::read::GzDecoder;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, TaxonomyError};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveFormat {
    TarGz,
    Zip,
}

/// Extract `entry_names` from the archive at `archive_path` into `output_dir`
///
/// A requested name matches an entry by full path or, when the name has no
/// directory part, by file name. Each entry is written as
/// `output_dir/<file name>`.
///
/// # Returns
/// Map of requested entry name -> extracted file path
pub fn extract(
    archive_path: impl AsRef<Path>,
    entry_names: &[&str],
    output_dir: impl AsRef<Path>,
) -> Result<HashMap<String, PathBuf>> {
    let archive_path = archive_path.as_ref();
    let output_dir = output_dir.as_ref();

    let mut targets = HashMap::with_capacity(entry_names.len());
    for &name in entry_names {
        let file_name = Path::new(name).file_name().ok_or_else(|| {
            TaxonomyError::extraction(archive_path, format!("invalid entry name '{}'", name))
        })?;
        targets.insert(name, output_dir.join(file_name));
    }

    let extracted = match detect_format(archive_path)? {
        ArchiveFormat::TarGz => extract_tar_gz(archive_path, &targets)?,
        ArchiveFormat::Zip => extract_zip(archive_path, &targets)?,
    };

    let missing: BTreeSet<&str> = targets
        .keys()
        .copied()
        .filter(|name| !extracted.contains_key(*name))
        .collect();
    if !missing.is_empty() {
        return Err(TaxonomyError::extraction(
            archive_path,
            format!("entries not found in archive: {:?}", missing),
        ));
    }

    Ok(extracted)
}

fn detect_format(archive_path: &Path) -> Result<ArchiveFormat> {
    let mut magic = [0u8; 4];
    let mut file = File::open(archive_path)
        .map_err(|e| TaxonomyError::extraction_io(archive_path, "cannot open archive", e))?;
    let read = read_prefix(&mut file, &mut magic)
        .map_err(|e| TaxonomyError::extraction_io(archive_path, "cannot read archive header", e))?;

    if read >= 2 && magic[..2] == GZIP_MAGIC {
        Ok(ArchiveFormat::TarGz)
    } else if read == 4 && magic == ZIP_MAGIC {
        Ok(ArchiveFormat::Zip)
    } else {
        Err(TaxonomyError::extraction(archive_path, "unrecognised archive format"))
    }
}

fn read_prefix(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

fn entry_matches(entry_path: &str, requested: &str) -> bool {
    let entry_path = entry_path.trim_start_matches("./");
    entry_path == requested
        || (!requested.contains('/') && entry_path.rsplit('/').next() == Some(requested))
}

fn find_request<'a>(
    entry_path: &str,
    targets: &HashMap<&'a str, PathBuf>,
    done: &HashMap<String, PathBuf>,
) -> Option<&'a str> {
    targets
        .keys()
        .copied()
        .find(|name| !done.contains_key(*name) && entry_matches(entry_path, name))
}

fn write_entry(archive_path: &Path, name: &str, reader: &mut impl Read, target: &Path) -> Result<u64> {
    let mut out = File::create(target).map_err(|e| {
        TaxonomyError::extraction_io(archive_path, format!("cannot create {}", target.display()), e)
    })?;
    let written = io::copy(reader, &mut out)
        .map_err(|e| TaxonomyError::extraction_io(archive_path, format!("cannot read {}", name), e))?;
    debug!("Extracted {} ({} bytes) to {}", name, written, target.display());
    Ok(written)
}

fn extract_tar_gz(
    archive_path: &Path,
    targets: &HashMap<&str, PathBuf>,
) -> Result<HashMap<String, PathBuf>> {
    let file = File::open(archive_path)
        .map_err(|e| TaxonomyError::extraction_io(archive_path, "cannot open archive", e))?;
    let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    let mut extracted = HashMap::new();

    let entries = archive
        .entries()
        .map_err(|e| TaxonomyError::extraction_io(archive_path, "cannot read tar entries", e))?;

    for entry in entries {
        let mut entry = entry
            .map_err(|e| TaxonomyError::extraction_io(archive_path, "corrupt tar entry", e))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let entry_path = entry
            .path()
            .map_err(|e| TaxonomyError::extraction_io(archive_path, "invalid entry path", e))?
            .to_string_lossy()
            .into_owned();

        let Some(name) = find_request(&entry_path, targets, &extracted) else {
            debug!("Skipping file: {}", entry_path);
            continue;
        };

        let target = &targets[name];
        write_entry(archive_path, name, &mut entry, target)?;
        extracted.insert(name.to_string(), target.clone());

        if extracted.len() == targets.len() {
            break;
        }
    }

    Ok(extracted)
}

fn extract_zip(
    archive_path: &Path,
    targets: &HashMap<&str, PathBuf>,
) -> Result<HashMap<String, PathBuf>> {
    let file = File::open(archive_path)
        .map_err(|e| TaxonomyError::extraction_io(archive_path, "cannot open archive", e))?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| TaxonomyError::extraction_io(archive_path, "cannot read zip directory", io::Error::other(e)))?;

    let entry_paths: Vec<String> = archive
        .file_names()
        .filter(|name| !name.ends_with('/'))
        .map(str::to_string)
        .collect();
    let mut extracted = HashMap::new();

    for (&name, target) in targets {
        let Some(entry_path) = entry_paths.iter().find(|path| entry_matches(path, name)) else {
            continue;
        };
        let mut entry = archive.by_name(entry_path).map_err(|e| {
            TaxonomyError::extraction_io(archive_path, format!("cannot open {}", entry_path), io::Error::other(e))
        })?;
        write_entry(archive_path, name, &mut entry, target)?;
        extracted.insert(name.to_string(), target.clone());
    }

    Ok(extracted)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_tar_gz(path: &Path, entries: &[(&str, &str)]) {
        let encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, content) in entries {
            writer
                .start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_extract_requested_tar_gz_entry_only() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("taxdump.tar.gz");
        write_tar_gz(
            &archive,
            &[
                ("names.dmp", "1\t|\troot\t|"),
                ("nodes.dmp", "1\t|\t1\t|"),
                ("gencode.dmp", "1\t|\tStandard\t|"),
            ],
        );
        let out = TempDir::new().unwrap();

        let extracted = extract(&archive, &["nodes.dmp"], out.path()).unwrap();

        assert_eq!(extracted.len(), 1);
        let nodes = &extracted["nodes.dmp"];
        assert_eq!(std::fs::read_to_string(nodes).unwrap(), "1\t|\t1\t|");
        assert!(!out.path().join("names.dmp").exists());
        assert!(!out.path().join("gencode.dmp").exists());
    }

    #[test]
    fn test_extract_nested_entry_by_file_name() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("new_taxdump.tar.gz");
        write_tar_gz(&archive, &[("./taxdump/nodes.dmp", "2\t|\t1\t|")]);
        let out = TempDir::new().unwrap();

        let extracted = extract(&archive, &["nodes.dmp"], out.path()).unwrap();
        assert_eq!(extracted["nodes.dmp"], out.path().join("nodes.dmp"));
    }

    #[test]
    fn test_extract_zip_entries() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("taxdmp_2024-01-01.zip");
        write_zip(&archive, &[("nodes.dmp", "1\t|\t1\t|"), ("names.dmp", "x")]);
        let out = TempDir::new().unwrap();

        let extracted = extract(&archive, &["nodes.dmp", "names.dmp"], out.path()).unwrap();
        assert_eq!(extracted.len(), 2);
        assert_eq!(std::fs::read_to_string(&extracted["names.dmp"]).unwrap(), "x");
    }

    #[test]
    fn test_missing_entry_is_extraction_error() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("taxdump.tar.gz");
        write_tar_gz(&archive, &[("names.dmp", "1\t|\troot\t|")]);

        let err = extract(&archive, &["nodes.dmp"], dir.path()).unwrap_err();
        match err {
            TaxonomyError::Extraction { reason, .. } => assert!(reason.contains("nodes.dmp")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_corrupt_archive_is_extraction_error() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("taxdump.tar.gz");
        std::fs::write(&archive, b"plain text, not an archive").unwrap();
        assert!(matches!(
            extract(&archive, &["nodes.dmp"], dir.path()),
            Err(TaxonomyError::Extraction { .. })
        ));

        let truncated = dir.path().join("truncated.tar.gz");
        std::fs::write(&truncated, [0x1f, 0x8b, 0x08, 0x00]).unwrap();
        assert!(matches!(
            extract(&truncated, &["nodes.dmp"], dir.path()),
            Err(TaxonomyError::Extraction { .. })
        ));
    }

    #[test]
    fn test_missing_archive_is_extraction_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            extract(dir.path().join("absent.tar.gz"), &["nodes.dmp"], dir.path()),
            Err(TaxonomyError::Extraction { source: Some(_), .. })
        ));
    }
}
