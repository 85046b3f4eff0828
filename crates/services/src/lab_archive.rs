//! Packaging of a problem's lab directory as a gzip-compressed tarball.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::error::LabArchiveError;

/// A freshly built lab archive, ready to be written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabArchive {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// `<name>-lab.tar.gz` as a single path component.
///
/// Separators and control characters in `name` become `_`, and leading dots
/// are dropped. When nothing usable is left, `fallback` is tried the same way.
#[must_use]
pub fn archive_file_name(name: &str, fallback: &str) -> String {
    let stem = file_stem(name)
        .or_else(|| file_stem(fallback))
        .unwrap_or_else(|| "problem".to_string());
    format!("{stem}-lab.tar.gz")
}

fn file_stem(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').trim_start();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Archive every file under `lab_dir`, with entry paths relative to it.
///
/// # Errors
///
/// Returns `LabArchiveError::Io` if the directory cannot be walked or a file
/// cannot be read.
pub fn archive_dir(lab_dir: &Path) -> Result<Vec<u8>, LabArchiveError> {
    let mut files = Vec::new();
    collect_files(lab_dir, &mut files)?;

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for path in &files {
        let relative = path.strip_prefix(lab_dir).map_err(io::Error::other)?;
        builder.append_path_with_name(path, relative)?;
    }

    let bytes = builder.into_inner()?.finish()?;
    tracing::debug!(lab = %lab_dir.display(), files = files.len(), "lab archive built");
    Ok(bytes)
}

/// Files below `dir` in sorted order. Symlinked directories are not followed.
fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(fs::DirEntry::file_name);

    for entry in entries {
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_files(&path, out)?;
        } else if path.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::path::Component;

    fn entry_names(bytes: &[u8]) -> Vec<String> {
        let mut archive = tar::Archive::new(GzDecoder::new(bytes));
        archive
            .entries()
            .unwrap()
            .map(|entry| entry.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn entries_are_relative_to_lab_root() {
        let tmp = tempfile::tempdir().unwrap();
        let lab = tmp.path().join("lab");
        fs::create_dir_all(lab.join("data")).unwrap();
        fs::write(lab.join("setup.sh"), "#!/bin/sh\necho hi\n").unwrap();
        fs::write(lab.join("data/file.txt"), "payload").unwrap();

        let bytes = archive_dir(&lab).unwrap();
        assert_eq!(entry_names(&bytes), vec!["data/file.txt", "setup.sh"]);
    }

    #[test]
    fn archive_preserves_file_contents() {
        use std::io::Read;

        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("notes.md"), "lab notes").unwrap();

        let bytes = archive_dir(tmp.path()).unwrap();
        let mut archive = tar::Archive::new(GzDecoder::new(bytes.as_slice()));
        let mut entry = archive.entries().unwrap().next().unwrap().unwrap();
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "lab notes");
    }

    #[test]
    fn empty_lab_builds_empty_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let bytes = archive_dir(tmp.path()).unwrap();
        assert!(entry_names(&bytes).is_empty());
    }

    #[test]
    fn file_name_is_one_normal_component() {
        let name = archive_file_name("TCP/IP ../../Outage", "outage");
        assert_eq!(name, "TCP_IP .._.._Outage-lab.tar.gz");
        let components: Vec<_> = Path::new(&name).components().collect();
        assert_eq!(components.len(), 1);
        assert!(matches!(components[0], Component::Normal(_)));

        assert_eq!(archive_file_name("C:\\temp\tab", "x"), "C:_temp_tab-lab.tar.gz");
        assert_eq!(archive_file_name("Cache", "cache"), "Cache-lab.tar.gz");
    }

    #[test]
    fn file_name_falls_back_when_name_is_unusable() {
        assert_eq!(archive_file_name("..", "disk-full"), "disk-full-lab.tar.gz");
        assert_eq!(archive_file_name("  ", "disk-full"), "disk-full-lab.tar.gz");
        assert_eq!(archive_file_name("/", "."), "problem-lab.tar.gz");
    }
}
