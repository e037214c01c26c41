//! Asset copy step.
//!
//! Copies the listed HTML pages into the output directory and recursively
//! copies each listed asset directory into a same-named output
//! subdirectory. Existing destination files are overwritten; files absent
//! from the source are never deleted here — only the driver's clean step
//! guarantees a pristine tree.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use walkdir::WalkDir;

/// The pages and directories the asset step copies.
#[derive(Debug, Clone)]
pub struct AssetSet {
    /// Top-level HTML files, copied individually
    pub pages: Vec<PathBuf>,

    /// Directories copied recursively
    pub dirs: Vec<PathBuf>,
}

/// Errors from the asset step.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to copy {path}: {source}")]
    Copy {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Copy all pages and asset directories from `root` into `out_dir`.
///
/// Returns the number of files copied.
pub fn copy_assets(root: &Path, set: &AssetSet, out_dir: &Path) -> Result<usize, AssetError> {
    fs::create_dir_all(out_dir).map_err(|e| AssetError::CreateDir {
        path: out_dir.display().to_string(),
        source: e,
    })?;

    let mut copied = 0;

    for page in &set.pages {
        let src = root.join(page);
        let file_name = page.file_name().unwrap_or(page.as_os_str());
        let dest = out_dir.join(file_name);
        fs::copy(&src, &dest).map_err(|e| AssetError::Copy {
            path: src.display().to_string(),
            source: e,
        })?;
        copied += 1;
    }

    for dir in &set.dirs {
        let src = root.join(dir);
        if !src.is_dir() {
            return Err(AssetError::NotADirectory(src.display().to_string()));
        }
        copied += copy_dir_recursive(&src, &out_dir.join(dir))?;
    }

    Ok(copied)
}

/// Recursively copy `src` into `dest`, creating destination directories as
/// needed and overwriting existing files. File copies run in parallel.
///
/// Returns the number of files copied.
pub fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<usize, AssetError> {
    let mut files: Vec<(PathBuf, PathBuf)> = Vec::new();

    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry.map_err(|e| AssetError::Copy {
            path: src.display().to_string(),
            source: io::Error::other(e),
        })?;

        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| AssetError::CreateDir {
                path: target.display().to_string(),
                source: e,
            })?;
        } else {
            files.push((entry.path().to_path_buf(), target));
        }
    }

    files
        .par_iter()
        .map(|(from, to)| {
            fs::copy(from, to).map_err(|e| AssetError::Copy {
                path: from.display().to_string(),
                source: e,
            })?;
            Ok(())
        })
        .collect::<Result<Vec<()>, AssetError>>()?;

    Ok(files.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn set() -> AssetSet {
        AssetSet {
            pages: vec![PathBuf::from("index.html")],
            dirs: vec![PathBuf::from("assets")],
        }
    }

    #[test]
    fn copies_pages_and_nested_directories() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let out = root.join("dist");

        fs::write(root.join("index.html"), "<html></html>").unwrap();
        fs::create_dir_all(root.join("assets/img/icons")).unwrap();
        fs::write(root.join("assets/img/logo.png"), b"\x89PNG fake").unwrap();
        fs::write(root.join("assets/img/icons/star.svg"), "<svg/>").unwrap();

        let copied = copy_assets(root, &set(), &out).unwrap();
        assert_eq!(copied, 3);

        assert_eq!(fs::read_to_string(out.join("index.html")).unwrap(), "<html></html>");
        assert_eq!(
            fs::read(out.join("assets/img/logo.png")).unwrap(),
            fs::read(root.join("assets/img/logo.png")).unwrap()
        );
        assert_eq!(
            fs::read_to_string(out.join("assets/img/icons/star.svg")).unwrap(),
            "<svg/>"
        );
    }

    #[test]
    fn overwrites_but_never_deletes_destination_files() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let out = root.join("dist");

        fs::write(root.join("index.html"), "fresh").unwrap();
        fs::create_dir_all(root.join("assets")).unwrap();
        fs::write(root.join("assets/a.txt"), "new").unwrap();

        fs::create_dir_all(out.join("assets")).unwrap();
        fs::write(out.join("assets/a.txt"), "old").unwrap();
        fs::write(out.join("assets/stale.txt"), "stale").unwrap();

        copy_assets(root, &set(), &out).unwrap();

        assert_eq!(fs::read_to_string(out.join("assets/a.txt")).unwrap(), "new");
        // repeated copies accumulate; only the clean step removes stale files
        assert!(out.join("assets/stale.txt").exists());
    }

    #[test]
    fn missing_page_fails() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("assets")).unwrap();

        let err = copy_assets(root, &set(), &root.join("dist")).unwrap_err();
        assert!(matches!(err, AssetError::Copy { .. }));
    }

    #[test]
    fn asset_dir_must_be_a_directory() {
        let temp = tempdir().unwrap();
        let root = temp.path();

        fs::write(root.join("index.html"), "x").unwrap();
        fs::write(root.join("assets"), "not a dir").unwrap();

        let err = copy_assets(root, &set(), &root.join("dist")).unwrap_err();
        assert!(matches!(err, AssetError::NotADirectory(_)));
    }
}
