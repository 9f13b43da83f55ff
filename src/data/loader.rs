// ============================================================
// Layer 4 — Image Folder Loader
// ============================================================
// Reads a directory laid out as one subdirectory per class:
//
//   train/images/
//     crazing/      crazing_1.jpg, crazing_2.jpg, ...
//     inclusion/    inclusion_1.jpg, ...
//     ...
//
// Class names are the subdirectory names, sorted. Files inside
// each class folder are sorted too, so a scan of the same tree
// always yields the same list in the same order.
//
// Only files with an image extension are picked up
// (bmp, gif, jpeg, jpg, png); annotation files and anything
// else in the tree are ignored.
//
// Reference: Rust Book §9 (Error Handling)

use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::{class_set::ClassSet, labeled_image::LabeledImage, traits::ImageSource};

/// Lower-case extensions accepted as images
pub const IMAGE_EXTENSIONS: [&str; 5] = ["bmp", "gif", "jpeg", "jpg", "png"];

/// Loads labeled image paths from a directory-per-class tree.
pub struct ImageFolderLoader {
    /// Root of the tree (the directory holding the class folders)
    dir: PathBuf,
}

impl ImageFolderLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Sorted subdirectories of the root
    fn class_dirs(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Cannot read image directory '{}'", self.dir.display()))?;

        let mut dirs = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                dirs.push(path);
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}

impl ImageSource for ImageFolderLoader {
    fn classes(&self) -> Result<ClassSet> {
        let mut names = Vec::new();
        for dir in self.class_dirs()? {
            match dir.file_name().and_then(|n| n.to_str()) {
                Some(name) => names.push(name.to_string()),
                None => bail!("Class directory name '{}' is not valid UTF-8", dir.display()),
            }
        }

        if names.is_empty() {
            bail!("No class directories found in '{}'", self.dir.display());
        }
        Ok(ClassSet::new(names))
    }

    fn load_all(&self, classes: &ClassSet) -> Result<Vec<LabeledImage>> {
        // The tree must hold exactly the expected classes, otherwise
        // labels would silently point at the wrong defect type.
        let found = self.classes()?;
        classes.ensure_matches(&found, &self.dir.display().to_string())?;

        let mut images = Vec::new();

        for (label, name) in classes.names().iter().enumerate() {
            let class_dir = self.dir.join(name);
            let mut files = Vec::new();

            for entry in fs::read_dir(&class_dir)
                .with_context(|| format!("Cannot read class directory '{}'", class_dir.display()))?
            {
                let path = entry?.path();
                if path.is_file() && has_image_extension(&path) {
                    files.push(path);
                }
            }
            files.sort();

            tracing::debug!("Class {} '{}': {} images", label, name, files.len());
            images.extend(files.into_iter().map(|p| LabeledImage::new(p, label)));
        }

        if images.is_empty() {
            bail!("No images found in '{}'", self.dir.display());
        }

        tracing::info!(
            "Found {} files belonging to {} classes in '{}'",
            images.len(),
            classes.len(),
            self.dir.display()
        );
        Ok(images)
    }
}

/// True if the path ends in one of `IMAGE_EXTENSIONS` (any case)
pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_classes_from_subdirectories() {
        let tmp = tempfile::tempdir().unwrap();
        for class in ["scratches", "crazing", "pitted_surface"] {
            fs::create_dir_all(tmp.path().join(class)).unwrap();
        }
        // Loose files at the root are not classes
        touch(&tmp.path().join("README.txt"));

        let classes = ImageFolderLoader::new(tmp.path()).classes().unwrap();
        assert_eq!(classes.len(), 3);
        assert_eq!(classes.names()[0], "crazing");
    }

    #[test]
    fn test_labels_follow_sorted_class_order() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("B/b2.jpg"));
        touch(&tmp.path().join("B/b1.PNG"));
        touch(&tmp.path().join("A/a1.jpg"));
        touch(&tmp.path().join("A/notes.xml"));

        let loader  = ImageFolderLoader::new(tmp.path());
        let classes = loader.classes().unwrap();
        let images  = loader.load_all(&classes).unwrap();

        assert_eq!(images.len(), 3);
        assert_eq!(images[0].label, 0);
        assert_eq!(images[0].file_name(), "a1.jpg");
        assert_eq!(images[1].file_name(), "b1.PNG");
        assert_eq!(images[2].label, 1);
    }

    #[test]
    fn test_unknown_class_in_split_fails() {
        let train = tempfile::tempdir().unwrap();
        let val   = tempfile::tempdir().unwrap();
        touch(&train.path().join("A/1.jpg"));
        touch(&train.path().join("B/1.jpg"));
        touch(&val.path().join("A/1.jpg"));
        touch(&val.path().join("B/1.jpg"));
        touch(&val.path().join("C/1.jpg"));

        let classes = ImageFolderLoader::new(train.path()).classes().unwrap();
        assert!(ImageFolderLoader::new(val.path()).load_all(&classes).is_err());
    }

    #[test]
    fn test_empty_split_fails() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("A")).unwrap();

        let loader  = ImageFolderLoader::new(tmp.path());
        let classes = loader.classes().unwrap();
        assert!(loader.load_all(&classes).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_class_name_fails() {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("A/1.jpg"));
        // Some filesystems refuse non-UTF-8 names; nothing to check there
        if fs::create_dir(tmp.path().join(OsStr::from_bytes(b"B\xff"))).is_err() {
            return;
        }
        touch(&tmp.path().join(OsStr::from_bytes(b"B\xff")).join("1.jpg"));

        let err = ImageFolderLoader::new(tmp.path()).classes().unwrap_err();
        assert!(err.to_string().contains("not valid UTF-8"));
    }

    #[test]
    fn test_missing_directory_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = ImageFolderLoader::new(tmp.path().join("nope"));
        assert!(loader.classes().is_err());
    }

    #[test]
    fn test_image_extensions() {
        assert!(has_image_extension(Path::new("x/img.JPEG")));
        assert!(has_image_extension(Path::new("img.bmp")));
        assert!(!has_image_extension(Path::new("img.xml")));
        assert!(!has_image_extension(Path::new("img")));
    }
}
