//! Utility functions used in all other fsstats modules.

use std::path::{Component, Path, PathBuf};

use crate::error::{FsStatsError, Result};

/// Check whether the file extension ends with ".gz" or ".mgz".
pub fn is_gz_file<P>(path: P) -> bool
where
    P: AsRef<Path>,
{
    path.as_ref()
        .file_name()
        .map(|a| {
            let name = a.to_string_lossy();
            name.ends_with(".gz") || name.ends_with(".mgz")
        })
        .unwrap_or(false)
}


/// Fail with [`FsStatsError::InvalidArgument`] unless the path is an existing directory.
pub fn check_dir<P: AsRef<Path>>(path: P) -> Result<()> {
    if path.as_ref().is_dir() {
        Ok(())
    } else {
        Err(FsStatsError::InvalidArgument(format!("'{}' is not a valid directory.", path.as_ref().display())))
    }
}


/// The subject identifier of a file below the subjects directory: the first path component after `subjects_dir`.
pub fn subject_from_path<P, Q>(subjects_dir: P, file: Q) -> Option<String>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let subjects_dir = without_cur_dir(subjects_dir.as_ref());
    let file = without_cur_dir(file.as_ref());
    let relative = file.strip_prefix(&subjects_dir).ok()?;
    relative.components().find_map(|c| match c {
        Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
        _ => None,
    })
}


/// The path with all `.` components removed. Glob results never start with `./`, even if the pattern did.
fn without_cur_dir(path: &Path) -> PathBuf {
    path.components().filter(|c| *c != Component::CurDir).collect()
}


/// The hemisphere tag encoded in a FreeSurfer file name like `lh.thickness`: everything before the first dot.
pub fn hemisphere_from_name<P: AsRef<Path>>(path: P) -> String {
    path.as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().split('.').next().unwrap_or("").to_string())
        .unwrap_or_default()
}


/// Create a directory and all its parents, if it does not exist yet.
pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    std::fs::create_dir_all(path.as_ref())?;
    Ok(path.as_ref().to_path_buf())
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn compressed_names_are_recognized() {
        assert!(is_gz_file("/tmp/brain.mgz"));
        assert!(is_gz_file("lh.thickness.gz"));
        assert!(!is_gz_file("/tmp/brain.mgh"));
    }

    #[test]
    fn the_subject_is_the_first_component_below_the_subjects_dir() {
        assert_eq!(Some(String::from("subject1")), subject_from_path("/data/fs", "/data/fs/subject1/surf/lh.thickness"));
        assert_eq!(None, subject_from_path("/data/fs", "/elsewhere/subject1/surf/lh.thickness"));
    }

    #[test]
    fn relative_subjects_dirs_match_glob_results() {
        assert_eq!(Some(String::from("s1")), subject_from_path("./fs", "fs/s1/surf/lh.thickness"));
        assert_eq!(Some(String::from("s1")), subject_from_path("./fs", "./fs/s1/surf/lh.thickness"));
        assert_eq!(Some(String::from("s1")), subject_from_path(".", "s1/surf/lh.thickness"));
    }

    #[test]
    fn the_hemisphere_is_the_name_prefix() {
        assert_eq!("lh", hemisphere_from_name("surf/lh.thickness"));
        assert_eq!("rh", hemisphere_from_name("rh.area.fwhm10"));
    }
}
