//! Resampling of surface textures with FreeSurfer's `mri_surf2surf`.

use log::info;

use std::path::Path;

use crate::error::{FsStatsError, Result};
use crate::traits::ToolRunner;

/// The icosahedron orders supported by FreeSurfer's `ico` subject.
pub const ICO_ORDERS: std::ops::RangeInclusive<u32> = 0..=7;

/// The hemisphere tags understood by FreeSurfer.
pub const HEMISPHERES: [&str; 2] = ["lh", "rh"];


/// Resample the texture `texture_file` of subject `sid` onto the icosahedron of order `ico_order`.
///
/// The result is written to `dest_file` as an MGZ volume with one voxel per ico vertex.
pub fn mri_surf2surf<P, Q, R>(
    runner: &dyn ToolRunner,
    hemi: &str,
    texture_file: P,
    dest_file: Q,
    ico_order: u32,
    subjects_dir: R,
    sid: &str,
) -> Result<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    R: AsRef<Path>,
{
    if !HEMISPHERES.contains(&hemi) {
        return Err(FsStatsError::InvalidArgument(format!("'{}' is not a valid hemisphere, must be 'lh' or 'rh'.", hemi)));
    }
    if !ICO_ORDERS.contains(&ico_order) {
        return Err(FsStatsError::InvalidArgument(format!("'{}' is not a valid icosahedron order, must be in [0, 7].", ico_order)));
    }

    let cmd: Vec<String> = vec![
        String::from("mri_surf2surf"),
        String::from("--hemi"), hemi.to_string(),
        String::from("--srcsurfval"), texture_file.as_ref().display().to_string(),
        String::from("--srcsubject"), sid.to_string(),
        String::from("--trgsubject"), String::from("ico"),
        String::from("--trgicoorder"), ico_order.to_string(),
        String::from("--trgsurfval"), dest_file.as_ref().display().to_string(),
        String::from("--sd"), subjects_dir.as_ref().display().to_string(),
        String::from("--trg_type"), String::from("mgz"),
    ];
    runner.run(&cmd, Some(subjects_dir.as_ref()))?.check()?;
    info!("Resampled '{}' of subject '{}' to ico{}.", texture_file.as_ref().display(), sid, ico_order);
    Ok(())
}
