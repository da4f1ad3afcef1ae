//! Population statistics from FreeSurfer outputs.
//!
//! Stats tables are generated with FreeSurfer's `aparcstats2table` and `asegstats2table`, surface textures are
//! resampled to a common icosahedron and collected into a single table, and previously generated stats tables
//! can be summarized over a population.

use csv::{ReaderBuilder, Trim, WriterBuilder};
use log::{info, warn};
use ndarray::Array1;
use ndarray_stats::SummaryStatisticsExt;
use serde::Serialize;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{FsStatsError, Result};
use crate::fs_mgh::read_mgh;
use crate::npz::write_npz;
use crate::surftools::{mri_surf2surf, HEMISPHERES, ICO_ORDERS};
use crate::traits::ToolRunner;
use crate::util::{check_dir, ensure_dir, hemisphere_from_name, subject_from_path};

/// The surface measures summarized by `aparcstats2table`, in generation order.
pub const APARC_MEASURES: [&str; 8] = ["area", "volume", "thickness", "thicknessstd", "meancurv", "gauscurv", "foldind", "curvind"];

/// The hemisphere key used for volume based (aseg) statistics.
pub const ASEG_KEY: &str = "aseg";


/// The two kinds of tables FreeSurfer can generate from the subject stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatTableType {
    /// Per hemisphere cortical parcellation stats, from `?h.aparc.stats`.
    Aparc,
    /// Subcortical segmentation volumes, from `aseg.stats`.
    Aseg,
}


/// What a stats table contains. Determines its file name and the header of its subject column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StatTableKind {
    Aseg { measure: String },
    Aparc { parcellation: String, hemi: String, measure: String },
}

impl StatTableKind {

    pub fn aseg(measure: &str) -> StatTableKind {
        StatTableKind::Aseg { measure: measure.to_string() }
    }

    pub fn aparc(hemi: &str, measure: &str) -> StatTableKind {
        StatTableKind::Aparc { parcellation: String::from("aparc"), hemi: hemi.to_string(), measure: measure.to_string() }
    }

    /// The hemisphere key under which the table is summarized: `lh`, `rh`, or `aseg`.
    pub fn hemi(&self) -> &str {
        match self {
            StatTableKind::Aseg { .. } => ASEG_KEY,
            StatTableKind::Aparc { hemi, .. } => hemi.as_str(),
        }
    }

    pub fn measure(&self) -> &str {
        match self {
            StatTableKind::Aseg { measure } => measure.as_str(),
            StatTableKind::Aparc { measure, .. } => measure.as_str(),
        }
    }

    /// The header of the column holding the subject identifiers, as written by FreeSurfer.
    pub fn subject_header(&self) -> String {
        match self {
            StatTableKind::Aseg { measure } => format!("Measure:{}", measure),
            StatTableKind::Aparc { parcellation, hemi, measure } => format!("{}.{}.{}", hemi, parcellation, measure),
        }
    }

    /// The file name, e.g. `aseg_stats_volume.csv` or `aparc_stats_lh_area.csv`.
    pub fn file_name(&self) -> String {
        match self {
            StatTableKind::Aseg { measure } => format!("aseg_stats_{}.csv", measure),
            StatTableKind::Aparc { parcellation, hemi, measure } => format!("{}_stats_{}_{}.csv", parcellation, hemi, measure),
        }
    }

    /// Recognize a stats table from its file name. Returns `None` for files that do not follow the naming convention.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<StatTableKind> {
        let name = path.as_ref().file_name()?.to_string_lossy().into_owned();
        let stem = name.split('.').next()?;
        let parts: Vec<&str> = stem.split('_').collect();
        if stem.starts_with("aseg") {
            match parts.as_slice() {
                [_, _, measure] => Some(StatTableKind::aseg(measure)),
                _ => None,
            }
        } else if stem.starts_with("aparc") {
            match parts.as_slice() {
                [parcellation, _, hemi, measure] => Some(StatTableKind::Aparc {
                    parcellation: parcellation.to_string(),
                    hemi: hemi.to_string(),
                    measure: measure.to_string(),
                }),
                _ => None,
            }
        } else {
            None
        }
    }

    /// The FreeSurfer command line that generates this table for the given subjects.
    fn command(&self, subjects: &[String], table_file: &Path) -> Vec<String> {
        let (tool, extra) = match self {
            StatTableKind::Aseg { .. } => ("asegstats2table", vec![]),
            StatTableKind::Aparc { hemi, .. } => ("aparcstats2table", vec![String::from("--hemi"), hemi.clone()]),
        };
        let mut cmd = vec![tool.to_string(), String::from("--subjects")];
        cmd.extend(subjects.iter().cloned());
        cmd.extend(extra);
        cmd.extend(vec![
            String::from("--meas"), self.measure().to_string(),
            String::from("--tablefile"), table_file.display().to_string(),
            String::from("--delimiter"), String::from("comma"),
        ]);
        if let StatTableKind::Aparc { .. } = self {
            cmd.push(String::from("--parcid-only"));
        }
        cmd
    }
}


/// A stats table on disk, together with what it contains.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatTable {
    pub kind: StatTableKind,
    pub path: PathBuf,
}


/// The subjects of a FreeSurfer subjects directory: the sorted names of all direct, non-hidden subdirectories that contain a `stats` directory.
pub fn list_subjects<P: AsRef<Path>>(fsdir: P) -> Result<Vec<String>> {
    let mut subjects = Vec::new();
    for entry in std::fs::read_dir(fsdir.as_ref())? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') && entry.path().join("stats").is_dir() {
            subjects.push(name);
        }
    }
    subjects.sort();
    Ok(subjects)
}


/// Generate comma separated stats tables for all subjects of `fsdir` into `outdir/stats`.
///
/// For [`StatTableType::Aparc`], one table is generated per hemisphere and measure in [`APARC_MEASURES`], hemisphere
/// first. For [`StatTableType::Aseg`], a single volume table is generated. The first failing FreeSurfer call aborts
/// the generation; tables written before it are left on disk.
pub fn generate_stat_table<P, Q>(runner: &dyn ToolRunner, table_type: StatTableType, fsdir: P, outdir: Q) -> Result<Vec<StatTable>>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let fsdir = fsdir.as_ref();
    for path in &[fsdir, outdir.as_ref()] {
        check_dir(path)?;
    }

    let subjects = list_subjects(fsdir)?;
    let fsoutdir = ensure_dir(outdir.as_ref().join("stats"))?;

    let kinds: Vec<StatTableKind> = match table_type {
        StatTableType::Aparc => HEMISPHERES
            .iter()
            .flat_map(|hemi| APARC_MEASURES.iter().map(move |meas| StatTableKind::aparc(hemi, meas)))
            .collect(),
        StatTableType::Aseg => vec![StatTableKind::aseg("volume")],
    };

    let mut tables = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let path = fsoutdir.join(kind.file_name());
        runner.run(&kind.command(&subjects, &path), Some(fsdir))?.check()?;
        info!("Generated stats table '{}' for {} subjects.", path.display(), subjects.len());
        tables.push(StatTable { kind, path });
    }
    Ok(tables)
}


/// Binding over FreeSurfer's `aparcstats2table`: 16 tables, one per hemisphere and measure.
pub fn aparcstats2table<P: AsRef<Path>, Q: AsRef<Path>>(runner: &dyn ToolRunner, fsdir: P, outdir: Q) -> Result<Vec<StatTable>> {
    generate_stat_table(runner, StatTableType::Aparc, fsdir, outdir)
}


/// Binding over FreeSurfer's `asegstats2table`: a single subcortical volume table.
pub fn asegstats2table<P: AsRef<Path>, Q: AsRef<Path>>(runner: &dyn ToolRunner, fsdir: P, outdir: Q) -> Result<Vec<StatTable>> {
    generate_stat_table(runner, StatTableType::Aseg, fsdir, outdir)
}


/// How collected textures are saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    Numpy,
    Csv,
    All,
}

impl SaveMode {
    fn csv(self) -> bool {
        self != SaveMode::Numpy
    }

    fn numpy(self) -> bool {
        self != SaveMode::Csv
    }
}

impl FromStr for SaveMode {
    type Err = FsStatsError;

    fn from_str(s: &str) -> Result<SaveMode> {
        match s {
            "numpy" => Ok(SaveMode::Numpy),
            "csv" => Ok(SaveMode::Csv),
            "all" => Ok(SaveMode::All),
            _ => Err(FsStatsError::InvalidArgument(format!(
                "'{}' is not a valid save option must be in ['numpy', 'csv', 'all']", s))),
        }
    }
}


/// Resampled per-vertex texture values by subject identifier.
pub type TextureMap = BTreeMap<String, Vec<f32>>;


/// Collect the surface textures of all subjects into a single table.
///
/// The files matching the glob `pattern` below `fsdir` (e.g. `*/surf/lh.thickness`) are resampled to the
/// icosahedron of order `ico_order`, so that all subjects share the same vertices. The subject of a file is the
/// first path component below `fsdir`; the hemisphere is the part of the pattern's file name before the first dot.
///
/// If `outdir` is given, the list of matched files is written to `outdir/textures.json`. The resampled subject
/// textures are stored in `fsdir/textures/<name>/` and deleted afterwards unless `keep_individual_textures` is set.
/// The collected table is saved as `fsdir/textures/<name>.csv` (one row per subject, 4 digits) and/or as the
/// compressed numpy archive `fsdir/textures/<name>.npz`, depending on `save_mode` (`numpy`, `csv` or `all`).
///
/// Returns the written table files, CSV first.
pub fn textures2table<P>(
    runner: &dyn ToolRunner,
    pattern: &str,
    ico_order: u32,
    fsdir: P,
    outdir: Option<&Path>,
    keep_individual_textures: bool,
    save_mode: &str,
) -> Result<Vec<PathBuf>>
where
    P: AsRef<Path>,
{
    let save_mode: SaveMode = save_mode.parse()?;
    if !ICO_ORDERS.contains(&ico_order) {
        return Err(FsStatsError::InvalidArgument(format!("'{}' is not a valid icosahedron order, must be in [0, 7].", ico_order)));
    }
    let fsdir = fsdir.as_ref();

    let textures = find_textures(fsdir, pattern)?;
    if let Some(outdir) = outdir {
        let listing: Vec<String> = textures.iter().map(|p| p.display().to_string()).collect();
        let file = BufWriter::new(File::create(outdir.join("textures.json"))?);
        serde_json::to_writer_pretty(file, &listing)?;
    }

    let basename = Path::new(pattern)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| FsStatsError::InvalidArgument(format!("'{}' does not name texture files.", pattern)))?;
    let hemi = hemisphere_from_name(&basename);
    let fsoutdir = fsdir.join("textures");
    let surfacesdir = ensure_dir(fsoutdir.join(&basename))?;

    let mut textures_map = TextureMap::new();
    for texture_file in &textures {
        let sid = subject_from_path(fsdir, texture_file).ok_or_else(|| {
            FsStatsError::InvalidArgument(format!("Cannot find the subject of '{}'.", texture_file.display()))
        })?;
        if textures_map.contains_key(&sid) {
            return Err(FsStatsError::DuplicateSubject(sid));
        }

        let resampled_file = surfacesdir.join(format!("{}_{}.mgz", sid, basename));
        mri_surf2surf(runner, &hemi, texture_file, &resampled_file, ico_order, fsdir, &sid)?;
        textures_map.insert(sid, load_profile(&resampled_file)?);
    }

    if !keep_individual_textures {
        std::fs::remove_dir_all(&surfacesdir)?;
    }

    let mut textures_files = Vec::new();
    if save_mode.csv() {
        let path = fsoutdir.join(format!("{}.csv", basename));
        write_textures_csv(&path, &textures_map)?;
        textures_files.push(path);
    }
    if save_mode.numpy() {
        let path = fsoutdir.join(format!("{}.npz", basename));
        write_npz(&path, &textures_map)?;
        textures_files.push(path);
    }
    info!("Collected the '{}' textures of {} subjects.", basename, textures_map.len());
    Ok(textures_files)
}


/// The files below `fsdir` matching the glob `pattern`, sorted.
fn find_textures(fsdir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full_pattern = format!("{}/{}", escaped_dir(fsdir), pattern);
    let mut textures = glob::glob(&full_pattern)?.collect::<std::result::Result<Vec<_>, _>>()?;
    textures.sort();
    Ok(textures)
}


/// The directory as a glob pattern that matches only itself.
fn escaped_dir(dir: &Path) -> String {
    glob::Pattern::escape(dir.to_string_lossy().trim_end_matches('/'))
}


/// Load a resampled texture, which must be a volume of shape `(n, 1, 1)`, as a flat vector.
fn load_profile(path: &Path) -> Result<Vec<f32>> {
    let mgh = read_mgh(path)?;
    let shape = mgh.data_shape();
    if shape.len() != 3 {
        return Err(FsStatsError::Validation(format!(
            "Expected profile texture array of dimension 3 not '{}'", shape.len())));
    }
    if shape[1] != 1 || shape[2] != 1 {
        return Err(FsStatsError::Validation(format!(
            "Expected profile texture array of shape (*, 1, 1) not '{}'.", format_shape(&shape))));
    }
    Ok(mgh.to_f32_vec())
}

fn format_shape(shape: &[usize]) -> String {
    let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
    format!("({})", dims.join(", "))
}


/// Write collected textures as CSV without header: one row per subject, sorted by subject, values with 4 digits.
pub fn write_textures_csv<P: AsRef<Path>>(path: P, textures: &TextureMap) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).flexible(true).from_path(path)?;
    for (sid, values) in textures {
        let mut row = Vec::with_capacity(values.len() + 1);
        row.push(sid.clone());
        row.extend(values.iter().map(|v| format!("{:.4}", v)));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}


/// The values of one region over a population, with their mean `m` and population standard deviation `s`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionStats {
    pub values: Vec<f64>,
    pub m: f64,
    pub s: f64,
}

impl RegionStats {
    /// Summarize the values. Mean and standard deviation are NaN if there are no values.
    pub fn from_values(values: Vec<f64>) -> RegionStats {
        let arr = Array1::from(values);
        let m = SummaryStatisticsExt::mean(&arr).unwrap_or(f64::NAN);
        let s = arr.central_moment(2).map(f64::sqrt).unwrap_or(f64::NAN);
        RegionStats { values: arr.to_vec(), m, s }
    }
}

/// Region statistics by hemisphere key (`lh`, `rh`, `aseg`), measure and region name.
pub type PopulationStats = BTreeMap<String, BTreeMap<String, BTreeMap<String, RegionStats>>>;


/// Compute the mean and standard deviation of all stats tables in `fsdir/stats`.
///
/// Tables are recognized by their file names, see [`StatTableKind::from_path`]; other CSV files are ignored.
/// If `sid` is given, only the values of that subject are used, i.e., the result holds the subject scores.
///
/// # Examples
///
/// ```no_run
/// let popstats = fsstats::summarize_population("/path/to/outdir", None).unwrap();
/// let hippocampus = &popstats["aseg"]["volume"]["Left-Hippocampus"];
/// println!("mean {} std {}", hippocampus.m, hippocampus.s);
/// ```
pub fn summarize_population<P: AsRef<Path>>(fsdir: P, sid: Option<&str>) -> Result<PopulationStats> {
    let pattern = format!("{}/*.csv", escaped_dir(&fsdir.as_ref().join("stats")));
    let mut tables = Vec::new();
    for path in glob::glob(&pattern)? {
        let path = path?;
        match StatTableKind::from_path(&path) {
            Some(kind) => tables.push(StatTable { kind, path }),
            None => {
                let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                if name.starts_with("aseg") || name.starts_with("aparc") {
                    warn!("Skipping stats table '{}' with an unexpected name.", path.display());
                }
            }
        }
    }
    summarize_tables(&tables, sid)
}


/// Compute the mean and standard deviation of each region of the given stats tables.
///
/// The result always has the keys `lh`, `rh` and `aseg`. Every region column of a table is present in the result,
/// even if `sid` matches no row of that table, in which case its values are empty and its statistics are NaN.
pub fn summarize_tables(tables: &[StatTable], sid: Option<&str>) -> Result<PopulationStats> {
    let mut raw: BTreeMap<(String, String), BTreeMap<String, Vec<f64>>> = BTreeMap::new();
    for table in tables {
        let key = (table.kind.hemi().to_string(), table.kind.measure().to_string());
        read_stat_table(table, sid, raw.entry(key).or_insert_with(BTreeMap::new))?;
    }

    let mut popstats = PopulationStats::new();
    for hemi in HEMISPHERES.iter().chain(std::iter::once(&ASEG_KEY)) {
        popstats.insert(hemi.to_string(), BTreeMap::new());
    }
    for ((hemi, measure), regions) in raw {
        let summary: BTreeMap<String, RegionStats> = regions.into_iter().map(|(region, values)| (region, RegionStats::from_values(values))).collect();
        popstats.entry(hemi).or_insert_with(BTreeMap::new).insert(measure, summary);
    }
    Ok(popstats)
}


/// Append the region values of a stats table, restricted to subject `sid` if given, to `regions`.
fn read_stat_table(table: &StatTable, sid: Option<&str>, regions: &mut BTreeMap<String, Vec<f64>>) -> Result<()> {
    let mut reader = ReaderBuilder::new().delimiter(b',').trim(Trim::All).from_path(&table.path)?;
    let headers = reader.headers()?.clone();
    let subject_header = table.kind.subject_header();
    let subject_col = headers.iter().position(|h| h == subject_header).ok_or_else(|| {
        FsStatsError::InvalidArgument(format!("Stats table '{}' has no '{}' column.", table.path.display(), subject_header))
    })?;

    for (col, header) in headers.iter().enumerate() {
        if col != subject_col {
            regions.entry(header.to_string()).or_insert_with(Vec::new);
        }
    }

    for record in reader.records() {
        let record = record?;
        if let Some(sid) = sid {
            if record.get(subject_col) != Some(sid) {
                continue;
            }
        }
        for (col, (header, value)) in headers.iter().zip(record.iter()).enumerate() {
            if col == subject_col {
                continue;
            }
            let value: f64 = value.parse().map_err(|_| {
                FsStatsError::InvalidStatValue(table.path.clone(), header.to_string(), value.to_string())
            })?;
            regions.entry(header.to_string()).or_insert_with(Vec::new).push(value);
        }
    }
    Ok(())
}


#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn table_kinds_are_recognized_from_file_names() {
        let aseg = StatTableKind::from_path("/out/stats/aseg_stats_volume.csv").unwrap();
        assert_eq!(StatTableKind::aseg("volume"), aseg);
        assert_eq!("Measure:volume", aseg.subject_header());
        assert_eq!("aseg", aseg.hemi());

        let aparc = StatTableKind::from_path("/out/stats/aparc_stats_rh_thicknessstd.csv").unwrap();
        assert_eq!(StatTableKind::aparc("rh", "thicknessstd"), aparc);
        assert_eq!("rh.aparc.thicknessstd", aparc.subject_header());

        assert_eq!(None, StatTableKind::from_path("/out/stats/wmparc_stats_volume.csv"));
        assert_eq!(None, StatTableKind::from_path("/out/stats/aseg_volume.csv"));
    }

    #[test]
    fn file_names_follow_the_convention() {
        for kind in &[StatTableKind::aseg("volume"), StatTableKind::aparc("lh", "meancurv")] {
            assert_eq!(Some(kind.clone()), StatTableKind::from_path(kind.file_name()));
        }
    }

    #[test]
    fn aparc_commands_request_parcellation_ids() {
        let subjects = vec![String::from("s1"), String::from("s2")];
        let cmd = StatTableKind::aparc("lh", "area").command(&subjects, Path::new("/out/stats/aparc_stats_lh_area.csv"));
        assert_eq!("aparcstats2table --subjects s1 s2 --hemi lh --meas area --tablefile /out/stats/aparc_stats_lh_area.csv \
                    --delimiter comma --parcid-only", cmd.join(" "));

        let cmd = StatTableKind::aseg("volume").command(&subjects, Path::new("/out/stats/aseg_stats_volume.csv"));
        assert_eq!("asegstats2table --subjects s1 s2 --meas volume --tablefile /out/stats/aseg_stats_volume.csv \
                    --delimiter comma", cmd.join(" "));
    }

    #[test]
    fn save_modes_are_parsed() {
        assert_eq!(SaveMode::Numpy, "numpy".parse::<SaveMode>().unwrap());
        assert_eq!(SaveMode::All, "all".parse::<SaveMode>().unwrap());
        assert!(matches!("xml".parse::<SaveMode>(), Err(FsStatsError::InvalidArgument(_))));
    }

    #[test]
    fn region_stats_use_the_population_deviation() {
        let stats = RegionStats::from_values(vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_abs_diff_eq!(5.0, stats.m, epsilon = 1e-12);
        assert_abs_diff_eq!(2.0, stats.s, epsilon = 1e-12);
    }

    #[test]
    fn region_stats_of_nothing_are_nan() {
        let stats = RegionStats::from_values(Vec::new());
        assert!(stats.values.is_empty());
        assert!(stats.m.is_nan());
        assert!(stats.s.is_nan());
    }

    #[test]
    fn shapes_are_formatted_like_tuples() {
        assert_eq!("(100, 2, 1)", format_shape(&[100, 2, 1]));
    }
}
