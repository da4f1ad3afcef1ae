//! Population statistics from FreeSurfer outputs.
//!
//! This crate drives the FreeSurfer command line tools that summarize subject stats (`aparcstats2table`,
//! `asegstats2table`) and resample surface textures (`mri_surf2surf`), and aggregates their outputs over
//! a population of subjects.

pub mod configuration;
pub mod error;
pub mod fs_mgh;
pub mod npz;
pub mod stattools;
pub mod surftools;
pub mod traits;
pub mod util;
pub mod wrapper;

pub use configuration::{load_environment, FsConfig, DEFAULT_FREESURFER_CONFIG};
pub use error::{FsStatsError, Result};
pub use fs_mgh::{read_mgh, write_mgh, FsMgh, FsMghHeader};
pub use npz::{read_npz, write_npz};
pub use stattools::{
    aparcstats2table, asegstats2table, generate_stat_table, list_subjects, summarize_population, summarize_tables,
    textures2table, write_textures_csv, PopulationStats, RegionStats, SaveMode, StatTable, StatTableKind,
    StatTableType, TextureMap,
};
pub use surftools::mri_surf2surf;
pub use traits::ToolRunner;
pub use wrapper::{FsWrapper, ToolOutput};
