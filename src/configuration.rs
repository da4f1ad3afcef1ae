//! Loading of the environment needed by external programs (for instance FreeSurfer) from a shell setup script.

use log::debug;
use regex::Regex;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{FsStatsError, Result};

/// The default FreeSurfer setup script.
pub const DEFAULT_FREESURFER_CONFIG: &str = "/i2bm/local/freesurfer/SetUpFreeSurfer.sh";

/// Name of the environment variable that overrides [`DEFAULT_FREESURFER_CONFIG`] in [`FsConfig::from_env`].
pub const FREESURFER_CONFIG_ENV: &str = "FSSTATS_FREESURFER_CONFIG";

/// Describes how external tools obtain their environment.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FsConfig {
    /// Shell script that sets up the environment. If `None`, tools inherit the environment of this process unchanged.
    pub sh_file: Option<PathBuf>,
    /// The environment the script is sourced in. Leave empty to get only the program variables.
    pub base_env: HashMap<String, String>,
}

impl FsConfig {
    /// A configuration that sources the given setup script in an empty environment.
    pub fn new<P: AsRef<Path>>(sh_file: P) -> FsConfig {
        FsConfig {
            sh_file: Some(sh_file.as_ref().to_path_buf()),
            base_env: HashMap::new(),
        }
    }

    /// The default FreeSurfer configuration, honouring the `FSSTATS_FREESURFER_CONFIG` override.
    pub fn from_env() -> FsConfig {
        match std::env::var(FREESURFER_CONFIG_ENV) {
            Ok(path) if !path.is_empty() => FsConfig::new(path),
            _ => FsConfig::new(DEFAULT_FREESURFER_CONFIG),
        }
    }

    /// Load the environment described by this configuration. Empty if no setup script is configured.
    pub fn load(&self) -> Result<HashMap<String, String>> {
        match &self.sh_file {
            Some(sh_file) => load_environment(sh_file, &self.base_env),
            None => Ok(HashMap::new()),
        }
    }
}


/// Return the environment defined by sourcing a shell setup script.
///
/// The script is sourced by `bash` in `base_env` only, and the resulting environment is dumped with `printenv`.
/// Variables are expected in the form `VARIABLE_NAME=value`; an `export ` prefix and single quotes are tolerated.
/// The working directory variable `PWD` is never part of the result.
///
/// # Examples
///
/// ```no_run
/// let env = fsstats::load_environment("/usr/local/freesurfer/SetUpFreeSurfer.sh", &std::collections::HashMap::new()).unwrap();
/// println!("FREESURFER_HOME={:?}", env.get("FREESURFER_HOME"));
/// ```
pub fn load_environment<P: AsRef<Path>>(sh_file: P, base_env: &HashMap<String, String>) -> Result<HashMap<String, String>> {
    let script = format!(". '{}' ; printenv", sh_file.as_ref().display());
    debug!("Loading environment from '{}'.", sh_file.as_ref().display());
    let output = Command::new("bash")
        .arg("-c")
        .arg(&script)
        .env_clear()
        .envs(base_env)
        .output()?;

    if !output.status.success() {
        return Err(FsStatsError::Configuration(String::from_utf8_lossy(&output.stderr).into_owned()));
    }

    let stdout = String::from_utf8(output.stdout)
        .map_err(|e| FsStatsError::Configuration(format!("environment output is not valid UTF-8: {}", e)))?;
    parse_environment(&stdout)
}


/// Parse `printenv`-style output into a mapping, skipping `PWD` and lines that are not simple assignments.
pub fn parse_environment(text: &str) -> Result<HashMap<String, String>> {
    let assignment = Regex::new(r"^(\w+)=(\S*)$")?;
    let mut environment = HashMap::new();
    for line in text.lines() {
        let line = if line.starts_with("export") {
            line.replace("export ", "").replace('\'', "")
        } else {
            line.to_string()
        };
        if let Some(caps) = assignment.captures(&line) {
            let name = &caps[1];
            if name != "PWD" {
                environment.insert(name.to_string(), caps[2].to_string());
            }
        }
    }
    Ok(environment)
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn simple_assignments_are_parsed() {
        let env = parse_environment("A=1\nB=two\nPWD=/tmp\n").unwrap();
        assert_eq!(2, env.len());
        assert_eq!("1", env["A"]);
        assert_eq!("two", env["B"]);
        assert!(!env.contains_key("PWD"));
    }

    #[test]
    fn export_prefix_and_quotes_are_stripped() {
        let env = parse_environment("export FREESURFER_HOME='/opt/freesurfer'\n").unwrap();
        assert_eq!("/opt/freesurfer", env["FREESURFER_HOME"]);
    }

    #[test]
    fn values_with_whitespace_and_non_assignments_are_ignored() {
        let env = parse_environment("GREETING=hello world\nnot an assignment\nEMPTY=\n").unwrap();
        assert_eq!(1, env.len());
        assert_eq!("", env["EMPTY"]);
    }

    #[test]
    fn the_default_config_can_be_overridden() {
        std::env::remove_var(FREESURFER_CONFIG_ENV);
        assert_eq!(Some(PathBuf::from(DEFAULT_FREESURFER_CONFIG)), FsConfig::from_env().sh_file);
        std::env::set_var(FREESURFER_CONFIG_ENV, "/opt/freesurfer/SetUpFreeSurfer.sh");
        assert_eq!(Some(PathBuf::from("/opt/freesurfer/SetUpFreeSurfer.sh")), FsConfig::from_env().sh_file);
        std::env::remove_var(FREESURFER_CONFIG_ENV);
    }

    #[test]
    fn config_without_script_loads_nothing() {
        let config = FsConfig::default();
        assert!(config.load().unwrap().is_empty());
    }
}
