//! Running FreeSurfer command line tools as subprocesses.

use log::debug;

use std::path::Path;
use std::process::Command;

use crate::configuration::FsConfig;
use crate::error::{FsStatsError, Result};
use crate::traits::ToolRunner;

/// The environment variable FreeSurfer tools use to locate subjects.
pub const SUBJECTS_DIR_ENV: &str = "SUBJECTS_DIR";

/// The outcome of one external tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// The command line that was run, program first.
    pub cmd: Vec<String>,
    /// Exit status, `-1` if the process was terminated by a signal.
    pub exitcode: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exitcode == 0
    }

    /// Turn a non-zero exit status into a [`FsStatsError::ToolExecution`] carrying the tool name, its arguments and all output.
    pub fn check(self) -> Result<ToolOutput> {
        if self.success() {
            return Ok(self);
        }
        let tool = self.cmd.first().cloned().unwrap_or_default();
        let args = self.cmd.iter().skip(1).cloned().collect::<Vec<String>>().join(" ");
        Err(FsStatsError::ToolExecution(tool, args, format!("{}{}", self.stderr, self.stdout)))
    }
}


/// Runs FreeSurfer tools in the environment defined by an [`FsConfig`].
///
/// The setup script is sourced for every call. Its variables are added on top of the environment of this
/// process, and `SUBJECTS_DIR` is set on the child only, so the environment of this process is never modified.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FsWrapper {
    pub config: FsConfig,
}

impl FsWrapper {
    pub fn new(config: FsConfig) -> FsWrapper {
        FsWrapper { config }
    }
}

impl ToolRunner for FsWrapper {
    fn run(&self, cmd: &[String], subjects_dir: Option<&Path>) -> Result<ToolOutput> {
        let (program, args) = cmd
            .split_first()
            .ok_or_else(|| FsStatsError::InvalidArgument(String::from("empty command line")))?;

        let mut command = Command::new(program);
        command.args(args).envs(self.config.load()?);
        if let Some(dir) = subjects_dir {
            command.env(SUBJECTS_DIR_ENV, dir);
        }

        debug!("Running '{}'.", cmd.join(" "));
        let output = command.output()?;

        Ok(ToolOutput {
            cmd: cmd.to_vec(),
            exitcode: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}


#[cfg(test)]
mod test {
    use super::*;

    fn cmd(args: &[&str]) -> Vec<String> {
        args.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn a_failed_call_reports_tool_args_and_output() {
        let output = ToolOutput {
            cmd: cmd(&["asegstats2table", "--meas", "volume"]),
            exitcode: 1,
            stdout: String::from("out"),
            stderr: String::from("err "),
        };
        match output.check() {
            Err(FsStatsError::ToolExecution(tool, args, text)) => {
                assert_eq!("asegstats2table", tool);
                assert_eq!("--meas volume", args);
                assert_eq!("err out", text);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn the_wrapper_captures_output_and_exit_code() {
        let wrapper = FsWrapper::default();
        let ok = wrapper.run(&cmd(&["sh", "-c", "echo hello"]), None).unwrap();
        assert!(ok.success());
        assert_eq!("hello\n", ok.stdout);

        let failed = wrapper.run(&cmd(&["sh", "-c", "echo oops >&2; exit 3"]), None).unwrap();
        assert_eq!(3, failed.exitcode);
        assert_eq!("oops\n", failed.stderr);
    }

    #[test]
    fn subjects_dir_is_only_set_on_the_child() {
        let wrapper = FsWrapper::default();
        let before = std::env::var_os(SUBJECTS_DIR_ENV);
        let out = wrapper.run(&cmd(&["sh", "-c", "printf %s \"$SUBJECTS_DIR\""]), Some(Path::new("/data/subjects"))).unwrap();
        assert_eq!("/data/subjects", out.stdout);
        assert_eq!(before, std::env::var_os(SUBJECTS_DIR_ENV));
    }

    #[test]
    fn an_empty_command_line_is_rejected() {
        let wrapper = FsWrapper::default();
        assert!(matches!(wrapper.run(&[], None), Err(FsStatsError::InvalidArgument(_))));
    }
}
