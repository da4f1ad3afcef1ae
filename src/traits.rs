use std::path::Path;

use crate::error::Result;
use crate::wrapper::ToolOutput;

/// Something that can run an external command line, like a FreeSurfer binary.
///
/// `subjects_dir`, if given, is the FreeSurfer subjects directory the command should see as `SUBJECTS_DIR`.
/// A non-zero exit status is not an error of `run` itself; callers inspect [`ToolOutput::exitcode`] or use [`ToolOutput::check`].
pub trait ToolRunner {
    fn run(&self, cmd: &[String], subjects_dir: Option<&Path>) -> Result<ToolOutput>;
}
