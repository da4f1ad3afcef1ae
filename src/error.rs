use quick_error::quick_error;
use std::io::Error as IOError;
use std::path::PathBuf;

quick_error! {
    /// Error type for all error variants originated by this crate.
    #[derive(Debug)]
    pub enum FsStatsError {
        /// The FreeSurfer setup script could not be sourced, or its output could not be parsed.
        Configuration(stderr: String) {
            display("Could not parse the configuration script: {}. Maybe you should check if all the dependencies are installed.", stderr)
        }

        InvalidArgument(msg: String) {
            display("Invalid argument: {}", msg)
        }

        /// An external FreeSurfer tool exited with a non-zero status.
        ToolExecution(tool: String, args: String, output: String) {
            display("FreeSurfer call '{} {}' failed with output: {}", tool, args, output)
        }

        /// A resampled texture did not have the expected (n, 1, 1) shape.
        Validation(msg: String) {
            display("Validation failed: {}", msg)
        }

        DuplicateSubject(sid: String) {
            display("Subject '{}' already treated, check the input pattern.", sid)
        }

        InvalidStatValue(file: PathBuf, column: String, value: String) {
            display("Non-numeric value '{}' in column '{}' of stat table '{}'", value, column, file.display())
        }

        /// Invalid MGH file: wrong format version.
        InvalidFsMghFormat {
            display("Invalid MGH file")
        }

        /// Invalid member of a numpy archive.
        InvalidNpyFormat(msg: String) {
            display("Invalid NPY member: {}", msg)
        }

        UnsupportedMriDataType(code: i32) {
            display("Unsupported MRI data type {} in MGH file", code)
        }

        /// I/O Error
        Io(err: IOError) {
            from()
            source(err)
        }

        Csv(err: csv::Error) {
            from()
            source(err)
        }

        Json(err: serde_json::Error) {
            from()
            source(err)
        }

        Zip(err: zip::result::ZipError) {
            from()
            source(err)
        }

        GlobPattern(err: glob::PatternError) {
            from()
            source(err)
        }

        Glob(err: glob::GlobError) {
            from()
            source(err)
        }

        Regex(err: regex::Error) {
            from()
            source(err)
        }
    }
}

/// Alias type for results originated from this crate.
pub type Result<T> = ::std::result::Result<T, FsStatsError>;
