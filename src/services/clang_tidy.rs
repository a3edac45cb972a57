// Static checking via an external clang-tidy binary. Tool output is captured
// into one temporary file that lives as long as the service.

use std::fs::File;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Instant;

use tempfile::NamedTempFile;
use tracing::{error, info, warn};

use crate::flags::CompilerFlags;
use crate::protocol::{ResultData, Value, bool_arg, str_arg};
use crate::service::Service;

pub struct ClangTidy {
    executable: String,
    compiler_options: Vec<String>,
    output_file: Option<NamedTempFile>,
}

impl Default for ClangTidy {
    fn default() -> Self {
        Self::new()
    }
}

impl ClangTidy {
    pub fn new() -> Self {
        Self::with_executable("clang-tidy")
    }

    /// Tests point this at a fake checker.
    pub fn with_executable(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            compiler_options: Vec::new(),
            output_file: None,
        }
    }

    fn ready(&self) -> bool {
        self.output_file.is_some() && !self.compiler_options.is_empty()
    }
}

impl Service for ClangTidy {
    fn startup(&mut self, payload: &[Value]) {
        let Some(compilation_database) = str_arg(payload, 0).map(PathBuf::from) else {
            error!("clang-tidy startup payload carries no compilation database");
            return;
        };
        match CompilerFlags::from_file(&compilation_database) {
            Ok(flags) => {
                self.compiler_options = flags.tidy_args();
                info!(
                    "clang-tidy will run with compiler options {:?}",
                    self.compiler_options
                );
            }
            Err(e) => {
                warn!(
                    "Unusable compilation database '{}': {}",
                    compilation_database.display(),
                    e
                );
                return;
            }
        }
        match tempfile::Builder::new()
            .suffix("_clang_tidy_output")
            .tempfile()
        {
            Ok(file) => self.output_file = Some(file),
            Err(e) => error!("Cannot allocate clang-tidy output file: {}", e),
        }
    }

    fn shutdown(&mut self, _payload: &[Value]) {
        self.output_file = None;
    }

    fn handle(&mut self, payload: &[Value]) -> (bool, Option<ResultData>) {
        let (Some(filename), Some(apply_fixes)) = (str_arg(payload, 0), bool_arg(payload, 1))
        else {
            error!("clang-tidy request payload must be (filename, apply_fixes)");
            return (false, None);
        };
        if !self.ready() {
            warn!("clang-tidy not operational; rejecting request");
            return (false, None);
        }
        let output_path = match &self.output_file {
            Some(file) => file.path().to_path_buf(),
            None => return (false, None),
        };
        let stdout = match File::create(&output_path) {
            Ok(file) => file,
            Err(e) => {
                error!("Cannot open '{}' for tool output: {}", output_path.display(), e);
                return (false, None);
            }
        };
        let mut command = Command::new(&self.executable);
        command.arg(filename);
        if apply_fixes {
            command.arg("-fix");
        }
        command.args(&self.compiler_options);
        info!(
            "Triggering clang-tidy over '{}' (fix = {})",
            filename, apply_fixes
        );
        let start = Instant::now();
        let status = command.stdout(Stdio::from(stdout)).status();
        info!(
            "clang-tidy over '{}' completed in {:.2}s",
            filename,
            start.elapsed().as_secs_f64()
        );
        match status {
            Ok(status) => (
                status.success(),
                Some(ResultData::ToolOutput(output_path)),
            ),
            Err(e) => {
                error!("clang-tidy failed to run: {}", e);
                (false, None)
            }
        }
    }
}
