// Project build invocation: runs an arbitrary build command inside the
// configured build directory, capturing stdout+stderr to one reusable
// temporary file.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Instant;

use tempfile::NamedTempFile;
use tracing::{error, info};

use crate::protocol::{ResultData, Value, str_arg};
use crate::service::Service;

pub struct ProjectBuilder {
    build_dir: Option<PathBuf>,
    output_file: Option<NamedTempFile>,
}

impl Default for ProjectBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectBuilder {
    pub fn new() -> Self {
        Self {
            build_dir: None,
            output_file: None,
        }
    }
}

impl Service for ProjectBuilder {
    fn startup(&mut self, payload: &[Value]) {
        let Some(build_dir) = str_arg(payload, 0).map(PathBuf::from) else {
            error!("project-builder startup payload carries no build directory");
            return;
        };
        match tempfile::Builder::new()
            .suffix("_project_build_output")
            .tempfile()
        {
            Ok(file) => {
                info!(
                    "Build dir = '{}', output file = '{}'",
                    build_dir.display(),
                    file.path().display()
                );
                self.output_file = Some(file);
                self.build_dir = Some(build_dir);
            }
            Err(e) => error!("Cannot allocate build output file: {}", e),
        }
    }

    fn shutdown(&mut self, _payload: &[Value]) {
        self.output_file = None;
    }

    fn handle(&mut self, payload: &[Value]) -> (bool, Option<ResultData>) {
        let Some(build_command) = str_arg(payload, 0) else {
            error!("project-builder request payload carries no build command");
            return (false, None);
        };
        let (Some(build_dir), Some(output_file)) = (&self.build_dir, &self.output_file) else {
            error!("project-builder not operational; rejecting request");
            return (false, None);
        };
        let output_path = output_file.path().to_path_buf();
        // start from a clean capture for every build
        let capture = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&output_path);
        let capture = match capture {
            Ok(file) => file,
            Err(e) => {
                error!("Cannot open '{}' for build output: {}", output_path.display(), e);
                return (false, None);
            }
        };
        let stderr = match capture.try_clone() {
            Ok(file) => file,
            Err(e) => {
                error!("Cannot duplicate build output handle: {}", e);
                return (false, None);
            }
        };
        let start = Instant::now();
        let status = Command::new("sh")
            .arg("-c")
            .arg(build_command)
            .current_dir(build_dir)
            .stdout(Stdio::from(capture))
            .stderr(Stdio::from(stderr))
            .status();
        let elapsed = start.elapsed();
        info!(
            "Cmd '{}' in '{}' took {:.2}s",
            build_command,
            build_dir.display(),
            elapsed.as_secs_f64()
        );
        match status {
            Ok(status) => (
                status.success(),
                Some(ResultData::BuildOutput {
                    path: output_path,
                    elapsed,
                }),
            ),
            Err(e) => {
                error!("Build command failed to run: {}", e);
                (false, None)
            }
        }
    }
}
