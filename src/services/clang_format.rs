// Source formatting via an external clang-format binary. Requests format
// the file in place.

use std::path::PathBuf;
use std::process::Command;

use tracing::{error, info, warn};

use crate::protocol::{ResultData, Value, str_arg};
use crate::service::Service;

pub struct ClangFormat {
    executable: String,
    config_file: Option<PathBuf>,
    ready: bool,
}

impl Default for ClangFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl ClangFormat {
    pub fn new() -> Self {
        Self::with_executable("clang-format")
    }

    /// Tests point this at a fake formatter.
    pub fn with_executable(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            config_file: None,
            ready: false,
        }
    }

    fn executable_available(&self) -> bool {
        Command::new(&self.executable)
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

impl Service for ClangFormat {
    fn startup(&mut self, payload: &[Value]) {
        let Some(config_file) = str_arg(payload, 0).map(PathBuf::from) else {
            error!("clang-format startup payload carries no config file");
            return;
        };
        let config_exists = config_file.is_file();
        let executable_found = self.executable_available();
        if !config_exists {
            warn!("Config file '{}' does not exist", config_file.display());
        }
        if !executable_found {
            warn!("'{}' not found; formatting requests will fail", self.executable);
        }
        self.ready = config_exists && executable_found;
        info!(
            "Config file = '{}', executable = '{}', ready = {}",
            config_file.display(),
            self.executable,
            self.ready
        );
        self.config_file = Some(config_file);
    }

    fn shutdown(&mut self, _payload: &[Value]) {}

    fn handle(&mut self, payload: &[Value]) -> (bool, Option<ResultData>) {
        let Some(filename) = str_arg(payload, 0) else {
            error!("clang-format request payload carries no filename");
            return (false, None);
        };
        let (Some(config_file), true) = (&self.config_file, self.ready) else {
            warn!("clang-format not operational; rejecting request");
            return (false, None);
        };
        let status = Command::new(&self.executable)
            .arg("-i")
            .arg("-style=file")
            .arg(format!("-assume-filename={}", config_file.display()))
            .arg(filename)
            .status();
        info!("Filename = '{}', executable = '{}'", filename, self.executable);
        match status {
            Ok(status) => (status.success(), None),
            Err(e) => {
                error!("clang-format failed to run: {}", e);
                (false, None)
            }
        }
    }
}
