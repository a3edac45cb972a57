// cxxd daemon binary: starts the dispatcher, brings the source-code-model
// service up and runs one full project index. Editors embed the library and
// use `cxxd::api` directly; this binary is the standalone way to (re)build
// the index and smoke-test a setup.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{Sender, unbounded};
use tracing::info;

use cxxd::api;
use cxxd::protocol::{ResultData, Value};
use cxxd::server::{Server, ServicePlugins};
use cxxd::service::{NullPlugin, ServicePlugin};

#[derive(Parser)]
#[command(name = "cxxd")]
#[command(about = "C/C++ source code intelligence daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Project root directory to index
    #[arg(long)]
    project_root: PathBuf,

    /// Compiler flags file (JSON compilation database or plain .txt)
    #[arg(long)]
    compiler_flags: PathBuf,

    /// Log file; defaults to .cxxd.log under the project root
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// Plugin that reports indexer completions back to the main thread.
struct CompletionPlugin {
    done: Sender<bool>,
}

impl ServicePlugin for CompletionPlugin {
    fn on_startup(&mut self, success: bool, _payload: &[Value]) {
        info!("source-code-model started (success = {})", success);
    }

    fn on_shutdown(&mut self, _success: bool, _payload: &[Value]) {}

    fn on_request(&mut self, success: bool, _payload: &[Value], _result: Option<ResultData>) {
        let _ = self.done.send(success);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_root = cli
        .project_root
        .canonicalize()
        .with_context(|| format!("no such project root: {}", cli.project_root.display()))?;
    let log_file = cli
        .log_file
        .unwrap_or_else(|| project_root.join(".cxxd.log"));

    let (done, indexed) = unbounded();
    let plugins = ServicePlugins {
        source_code_model: Box::new(move || {
            Box::new(CompletionPlugin { done: done.clone() }) as Box<dyn ServicePlugin>
        }),
        project_builder: null_plugin_factory(),
        clang_format: null_plugin_factory(),
        clang_tidy: null_plugin_factory(),
    };

    let handle = api::start_server(move |queue| Server::new(queue, plugins), &log_file)?;

    api::source_code_model_start(&handle, &project_root, &cli.compiler_flags);
    api::indexer_run_on_directory_request(&handle);

    let success = indexed.recv().unwrap_or(false);
    println!(
        "{}: index of {} {}",
        env!("CARGO_PKG_NAME"),
        project_root.display(),
        if success { "ready" } else { "FAILED (see log)" }
    );

    api::stop_server(&handle, Vec::new());
    handle.join();
    if success { Ok(()) } else { std::process::exit(1) }
}

fn null_plugin_factory() -> cxxd::server::PluginFactory {
    Box::new(|| Box::new(NullPlugin) as Box<dyn ServicePlugin>)
}
