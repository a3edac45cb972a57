// Outer boundary: the only surface embedders use. Spawns the dispatcher,
// hands back its queue, and curries the numeric ids behind one convenience
// wrapper per operation.

use std::path::Path;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::info;

use crate::logging;
use crate::protocol::{Payload, ServerRequest, Value};
use crate::server::{Server, ServerAction, ServiceId, server_listener};
use crate::services::source_code_model::SubServiceId;
use crate::services::source_code_model::indexer::IndexerOp;

/// Handle to a running dispatcher: the sending side of its queue plus the
/// dispatcher thread itself.
pub struct ServerHandle {
    queue: Sender<ServerRequest>,
    thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    fn put(&self, action: ServerAction, service_id: u8, payload: Payload) {
        let _ = self.queue.send(ServerRequest {
            action: action.id(),
            service_id,
            payload,
        });
    }

    /// Enqueue a raw `[action, service_id, payload]` tuple, unvalidated, the
    /// way an editor integration would.
    pub fn put_raw(&self, action: u8, service_id: u8, payload: Payload) {
        let _ = self.queue.send(ServerRequest {
            action,
            service_id,
            payload,
        });
    }

    /// Wait for the dispatcher to exit (after `stop_server`). Dropping the
    /// queue first means the dispatcher also stops if the shutdown message
    /// never made it.
    pub fn join(self) {
        let Self { queue, thread } = self;
        drop(queue);
        if let Some(thread) = thread {
            let _ = thread.join();
        }
    }
}

/// Configure logging, spawn the dispatcher in its own thread and return the
/// queue handle the caller talks to.
pub fn start_server<F>(make_server: F, log_file: &Path) -> Result<ServerHandle>
where
    F: FnOnce(Receiver<ServerRequest>) -> Server + Send + 'static,
{
    logging::init(log_file);
    let (queue, server_queue) = unbounded();
    let thread = std::thread::Builder::new()
        .name("cxxd_server".to_string())
        .spawn(move || {
            info!("Starting a server ...");
            server_listener(make_server(server_queue));
        })
        .context("cannot spawn the server dispatcher thread")?;
    Ok(ServerHandle {
        queue,
        thread: Some(thread),
    })
}

pub fn stop_server(handle: &ServerHandle, payload: Payload) {
    handle.put(ServerAction::ShutdownAndExit, 0x0, payload);
}

pub fn start_all_services(handle: &ServerHandle, payload: Payload) {
    handle.put(ServerAction::StartAllServices, 0x0, payload);
}

pub fn stop_all_services(handle: &ServerHandle, payload: Payload) {
    handle.put(ServerAction::ShutdownAllServices, 0x0, payload);
}

pub fn start_service(handle: &ServerHandle, id: ServiceId, payload: Payload) {
    handle.put(ServerAction::StartService, id.id(), payload);
}

pub fn stop_service(handle: &ServerHandle, id: ServiceId, payload: Payload) {
    handle.put(ServerAction::ShutdownService, id.id(), payload);
}

pub fn request_service(handle: &ServerHandle, id: ServiceId, payload: Payload) {
    handle.put(ServerAction::SendService, id.id(), payload);
}

//
// Source code model API
//

pub fn source_code_model_start(
    handle: &ServerHandle,
    project_root_directory: &Path,
    compiler_args: &Path,
) {
    start_service(
        handle,
        ServiceId::SourceCodeModel,
        vec![Value::from(project_root_directory), Value::from(compiler_args)],
    );
}

pub fn source_code_model_stop(handle: &ServerHandle) {
    stop_service(handle, ServiceId::SourceCodeModel, Vec::new());
}

fn source_code_model_request(handle: &ServerHandle, sub_id: SubServiceId, args: Payload) {
    let mut payload = vec![Value::from(sub_id.id() as i64)];
    payload.extend(args);
    request_service(handle, ServiceId::SourceCodeModel, payload);
}

fn indexer_request(handle: &ServerHandle, op: IndexerOp, args: Payload) {
    let mut payload = vec![Value::from(op.id() as i64)];
    payload.extend(args);
    source_code_model_request(handle, SubServiceId::Indexer, payload);
}

pub fn semantic_syntax_highlight_request(handle: &ServerHandle, filename: &Path, contents: &Path) {
    source_code_model_request(
        handle,
        SubServiceId::SyntaxHighlight,
        vec![Value::from(filename), Value::from(contents)],
    );
}

pub fn diagnostics_request(handle: &ServerHandle, filename: &Path, contents: &Path) {
    source_code_model_request(
        handle,
        SubServiceId::Diagnostics,
        vec![Value::from(filename), Value::from(contents)],
    );
}

pub fn type_deduction_request(
    handle: &ServerHandle,
    filename: &Path,
    contents: &Path,
    line: u32,
    col: u32,
) {
    source_code_model_request(
        handle,
        SubServiceId::TypeDeduction,
        vec![
            Value::from(filename),
            Value::from(contents),
            Value::from(line),
            Value::from(col),
        ],
    );
}

pub fn go_to_definition_request(
    handle: &ServerHandle,
    filename: &Path,
    contents: &Path,
    line: u32,
    col: u32,
) {
    source_code_model_request(
        handle,
        SubServiceId::GoToDefinition,
        vec![
            Value::from(filename),
            Value::from(contents),
            Value::from(line),
            Value::from(col),
        ],
    );
}

pub fn go_to_include_request(handle: &ServerHandle, filename: &Path, contents: &Path, line: u32) {
    source_code_model_request(
        handle,
        SubServiceId::GoToInclude,
        vec![
            Value::from(filename),
            Value::from(contents),
            Value::from(line),
        ],
    );
}

pub fn indexer_run_on_single_file_request(
    handle: &ServerHandle,
    filename: &Path,
    contents: &Path,
) {
    indexer_request(
        handle,
        IndexerOp::RunOnSingleFile,
        vec![Value::from(filename), Value::from(contents)],
    );
}

pub fn indexer_run_on_directory_request(handle: &ServerHandle) {
    indexer_request(handle, IndexerOp::RunOnDirectory, Vec::new());
}

pub fn indexer_drop_single_file_request(handle: &ServerHandle, filename: &Path) {
    indexer_request(
        handle,
        IndexerOp::DropSingleFile,
        vec![Value::from(filename)],
    );
}

pub fn indexer_drop_all_request(handle: &ServerHandle, remove_db_from_disk: bool) {
    indexer_request(
        handle,
        IndexerOp::DropAll,
        vec![Value::from(remove_db_from_disk)],
    );
}

pub fn indexer_drop_all_and_run_on_directory_request(handle: &ServerHandle) {
    indexer_drop_all_request(handle, true);
    indexer_run_on_directory_request(handle);
}

pub fn indexer_find_all_references_request(
    handle: &ServerHandle,
    filename: &Path,
    line: u32,
    col: u32,
) {
    indexer_request(
        handle,
        IndexerOp::FindAllReferences,
        vec![Value::from(filename), Value::from(line), Value::from(col)],
    );
}

//
// Project builder service API
//

pub fn project_builder_start(handle: &ServerHandle, build_dir: &Path) {
    start_service(
        handle,
        ServiceId::ProjectBuilder,
        vec![Value::from(build_dir)],
    );
}

pub fn project_builder_stop(handle: &ServerHandle) {
    stop_service(handle, ServiceId::ProjectBuilder, Vec::new());
}

pub fn project_builder_request(handle: &ServerHandle, build_command: &str) {
    request_service(
        handle,
        ServiceId::ProjectBuilder,
        vec![Value::from(build_command)],
    );
}

//
// Clang-format service API
//

pub fn clang_format_start(handle: &ServerHandle, config_file: &Path) {
    start_service(handle, ServiceId::ClangFormat, vec![Value::from(config_file)]);
}

pub fn clang_format_stop(handle: &ServerHandle) {
    stop_service(handle, ServiceId::ClangFormat, Vec::new());
}

pub fn clang_format_request(handle: &ServerHandle, filename: &Path) {
    request_service(handle, ServiceId::ClangFormat, vec![Value::from(filename)]);
}

//
// Clang-tidy service API
//

pub fn clang_tidy_start(handle: &ServerHandle, compilation_database: &Path) {
    start_service(
        handle,
        ServiceId::ClangTidy,
        vec![Value::from(compilation_database)],
    );
}

pub fn clang_tidy_stop(handle: &ServerHandle) {
    stop_service(handle, ServiceId::ClangTidy, Vec::new());
}

pub fn clang_tidy_request(handle: &ServerHandle, filename: &Path, apply_fixes: bool) {
    request_service(
        handle,
        ServiceId::ClangTidy,
        vec![Value::from(filename), Value::from(apply_fixes)],
    );
}
