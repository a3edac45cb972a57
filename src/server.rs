// Server dispatcher: owns the registered services by fixed numeric id,
// decodes control actions from its input queue and manages worker lifetimes.

use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{error, info, warn};

use crate::protocol::{Payload, ServerRequest, ServiceMessage};
use crate::service::{Service, ServicePlugin, service_listener};
use crate::services::clang_format::ClangFormat;
use crate::services::clang_tidy::ClangTidy;
use crate::services::project_builder::ProjectBuilder;
use crate::services::source_code_model::SourceCodeModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceId {
    SourceCodeModel = 0x0,
    ProjectBuilder = 0x1,
    ClangFormat = 0x2,
    ClangTidy = 0x3,
}

impl ServiceId {
    pub fn id(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ServiceId {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0x0 => Ok(ServiceId::SourceCodeModel),
            0x1 => Ok(ServiceId::ProjectBuilder),
            0x2 => Ok(ServiceId::ClangFormat),
            0x3 => Ok(ServiceId::ClangTidy),
            other => Err(other),
        }
    }
}

/// Top-level control actions. The numeric encoding is part of the wire
/// protocol; editors put these ids on the queue directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerAction {
    StartAllServices = 0xF0,
    StartService = 0xF1,
    SendService = 0xF2,
    ShutdownAllServices = 0xFD,
    ShutdownService = 0xFE,
    ShutdownAndExit = 0xFF,
}

impl ServerAction {
    pub fn id(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ServerAction {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0xF0 => Ok(ServerAction::StartAllServices),
            0xF1 => Ok(ServerAction::StartService),
            0xF2 => Ok(ServerAction::SendService),
            0xFD => Ok(ServerAction::ShutdownAllServices),
            0xFE => Ok(ServerAction::ShutdownService),
            0xFF => Ok(ServerAction::ShutdownAndExit),
            other => Err(other),
        }
    }
}

pub type PluginFactory = Box<dyn FnMut() -> Box<dyn ServicePlugin> + Send>;
type ServiceFactory = Box<dyn FnMut() -> Box<dyn Service> + Send>;

/// Plugin factories, one per registered service. A fresh plugin is created
/// for every worker start so services stay restartable after shutdown.
pub struct ServicePlugins {
    pub source_code_model: PluginFactory,
    pub project_builder: PluginFactory,
    pub clang_format: PluginFactory,
    pub clang_tidy: PluginFactory,
}

struct Worker {
    queue: Sender<ServiceMessage>,
    thread: JoinHandle<()>,
}

struct ServiceHandler {
    name: &'static str,
    service_factory: ServiceFactory,
    plugin_factory: PluginFactory,
    worker: Option<Worker>,
}

impl ServiceHandler {
    fn new(
        name: &'static str,
        service_factory: ServiceFactory,
        plugin_factory: PluginFactory,
    ) -> Self {
        Self {
            name,
            service_factory,
            plugin_factory,
            worker: None,
        }
    }

    fn is_started(&self) -> bool {
        self.worker.is_some()
    }

    fn start_listening(&mut self) {
        // A worker whose thread died on a fatal error is noticed (and reaped)
        // here, on the next start request.
        if self
            .worker
            .as_ref()
            .is_some_and(|w| w.thread.is_finished())
        {
            warn!("Service '{}' worker died; restarting", self.name);
            if let Some(worker) = self.worker.take() {
                let _ = worker.thread.join();
            }
        }
        if self.is_started() {
            warn!("Service process already started!");
            return;
        }
        let (queue, listener_queue) = unbounded();
        let service = (self.service_factory)();
        let plugin = (self.plugin_factory)();
        let spawned = std::thread::Builder::new()
            .name(format!("cxxd_{}", self.name))
            .spawn(move || service_listener(service, plugin, listener_queue));
        match spawned {
            Ok(thread) => self.worker = Some(Worker { queue, thread }),
            Err(e) => error!("Cannot spawn worker for '{}': {}", self.name, e),
        }
    }

    fn stop_listening(&mut self) {
        match self.worker.take() {
            Some(worker) => {
                drop(worker.queue);
                if worker.thread.join().is_err() {
                    warn!("Service '{}' worker exited abnormally", self.name);
                }
            }
            None => warn!("Service process already stopped!"),
        }
    }

    fn startup_request(&self, payload: Payload) {
        self.send(ServiceMessage::startup(payload));
    }

    fn shutdown_request(&self, payload: Payload) {
        self.send(ServiceMessage::shutdown(payload));
    }

    fn request(&self, payload: Payload) {
        self.send(ServiceMessage::request(payload));
    }

    fn send(&self, message: ServiceMessage) {
        match &self.worker {
            Some(worker) => {
                if worker.queue.send(message).is_err() {
                    warn!("Service '{}' worker is gone; message dropped", self.name);
                }
            }
            None => {
                warn!("Service process must be started before issuing any kind of requests!");
            }
        }
    }
}

/// The dispatcher. Reads 3-tuples `[action, service_id, payload]` from its
/// queue until told to exit.
pub struct Server {
    handle: Receiver<ServerRequest>,
    services: Vec<(ServiceId, ServiceHandler)>,
    started_up: bool,
}

impl Server {
    pub fn new(handle: Receiver<ServerRequest>, plugins: ServicePlugins) -> Self {
        let services = vec![
            (
                ServiceId::SourceCodeModel,
                ServiceHandler::new(
                    "source_code_model",
                    Box::new(|| Box::new(SourceCodeModel::new()) as Box<dyn Service>),
                    plugins.source_code_model,
                ),
            ),
            (
                ServiceId::ProjectBuilder,
                ServiceHandler::new(
                    "project_builder",
                    Box::new(|| Box::new(ProjectBuilder::new()) as Box<dyn Service>),
                    plugins.project_builder,
                ),
            ),
            (
                ServiceId::ClangFormat,
                ServiceHandler::new(
                    "clang_format",
                    Box::new(|| Box::new(ClangFormat::new()) as Box<dyn Service>),
                    plugins.clang_format,
                ),
            ),
            (
                ServiceId::ClangTidy,
                ServiceHandler::new(
                    "clang_tidy",
                    Box::new(|| Box::new(ClangTidy::new()) as Box<dyn Service>),
                    plugins.clang_tidy,
                ),
            ),
        ];
        info!("Registered services: {:?}", services.iter().map(|(id, s)| (id.id(), s.name)).collect::<Vec<_>>());
        Self {
            handle,
            services,
            started_up: true,
        }
    }

    /// Process one queued request. Returns false once the dispatcher should
    /// stop (SHUTDOWN_AND_EXIT processed, or the queue closed).
    pub fn process_request(&mut self) -> bool {
        let Ok(request) = self.handle.recv() else {
            info!("Server queue closed");
            return false;
        };
        match ServerAction::try_from(request.action) {
            Ok(ServerAction::StartAllServices) => self.start_all_services(request.payload),
            Ok(ServerAction::StartService) => {
                self.start_service(request.service_id, request.payload);
            }
            Ok(ServerAction::SendService) => {
                self.send_service_request(request.service_id, request.payload);
            }
            Ok(ServerAction::ShutdownAllServices) => self.shutdown_all_services(request.payload),
            Ok(ServerAction::ShutdownService) => {
                self.shutdown_service(request.service_id, request.payload);
            }
            Ok(ServerAction::ShutdownAndExit) => {
                info!("Shutting down the server ...");
                self.shutdown_all_services(request.payload);
                self.started_up = false;
            }
            Err(unknown) => error!("Unknown action {:#x} triggered!", unknown),
        }
        self.started_up
    }

    pub fn is_started_up(&self) -> bool {
        self.started_up
    }

    fn start_all_services(&mut self, payload: Payload) {
        info!("Starting all registered services ...");
        for (id, handler) in &mut self.services {
            handler.start_listening();
            handler.startup_request(payload.clone());
            info!("id={}, service='{}', payload={:?}", id.id(), handler.name, payload);
        }
    }

    fn start_service(&mut self, service_id: u8, payload: Payload) {
        match self.handler_mut(service_id) {
            Some(handler) => {
                info!("id={}, service='{}', payload={:?}", service_id, handler.name, payload);
                handler.start_listening();
                handler.startup_request(payload);
            }
            None => error!(
                "Starting the service not possible. No service found under id={}.",
                service_id
            ),
        }
    }

    fn send_service_request(&mut self, service_id: u8, payload: Payload) {
        match self.handler_mut(service_id) {
            Some(handler) => {
                info!("id={}, service='{}', payload={:?}", service_id, handler.name, payload);
                handler.request(payload);
            }
            None => error!(
                "Sending a request to the service not possible. No service found under id={}.",
                service_id
            ),
        }
    }

    fn shutdown_service(&mut self, service_id: u8, payload: Payload) {
        match self.handler_mut(service_id) {
            Some(handler) => {
                info!("id={}, service='{}', payload={:?}", service_id, handler.name, payload);
                if handler.is_started() {
                    handler.shutdown_request(payload);
                }
                handler.stop_listening();
            }
            None => error!(
                "Shutting down the service not possible. No service found under id={}.",
                service_id
            ),
        }
    }

    fn shutdown_all_services(&mut self, payload: Payload) {
        info!("Shutting down all registered services ...");
        for (id, handler) in &mut self.services {
            if handler.is_started() {
                handler.shutdown_request(payload.clone());
                info!("id={}, service='{}', payload={:?}", id.id(), handler.name, payload);
            }
        }
        for (_, handler) in &mut self.services {
            if handler.is_started() {
                handler.stop_listening();
            }
        }
    }

    fn handler_mut(&mut self, service_id: u8) -> Option<&mut ServiceHandler> {
        let id = ServiceId::try_from(service_id).ok()?;
        self.services
            .iter_mut()
            .find(|(sid, _)| *sid == id)
            .map(|(_, handler)| handler)
    }
}

/// Run the dispatcher until it is told to exit.
pub fn server_listener(mut server: Server) {
    while server.process_request() {}
    info!("Server listener shut down ...");
}
