// Per-service worker plumbing: the service contract, the plugin callback
// boundary and the single message loop every worker runs.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crossbeam_channel::Receiver;
use tracing::{error, info, warn};

use crate::protocol::{ResultData, ServiceMessage, Value};

/// One registered service. Startup failures leave the service degraded (every
/// request then fails); they are not themselves reported as failed callbacks.
pub trait Service: Send {
    fn startup(&mut self, payload: &[Value]);
    fn shutdown(&mut self, payload: &[Value]);
    fn handle(&mut self, payload: &[Value]) -> (bool, Option<ResultData>);
}

/// Completion callbacks supplied by the embedding editor plugin. Invoked on
/// the worker thread, strictly in request order.
pub trait ServicePlugin: Send {
    fn on_startup(&mut self, success: bool, payload: &[Value]);
    fn on_shutdown(&mut self, success: bool, payload: &[Value]);
    fn on_request(&mut self, success: bool, payload: &[Value], result: Option<ResultData>);
}

/// Plugin for callers that don't care about callbacks.
pub struct NullPlugin;

impl ServicePlugin for NullPlugin {
    fn on_startup(&mut self, _success: bool, _payload: &[Value]) {}
    fn on_shutdown(&mut self, _success: bool, _payload: &[Value]) {}
    fn on_request(&mut self, _success: bool, _payload: &[Value], _result: Option<ResultData>) {}
}

/// The worker message loop. Runs until a SHUTDOWN message arrives, the queue
/// closes, or a handler panics (a contained `Fatal`: logged, reported as a
/// failed callback, and only this worker exits).
pub fn service_listener(
    mut service: Box<dyn Service>,
    mut plugin: Box<dyn ServicePlugin>,
    queue: Receiver<ServiceMessage>,
) {
    while let Ok(message) = queue.recv() {
        let mut fatal = false;
        match message.tag {
            ServiceMessage::STARTUP => {
                info!("Service startup ... payload = {:?}", message.payload);
                fatal = contain(|| service.startup(&message.payload)).is_none();
                plugin.on_startup(true, &message.payload);
            }
            ServiceMessage::SHUTDOWN => {
                info!("Service shutdown ... payload = {:?}", message.payload);
                contain(|| service.shutdown(&message.payload));
                plugin.on_shutdown(true, &message.payload);
                break;
            }
            ServiceMessage::REQUEST => {
                info!("Service request ... payload = {:?}", message.payload);
                match contain(|| service.handle(&message.payload)) {
                    Some((success, result)) => plugin.on_request(success, &message.payload, result),
                    None => {
                        plugin.on_request(false, &message.payload, None);
                        fatal = true;
                    }
                }
            }
            unknown => {
                warn!("Unknown service message tag {:#x}; ignoring", unknown);
            }
        }
        if fatal {
            error!("Worker exiting after fatal error");
            break;
        }
    }
    info!("Service listener shut down ...");
}

fn contain<T>(f: impl FnOnce() -> T) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(panic) => {
            error!("Fatal: service handler panicked: {}", panic_message(&panic));
            None
        }
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "<opaque panic payload>"
    }
}
