// Dispatcher and worker-loop behavior, plus the end-to-end scenarios driven
// through the public api surface.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use serial_test::serial;

use crate::api;
use crate::protocol::{ResultData, ServiceMessage, Value};
use crate::server::{Server, ServicePlugins};
use crate::service::{NullPlugin, Service, ServicePlugin, service_listener};
use crate::tests::test_helpers::test_code::{MAIN_CPP, UTILS_HPP, WIDGET_HPP};
use crate::tests::test_helpers::{create_flags_file, create_test_file, create_test_project};

const WAIT: Duration = Duration::from_secs(60);

#[derive(Debug)]
enum Event {
    Startup(bool),
    Shutdown(bool),
    Request(bool, Option<ResultData>),
}

struct ChannelPlugin {
    events: Sender<Event>,
}

impl ServicePlugin for ChannelPlugin {
    fn on_startup(&mut self, success: bool, _payload: &[Value]) {
        let _ = self.events.send(Event::Startup(success));
    }

    fn on_shutdown(&mut self, success: bool, _payload: &[Value]) {
        let _ = self.events.send(Event::Shutdown(success));
    }

    fn on_request(&mut self, success: bool, _payload: &[Value], result: Option<ResultData>) {
        let _ = self.events.send(Event::Request(success, result));
    }
}

fn plugins_with_model_events() -> (ServicePlugins, Receiver<Event>, Arc<AtomicUsize>) {
    let (events, receiver) = unbounded();
    let spawn_count = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&spawn_count);
    let plugins = ServicePlugins {
        source_code_model: Box::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
            Box::new(ChannelPlugin {
                events: events.clone(),
            })
        }),
        project_builder: Box::new(|| Box::new(NullPlugin)),
        clang_format: Box::new(|| Box::new(NullPlugin)),
        clang_tidy: Box::new(|| Box::new(NullPlugin)),
    };
    (plugins, receiver, spawn_count)
}

fn next_request(events: &Receiver<Event>) -> (bool, Option<ResultData>) {
    loop {
        match events.recv_timeout(WAIT).expect("no callback arrived") {
            Event::Request(success, result) => return (success, result),
            _ => continue,
        }
    }
}

fn start_test_server(
    project: &Path,
    plugins: ServicePlugins,
) -> anyhow::Result<api::ServerHandle> {
    let log_file = project.join(".cxxd.log");
    api::start_server(move |queue| Server::new(queue, plugins), &log_file)
}

#[test]
#[serial]
fn scenario_index_and_resolve_local_definition() {
    let project = create_test_project().unwrap();
    let main_cpp = create_test_file(project.path(), "main.cpp", MAIN_CPP).unwrap();
    create_test_file(project.path(), "utils.hpp", UTILS_HPP).unwrap();
    let flags = create_flags_file(project.path()).unwrap();

    let (plugins, events, _) = plugins_with_model_events();
    let handle = start_test_server(project.path(), plugins).unwrap();

    api::start_all_services(
        &handle,
        vec![Value::from(project.path()), Value::from(&*flags)],
    );
    api::indexer_run_on_directory_request(&handle);
    let (indexed, _) = next_request(&events);
    assert!(indexed);

    api::go_to_definition_request(&handle, &main_cpp, &main_cpp, 9, 5);
    let (success, result) = next_request(&events);
    assert!(success);
    let Some(ResultData::Definition(location)) = result else {
        panic!("expected a definition");
    };
    assert_eq!(location.filename, main_cpp);
    assert_eq!((location.line, location.column), (3, 6));

    api::stop_server(&handle, Vec::new());
    handle.join();
}

#[test]
#[serial]
fn scenario_go_to_definition_across_an_edited_buffer() {
    let project = create_test_project().unwrap();
    let main_cpp = create_test_file(project.path(), "main.cpp", MAIN_CPP).unwrap();
    let edited = create_test_file(
        project.path(),
        "edited.cpp",
        crate::tests::test_helpers::test_code::MAIN_CPP_EDITED,
    )
    .unwrap();
    create_test_file(project.path(), "utils.hpp", UTILS_HPP).unwrap();
    let flags = create_flags_file(project.path()).unwrap();

    let (plugins, events, _) = plugins_with_model_events();
    let handle = start_test_server(project.path(), plugins).unwrap();

    api::source_code_model_start(&handle, project.path(), &flags);
    api::go_to_definition_request(&handle, &main_cpp, &edited, 10, 5);
    let (success, result) = next_request(&events);
    assert!(success);
    let Some(ResultData::Definition(location)) = result else {
        panic!("expected a definition");
    };
    assert_eq!(location.filename, main_cpp);
    assert_eq!((location.line, location.column), (4, 6));

    api::stop_server(&handle, Vec::new());
    handle.join();
}

#[test]
#[serial]
fn scenario_find_all_references_across_files() {
    let project = create_test_project().unwrap();
    let header = create_test_file(project.path(), "header.hpp", WIDGET_HPP).unwrap();
    for (name, var) in [("a.cpp", "alpha"), ("b.cpp", "beta"), ("c.cpp", "gamma")] {
        create_test_file(
            project.path(),
            name,
            &format!("#include \"header.hpp\"\nWidget {};\n", var),
        )
        .unwrap();
    }
    let flags = create_flags_file(project.path()).unwrap();

    let (plugins, events, _) = plugins_with_model_events();
    let handle = start_test_server(project.path(), plugins).unwrap();

    api::source_code_model_start(&handle, project.path(), &flags);
    api::indexer_run_on_directory_request(&handle);
    let (indexed, _) = next_request(&events);
    assert!(indexed);

    api::indexer_find_all_references_request(&handle, &header, 1, 7);
    let (success, result) = next_request(&events);
    assert!(success);
    let Some(ResultData::References(references)) = result else {
        panic!("expected references");
    };
    assert_eq!(references.len(), 4);
    assert!(
        references
            .iter()
            .all(|r| r.filename.starts_with(project.path()))
    );

    api::stop_server(&handle, Vec::new());
    handle.join();
}

#[test]
#[serial]
fn scenario_drop_all_with_disk_removal_and_reindex() {
    let project = create_test_project().unwrap();
    create_test_file(project.path(), "main.cpp", MAIN_CPP).unwrap();
    create_test_file(project.path(), "utils.hpp", UTILS_HPP).unwrap();
    let flags = create_flags_file(project.path()).unwrap();
    let db_path = project.path().join(crate::database::SYMBOL_DB_NAME);

    let (plugins, events, _) = plugins_with_model_events();
    let handle = start_test_server(project.path(), plugins).unwrap();

    api::source_code_model_start(&handle, project.path(), &flags);
    api::indexer_run_on_directory_request(&handle);
    let (indexed, _) = next_request(&events);
    assert!(indexed);
    assert!(db_path.exists());

    api::indexer_drop_all_request(&handle, true);
    let (dropped, _) = next_request(&events);
    assert!(dropped);
    assert!(!db_path.exists());

    api::indexer_run_on_directory_request(&handle);
    let (reindexed, _) = next_request(&events);
    assert!(reindexed);
    assert!(db_path.exists());

    api::stop_server(&handle, Vec::new());
    handle.join();
}

#[test]
#[serial]
fn scenario_unknown_action_does_not_stop_the_dispatcher() {
    let project = create_test_project().unwrap();
    let (plugins, _events, _) = plugins_with_model_events();
    let handle = start_test_server(project.path(), plugins).unwrap();

    handle.put_raw(0x55, 0x0, Vec::new());
    api::stop_server(&handle, Vec::new());
    // the dispatcher processed both: the unknown action was ignored, the
    // shutdown stopped the loop
    handle.join();
}

#[test]
#[serial]
fn starting_a_service_twice_does_not_spawn_two_workers() {
    let project = create_test_project().unwrap();
    let flags = create_flags_file(project.path()).unwrap();
    let (plugins, events, spawn_count) = plugins_with_model_events();
    let handle = start_test_server(project.path(), plugins).unwrap();

    api::source_code_model_start(&handle, project.path(), &flags);
    api::source_code_model_start(&handle, project.path(), &flags);

    // both startup requests are answered, by the same single worker
    assert!(matches!(
        events.recv_timeout(WAIT).unwrap(),
        Event::Startup(true)
    ));
    assert!(matches!(
        events.recv_timeout(WAIT).unwrap(),
        Event::Startup(true)
    ));
    assert_eq!(spawn_count.load(Ordering::SeqCst), 1);

    api::stop_server(&handle, Vec::new());
    handle.join();
}

#[test]
#[serial]
fn a_service_can_be_stopped_and_restarted() {
    let project = create_test_project().unwrap();
    let flags = create_flags_file(project.path()).unwrap();
    let (plugins, events, spawn_count) = plugins_with_model_events();
    let handle = start_test_server(project.path(), plugins).unwrap();

    api::source_code_model_start(&handle, project.path(), &flags);
    assert!(matches!(
        events.recv_timeout(WAIT).unwrap(),
        Event::Startup(true)
    ));

    api::source_code_model_stop(&handle);
    assert!(matches!(
        events.recv_timeout(WAIT).unwrap(),
        Event::Shutdown(true)
    ));

    api::source_code_model_start(&handle, project.path(), &flags);
    assert!(matches!(
        events.recv_timeout(WAIT).unwrap(),
        Event::Startup(true)
    ));
    assert_eq!(spawn_count.load(Ordering::SeqCst), 2);

    api::stop_server(&handle, Vec::new());
    handle.join();
}

//
// Worker-loop behavior, driven directly.
//

struct ProbeService {
    requests: Arc<AtomicUsize>,
    panic_on_request: bool,
}

impl Service for ProbeService {
    fn startup(&mut self, _payload: &[Value]) {}

    fn shutdown(&mut self, _payload: &[Value]) {}

    fn handle(&mut self, _payload: &[Value]) -> (bool, Option<ResultData>) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_request {
            panic!("handler blew up");
        }
        (true, None)
    }
}

#[test]
fn unknown_message_tags_are_ignored() {
    let (events, received) = unbounded();
    let requests = Arc::new(AtomicUsize::new(0));
    let (queue, listener_queue) = unbounded();
    let service = Box::new(ProbeService {
        requests: Arc::clone(&requests),
        panic_on_request: false,
    });
    let plugin = Box::new(ChannelPlugin { events });
    let worker = std::thread::spawn(move || service_listener(service, plugin, listener_queue));

    queue
        .send(ServiceMessage {
            tag: 0x9,
            payload: Vec::new(),
        })
        .unwrap();
    queue.send(ServiceMessage::request(Vec::new())).unwrap();
    queue.send(ServiceMessage::shutdown(Vec::new())).unwrap();
    worker.join().unwrap();

    assert_eq!(requests.load(Ordering::SeqCst), 1);
    assert!(matches!(received.recv().unwrap(), Event::Request(true, _)));
    assert!(matches!(received.recv().unwrap(), Event::Shutdown(true)));
}

#[test]
fn a_panicking_handler_fails_its_callback_and_stops_the_worker() {
    let (events, received) = unbounded();
    let requests = Arc::new(AtomicUsize::new(0));
    let (queue, listener_queue) = unbounded();
    let service = Box::new(ProbeService {
        requests: Arc::clone(&requests),
        panic_on_request: true,
    });
    let plugin = Box::new(ChannelPlugin { events });
    let worker = std::thread::spawn(move || service_listener(service, plugin, listener_queue));

    queue.send(ServiceMessage::request(Vec::new())).unwrap();
    // never processed: the worker exits after the fatal error
    queue.send(ServiceMessage::request(Vec::new())).unwrap();
    worker.join().unwrap();

    assert_eq!(requests.load(Ordering::SeqCst), 1);
    assert!(matches!(received.recv().unwrap(), Event::Request(false, None)));
}
