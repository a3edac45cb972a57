// Go-to-definition: parser-resolved, store-resolved, and the edited-buffer
// filename rewrite.

use std::path::Path;
use std::sync::Arc;

use serial_test::serial;

use crate::protocol::{ResultData, Value};
use crate::services::source_code_model::go_to_definition::GoToDefinition;
use crate::services::source_code_model::indexer::{IndexerOp, SymbolIndexer};
use crate::tests::test_helpers::test_code::{MAIN_CPP, MAIN_CPP_EDITED, UTILS_HPP};
use crate::tests::test_helpers::{create_test_file, create_test_parser, create_test_project};

struct Fixture {
    indexer: SymbolIndexer,
    go_to_definition: GoToDefinition,
}

fn fixture(project: &Path) -> Fixture {
    let parser = Arc::new(create_test_parser(project).unwrap());
    let indexer = SymbolIndexer::new(Arc::clone(&parser), project);
    let go_to_definition = GoToDefinition::new(parser, indexer.symbol_db(), project);
    Fixture {
        indexer,
        go_to_definition,
    }
}

fn definition_args(original: &Path, contents: &Path, line: u32, column: u32) -> Vec<Value> {
    vec![
        Value::from(original),
        Value::from(contents),
        Value::from(line),
        Value::from(column),
    ]
}

#[test]
fn definition_inside_the_same_file() {
    let project = create_test_project().unwrap();
    let main_cpp = create_test_file(project.path(), "main.cpp", MAIN_CPP).unwrap();
    create_test_file(project.path(), "utils.hpp", UTILS_HPP).unwrap();
    let fixture = fixture(project.path());

    let (success, result) = fixture
        .go_to_definition
        .handle(&definition_args(&main_cpp, &main_cpp, 9, 5));
    assert!(success);
    let Some(ResultData::Definition(location)) = result else {
        panic!("expected a definition");
    };
    assert_eq!(location.filename, main_cpp);
    assert_eq!((location.line, location.column), (3, 6));
}

#[test]
fn definition_in_an_edited_buffer_reports_the_original_filename() {
    let project = create_test_project().unwrap();
    let main_cpp = create_test_file(project.path(), "main.cpp", MAIN_CPP).unwrap();
    let edited = create_test_file(project.path(), "edited.cpp", MAIN_CPP_EDITED).unwrap();
    create_test_file(project.path(), "utils.hpp", UTILS_HPP).unwrap();
    let fixture = fixture(project.path());

    // the edited buffer shifts everything one line down
    let (success, result) = fixture
        .go_to_definition
        .handle(&definition_args(&main_cpp, &edited, 10, 5));
    assert!(success);
    let Some(ResultData::Definition(location)) = result else {
        panic!("expected a definition");
    };
    assert_eq!(location.filename, main_cpp, "must not report the temp file");
    assert_eq!((location.line, location.column), (4, 6));
}

#[test]
#[serial]
fn definition_falls_back_to_the_symbol_store() {
    let project = create_test_project().unwrap();
    create_test_file(project.path(), "helper.hpp", "void reset();\n").unwrap();
    create_test_file(project.path(), "helper.cpp", "void reset() {\n}\n").unwrap();
    let user_cpp = create_test_file(
        project.path(),
        "user.cpp",
        "void driver() {\n    reset();\n}\n",
    )
    .unwrap();
    let fixture = fixture(project.path());

    let (success, _) = fixture.indexer.handle(&[
        Value::from(IndexerOp::RunOnDirectory.id() as i64),
    ]);
    assert!(success);

    // `reset` is not defined inside user.cpp; only the store knows it
    let (success, result) = fixture
        .go_to_definition
        .handle(&definition_args(&user_cpp, &user_cpp, 2, 5));
    assert!(success);
    let Some(ResultData::Definition(location)) = result else {
        panic!("expected a definition");
    };
    assert_eq!(location.filename, project.path().join("helper.cpp"));
    assert_eq!(location.line, 1);
}

#[test]
fn missing_definition_fails() {
    let project = create_test_project().unwrap();
    let user_cpp = create_test_file(
        project.path(),
        "user.cpp",
        "void driver() {\n    reset();\n}\n",
    )
    .unwrap();
    let fixture = fixture(project.path());

    // no index, no in-unit definition
    let (success, result) = fixture
        .go_to_definition
        .handle(&definition_args(&user_cpp, &user_cpp, 2, 5));
    assert!(!success);
    assert!(result.is_none());
}
