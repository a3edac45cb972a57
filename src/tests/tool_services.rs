// External tool services, exercised against fake executables.

use std::path::{Path, PathBuf};

use crate::protocol::{ResultData, Value};
use crate::service::Service;
use crate::services::clang_format::ClangFormat;
use crate::services::clang_tidy::ClangTidy;
use crate::services::project_builder::ProjectBuilder;
use crate::tests::test_helpers::{create_test_file, create_test_project};

/// A fake tool: records its arguments, prints a marker, exits as told.
fn write_fake_tool(dir: &Path, name: &str, exit_code: i32) -> PathBuf {
    let path = create_test_file(
        dir,
        name,
        &format!("#!/bin/sh\necho \"fake-tool $@\"\nexit {}\n", exit_code),
    )
    .unwrap();
    make_executable(&path);
    path
}

fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = std::fs::metadata(path).unwrap().permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(path, permissions).unwrap();
}

#[test]
fn clang_format_formats_when_everything_is_in_place() {
    let project = create_test_project().unwrap();
    let tool = write_fake_tool(project.path(), "fake-clang-format", 0);
    let config = create_test_file(project.path(), ".clang-format", "BasedOnStyle: LLVM\n").unwrap();
    let source = create_test_file(project.path(), "main.cpp", "int main(){}\n").unwrap();

    let mut service = ClangFormat::with_executable(tool.to_string_lossy());
    service.startup(&[Value::from(&*config)]);

    let (success, result) = service.handle(&[Value::from(&*source)]);
    assert!(success);
    assert!(result.is_none());
}

#[test]
fn clang_format_fails_on_nonzero_exit() {
    let project = create_test_project().unwrap();
    let tool = write_fake_tool(project.path(), "fake-clang-format", 1);
    let config = create_test_file(project.path(), ".clang-format", "BasedOnStyle: LLVM\n").unwrap();
    let source = create_test_file(project.path(), "main.cpp", "int main(){}\n").unwrap();

    let mut service = ClangFormat::with_executable(tool.to_string_lossy());
    service.startup(&[Value::from(&*config)]);

    let (success, _) = service.handle(&[Value::from(&*source)]);
    assert!(!success);
}

#[test]
fn clang_format_with_a_missing_config_rejects_requests() {
    let project = create_test_project().unwrap();
    let tool = write_fake_tool(project.path(), "fake-clang-format", 0);
    let source = create_test_file(project.path(), "main.cpp", "int main(){}\n").unwrap();

    let mut service = ClangFormat::with_executable(tool.to_string_lossy());
    service.startup(&[Value::from(project.path().join("no-such-config").as_path())]);

    let (success, _) = service.handle(&[Value::from(&*source)]);
    assert!(!success);
}

#[test]
fn clang_format_with_a_missing_executable_rejects_requests() {
    let project = create_test_project().unwrap();
    let config = create_test_file(project.path(), ".clang-format", "BasedOnStyle: LLVM\n").unwrap();
    let source = create_test_file(project.path(), "main.cpp", "int main(){}\n").unwrap();

    let mut service = ClangFormat::with_executable("/no/such/clang-format");
    service.startup(&[Value::from(&*config)]);

    let (success, _) = service.handle(&[Value::from(&*source)]);
    assert!(!success);
}

#[test]
fn clang_tidy_captures_output_with_text_flags() {
    let project = create_test_project().unwrap();
    let tool = write_fake_tool(project.path(), "fake-clang-tidy", 0);
    let flags = create_test_file(project.path(), "compile_flags.txt", "-I. -std=c++17\n").unwrap();
    let source = create_test_file(project.path(), "main.cpp", "int main(){}\n").unwrap();

    let mut service = ClangTidy::with_executable(tool.to_string_lossy());
    service.startup(&[Value::from(&*flags)]);

    let (success, result) = service.handle(&[Value::from(&*source), Value::from(false)]);
    assert!(success);
    let Some(ResultData::ToolOutput(output)) = result else {
        panic!("expected a tool output path");
    };
    let captured = std::fs::read_to_string(&output).unwrap();
    assert!(captured.contains("fake-tool"));
    assert!(captured.contains("--"), "text flags are inlined after --");
}

#[test]
fn clang_tidy_uses_a_json_database_by_reference() {
    let project = create_test_project().unwrap();
    let tool = write_fake_tool(project.path(), "fake-clang-tidy", 0);
    let db = create_test_file(
        project.path(),
        "compile_commands.json",
        r#"[{"directory": ".", "command": "c++ -c main.cpp", "file": "main.cpp"}]"#,
    )
    .unwrap();
    let source = create_test_file(project.path(), "main.cpp", "int main(){}\n").unwrap();

    let mut service = ClangTidy::with_executable(tool.to_string_lossy());
    service.startup(&[Value::from(&*db)]);

    let (success, result) = service.handle(&[Value::from(&*source), Value::from(true)]);
    assert!(success);
    let Some(ResultData::ToolOutput(output)) = result else {
        panic!("expected a tool output path");
    };
    let captured = std::fs::read_to_string(&output).unwrap();
    assert!(captured.contains("-p"));
    assert!(captured.contains("-fix"));
}

#[test]
fn clang_tidy_without_a_database_rejects_requests() {
    let project = create_test_project().unwrap();
    let tool = write_fake_tool(project.path(), "fake-clang-tidy", 0);
    let source = create_test_file(project.path(), "main.cpp", "int main(){}\n").unwrap();

    let mut service = ClangTidy::with_executable(tool.to_string_lossy());
    service.startup(&[Value::from(
        project.path().join("no-such-flags.yaml").as_path(),
    )]);

    let (success, _) = service.handle(&[Value::from(&*source), Value::from(false)]);
    assert!(!success);
}

#[test]
fn project_builder_captures_output_and_elapsed_time() {
    let project = create_test_project().unwrap();
    let build_dir = project.path();

    let mut service = ProjectBuilder::new();
    service.startup(&[Value::from(build_dir)]);

    let (success, result) = service.handle(&[Value::from("echo building && pwd")]);
    assert!(success);
    let Some(ResultData::BuildOutput { path, elapsed: _ }) = result else {
        panic!("expected build output");
    };
    let captured = std::fs::read_to_string(&path).unwrap();
    assert!(captured.contains("building"));
    // the command ran inside the build directory
    let build_dir_canonical = build_dir.canonicalize().unwrap();
    assert!(captured.contains(build_dir_canonical.to_str().unwrap()));
}

#[test]
fn project_builder_truncates_between_builds() {
    let project = create_test_project().unwrap();
    let mut service = ProjectBuilder::new();
    service.startup(&[Value::from(project.path())]);

    let (success, _) = service.handle(&[Value::from("echo first")]);
    assert!(success);
    let (success, result) = service.handle(&[Value::from("echo second")]);
    assert!(success);
    let Some(ResultData::BuildOutput { path, .. }) = result else {
        panic!("expected build output");
    };
    let captured = std::fs::read_to_string(&path).unwrap();
    assert!(captured.contains("second"));
    assert!(!captured.contains("first"));
}

#[test]
fn project_builder_reports_failing_builds() {
    let project = create_test_project().unwrap();
    let mut service = ProjectBuilder::new();
    service.startup(&[Value::from(project.path())]);

    let (success, result) = service.handle(&[Value::from("exit 2")]);
    assert!(!success);
    assert!(matches!(result, Some(ResultData::BuildOutput { .. })));
}

#[test]
fn project_builder_before_startup_rejects_requests() {
    let mut service = ProjectBuilder::new();
    let (success, result) = service.handle(&[Value::from("make")]);
    assert!(!success);
    assert!(result.is_none());
}
