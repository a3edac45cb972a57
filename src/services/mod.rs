// The four registered services.

pub mod clang_format;
pub mod clang_tidy;
pub mod project_builder;
pub mod source_code_model;
