mod common;
mod pipeline_tests;
mod registry_tests;
mod resolve_props;
