/// Tracing subscriber setup with console and optional file output.
pub mod logsetup;
