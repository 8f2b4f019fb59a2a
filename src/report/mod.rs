pub mod headless;

pub use headless::{build_line, write_line, ReportLine};
