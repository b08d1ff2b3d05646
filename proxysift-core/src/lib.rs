pub mod error;
pub mod harvest;
pub mod report;
pub mod sink;
pub mod sources;

pub use error::HarvestError;
pub use harvest::{HarvestOptions, RunBatch, collect_candidates, execute_harvest};
pub use report::{RunSummary, generate_summary_report};
pub use sink::{FileSink, ResultSink};

const BANNER: &str = r#"
    ╔══════════════════════════════════════════════════════════╗
    ║   ██████╗ ██████╗  ██████╗ ██╗  ██╗██╗   ██╗             ║
    ║   ██╔══██╗██╔══██╗██╔═══██╗╚██╗██╔╝╚██╗ ██╔╝             ║
    ║   ██████╔╝██████╔╝██║   ██║ ╚███╔╝  ╚████╔╝  s i f t     ║
    ║   ██╔═══╝ ██╔══██╗██║   ██║ ██╔██╗   ╚██╔╝               ║
    ║   ██║     ██║  ██║╚██████╔╝██╔╝ ██╗   ██║                ║
    ║   ╚═╝     ╚═╝  ╚═╝ ╚═════╝ ╚═╝  ╚═╝   ╚═╝                ║
    ╚══════════════════════════════════════════════════════════╝
"#;

pub fn print_banner() {
    println!("{}", BANNER);
    println!("    v{}\n", env!("CARGO_PKG_VERSION"));
}
