pub mod batch;
pub mod context;
pub mod orchestrator;
pub mod report;

pub use batch::{BatchCancellation, BatchItem, BatchRunner};
pub use context::{PipelineContext, Stage, Warning};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, RunOutcome, RunState};
pub use report::{BatchReport, EntryStatus, ReportEntry, REPORT_FILE_NAME};
