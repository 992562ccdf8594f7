pub mod diff;
pub mod recorder;

pub use diff::diff;
pub use recorder::AuditRecorder;
