pub mod record;

pub use record::{EvaluationRecord, RecordStatus, UnitDescriptor};
