//! Worker-to-render-thread command marshalling (spec §4.2)

mod marshal;

pub use marshal::{MarshalError, PendingResource, SecondaryCmd, SecondaryCmdMarshal, SecondaryRecorder};
