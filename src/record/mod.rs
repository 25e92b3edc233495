//! Record model.
//!
//! The enriched log record, its attribute values, and the process-wide
//! construction hooks that implement the missing-attribute policy.

pub mod exc;
pub mod factory;
pub mod level;
pub mod log_record;
pub mod missing;
pub mod value;

pub use exc::*;
pub use factory::*;
pub use level::*;
pub use log_record::*;
pub use missing::*;
pub use value::*;
