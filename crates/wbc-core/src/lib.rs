// wbc-core: Errors, constraint configuration, time and clocks for the velocity WBC.

pub mod config;
pub mod error;
pub mod time;

pub mod prelude {
    pub use crate::config::{ConstraintConfig, ConstraintKind, WbcConfig};
    pub use crate::error::{ConfigError, InputError, UsageError, WbcError};
    pub use crate::time::{Clock, ManualClock, SystemClock, Timestamp};
}
