//! Terminal output
//!
//! Styled step lines and spinners in an interactive terminal, plain bracketed
//! prefixes (`[OK]`, `[WARN]`, `[FAIL]`) everywhere else so CI logs stay
//! greppable.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{key_value, remark, step_error_detail, step_ok_detail, step_warn};
pub use progress::TaskSpinner;
