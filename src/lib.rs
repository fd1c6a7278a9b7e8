#![warn(clippy::pedantic)]
// Noisy doc/signature lints — would require annotating every pub function
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
// Style preference — keeping format!("{}", x) over format!("{x}") for readability with complex exprs
#![allow(clippy::uninlined_format_args)]
// Intentional casts in backoff and timing arithmetic (delays, attempt exponents)
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]

pub mod agents;
pub mod chats;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod ratelimit;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
