//! Question answering over FMCG sales data.
//!
//! A question flows through a fixed pipeline:
//! 1. **Classification** (`intent`) - keyword rules map text to an `Intent`
//!    and pull out an optional year or percentage.
//! 2. **Policy** (`policy`) - decides whether a recognized intent is answered.
//! 3. **Dispatch** (`runtime`) - routes descriptive intents to the sales
//!    repository and predictive or what-if intents to the simulation engine.
//! 4. **Formatting** (`responses`) - renders the numbers as one short answer.
//!
//! Failures never leak into the text: they are mapped to the user-safe
//! messages of `jarvis_core::errors::InterfaceError`.

pub mod intent;
pub mod policy;
pub mod responses;
pub mod runtime;

pub use intent::{classify, extract_parameters, Intent, QuestionParameters};
pub use policy::{AnswerDecision, AnswerPolicy};
pub use runtime::{AgentRuntime, Answer};
