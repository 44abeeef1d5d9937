//! Prompts and pagination for command handlers
//!
//! Both suspend only the calling task. A prompt waits for one matching reply (or a
//! cancel press, or its timeout); pagination waits for button presses until stopped
//! or idle. Every listener they attach is detached on all exit paths.

mod correlator;
mod error;
mod pagination;
mod prompt;

pub use correlator::Validator;
pub use error::InteractError;
pub use pagination::{paginate, Button, PaginationOptions};
pub use prompt::{prompt, prompt_author, PromptOptions};
