//! Domain models for suggestion responses.

pub mod suggestion;

pub use suggestion::{SuggestionList, SuggestionRecord};
