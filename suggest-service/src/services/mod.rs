pub mod metrics;
pub mod providers;
pub mod suggestions;
pub mod validation;

pub use suggestions::{SuggestError, SuggestionService};
pub use validation::{validate, ValidationError};
