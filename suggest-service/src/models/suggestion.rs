use serde::Serialize;
use validator::Validate;

/// One tourist-spot recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Validate)]
pub struct SuggestionRecord {
    #[validate(length(min = 1))]
    pub name: String,

    pub description: String,

    #[validate(url)]
    pub image_url: String,
}

/// Ordered suggestions for a single response.
pub type SuggestionList = Vec<SuggestionRecord>;

impl SuggestionRecord {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            image_url: image_url.into(),
        }
    }
}
