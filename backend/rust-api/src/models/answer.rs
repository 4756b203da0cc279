use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// Outcome of one answered question. The question text is copied in, not
/// referenced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAnswer {
    pub question: String,
    pub answered_correctly: bool,
}

/// Submission payload for `POST /api/user/answers`. Never stored as a unit.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserAnswer {
    #[serde(default, deserialize_with = "null_as_default")]
    #[validate(length(min = 1))]
    pub user_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    #[validate(length(min = 1))]
    pub answered_questions: Vec<QuestionAnswer>,
}

/// Explicit `null` is treated like an absent field so it fails validation
/// rather than parsing.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Deserialize)]
pub struct UserAnswersQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}
