use serde::{Deserialize, Serialize};

/// Catalog entry as served to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub question: String,
    pub option1: String,
    pub option2: String,
    pub option3: String,
    pub option4: String,
    /// One of the four options by convention; not enforced.
    pub answer: String,
}

/// Stored shape of a question. The id is the document key, not a field.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionRecord {
    pub question: String,
    pub option1: String,
    pub option2: String,
    pub option3: String,
    pub option4: String,
    pub answer: String,
}

impl QuestionRecord {
    pub fn into_question(self, id: String) -> Question {
        Question {
            id,
            question: self.question,
            option1: self.option1,
            option2: self.option2,
            option3: self.option3,
            option4: self.option4,
            answer: self.answer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn question_serializes_with_id() {
        let question = QuestionRecord {
            question: "Capital of France?".to_string(),
            option1: "Paris".to_string(),
            option2: "Lyon".to_string(),
            option3: "Nice".to_string(),
            option4: "Lille".to_string(),
            answer: "Paris".to_string(),
        }
        .into_question("q1".to_string());

        assert_eq!(
            serde_json::to_value(&question).unwrap(),
            json!({
                "id": "q1",
                "question": "Capital of France?",
                "option1": "Paris",
                "option2": "Lyon",
                "option3": "Nice",
                "option4": "Lille",
                "answer": "Paris"
            })
        );
    }
}
