pub mod answer;
pub mod question;

pub use answer::{QuestionAnswer, UserAnswer};
pub use question::Question;
