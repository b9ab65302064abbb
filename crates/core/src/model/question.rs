use crate::model::ids::QuestionIndex;

/// One row of the question table, numbered at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub sequence_index: QuestionIndex,
    pub qid: String,
    pub question_text: String,
    pub model_answer: String,
}

impl Question {
    #[must_use]
    pub fn new(
        sequence_index: QuestionIndex,
        qid: impl Into<String>,
        question_text: impl Into<String>,
        model_answer: impl Into<String>,
    ) -> Self {
        Self {
            sequence_index,
            qid: qid.into(),
            question_text: question_text.into(),
            model_answer: model_answer.into(),
        }
    }
}
