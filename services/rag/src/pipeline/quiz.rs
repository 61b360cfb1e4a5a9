//! services/rag/src/pipeline/quiz.rs
//!
//! Generates quizzes from retrieved document content and scores submitted
//! attempts. Question generation is a thin wrapper over the retrieval
//! machinery: a fixed probe query pulls representative chunks, and the
//! generation model turns them into a JSON question array.

use crate::pipeline::retrieve::Retriever;
use crate::pipeline::retry;
use smartlearn_core::domain::{ChatMessage, QuizAnswer, QuizAttempt, QuizKind, QuizQuestion};
use smartlearn_core::ports::{DocumentStore, GenerationService, PortError, PortResult};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// The retrieval query used to sample document content for quiz generation.
const QUIZ_PROBE_QUERY: &str = "Generate quiz questions from this document";

/// Quiz generation pulls a wider context than chat answering.
const QUIZ_TOP_K: usize = 10;

const PROMPT_TEMPLATE: &str = r#"You are an expert quiz generator. Generate {num} {kind} questions based on the following document content.

{context}

Format the output as a JSON array:
[
  {
    "question": "<question_text>",
    "options": ["Option A", "Option B", "Option C", "Option D"],
    "correctAnswer": "<correct_option_or_answer>",
    "explanation": "<optional_explanation>"
  }
]
Include the "options" field only for multiple-choice questions."#;

/// Generates and scores quizzes for ingested documents.
#[derive(Clone)]
pub struct QuizGenerator {
    documents: Arc<dyn DocumentStore>,
    retriever: Retriever,
    generator: Arc<dyn GenerationService>,
    retries: u32,
}

impl QuizGenerator {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        retriever: Retriever,
        generator: Arc<dyn GenerationService>,
        retries: u32,
    ) -> Self {
        Self {
            documents,
            retriever,
            generator,
            retries,
        }
    }

    /// Generates `num_questions` questions for a document and persists a
    /// blank attempt for later submission.
    pub async fn generate(
        &self,
        document_id: Uuid,
        kind: QuizKind,
        num_questions: usize,
    ) -> PortResult<(Vec<QuizQuestion>, QuizAttempt)> {
        let document = self.documents.get_document(document_id).await?;
        if !document.ready {
            return Err(PortError::IndexNotReady(document.index_namespace));
        }

        let context = self
            .retriever
            .retrieve(QUIZ_PROBE_QUERY, &document.index_namespace, QUIZ_TOP_K)
            .await?;
        if context.is_empty() {
            return Err(PortError::NotFound(format!(
                "Document {} has no indexed content to quiz on",
                document_id
            )));
        }

        let prompt = PROMPT_TEMPLATE
            .replace("{num}", &num_questions.to_string())
            .replace("{kind}", kind.prompt_label())
            .replace("{context}", &context.prompt_block);
        let messages = vec![ChatMessage::user(prompt)];

        let generator = Arc::clone(&self.generator);
        let raw = retry::with_backoff(self.retries, || {
            let generator = Arc::clone(&generator);
            let messages = messages.clone();
            async move { generator.generate(&messages, None).await }
        })
        .await?;

        let questions = extract_question_array(&raw)?;
        info!(%document_id, questions = questions.len(), "Generated quiz");

        let attempt = blank_attempt(document_id, &questions);
        self.documents.save_quiz_attempt(&attempt).await?;
        Ok((questions, attempt))
    }

    /// Scores a submitted attempt. Each answer is marked once; the attempt
    /// is immutable afterwards.
    pub async fn submit(
        &self,
        mut attempt: QuizAttempt,
        user_answers: &[String],
    ) -> PortResult<QuizAttempt> {
        let mut score = 0;
        for (answer, given) in attempt.answers.iter_mut().zip(user_answers) {
            let correct = answer
                .correct_answer
                .trim()
                .eq_ignore_ascii_case(given.trim());
            answer.user_answer = given.clone();
            answer.is_correct = Some(correct);
            if correct {
                score += 1;
            }
        }
        attempt.score = Some(score);

        self.documents.record_quiz_result(&attempt).await?;
        info!(attempt_id = %attempt.id, score, total = attempt.total_questions, "Quiz scored");
        Ok(attempt)
    }
}

fn blank_attempt(document_id: Uuid, questions: &[QuizQuestion]) -> QuizAttempt {
    QuizAttempt {
        id: Uuid::new_v4(),
        document_id,
        total_questions: questions.len(),
        score: None,
        answers: questions
            .iter()
            .map(|q| QuizAnswer {
                question: q.question.clone(),
                user_answer: String::new(),
                correct_answer: q.correct_answer.clone(),
                is_correct: None,
                explanation: q.explanation.clone(),
            })
            .collect(),
        attempted_at: chrono::Utc::now(),
    }
}

/// Pulls the JSON question array out of raw model output.
///
/// Models routinely wrap JSON in markdown fences or prose; everything
/// outside the outermost `[...]` is discarded. No array at all is a
/// malformed-output failure, distinct from a network error, and is not
/// retried.
fn extract_question_array(raw: &str) -> PortResult<Vec<QuizQuestion>> {
    let cleaned = raw.replace("```json", "").replace("```", "");
    let start = cleaned.find('[');
    let end = cleaned.rfind(']');
    let (start, end) = match (start, end) {
        (Some(s), Some(e)) if s < e => (s, e),
        _ => {
            return Err(PortError::MalformedOutput(
                "No JSON array found in quiz output".to_string(),
            ))
        }
    };

    serde_json::from_str(&cleaned[start..=end])
        .map_err(|e| PortError::MalformedOutput(format!("Quiz JSON failed to parse: {}", e)))
}
