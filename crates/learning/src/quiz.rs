//! Quizzes, questions, options and attempts.
//!
//! Attempt numbers are per (quiz, profile), start at 1, only ever grow, and are
//! capped by the quiz's `max_attempts` when one is configured.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use learnhub_core::{
    AttemptId, BlockId, CompanyId, CourseId, DomainError, DomainResult, OptionId, ProfileId, QuestionId, QuizId,
};

use crate::{BlockKind, LessonBlock, text};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: QuizId,
    pub company_id: CompanyId,
    pub course_id: CourseId,
    pub block_id: BlockId,
    pub title: String,
    /// `None` means unlimited attempts.
    pub max_attempts: Option<u32>,
    /// Percentage required to pass.
    pub passing_score: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizDraft {
    pub title: String,
    pub max_attempts: Option<u32>,
    pub passing_score: Option<u8>,
}

pub const DEFAULT_PASSING_SCORE: u8 = 70;

impl Quiz {
    /// Quizzes live on a `QUIZ` lesson block.
    pub fn create(block: &LessonBlock, draft: QuizDraft, now: DateTime<Utc>) -> DomainResult<Self> {
        if block.kind != BlockKind::Quiz {
            return Err(DomainError::validation("Block is not a quiz block"));
        }
        let passing_score = draft.passing_score.unwrap_or(DEFAULT_PASSING_SCORE);
        if passing_score > 100 {
            return Err(DomainError::validation("Passing score must be between 0 and 100"));
        }
        Ok(Self {
            id: QuizId::new(),
            company_id: block.company_id,
            course_id: block.course_id,
            block_id: block.id,
            title: text::required("Title", &draft.title)?,
            max_attempts: draft.max_attempts,
            passing_score,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: QuestionId,
    pub company_id: CompanyId,
    pub quiz_id: QuizId,
    pub prompt: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub prompt: String,
}

impl QuizQuestion {
    pub fn create(quiz: &Quiz, draft: QuestionDraft, position: i32, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id: QuestionId::new(),
            company_id: quiz.company_id,
            quiz_id: quiz.id,
            prompt: text::required("Prompt", &draft.prompt)?,
            position,
            created_at: now,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizOption {
    pub id: OptionId,
    pub company_id: CompanyId,
    pub quiz_id: QuizId,
    pub question_id: QuestionId,
    pub text: String,
    pub is_correct: bool,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionDraft {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

impl QuizOption {
    pub fn create(question: &QuizQuestion, draft: OptionDraft, position: i32, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id: OptionId::new(),
            company_id: question.company_id,
            quiz_id: question.quiz_id,
            question_id: question.id,
            text: text::required("Text", &draft.text)?,
            is_correct: draft.is_correct,
            position,
            created_at: now,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("Max attempts reached")]
    MaxAttemptsReached { max_attempts: u32 },
}

impl From<AdmissionError> for DomainError {
    fn from(value: AdmissionError) -> Self {
        DomainError::validation(value.to_string())
    }
}

/// Attempt admission: the next attempt number for a (quiz, profile).
///
/// `existing` are the attempt numbers this profile already holds for the quiz.
pub fn admit_attempt<I>(existing: I, max_attempts: Option<u32>) -> Result<u32, AdmissionError>
where
    I: IntoIterator<Item = u32>,
{
    let next = existing.into_iter().max().map_or(1, |max| max + 1);
    match max_attempts {
        Some(max) if next > max => Err(AdmissionError::MaxAttemptsReached { max_attempts: max }),
        _ => Ok(next),
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "IN_PROGRESS",
            AttemptStatus::Submitted => "SUBMITTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "IN_PROGRESS" => Some(AttemptStatus::InProgress),
            "SUBMITTED" => Some(AttemptStatus::Submitted),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptAnswer {
    pub question_id: QuestionId,
    pub option_id: OptionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub id: AttemptId,
    pub company_id: CompanyId,
    pub quiz_id: QuizId,
    pub profile_id: ProfileId,
    pub attempt_number: u32,
    pub status: AttemptStatus,
    pub answers: Vec<AttemptAnswer>,
    pub score: Option<u8>,
    pub passed: Option<bool>,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl QuizAttempt {
    /// Start an attempt with a number obtained from [`admit_attempt`].
    pub fn start(quiz: &Quiz, profile_id: ProfileId, attempt_number: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: AttemptId::new(),
            company_id: quiz.company_id,
            quiz_id: quiz.id,
            profile_id,
            attempt_number,
            status: AttemptStatus::InProgress,
            answers: Vec::new(),
            score: None,
            passed: None,
            started_at: now,
            submitted_at: None,
        }
    }

    /// Grade the attempt.
    ///
    /// The score is the rounded percentage of `questions` answered with a
    /// correct option of that same question. Unanswered questions count as
    /// wrong.
    pub fn submit(
        &mut self,
        answers: Vec<AttemptAnswer>,
        questions: &[QuizQuestion],
        options: &[QuizOption],
        passing_score: u8,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if self.status == AttemptStatus::Submitted {
            return Err(DomainError::validation("Attempt already submitted"));
        }
        if questions.is_empty() {
            return Err(DomainError::validation("Quiz has no questions"));
        }

        let question_ids: HashSet<QuestionId> = questions.iter().map(|q| q.id).collect();
        let options_by_id: HashMap<OptionId, &QuizOption> = options.iter().map(|o| (o.id, o)).collect();

        let mut answered = HashSet::with_capacity(answers.len());
        let mut correct = 0usize;
        for answer in &answers {
            if !question_ids.contains(&answer.question_id) {
                return Err(DomainError::validation("Answer references an unknown question"));
            }
            if !answered.insert(answer.question_id) {
                return Err(DomainError::validation("Question answered more than once"));
            }
            let option = options_by_id
                .get(&answer.option_id)
                .filter(|o| o.question_id == answer.question_id)
                .ok_or_else(|| DomainError::validation("Answer references an unknown option"))?;
            if option.is_correct {
                correct += 1;
            }
        }

        let total = questions.len();
        let score = ((correct * 100 + total / 2) / total) as u8;

        self.answers = answers;
        self.score = Some(score);
        self.passed = Some(score >= passing_score);
        self.status = AttemptStatus::Submitted;
        self.submitted_at = Some(now);
        Ok(())
    }
}

scoped_entity!(Quiz, QuizId);
scoped_entity!(QuizQuestion, QuestionId);
scoped_entity!(QuizOption, OptionId);
scoped_entity!(QuizAttempt, AttemptId);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BlockDraft, Course, CourseDraft, CourseModule, Lesson, LessonDraft, ModuleDraft};

    fn quiz_block(kind: BlockKind) -> LessonBlock {
        let now = Utc::now();
        let course = Course::create(
            CompanyId::new(),
            ProfileId::new(),
            CourseDraft {
                title: "Compliance".into(),
                ..Default::default()
            },
            now,
        )
        .unwrap();
        let module = CourseModule::create(
            &course,
            ModuleDraft {
                title: "M1".into(),
                description: None,
            },
            1,
            now,
        )
        .unwrap();
        let lesson = Lesson::create(&module, LessonDraft { title: "L1".into() }, 1, now).unwrap();
        LessonBlock::create(&lesson, BlockDraft { kind, content: None }, 1, now)
    }

    fn quiz(max_attempts: Option<u32>) -> Quiz {
        Quiz::create(
            &quiz_block(BlockKind::Quiz),
            QuizDraft {
                title: "Check".into(),
                max_attempts,
                passing_score: Some(50),
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn first_attempt_is_number_one() {
        assert_eq!(admit_attempt(Vec::new(), Some(2)), Ok(1));
    }

    #[test]
    fn attempts_are_capped() {
        assert_eq!(admit_attempt([1], Some(2)), Ok(2));
        assert_eq!(
            admit_attempt([1, 2], Some(2)),
            Err(AdmissionError::MaxAttemptsReached { max_attempts: 2 })
        );
    }

    #[test]
    fn unset_cap_is_unbounded() {
        assert_eq!(admit_attempt(1..=500, None), Ok(501));
    }

    #[test]
    fn numbers_are_never_reused_after_gaps() {
        // Attempt 2 missing (e.g. removed out of band): next is still max + 1.
        assert_eq!(admit_attempt([1, 3], None), Ok(4));
    }

    #[test]
    fn max_attempts_error_maps_to_validation_message() {
        let err: DomainError = AdmissionError::MaxAttemptsReached { max_attempts: 2 }.into();
        assert_eq!(err, DomainError::validation("Max attempts reached"));
    }

    #[test]
    fn quiz_requires_a_quiz_block() {
        let err = Quiz::create(
            &quiz_block(BlockKind::Text),
            QuizDraft {
                title: "Check".into(),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, DomainError::validation("Block is not a quiz block"));
    }

    #[test]
    fn submit_scores_percentage_of_correct_answers() {
        let now = Utc::now();
        let quiz = quiz(None);
        let q1 = QuizQuestion::create(&quiz, QuestionDraft { prompt: "2+2?".into() }, 1, now).unwrap();
        let q2 = QuizQuestion::create(&quiz, QuestionDraft { prompt: "3+3?".into() }, 2, now).unwrap();
        let q1_right = QuizOption::create(&q1, OptionDraft { text: "4".into(), is_correct: true }, 1, now).unwrap();
        let q2_wrong = QuizOption::create(&q2, OptionDraft { text: "5".into(), is_correct: false }, 1, now).unwrap();
        let questions = vec![q1.clone(), q2.clone()];
        let options = vec![q1_right.clone(), q2_wrong.clone()];

        let mut attempt = QuizAttempt::start(&quiz, ProfileId::new(), 1, now);
        attempt
            .submit(
                vec![
                    AttemptAnswer { question_id: q1.id, option_id: q1_right.id },
                    AttemptAnswer { question_id: q2.id, option_id: q2_wrong.id },
                ],
                &questions,
                &options,
                quiz.passing_score,
                now,
            )
            .unwrap();

        assert_eq!(attempt.score, Some(50));
        assert_eq!(attempt.passed, Some(true));
        assert_eq!(attempt.status, AttemptStatus::Submitted);

        let again = attempt.submit(Vec::new(), &questions, &options, quiz.passing_score, now);
        assert!(again.is_err());
    }

    #[test]
    fn submit_rejects_option_of_another_question() {
        let now = Utc::now();
        let quiz = quiz(None);
        let q1 = QuizQuestion::create(&quiz, QuestionDraft { prompt: "a".into() }, 1, now).unwrap();
        let q2 = QuizQuestion::create(&quiz, QuestionDraft { prompt: "b".into() }, 2, now).unwrap();
        let q2_opt = QuizOption::create(&q2, OptionDraft { text: "x".into(), is_correct: true }, 1, now).unwrap();

        let mut attempt = QuizAttempt::start(&quiz, ProfileId::new(), 1, now);
        let err = attempt
            .submit(
                vec![AttemptAnswer { question_id: q1.id, option_id: q2_opt.id }],
                &[q1, q2],
                &[q2_opt],
                quiz.passing_score,
                now,
            )
            .unwrap_err();
        assert_eq!(err, DomainError::validation("Answer references an unknown option"));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: successive admissions yield 1, 2, 3, … and stop exactly at the cap.
            #[test]
            fn successive_attempts_are_sequential_and_capped(max in 0u32..20, tries in 0usize..30) {
                let mut held: Vec<u32> = Vec::new();
                for _ in 0..tries {
                    match admit_attempt(held.iter().copied(), Some(max)) {
                        Ok(n) => {
                            prop_assert_eq!(n as usize, held.len() + 1);
                            held.push(n);
                        }
                        Err(AdmissionError::MaxAttemptsReached { max_attempts }) => {
                            prop_assert_eq!(max_attempts, max);
                            prop_assert_eq!(held.len() as u32, max);
                        }
                    }
                }
                prop_assert!(held.len() as u32 <= max);
            }
        }
    }
}
