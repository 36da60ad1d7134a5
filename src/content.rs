//! Template-driven content: quizzes, worksheets, question papers, lesson
//! plans, quiz auto-grading.
//!
//! Nothing here generates real questions or checks real answers. Every
//! result carries `"mode": "simulation"` so callers can tell.

use crate::error::Result;
use crate::metrics;
use crate::records::{self, Assignment};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const SIMULATION_MODE: &str = "simulation";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn marks(self) -> u32 {
        match self {
            Difficulty::Easy => 1,
            Difficulty::Medium => 2,
            Difficulty::Hard => 3,
        }
    }
}

// ==================== QUIZ ====================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuizOption {
    pub id: &'static str,
    pub text: &'static str,
}

const QUIZ_OPTIONS: [QuizOption; 4] = [
    QuizOption { id: "a", text: "Option A" },
    QuizOption { id: "b", text: "Option B" },
    QuizOption { id: "c", text: "Option C" },
    QuizOption { id: "d", text: "Option D" },
];

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: String,
    pub topic: String,
    pub question: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub difficulty: Difficulty,
    pub marks: u32,
    pub options: Vec<QuizOption>,
    pub correct_answer: &'static str,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuiz {
    pub quiz_id: String,
    pub class_id: String,
    pub topics: Vec<String>,
    pub difficulty: Difficulty,
    pub total_marks: u32,
    pub total_questions: usize,
    pub questions: Vec<QuizQuestion>,
    /// Minutes.
    pub estimated_time: u32,
    pub instructions: String,
    pub mode: &'static str,
}

/// `ceil(n / topics)` questions per topic, capped at `n` overall.
pub fn generate_quiz(
    class_id: &str,
    topics: &[String],
    difficulty: Difficulty,
    num_questions: usize,
) -> GeneratedQuiz {
    let mut questions = Vec::new();
    if !topics.is_empty() {
        let per_topic = num_questions.div_ceil(topics.len());
        for topic in topics {
            for i in 0..per_topic {
                if questions.len() >= num_questions {
                    break;
                }
                questions.push(QuizQuestion {
                    id: records::new_id(),
                    topic: topic.clone(),
                    question: format!("{} - {} level question {}?", topic, difficulty.as_str(), i + 1),
                    kind: "mcq",
                    difficulty,
                    marks: difficulty.marks(),
                    options: QUIZ_OPTIONS.to_vec(),
                    correct_answer: "a",
                    explanation: format!("This tests your understanding of {}", topic),
                });
            }
        }
    }

    GeneratedQuiz {
        quiz_id: records::new_id(),
        class_id: class_id.to_string(),
        topics: topics.to_vec(),
        difficulty,
        total_marks: questions.iter().map(|q| q.marks).sum(),
        total_questions: questions.len(),
        questions,
        estimated_time: (num_questions as f64 * 2.5).ceil() as u32,
        instructions: format!(
            "Answer all {} questions. Difficulty: {}",
            num_questions,
            difficulty.as_str()
        ),
        mode: SIMULATION_MODE,
    }
}

// ==================== WORKSHEET ====================

const PROBLEM_TYPES: [&str; 4] = ["concept-definition", "simple-example", "numerical", "word-problem"];
const WORKSHEET_PROBLEMS: usize = 8;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorksheetProblem {
    pub id: usize,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub problem: String,
    pub hints: Vec<&'static str>,
    pub solution_steps: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Worksheet {
    pub worksheet_id: String,
    pub student_id: String,
    pub student_name: String,
    pub topic: String,
    pub difficulty: String,
    pub total_problems: usize,
    pub estimated_time: &'static str,
    pub problems: Vec<WorksheetProblem>,
    pub instructions: String,
    pub review_after: &'static str,
    pub mode: &'static str,
}

/// Remedial worksheet for one student; `None` when the student is unknown.
pub fn generate_worksheet(
    conn: &Connection,
    student_id: &str,
    topic: &str,
    difficulty: &str,
) -> Result<Option<Worksheet>> {
    let Some(student) = records::get_student(conn, student_id)? else {
        return Ok(None);
    };

    let problems: Vec<WorksheetProblem> = (0..WORKSHEET_PROBLEMS)
        .map(|i| WorksheetProblem {
            id: i + 1,
            kind: PROBLEM_TYPES[i % PROBLEM_TYPES.len()],
            problem: format!("{} - Problem {} ({} difficulty)", topic, i + 1, difficulty),
            hints: vec!["Read carefully", "Break into steps", "Check your work"],
            solution_steps: Vec::new(),
        })
        .collect();

    Ok(Some(Worksheet {
        worksheet_id: records::new_id(),
        student_id: student.id,
        student_name: student.name,
        topic: topic.to_string(),
        difficulty: difficulty.to_string(),
        total_problems: problems.len(),
        estimated_time: "45-60 minutes",
        problems,
        instructions: format!(
            "Complete all problems. This worksheet targets {} at {} level",
            topic, difficulty
        ),
        review_after: "Compare with answer key and mark your progress",
        mode: SIMULATION_MODE,
    }))
}

// ==================== QUESTION PAPER ====================

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaperQuestion {
    pub id: String,
    pub question: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub marks: u32,
    pub options: Option<Vec<&'static str>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPaper {
    pub paper_id: String,
    pub class_id: String,
    pub total_marks: u32,
    pub question_count: usize,
    pub questions: Vec<PaperQuestion>,
    pub mode: &'static str,
}

/// MCQs are worth 1 mark with four options; every other type is worth 5.
pub fn generate_question_paper(class_id: &str, count: usize, question_type: &str) -> QuestionPaper {
    let mcq = question_type == "mcq";
    let questions: Vec<PaperQuestion> = (0..count)
        .map(|i| PaperQuestion {
            id: records::new_id(),
            question: format!("{}Sample Question {}", if mcq { "[MCQ] " } else { "" }, i + 1),
            kind: question_type.to_string(),
            marks: if mcq { 1 } else { 5 },
            options: mcq.then(|| vec!["Option A", "Option B", "Option C", "Option D"]),
        })
        .collect();

    QuestionPaper {
        paper_id: records::new_id(),
        class_id: class_id.to_string(),
        total_marks: questions.iter().map(|q| q.marks).sum(),
        question_count: questions.len(),
        questions,
        mode: SIMULATION_MODE,
    }
}

// ==================== LESSON PLAN ====================

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LessonSection {
    pub name: &'static str,
    /// Minutes.
    pub duration: u32,
    pub activities: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LearningLevels {
    pub beginning: u32,
    pub developing: u32,
    pub proficient: u32,
    pub advanced: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Differentiation {
    pub for_advanced: Vec<String>,
    pub for_struggling: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Homework {
    pub duration: u32,
    pub description: String,
    pub follow_up: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LessonPlan {
    pub plan_id: String,
    pub class_id: String,
    pub topic_id: String,
    pub total_duration: u32,
    pub sections: Vec<LessonSection>,
    pub learning_levels: LearningLevels,
    pub learning_objectives: Vec<String>,
    pub assessment_methods: Vec<&'static str>,
    pub resources: Vec<String>,
    pub differentiation: Differentiation,
    pub homework: Homework,
    pub mode: &'static str,
}

fn share(duration: u32, fraction: f64) -> u32 {
    (duration as f64 * fraction).ceil() as u32
}

pub fn generate_lesson_plan(class_id: &str, topic: &str, duration: u32) -> LessonPlan {
    let sections = vec![
        LessonSection {
            name: "Introduction",
            duration: share(duration, 0.10),
            activities: vec!["Hook/Engagement activity", "Learning objectives overview"],
        },
        LessonSection {
            name: "Concept Development",
            duration: share(duration, 0.40),
            activities: vec!["Direct instruction", "Visual demonstrations", "Real-world examples"],
        },
        LessonSection {
            name: "Guided Practice",
            duration: share(duration, 0.25),
            activities: vec!["Worked examples", "Peer discussion", "Q&A session"],
        },
        LessonSection {
            name: "Independent Practice",
            duration: share(duration, 0.15),
            activities: vec!["Problem solving", "Worksheet exercises"],
        },
        LessonSection {
            name: "Closure",
            duration: share(duration, 0.10),
            activities: vec!["Summary recap", "Preview next topic", "Homework assignment"],
        },
    ];

    LessonPlan {
        plan_id: records::new_id(),
        class_id: class_id.to_string(),
        topic_id: topic.to_string(),
        total_duration: duration,
        sections,
        learning_levels: LearningLevels {
            beginning: share(duration, 0.2),
            developing: share(duration, 0.4),
            proficient: share(duration, 0.3),
            advanced: share(duration, 0.1),
        },
        learning_objectives: vec![
            format!("Students will understand basic concepts of {}", topic),
            format!("Students will solve problems involving {}", topic),
            format!("Students will apply {} to real-world scenarios", topic),
        ],
        assessment_methods: vec!["Observation", "Questioning", "Independent work", "Group discussion"],
        resources: vec![
            format!("Textbook: Chapter on {}", topic),
            "Digital resources/videos".to_string(),
            "Practice worksheets".to_string(),
            "Interactive tools".to_string(),
        ],
        differentiation: Differentiation {
            for_advanced: vec![
                format!("Extension problems on {}", topic),
                "Peer teaching opportunities".to_string(),
            ],
            for_struggling: vec![
                format!("Simplified worksheet on {}", topic),
                "Visual aids".to_string(),
                "One-on-one support".to_string(),
            ],
        },
        homework: Homework {
            duration: 30,
            description: format!("Practice exercises on {} (Page X, Questions 1-10)", topic),
            follow_up: "Review homework answers in next class",
        },
        mode: SIMULATION_MODE,
    }
}

// ==================== AUTO-GRADING ====================

/// How many of the submitted answers count as correct.
pub trait QuizScorer {
    fn correct_answers(&self, quiz: &Assignment, answers: &Map<String, Value>) -> f64;
}

/// Stand-in scorer with no answer key: a fixed share of answers is assumed
/// correct regardless of content.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedScorer {
    pub assumed_correct_rate: f64,
}

impl Default for SimulatedScorer {
    fn default() -> Self {
        Self {
            assumed_correct_rate: 0.7,
        }
    }
}

impl QuizScorer for SimulatedScorer {
    fn correct_answers(&self, _quiz: &Assignment, answers: &Map<String, Value>) -> f64 {
        answers.len() as f64 * self.assumed_correct_rate
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AutoGradeResult {
    pub quiz_id: String,
    pub score: f64,
    pub percentage: f64,
    pub total_questions: usize,
    pub correct_answers: f64,
    pub time_spent: Option<u32>,
    pub recommendations: Vec<&'static str>,
    pub mode: &'static str,
}

/// Scores `answers` (question id -> chosen option) against the quiz
/// assignment. `None` when the assignment does not exist.
pub fn auto_grade(
    conn: &Connection,
    scorer: &dyn QuizScorer,
    quiz_id: &str,
    answers: &Map<String, Value>,
) -> Result<Option<AutoGradeResult>> {
    let Some(quiz) = records::get_assignment(conn, quiz_id)? else {
        return Ok(None);
    };
    let total_questions = answers.len();
    let correct = scorer.correct_answers(&quiz, answers);
    let score = if total_questions == 0 {
        0.0
    } else {
        (correct / total_questions as f64 * quiz.total_marks).round()
    };
    let percentage = metrics::percent_of(score, quiz.total_marks).round();

    let recommendations = if percentage < 60.0 {
        vec![
            "Review fundamentals",
            "Practice more similar questions",
            "Ask teacher for help",
        ]
    } else if percentage < 80.0 {
        vec![
            "Good effort! Focus on edge cases",
            "Practice variations of these concepts",
        ]
    } else {
        vec!["Excellent performance! Move to advanced topics"]
    };

    Ok(Some(AutoGradeResult {
        quiz_id: quiz.id,
        score,
        percentage,
        total_questions,
        correct_answers: correct.round(),
        time_spent: None,
        recommendations,
        mode: SIMULATION_MODE,
    }))
}

// ==================== STUDY MATERIAL TEMPLATES ====================

pub fn resource_suggestions(topic: &str) -> Vec<String> {
    vec![
        format!("Video: {} explained step-by-step", topic),
        format!("Interactive tool: Practice {} problems", topic),
        format!("Reading: {} fundamentals guide", topic),
        format!("Quiz: {} self-assessment", topic),
    ]
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PracticeProblem {
    pub id: usize,
    pub problem: String,
    pub marks: u32,
}

pub fn practice_set(topic: &str, level: &str) -> Vec<PracticeProblem> {
    (1..=3)
        .map(|id| PracticeProblem {
            id,
            problem: format!("{} - {} level problem {}", topic, level, id),
            marks: 5,
        })
        .collect()
}

/// One entry of the fixed study-material catalogue.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogueItem {
    pub title: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    pub level: &'static str,
    pub rating: f64,
}

const fn video(title: &'static str, level: &'static str, rating: f64) -> CatalogueItem {
    CatalogueItem {
        title,
        url: Some("youtube.com"),
        count: None,
        pages: None,
        level,
        rating,
    }
}

const fn question_set(title: &'static str, count: u32, level: &'static str, rating: f64) -> CatalogueItem {
    CatalogueItem {
        title,
        url: None,
        count: Some(count),
        pages: None,
        level,
        rating,
    }
}

const fn notes(title: &'static str, pages: u32, level: &'static str, rating: f64) -> CatalogueItem {
    CatalogueItem {
        title,
        url: None,
        count: None,
        pages: Some(pages),
        level,
        rating,
    }
}

pub const VIDEOS: [CatalogueItem; 3] = [
    video("Basics of Algebra - Khan Academy", "beginner", 4.8),
    video("Advanced Calculus Concepts", "advanced", 4.5),
    video("Geometry Fundamentals", "beginner", 4.7),
];

pub const MCQ_SETS: [CatalogueItem; 3] = [
    question_set("10 MCQs on Algebra", 10, "medium", 4.6),
    question_set("Geometry Practice Set", 20, "hard", 4.4),
    question_set("Calculus Self-Assessment", 15, "medium", 4.5),
];

pub const PAST_QUESTIONS: [CatalogueItem; 2] = [
    question_set("Algebra - Last 5 Years PYQ", 25, "hard", 4.9),
    question_set("Geometry - Board Exam Questions", 30, "hard", 4.8),
];

pub const NOTES: [CatalogueItem; 2] = [
    notes("Algebra Quick Reference", 15, "medium", 4.6),
    notes("Geometry Formulas & Theorems", 10, "medium", 4.7),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::records::fixtures;

    #[test]
    fn quiz_splits_questions_across_topics_and_caps_count() {
        let topics = vec!["Fractions".to_string(), "Decimals".to_string(), "Ratios".to_string()];
        let quiz = generate_quiz("c1", &topics, Difficulty::Hard, 7);
        assert_eq!(quiz.total_questions, 7);
        assert_eq!(quiz.total_marks, 21);
        assert_eq!(quiz.estimated_time, 18);
        // ceil(7/3) = 3 per topic, so the last topic only gets one
        assert_eq!(quiz.questions.iter().filter(|q| q.topic == "Ratios").count(), 1);
        assert!(quiz.questions.iter().all(|q| q.correct_answer == "a"));
        assert_eq!(quiz.mode, "simulation");
    }

    #[test]
    fn question_paper_marks_depend_on_type() {
        let mcq = generate_question_paper("c1", 4, "mcq");
        assert_eq!(mcq.total_marks, 4);
        assert!(mcq.questions[0].options.is_some());
        let short = generate_question_paper("c1", 3, "short-answer");
        assert_eq!(short.total_marks, 15);
        assert!(short.questions[0].options.is_none());
    }

    #[test]
    fn lesson_plan_rounds_section_durations_up() {
        let plan = generate_lesson_plan("c1", "Photosynthesis", 45);
        let durations: Vec<u32> = plan.sections.iter().map(|s| s.duration).collect();
        assert_eq!(durations, vec![5, 18, 12, 7, 5]);
        assert_eq!(plan.learning_levels.beginning, 9);
    }

    #[test]
    fn simulated_scorer_assumes_seventy_percent() {
        let conn = db::open_in_memory().expect("db");
        let c = fixtures::class(&conn, "7A");
        let quiz = fixtures::assignment(&conn, &c.id, "Quiz 1", 20.0);
        let mut answers = Map::new();
        for i in 0..10 {
            answers.insert(format!("q{}", i), Value::String("a".into()));
        }
        let result = auto_grade(&conn, &SimulatedScorer::default(), &quiz.id, &answers)
            .expect("grade")
            .expect("quiz exists");
        assert_eq!(result.score, 14.0);
        assert_eq!(result.percentage, 70.0);
        assert_eq!(result.correct_answers, 7.0);
        assert_eq!(result.recommendations.len(), 2);

        let empty = auto_grade(&conn, &SimulatedScorer::default(), &quiz.id, &Map::new())
            .expect("grade")
            .expect("quiz exists");
        assert_eq!(empty.score, 0.0);

        assert!(auto_grade(&conn, &SimulatedScorer::default(), "missing", &answers)
            .expect("grade")
            .is_none());
    }
}
