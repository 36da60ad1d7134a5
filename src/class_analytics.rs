//! Per-class aggregation. Each function fans out over the students of one
//! class and re-aggregates (top-k, sort, bucket by topic). All of them
//! return `Ok(None)` for an unknown class and a well-formed, empty result
//! for a class with no students.

use crate::error::Result;
use crate::metrics::{average, rate};
use crate::records::{self, AttendanceFilter, AttendanceRecord, AttendanceTally, Class, GradedWork, Student};
use crate::student_analytics::{
    feedback_from, parent_report_from, patterns_from, predict_from, FeedbackStatus, Prediction,
    PredictionResult, StudentData, StudentFeedback,
};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

/// A class with its roster, graded work and attendance, loaded once.
struct ClassData {
    class: Class,
    students: Vec<Student>,
    work: Vec<GradedWork>,
    attendance: Vec<AttendanceRecord>,
}

impl ClassData {
    fn load(conn: &Connection, class_id: &str) -> Result<Option<Self>> {
        let Some(class) = records::get_class(conn, class_id)? else {
            return Ok(None);
        };
        Ok(Some(Self {
            students: records::list_students(conn, Some(class_id))?,
            work: records::graded_work_for_class(conn, class_id)?,
            attendance: records::list_attendance(
                conn,
                AttendanceFilter {
                    class_id: Some(class_id),
                    ..Default::default()
                },
            )?,
            class,
        }))
    }

    fn percentages_of(&self, student_id: &str) -> Vec<f64> {
        self.work
            .iter()
            .filter(|w| w.student_id == student_id)
            .map(GradedWork::percent)
            .collect()
    }

    fn tally_of(&self, student_id: &str) -> AttendanceTally {
        let records: Vec<AttendanceRecord> = self
            .attendance
            .iter()
            .filter(|a| a.student_id == student_id)
            .cloned()
            .collect();
        AttendanceTally::from_records(&records)
    }

    /// Mean percentage per topic, alphabetical.
    fn topic_averages(&self) -> BTreeMap<String, (f64, usize)> {
        let mut by_topic: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for w in &self.work {
            by_topic.entry(w.topic.clone()).or_default().push(w.percent());
        }
        by_topic
            .into_iter()
            .map(|(topic, scores)| (topic, (average(&scores), scores.len())))
            .collect()
    }
}

fn student_data(conn: &Connection, students: &[Student]) -> Result<Vec<StudentData>> {
    let mut out = Vec::with_capacity(students.len());
    for s in students {
        if let Some(d) = StudentData::load(conn, &s.id)? {
            out.push(d);
        }
    }
    Ok(out)
}

// ==================== HEATMAP ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TopicDifficulty {
    Hard,
    Medium,
    Easy,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapRow {
    pub student_id: String,
    pub student_name: String,
    pub topic_performance: BTreeMap<String, f64>,
    /// Mean of the topic cells; `None` for a student with no graded work.
    pub overall_average: Option<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopicAnalysis {
    pub topic: String,
    pub class_average: f64,
    pub difficulty: TopicDifficulty,
    pub attempts: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceHeatmap {
    pub class_id: String,
    pub student_data: Vec<HeatmapRow>,
    pub class_topic_analysis: Vec<TopicAnalysis>,
}

fn heatmap_from(data: &ClassData) -> PerformanceHeatmap {
    let student_data = data
        .students
        .iter()
        .map(|s| {
            let mut cells: BTreeMap<String, Vec<f64>> = BTreeMap::new();
            for w in data.work.iter().filter(|w| w.student_id == s.id) {
                cells.entry(w.topic.clone()).or_default().push(w.percent());
            }
            let topic_performance: BTreeMap<String, f64> = cells
                .into_iter()
                .map(|(topic, scores)| (topic, average(&scores).round()))
                .collect();
            let overall_average = (!topic_performance.is_empty()).then(|| {
                let values: Vec<f64> = topic_performance.values().copied().collect();
                crate::metrics::round_to(average(&values), 2)
            });
            HeatmapRow {
                student_id: s.id.clone(),
                student_name: s.name.clone(),
                topic_performance,
                overall_average,
            }
        })
        .collect();

    let class_topic_analysis = data
        .topic_averages()
        .into_iter()
        .map(|(topic, (avg, attempts))| TopicAnalysis {
            topic,
            class_average: avg.round(),
            difficulty: if avg < 50.0 {
                TopicDifficulty::Hard
            } else if avg < 70.0 {
                TopicDifficulty::Medium
            } else {
                TopicDifficulty::Easy
            },
            attempts,
        })
        .collect();

    PerformanceHeatmap {
        class_id: data.class.id.clone(),
        student_data,
        class_topic_analysis,
    }
}

/// Student x topic matrix of mean percentages. Students keep enrolment
/// order and topics are alphabetical, so the output is stable.
pub fn performance_heatmap(conn: &Connection, class_id: &str) -> Result<Option<PerformanceHeatmap>> {
    Ok(ClassData::load(conn, class_id)?.map(|d| heatmap_from(&d)))
}

// ==================== EFFORT / OUTCOME ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EffortCategory {
    Efficient,
    HighEffortLowOutcome,
    LowEffort,
    Average,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EffortOutcome {
    pub student_id: String,
    pub student_name: String,
    pub effort_score: f64,
    pub outcome_score: f64,
    pub efficiency: f64,
    pub category: EffortCategory,
}

fn effort_from(data: &ClassData) -> Vec<EffortOutcome> {
    let mut rows: Vec<EffortOutcome> = data
        .students
        .iter()
        .map(|s| {
            let tally = data.tally_of(&s.id);
            let effort = rate(tally.present, tally.total, 0.0);
            let outcome = average(&data.percentages_of(&s.id)).round();
            let efficiency = if effort > 0.0 {
                (outcome / effort * 100.0).round()
            } else {
                0.0
            };
            let category = if effort >= 80.0 && outcome >= 75.0 {
                EffortCategory::Efficient
            } else if effort >= 80.0 {
                EffortCategory::HighEffortLowOutcome
            } else if effort < 60.0 {
                EffortCategory::LowEffort
            } else {
                EffortCategory::Average
            };
            EffortOutcome {
                student_id: s.id.clone(),
                student_name: s.name.clone(),
                effort_score: effort,
                outcome_score: outcome,
                efficiency,
                category,
            }
        })
        .collect();
    rows.sort_by(|a, b| b.efficiency.total_cmp(&a.efficiency));
    rows
}

/// Attendance (effort) against graded average (outcome), most efficient
/// first.
pub fn effort_outcome_analysis(conn: &Connection, class_id: &str) -> Result<Option<Vec<EffortOutcome>>> {
    Ok(ClassData::load(conn, class_id)?.map(|d| effort_from(&d)))
}

// ==================== GRADING INSIGHTS ====================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StudentAverage {
    pub id: String,
    pub name: String,
    pub average: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GradingInsights {
    pub class_id: String,
    pub class_average: f64,
    pub total_students: usize,
    pub top_performers: Vec<StudentAverage>,
    pub needs_intervention: Vec<StudentAverage>,
    pub action_items: Vec<String>,
}

const INSIGHT_BAND: f64 = 15.0;

fn insights_from(data: &ClassData) -> GradingInsights {
    let all: Vec<f64> = data.work.iter().map(GradedWork::percent).collect();
    let class_average = average(&all).round();

    let mut top = Vec::new();
    let mut struggling = Vec::new();
    for s in &data.students {
        let samples = data.percentages_of(&s.id);
        if samples.is_empty() {
            continue;
        }
        let avg = average(&samples);
        let entry = StudentAverage {
            id: s.id.clone(),
            name: s.name.clone(),
            average: avg.round(),
        };
        if avg > class_average + INSIGHT_BAND {
            top.push(entry);
        } else if avg < class_average - INSIGHT_BAND {
            struggling.push(entry);
        }
    }
    top.sort_by(|a, b| b.average.total_cmp(&a.average));
    struggling.sort_by(|a, b| a.average.total_cmp(&b.average));

    let action_items = vec![
        format!("{} students performing exceptionally well", top.len()),
        format!("{} students need targeted intervention", struggling.len()),
        format!("Class average is {}%", class_average),
    ];
    top.truncate(5);
    struggling.truncate(5);

    GradingInsights {
        class_id: data.class.id.clone(),
        class_average,
        total_students: data.students.len(),
        top_performers: top,
        needs_intervention: struggling,
        action_items,
    }
}

pub fn grading_insights(conn: &Connection, class_id: &str) -> Result<Option<GradingInsights>> {
    Ok(ClassData::load(conn, class_id)?.map(|d| insights_from(&d)))
}

// ==================== ENGAGEMENT ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngagementStatus {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentEngagement {
    pub student_id: String,
    pub student_name: String,
    pub engagement_score: f64,
    pub status: EngagementStatus,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EngagementHeatmap {
    pub class_id: String,
    pub engagement: Vec<StudentEngagement>,
    pub avg_engagement: f64,
    pub low_engagement_students: Vec<StudentEngagement>,
}

/// Engagement = 0.4 x attendance rate + 0.6 x graded average.
pub fn engagement_heatmap(conn: &Connection, class_id: &str) -> Result<Option<EngagementHeatmap>> {
    let Some(data) = ClassData::load(conn, class_id)? else {
        return Ok(None);
    };
    let mut engagement: Vec<StudentEngagement> = data
        .students
        .iter()
        .map(|s| {
            let tally = data.tally_of(&s.id);
            let attendance = rate(tally.present, tally.total, 0.0);
            let score = 0.4 * attendance + 0.6 * average(&data.percentages_of(&s.id));
            StudentEngagement {
                student_id: s.id.clone(),
                student_name: s.name.clone(),
                engagement_score: score.round(),
                status: if score >= 75.0 {
                    EngagementStatus::High
                } else if score >= 50.0 {
                    EngagementStatus::Medium
                } else {
                    EngagementStatus::Low
                },
            }
        })
        .collect();
    engagement.sort_by(|a, b| b.engagement_score.total_cmp(&a.engagement_score));

    let scores: Vec<f64> = engagement.iter().map(|e| e.engagement_score).collect();
    let low = engagement
        .iter()
        .filter(|e| e.status == EngagementStatus::Low)
        .cloned()
        .collect();
    Ok(Some(EngagementHeatmap {
        class_id: data.class.id,
        avg_engagement: average(&scores).round(),
        engagement,
        low_engagement_students: low,
    }))
}

// ==================== PREDICTIONS ====================

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassPredictions {
    pub class_id: String,
    pub total_students: usize,
    pub at_risk: usize,
    pub average: usize,
    pub top_performers: usize,
    pub insufficient_data: usize,
    /// Lowest risk first.
    pub predictions: Vec<PredictionResult>,
}

fn predictions_for(conn: &Connection, students: &[Student]) -> Result<Vec<PredictionResult>> {
    Ok(student_data(conn, students)?.iter().map(predict_from).collect())
}

pub fn class_predictions(conn: &Connection, class_id: &str) -> Result<Option<ClassPredictions>> {
    let Some(class) = records::get_class(conn, class_id)? else {
        return Ok(None);
    };
    let students = records::list_students(conn, Some(class_id))?;
    let mut predictions = predictions_for(conn, &students)?;
    predictions.sort_by(|a, b| a.risk_score.total_cmp(&b.risk_score));

    let count = |p: Prediction| predictions.iter().filter(|r| r.prediction == p).count();
    Ok(Some(ClassPredictions {
        class_id: class.id,
        total_students: students.len(),
        at_risk: count(Prediction::AtRisk),
        average: count(Prediction::Average),
        top_performers: count(Prediction::Top),
        insufficient_data: count(Prediction::InsufficientData),
        predictions,
    }))
}

// ==================== SUMMARY ====================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TopicAverage {
    pub topic: String,
    pub average: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummary {
    pub class_id: String,
    pub student_count: usize,
    pub total_grades: usize,
    pub student_averages: Vec<StudentAverage>,
    pub top_performers: Vec<StudentAverage>,
    pub weakest_topics: Vec<TopicAverage>,
    pub overall_average: f64,
}

/// Class performance at a glance. Ungraded placeholders are left out of
/// every average here, so a topic graded 80 and 40 with one student still
/// pending averages 60.
pub fn class_summary(conn: &Connection, class_id: &str) -> Result<Option<ClassSummary>> {
    let Some(data) = ClassData::load(conn, class_id)? else {
        return Ok(None);
    };
    let mut student_averages: Vec<StudentAverage> = data
        .students
        .iter()
        .map(|s| StudentAverage {
            id: s.id.clone(),
            name: s.name.clone(),
            average: average(&data.percentages_of(&s.id)).round(),
        })
        .collect();
    student_averages.sort_by(|a, b| b.average.total_cmp(&a.average));

    let mut weakest_topics: Vec<TopicAverage> = data
        .topic_averages()
        .into_iter()
        .map(|(topic, (avg, _))| TopicAverage {
            topic,
            average: avg.round(),
        })
        .collect();
    weakest_topics.sort_by(|a, b| a.average.total_cmp(&b.average));
    weakest_topics.truncate(5);

    let all: Vec<f64> = data.work.iter().map(GradedWork::percent).collect();
    Ok(Some(ClassSummary {
        class_id: data.class.id.clone(),
        student_count: data.students.len(),
        total_grades: data.work.len(),
        top_performers: student_averages.iter().take(5).cloned().collect(),
        student_averages,
        weakest_topics,
        overall_average: average(&all).round(),
    }))
}

// ==================== FEEDBACK ====================

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassFeedback {
    pub class_id: String,
    pub total_students: usize,
    pub class_average_grade: f64,
    pub students_needing_support: usize,
    pub excellent_performers: usize,
    pub feedback: Vec<StudentFeedback>,
    pub class_recommendations: Vec<String>,
}

pub fn class_feedback(conn: &Connection, class_id: &str) -> Result<Option<ClassFeedback>> {
    let Some(class) = records::get_class(conn, class_id)? else {
        return Ok(None);
    };
    let students = records::list_students(conn, Some(class_id))?;
    let feedback: Vec<StudentFeedback> = student_data(conn, &students)?
        .iter()
        .map(feedback_from)
        .collect();

    // Students with no graded work carry a placeholder grade of 0.
    let grades: Vec<f64> = feedback
        .iter()
        .filter(|f| f.status == FeedbackStatus::Generated)
        .map(|f| f.overall_grade)
        .collect();
    let avg = average(&grades);
    let needs_support = grades.iter().filter(|g| **g < 60.0).count();
    let excellent = grades.iter().filter(|g| **g >= 80.0).count();

    let class_recommendations = vec![
        if avg < 70.0 {
            "Consider revisiting key topics as a class".to_string()
        } else {
            "Class is performing well overall".to_string()
        },
        if needs_support > 0 {
            format!("Provide additional support to {} students", needs_support)
        } else {
            "All students are progressing well".to_string()
        },
        if avg < 60.0 {
            "Review teaching methodology and pacing".to_string()
        } else {
            "Continue current approach".to_string()
        },
    ];

    Ok(Some(ClassFeedback {
        class_id: class.id,
        total_students: students.len(),
        class_average_grade: avg.round(),
        students_needing_support: needs_support,
        excellent_performers: excellent,
        feedback,
        class_recommendations,
    }))
}

// ==================== PARENT INSIGHTS ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassPerformance {
    Strong,
    Average,
    NeedsSupport,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NamedScore {
    pub name: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyUpdate {
    pub title: &'static str,
    pub message: &'static str,
    pub upcoming: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParentClassInsights {
    pub class_id: String,
    pub class_summary: String,
    pub class_performance: ClassPerformance,
    pub total_students: usize,
    pub top_performers: Vec<NamedScore>,
    pub parent_weekly_update: WeeklyUpdate,
}

pub fn parent_class_insights(conn: &Connection, class_id: &str) -> Result<Option<ParentClassInsights>> {
    let Some(class) = records::get_class(conn, class_id)? else {
        return Ok(None);
    };
    let students = records::list_students(conn, Some(class_id))?;
    let reports: Vec<_> = student_data(conn, &students)?
        .iter()
        .map(parent_report_from)
        .collect();

    let avg_grade = average(&reports.iter().map(|r| r.academic_score).collect::<Vec<_>>());
    let avg_attendance = average(
        &reports
            .iter()
            .map(|r| r.attendance_percentage)
            .collect::<Vec<_>>(),
    );

    let mut top: Vec<NamedScore> = reports
        .iter()
        .filter(|r| r.academic_score >= 80.0)
        .map(|r| NamedScore {
            name: r.student_name.clone(),
            score: r.academic_score,
        })
        .collect();
    top.sort_by(|a, b| b.score.total_cmp(&a.score));
    top.truncate(5);

    Ok(Some(ParentClassInsights {
        class_id: class.id,
        class_summary: format!(
            "Class average: {}% | Attendance: {}%",
            avg_grade.round(),
            avg_attendance.round()
        ),
        class_performance: if avg_grade >= 75.0 {
            ClassPerformance::Strong
        } else if avg_grade >= 60.0 {
            ClassPerformance::Average
        } else {
            ClassPerformance::NeedsSupport
        },
        total_students: students.len(),
        top_performers: top,
        parent_weekly_update: WeeklyUpdate {
            title: "Weekly Class Update",
            message: "This week, the class focused on core concepts with good engagement levels. Keep supporting your child with regular homework and attendance.",
            upcoming: vec![
                "Final assessment next week",
                "Remedial classes available for interested students",
            ],
        },
    }))
}

// ==================== SCHEDULING ====================

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedSchedule {
    pub days: Vec<&'static str>,
    pub time_slots: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRecommendation {
    pub class_id: String,
    pub total_students: usize,
    pub recommended_schedule: RecommendedSchedule,
    /// Percentage points.
    pub expected_attendance_improvement: usize,
    pub reasoning: String,
    pub implementation_notes: Vec<String>,
    pub mode: &'static str,
}

/// Top three entries by vote count; ties keep first-vote order.
fn top_voted(mut votes: Vec<(&'static str, usize)>) -> Vec<&'static str> {
    votes.sort_by(|a, b| b.1.cmp(&a.1));
    votes.into_iter().take(3).map(|(k, _)| k).collect()
}

fn vote(tally: &mut Vec<(&'static str, usize)>, key: &'static str) {
    match tally.iter_mut().find(|(k, _)| *k == key) {
        Some((_, n)) => *n += 1,
        None => tally.push((key, 1)),
    }
}

pub fn optimize_class_schedule(conn: &Connection, class_id: &str) -> Result<Option<ScheduleRecommendation>> {
    let Some(class) = records::get_class(conn, class_id)? else {
        return Ok(None);
    };
    let students = records::list_students(conn, Some(class_id))?;
    let patterns: Vec<_> = student_data(conn, &students)?.iter().map(patterns_from).collect();

    let mut day_votes = Vec::new();
    let mut time_votes = Vec::new();
    for p in &patterns {
        for day in &p.best_days_for_study {
            vote(&mut day_votes, *day);
        }
        for slot in &p.best_time_slots {
            vote(&mut time_votes, *slot);
        }
    }
    let days = top_voted(day_votes);
    let slots = top_voted(time_votes);

    Ok(Some(ScheduleRecommendation {
        class_id: class.id,
        total_students: students.len(),
        expected_attendance_improvement: (students.len() * 2).min(15),
        reasoning: format!("Based on {} students' performance patterns", patterns.len()),
        implementation_notes: vec![
            format!(
                "Schedule main lectures on {} during {}",
                days.first().copied().unwrap_or("any weekday"),
                slots.first().copied().unwrap_or("the morning")
            ),
            "Reserve afternoon slots for review and practice".to_string(),
            "Schedule assessments on high-engagement days".to_string(),
        ],
        recommended_schedule: RecommendedSchedule {
            days,
            time_slots: slots,
        },
        mode: crate::content::SIMULATION_MODE,
    }))
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LessonTime {
    pub class_id: String,
    pub suggested_day_of_week: &'static str,
    pub suggested_time_slot: &'static str,
    pub reason: &'static str,
}

pub fn suggested_lesson_time(conn: &Connection, class_id: &str) -> Result<Option<LessonTime>> {
    let Some(data) = ClassData::load(conn, class_id)? else {
        return Ok(None);
    };
    let tally = AttendanceTally::from_records(&data.attendance);
    let attendance = if tally.total == 0 {
        0.0
    } else {
        tally.present as f64 / tally.total as f64 * 100.0
    };
    let high = attendance > 80.0;
    Ok(Some(LessonTime {
        class_id: data.class.id,
        suggested_day_of_week: if high { "Mid-week (Wed-Thu)" } else { "Monday-Tuesday" },
        suggested_time_slot: if high { "Morning (9-11 AM)" } else { "Early morning (8-9 AM)" },
        reason: if high {
            "High attendance mid-week suggests best focus time"
        } else {
            "Need early morning for better attendance"
        },
    }))
}

// ==================== DASHBOARD ====================

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_students: usize,
    pub at_risk_count: usize,
    pub top_performers_count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AiDashboard {
    pub class_id: String,
    pub summary: DashboardSummary,
    pub top_students: Vec<PredictionResult>,
    pub at_risk_students: Vec<PredictionResult>,
    pub performance_heatmap: Vec<TopicAnalysis>,
    pub grading_insights: GradingInsights,
    pub effort_outcome_analysis: Vec<EffortOutcome>,
}

/// Everything a teacher sees first for one class.
pub fn ai_dashboard(conn: &Connection, class_id: &str) -> Result<Option<AiDashboard>> {
    let Some(data) = ClassData::load(conn, class_id)? else {
        return Ok(None);
    };
    let predictions = predictions_for(conn, &data.students)?;
    let pick = |p: Prediction| -> Vec<PredictionResult> {
        predictions
            .iter()
            .filter(|r| r.prediction == p)
            .take(5)
            .cloned()
            .collect()
    };

    let mut effort = effort_from(&data);
    effort.truncate(10);

    Ok(Some(AiDashboard {
        class_id: data.class.id.clone(),
        summary: DashboardSummary {
            total_students: data.students.len(),
            at_risk_count: predictions
                .iter()
                .filter(|p| p.prediction == Prediction::AtRisk)
                .count(),
            top_performers_count: predictions
                .iter()
                .filter(|p| p.prediction == Prediction::Top)
                .count(),
        },
        top_students: pick(Prediction::Top),
        at_risk_students: pick(Prediction::AtRisk),
        performance_heatmap: heatmap_from(&data).class_topic_analysis,
        grading_insights: insights_from(&data),
        effort_outcome_analysis: effort,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::records::fixtures;

    fn setup() -> Connection {
        crate::logging::init_test();
        db::open_in_memory().expect("db")
    }

    #[test]
    fn weakest_topic_excludes_ungraded_placeholders() {
        let conn = setup();
        let c = fixtures::class(&conn, "7A");
        let a = fixtures::student(&conn, &c.id, "Ana");
        let b = fixtures::student(&conn, &c.id, "Ben");
        fixtures::student(&conn, &c.id, "Cy");
        let quiz = fixtures::assignment(&conn, &c.id, "Fractions", 100.0);
        fixtures::grade(&conn, &a.id, &quiz.id, 80.0);
        fixtures::grade(&conn, &b.id, &quiz.id, 40.0);

        let summary = class_summary(&conn, &c.id).expect("query").expect("class");
        assert_eq!(summary.weakest_topics.len(), 1);
        assert_eq!(summary.weakest_topics[0].topic, "Fractions");
        assert_eq!(summary.weakest_topics[0].average, 60.0);
        assert_eq!(summary.total_grades, 2);
        assert_eq!(summary.overall_average, 60.0);
        assert_eq!(summary.student_averages[0].name, "Ana");
        assert_eq!(summary.student_averages[2].average, 0.0);
    }

    #[test]
    fn empty_class_yields_empty_effort_list() {
        let conn = setup();
        let c = fixtures::class(&conn, "Empty");
        let rows = effort_outcome_analysis(&conn, &c.id)
            .expect("query")
            .expect("class");
        assert!(rows.is_empty());
        assert!(effort_outcome_analysis(&conn, "missing").expect("query").is_none());

        let engagement = engagement_heatmap(&conn, &c.id).expect("query").expect("class");
        assert_eq!(engagement.avg_engagement, 0.0);
        let schedule = optimize_class_schedule(&conn, &c.id)
            .expect("query")
            .expect("class");
        assert!(schedule.recommended_schedule.days.is_empty());
    }

    #[test]
    fn heatmap_is_stable_across_calls() {
        let conn = setup();
        let c = fixtures::class(&conn, "7A");
        let a = fixtures::student(&conn, &c.id, "Ana");
        let b = fixtures::student(&conn, &c.id, "Ben");
        fixtures::student(&conn, &c.id, "Cy");
        let geo = fixtures::assignment(&conn, &c.id, "Geometry", 50.0);
        let alg = fixtures::assignment(&conn, &c.id, "Algebra", 100.0);
        fixtures::grade(&conn, &a.id, &geo.id, 20.0);
        fixtures::grade(&conn, &a.id, &alg.id, 90.0);
        fixtures::grade(&conn, &b.id, &alg.id, 60.0);

        let first = performance_heatmap(&conn, &c.id).expect("query").expect("class");
        let second = performance_heatmap(&conn, &c.id).expect("query").expect("class");
        assert_eq!(
            serde_json::to_value(&first).expect("json"),
            serde_json::to_value(&second).expect("json")
        );

        let topics: Vec<&str> = first
            .class_topic_analysis
            .iter()
            .map(|t| t.topic.as_str())
            .collect();
        assert_eq!(topics, vec!["Algebra", "Geometry"]);
        assert_eq!(first.class_topic_analysis[0].class_average, 75.0);
        assert_eq!(first.class_topic_analysis[0].difficulty, TopicDifficulty::Easy);
        assert_eq!(first.class_topic_analysis[1].difficulty, TopicDifficulty::Hard);
        assert_eq!(first.student_data[0].topic_performance["Geometry"], 40.0);
        assert_eq!(first.student_data[0].overall_average, Some(65.0));
        assert_eq!(first.student_data[2].overall_average, None);
    }

    #[test]
    fn effort_outcome_categories_and_order() {
        let conn = setup();
        let c = fixtures::class(&conn, "7A");
        let a = fixtures::student(&conn, &c.id, "Ana");
        let b = fixtures::student(&conn, &c.id, "Ben");
        fixtures::graded_series(&conn, &c.id, &a.id, &[90.0]);
        fixtures::attendance(&conn, &c.id, &a.id, 9, 10);
        let quiz = records::list_assignments(&conn, Some(&c.id)).expect("list")[0].clone();
        fixtures::grade(&conn, &b.id, &quiz.id, 50.0);
        fixtures::attendance(&conn, &c.id, &b.id, 5, 10);

        let rows = effort_outcome_analysis(&conn, &c.id).expect("query").expect("class");
        assert_eq!(rows[0].student_name, "Ana");
        assert_eq!(rows[0].category, EffortCategory::Efficient);
        assert_eq!(rows[0].efficiency, 100.0);
        assert_eq!(rows[1].category, EffortCategory::LowEffort);
    }

    #[test]
    fn grading_insights_split_around_class_average() {
        let conn = setup();
        let c = fixtures::class(&conn, "7A");
        let quiz = fixtures::assignment(&conn, &c.id, "Quiz", 100.0);
        for (name, mark) in [("Ana", 95.0), ("Ben", 60.0), ("Cy", 25.0)] {
            let s = fixtures::student(&conn, &c.id, name);
            // the quiz predates the student, so grade it directly
            records::insert_grade(
                &conn,
                &records::NewGrade {
                    class_id: c.id.clone(),
                    student_id: s.id.clone(),
                    assignment_id: quiz.id.clone(),
                    marks_obtained: Some(mark),
                    feedback: String::new(),
                },
            )
            .expect("grade");
        }
        let insights = grading_insights(&conn, &c.id).expect("query").expect("class");
        assert_eq!(insights.class_average, 60.0);
        assert_eq!(insights.top_performers.len(), 1);
        assert_eq!(insights.top_performers[0].name, "Ana");
        assert_eq!(insights.needs_intervention[0].name, "Cy");
        assert_eq!(insights.action_items[2], "Class average is 60%");
    }

    #[test]
    fn class_predictions_sorted_by_risk() {
        let conn = setup();
        let c = fixtures::class(&conn, "7A");
        let a = fixtures::student(&conn, &c.id, "Ana");
        let b = fixtures::student(&conn, &c.id, "Ben");
        fixtures::graded_series(&conn, &c.id, &a.id, &[30.0]);
        let quiz = records::list_assignments(&conn, Some(&c.id)).expect("list")[0].clone();
        fixtures::grade(&conn, &b.id, &quiz.id, 95.0);
        fixtures::attendance(&conn, &c.id, &b.id, 10, 10);

        let preds = class_predictions(&conn, &c.id).expect("query").expect("class");
        assert_eq!(preds.total_students, 2);
        assert_eq!(preds.top_performers, 1);
        assert_eq!(preds.at_risk, 1);
        assert_eq!(preds.predictions[0].student_name, "Ben");

        let dash = ai_dashboard(&conn, &c.id).expect("query").expect("class");
        assert_eq!(dash.summary.at_risk_count, 1);
        assert_eq!(dash.top_students.len(), 1);
    }

    #[test]
    fn class_feedback_ignores_students_without_graded_work() {
        let conn = setup();
        let c = fixtures::class(&conn, "7A");
        let a = fixtures::student(&conn, &c.id, "Ana");
        fixtures::student(&conn, &c.id, "Ben");
        let quiz = fixtures::assignment(&conn, &c.id, "Quiz", 100.0);
        fixtures::grade(&conn, &a.id, &quiz.id, 90.0);

        let fb = class_feedback(&conn, &c.id).expect("query").expect("class");
        assert_eq!(fb.total_students, 2);
        assert_eq!(fb.class_average_grade, 90.0);
        assert_eq!(fb.students_needing_support, 0);
        assert_eq!(fb.excellent_performers, 1);
        assert_eq!(
            fb.class_recommendations,
            vec![
                "Class is performing well overall",
                "All students are progressing well",
                "Continue current approach",
            ]
        );
        let ben = fb.feedback.iter().find(|f| f.student_name == "Ben").expect("Ben");
        assert_eq!(ben.status, FeedbackStatus::InsufficientData);
    }

    #[test]
    fn engagement_weights_rounded_attendance_and_grades() {
        let conn = setup();
        let c = fixtures::class(&conn, "7A");
        let a = fixtures::student(&conn, &c.id, "Ana");
        let b = fixtures::student(&conn, &c.id, "Ben");
        fixtures::student(&conn, &c.id, "Cy");
        let quiz = fixtures::assignment(&conn, &c.id, "Quiz", 100.0);
        fixtures::grade(&conn, &a.id, &quiz.id, 90.0);
        fixtures::attendance(&conn, &c.id, &a.id, 9, 10);
        fixtures::grade(&conn, &b.id, &quiz.id, 51.25);
        // 2 of 3 days is a 67% rate: 0.4 * 67 + 0.6 * 51.25 = 57.55
        fixtures::attendance(&conn, &c.id, &b.id, 2, 3);

        let heat = engagement_heatmap(&conn, &c.id).expect("query").expect("class");
        let scores: Vec<(&str, f64, EngagementStatus)> = heat
            .engagement
            .iter()
            .map(|e| (e.student_name.as_str(), e.engagement_score, e.status))
            .collect();
        assert_eq!(
            scores,
            vec![
                ("Ana", 90.0, EngagementStatus::High),
                ("Ben", 58.0, EngagementStatus::Medium),
                ("Cy", 0.0, EngagementStatus::Low),
            ]
        );
        assert_eq!(heat.avg_engagement, 49.0);
        assert_eq!(heat.low_engagement_students.len(), 1);
    }
}
