mod test_support;

use serde_json::json;
use test_support::{spawn_sidecar, spawn_with_workspace, str_field};

#[test]
fn requests_before_workspace_select_are_rejected() {
    let mut sc = spawn_sidecar();
    let health = sc.request_ok("health", json!({}));
    assert!(health.get("workspacePath").map(|v| v.is_null()).unwrap_or(false));

    assert_eq!(sc.request_err("classes.list", json!({})), "no_workspace");
    assert_eq!(sc.request_err("store.snapshot", json!({})), "no_workspace");
    assert_eq!(sc.request_err("workspace.select", json!({})), "bad_params");
}

#[test]
fn malformed_lines_and_unknown_methods_get_error_envelopes() {
    let mut sc = spawn_sidecar();
    let resp = sc.send_raw("{not json");
    assert_eq!(resp["ok"], json!(false));
    assert_eq!(resp["error"]["code"], json!("bad_json"));

    assert_eq!(sc.request_err("grades.teleport", json!({})), "not_implemented");

    // the loop keeps serving after both
    sc.request_ok("health", json!({}));
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let (mut sc, workspace) = spawn_with_workspace("classroomd-router-smoke");

    let health = sc.request_ok("health", json!({}));
    assert_eq!(
        health["workspacePath"].as_str(),
        Some(workspace.to_string_lossy().as_ref())
    );

    let class_id = sc.create_class("Smoke Class");
    let student_id = sc.create_student(&class_id, "Smoke Student");
    let assignment_id = sc.create_assignment(&class_id, "Fractions");

    sc.request_ok("classes.list", json!({}));
    sc.request_ok("classes.get", json!({ "classId": class_id }));
    sc.request_ok("students.list", json!({ "classId": class_id }));
    sc.request_ok("students.get", json!({ "studentId": student_id }));
    sc.request_ok("assignments.list", json!({ "classId": class_id }));
    sc.request_ok("assignments.get", json!({ "assignmentId": assignment_id }));
    sc.request_ok(
        "assignments.submit",
        json!({ "assignmentId": assignment_id, "studentId": student_id, "content": "done" }),
    );
    sc.request_ok("grades.list", json!({ "classId": class_id }));
    sc.request_ok("grades.forStudent", json!({ "studentId": student_id }));
    sc.request_ok("attendance.list", json!({ "classId": class_id }));
    sc.request_ok("attendance.studentReport", json!({ "studentId": student_id }));

    sc.request_ok("auth.listRequests", json!({}));
    sc.request_ok(
        "messages.send",
        json!({ "senderId": "t1", "receiverId": student_id, "message": "hello" }),
    );
    sc.request_ok("messages.forUser", json!({ "userId": student_id }));
    sc.request_ok(
        "announcements.post",
        json!({ "senderId": "t1", "classId": class_id, "message": "quiz friday" }),
    );
    let announcements = sc.request_ok("announcements.forClass", json!({ "classId": class_id }));
    assert_eq!(announcements.as_array().map(|a| a.len()), Some(1));

    let resource = sc.request_ok(
        "resources.create",
        json!({ "classId": class_id, "title": "Fraction wall", "url": "https://example.org/f" }),
    );
    sc.request_ok("resources.get", json!({ "resourceId": str_field(&resource, "id") }));

    let meeting = sc.request_ok(
        "meetings.schedule",
        json!({ "classId": class_id, "studentId": student_id, "parentName": "P. Student" }),
    );
    let meeting_id = str_field(&meeting, "id");
    assert_eq!(
        sc.request_err(
            "meetings.update",
            json!({ "meetingId": meeting_id, "patch": { "status": "postponed" } })
        ),
        "bad_params"
    );
    sc.request_ok(
        "participation.log",
        json!({ "classId": class_id, "studentId": student_id }),
    );
    sc.request_ok("participation.forStudent", json!({ "studentId": student_id }));

    for method in [
        "ai.predict",
        "ai.knowledgeGaps",
        "ai.weakTopics",
        "ai.feedback",
        "ai.cohort",
        "ai.adaptiveSuggestions",
        "ai.longitudinal",
        "ai.parentReport",
        "ai.patterns",
        "ai.contentRecommendations",
    ] {
        sc.request_ok(method, json!({ "studentId": student_id }));
    }
    sc.request_ok(
        "ai.timeOnTask",
        json!({ "studentId": student_id, "assignmentId": assignment_id }),
    );
    for method in [
        "ai.heatmap",
        "ai.effortOutcome",
        "ai.gradingInsights",
        "ai.engagementHeatmap",
        "ai.classPredictions",
        "ai.classSummary",
        "ai.classFeedback",
        "ai.parentClassInsights",
        "ai.schedule",
        "ai.lessonTime",
        "ai.dashboard",
    ] {
        sc.request_ok(method, json!({ "classId": class_id }));
    }

    sc.request_ok(
        "generate.quiz",
        json!({ "classId": class_id, "topics": ["Fractions"], "numQuestions": 3 }),
    );
    sc.request_ok(
        "generate.worksheet",
        json!({ "studentId": student_id, "topic": "Fractions" }),
    );
    sc.request_ok("generate.questionPaper", json!({ "classId": class_id }));
    sc.request_ok(
        "generate.lessonPlan",
        json!({ "classId": class_id, "topic": "Fractions" }),
    );

    let doubt = sc.request_ok(
        "classroom.logDoubt",
        json!({ "classId": class_id, "studentId": student_id, "conceptId": "fractions-1" }),
    );
    sc.request_ok("classroom.dashboard", json!({ "classId": class_id }));
    let resolved = sc.request_ok(
        "classroom.resolveDoubt",
        json!({ "doubtId": str_field(&doubt, "id") }),
    );
    assert_eq!(resolved["resolved"], json!(true));

    let snap = sc.request_ok("store.snapshot", json!({}));
    let path = str_field(&snap, "path");
    assert!(std::path::Path::new(&path).exists());
}

#[test]
fn missing_records_map_to_not_found_and_bad_params() {
    let (mut sc, _ws) = spawn_with_workspace("classroomd-router-errors");

    assert_eq!(sc.request_err("classes.get", json!({ "classId": "nope" })), "not_found");
    assert_eq!(sc.request_err("students.get", json!({})), "bad_params");
    assert_eq!(sc.request_err("ai.predict", json!({ "studentId": "nope" })), "not_found");
    assert_eq!(sc.request_err("ai.heatmap", json!({ "classId": "nope" })), "not_found");
    assert_eq!(
        sc.request_err("generate.quiz", json!({ "classId": "c", "topics": [] })),
        "bad_params"
    );
    assert_eq!(
        sc.request_err(
            "generate.quiz",
            json!({ "classId": "c", "topics": ["x"], "difficulty": "brutal" })
        ),
        "bad_params"
    );
}

#[test]
fn oversized_question_counts_are_rejected_and_daemon_keeps_serving() {
    let (mut sc, _ws) = spawn_with_workspace("classroomd-router-limits");

    assert_eq!(
        sc.request_err(
            "generate.quiz",
            json!({ "classId": "c", "topics": ["Algebra"], "numQuestions": 1_000_000_000_000_000u64 })
        ),
        "bad_params"
    );
    assert_eq!(
        sc.request_err(
            "generate.questionPaper",
            json!({ "classId": "c", "numberOfQuestions": 101 })
        ),
        "bad_params"
    );
    sc.request_ok("health", json!({}));

    let quiz = sc.request_ok(
        "generate.quiz",
        json!({ "classId": "c", "topics": ["Algebra"], "numQuestions": 100 }),
    );
    assert_eq!(quiz["questions"].as_array().map(|q| q.len()), Some(100));
    let paper = sc.request_ok(
        "generate.questionPaper",
        json!({ "classId": "c", "numberOfQuestions": 100 }),
    );
    assert_eq!(paper["questionCount"], json!(100));
}
