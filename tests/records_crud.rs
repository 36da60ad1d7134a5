mod test_support;

use serde_json::json;
use test_support::{spawn_with_workspace, str_field};

#[test]
fn remarking_attendance_on_the_same_day_overwrites() {
    let (mut sc, _ws) = spawn_with_workspace("classroomd-attendance");
    let class_id = sc.create_class("7B");
    let student_id = sc.create_student(&class_id, "Ada");

    sc.request_ok(
        "attendance.mark",
        json!({
            "classId": class_id,
            "date": "2024-04-02",
            "records": [{ "studentId": student_id, "status": "absent", "reason": "flu" }]
        }),
    );
    let marked = sc.request_ok(
        "attendance.mark",
        json!({
            "classId": class_id,
            "date": "2024-04-02",
            "attendanceData": [{ "studentId": student_id, "status": "Late" }]
        }),
    );
    assert_eq!(marked["marked"], json!(1));

    let rows = sc.request_ok(
        "attendance.list",
        json!({ "classId": class_id, "date": "2024-04-02" }),
    );
    let rows = rows.as_array().expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["status"], json!("late"));

    let report = sc.request_ok("attendance.studentReport", json!({ "studentId": student_id }));
    assert_eq!(report["total"], json!(1));
    assert_eq!(report["late"], json!(1));
    assert_eq!(report["attendancePercentage"], json!(0.0));

    assert_eq!(
        sc.request_err(
            "attendance.mark",
            json!({
                "classId": class_id,
                "records": [{ "studentId": student_id, "status": "sleeping" }]
            })
        ),
        "bad_params"
    );
}

#[test]
fn assignment_opens_placeholders_and_delete_cascades() {
    let (mut sc, _ws) = spawn_with_workspace("classroomd-assignments");
    let class_id = sc.create_class("8A");
    let a = sc.create_student(&class_id, "Ada");
    let b = sc.create_student(&class_id, "Ben");

    let created = sc.request_ok(
        "assignments.create",
        json!({ "classId": class_id, "title": "Algebra", "totalMarks": 50 }),
    );
    assert_eq!(created["createdGrades"], json!(2));
    let assignment_id = created["assignment"]["id"].as_str().expect("id").to_string();
    assert_eq!(created["assignment"]["totalMarks"], json!(50.0));

    let grades = sc.request_ok("grades.list", json!({ "assignmentId": assignment_id }));
    let grades = grades.as_array().expect("grades");
    assert_eq!(grades.len(), 2);
    assert!(grades.iter().all(|g| g["marksObtained"].is_null()));

    let grade_id = grades
        .iter()
        .find(|g| g["studentId"] == json!(a))
        .map(|g| str_field(g, "id"))
        .expect("grade for Ada");
    let updated = sc.request_ok(
        "grades.update",
        json!({ "gradeId": grade_id, "patch": { "marksObtained": 40, "feedback": "solid" } }),
    );
    assert_eq!(updated["marksObtained"], json!(40.0));

    // placeholders stay out of the mean
    let ada = sc.request_ok("grades.forStudent", json!({ "studentId": a }));
    assert_eq!(ada["average"], json!(40.0));
    let ben = sc.request_ok("grades.forStudent", json!({ "studentId": b }));
    assert_eq!(ben["grades"].as_array().map(|g| g.len()), Some(1));

    sc.request_ok(
        "assignments.submit",
        json!({ "assignmentId": assignment_id, "studentId": b, "content": "x = 4" }),
    );
    let fetched = sc.request_ok("assignments.get", json!({ "assignmentId": assignment_id }));
    assert_eq!(fetched["submissions"].as_array().map(|s| s.len()), Some(1));

    let deleted = sc.request_ok("assignments.delete", json!({ "assignmentId": assignment_id }));
    assert_eq!(deleted["assignment"]["id"], json!(assignment_id));
    let left = sc.request_ok("grades.list", json!({ "classId": class_id }));
    assert_eq!(left.as_array().map(|g| g.len()), Some(0));
    assert_eq!(
        sc.request_err("assignments.get", json!({ "assignmentId": assignment_id })),
        "not_found"
    );
}

#[test]
fn students_need_an_existing_class() {
    let (mut sc, _ws) = spawn_with_workspace("classroomd-students");

    assert_eq!(
        sc.request_err("students.create", json!({ "classId": "ghost", "name": "Nobody" })),
        "not_found"
    );

    let class_id = sc.create_class("9C");
    let imported = sc.request_ok(
        "students.import",
        json!({
            "classId": class_id,
            "students": [
                { "name": "Cy", "rollNo": "R1" },
                { "name": "Di", "rollNo": "R2", "email": "di@example.com" }
            ]
        }),
    );
    assert_eq!(imported["imported"], json!(2));

    // one bad row rejects the whole batch
    assert_eq!(
        sc.request_err(
            "students.import",
            json!({ "classId": class_id, "students": [{ "name": "Ed" }, { "rollNo": "R9" }] })
        ),
        "bad_params"
    );
    let roster = sc.request_ok("students.list", json!({ "classId": class_id }));
    assert_eq!(roster.as_array().map(|s| s.len()), Some(2));

    let student_id = str_field(&roster[0], "id");
    let updated = sc.request_ok(
        "students.update",
        json!({ "studentId": student_id, "patch": { "notes": "front row" } }),
    );
    assert_eq!(updated["notes"], json!("front row"));
    sc.request_ok("students.delete", json!({ "studentId": student_id }));
    assert_eq!(
        sc.request_err("students.delete", json!({ "studentId": student_id })),
        "not_found"
    );

    let class = sc.request_ok("classes.get", json!({ "classId": class_id }));
    assert_eq!(class["studentCount"], json!(1));
}

#[test]
fn class_update_and_delete() {
    let (mut sc, _ws) = spawn_with_workspace("classroomd-classes");
    let class_id = sc.create_class("10D");

    let updated = sc.request_ok(
        "classes.update",
        json!({ "classId": class_id, "patch": { "subject": "Chemistry", "capacity": 24 } }),
    );
    assert_eq!(updated["subject"], json!("Chemistry"));
    assert_eq!(updated["capacity"], json!(24));

    sc.request_ok("classes.delete", json!({ "classId": class_id }));
    assert_eq!(
        sc.request_err("classes.get", json!({ "classId": class_id })),
        "not_found"
    );
}
