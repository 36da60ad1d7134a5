mod test_support;

use serde_json::json;
use test_support::{spawn_sidecar, spawn_with_workspace, str_field, temp_dir};

#[test]
fn fresh_workspace_is_seeded_once() {
    let workspace = temp_dir("classroomd-seed");
    {
        let mut sc = spawn_sidecar();
        let selected = sc.request_ok(
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        assert_eq!(selected["seeded"], json!(true));

        let classes = sc.request_ok("classes.list", json!({}));
        let classes = classes.as_array().expect("classes array");
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0]["name"], json!("Sample Class"));

        let students = sc.request_ok("students.list", json!({}));
        let mut rolls: Vec<&str> = students
            .as_array()
            .expect("students array")
            .iter()
            .filter_map(|s| s["rollNo"].as_str())
            .collect();
        rolls.sort();
        assert_eq!(rolls, vec!["S001", "S002"]);
    }

    let mut sc = spawn_sidecar();
    let reopened = sc.request_ok(
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(reopened["seeded"], json!(false));
    let classes = sc.request_ok("classes.list", json!({}));
    assert_eq!(classes.as_array().map(|c| c.len()), Some(1));
}

#[test]
fn login_issues_a_token_that_resolves_to_the_teacher() {
    let (mut sc, _ws) = spawn_with_workspace("classroomd-auth");

    let login = sc.request_ok(
        "auth.login",
        json!({ "username": "admin", "password": "admin123" }),
    );
    let token = str_field(&login, "token");
    assert_eq!(login["teacher"]["username"], json!("admin"));

    let me = sc.request_ok("auth.me", json!({ "token": format!("Bearer {}", token) }));
    assert_eq!(me["username"], json!("admin"));
    assert!(me.get("passwordHash").is_none());

    assert_eq!(
        sc.request_err("auth.login", json!({ "username": "admin", "password": "wrong" })),
        "unauthorized"
    );
    assert_eq!(sc.request_err("auth.me", json!({ "token": "forged" })), "unauthorized");
    assert_eq!(sc.request_err("auth.me", json!({})), "unauthorized");
}

#[test]
fn teacher_accounts_are_unique_by_username() {
    let (mut sc, _ws) = spawn_with_workspace("classroomd-teachers");

    sc.request_ok(
        "auth.createTeacher",
        json!({ "username": "mrivers", "password": "pw-1", "name": "M. Rivers" }),
    );
    assert_eq!(
        sc.request_err(
            "auth.createTeacher",
            json!({ "username": "mrivers", "password": "pw-2", "name": "Other" })
        ),
        "conflict"
    );
    sc.request_ok(
        "auth.login",
        json!({ "username": "mrivers", "password": "pw-1" }),
    );

    sc.request_ok(
        "auth.requestAccess",
        json!({ "name": "J. Doe", "school": "North High", "subjects": ["Physics"] }),
    );
    let requests = sc.request_ok("auth.listRequests", json!({}));
    assert_eq!(requests.as_array().map(|r| r.len()), Some(1));
}
