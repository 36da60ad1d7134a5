#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

pub fn spawn_sidecar() -> Sidecar {
    let exe = env!("CARGO_BIN_EXE_classroomd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn classroomd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin,
        reader: BufReader::new(stdout),
        next_id: 0,
    }
}

/// Spawns the daemon and opens a fresh workspace under the temp dir.
pub fn spawn_with_workspace(prefix: &str) -> (Sidecar, PathBuf) {
    let workspace = temp_dir(prefix);
    let mut sidecar = spawn_sidecar();
    sidecar.request_ok(
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    (sidecar, workspace)
}

impl Sidecar {
    pub fn send_raw(&mut self, line: &str) -> Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response for {}", line);
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    pub fn request(&mut self, method: &str, params: Value) -> Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({ "id": id, "method": method, "params": params });
        let value = self.send_raw(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn request_ok(&mut self, method: &str, params: Value) -> Value {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or(Value::Null)
    }

    /// Asserts failure and returns the error code.
    pub fn request_err(&mut self, method: &str, params: Value) -> String {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value
            .pointer("/error/code")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    }

    pub fn create_class(&mut self, name: &str) -> String {
        let class = self.request_ok("classes.create", json!({ "name": name }));
        str_field(&class, "id")
    }

    pub fn create_student(&mut self, class_id: &str, name: &str) -> String {
        let student = self.request_ok(
            "students.create",
            json!({ "classId": class_id, "name": name }),
        );
        str_field(&student, "id")
    }

    pub fn create_assignment(&mut self, class_id: &str, title: &str) -> String {
        let created = self.request_ok(
            "assignments.create",
            json!({ "classId": class_id, "title": title, "totalMarks": 100 }),
        );
        created
            .pointer("/assignment/id")
            .and_then(|v| v.as_str())
            .expect("assignment id")
            .to_string()
    }

    pub fn grade(&mut self, class_id: &str, student_id: &str, assignment_id: &str, marks: f64) {
        self.request_ok(
            "grades.create",
            json!({
                "classId": class_id,
                "studentId": student_id,
                "assignmentId": assignment_id,
                "marksObtained": marks
            }),
        );
    }

    /// Ten consecutive school days, `present` of them present and the rest absent.
    pub fn mark_days(&mut self, class_id: &str, student_id: &str, present: usize) {
        for day in 0..10 {
            let status = if day < present { "present" } else { "absent" };
            self.request_ok(
                "attendance.mark",
                json!({
                    "classId": class_id,
                    "date": format!("2024-03-{:02}", day + 1),
                    "records": [{ "studentId": student_id, "status": status }]
                }),
            );
        }
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn str_field(v: &Value, key: &str) -> String {
    v.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("missing {} in {}", key, v))
        .to_string()
}
