use crate::config::SeedConfig;
use crate::records;
use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "classroom.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Fresh store with the full schema and no rows; used for fixtures.
#[cfg(test)]
pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            section TEXT NOT NULL DEFAULT '',
            subject TEXT NOT NULL DEFAULT '',
            teacher TEXT NOT NULL DEFAULT '',
            capacity INTEGER NOT NULL DEFAULT 40,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            name TEXT NOT NULL,
            roll_no TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL DEFAULT '',
            phone TEXT NOT NULL DEFAULT '',
            notes TEXT NOT NULL DEFAULT '',
            enrolled_at TEXT NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            date TEXT NOT NULL,
            status TEXT NOT NULL,
            reason TEXT NOT NULL DEFAULT '',
            recorded_at TEXT NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            UNIQUE(class_id, student_id, date)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_class ON attendance(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_student ON attendance(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignments(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            due_date TEXT,
            total_marks REAL NOT NULL DEFAULT 100,
            kind TEXT NOT NULL DEFAULT 'assignment',
            created_at TEXT NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_class ON assignments(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS submissions(
            id TEXT PRIMARY KEY,
            assignment_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            file_url TEXT,
            submitted_at TEXT NOT NULL,
            FOREIGN KEY(assignment_id) REFERENCES assignments(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_submissions_assignment ON submissions(assignment_id)",
        [],
    )?;

    // marks_obtained NULL = placeholder created with the assignment, not yet graded.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            assignment_id TEXT NOT NULL,
            marks_obtained REAL,
            feedback TEXT NOT NULL DEFAULT '',
            graded_at TEXT NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(assignment_id) REFERENCES assignments(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_class ON grades(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_student ON grades(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_assignment ON grades(assignment_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS communications(
            id TEXT PRIMARY KEY,
            sender_id TEXT NOT NULL,
            receiver_id TEXT NOT NULL,
            message TEXT NOT NULL,
            kind TEXT NOT NULL DEFAULT 'message',
            read INTEGER NOT NULL DEFAULT 0,
            sent_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_communications_receiver ON communications(receiver_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS resources(
            id TEXT PRIMARY KEY,
            class_id TEXT,
            title TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT '',
            url TEXT NOT NULL DEFAULT '',
            kind TEXT NOT NULL DEFAULT 'pdf',
            uploaded_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS participation_logs(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            date TEXT NOT NULL,
            level TEXT NOT NULL DEFAULT 'active',
            notes TEXT NOT NULL DEFAULT '',
            recorded_at TEXT NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_participation_student ON participation_logs(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS meetings(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            parent_name TEXT NOT NULL DEFAULT '',
            scheduled_date TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'scheduled',
            notes TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_meetings_class ON meetings(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            name TEXT NOT NULL,
            school TEXT NOT NULL DEFAULT '',
            subjects TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS teacher_requests(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            school TEXT NOT NULL,
            email TEXT NOT NULL DEFAULT '',
            subjects TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS auth_sessions(
            token TEXT PRIMARY KEY,
            teacher_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(teacher_id) REFERENCES teachers(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classroom_doubts(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            concept_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            resolved INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classroom_doubts_class ON classroom_doubts(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS proctoring_sessions(
            id TEXT PRIMARY KEY,
            exam_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            started_at TEXT NOT NULL,
            ended_at TEXT,
            status TEXT NOT NULL DEFAULT 'ACTIVE',
            tab_switches INTEGER NOT NULL DEFAULT 0,
            webcam_alert INTEGER NOT NULL DEFAULT 0,
            audio_alert INTEGER NOT NULL DEFAULT 0,
            screen_share INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_proctoring_sessions_exam ON proctoring_sessions(exam_id)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS proctoring_flags(
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            kind TEXT NOT NULL,
            severity TEXT NOT NULL,
            details TEXT NOT NULL DEFAULT '{}',
            FOREIGN KEY(session_id) REFERENCES proctoring_sessions(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_proctoring_flags_session ON proctoring_flags(session_id)",
        [],
    )?;

    Ok(())
}

/// Insert the admin account (and optionally a sample class) into a
/// workspace that has no teachers yet. Returns true when anything was seeded.
pub fn seed_defaults(conn: &Connection, seed: &SeedConfig) -> anyhow::Result<bool> {
    if !seed.enabled {
        return Ok(false);
    }
    let teacher_count: i64 = conn.query_row("SELECT COUNT(*) FROM teachers", [], |r| r.get(0))?;
    if teacher_count > 0 {
        return Ok(false);
    }

    let admin = records::create_teacher(
        conn,
        &records::NewTeacher {
            username: seed.admin_username.clone(),
            password: seed.admin_password.clone(),
            name: "Administrator".to_string(),
            school: "Central School".to_string(),
            subjects: vec!["Admin".to_string()],
        },
    )?;

    if seed.sample_data {
        let class = records::insert_class(
            conn,
            &records::NewClass {
                name: "Sample Class".to_string(),
                section: "A".to_string(),
                subject: "Mathematics".to_string(),
                teacher: admin.id.clone(),
                capacity: 30,
            },
        )?;
        for (name, roll_no, email) in [
            ("Alice Johnson", "S001", "alice@example.com"),
            ("Bob Smith", "S002", "bob@example.com"),
        ] {
            records::insert_student(
                conn,
                &records::NewStudent {
                    class_id: class.id.clone(),
                    name: name.to_string(),
                    roll_no: roll_no.to_string(),
                    email: email.to_string(),
                    phone: String::new(),
                    notes: String::new(),
                },
            )?;
        }
    }

    tracing::info!(username = %seed.admin_username, sample_data = seed.sample_data, "seeded empty workspace");
    Ok(true)
}
