#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use smartdashboard::auth::Actor;
use smartdashboard::error::AppError;
use smartdashboard::messaging::Messenger;
use smartdashboard::models::OutgoingMessage;
use smartdashboard::state::AppState;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

pub const NOW: i64 = 1_700_000_000;
pub const DAY: i64 = 86_400;

pub const ADMIN: i64 = 1;
pub const TEACHER: i64 = 2;
pub const MANAGER: i64 = 3;
pub const ALICE: i64 = 10;
pub const BOB: i64 = 11;
pub const CAROL: i64 = 12;
pub const EVE: i64 = 14;

pub const MECHANICS: i64 = 101;
pub const CHEMISTRY: i64 = 102;
pub const PAINTING: i64 = 103;

/// Science (1) > Physics (2), plus Arts (3) at the top level.
///
/// - Teacher 2 is an editing teacher of Mechanics (Physics) and Chemistry (Science).
/// - Manager 3 manages Science.
/// - Alice takes Mechanics (completed, paid 50 USD) and Chemistry.
/// - Bob takes Mechanics (paid 50 USD).
/// - Carol only holds a Chemistry completion.
/// - Dan is deleted.
/// - Eve takes Painting (paid 20 EUR), taught by non-editing teacher 4.
const SEED: &str = r#"
INSERT INTO users (id, firstname, lastname, email, lastaccess, deleted, is_site_admin) VALUES
    (1, 'Ada', 'Admin', 'admin@example.com', 1699990000, 0, 1),
    (2, 'Tina', 'Teacher', 'tina@example.com', 1699990000, 0, 0),
    (3, 'Mona', 'Manager', 'mona@example.com', 1699990000, 0, 0),
    (4, 'Ted', 'Tutor', 'ted@example.com', 0, 0, 0),
    (10, 'Alice', 'Anders', 'alice@example.com', 1699913600, 0, 0),
    (11, 'Bob', 'Brown', 'bob@example.com', 1699136000, 0, 0),
    (12, 'Carol', 'Clark', 'carol@example.com', 0, 0, 0),
    (13, 'Dan', 'Dropped', 'dan@example.com', 0, 1, 0),
    (14, 'Eve', 'Evans', 'eve@example.com', 0, 0, 0);

INSERT INTO course_categories (id, name, parent, path) VALUES
    (1, 'Science', 0, '/1'),
    (2, 'Physics', 1, '/1/2'),
    (3, 'Arts', 0, '/3');

INSERT INTO category_managers (category_id, user_id) VALUES (1, 3);

INSERT INTO courses (id, fullname, shortname, category) VALUES
    (101, 'Mechanics', 'MECH', 2),
    (102, 'Chemistry', 'CHEM', 1),
    (103, 'Painting', 'PAINT', 3);

INSERT INTO course_roles (course_id, user_id, role) VALUES
    (101, 2, 'editingteacher'),
    (102, 2, 'editingteacher'),
    (101, 10, 'student'),
    (102, 10, 'student'),
    (101, 11, 'student'),
    (101, 13, 'student'),
    (103, 14, 'student'),
    (103, 4, 'teacher');

INSERT INTO enrol (id, course_id, method, status, cost, currency) VALUES
    (1001, 101, 'manual', 0, NULL, NULL),
    (1002, 101, 'fee', 0, 50.0, 'USD'),
    (1003, 102, 'manual', 0, NULL, NULL),
    (1004, 103, 'fee', 0, 20.0, 'EUR');

INSERT INTO user_enrolments (enrol_id, user_id, status, timestart, timeend, timecreated) VALUES
    (1002, 10, 0, 0, 0, 1000),
    (1003, 10, 0, 0, 0, 1000),
    (1002, 11, 0, 0, 0, 2000),
    (1001, 13, 0, 0, 0, 2000),
    (1004, 14, 0, 0, 0, 3000);

INSERT INTO course_completions (user_id, course_id, timecompleted) VALUES
    (10, 101, 1500),
    (12, 102, 2500);

INSERT INTO course_modules (id, course_id, modname, name, visible) VALUES
    (201, 101, 'quiz', 'Quiz 1', 1),
    (202, 101, 'assign', 'Essay', 1),
    (203, 102, 'page', 'Reading', 1),
    (204, 103, 'assign', 'Sketch', 1),
    (205, 101, 'page', 'Hidden notes', 0);

INSERT INTO module_completions (module_id, user_id, completionstate, timemodified) VALUES
    (201, 10, 2, 1600);

INSERT INTO module_grades (module_id, user_id, finalgrade, grademax) VALUES
    (201, 10, 8.5, 10.0);

INSERT INTO assignments (id, course_id, cmid, name, duedate, visible) VALUES
    (501, 101, 202, 'Essay', 0, 1),
    (502, 102, 203, 'Lab report', 1700000000, 1);

INSERT INTO assign_submissions (assignment_id, user_id, attemptnumber, latest, status) VALUES
    (501, 10, 0, 1, 'submitted'),
    (501, 11, 0, 1, 'submitted'),
    (501, 13, 0, 1, 'submitted'),
    (502, 10, 0, 1, 'submitted');

INSERT INTO assign_grades (assignment_id, user_id, attemptnumber, grade) VALUES
    (501, 11, 0, -1.0),
    (502, 10, 0, 80.0);
"#;

pub async fn setup_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    sqlx::raw_sql(SEED)
        .execute(&pool)
        .await
        .expect("Failed to seed database");

    pool
}

pub async fn record_payments(pool: &SqlitePool) {
    sqlx::raw_sql(
        r#"
        INSERT INTO payments (enrol_id, user_id, amount, currency, timecreated) VALUES
            (1002, 10, 50.0, 'USD', 1000),
            (1002, 11, 45.5, 'USD', 2000),
            (1004, 14, 20.0, 'EUR', 3000);
        "#,
    )
    .execute(pool)
    .await
    .expect("Failed to record payments");
}

pub async fn actor(pool: &SqlitePool, user_id: i64) -> Actor {
    Actor::load(pool, user_id).await.expect("Failed to load actor")
}

/// Keeps every batch instead of delivering it.
#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<OutgoingMessage>>,
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_messages(&self, messages: &[OutgoingMessage]) -> Result<(), AppError> {
        self.sent.lock().unwrap().extend_from_slice(messages);
        Ok(())
    }
}

pub fn state(pool: SqlitePool, messenger: Arc<RecordingMessenger>) -> AppState {
    AppState {
        db: pool,
        messenger,
    }
}
