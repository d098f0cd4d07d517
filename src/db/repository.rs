use std::collections::HashSet;

use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};

use crate::models::{
    ActiveEnrolment, ActivityRow, AssignmentRow, Category, Course, CourseRoleMember,
    NeedsGradingCount, PaidInstance, RevenueRecord, User, UserCourse,
};

/// Upper bound on bound parameters per IN-list.
const ID_CHUNK: usize = 500;

fn push_id_list(qb: &mut QueryBuilder<'_, Sqlite>, ids: &[i64]) {
    qb.push("(");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}

pub async fn find_user(db: &SqlitePool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, firstname, lastname, email, lastaccess, is_site_admin FROM users WHERE id = ? AND deleted = 0"
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn managed_category_ids(db: &SqlitePool, user_id: i64) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT category_id FROM category_managers WHERE user_id = ? ORDER BY category_id"
    )
    .bind(user_id)
    .fetch_all(db)
    .await
}

/// Courses the user may update: editing teachers and course managers.
pub async fn teaching_course_ids(db: &SqlitePool, user_id: i64) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT DISTINCT cr.course_id
        FROM course_roles cr
        JOIN courses c ON c.id = cr.course_id
        WHERE cr.user_id = ?
          AND cr.role IN ('editingteacher', 'manager')
        ORDER BY cr.course_id
        "#
    )
    .bind(user_id)
    .fetch_all(db)
    .await
}

pub async fn fetch_courses_by_ids(db: &SqlitePool, ids: &[i64]) -> Result<Vec<Course>, sqlx::Error> {
    let mut courses = Vec::new();
    for chunk in ids.chunks(ID_CHUNK) {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, fullname, shortname, category FROM courses WHERE id IN "
        );
        push_id_list(&mut qb, chunk);
        courses.extend(qb.build_query_as::<Course>().fetch_all(db).await?);
    }
    courses.sort_by_key(|c| c.id);
    Ok(courses)
}

pub async fn fetch_all_courses(db: &SqlitePool) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(
        "SELECT id, fullname, shortname, category FROM courses ORDER BY id"
    )
    .fetch_all(db)
    .await
}

pub async fn fetch_categories(db: &SqlitePool) -> Result<Vec<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>(
        "SELECT id, name, parent, path FROM course_categories ORDER BY path, id"
    )
    .fetch_all(db)
    .await
}

/// Distinct live users enrolled in, or having completed, any of `course_ids`.
pub async fn enrolled_students(
    db: &SqlitePool,
    course_ids: &[i64],
    exclude_user: i64,
) -> Result<Vec<User>, sqlx::Error> {
    let mut seen = HashSet::new();
    let mut users = Vec::new();
    for chunk in course_ids.chunks(ID_CHUNK) {
        let mut qb = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT u.id, u.firstname, u.lastname, u.email, u.lastaccess, u.is_site_admin
            FROM users u
            WHERE u.deleted = 0
              AND u.id <> "#,
        );
        qb.push_bind(exclude_user);
        qb.push(
            r#"
              AND (
                u.id IN (
                    SELECT ue.user_id
                    FROM user_enrolments ue
                    JOIN enrol e ON e.id = ue.enrol_id
                    WHERE e.course_id IN "#,
        );
        push_id_list(&mut qb, chunk);
        qb.push(
            r#"
                )
                OR u.id IN (
                    SELECT cc.user_id
                    FROM course_completions cc
                    WHERE cc.timecompleted > 0
                      AND cc.course_id IN "#,
        );
        push_id_list(&mut qb, chunk);
        qb.push("))");

        for user in qb.build_query_as::<User>().fetch_all(db).await? {
            if seen.insert(user.id) {
                users.push(user);
            }
        }
    }

    users.sort_by(|a, b| {
        a.lastname
            .cmp(&b.lastname)
            .then_with(|| a.firstname.cmp(&b.firstname))
            .then(a.id.cmp(&b.id))
    });
    Ok(users)
}

pub async fn enrolment_pairs(db: &SqlitePool, course_ids: &[i64]) -> Result<Vec<UserCourse>, sqlx::Error> {
    let mut pairs = Vec::new();
    for chunk in course_ids.chunks(ID_CHUNK) {
        let mut qb = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT DISTINCT ue.user_id AS user_id, e.course_id AS course_id
            FROM user_enrolments ue
            JOIN enrol e ON e.id = ue.enrol_id
            WHERE e.course_id IN "#,
        );
        push_id_list(&mut qb, chunk);
        pairs.extend(qb.build_query_as::<UserCourse>().fetch_all(db).await?);
    }
    Ok(pairs)
}

pub async fn completion_pairs(db: &SqlitePool, course_ids: &[i64]) -> Result<Vec<UserCourse>, sqlx::Error> {
    let mut pairs = Vec::new();
    for chunk in course_ids.chunks(ID_CHUNK) {
        let mut qb = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT DISTINCT user_id, course_id
            FROM course_completions
            WHERE timecompleted > 0
              AND course_id IN "#,
        );
        push_id_list(&mut qb, chunk);
        pairs.extend(qb.build_query_as::<UserCourse>().fetch_all(db).await?);
    }
    Ok(pairs)
}

/// Student and teacher role holders; course managers are not counted as either.
pub async fn role_members(db: &SqlitePool, course_ids: &[i64]) -> Result<Vec<CourseRoleMember>, sqlx::Error> {
    let mut members = Vec::new();
    for chunk in course_ids.chunks(ID_CHUNK) {
        let mut qb = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT DISTINCT
                cr.course_id AS course_id,
                cr.user_id AS user_id,
                CASE WHEN cr.role = 'student' THEN 0 ELSE 1 END AS is_teacher
            FROM course_roles cr
            JOIN users u ON u.id = cr.user_id
            WHERE u.deleted = 0
              AND cr.role IN ('student', 'teacher', 'editingteacher')
              AND cr.course_id IN "#,
        );
        push_id_list(&mut qb, chunk);
        members.extend(qb.build_query_as::<CourseRoleMember>().fetch_all(db).await?);
    }
    Ok(members)
}

pub async fn student_course_ids(db: &SqlitePool, student_id: i64) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT e.course_id
        FROM user_enrolments ue
        JOIN enrol e ON e.id = ue.enrol_id
        WHERE ue.user_id = ?1
        UNION
        SELECT course_id
        FROM course_completions
        WHERE user_id = ?1 AND timecompleted > 0
        ORDER BY 1
        "#
    )
    .bind(student_id)
    .fetch_all(db)
    .await
}

pub async fn activities_for_student(
    db: &SqlitePool,
    course_ids: &[i64],
    student_id: i64,
) -> Result<Vec<ActivityRow>, sqlx::Error> {
    let mut rows = Vec::new();
    for chunk in course_ids.chunks(ID_CHUNK) {
        let mut qb = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT
                cm.course_id AS course_id,
                cm.id AS module_id,
                cm.name AS name,
                cm.modname AS modname,
                mc.completionstate AS completionstate,
                mg.finalgrade AS finalgrade,
                mg.grademax AS grademax
            FROM course_modules cm
            LEFT JOIN module_completions mc ON mc.module_id = cm.id AND mc.user_id = "#,
        );
        qb.push_bind(student_id);
        qb.push(" LEFT JOIN module_grades mg ON mg.module_id = cm.id AND mg.user_id = ");
        qb.push_bind(student_id);
        qb.push(" WHERE cm.visible = 1 AND cm.course_id IN ");
        push_id_list(&mut qb, chunk);
        rows.extend(qb.build_query_as::<ActivityRow>().fetch_all(db).await?);
    }

    rows.sort_by_key(|r| (r.course_id, r.module_id));
    Ok(rows)
}

pub async fn assignments_for_courses(
    db: &SqlitePool,
    course_ids: &[i64],
) -> Result<Vec<AssignmentRow>, sqlx::Error> {
    let mut rows = Vec::new();
    for chunk in course_ids.chunks(ID_CHUNK) {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, course_id, cmid, name, duedate FROM assignments WHERE visible = 1 AND course_id IN ",
        );
        push_id_list(&mut qb, chunk);
        qb.push(" ORDER BY course_id, duedate, id");
        rows.extend(qb.build_query_as::<AssignmentRow>().fetch_all(db).await?);
    }
    Ok(rows)
}

/// Latest submitted attempts without a grade, counted only for users whose
/// enrollment in the assignment's course is still active at `now`.
pub async fn needs_grading_counts(
    db: &SqlitePool,
    assignment_ids: &[i64],
    now: i64,
) -> Result<Vec<NeedsGradingCount>, sqlx::Error> {
    let mut counts = Vec::new();
    for chunk in assignment_ids.chunks(ID_CHUNK) {
        let mut qb = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT s.assignment_id AS assignment_id, COUNT(DISTINCT s.user_id) AS count
            FROM assign_submissions s
            JOIN assignments a ON a.id = s.assignment_id
            JOIN users u ON u.id = s.user_id
            JOIN user_enrolments ue ON ue.user_id = u.id
            JOIN enrol e ON e.id = ue.enrol_id AND e.course_id = a.course_id
            LEFT JOIN assign_grades g ON g.assignment_id = s.assignment_id
                 AND g.user_id = s.user_id
                 AND g.attemptnumber = s.attemptnumber
            WHERE s.latest = 1
              AND s.status = 'submitted'
              AND (g.id IS NULL OR g.grade IS NULL OR g.grade < 0)
              AND u.deleted = 0
              AND ue.status = 0
              AND e.status = 0
              AND (ue.timeend = 0 OR ue.timeend > "#,
        );
        qb.push_bind(now);
        qb.push(") AND s.assignment_id IN ");
        push_id_list(&mut qb, chunk);
        qb.push(" GROUP BY s.assignment_id");
        counts.extend(qb.build_query_as::<NeedsGradingCount>().fetch_all(db).await?);
    }
    Ok(counts)
}

pub async fn paid_instances(db: &SqlitePool, course_ids: &[i64]) -> Result<Vec<PaidInstance>, sqlx::Error> {
    let mut rows = Vec::new();
    for chunk in course_ids.chunks(ID_CHUNK) {
        let mut qb = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT id, course_id, cost, COALESCE(currency, '') AS currency
            FROM enrol
            WHERE status = 0
              AND cost IS NOT NULL
              AND cost > 0
              AND course_id IN "#,
        );
        push_id_list(&mut qb, chunk);
        qb.push(" ORDER BY course_id, id");
        rows.extend(qb.build_query_as::<PaidInstance>().fetch_all(db).await?);
    }
    Ok(rows)
}

pub async fn active_enrolments(
    db: &SqlitePool,
    instance_ids: &[i64],
    now: i64,
) -> Result<Vec<ActiveEnrolment>, sqlx::Error> {
    let mut rows = Vec::new();
    for chunk in instance_ids.chunks(ID_CHUNK) {
        let mut qb = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT DISTINCT ue.enrol_id AS enrol_id, ue.user_id AS user_id
            FROM user_enrolments ue
            JOIN users u ON u.id = ue.user_id
            WHERE u.deleted = 0
              AND ue.status = 0
              AND (ue.timeend = 0 OR ue.timeend > "#,
        );
        qb.push_bind(now);
        qb.push(") AND ue.enrol_id IN ");
        push_id_list(&mut qb, chunk);
        rows.extend(qb.build_query_as::<ActiveEnrolment>().fetch_all(db).await?);
    }
    Ok(rows)
}

pub async fn ledger_is_empty(db: &SqlitePool) -> Result<bool, sqlx::Error> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM payments")
        .fetch_one(db)
        .await?;
    Ok(count == 0)
}

/// Ledger payments for `course_ids` created in `[from, to]`; `to == 0` leaves the
/// range open-ended.
pub async fn ledger_payments(
    db: &SqlitePool,
    course_ids: &[i64],
    from: i64,
    to: i64,
) -> Result<Vec<RevenueRecord>, sqlx::Error> {
    let mut rows = Vec::new();
    for chunk in course_ids.chunks(ID_CHUNK) {
        let mut qb = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT e.course_id AS course_id, p.user_id AS user_id, p.amount AS amount, p.currency AS currency
            FROM payments p
            JOIN enrol e ON e.id = p.enrol_id
            WHERE p.timecreated >= "#,
        );
        qb.push_bind(from);
        if to > 0 {
            qb.push(" AND p.timecreated <= ");
            qb.push_bind(to);
        }
        qb.push(" AND e.course_id IN ");
        push_id_list(&mut qb, chunk);
        qb.push(" ORDER BY p.id");
        rows.extend(qb.build_query_as::<RevenueRecord>().fetch_all(db).await?);
    }
    Ok(rows)
}

pub async fn get_setting(db: &SqlitePool, name: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT value FROM dashboard_settings WHERE name = ?")
        .bind(name)
        .fetch_optional(db)
        .await
}

pub async fn set_setting<'e, E>(db: E, name: &str, value: &str) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO dashboard_settings (name, value)
        VALUES (?1, ?2)
        ON CONFLICT(name) DO UPDATE SET value = excluded.value
        "#
    )
    .bind(name)
    .bind(value)
    .execute(db)
    .await?;
    Ok(())
}
