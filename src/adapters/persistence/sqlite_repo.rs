//! SQLite-backed repository via libsql. Implements EnrollmentRepoPort and CourseDirectoryPort.
//!
//! One database file (records.db) holds courses, enrollments, grades and attendance.
//! Decimals are stored as TEXT to keep exact values; dates as ISO `YYYY-MM-DD`.
//! Every write runs in an IMMEDIATE transaction so the duplicate and capacity
//! re-check cannot interleave with another writer. Each connection waits up to
//! BUSY_TIMEOUT for the write lock instead of failing with SQLITE_BUSY.

use crate::domain::capacity;
use crate::domain::{
    AttendanceMark, Course, CourseId, DomainError, Enrollment, EnrollmentAggregate, EnrollmentId,
    Grade, StudentId,
};
use crate::ports::{CourseDirectoryPort, EnrollmentRepoPort};
use chrono::NaiveDate;
use libsql::{params, Connection, Database, Row, TransactionBehavior};
use rust_decimal::Decimal;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

const COURSES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS courses (
    id INTEGER PRIMARY KEY,
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    max_students INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'active'
)"#;

const ENROLLMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS enrollments (
    id TEXT PRIMARY KEY,
    student_id INTEGER NOT NULL,
    course_id INTEGER NOT NULL,
    enrollment_date TEXT NOT NULL,
    status TEXT NOT NULL,
    final_grade TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)"#;

/// At most one active enrollment per (student, course). Backstop for the transactional check.
const ACTIVE_PAIR_INDEX: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_enrollments_active_pair
ON enrollments (student_id, course_id) WHERE status = 'ENROLLED'"#;

const ENROLLMENTS_COURSE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_enrollments_course ON enrollments (course_id, status)";

const GRADES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS grades (
    enrollment_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    assignment_name TEXT NOT NULL,
    score TEXT NOT NULL,
    max_score TEXT NOT NULL,
    weight TEXT NOT NULL,
    date TEXT NOT NULL,
    comments TEXT,
    PRIMARY KEY (enrollment_id, position)
)"#;

const ATTENDANCE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS attendance (
    enrollment_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    date TEXT NOT NULL,
    status TEXT NOT NULL,
    comments TEXT,
    PRIMARY KEY (enrollment_id, position),
    UNIQUE (enrollment_id, date)
)"#;

const ENROLLMENT_COLUMNS: &str =
    "id, student_id, course_id, enrollment_date, status, final_grade";

/// How long a connection waits for another writer before reporting `database is locked`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn db_err(e: libsql::Error) -> DomainError {
    DomainError::Repo(e.to_string())
}

fn parse_col<T>(row: &Row, idx: i32, what: &str) -> Result<T, DomainError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = row.get(idx).map_err(db_err)?;
    raw.parse::<T>()
        .map_err(|e| DomainError::Repo(format!("bad {} {:?}: {}", what, raw, e)))
}

fn parse_opt_col<T>(row: &Row, idx: i32, what: &str) -> Result<Option<T>, DomainError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw: Option<String> = row.get(idx).map_err(db_err)?;
    raw.map(|s| {
        s.parse::<T>()
            .map_err(|e| DomainError::Repo(format!("bad {} {:?}: {}", what, s, e)))
    })
    .transpose()
}

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn enrollment_from_row(row: &Row) -> Result<Enrollment, DomainError> {
    Ok(Enrollment {
        id: parse_col::<EnrollmentId>(row, 0, "enrollment id")?,
        student_id: StudentId(row.get::<i64>(1).map_err(db_err)?),
        course_id: CourseId(row.get::<i64>(2).map_err(db_err)?),
        enrollment_date: parse_col::<NaiveDate>(row, 3, "enrollment date")?,
        status: parse_col(row, 4, "enrollment status")?,
        final_grade: parse_opt_col::<Decimal>(row, 5, "final grade")?,
    })
}

/// SQLite repository. Safe to share via Arc; every call opens its own connection.
pub struct SqliteRepo {
    db: Database,
}

impl SqliteRepo {
    /// Connect to (or create) `records.db` in `base_dir` and ensure the schema exists.
    ///
    /// Sets WAL mode and synchronous=NORMAL.
    pub async fn connect(base_dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let base = base_dir.as_ref();
        std::fs::create_dir_all(base).map_err(|e| DomainError::Repo(e.to_string()))?;
        let db_path = base.join("records.db");
        let path_str = db_path.to_string_lossy();
        let db = libsql::Builder::new_local(path_str.as_ref())
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(db_err)?;

        // PRAGMA returns a row; use query and drain it (execute fails when rows are returned).
        for pragma in ["PRAGMA journal_mode=WAL", "PRAGMA synchronous=NORMAL"] {
            let mut rows = conn
                .query(pragma, ())
                .await
                .map_err(|e| DomainError::Repo(format!("{} failed: {}", pragma, e)))?;
            while rows.next().await.map_err(db_err)?.is_some() {}
        }

        for ddl in [
            COURSES_TABLE,
            ENROLLMENTS_TABLE,
            ACTIVE_PAIR_INDEX,
            ENROLLMENTS_COURSE_INDEX,
            GRADES_TABLE,
            ATTENDANCE_TABLE,
        ] {
            conn.execute(ddl, ()).await.map_err(db_err)?;
        }

        info!(path = %db_path.display(), "SQLite connected with WAL mode");

        Ok(Self { db })
    }

    fn conn(&self) -> Result<Connection, DomainError> {
        let conn = self.db.connect().map_err(db_err)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(db_err)?;
        Ok(conn)
    }

    async fn course_on(conn: &Connection, id: CourseId) -> Result<Option<Course>, DomainError> {
        let mut rows = conn
            .query(
                r#"
                SELECT c.id, c.code, c.name, c.max_students, c.status,
                    (SELECT COUNT(*) FROM enrollments e
                     WHERE e.course_id = c.id AND e.status = 'ENROLLED')
                FROM courses c
                WHERE c.id = ?1
                "#,
                params![id.0],
            )
            .await
            .map_err(db_err)?;
        let Some(row) = rows.next().await.map_err(db_err)? else {
            return Ok(None);
        };
        let max_students: i64 = row.get(3).map_err(db_err)?;
        let active: i64 = row.get(5).map_err(db_err)?;
        Ok(Some(Course {
            id: CourseId(row.get::<i64>(0).map_err(db_err)?),
            code: row.get(1).map_err(db_err)?,
            name: row.get(2).map_err(db_err)?,
            max_students: u32::try_from(max_students).unwrap_or(0),
            active_enrollment_count: u32::try_from(active).unwrap_or(u32::MAX),
            status: parse_col(&row, 4, "course status")?,
        }))
    }

    async fn load_grades(conn: &Connection, id: EnrollmentId) -> Result<Vec<Grade>, DomainError> {
        let mut rows = conn
            .query(
                r#"
                SELECT assignment_name, score, max_score, weight, date, comments
                FROM grades
                WHERE enrollment_id = ?1
                ORDER BY position
                "#,
                params![id.to_string()],
            )
            .await
            .map_err(db_err)?;
        let mut grades = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            grades.push(Grade {
                assignment_name: row.get(0).map_err(db_err)?,
                score: parse_col(&row, 1, "score")?,
                max_score: parse_col(&row, 2, "max score")?,
                weight: parse_col(&row, 3, "weight")?,
                date: parse_col(&row, 4, "grade date")?,
                comments: row.get::<Option<String>>(5).map_err(db_err)?,
            });
        }
        Ok(grades)
    }

    async fn load_attendance(
        conn: &Connection,
        id: EnrollmentId,
    ) -> Result<Vec<AttendanceMark>, DomainError> {
        let mut rows = conn
            .query(
                r#"
                SELECT date, status, comments
                FROM attendance
                WHERE enrollment_id = ?1
                ORDER BY position
                "#,
                params![id.to_string()],
            )
            .await
            .map_err(db_err)?;
        let mut marks = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            marks.push(AttendanceMark {
                date: parse_col(&row, 0, "attendance date")?,
                status: parse_col(&row, 1, "attendance status")?,
                comments: row.get::<Option<String>>(2).map_err(db_err)?,
            });
        }
        Ok(marks)
    }

    async fn hydrate(
        conn: &Connection,
        enrollment: Enrollment,
    ) -> Result<EnrollmentAggregate, DomainError> {
        let grades = Self::load_grades(conn, enrollment.id).await?;
        let attendance = Self::load_attendance(conn, enrollment.id).await?;
        Ok(EnrollmentAggregate {
            enrollment,
            grades,
            attendance,
        })
    }

    async fn query_enrollments(
        conn: &Connection,
        filter: &str,
        values: Vec<libsql::Value>,
    ) -> Result<Vec<Enrollment>, DomainError> {
        let sql = format!(
            "SELECT {} FROM enrollments WHERE {} ORDER BY rowid",
            ENROLLMENT_COLUMNS, filter
        );
        let mut rows = conn.query(&sql, values).await.map_err(db_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            out.push(enrollment_from_row(&row)?);
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl EnrollmentRepoPort for SqliteRepo {
    async fn get_aggregate(
        &self,
        id: EnrollmentId,
    ) -> Result<Option<EnrollmentAggregate>, DomainError> {
        let conn = self.conn()?;
        let found = Self::query_enrollments(&conn, "id = ?1", vec![id.to_string().into()]).await?;
        match found.into_iter().next() {
            Some(enrollment) => Ok(Some(Self::hydrate(&conn, enrollment).await?)),
            None => Ok(None),
        }
    }

    async fn find_enrollments(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Vec<Enrollment>, DomainError> {
        let conn = self.conn()?;
        Self::query_enrollments(
            &conn,
            "student_id = ?1 AND course_id = ?2",
            vec![student_id.0.into(), course_id.0.into()],
        )
        .await
    }

    async fn list_by_course(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<EnrollmentAggregate>, DomainError> {
        let conn = self.conn()?;
        let enrollments =
            Self::query_enrollments(&conn, "course_id = ?1", vec![course_id.0.into()]).await?;
        let mut aggregates = Vec::with_capacity(enrollments.len());
        for enrollment in enrollments {
            aggregates.push(Self::hydrate(&conn, enrollment).await?);
        }
        Ok(aggregates)
    }

    async fn list_by_student(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<Enrollment>, DomainError> {
        let conn = self.conn()?;
        Self::query_enrollments(&conn, "student_id = ?1", vec![student_id.0.into()]).await
    }

    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<(), DomainError> {
        let conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(db_err)?;

        let mut rows = tx
            .query(
                "SELECT COUNT(*) FROM enrollments WHERE student_id = ?1 AND course_id = ?2 AND status = 'ENROLLED'",
                params![enrollment.student_id.0, enrollment.course_id.0],
            )
            .await
            .map_err(db_err)?;
        let active_pairs: i64 = match rows.next().await.map_err(db_err)? {
            Some(row) => row.get(0).map_err(db_err)?,
            None => 0,
        };
        drop(rows);
        if active_pairs > 0 {
            return Err(DomainError::DuplicateEnrollment {
                student_id: enrollment.student_id,
                course_id: enrollment.course_id,
            });
        }

        let course = Self::course_on(&tx, enrollment.course_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("course {}", enrollment.course_id)))?;
        capacity::ensure_can_enroll(&course)?;

        let now = now_rfc3339();
        tx.execute(
            r#"
            INSERT INTO enrollments (id, student_id, course_id, enrollment_date, status, final_grade, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            "#,
            params![
                enrollment.id.to_string(),
                enrollment.student_id.0,
                enrollment.course_id.0,
                iso(enrollment.enrollment_date),
                enrollment.status.as_str(),
                enrollment.final_grade.map(|g| g.to_string()),
                now
            ],
        )
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint failed") {
                DomainError::DuplicateEnrollment {
                    student_id: enrollment.student_id,
                    course_id: enrollment.course_id,
                }
            } else {
                db_err(e)
            }
        })?;
        tx.commit().await.map_err(db_err)?;
        debug!(enrollment_id = %enrollment.id, "enrollment row inserted");
        Ok(())
    }

    async fn save_aggregate(&self, aggregate: &EnrollmentAggregate) -> Result<(), DomainError> {
        let conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(db_err)?;
        let id = aggregate.id().to_string();
        let enrollment = &aggregate.enrollment;

        let updated = tx
            .execute(
                "UPDATE enrollments SET status = ?2, final_grade = ?3, updated_at = ?4 WHERE id = ?1",
                params![
                    id.as_str(),
                    enrollment.status.as_str(),
                    enrollment.final_grade.map(|g| g.to_string()),
                    now_rfc3339()
                ],
            )
            .await
            .map_err(db_err)?;
        if updated == 0 {
            return Err(DomainError::NotFound(format!("enrollment {}", aggregate.id())));
        }

        tx.execute("DELETE FROM grades WHERE enrollment_id = ?1", params![id.as_str()])
            .await
            .map_err(db_err)?;
        for (position, g) in aggregate.grades.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO grades (enrollment_id, position, assignment_name, score, max_score, weight, date, comments)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    id.as_str(),
                    position as i64,
                    g.assignment_name.as_str(),
                    g.score.to_string(),
                    g.max_score.to_string(),
                    g.weight.to_string(),
                    iso(g.date),
                    g.comments.clone()
                ],
            )
            .await
            .map_err(db_err)?;
        }

        tx.execute("DELETE FROM attendance WHERE enrollment_id = ?1", params![id.as_str()])
            .await
            .map_err(db_err)?;
        for (position, m) in aggregate.attendance.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO attendance (enrollment_id, position, date, status, comments)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    id.as_str(),
                    position as i64,
                    iso(m.date),
                    m.status.as_str(),
                    m.comments.clone()
                ],
            )
            .await
            .map_err(|e| {
                warn!(enrollment_id = %aggregate.id(), date = %m.date, "attendance row rejected");
                db_err(e)
            })?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn delete_enrollment(&self, id: EnrollmentId) -> Result<bool, DomainError> {
        let conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(db_err)?;
        let key = id.to_string();
        tx.execute("DELETE FROM grades WHERE enrollment_id = ?1", params![key.as_str()])
            .await
            .map_err(db_err)?;
        tx.execute("DELETE FROM attendance WHERE enrollment_id = ?1", params![key.as_str()])
            .await
            .map_err(db_err)?;
        let deleted = tx
            .execute("DELETE FROM enrollments WHERE id = ?1", params![key.as_str()])
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(deleted > 0)
    }
}

#[async_trait::async_trait]
impl CourseDirectoryPort for SqliteRepo {
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, DomainError> {
        let conn = self.conn()?;
        Self::course_on(&conn, id).await
    }

    async fn register_course(&self, course: &Course) -> Result<(), DomainError> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO courses (id, code, name, max_students, status)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (id) DO UPDATE SET
                code = excluded.code,
                name = excluded.name,
                max_students = excluded.max_students,
                status = excluded.status
            "#,
            params![
                course.id.0,
                course.code.as_str(),
                course.name.as_str(),
                i64::from(course.max_students),
                course.status.as_str()
            ],
        )
        .await
        .map_err(db_err)?;
        info!(course_id = %course.id, code = %course.code, "course registered");
        Ok(())
    }
}
