//! Implements EnrollmentRepoPort and CourseDirectoryPort using a JSON file.
//!
//! Whole-document store: courses and enrollment aggregates are held in memory
//! and written back on every change. Suitable for small deployments and tests.

use crate::domain::capacity;
use crate::domain::{
    Course, CourseId, DomainError, Enrollment, EnrollmentAggregate, EnrollmentId, StudentId,
};
use crate::ports::{CourseDirectoryPort, EnrollmentRepoPort};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    courses: Vec<Course>,
    /// Insertion order is enrollment order.
    #[serde(default)]
    enrollments: Vec<EnrollmentAggregate>,
}

impl StoreData {
    fn active_count(&self, course_id: CourseId) -> u32 {
        self.enrollments
            .iter()
            .filter(|a| a.enrollment.course_id == course_id && a.enrollment.is_active())
            .count() as u32
    }

    fn course(&self, id: CourseId) -> Option<Course> {
        self.courses.iter().find(|c| c.id == id).map(|c| Course {
            active_enrollment_count: self.active_count(id),
            ..c.clone()
        })
    }
}

/// JSON file-based store.
pub struct JsonStore {
    path: std::path::PathBuf,
    cache: tokio::sync::RwLock<StoreData>,
}

impl JsonStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cache: tokio::sync::RwLock::new(StoreData::default()),
        }
    }

    /// Load the document from disk. A missing file is an empty store; a corrupt one is an error.
    pub async fn load(&self) -> Result<(), DomainError> {
        let data = match fs::read_to_string(&self.path).await {
            Ok(s) => serde_json::from_str(&s)
                .map_err(|e| DomainError::Repo(format!("parse {}: {}", self.path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreData::default(),
            Err(e) => return Err(DomainError::Repo(e.to_string())),
        };
        info!(
            path = %self.path.display(),
            courses = data.courses.len(),
            enrollments = data.enrollments.len(),
            "JSON store loaded"
        );
        *self.cache.write().await = data;
        Ok(())
    }

    /// Write-replace: temp file, fsync, rename over the target.
    async fn save(&self, data: &StoreData) -> Result<(), DomainError> {
        let json =
            serde_json::to_string_pretty(data).map_err(|e| DomainError::Repo(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DomainError::Repo(format!("create data dir: {}", e)))?;
        }
        let temp_path = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&temp_path)
            .await
            .map_err(|e| DomainError::Repo(format!("create temp file: {}", e)))?;
        f.write_all(json.as_bytes())
            .await
            .map_err(|e| DomainError::Repo(format!("write temp file: {}", e)))?;
        f.sync_all()
            .await
            .map_err(|e| DomainError::Repo(format!("sync temp file: {}", e)))?;
        drop(f);

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| DomainError::Repo(format!("atomic rename failed: {}", e)))?;
        debug!(path = %self.path.display(), "JSON store saved");
        Ok(())
    }
}

#[async_trait::async_trait]
impl EnrollmentRepoPort for JsonStore {
    async fn get_aggregate(
        &self,
        id: EnrollmentId,
    ) -> Result<Option<EnrollmentAggregate>, DomainError> {
        let cache = self.cache.read().await;
        Ok(cache.enrollments.iter().find(|a| a.id() == id).cloned())
    }

    async fn find_enrollments(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Vec<Enrollment>, DomainError> {
        let cache = self.cache.read().await;
        Ok(cache
            .enrollments
            .iter()
            .filter(|a| a.enrollment.pairs(student_id, course_id))
            .map(|a| a.enrollment.clone())
            .collect())
    }

    async fn list_by_course(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<EnrollmentAggregate>, DomainError> {
        let cache = self.cache.read().await;
        Ok(cache
            .enrollments
            .iter()
            .filter(|a| a.enrollment.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn list_by_student(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<Enrollment>, DomainError> {
        let cache = self.cache.read().await;
        Ok(cache
            .enrollments
            .iter()
            .filter(|a| a.enrollment.student_id == student_id)
            .map(|a| a.enrollment.clone())
            .collect())
    }

    /// Checks and insert happen under one write lock, so concurrent callers serialize here.
    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<(), DomainError> {
        let mut cache = self.cache.write().await;
        let (student_id, course_id) = (enrollment.student_id, enrollment.course_id);
        if cache
            .enrollments
            .iter()
            .any(|a| a.enrollment.pairs(student_id, course_id) && a.enrollment.is_active())
        {
            return Err(DomainError::DuplicateEnrollment {
                student_id: enrollment.student_id,
                course_id: enrollment.course_id,
            });
        }
        let course = cache
            .course(enrollment.course_id)
            .ok_or_else(|| DomainError::NotFound(format!("course {}", enrollment.course_id)))?;
        capacity::ensure_can_enroll(&course)?;

        cache
            .enrollments
            .push(EnrollmentAggregate::new(enrollment.clone()));
        if let Err(e) = self.save(&cache).await {
            cache.enrollments.pop();
            return Err(e);
        }
        Ok(())
    }

    async fn save_aggregate(&self, aggregate: &EnrollmentAggregate) -> Result<(), DomainError> {
        let mut cache = self.cache.write().await;
        let slot = cache
            .enrollments
            .iter_mut()
            .find(|a| a.id() == aggregate.id())
            .ok_or_else(|| DomainError::NotFound(format!("enrollment {}", aggregate.id())))?;
        let previous = std::mem::replace(slot, aggregate.clone());
        if let Err(e) = self.save(&cache).await {
            if let Some(slot) = cache.enrollments.iter_mut().find(|a| a.id() == aggregate.id()) {
                *slot = previous;
            }
            return Err(e);
        }
        Ok(())
    }

    async fn delete_enrollment(&self, id: EnrollmentId) -> Result<bool, DomainError> {
        let mut cache = self.cache.write().await;
        let Some(pos) = cache.enrollments.iter().position(|a| a.id() == id) else {
            return Ok(false);
        };
        let removed = cache.enrollments.remove(pos);
        if let Err(e) = self.save(&cache).await {
            cache.enrollments.insert(pos, removed);
            return Err(e);
        }
        Ok(true)
    }
}

#[async_trait::async_trait]
impl CourseDirectoryPort for JsonStore {
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, DomainError> {
        let cache = self.cache.read().await;
        Ok(cache.course(id))
    }

    async fn register_course(&self, course: &Course) -> Result<(), DomainError> {
        let mut cache = self.cache.write().await;
        let stored = Course {
            active_enrollment_count: 0,
            ..course.clone()
        };
        let previous = match cache.courses.iter().position(|c| c.id == course.id) {
            Some(pos) => Some((pos, std::mem::replace(&mut cache.courses[pos], stored))),
            None => {
                cache.courses.push(stored);
                None
            }
        };
        if let Err(e) = self.save(&cache).await {
            match previous {
                Some((pos, old)) => cache.courses[pos] = old,
                None => {
                    cache.courses.pop();
                }
            }
            return Err(e);
        }
        info!(course_id = %course.id, code = %course.code, "course registered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AttendanceMark, AttendanceStatus, EnrollmentStatus, Grade};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    async fn store_with_course(dir: &tempfile::TempDir, max: u32) -> JsonStore {
        let store = JsonStore::new(dir.path().join("records.json"));
        store.load().await.unwrap();
        store
            .register_course(&Course::new(CourseId(4), "ART100", "Drawing", max))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn aggregate_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_course(&dir, 10).await;
        let enrollment = Enrollment::new(EnrollmentId::new(), StudentId(1), CourseId(4), day());
        store.insert_enrollment(&enrollment).await.unwrap();

        let mut agg = store.get_aggregate(enrollment.id).await.unwrap().unwrap();
        agg.grades.push(Grade::new("Sketch", dec!(42.5), day()).with_max_score(dec!(50)));
        agg.attendance
            .push(AttendanceMark::new(day(), AttendanceStatus::Late));
        store.save_aggregate(&agg).await.unwrap();

        let reopened = JsonStore::new(dir.path().join("records.json"));
        reopened.load().await.unwrap();
        assert_eq!(reopened.get_aggregate(enrollment.id).await.unwrap(), Some(agg));
        assert_eq!(
            reopened.get_course(CourseId(4)).await.unwrap().unwrap().active_enrollment_count,
            1
        );
    }

    #[tokio::test]
    async fn insert_rechecks_duplicate_and_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_course(&dir, 1).await;
        let first = Enrollment::new(EnrollmentId::new(), StudentId(1), CourseId(4), day());
        store.insert_enrollment(&first).await.unwrap();

        let dup = Enrollment::new(EnrollmentId::new(), StudentId(1), CourseId(4), day());
        assert!(matches!(
            store.insert_enrollment(&dup).await,
            Err(DomainError::DuplicateEnrollment { .. })
        ));

        let other = Enrollment::new(EnrollmentId::new(), StudentId(2), CourseId(4), day());
        assert!(matches!(
            store.insert_enrollment(&other).await,
            Err(DomainError::CourseAtCapacity { .. })
        ));

        let mut dropped = store.get_aggregate(first.id).await.unwrap().unwrap();
        dropped.enrollment.status = EnrollmentStatus::Dropped;
        store.save_aggregate(&dropped).await.unwrap();
        store.insert_enrollment(&other).await.unwrap();
    }

    #[tokio::test]
    async fn failed_course_save_leaves_cache_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let store = JsonStore::new(data_dir.join("records.json"));
        store
            .register_course(&Course::new(CourseId(4), "ART100", "Drawing", 1))
            .await
            .unwrap();

        // A regular file where the data directory should be makes every save fail.
        std::fs::remove_dir_all(&data_dir).unwrap();
        std::fs::write(&data_dir, "").unwrap();

        let resized = Course::new(CourseId(4), "ART100", "Drawing", 30);
        assert!(matches!(
            store.register_course(&resized).await,
            Err(DomainError::Repo(_))
        ));
        let kept = store.get_course(CourseId(4)).await.unwrap().unwrap();
        assert_eq!(kept.max_students, 1);

        let new_course = Course::new(CourseId(5), "ART200", "Painting", 10);
        assert!(matches!(
            store.register_course(&new_course).await,
            Err(DomainError::Repo(_))
        ));
        assert!(store.get_course(CourseId(5)).await.unwrap().is_none());

        let e = Enrollment::new(EnrollmentId::new(), StudentId(1), CourseId(5), day());
        assert!(matches!(
            store.insert_enrollment(&e).await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();
        let store = JsonStore::new(&path);
        assert!(matches!(store.load().await, Err(DomainError::Repo(_))));
    }

    #[tokio::test]
    async fn save_of_unknown_aggregate_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_course(&dir, 1).await;
        let ghost = EnrollmentAggregate::new(Enrollment::new(
            EnrollmentId::new(),
            StudentId(9),
            CourseId(4),
            day(),
        ));
        assert!(matches!(
            store.save_aggregate(&ghost).await,
            Err(DomainError::NotFound(_))
        ));
    }
}
