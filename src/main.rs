//! Wiring & DI. Entry point: bootstrap adapters, inject into services, run one command.
//! No business logic here; every rule lives in the engine.

use academic_records::adapters::persistence::{JsonStore, SqliteRepo};
use academic_records::domain::{
    AttendanceMark, AttendanceStatus, Course, CourseId, CourseStatus, DomainError, EnrollmentId,
    Grade, StudentId,
};
use academic_records::ports::{CourseDirectoryPort, EnrollmentRepoPort};
use academic_records::shared::config::{AppConfig, StorageBackend};
use academic_records::usecases::{AcademicRecordEngine, EnrollmentService, ReportService};
use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "academic-records",
    about = "Enrollments, weighted grades, attendance and course capacity",
    version,
    propagate_version = true
)]
struct Cli {
    /// Data directory; wins over the config file
    #[arg(long, global = true, env = "ACADEMIC_RECORDS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Storage backend; wins over the config file
    #[arg(long, global = true, value_enum, env = "ACADEMIC_RECORDS_STORAGE")]
    storage: Option<StorageBackend>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage courses
    Course {
        #[command(subcommand)]
        subcommand: CourseSubcommand,
    },

    /// Enroll a student in a course
    Enroll {
        #[arg(long)]
        student: i64,
        #[arg(long)]
        course: i64,
        /// Enrollment date (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Record a grade
    Grade {
        enrollment: EnrollmentId,
        #[arg(long)]
        name: String,
        #[arg(long)]
        score: Decimal,
        #[arg(long, default_value = "100")]
        max: Decimal,
        #[arg(long, default_value = "1")]
        weight: Decimal,
        /// Grade date (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        comments: Option<String>,
    },

    /// Record one day of attendance (present, absent, late, excused)
    Attend {
        enrollment: EnrollmentId,
        #[arg(long)]
        status: AttendanceStatus,
        /// Session date (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        comments: Option<String>,
    },

    /// Close an enrollment as COMPLETED or FAILED
    Finalize {
        enrollment: EnrollmentId,
        /// Passing threshold in percent (default: ACADEMIC_RECORDS_PASSING_THRESHOLD or 60.00)
        #[arg(long)]
        threshold: Option<Decimal>,
    },

    /// Drop an active enrollment
    Withdraw { enrollment: EnrollmentId },

    /// Force an active enrollment to FAILED
    Fail { enrollment: EnrollmentId },

    /// Show the read model of one enrollment
    Summary { enrollment: EnrollmentId },

    /// List every enrollment of a student, oldest first
    History {
        #[arg(long)]
        student: i64,
    },

    /// Course statistics
    Report {
        #[arg(long)]
        course: i64,
        /// Also write a Markdown report into the reports directory
        #[arg(long)]
        markdown: bool,
    },

    /// Write the course gradebook CSV into the reports directory
    Export {
        #[arg(long)]
        course: i64,
    },

    /// Hard-delete an enrollment and its records
    Delete { enrollment: EnrollmentId },
}

#[derive(Subcommand)]
enum CourseSubcommand {
    /// Create or update a course
    Add {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        code: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        max_students: u32,
        #[arg(long, default_value = "active")]
        status: CourseStatus,
    },

    /// Show a course with its live enrollment count
    Show {
        #[arg(long)]
        id: i64,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Ok(path) = &env_loaded {
        info!(path = %path.display(), "loaded .env");
    }

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        match err.downcast_ref::<DomainError>() {
            Some(e) => {
                error!(
                    code = e.code(),
                    transient = !e.is_domain_rule(),
                    error = %e,
                    "command failed"
                );
                print_json(&serde_json::json!({ "error": e.code(), "message": e.to_string() }))?;
            }
            None => error!("command failed: {:#}", err),
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut cfg = AppConfig::load().context("invalid configuration")?;
    cfg.data_dir = cli
        .data_dir
        .map(|dir| dir.to_string_lossy().into_owned())
        .or(cfg.data_dir);
    cfg.storage = cli.storage.or(cfg.storage);

    let data_path = cfg.data_dir_or_default();
    let (repo, courses): (Arc<dyn EnrollmentRepoPort>, Arc<dyn CourseDirectoryPort>) =
        match cfg.storage_or_default() {
            StorageBackend::Sqlite => {
                let sqlite = Arc::new(
                    SqliteRepo::connect(&data_path)
                        .await
                        .map_err(|e| anyhow::anyhow!("SQLite connect failed: {}", e))?,
                );
                (
                    Arc::clone(&sqlite) as Arc<dyn EnrollmentRepoPort>,
                    sqlite as Arc<dyn CourseDirectoryPort>,
                )
            }
            StorageBackend::Json => {
                let store = Arc::new(JsonStore::new(data_path.join("records.json")));
                store.load().await.map_err(|e| anyhow::anyhow!("{}", e))?;
                (
                    Arc::clone(&store) as Arc<dyn EnrollmentRepoPort>,
                    store as Arc<dyn CourseDirectoryPort>,
                )
            }
        };

    let engine = AcademicRecordEngine::new(cfg.excused_policy_or_default());
    let threshold = cfg.passing_threshold_or_default();
    info!(
        data_dir = %data_path.display(),
        storage = ?cfg.storage_or_default(),
        excused_policy = ?engine.excused_policy(),
        passing_threshold = %threshold,
        "academic records ready"
    );

    let enrollments = EnrollmentService::new(
        engine,
        Arc::clone(&repo),
        Arc::clone(&courses),
        threshold,
    );
    let reports = ReportService::new(
        engine,
        repo,
        Arc::clone(&courses),
        cfg.reports_dir_or_default(),
        threshold,
    );

    match cli.command {
        Commands::Course { subcommand } => match subcommand {
            CourseSubcommand::Add {
                id,
                code,
                name,
                max_students,
                status,
            } => {
                let mut course = Course::new(CourseId(id), code, name, max_students);
                course.status = status;
                courses.register_course(&course).await?;
                let stored = courses.get_course(course.id).await?;
                print_json(&stored)?;
            }
            CourseSubcommand::Show { id } => match courses.get_course(CourseId(id)).await? {
                Some(course) => print_json(&course)?,
                None => anyhow::bail!("course {} not found", id),
            },
        },
        Commands::Enroll {
            student,
            course,
            date,
        } => {
            let agg = enrollments
                .enroll(
                    StudentId(student),
                    CourseId(course),
                    date.unwrap_or_else(today),
                )
                .await?;
            print_json(&agg)?;
        }
        Commands::Grade {
            enrollment,
            name,
            score,
            max,
            weight,
            date,
            comments,
        } => {
            let mut grade = Grade::new(name, score, date.unwrap_or_else(today))
                .with_max_score(max)
                .with_weight(weight);
            if let Some(c) = comments {
                grade = grade.with_comments(c);
            }
            let recorded = enrollments.record_grade(enrollment, grade).await?;
            print_json(&serde_json::json!({
                "enrollment": recorded.aggregate,
                "weighted_percentage": recorded.weighted_percentage,
            }))?;
        }
        Commands::Attend {
            enrollment,
            status,
            date,
            comments,
        } => {
            let mut mark = AttendanceMark::new(date.unwrap_or_else(today), status);
            mark.comments = comments;
            print_json(&enrollments.record_attendance(enrollment, mark).await?)?;
        }
        Commands::Finalize {
            enrollment,
            threshold,
        } => print_json(&enrollments.finalize(enrollment, threshold).await?)?,
        Commands::Withdraw { enrollment } => print_json(&enrollments.withdraw(enrollment).await?)?,
        Commands::Fail { enrollment } => print_json(&enrollments.force_fail(enrollment).await?)?,
        Commands::Summary { enrollment } => print_json(&enrollments.summary(enrollment).await?)?,
        Commands::History { student } => {
            print_json(&enrollments.student_enrollments(StudentId(student)).await?)?
        }
        Commands::Report { course, markdown } => {
            print_json(&reports.course_report(CourseId(course)).await?)?;
            if markdown {
                let path = reports.write_course_report(CourseId(course)).await?;
                info!(path = %path.display(), "markdown report written");
            }
        }
        Commands::Export { course } => {
            let path = reports.export_gradebook(CourseId(course)).await?;
            print_json(&serde_json::json!({ "path": path }))?;
        }
        Commands::Delete { enrollment } => {
            enrollments.delete(enrollment).await?;
            print_json(&serde_json::json!({ "deleted": enrollment }))?;
        }
    }

    Ok(())
}
