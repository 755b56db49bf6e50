//! Gradebook CSV export. Uses the `csv` crate for quoting and escaping.
//!
//! One row per enrollment, in the order given.

use crate::domain::Course;
use crate::usecases::record_engine::EnrollmentSummary;
use rust_decimal::Decimal;

pub const GRADEBOOK_HEADER: [&str; 13] = [
    "Course",
    "Enrollment",
    "Student",
    "Enrolled On",
    "Status",
    "Final Grade",
    "Weighted %",
    "Letter",
    "Presence %",
    "Present",
    "Late",
    "Absent",
    "Excused",
];

fn opt_decimal(value: Option<Decimal>) -> String {
    value.map(|d| format!("{:.2}", d)).unwrap_or_default()
}

/// Convert enrollment summaries of one course to a CSV string with a header row.
///
/// Missing grades are empty cells, not zero.
pub fn summaries_to_csv(course: &Course, rows: &[EnrollmentSummary]) -> Result<String, csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(Vec::new());

    wtr.write_record(GRADEBOOK_HEADER)?;

    for s in rows {
        wtr.write_record([
            course.code.clone(),
            s.enrollment_id.to_string(),
            s.student_id.to_string(),
            s.enrollment_date.format("%Y-%m-%d").to_string(),
            s.status.to_string(),
            opt_decimal(s.final_grade),
            opt_decimal(s.weighted_percentage),
            s.letter_grade.map(|l| l.to_string()).unwrap_or_default(),
            format!("{:.2}", s.presence_percentage),
            s.attendance.present.to_string(),
            s.attendance.late.to_string(),
            s.attendance.absent.to_string(),
            s.attendance.excused.to_string(),
        ])?;
    }

    wtr.flush()?;
    let bytes = wtr
        .into_inner()
        .map_err(|e| csv::Error::from(std::io::Error::other(e.to_string())))?;

    String::from_utf8(bytes).map_err(|e| {
        csv::Error::from(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            e.to_string(),
        ))
    })
}
