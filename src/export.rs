//! CSV documents for the dashboard reports.
//!
//! Every document starts with a UTF-8 byte-order mark so spreadsheet tools pick
//! the right encoding for non-Latin names. Every field is quoted, so text such
//! as `007` is never read back as a number.

use csv::{QuoteStyle, Writer, WriterBuilder};

use crate::error::AppError;
use crate::models::{CoursePayments, CrossCourseProgress, PaymentAnalytics, SystemAnalytics};
use crate::services::metrics::{student_counts, student_teacher_ratio};

const BOM: &str = "\u{feff}";

fn writer() -> Writer<Vec<u8>> {
    WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(BOM.as_bytes().to_vec())
}

fn finish(wtr: Writer<Vec<u8>>) -> Result<Vec<u8>, AppError> {
    wtr.into_inner()
        .map_err(|e| AppError::Export(format!("failed to flush csv: {}", e)))
}

/// One row per student, one column per visible course.
pub fn progress_csv(data: &CrossCourseProgress) -> Result<Vec<u8>, AppError> {
    let mut wtr = writer();

    let mut header = vec!["Student Name".to_string(), "Email".to_string()];
    header.extend(data.courses.iter().map(|c| format!("Course: {}", c.name)));
    header.push("Completed Count".to_string());
    header.push("Enrolled Count".to_string());
    wtr.write_record(&header)?;

    for student in &data.students {
        let mut row = vec![student.name.clone(), student.email.clone()];
        for course in &data.courses {
            let cell = match student.completion(course.id) {
                Some(record) if record.completed => "Completed",
                Some(record) if record.enrolled => "Enrolled",
                Some(_) => "Not Enrolled",
                None => "N/A",
            };
            row.push(cell.to_string());
        }
        let counts = student_counts(student, &data.courses);
        row.push(counts.completed.to_string());
        row.push(counts.enrolled.to_string());
        wtr.write_record(&row)?;
    }

    finish(wtr)
}

pub fn system_csv(data: &SystemAnalytics) -> Result<Vec<u8>, AppError> {
    let mut wtr = writer();
    wtr.write_record(["Category", "Courses", "Students", "Teachers", "Ratio"])?;

    for cat in &data.categories {
        wtr.write_record([
            cat.name.clone(),
            cat.course_count.to_string(),
            cat.student_count.to_string(),
            cat.teacher_count.to_string(),
            student_teacher_ratio(cat.student_count, cat.teacher_count),
        ])?;
    }

    finish(wtr)
}

/// Per-course revenue with a closing TOTAL row. With `hide_currency` the
/// currency column is dropped and the breakdown lists fees only.
pub fn payments_csv(data: &PaymentAnalytics, hide_currency: bool) -> Result<Vec<u8>, AppError> {
    let mut wtr = writer();

    let mut header = vec![
        "Course Name",
        "Short Name",
        "Paid Enrollments",
        "Payment Breakdown",
        "Total Revenue",
    ];
    if !hide_currency {
        header.push("Currency");
    }
    wtr.write_record(&header)?;

    for course in &data.courses {
        let mut row = vec![
            course.name.clone(),
            course.shortname.clone(),
            course.student_count.to_string(),
            breakdown_text(course, hide_currency),
            format!("{:.2}", course.revenue),
        ];
        if !hide_currency {
            row.push(course.currency.clone());
        }
        wtr.write_record(&row)?;
    }

    let mut total = vec![
        "TOTAL".to_string(),
        String::new(),
        data.total_students.to_string(),
        String::new(),
        format!("{:.2}", data.total_revenue),
    ];
    if !hide_currency {
        total.push(data.currency.clone());
    }
    wtr.write_record(&total)?;

    finish(wtr)
}

fn breakdown_text(course: &CoursePayments, hide_currency: bool) -> String {
    if !course.payment_breakdown.is_empty() {
        let parts: Vec<String> = course
            .payment_breakdown
            .iter()
            .map(|pb| {
                if hide_currency {
                    format!("{:.2}", pb.amount)
                } else {
                    format!("{} x {:.2} {}", pb.count, pb.amount, pb.currency)
                }
            })
            .collect();
        return parts.join(if hide_currency { " / " } else { ", " });
    }

    if course.student_count > 0 && course.revenue > 0.0 {
        let fee = course.revenue / course.student_count as f64;
        if hide_currency {
            format!("{:.2}", fee)
        } else {
            format!("{} x {:.2} {}", course.student_count, fee, course.currency)
        }
    } else if hide_currency {
        "0.00".to_string()
    } else {
        String::new()
    }
}
