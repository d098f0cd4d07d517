use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::models::{
    CategoryPayments, CategoryStat, Course, CoursePayments, CourseRoleMember, CrossCourseProgress,
    PriceBreakdown, ProgressCourse, ProgressStudent, RevenueRecord,
};
use crate::services::filter::CategoryTree;

pub const SECONDS_PER_DAY: i64 = 86_400;

/// `100 * numerator / denominator`, 0 for an empty denominator.
pub fn percentage(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        100.0 * numerator as f64 / denominator as f64
    }
}

/// Step function over the time since the last access; 0 when never accessed.
pub fn recency_score(lastaccess: i64, now: i64) -> u32 {
    if lastaccess <= 0 {
        return 0;
    }
    let days = (now - lastaccess).max(0) as f64 / SECONDS_PER_DAY as f64;
    if days < 3.0 {
        100
    } else if days < 7.0 {
        70
    } else if days < 14.0 {
        40
    } else {
        10
    }
}

pub fn engagement_score(recency: u32, completion: f64) -> u8 {
    let score = 0.6 * recency as f64 + 0.4 * completion;
    score.round().clamp(0.0, 100.0) as u8
}

pub fn student_engagement(lastaccess: i64, now: i64, completed: usize, enrolled: usize) -> u8 {
    engagement_score(recency_score(lastaccess, now), percentage(completed, enrolled))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StudentCounts {
    pub enrolled: usize,
    pub completed: usize,
}

impl StudentCounts {
    /// Never true for a student with no visible enrollment.
    pub fn program_complete(&self) -> bool {
        self.enrolled > 0 && self.enrolled == self.completed
    }

    pub fn badge(&self) -> String {
        format!("{}/{}", self.completed, self.enrolled)
    }

    pub fn percentage(&self) -> f64 {
        percentage(self.completed, self.enrolled)
    }
}

pub fn student_counts(student: &ProgressStudent, visible: &[ProgressCourse]) -> StudentCounts {
    let mut counts = StudentCounts::default();
    for course in visible {
        if let Some(record) = student.completion(course.id) {
            if record.enrolled {
                counts.enrolled += 1;
                if record.completed {
                    counts.completed += 1;
                }
            }
        }
    }
    counts
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub engagement_score: u8,
    pub enrolled_count: usize,
    pub completed_count: usize,
    pub program_complete: bool,
    pub badge: String,
    pub percentage: f64,
}

pub fn student_rows(data: &CrossCourseProgress) -> Vec<StudentRow> {
    data.students
        .iter()
        .map(|student| {
            let counts = student_counts(student, &data.courses);
            StudentRow {
                id: student.id,
                name: student.name.clone(),
                email: student.email.clone(),
                engagement_score: student.engagement_score,
                enrolled_count: counts.enrolled,
                completed_count: counts.completed,
                program_complete: counts.program_complete(),
                badge: counts.badge(),
                percentage: counts.percentage(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseStat {
    pub course_id: i64,
    pub name: String,
    pub completed: usize,
    pub enrolled: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub total_students: usize,
    pub courses: Vec<CourseStat>,
    pub program_complete: usize,
    pub program_complete_pct: f64,
}

pub fn summarize_progress(data: &CrossCourseProgress) -> ProgressSummary {
    let mut courses: Vec<CourseStat> = data
        .courses
        .iter()
        .map(|c| CourseStat {
            course_id: c.id,
            name: c.name.clone(),
            completed: 0,
            enrolled: 0,
        })
        .collect();

    let mut program_complete = 0;
    for student in &data.students {
        for stat in courses.iter_mut() {
            if let Some(record) = student.completion(stat.course_id) {
                if record.enrolled {
                    stat.enrolled += 1;
                    if record.completed {
                        stat.completed += 1;
                    }
                }
            }
        }
        if student_counts(student, &data.courses).program_complete() {
            program_complete += 1;
        }
    }

    let total_students = data.students.len();
    ProgressSummary {
        total_students,
        courses,
        program_complete,
        program_complete_pct: percentage(program_complete, total_students),
    }
}

/// Students per teacher with one decimal, `-` without teachers.
pub fn student_teacher_ratio(students: usize, teachers: usize) -> String {
    if teachers == 0 {
        "-".to_string()
    } else {
        format!("{:.1}", students as f64 / teachers as f64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTotals {
    pub categories: Vec<CategoryStat>,
    pub total_students: usize,
    pub total_teachers: usize,
}

/// Per-category counts over `courses`; totals count each user once across categories.
pub fn category_stats(
    courses: &[Course],
    members: &[CourseRoleMember],
    tree: &CategoryTree,
) -> CategoryTotals {
    let course_category: HashMap<i64, i64> = courses.iter().map(|c| (c.id, c.category)).collect();

    let mut per_category: HashMap<i64, (usize, HashSet<i64>, HashSet<i64>)> = HashMap::new();
    for course in courses {
        per_category.entry(course.category).or_default().0 += 1;
    }

    let mut students = HashSet::new();
    let mut teachers = HashSet::new();
    for member in members {
        let Some(category) = course_category.get(&member.course_id) else {
            continue;
        };
        let entry = per_category.entry(*category).or_default();
        if member.is_teacher {
            entry.2.insert(member.user_id);
            teachers.insert(member.user_id);
        } else {
            entry.1.insert(member.user_id);
            students.insert(member.user_id);
        }
    }

    let mut categories: Vec<CategoryStat> = per_category
        .into_iter()
        .map(|(id, (course_count, students, teachers))| CategoryStat {
            id,
            name: tree.name(id).to_string(),
            path: tree.path(id).to_string(),
            course_count,
            student_count: students.len(),
            teacher_count: teachers.len(),
        })
        .collect();
    categories.sort_by(|a, b| a.path.cmp(&b.path).then(a.id.cmp(&b.id)));

    CategoryTotals {
        categories,
        total_students: students.len(),
        total_teachers: teachers.len(),
    }
}

/// Groups records by (amount, currency), ordered by amount then currency.
pub fn price_breakdown<'a, I>(records: I) -> Vec<PriceBreakdown>
where
    I: IntoIterator<Item = &'a RevenueRecord>,
{
    let mut groups: HashMap<(u64, String), usize> = HashMap::new();
    for record in records {
        *groups
            .entry((record.amount.to_bits(), record.currency.clone()))
            .or_insert(0) += 1;
    }

    let mut breakdown: Vec<PriceBreakdown> = groups
        .into_iter()
        .map(|((bits, currency), count)| PriceBreakdown {
            amount: f64::from_bits(bits),
            currency,
            count,
        })
        .collect();
    breakdown.sort_by(|a, b| {
        a.amount
            .partial_cmp(&b.amount)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.currency.cmp(&b.currency))
    });
    breakdown
}

#[derive(Debug, Clone, PartialEq)]
pub struct RevenueSummary {
    pub courses: Vec<CoursePayments>,
    pub categories: Vec<CategoryPayments>,
    pub total_students: usize,
    pub total_revenue: f64,
    pub currency: String,
}

/// Rolls revenue records up per course and per category. Every record lands in
/// exactly one course and every course in exactly one category, so both
/// groupings add up to the same total.
pub fn summarize_revenue(
    records: &[RevenueRecord],
    courses: &[Course],
    tree: &CategoryTree,
) -> RevenueSummary {
    let mut by_course: HashMap<i64, Vec<&RevenueRecord>> = HashMap::new();
    for record in records {
        by_course.entry(record.course_id).or_default().push(record);
    }

    let mut course_rows = Vec::new();
    for course in courses {
        let Some(course_records) = by_course.get(&course.id) else {
            continue;
        };
        let users: HashSet<i64> = course_records.iter().map(|r| r.user_id).collect();
        course_rows.push(CoursePayments {
            id: course.id,
            name: course.fullname.clone(),
            shortname: course.shortname.clone(),
            category: course.category,
            student_count: users.len(),
            revenue: course_records.iter().map(|r| r.amount).sum(),
            currency: dominant_currency(course_records),
            payment_breakdown: price_breakdown(course_records.iter().copied()),
        });
    }

    let known: HashSet<i64> = course_rows.iter().map(|c| c.id).collect();
    let mut category_order: Vec<i64> = Vec::new();
    let mut category_rows: HashMap<i64, (f64, HashSet<i64>, Vec<&RevenueRecord>)> = HashMap::new();
    for row in &course_rows {
        if !category_rows.contains_key(&row.category) {
            category_order.push(row.category);
        }
        let entry = category_rows.entry(row.category).or_default();
        entry.0 += row.revenue;
        if let Some(course_records) = by_course.get(&row.id) {
            for record in course_records.iter().copied() {
                entry.1.insert(record.user_id);
                entry.2.push(record);
            }
        }
    }

    let categories = category_order
        .into_iter()
        .filter_map(|id| {
            category_rows.remove(&id).map(|(revenue, users, records)| CategoryPayments {
                id,
                name: tree.name(id).to_string(),
                student_count: users.len(),
                revenue,
                payment_breakdown: price_breakdown(records),
            })
        })
        .collect();

    let counted: Vec<&RevenueRecord> = records.iter().filter(|r| known.contains(&r.course_id)).collect();
    let total_students = counted.iter().map(|r| r.user_id).collect::<HashSet<_>>().len();
    let total_revenue = course_rows.iter().map(|c| c.revenue).sum();

    RevenueSummary {
        courses: course_rows,
        categories,
        total_students,
        total_revenue,
        currency: dominant_currency(&counted),
    }
}

/// The most frequent currency; ties resolve alphabetically.
fn dominant_currency(records: &[&RevenueRecord]) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        if !record.currency.is_empty() {
            *counts.entry(record.currency.as_str()).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(currency, _)| currency.to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, CompletionRecord};

    const NOW: i64 = 1_760_000_000;

    fn course(id: i64, category: i64) -> ProgressCourse {
        ProgressCourse {
            id,
            name: format!("Course {}", id),
            category,
            categoryname: format!("Category {}", category),
            categorypath: format!("/{}", category),
        }
    }

    fn student(id: i64, completions: Vec<CompletionRecord>) -> ProgressStudent {
        ProgressStudent {
            id,
            name: format!("Student {}", id),
            email: format!("s{}@example.com", id),
            lastaccess: NOW,
            engagement_score: 0,
            completions,
        }
    }

    fn record(course_id: i64, user_id: i64, amount: f64, currency: &str) -> RevenueRecord {
        RevenueRecord {
            course_id,
            user_id,
            amount,
            currency: currency.to_string(),
        }
    }

    #[test]
    fn recency_follows_step_tiers() {
        assert_eq!(recency_score(0, NOW), 0);
        assert_eq!(recency_score(NOW - SECONDS_PER_DAY, NOW), 100);
        assert_eq!(recency_score(NOW - 5 * SECONDS_PER_DAY, NOW), 70);
        assert_eq!(recency_score(NOW - 10 * SECONDS_PER_DAY, NOW), 40);
        assert_eq!(recency_score(NOW - 30 * SECONDS_PER_DAY, NOW), 10);
    }

    #[test]
    fn recency_tier_edges_are_exclusive() {
        assert_eq!(recency_score(NOW - 3 * SECONDS_PER_DAY + 1, NOW), 100);
        assert_eq!(recency_score(NOW - 3 * SECONDS_PER_DAY, NOW), 70);
        assert_eq!(recency_score(NOW - 7 * SECONDS_PER_DAY, NOW), 40);
        assert_eq!(recency_score(NOW - 14 * SECONDS_PER_DAY, NOW), 10);
        // Clock skew: an access stamped after `now` counts as just now.
        assert_eq!(recency_score(NOW + SECONDS_PER_DAY, NOW), 100);
    }

    #[test]
    fn ten_days_idle_with_half_completed_scores_44() {
        let score = student_engagement(NOW - 10 * SECONDS_PER_DAY, NOW, 1, 2);
        assert_eq!(score, 44);
    }

    #[test]
    fn engagement_stays_in_range_and_is_deterministic() {
        for recency in [0, 10, 40, 70, 100] {
            for completion in [0.0, 33.3, 50.0, 66.7, 100.0] {
                let first = engagement_score(recency, completion);
                assert!(first <= 100);
                assert_eq!(first, engagement_score(recency, completion));
            }
        }
        assert_eq!(engagement_score(100, 100.0), 100);
        assert_eq!(engagement_score(0, 0.0), 0);
    }

    #[test]
    fn percentage_of_zero_denominator_is_zero() {
        assert_eq!(percentage(3, 0), 0.0);
        assert_eq!(percentage(1, 4), 25.0);
    }

    #[test]
    fn two_of_three_completed_is_not_program_complete() {
        let courses = vec![course(1, 10), course(2, 10), course(3, 10)];
        let s = student(
            7,
            vec![
                CompletionRecord::new(1, true, true),
                CompletionRecord::new(2, true, true),
                CompletionRecord::new(3, true, false),
            ],
        );

        let counts = student_counts(&s, &courses);
        assert_eq!(counts.enrolled, 3);
        assert_eq!(counts.completed, 2);
        assert!(!counts.program_complete());
        assert_eq!(counts.badge(), "2/3");
    }

    #[test]
    fn student_without_visible_enrollment_is_never_complete() {
        let courses = vec![course(1, 10)];
        let s = student(7, vec![CompletionRecord::new(1, false, false)]);
        let counts = student_counts(&s, &courses);
        assert_eq!(counts, StudentCounts::default());
        assert!(!counts.program_complete());
    }

    #[test]
    fn summary_counts_per_course_and_program_completion() {
        let data = CrossCourseProgress {
            courses: vec![course(1, 10), course(2, 10)],
            students: vec![
                student(1, vec![CompletionRecord::new(1, true, true), CompletionRecord::new(2, true, true)]),
                student(2, vec![CompletionRecord::new(1, true, false), CompletionRecord::new(2, false, false)]),
            ],
        };

        let summary = summarize_progress(&data);
        assert_eq!(summary.total_students, 2);
        assert_eq!(summary.courses[0].enrolled, 2);
        assert_eq!(summary.courses[0].completed, 1);
        assert_eq!(summary.courses[1].enrolled, 1);
        assert_eq!(summary.program_complete, 1);
        assert_eq!(summary.program_complete_pct, 50.0);
    }

    #[test]
    fn ratio_without_teachers_is_dash() {
        assert_eq!(student_teacher_ratio(12, 0), "-");
        assert_eq!(student_teacher_ratio(10, 4), "2.5");
    }

    #[test]
    fn estimated_instance_of_four_enrollments() {
        let tree = CategoryTree::from_categories(&[Category {
            id: 5,
            name: "Languages".to_string(),
            parent: 0,
            path: "/5".to_string(),
        }]);
        let courses = vec![Course {
            id: 1,
            fullname: "Spanish".to_string(),
            shortname: "ES".to_string(),
            category: 5,
        }];
        let records: Vec<RevenueRecord> = (1..=4).map(|u| record(1, u, 50.0, "USD")).collect();

        let summary = summarize_revenue(&records, &courses, &tree);
        assert_eq!(summary.total_revenue, 200.0);
        assert_eq!(summary.total_students, 4);
        assert_eq!(summary.currency, "USD");
        assert_eq!(
            summary.courses[0].payment_breakdown,
            vec![PriceBreakdown { amount: 50.0, currency: "USD".to_string(), count: 4 }]
        );
        assert_eq!(summary.categories[0].revenue, 200.0);
    }

    #[test]
    fn revenue_groupings_agree() {
        let tree = CategoryTree::from_categories(&[]);
        let courses: Vec<Course> = (1..=4)
            .map(|id| Course {
                id,
                fullname: format!("C{}", id),
                shortname: String::new(),
                category: if id % 2 == 0 { 20 } else { 30 },
            })
            .collect();
        let records = vec![
            record(1, 1, 19.99, "USD"),
            record(1, 2, 19.99, "USD"),
            record(2, 1, 35.5, "EUR"),
            record(3, 3, 0.1, "USD"),
            record(4, 4, 0.2, "USD"),
            record(4, 5, 12.75, "USD"),
            record(99, 6, 1000.0, "USD"),
        ];

        let summary = summarize_revenue(&records, &courses, &tree);
        let by_course: f64 = summary.courses.iter().map(|c| c.revenue).sum();
        let by_category: f64 = summary.categories.iter().map(|c| c.revenue).sum();
        assert!((summary.total_revenue - by_course).abs() < 1e-9);
        assert!((summary.total_revenue - by_category).abs() < 1e-9);
        assert!((summary.total_revenue - 88.53).abs() < 1e-9);
        assert_eq!(summary.categories[0].name, "Unknown");

        assert_eq!(summary.currency, "USD");
        let course_two = summary.courses.iter().find(|c| c.id == 2).unwrap();
        assert_eq!(course_two.currency, "EUR");
    }

    #[test]
    fn breakdown_groups_heterogeneous_prices() {
        let records = vec![
            record(1, 1, 30.0, "USD"),
            record(1, 2, 10.0, "USD"),
            record(1, 3, 30.0, "USD"),
            record(1, 4, 30.0, "EUR"),
        ];
        let breakdown = price_breakdown(&records);
        assert_eq!(breakdown.len(), 3);
        assert_eq!(breakdown[0].amount, 10.0);
        assert_eq!(breakdown[1].currency, "EUR");
        assert_eq!(breakdown[2].count, 2);
    }
}
