//! Report state held by a dashboard client between requests.

use std::collections::BTreeSet;

use crate::auth::Actor;
use crate::error::AppError;
use crate::export;
use crate::models::{BulkMessageRequest, BulkMessageResult, CrossCourseProgress};
use crate::services::filter::{subcategory_options, CategoryTree, ProgressFilter, SubcategoryOption};
use crate::services::messaging::MessagingService;
use crate::services::metrics::{self, ProgressSummary, StudentRow};

/// Result of loading one dashboard section. Sections are loaded independently,
/// so a failure in one never hides another.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionOutcome<T> {
    Ready(T),
    /// Loaded fine but nothing to show; carries the informational message.
    Empty(String),
    Failed(String),
}

impl<T> SectionOutcome<T> {
    pub fn from_result<F>(result: Result<T, AppError>, empty_message: &str, is_empty: F) -> Self
    where
        F: FnOnce(&T) -> bool,
    {
        match result {
            Ok(value) if is_empty(&value) => SectionOutcome::Empty(empty_message.to_string()),
            Ok(value) => SectionOutcome::Ready(value),
            Err(e) => SectionOutcome::Failed(e.to_string()),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, SectionOutcome::Ready(_))
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            SectionOutcome::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// The cross-course progress report: the unfiltered payload as fetched, the
/// current filter and its projection, and the students picked for messaging.
#[derive(Debug, Clone)]
pub struct ProgressView {
    data: CrossCourseProgress,
    tree: CategoryTree,
    filter: ProgressFilter,
    filtered: CrossCourseProgress,
    selected: BTreeSet<i64>,
}

impl ProgressView {
    pub fn new(data: CrossCourseProgress) -> Self {
        let tree = CategoryTree::from_course_paths(&data.courses);
        Self {
            filtered: data.clone(),
            data,
            tree,
            filter: ProgressFilter::default(),
            selected: BTreeSet::new(),
        }
    }

    /// Replaces the payload after a refetch. The selection does not survive.
    pub fn reload(&mut self, data: CrossCourseProgress) {
        self.tree = CategoryTree::from_course_paths(&data.courses);
        self.data = data;
        self.selected.clear();
        self.refilter();
    }

    pub fn data(&self) -> &CrossCourseProgress {
        &self.data
    }

    pub fn filter(&self) -> &ProgressFilter {
        &self.filter
    }

    pub fn filtered(&self) -> &CrossCourseProgress {
        &self.filtered
    }

    pub fn set_filter(&mut self, filter: ProgressFilter) {
        self.filter = filter;
        self.refilter();
    }

    /// Selects a category and checks every subcategory that hosts a course.
    pub fn set_category(&mut self, category_id: Option<i64>) {
        self.filter.category_id = category_id;
        self.filter.selected_subcategories = match category_id {
            Some(id) => subcategory_options(&self.data, &self.tree, id)
                .into_iter()
                .map(|o| o.id)
                .collect(),
            None => BTreeSet::new(),
        };
        self.refilter();
    }

    pub fn subcategory_options(&self) -> Vec<SubcategoryOption> {
        match self.filter.category_id {
            Some(id) => subcategory_options(&self.data, &self.tree, id),
            None => Vec::new(),
        }
    }

    fn refilter(&mut self) {
        self.filtered = self.filter.apply(&self.data, &self.tree);
    }

    pub fn rows(&self) -> Vec<StudentRow> {
        metrics::student_rows(&self.filtered)
    }

    pub fn summary(&self) -> ProgressSummary {
        metrics::summarize_progress(&self.filtered)
    }

    pub fn selected(&self) -> &BTreeSet<i64> {
        &self.selected
    }

    /// Flips one student's selection; returns whether it is now selected.
    pub fn toggle_student(&mut self, student_id: i64) -> bool {
        if self.selected.remove(&student_id) {
            false
        } else {
            self.selected.insert(student_id);
            true
        }
    }

    pub fn select_all_visible(&mut self) {
        self.selected.extend(self.filtered.students.iter().map(|s| s.id));
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    pub fn export_csv(&self) -> Result<Vec<u8>, AppError> {
        export::progress_csv(&self.filtered)
    }

    /// Messages every selected student and clears the selection once sent.
    pub async fn send_bulk_message(
        &mut self,
        service: &MessagingService,
        actor: &Actor,
        text: &str,
    ) -> Result<BulkMessageResult, AppError> {
        let req = BulkMessageRequest {
            recipient_ids: self.selected.iter().copied().collect(),
            text: text.to_string(),
        };
        let result = service.send_bulk(actor, req).await?;
        self.selected.clear();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompletionRecord, ProgressCourse, ProgressStudent};
    use crate::services::filter::StatusFilter;

    fn course(id: i64, category: i64, path: &str) -> ProgressCourse {
        ProgressCourse {
            id,
            name: format!("Course {}", id),
            category,
            categoryname: format!("Category {}", category),
            categorypath: path.to_string(),
        }
    }

    fn student(id: i64, completions: Vec<CompletionRecord>) -> ProgressStudent {
        ProgressStudent {
            id,
            name: format!("Student {}", id),
            email: format!("s{}@example.com", id),
            lastaccess: 0,
            engagement_score: 0,
            completions,
        }
    }

    fn payload() -> CrossCourseProgress {
        CrossCourseProgress {
            courses: vec![course(1, 1, "/1"), course(2, 2, "/1/2"), course(3, 3, "/1/3")],
            students: vec![
                student(
                    10,
                    vec![
                        CompletionRecord::new(1, true, true),
                        CompletionRecord::new(2, true, true),
                        CompletionRecord::new(3, false, false),
                    ],
                ),
                student(
                    11,
                    vec![
                        CompletionRecord::new(1, true, false),
                        CompletionRecord::new(2, false, false),
                        CompletionRecord::new(3, true, false),
                    ],
                ),
            ],
        }
    }

    #[test]
    fn changing_category_checks_all_subcategories() {
        let mut view = ProgressView::new(payload());
        view.set_filter(ProgressFilter {
            include_subcategories: true,
            ..ProgressFilter::default()
        });
        view.set_category(Some(1));

        assert_eq!(view.filter().selected_subcategories, BTreeSet::from([2, 3]));
        assert_eq!(view.filtered().courses.len(), 3);

        let mut filter = view.filter().clone();
        filter.selected_subcategories.remove(&3);
        view.set_filter(filter);
        let ids: Vec<i64> = view.filtered().courses.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn summary_follows_the_filter() {
        let mut view = ProgressView::new(payload());
        assert_eq!(view.summary().program_complete, 1);

        view.set_filter(ProgressFilter {
            status: Some(StatusFilter::NotCompleted),
            ..ProgressFilter::default()
        });
        let rows = view.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 11);
        assert_eq!(rows[0].badge, "0/2");
    }

    #[test]
    fn reload_clears_selection() {
        let mut view = ProgressView::new(payload());
        assert!(view.toggle_student(10));
        view.select_all_visible();
        assert_eq!(view.selected().len(), 2);
        assert!(!view.toggle_student(10));

        view.reload(payload());
        assert!(view.selected().is_empty());
    }

    #[test]
    fn section_outcomes() {
        let ready = SectionOutcome::from_result(Ok(vec![1]), "Nothing here", Vec::is_empty);
        assert!(ready.is_ready());

        let empty = SectionOutcome::from_result(Ok(Vec::<i64>::new()), "Nothing here", Vec::is_empty);
        assert_eq!(empty, SectionOutcome::Empty("Nothing here".to_string()));

        let failed: SectionOutcome<Vec<i64>> =
            SectionOutcome::from_result(Err(AppError::NotFound), "Nothing here", Vec::is_empty);
        assert_eq!(failed, SectionOutcome::Failed("Not found".to_string()));
    }
}
