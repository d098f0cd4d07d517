use std::collections::{BTreeSet, HashMap, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::{Category, CompletionRecord, Course, CrossCourseProgress, ProgressCourse};

pub const UNKNOWN_CATEGORY: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryNode {
    pub id: i64,
    pub name: String,
    pub parent: i64,
    pub path: String,
    pub children: Vec<i64>,
}

/// Category hierarchy with explicit parent and child links.
///
/// Built once per request; subtree questions are answered by walking links
/// instead of matching ancestry strings.
#[derive(Debug, Clone, Default)]
pub struct CategoryTree {
    nodes: HashMap<i64, CategoryNode>,
}

impl CategoryTree {
    pub fn from_categories(categories: &[Category]) -> Self {
        let mut nodes: HashMap<i64, CategoryNode> = categories
            .iter()
            .map(|c| {
                (
                    c.id,
                    CategoryNode {
                        id: c.id,
                        name: c.name.clone(),
                        parent: c.parent,
                        path: c.path.clone(),
                        children: Vec::new(),
                    },
                )
            })
            .collect();
        link_children(&mut nodes);
        Self { nodes }
    }

    /// Rebuilds the hierarchy from the ancestry paths carried by progress courses.
    /// Ancestors that host no listed course keep an empty name.
    pub fn from_course_paths(courses: &[ProgressCourse]) -> Self {
        let mut nodes: HashMap<i64, CategoryNode> = HashMap::new();
        for course in courses {
            let ids: Vec<i64> = parse_path(&course.categorypath);
            let mut parent = 0;
            let mut path = String::new();
            for id in ids {
                path.push('/');
                path.push_str(&id.to_string());
                nodes.entry(id).or_insert_with(|| CategoryNode {
                    id,
                    name: String::new(),
                    parent,
                    path: path.clone(),
                    children: Vec::new(),
                });
                parent = id;
            }

            let node = nodes.entry(course.category).or_insert_with(|| CategoryNode {
                id: course.category,
                name: String::new(),
                parent: 0,
                path: course.categorypath.clone(),
                children: Vec::new(),
            });
            node.name = course.categoryname.clone();
        }
        link_children(&mut nodes);
        Self { nodes }
    }

    pub fn get(&self, id: i64) -> Option<&CategoryNode> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn name(&self, id: i64) -> &str {
        self.nodes.get(&id).map(|n| n.name.as_str()).unwrap_or(UNKNOWN_CATEGORY)
    }

    pub fn path(&self, id: i64) -> &str {
        self.nodes.get(&id).map(|n| n.path.as_str()).unwrap_or("")
    }

    pub fn children(&self, id: i64) -> &[i64] {
        self.nodes.get(&id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Strict descendants of `id`.
    pub fn descendants(&self, id: i64) -> HashSet<i64> {
        let mut found = HashSet::new();
        let mut stack: Vec<i64> = self.children(id).to_vec();
        while let Some(next) = stack.pop() {
            if next == id || !found.insert(next) {
                continue;
            }
            stack.extend_from_slice(self.children(next));
        }
        found
    }

    /// `id` together with all of its descendants.
    pub fn subtree(&self, id: i64) -> HashSet<i64> {
        let mut ids = self.descendants(id);
        ids.insert(id);
        ids
    }

    pub fn is_descendant(&self, id: i64, ancestor: i64) -> bool {
        let mut current = id;
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(&current) {
                Some(node) if node.parent == ancestor && node.parent != 0 => return true,
                Some(node) if node.parent != 0 => current = node.parent,
                _ => return false,
            }
        }
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = &CategoryNode> {
        self.nodes.values()
    }
}

fn parse_path(path: &str) -> Vec<i64> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn link_children(nodes: &mut HashMap<i64, CategoryNode>) {
    let links: Vec<(i64, i64)> = nodes
        .values()
        .filter(|n| n.parent != 0 && n.parent != n.id)
        .map(|n| (n.parent, n.id))
        .collect();
    for (parent, child) in links {
        if let Some(node) = nodes.get_mut(&parent) {
            node.children.push(child);
        }
    }
    for node in nodes.values_mut() {
        node.children.sort_unstable();
        node.children.dedup();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    Completed,
    NotCompleted,
    Enrolled,
}

impl StatusFilter {
    pub fn matches(&self, record: &CompletionRecord) -> bool {
        if !record.enrolled {
            return false;
        }
        match self {
            StatusFilter::Completed => record.completed,
            StatusFilter::NotCompleted => !record.completed,
            StatusFilter::Enrolled => true,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(StatusFilter::Completed),
            "not_completed" => Ok(StatusFilter::NotCompleted),
            "enrolled" => Ok(StatusFilter::Enrolled),
            other => Err(format!("unknown status filter: {}", other)),
        }
    }
}

/// Course, category and status selection over a progress payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressFilter {
    pub course_id: Option<i64>,
    pub category_id: Option<i64>,
    pub include_subcategories: bool,
    /// Checked subcategories; descendants outside this set stay hidden.
    pub selected_subcategories: BTreeSet<i64>,
    pub status: Option<StatusFilter>,
}

impl ProgressFilter {
    pub fn matches_course(&self, course: &ProgressCourse, tree: &CategoryTree) -> bool {
        if let Some(course_id) = self.course_id {
            if course.id != course_id {
                return false;
            }
        }

        match self.category_id {
            None => true,
            Some(category) if course.category == category => true,
            Some(category) => {
                self.include_subcategories
                    && self.selected_subcategories.contains(&course.category)
                    && tree.is_descendant(course.category, category)
            }
        }
    }

    /// Projects `data` onto the visible courses and matching students. Always
    /// starts from the payload passed in, so reapplying a filter to the same
    /// unfiltered payload gives the same result.
    pub fn apply(&self, data: &CrossCourseProgress, tree: &CategoryTree) -> CrossCourseProgress {
        let courses: Vec<ProgressCourse> = data
            .courses
            .iter()
            .filter(|c| self.matches_course(c, tree))
            .cloned()
            .collect();

        let students = match self.status {
            None => data.students.clone(),
            Some(status) => data
                .students
                .iter()
                .filter(|student| {
                    courses.iter().any(|course| {
                        student
                            .completion(course.id)
                            .is_some_and(|record| status.matches(record))
                    })
                })
                .cloned()
                .collect(),
        };

        CrossCourseProgress { courses, students }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubcategoryOption {
    pub id: i64,
    pub name: String,
}

/// Descendant categories of `category_id` that host at least one course in `data`.
pub fn subcategory_options(
    data: &CrossCourseProgress,
    tree: &CategoryTree,
    category_id: i64,
) -> Vec<SubcategoryOption> {
    let descendants = tree.descendants(category_id);
    let mut seen = BTreeSet::new();
    let mut options = Vec::new();
    for course in &data.courses {
        if descendants.contains(&course.category) && seen.insert(course.category) {
            options.push(SubcategoryOption {
                id: course.category,
                name: course.categoryname.clone(),
            });
        }
    }
    options
}

/// Courses selected by the admin-wide filters. A specific course wins over a
/// category; a category expands to its subtree when requested.
pub fn resolve_course_scope(
    courses: &[Course],
    tree: &CategoryTree,
    category_id: Option<i64>,
    course_id: Option<i64>,
    include_subcategories: bool,
) -> Vec<Course> {
    if let Some(course_id) = course_id {
        return courses.iter().filter(|c| c.id == course_id).cloned().collect();
    }

    match category_id {
        Some(category) => {
            let candidates = if include_subcategories {
                tree.subtree(category)
            } else {
                HashSet::from([category])
            };
            courses
                .iter()
                .filter(|c| candidates.contains(&c.category))
                .cloned()
                .collect()
        }
        None => courses.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProgressStudent;

    fn category(id: i64, parent: i64, path: &str) -> Category {
        Category {
            id,
            name: format!("Cat {}", id),
            parent,
            path: path.to_string(),
        }
    }

    fn pcourse(id: i64, category: i64, path: &str) -> ProgressCourse {
        ProgressCourse {
            id,
            name: format!("Course {}", id),
            category,
            categoryname: format!("Cat {}", category),
            categorypath: path.to_string(),
        }
    }

    fn pstudent(id: i64, completions: Vec<CompletionRecord>) -> ProgressStudent {
        ProgressStudent {
            id,
            name: format!("Student {}", id),
            email: String::new(),
            lastaccess: 0,
            engagement_score: 0,
            completions,
        }
    }

    fn dataset() -> CrossCourseProgress {
        CrossCourseProgress {
            courses: vec![
                pcourse(1, 1, "/1"),
                pcourse(2, 2, "/1/2"),
                pcourse(3, 3, "/1/2/3"),
                pcourse(4, 4, "/4"),
            ],
            students: vec![
                pstudent(10, vec![
                    CompletionRecord::new(1, true, true),
                    CompletionRecord::new(2, true, false),
                    CompletionRecord::new(3, false, false),
                    CompletionRecord::new(4, false, false),
                ]),
                pstudent(11, vec![
                    CompletionRecord::new(1, false, false),
                    CompletionRecord::new(2, false, false),
                    CompletionRecord::new(3, true, true),
                    CompletionRecord::new(4, true, false),
                ]),
            ],
        }
    }

    #[test]
    fn tree_descendants_follow_links() {
        let tree = CategoryTree::from_categories(&[
            category(1, 0, "/1"),
            category(2, 1, "/1/2"),
            category(3, 2, "/1/2/3"),
            category(4, 0, "/4"),
        ]);
        assert_eq!(tree.descendants(1), HashSet::from([2, 3]));
        assert_eq!(tree.subtree(2), HashSet::from([2, 3]));
        assert!(tree.is_descendant(3, 1));
        assert!(!tree.is_descendant(1, 1));
        assert!(!tree.is_descendant(4, 1));
        assert_eq!(tree.name(99), UNKNOWN_CATEGORY);
        assert_eq!(tree.path(99), "");
    }

    #[test]
    fn tree_from_paths_matches_tree_from_rows() {
        let data = dataset();
        let tree = CategoryTree::from_course_paths(&data.courses);
        assert_eq!(tree.descendants(1), HashSet::from([2, 3]));
        assert_eq!(tree.get(3).map(|n| n.parent), Some(2));
        assert_eq!(tree.name(2), "Cat 2");
    }

    #[test]
    fn category_without_subtree_excludes_descendant_courses() {
        let data = dataset();
        let tree = CategoryTree::from_course_paths(&data.courses);
        let filter = ProgressFilter {
            category_id: Some(1),
            ..Default::default()
        };

        let filtered = filter.apply(&data, &tree);
        let ids: Vec<i64> = filtered.courses.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn subtree_only_includes_checked_subcategories() {
        let data = dataset();
        let tree = CategoryTree::from_course_paths(&data.courses);
        let filter = ProgressFilter {
            category_id: Some(1),
            include_subcategories: true,
            selected_subcategories: BTreeSet::from([3]),
            ..Default::default()
        };

        let ids: Vec<i64> = filter.apply(&data, &tree).courses.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn status_matches_any_visible_course() {
        let data = dataset();
        let tree = CategoryTree::from_course_paths(&data.courses);

        let completed = ProgressFilter {
            status: Some(StatusFilter::Completed),
            ..Default::default()
        };
        assert_eq!(completed.apply(&data, &tree).students.len(), 2);

        let completed_in_first = ProgressFilter {
            course_id: Some(1),
            status: Some(StatusFilter::Completed),
            ..Default::default()
        };
        let students = completed_in_first.apply(&data, &tree).students;
        assert_eq!(students.iter().map(|s| s.id).collect::<Vec<_>>(), vec![10]);

        let pending_in_first = ProgressFilter {
            course_id: Some(1),
            status: Some(StatusFilter::NotCompleted),
            ..Default::default()
        };
        assert!(pending_in_first.apply(&data, &tree).students.is_empty());
    }

    #[test]
    fn filtering_is_idempotent() {
        let data = dataset();
        let tree = CategoryTree::from_course_paths(&data.courses);
        let filter = ProgressFilter {
            category_id: Some(1),
            include_subcategories: true,
            selected_subcategories: BTreeSet::from([2, 3]),
            status: Some(StatusFilter::Enrolled),
            ..Default::default()
        };

        let once = filter.apply(&data, &tree);
        let twice = filter.apply(&data, &tree);
        assert_eq!(once, twice);
        assert_eq!(filter.apply(&once, &tree), once);
    }

    #[test]
    fn subcategory_options_list_descendants_with_courses() {
        let data = dataset();
        let tree = CategoryTree::from_course_paths(&data.courses);
        let options = subcategory_options(&data, &tree, 1);
        assert_eq!(options.iter().map(|o| o.id).collect::<Vec<_>>(), vec![2, 3]);
        assert!(subcategory_options(&data, &tree, 4).is_empty());
    }

    #[test]
    fn scope_prefers_course_over_category() {
        let tree = CategoryTree::from_categories(&[category(1, 0, "/1"), category(2, 1, "/1/2")]);
        let courses = vec![
            Course { id: 1, fullname: "A".into(), shortname: "A".into(), category: 1 },
            Course { id: 2, fullname: "B".into(), shortname: "B".into(), category: 2 },
            Course { id: 3, fullname: "C".into(), shortname: "C".into(), category: 7 },
        ];

        let by_course = resolve_course_scope(&courses, &tree, Some(1), Some(3), true);
        assert_eq!(by_course.iter().map(|c| c.id).collect::<Vec<_>>(), vec![3]);

        let subtree = resolve_course_scope(&courses, &tree, Some(1), None, true);
        assert_eq!(subtree.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 2]);

        let exact = resolve_course_scope(&courses, &tree, Some(1), None, false);
        assert_eq!(exact.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1]);

        assert_eq!(resolve_course_scope(&courses, &tree, None, None, true).len(), 3);
    }

    #[test]
    fn status_parses_wire_names() {
        assert_eq!("not_completed".parse::<StatusFilter>(), Ok(StatusFilter::NotCompleted));
        assert!("done".parse::<StatusFilter>().is_err());
    }
}
