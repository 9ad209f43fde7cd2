use async_trait::async_trait;
use scholar_core::rag::{Course, SearchBackend, SearchError};
use scholar_tool::{Result, Source, Tool, ToolError, ToolOutput};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Returns the title, link, instructor and lesson list of a course.
pub struct CourseOutlineTool {
    backend: Arc<dyn SearchBackend>,
}

#[derive(Debug, Deserialize)]
struct OutlineParams {
    course_name: String,
}

impl CourseOutlineTool {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for CourseOutlineTool {
    fn name(&self) -> &str {
        "get_course_outline"
    }

    fn description(&self) -> &str {
        "Get a course's title, link, instructor and complete lesson list"
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "required": ["course_name"],
            "properties": {
                "course_name": {
                    "type": "string",
                    "description": "Course title (partial matches work)"
                }
            }
        })
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput> {
        let params: OutlineParams = serde_json::from_value(input)
            .map_err(|e| ToolError::InvalidInput(format!("Invalid parameters: {}", e)))?;

        let course = match self.backend.course_outline(&params.course_name).await {
            Ok(course) => course,
            Err(SearchError::NotFound(message)) => return Ok(ToolOutput::new(message)),
            Err(e) => return Err(ToolError::ExecutionFailed(e.to_string())),
        };

        let mut source = Source::new(&course.title);
        if let Some(link) = &course.link {
            source = source.with_link(link);
        }

        Ok(ToolOutput::new(format_outline(&course))
            .with_sources(vec![source]))
    }
}

fn format_outline(course: &Course) -> String {
    let mut lines = vec![format!("Course: {}", course.title)];
    if let Some(link) = &course.link {
        lines.push(format!("Link: {}", link));
    }
    if let Some(instructor) = &course.instructor {
        lines.push(format!("Instructor: {}", instructor));
    }

    lines.push(format!("Lessons ({}):", course.lessons.len()));
    for lesson in &course.lessons {
        lines.push(format!("  Lesson {}: {}", lesson.number, lesson.title));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholar_core::rag::{Lesson, SearchHit, SearchQuery};

    struct OneCourse;

    #[async_trait]
    impl SearchBackend for OneCourse {
        async fn search(&self, _query: &SearchQuery) -> scholar_core::rag::Result<Vec<SearchHit>> {
            Ok(Vec::new())
        }

        async fn course_outline(&self, course_name: &str) -> scholar_core::rag::Result<Course> {
            if !"Building Towards Computer Use".to_lowercase().contains(&course_name.to_lowercase()) {
                return Err(SearchError::NotFound(format!("No course found matching '{}'", course_name)));
            }
            Ok(Course {
                title: "Building Towards Computer Use".to_string(),
                link: Some("https://example.com/computer-use".to_string()),
                instructor: Some("Colt Steele".to_string()),
                lessons: vec![
                    Lesson { number: 0, title: "Introduction".to_string(), link: None },
                    Lesson { number: 1, title: "Overview".to_string(), link: None },
                ],
            })
        }
    }

    #[tokio::test]
    async fn test_outline_lists_lessons() {
        let tool = CourseOutlineTool::new(Arc::new(OneCourse));
        let output = tool
            .execute(serde_json::json!({"course_name": "computer use"}))
            .await
            .unwrap();

        assert!(output.content.starts_with("Course: Building Towards Computer Use\n"));
        assert!(output.content.contains("Instructor: Colt Steele"));
        assert!(output.content.contains("Lessons (2):\n  Lesson 0: Introduction\n  Lesson 1: Overview"));
        assert_eq!(output.sources.len(), 1);
        assert_eq!(output.sources[0].location, None);
        assert_eq!(output.sources[0].link.as_deref(), Some("https://example.com/computer-use"));
    }

    #[tokio::test]
    async fn test_unknown_course_is_content() {
        let tool = CourseOutlineTool::new(Arc::new(OneCourse));
        let output = tool
            .execute(serde_json::json!({"course_name": "Cooking"}))
            .await
            .unwrap();
        assert_eq!(output.content, "No course found matching 'Cooking'");
        assert!(output.sources.is_empty());
    }
}
