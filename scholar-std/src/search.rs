use async_trait::async_trait;
use scholar_core::rag::{SearchBackend, SearchError, SearchHit, SearchQuery};
use scholar_tool::{Result, Source, Tool, ToolError, ToolOutput};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Semantic search over course content, optionally narrowed to one course
/// or lesson.
pub struct CourseSearchTool {
    backend: Arc<dyn SearchBackend>,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: String,
    course_name: Option<String>,
    lesson_number: Option<u32>,
}

impl CourseSearchTool {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn name(&self) -> &str {
        "search_course_content"
    }

    fn description(&self) -> &str {
        "Search course materials with smart course name matching and lesson filtering"
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to search for in the course content"
                },
                "course_name": {
                    "type": "string",
                    "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                },
                "lesson_number": {
                    "type": "integer",
                    "description": "Specific lesson number to search within (e.g. 1, 2, 3)"
                }
            }
        })
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput> {
        let params: SearchParams = serde_json::from_value(input)
            .map_err(|e| ToolError::InvalidInput(format!("Invalid parameters: {}", e)))?;

        let mut query = SearchQuery::new(&params.query);
        if let Some(course) = &params.course_name {
            query = query.in_course(course);
        }
        if let Some(lesson) = params.lesson_number {
            query = query.in_lesson(lesson);
        }

        let hits = match self.backend.search(&query).await {
            Ok(hits) => hits,
            // The model can recover from a bad filter, so it sees the message.
            Err(SearchError::NotFound(message)) => return Ok(ToolOutput::new(message)),
            Err(e) => return Err(ToolError::ExecutionFailed(e.to_string())),
        };

        if hits.is_empty() {
            return Ok(ToolOutput::new(no_results_message(&params)));
        }

        let content = hits
            .iter()
            .map(format_hit)
            .collect::<Vec<_>>()
            .join("\n\n");
        let sources = hits.iter().map(hit_source).collect();

        Ok(ToolOutput::new(content)
            .with_sources(sources))
    }
}

fn no_results_message(params: &SearchParams) -> String {
    let mut message = String::from("No relevant content found");
    if let Some(course) = &params.course_name {
        message.push_str(&format!(" in course '{}'", course));
    }
    if let Some(lesson) = params.lesson_number {
        message.push_str(&format!(" in lesson {}", lesson));
    }
    message.push('.');
    message
}

fn format_hit(hit: &SearchHit) -> String {
    match hit.lesson_number {
        Some(lesson) => format!("[{} - Lesson {}]\n{}", hit.course_title, lesson, hit.content),
        None => format!("[{}]\n{}", hit.course_title, hit.content),
    }
}

fn hit_source(hit: &SearchHit) -> Source {
    let mut source = Source::new(&hit.course_title);
    if let Some(lesson) = hit.lesson_number {
        source = source.with_location(format!("Lesson {}", lesson));
    }
    if let Some(link) = &hit.lesson_link {
        source = source.with_link(link);
    }
    source
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholar_core::rag::Course;
    use std::sync::Mutex;

    /// Returns canned hits and remembers the last query.
    #[derive(Default)]
    struct FakeBackend {
        hits: Vec<SearchHit>,
        fail: Option<&'static str>,
        last: Mutex<Option<SearchQuery>>,
    }

    #[async_trait]
    impl SearchBackend for FakeBackend {
        async fn search(&self, query: &SearchQuery) -> scholar_core::rag::Result<Vec<SearchHit>> {
            *self.last.lock().unwrap() = Some(query.clone());
            match self.fail {
                Some("missing") => Err(SearchError::NotFound("No course found matching 'Nope'".to_string())),
                Some(other) => Err(SearchError::Backend(other.to_string())),
                None => Ok(self.hits.clone()),
            }
        }

        async fn course_outline(&self, course_name: &str) -> scholar_core::rag::Result<Course> {
            Err(SearchError::NotFound(course_name.to_string()))
        }
    }

    fn hit(lesson: Option<u32>, content: &str) -> SearchHit {
        SearchHit {
            content: content.to_string(),
            course_title: "Course X".to_string(),
            lesson_number: lesson,
            lesson_link: lesson.map(|n| format!("https://example.com/x/{}", n)),
            score: 0.9,
        }
    }

    #[tokio::test]
    async fn test_formats_hits_and_sources() {
        let backend = Arc::new(FakeBackend {
            hits: vec![hit(Some(4), "Stacks and queues"), hit(None, "Intro text")],
            ..Default::default()
        });
        let tool = CourseSearchTool::new(backend.clone());

        let output = tool
            .execute(serde_json::json!({"query": "data structures", "course_name": "X", "lesson_number": 4}))
            .await
            .unwrap();

        assert_eq!(
            output.content,
            "[Course X - Lesson 4]\nStacks and queues\n\n[Course X]\nIntro text"
        );
        assert_eq!(output.sources.len(), 2);
        assert_eq!(output.sources[0].location.as_deref(), Some("Lesson 4"));
        assert_eq!(output.sources[0].link.as_deref(), Some("https://example.com/x/4"));

        let query = backend.last.lock().unwrap().clone().unwrap();
        assert_eq!(query.course_name.as_deref(), Some("X"));
        assert_eq!(query.lesson_number, Some(4));
    }

    #[tokio::test]
    async fn test_empty_results_message() {
        let tool = CourseSearchTool::new(Arc::new(FakeBackend::default()));

        let output = tool
            .execute(serde_json::json!({"query": "q", "course_name": "MCP", "lesson_number": 2}))
            .await
            .unwrap();
        assert_eq!(output.content, "No relevant content found in course 'MCP' in lesson 2.");
        assert!(output.sources.is_empty());

        let output = tool.execute(serde_json::json!({"query": "q"})).await.unwrap();
        assert_eq!(output.content, "No relevant content found.");
    }

    #[tokio::test]
    async fn test_unknown_course_is_content() {
        let tool = CourseSearchTool::new(Arc::new(FakeBackend {
            fail: Some("missing"),
            ..Default::default()
        }));

        let output = tool
            .execute(serde_json::json!({"query": "q", "course_name": "Nope"}))
            .await
            .unwrap();
        assert_eq!(output.content, "No course found matching 'Nope'");
    }

    #[tokio::test]
    async fn test_backend_failure_is_error() {
        let tool = CourseSearchTool::new(Arc::new(FakeBackend {
            fail: Some("connection refused"),
            ..Default::default()
        }));

        let err = tool.execute(serde_json::json!({"query": "q"})).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed(msg) if msg.contains("connection refused")));
    }

    #[tokio::test]
    async fn test_missing_query_rejected() {
        let tool = CourseSearchTool::new(Arc::new(FakeBackend::default()));
        let err = tool.execute(serde_json::json!({"course_name": "X"})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}
