use crate::catalog::CatalogStore;
use crate::chat::{ToolCall, ToolDefinition};
use crate::config::ResolverConfig;
use crate::resolver::TitleResolver;
use crate::{ModelError, TitleMatch};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

pub const GET_SUMMARY_BY_TITLE: &str = "get_summary_by_title";

const SUMMARY_TOOL_DESCRIPTION: &str = "Return the full summary of one book from the local catalog. \
Pass the exact book title as it appears in the retrieved context; \
approximate titles are only tolerated as a fallback.";

/// A validated tool invocation. Every tool the model may call is a variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolRequest {
    GetSummaryByTitle { requested_title: String },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SummaryArguments {
    #[serde(alias = "title")]
    requested_title: String,
}

impl ToolRequest {
    pub fn parse(name: &str, arguments: &str) -> Result<Self, ModelError> {
        match name {
            GET_SUMMARY_BY_TITLE => {
                let arguments = if arguments.trim().is_empty() {
                    "{}"
                } else {
                    arguments
                };
                let parsed: SummaryArguments = serde_json::from_str(arguments)
                    .map_err(|error| ModelError::InvalidArguments(format!("{name}: {error}")))?;

                if parsed.requested_title.trim().is_empty() {
                    return Err(ModelError::InvalidArguments(format!(
                        "{name}: requested_title is empty"
                    )));
                }

                Ok(Self::GetSummaryByTitle {
                    requested_title: parsed.requested_title,
                })
            }
            other => Err(ModelError::UnknownTool(other.to_string())),
        }
    }

    pub fn from_call(call: &ToolCall) -> Result<Self, ModelError> {
        Self::parse(&call.function.name, &call.function.arguments)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::GetSummaryByTitle { .. } => GET_SUMMARY_BY_TITLE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Found {
        matched: TitleMatch,
        full_summary: String,
    },
    NotFound {
        requested_title: String,
    },
}

impl ToolResult {
    /// Text handed back to the model as the tool message.
    pub fn to_tool_content(&self) -> String {
        match self {
            Self::Found { full_summary, .. } => full_summary.clone(),
            Self::NotFound { requested_title } => format!("title not found: {requested_title}"),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

pub struct SummaryTool {
    catalog: Arc<CatalogStore>,
    resolver: TitleResolver,
}

impl SummaryTool {
    pub fn new(catalog: Arc<CatalogStore>, config: ResolverConfig) -> Self {
        let resolver = TitleResolver::from_catalog(&catalog, config);
        Self { catalog, resolver }
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::function(
            GET_SUMMARY_BY_TITLE,
            SUMMARY_TOOL_DESCRIPTION,
            json!({
                "type": "object",
                "properties": {
                    "requested_title": {
                        "type": "string",
                        "description": "Exact title of the chosen book, copied from the context."
                    }
                },
                "required": ["requested_title"],
                "additionalProperties": false
            }),
        )
    }

    pub fn get_summary_by_title(&self, requested_title: &str) -> ToolResult {
        let record = self.resolver.resolve(requested_title).and_then(|matched| {
            self.catalog
                .lookup_exact(&matched.title)
                .map(|record| (matched, record.full_summary.clone()))
        });

        match record {
            Some((matched, full_summary)) => {
                debug!(
                    requested_title,
                    title = %matched.title,
                    method = ?matched.method,
                    score = matched.score,
                    "title resolved"
                );
                ToolResult::Found {
                    matched,
                    full_summary,
                }
            }
            None => ToolResult::NotFound {
                requested_title: requested_title.to_string(),
            },
        }
    }
}

/// Fixed dispatcher for the tools declared to the model.
pub struct ToolDispatcher {
    summary: SummaryTool,
}

impl ToolDispatcher {
    pub fn new(summary: SummaryTool) -> Self {
        Self { summary }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        vec![SummaryTool::definition()]
    }

    pub fn execute(&self, request: &ToolRequest) -> ToolResult {
        match request {
            ToolRequest::GetSummaryByTitle { requested_title } => {
                self.summary.get_summary_by_title(requested_title)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::FunctionCall;
    use crate::{BookRecord, MatchMethod};

    fn catalog() -> Arc<CatalogStore> {
        let books = [
            ("1984", "Winston Smith rebels against the Party."),
            ("The Hobbit", "Bilbo Baggins joins thirteen dwarves."),
            ("Dune", "Paul Atreides is exiled to Arrakis."),
            ("Brave New World", "A World State engineered for stability."),
        ];
        Arc::new(CatalogStore::from_records(books.into_iter().map(
            |(title, full_summary)| BookRecord {
                title: title.to_string(),
                short_summary: String::new(),
                themes: Vec::new(),
                full_summary: full_summary.to_string(),
            },
        )))
    }

    fn tool() -> SummaryTool {
        SummaryTool::new(catalog(), ResolverConfig::default())
    }

    #[test]
    fn every_title_variant_returns_the_stored_summary() {
        let catalog = catalog();
        let tool = SummaryTool::new(catalog.clone(), ResolverConfig::default());

        for record in catalog.records() {
            let title = record.title.as_str();
            for variant in [
                title.to_string(),
                title.to_lowercase(),
                title.to_uppercase(),
                format!("  {title}  "),
            ] {
                match tool.get_summary_by_title(&variant) {
                    ToolResult::Found {
                        matched,
                        full_summary,
                    } => {
                        assert_eq!(matched.title, title);
                        assert_eq!(full_summary, record.full_summary);
                    }
                    other => panic!("{variant:?} should resolve, got {other:?}"),
                }
            }
        }
    }

    #[test]
    fn unknown_title_is_reported_not_raised() {
        let result = tool().get_summary_by_title("Moby Dick");
        assert_eq!(
            result,
            ToolResult::NotFound {
                requested_title: "Moby Dick".to_string()
            }
        );
        assert_eq!(result.to_tool_content(), "title not found: Moby Dick");
    }

    #[test]
    fn noisy_title_maps_to_canonical_record() {
        match tool().get_summary_by_title("the hobit") {
            ToolResult::Found { matched, .. } => {
                assert_eq!(matched.title, "The Hobbit");
                assert_eq!(matched.method, MatchMethod::Fuzzy);
            }
            other => panic!("typo should resolve, got {other:?}"),
        }
    }

    #[test]
    fn requests_are_parsed_and_validated() {
        assert_eq!(
            ToolRequest::parse(GET_SUMMARY_BY_TITLE, r#"{"requested_title":"1984"}"#).ok(),
            Some(ToolRequest::GetSummaryByTitle {
                requested_title: "1984".to_string()
            })
        );
        assert_eq!(
            ToolRequest::parse(GET_SUMMARY_BY_TITLE, r#"{"title":"Dune"}"#).ok(),
            Some(ToolRequest::GetSummaryByTitle {
                requested_title: "Dune".to_string()
            })
        );
        assert!(matches!(
            ToolRequest::parse("delete_catalog", "{}"),
            Err(ModelError::UnknownTool(name)) if name == "delete_catalog"
        ));
        assert!(matches!(
            ToolRequest::parse(GET_SUMMARY_BY_TITLE, "not json"),
            Err(ModelError::InvalidArguments(_))
        ));
        assert!(matches!(
            ToolRequest::parse(GET_SUMMARY_BY_TITLE, ""),
            Err(ModelError::InvalidArguments(_))
        ));
        assert!(matches!(
            ToolRequest::parse(GET_SUMMARY_BY_TITLE, r#"{"requested_title":"  "}"#),
            Err(ModelError::InvalidArguments(_))
        ));
    }

    #[test]
    fn arguments_outside_the_declared_schema_are_rejected() {
        let definition = SummaryTool::definition();
        assert_eq!(
            definition.function.parameters["additionalProperties"],
            serde_json::Value::Bool(false)
        );
        assert!(matches!(
            ToolRequest::parse(
                GET_SUMMARY_BY_TITLE,
                r#"{"requested_title":"1984","author":"Orwell"}"#
            ),
            Err(ModelError::InvalidArguments(message)) if message.contains("author")
        ));
    }

    #[test]
    fn dispatcher_declares_and_runs_the_summary_tool() -> Result<(), ModelError> {
        let dispatcher = ToolDispatcher::new(tool());
        let definitions = dispatcher.definitions();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].function.name, GET_SUMMARY_BY_TITLE);
        assert_eq!(
            definitions[0].function.parameters["required"][0],
            "requested_title"
        );

        let call = ToolCall {
            id: "call_1".to_string(),
            kind: "function".to_string(),
            function: FunctionCall {
                name: GET_SUMMARY_BY_TITLE.to_string(),
                arguments: r#"{"requested_title":"DUNE"}"#.to_string(),
            },
        };
        let request = ToolRequest::from_call(&call)?;
        assert_eq!(request.name(), GET_SUMMARY_BY_TITLE);

        let result = dispatcher.execute(&request);
        assert!(result.is_found());
        assert_eq!(result.to_tool_content(), "Paul Atreides is exiled to Arrakis.");
        Ok(())
    }

    #[test]
    fn shipped_sample_data_resolves_cleanly() -> Result<(), Box<dyn std::error::Error>> {
        use crate::ingest::{load_book_summaries, DEFAULT_SHORT_SUMMARIES_PATH};
        use crate::catalog::DEFAULT_FULL_SUMMARIES_PATH;
        use crate::IngestionOptions;
        use std::path::Path;

        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
        let report = load_book_summaries(
            &root.join(DEFAULT_SHORT_SUMMARIES_PATH),
            &IngestionOptions::default(),
        )?;
        assert!(report.skipped_blocks.is_empty());

        let catalog = Arc::new(CatalogStore::load(
            &root.join(DEFAULT_FULL_SUMMARIES_PATH),
            &report.entries,
        )?);
        assert_eq!(catalog.len(), report.entries.len());
        assert!(catalog.records().all(|record| !record.short_summary.is_empty()));

        let tool = SummaryTool::new(catalog, ResolverConfig::default());
        for (requested, expected) in [
            ("1984", "1984"),
            ("the great gatsby", "The Great Gatsby"),
            ("Hobbit", "The Hobbit"),
            ("The Hobit", "The Hobbit"),
            ("Lord of the Rings", "The Lord of the Rings"),
            ("Harry Potter", "Harry Potter and the Sorcerer's Stone"),
        ] {
            match tool.get_summary_by_title(requested) {
                ToolResult::Found { matched, .. } => assert_eq!(matched.title, expected),
                ToolResult::NotFound { .. } => panic!("{requested} should resolve"),
            }
        }
        assert!(!tool.get_summary_by_title("Moby Dick").is_found());
        assert!(!tool.get_summary_by_title("Nineteen Eighty Four").is_found());
        Ok(())
    }
}
