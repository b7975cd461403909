use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Descriptive metadata carried alongside a chunk's text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Where the chunk came from: a file path or document name.
    #[serde(default)]
    pub location: String,
    /// Kind of chunk (`function`, `class`, `paragraph`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Source language for code, or document type for prose.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Symbol name, when the chunk is a named code unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    /// Page number for paginated documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Any other fields present in the corpus record.
    #[serde(default, flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ChunkMetadata {
    /// Looks up a metadata field by name, covering both typed and extra fields.
    pub fn field(&self, key: &str) -> Option<serde_json::Value> {
        use serde_json::Value;
        match key {
            "location" => Some(Value::from(self.location.clone())),
            "kind" => self.kind.clone().map(Value::from),
            "language" => self.language.clone().map(Value::from),
            "name" => self.name.clone().map(Value::from),
            "start_line" => self.start_line.map(Value::from),
            "end_line" => self.end_line.map(Value::from),
            "page" => self.page.map(Value::from),
            other => self.extra.get(other).cloned(),
        }
    }
}

/// A hydrated retrieval hit: full text plus metadata.
///
/// Produced fresh for every retrieval call and never mutated by the engine
/// after it is handed out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: ChunkMetadata,
    /// Score from rank fusion, when the chunk went through fusion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fused_score: Option<f64>,
    /// Score assigned by the precision reranker, when one ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

impl Chunk {
    /// Creates an unscored chunk.
    pub fn new(id: impl Into<String>, text: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata,
            fused_score: None,
            rerank_score: None,
        }
    }

    /// Best available relevance: rerank score, else fused score, else zero.
    pub fn relevance(&self) -> f64 {
        self.rerank_score
            .map(f64::from)
            .or(self.fused_score)
            .unwrap_or(0.0)
    }
}

/// Equality filter over chunk metadata, e.g. `{"language": "rust"}`.
///
/// A chunk passes when every key is present in its metadata with an equal value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter(pub HashMap<String, serde_json::Value>);

impl SearchFilter {
    /// Filter requiring a single field to equal `value`.
    pub fn eq(key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        let mut map = HashMap::new();
        map.insert(key.into(), value.into());
        Self(map)
    }

    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        self.0
            .iter()
            .all(|(key, expected)| metadata.field(key).as_ref() == Some(expected))
    }
}
