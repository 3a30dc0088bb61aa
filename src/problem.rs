//! Problem data model and the external datastore boundary
//!
//! The judging core only reads problem records; they are owned by the
//! surrounding platform. `ProblemStore` is the seam through which the
//! coordinator loads problems and resolves the featured ("daily")
//! problem for reward settlement.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Score awarded for a first solve when the problem record carries
    /// no explicit score.
    pub fn default_score(&self) -> u32 {
        match self {
            Difficulty::Easy => 10,
            Difficulty::Medium => 30,
            Difficulty::Hard => 50,
        }
    }
}

/// A test input or expected output, stored either as a literal string or
/// as already-parsed JSON. Both forms reduce to the same text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IoValue {
    Text(String),
    Json(serde_json::Value),
}

impl IoValue {
    pub fn as_text(&self) -> String {
        match self {
            IoValue::Text(s) => s.clone(),
            IoValue::Json(v) => serde_json::to_string(v).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: IoValue,
    pub output: IoValue,
}

/// Semantic type of one callable parameter, used by the driver generator
/// for argument coercion.
///
/// Unknown type names degrade to `Json` (plain pass-through) so old
/// problem records never fail to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Integer,
    Float,
    String,
    Boolean,
    Array,
    ListNode,
    Json,
}

impl ParamType {
    pub fn wire_name(&self) -> &'static str {
        match self {
            ParamType::Integer => "integer",
            ParamType::Float => "float",
            ParamType::String => "string",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::ListNode => "ListNode",
            ParamType::Json => "json",
        }
    }
}

impl Serialize for ParamType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.wire_name())
    }
}

impl<'de> Deserialize<'de> for ParamType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = std::string::String::deserialize(deserializer)?;
        Ok(match name.as_str() {
            "integer" | "int" => ParamType::Integer,
            "float" | "double" => ParamType::Float,
            "string" => ParamType::String,
            "boolean" | "bool" => ParamType::Boolean,
            "array" => ParamType::Array,
            "ListNode" => ParamType::ListNode,
            _ => ParamType::Json,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
}

/// Callable contract of a problem: the method to invoke and its ordered,
/// typed parameter list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemMeta {
    pub name: String,
    pub params: Vec<Param>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub id: i64,
    pub title: String,
    pub difficulty: Difficulty,
    /// Explicit score; difficulty default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(default)]
    pub starter_code: HashMap<String, String>,
    /// Visible test cases, used for "run".
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    /// Hidden test cases, used for "submit". Falls back to the visible
    /// set when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_test_cases: Option<Vec<TestCase>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ProblemMeta>,
    #[serde(default)]
    pub is_featured: bool,
}

impl Problem {
    pub fn effective_score(&self) -> u32 {
        self.score.unwrap_or_else(|| self.difficulty.default_score())
    }
}

#[async_trait]
pub trait ProblemStore: Send + Sync {
    async fn load_problem(&self, id: i64) -> Result<Option<Problem>>;

    /// Id of today's featured problem, if any.
    async fn featured_problem_id(&self) -> Result<Option<i64>>;
}

#[derive(Debug, Deserialize)]
struct ProblemsFile {
    problems: Vec<Problem>,
}

/// Flat-file problem store. Reads the file on every call so edits are
/// picked up without a restart.
pub struct JsonProblemStore {
    path: PathBuf,
}

impl JsonProblemStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn load_all(&self) -> Result<Vec<Problem>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read problems file {:?}", self.path))?;
        let file: ProblemsFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse problems file {:?}", self.path))?;
        Ok(file.problems)
    }
}

#[async_trait]
impl ProblemStore for JsonProblemStore {
    async fn load_problem(&self, id: i64) -> Result<Option<Problem>> {
        let problems = self.load_all().await?;
        Ok(problems.into_iter().find(|p| p.id == id))
    }

    async fn featured_problem_id(&self) -> Result<Option<i64>> {
        let problems = self.load_all().await?;
        let featured = problems.iter().find(|p| p.is_featured).map(|p| p.id);
        // Fall back to the first problem, matching the original platform
        Ok(featured.or_else(|| problems.first().map(|p| p.id)))
    }
}

/// In-memory store for tests.
#[cfg(test)]
pub struct MemoryProblemStore {
    problems: Vec<Problem>,
    featured: Option<i64>,
}

#[cfg(test)]
impl MemoryProblemStore {
    pub fn new(problems: Vec<Problem>, featured: Option<i64>) -> Self {
        Self { problems, featured }
    }
}

#[cfg(test)]
#[async_trait]
impl ProblemStore for MemoryProblemStore {
    async fn load_problem(&self, id: i64) -> Result<Option<Problem>> {
        Ok(self.problems.iter().find(|p| p.id == id).cloned())
    }

    async fn featured_problem_id(&self) -> Result<Option<i64>> {
        Ok(self.featured)
    }
}
