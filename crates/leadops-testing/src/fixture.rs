//! Contract fixture loader.
//!
//! Each file at `contracts/http/{service}/{id}.json` describes one HTTP
//! assertion: the request to send and the expected response.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

/// A single HTTP contract assertion.
#[derive(Debug, Clone, Deserialize)]
pub struct Fixture {
    pub service: String,
    pub id: String,
    pub description: String,
    pub request: FixtureRequest,
    pub expect: FixtureExpect,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureRequest {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureExpect {
    pub status: u16,
    /// Expected body fields (subset match, extra fields are allowed).
    pub body: Option<Value>,
}

impl Fixture {
    /// Load and parse a fixture file at `workspace_root/relative_path`.
    ///
    /// Panics if the file is missing or invalid.
    pub fn load(relative_path: &str) -> Self {
        let full_path = workspace_root().join(relative_path);
        let contents = std::fs::read_to_string(&full_path)
            .unwrap_or_else(|e| panic!("fixture not found at {}: {}", full_path.display(), e));
        serde_json::from_str(&contents)
            .unwrap_or_else(|e| panic!("invalid fixture {}: {}", relative_path, e))
    }

    /// Check `actual` against `expect.body`. Returns the mismatching paths.
    pub fn body_mismatches(&self, actual: &Value) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(expected) = &self.expect.body {
            collect_mismatches("$", expected, actual, &mut out);
        }
        out
    }
}

fn collect_mismatches(path: &str, expected: &Value, actual: &Value, out: &mut Vec<String>) {
    match (expected, actual) {
        (Value::Object(exp), Value::Object(act)) => {
            for (key, exp_val) in exp {
                let child = format!("{path}.{key}");
                match act.get(key) {
                    Some(act_val) => collect_mismatches(&child, exp_val, act_val, out),
                    None => out.push(format!("{child}: missing")),
                }
            }
        }
        _ if expected == actual => {}
        _ => out.push(format!("{path}: expected {expected}, got {actual}")),
    }
}

/// Walk up from the crate dir to the directory holding the workspace `Cargo.lock`
/// (or the top-level `Cargo.toml` with a `[workspace]` table).
fn workspace_root() -> PathBuf {
    let start = std::env::var("CARGO_MANIFEST_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::current_dir().unwrap());
    start
        .ancestors()
        .find(|dir| is_workspace_root(dir))
        .unwrap_or(start.as_path())
        .to_path_buf()
}

fn is_workspace_root(dir: &Path) -> bool {
    dir.join("Cargo.lock").exists()
        || std::fs::read_to_string(dir.join("Cargo.toml"))
            .map(|manifest| manifest.contains("[workspace]"))
            .unwrap_or(false)
}
