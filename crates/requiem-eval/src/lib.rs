// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! requiem-eval
#![deny(unsafe_code)]
#![warn(missing_docs)]

use requiem_error::{ErrorCode, RequiemError};
use requiem_id::{Environment, TenantRole};
use requiem_types::InvocationContext;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tracing::warn;

/// How a case's actual output is judged against its expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalMethod {
    /// Actual must equal `expected` exactly (after canonicalization).
    ExactMatch,
    /// Actual must validate against `expected` treated as a JSON Schema.
    SchemaValid,
    /// `expected` must appear as a value somewhere within actual.
    Contains,
    /// Judged by caller-supplied logic outside this crate's diffing.
    Custom,
}

/// One evaluation case loaded from the cases directory.
#[derive(Debug, Clone, Deserialize)]
pub struct EvalCase {
    /// Stable identifier for this case.
    pub id: String,
    /// Human-readable description of what the case exercises.
    pub description: String,
    /// Tool name this case invokes.
    pub tool: String,
    /// Input to pass to the tool.
    pub input: Value,
    /// Expected output, interpreted per `eval_method`. Absent for `custom`
    /// cases that carry their own judging logic outside this crate.
    #[serde(default)]
    pub expected: Option<Value>,
    /// Judging method.
    pub eval_method: EvalMethod,
    /// Keys that must be present in actual output, independent of `expected`.
    #[serde(default)]
    pub required_keys: Vec<String>,
    /// Free-form labels for filtering case runs.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// An adversarial or tenant-isolation case: same shape as [`EvalCase`] but
/// judged by whether the executor fails with `expected_error_code`, not by
/// diffing a success value.
#[derive(Debug, Clone, Deserialize)]
pub struct AdversarialCase {
    /// Stable identifier for this case.
    pub id: String,
    /// Human-readable description of the violation being attempted.
    pub description: String,
    /// Tool name this case invokes.
    pub tool: String,
    /// Input to pass to the tool.
    pub input: Value,
    /// Error code the executor must fail with for this case to pass.
    pub expected_error_code: ErrorCode,
}

/// One entry in a structural diff between actual and expected JSON values.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffEntry {
    /// Dot/bracket path to the differing value, e.g. `"items[2].name"`.
    pub path: String,
    /// Human-readable description of the mismatch.
    pub message: String,
}

/// Path-wise structural diff: objects compared key by key, arrays compared
/// by index with a length mismatch recorded once rather than per index,
/// scalars compared by equality.
#[must_use]
pub fn structural_diff(actual: &Value, expected: &Value) -> Vec<DiffEntry> {
    let mut diffs = Vec::new();
    diff_at("$", actual, expected, &mut diffs);
    diffs
}

fn diff_at(path: &str, actual: &Value, expected: &Value, diffs: &mut Vec<DiffEntry>) {
    match (actual, expected) {
        (Value::Object(a), Value::Object(e)) => {
            for (key, expected_value) in e {
                let child_path = format!("{path}.{key}");
                match a.get(key) {
                    Some(actual_value) => diff_at(&child_path, actual_value, expected_value, diffs),
                    None => diffs.push(DiffEntry { path: child_path, message: "key missing from actual".to_string() }),
                }
            }
            for key in a.keys() {
                if !e.contains_key(key) {
                    diffs.push(DiffEntry { path: format!("{path}.{key}"), message: "unexpected key in actual".to_string() });
                }
            }
        }
        (Value::Array(a), Value::Array(e)) => {
            if a.len() != e.len() {
                diffs.push(DiffEntry {
                    path: path.to_string(),
                    message: format!("array length mismatch: actual {} vs expected {}", a.len(), e.len()),
                });
            }
            for (i, expected_item) in e.iter().enumerate() {
                if let Some(actual_item) = a.get(i) {
                    diff_at(&format!("{path}[{i}]"), actual_item, expected_item, diffs);
                }
            }
        }
        (a, e) if a == e => {}
        (a, e) => {
            diffs.push(DiffEntry { path: path.to_string(), message: format!("{a} != {e}") });
        }
    }
}

/// Whether `haystack` contains `needle` as a value anywhere in its tree.
#[must_use]
pub fn contains_value(haystack: &Value, needle: &Value) -> bool {
    if haystack == needle {
        return true;
    }
    match haystack {
        Value::Object(map) => map.values().any(|v| contains_value(v, needle)),
        Value::Array(items) => items.iter().any(|v| contains_value(v, needle)),
        _ => false,
    }
}

/// Outcome of running one [`EvalCase`].
#[derive(Debug, Clone)]
pub struct EvalOutcome {
    /// The case's id.
    pub case_id: String,
    /// Whether the case passed.
    pub passed: bool,
    /// Structural diff entries, populated only for failed `exact_match`
    /// cases with an actual output to compare.
    pub diff: Vec<DiffEntry>,
    /// Human-readable summary of the outcome.
    pub message: String,
}

/// A synthetic admin context for running eval cases, so cases never trip
/// role or capability checks that aren't themselves under test.
#[must_use]
pub fn synthetic_admin_context(trace_id: impl Into<String>) -> InvocationContext {
    InvocationContext::root("eval", trace_id, TenantRole::Admin, Environment::Test)
}

fn judge(case: &EvalCase, actual: &requiem_error::Result<Value>) -> EvalOutcome {
    let actual = match actual {
        Ok(v) => v,
        Err(err) => {
            return EvalOutcome {
                case_id: case.id.clone(),
                passed: false,
                diff: Vec::new(),
                message: format!("executor returned error: {}", err.message),
            }
        }
    };

    if !case.required_keys.is_empty() {
        if let Value::Object(map) = actual {
            let missing: Vec<&String> = case.required_keys.iter().filter(|k| !map.contains_key(k.as_str())).collect();
            if !missing.is_empty() {
                return EvalOutcome {
                    case_id: case.id.clone(),
                    passed: false,
                    diff: Vec::new(),
                    message: format!("missing required keys: {missing:?}"),
                };
            }
        }
    }

    match case.eval_method {
        EvalMethod::Custom => EvalOutcome {
            case_id: case.id.clone(),
            passed: true,
            diff: Vec::new(),
            message: "custom cases are judged by the caller outside structural diffing".to_string(),
        },
        EvalMethod::Contains => {
            let Some(expected) = &case.expected else {
                return EvalOutcome { case_id: case.id.clone(), passed: false, diff: Vec::new(), message: "contains case has no expected value".to_string() };
            };
            let passed = contains_value(actual, expected);
            EvalOutcome {
                case_id: case.id.clone(),
                passed,
                diff: Vec::new(),
                message: if passed { "contained".to_string() } else { "expected value not found in actual".to_string() },
            }
        }
        EvalMethod::SchemaValid => {
            let Some(schema) = &case.expected else {
                return EvalOutcome { case_id: case.id.clone(), passed: false, diff: Vec::new(), message: "schema_valid case has no schema".to_string() };
            };
            let validation = requiem_registry::validate_tool_schema(schema, actual);
            EvalOutcome {
                case_id: case.id.clone(),
                passed: validation.valid,
                diff: Vec::new(),
                message: if validation.valid { "schema valid".to_string() } else { validation.errors.join("; ") },
            }
        }
        EvalMethod::ExactMatch => {
            let Some(expected) = &case.expected else {
                return EvalOutcome { case_id: case.id.clone(), passed: false, diff: Vec::new(), message: "exact_match case has no expected value".to_string() };
            };
            let diff = structural_diff(actual, expected);
            EvalOutcome {
                case_id: case.id.clone(),
                passed: diff.is_empty(),
                message: if diff.is_empty() { "exact match".to_string() } else { format!("{} diff entries", diff.len()) },
                diff,
            }
        }
    }
}

/// Run every case sequentially against `executor`, in order.
pub fn run_cases(cases: &[EvalCase], mut executor: impl FnMut(&EvalCase) -> requiem_error::Result<Value>) -> Vec<EvalOutcome> {
    cases
        .iter()
        .map(|case| {
            let actual = executor(case);
            judge(case, &actual)
        })
        .collect()
}

/// Outcome of running one [`AdversarialCase`].
#[derive(Debug, Clone)]
pub struct AdversarialOutcome {
    /// The case's id.
    pub case_id: String,
    /// Whether the executor failed with the expected error code.
    pub passed: bool,
    /// Human-readable summary.
    pub message: String,
}

/// Run every adversarial/tenant-isolation case, asserting the executor
/// fails with each case's `expected_error_code` rather than succeeding.
pub fn run_adversarial_cases(
    cases: &[AdversarialCase],
    mut executor: impl FnMut(&AdversarialCase) -> requiem_error::Result<Value>,
) -> Vec<AdversarialOutcome> {
    cases
        .iter()
        .map(|case| match executor(case) {
            Ok(_) => AdversarialOutcome {
                case_id: case.id.clone(),
                passed: false,
                message: "expected a violation error but the call succeeded".to_string(),
            },
            Err(err) if err.code == case.expected_error_code => {
                AdversarialOutcome { case_id: case.id.clone(), passed: true, message: "violation correctly rejected".to_string() }
            }
            Err(err) => AdversarialOutcome {
                case_id: case.id.clone(),
                passed: false,
                message: format!("expected {:?}, got {:?}", case.expected_error_code, err.code),
            },
        })
        .collect()
}

/// Load every `*.json` file in `dir` as an [`EvalCase`], sorted by file
/// name for reproducible run order. Never writes to `dir`.
///
/// # Errors
///
/// Returns [`ErrorCode::InternalError`] if `dir` cannot be read or a case
/// file fails to parse.
pub fn load_cases_from_dir(dir: &Path) -> requiem_error::Result<Vec<EvalCase>> {
    load_json_files(dir)
}

/// Load every `*.json` file in `dir` as an [`AdversarialCase`].
///
/// # Errors
///
/// Returns [`ErrorCode::InternalError`] under the same conditions as
/// [`load_cases_from_dir`].
pub fn load_adversarial_cases_from_dir(dir: &Path) -> requiem_error::Result<Vec<AdversarialCase>> {
    load_json_files(dir)
}

fn load_json_files<T: for<'de> Deserialize<'de>>(dir: &Path) -> requiem_error::Result<Vec<T>> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .map_err(|e| RequiemError::new(ErrorCode::InternalError, format!("cannot read cases dir: {e}")))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    paths.sort();

    let mut cases = Vec::with_capacity(paths.len());
    for path in paths {
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| RequiemError::new(ErrorCode::InternalError, format!("cannot read case file {}: {e}", path.display())))?;
        match serde_json::from_str(&raw) {
            Ok(case) => cases.push(case),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unparseable eval case file");
                return Err(RequiemError::new(ErrorCode::InternalError, format!("invalid case file {}: {e}", path.display())));
            }
        }
    }
    Ok(cases)
}
