//! Variable renderer: typed values, `{% if %}` blocks and `{{ var }}` placeholders
//!
//! Rendering happens in two passes over the composed text. Conditional
//! blocks are evaluated first against the resolved values; placeholders are
//! substituted afterwards, so substituted values are never re-scanned.
//!
//! Fenced code blocks (``` or ~~~) are copied verbatim: neither tags nor
//! placeholders inside them are touched. Outside fences, tags other than
//! `if`/`else`/`endif` are kept as literal text.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;
use tracing::trace;

use super::fence_marker;
use crate::core::VariableSpec;
use crate::core::skill::display_value;
use crate::error::{Result, SwError};

/// `{% ... %}`; a tag alone on its line consumes the whole line.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(^[ \t]*)?\{%\s*(.*?)\s*%\}([ \t]*(?:\r?\n|$))?").expect("valid regex")
});

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\}\}").expect("valid regex")
});

static CONDITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^([A-Za-z_][A-Za-z0-9_.\-]*)\s*(?:(==|!=)\s*(?:"([^"]*)"|'([^']*)'|(\S+)))?$"#)
        .expect("valid regex")
});

/// Resolved variable values for one render.
pub type Values = BTreeMap<String, Value>;

/// Resolve the effective value of every variable.
///
/// Declared variables take the supplied value when it passes validation,
/// else their default. Supplied values for undeclared names pass through.
/// A required variable with neither is an error, as is any invalid
/// supplied value.
pub fn resolve_values(declared: &BTreeMap<String, VariableSpec>, supplied: &Values) -> Result<Values> {
    let mut resolved = Values::new();
    for (name, spec) in declared {
        match supplied.get(name) {
            Some(value) => {
                spec.check(value)
                    .map_err(|reason| SwError::VariableValidation {
                        variable: name.clone(),
                        reason,
                    })?;
                resolved.insert(name.clone(), value.clone());
            }
            None => match &spec.default {
                Some(default) => {
                    resolved.insert(name.clone(), default.clone());
                }
                None if spec.required => {
                    return Err(SwError::VariableValidation {
                        variable: name.clone(),
                        reason: "required variable has no value and no default".to_string(),
                    });
                }
                None => {}
            },
        }
    }
    for (name, value) in supplied {
        if !declared.contains_key(name) {
            trace!(variable = %name, "passing through undeclared variable");
            resolved.insert(name.clone(), value.clone());
        }
    }
    Ok(resolved)
}

/// Render `text` against declared variables and caller-supplied values.
pub fn render(text: &str, declared: &BTreeMap<String, VariableSpec>, supplied: &Values) -> Result<String> {
    let values = resolve_values(declared, supplied)?;
    render_with(text, &values)
}

/// Render `text` against already-resolved values.
pub fn render_with(text: &str, values: &Values) -> Result<String> {
    let nodes = parse(text)?;
    let mut out = String::with_capacity(text.len());
    evaluate(&nodes, values, &mut out);
    Ok(out)
}

/// Replace `{{ name }}` with resolved values; unknown names stay as written.
#[must_use]
pub fn substitute(text: &str, values: &Values) -> String {
    PLACEHOLDER_RE
        .replace_all(text, |caps: &Captures<'_>| match values.get(&caps[1]) {
            Some(value) => display_value(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Truthy(String),
    Equals(String, String),
    NotEquals(String, String),
}

impl Condition {
    fn parse(expr: &str) -> Result<Self> {
        let caps = CONDITION_RE
            .captures(expr.trim())
            .ok_or_else(|| SwError::Template(format!("unsupported condition `{expr}`")))?;
        let name = caps[1].to_string();
        let literal = caps
            .get(3)
            .or_else(|| caps.get(4))
            .or_else(|| caps.get(5))
            .map(|m| m.as_str().to_string());
        Ok(match (caps.get(2).map(|m| m.as_str()), literal) {
            (Some("=="), Some(lit)) => Self::Equals(name, lit),
            (Some("!="), Some(lit)) => Self::NotEquals(name, lit),
            _ => Self::Truthy(name),
        })
    }

    /// Unresolved variables make any condition false.
    fn holds(&self, values: &Values) -> bool {
        match self {
            Self::Truthy(name) => values.get(name).is_some_and(truthy),
            Self::Equals(name, lit) => values.get(name).is_some_and(|v| display_value(v) == *lit),
            Self::NotEquals(name, lit) => {
                values.get(name).is_some_and(|v| display_value(v) != *lit)
            }
        }
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    /// Copied to the output as is, placeholders included.
    Literal(String),
    If {
        condition: Condition,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

struct OpenBlock {
    condition: Condition,
    then: Vec<Node>,
    otherwise: Option<Vec<Node>>,
}

fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Text(last)) = nodes.last_mut() {
        last.push_str(text);
    } else {
        nodes.push(Node::Text(text.to_string()));
    }
}

fn push_literal(nodes: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Literal(last)) = nodes.last_mut() {
        last.push_str(text);
    } else {
        nodes.push(Node::Literal(text.to_string()));
    }
}

/// Split `text` into (fenced, slice) runs of whole lines. An unclosed fence
/// runs to the end of the text.
fn fenced_runs(text: &str) -> Vec<(bool, &str)> {
    let mut runs = Vec::new();
    let mut fence: Option<&str> = None;
    let mut start = 0;
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let Some(marker) = fence_marker(line.trim_start()) else {
            continue;
        };
        match fence {
            None => {
                if line_start > start {
                    runs.push((false, &text[start..line_start]));
                }
                start = line_start;
                fence = Some(marker);
            }
            Some(open) if open == marker => {
                runs.push((true, &text[start..offset]));
                start = offset;
                fence = None;
            }
            Some(_) => {}
        }
    }
    if start < text.len() {
        runs.push((fence.is_some(), &text[start..]));
    }
    runs
}

fn current<'a>(root: &'a mut Vec<Node>, stack: &'a mut [OpenBlock]) -> &'a mut Vec<Node> {
    match stack.last_mut() {
        Some(block) => block.otherwise.as_mut().unwrap_or(&mut block.then),
        None => root,
    }
}

fn parse(text: &str) -> Result<Vec<Node>> {
    let mut root: Vec<Node> = Vec::new();
    let mut stack: Vec<OpenBlock> = Vec::new();

    for (fenced, run) in fenced_runs(text) {
        if fenced {
            push_literal(current(&mut root, &mut stack), run);
        } else {
            parse_prose(run, &mut root, &mut stack)?;
        }
    }

    if !stack.is_empty() {
        return Err(SwError::Template(format!(
            "{} unclosed `if` block(s)",
            stack.len()
        )));
    }
    Ok(root)
}

fn parse_prose(text: &str, root: &mut Vec<Node>, stack: &mut Vec<OpenBlock>) -> Result<()> {
    let mut last = 0;

    for caps in TAG_RE.captures_iter(text) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        let leading = caps.get(1).map_or("", |m| m.as_str());
        let trailing = caps.get(3).map_or("", |m| m.as_str());
        // standalone tag lines vanish; inline tags keep surrounding text
        let standalone = caps.get(1).is_some() && trailing.ends_with('\n');
        let tag = caps.get(2).map_or("", |m| m.as_str()).trim();
        let (keyword, rest) = tag.split_once(char::is_whitespace).unwrap_or((tag, ""));

        push_text(current(root, stack), &text[last..whole.start]);
        last = whole.end;

        if !matches!(keyword, "if" | "else" | "endif") {
            trace!(tag = %keyword, "keeping unrecognised tag as text");
            push_literal(current(root, stack), &text[whole]);
            continue;
        }

        if !standalone {
            push_text(current(root, stack), leading);
        }
        match keyword {
            "if" => stack.push(OpenBlock {
                condition: Condition::parse(rest)?,
                then: Vec::new(),
                otherwise: None,
            }),
            "else" => {
                let block = stack
                    .last_mut()
                    .ok_or_else(|| SwError::Template("`else` without `if`".to_string()))?;
                if block.otherwise.is_some() {
                    return Err(SwError::Template("duplicate `else` in `if` block".to_string()));
                }
                block.otherwise = Some(Vec::new());
            }
            _ => {
                let block = stack
                    .pop()
                    .ok_or_else(|| SwError::Template("`endif` without `if`".to_string()))?;
                current(root, stack).push(Node::If {
                    condition: block.condition,
                    then: block.then,
                    otherwise: block.otherwise.unwrap_or_default(),
                });
            }
        }
        if !standalone {
            push_text(current(root, stack), trailing);
        }
    }

    push_text(current(root, stack), &text[last..]);
    Ok(())
}

fn evaluate(nodes: &[Node], values: &Values, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(&substitute(text, values)),
            Node::Literal(text) => out.push_str(text),
            Node::If {
                condition,
                then,
                otherwise,
            } => {
                let branch = if condition.holds(values) { then } else { otherwise };
                evaluate(branch, values, out);
            }
        }
    }
}
