//! Command template parsing and rendering
//!
//! A template is multi-line shell text:
//! - each non-empty, non-comment line is one logical command
//! - a trailing `\` continues the command on the next line
//! - a trailing `|`, `||` or `&&` continues the command on the next line
//! - `{{package}}`, `{{version}}` and `{{constraint}}` are substituted verbatim

use regex::Regex;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*(package|version|constraint)\s*\}\}").expect("valid placeholder regex")
});

static ENV_ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*=").expect("valid assignment regex"));

/// Values substituted into a command template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    /// Value for `{{package}}`
    pub package: String,
    /// Value for `{{version}}`
    pub version: String,
    /// Value for `{{constraint}}`
    pub constraint: String,
}

impl Bindings {
    /// Bindings for a package name only
    pub fn package(name: impl Into<String>) -> Self {
        Self {
            package: name.into(),
            ..Default::default()
        }
    }

    /// Sets the version (builder pattern)
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the constraint (builder pattern)
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = constraint.into();
        self
    }
}

/// Substitute placeholders verbatim. No quoting or escaping is applied.
pub fn render(template: &str, bindings: &Bindings) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| match &caps[1] {
            "package" => bindings.package.clone(),
            "version" => bindings.version.clone(),
            _ => bindings.constraint.clone(),
        })
        .into_owned()
}

static GROUP_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*(package|rule|type)\s*\}\}").expect("valid group placeholder regex")
});

/// Render an `update.group` key template (`{{package}}`, `{{rule}}`, `{{type}}`)
pub fn render_group_key(template: &str, package: &str, rule: &str, package_type: &str) -> String {
    GROUP_PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| match &caps[1] {
            "package" => package.to_string(),
            "rule" => rule.to_string(),
            _ => package_type.to_string(),
        })
        .into_owned()
}

/// Split a template into logical command lines
pub fn logical_lines(template: &str) -> Vec<String> {
    let normalized = template.replace("\r\n", "\n");
    let mut commands = Vec::new();
    let mut pending = String::new();

    for raw in normalized.lines() {
        let line = raw.trim();
        if line.is_empty() {
            flush(&mut pending, &mut commands);
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        if let Some(stripped) = line.strip_suffix('\\') {
            push_segment(&mut pending, stripped.trim_end());
            continue;
        }

        push_segment(&mut pending, line);
        if line.ends_with('|') || line.ends_with("&&") {
            continue;
        }
        flush(&mut pending, &mut commands);
    }
    flush(&mut pending, &mut commands);

    commands
}

fn push_segment(pending: &mut String, segment: &str) {
    if segment.is_empty() {
        return;
    }
    if !pending.is_empty() {
        pending.push(' ');
    }
    pending.push_str(segment);
}

fn flush(pending: &mut String, commands: &mut Vec<String>) {
    let command = pending.trim();
    if !command.is_empty() {
        commands.push(command.to_string());
    }
    pending.clear();
}

/// Split one logical line into the commands it runs
///
/// Splits on unquoted `|`, `||`, `&&` and `;`. A single `&` is left alone
/// so redirections like `2>&1` survive.
pub fn command_stages(line: &str) -> Vec<String> {
    let mut stages = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' if quote != Some('\'') => {
                escaped = true;
                current.push(ch);
            }
            '\'' | '"' => {
                match quote {
                    Some(q) if q == ch => quote = None,
                    None => quote = Some(ch),
                    _ => {}
                }
                current.push(ch);
            }
            '|' | ';' if quote.is_none() => {
                if ch == '|' && chars.peek() == Some(&'|') {
                    chars.next();
                }
                stages.push(std::mem::take(&mut current));
            }
            '&' if quote.is_none() && chars.peek() == Some(&'&') => {
                chars.next();
                stages.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    stages.push(current);

    stages
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// First command word of every stage, deduplicated in order
///
/// Leading `VAR=value` assignments are skipped.
pub fn extract_commands(template: &str) -> Vec<String> {
    let mut commands: Vec<String> = Vec::new();

    for line in logical_lines(template.trim()) {
        for stage in command_stages(&line) {
            let word = stage
                .split_whitespace()
                .find(|token| !ENV_ASSIGNMENT.is_match(token));
            if let Some(word) = word {
                if !commands.iter().any(|c| c == word) {
                    commands.push(word.to_string());
                }
            }
        }
    }

    commands
}
