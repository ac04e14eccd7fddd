//! Translates the authoring dialect into native tera syntax.
//!
//! The dialect is a small Jinja-like notation written against alertmanager's
//! field names (`externalURL`, `alert.startsAt`, `format_time(...)`). The
//! translation only looks inside `{{ }}` and `{% %}` tags; text outside of tags
//! is copied verbatim and `{# #}` comments are left alone.
//!
//! Names the translator doesn't know are not substituted. The whole tag is
//! copied unchanged and the name is reported in [Translation::unresolved], so
//! the problem shows up as a render error instead of silently producing output.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

#[allow(clippy::expect_used)]
static TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\{\{(-?)(.*?)(-?)\}\}|\{%(-?)(.*?)(-?)%\}|\{#.*?#\}").expect("tag regex")
});

#[allow(clippy::expect_used)]
static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|\d+(?:\.\d+)?|[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*"#,
    )
    .expect("token regex")
});

#[allow(clippy::expect_used)]
static FORMAT_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(format_(?:time|bold|italic|code|text))\(\s*([A-Za-z_][A-Za-z0-9_.]*)\s*\)$")
        .expect("format call regex")
});

#[allow(clippy::expect_used)]
static FOR_LOOP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^for\s+([A-Za-z_]\w*(?:\s*,\s*[A-Za-z_]\w*)?)\s+in\s+(.+)$").expect("for regex")
});

/// top level variables of the dialect and their native accessors
const VARIABLES: &[(&str, &str)] = &[
    ("status", "status"),
    ("alert_name", "alert_name"),
    ("env", "env"),
    ("severity", "severity"),
    ("namespace", "namespace"),
    ("total_alerts", "total_alerts"),
    ("firing_count", "firing_count"),
    ("resolved_count", "resolved_count"),
    ("externalURL", "external_url"),
    ("alerts", "alerts"),
    ("platform", "platform"),
    ("show_links", "format_options.show_links.enabled"),
    ("show_timestamps", "format_options.show_timestamps.enabled"),
    ("show_external_url", "format_options.show_external_url.enabled"),
    ("show_generator_url", "format_options.show_generator_url.enabled"),
    ("show_emoji", "format_options.show_emoji.enabled"),
    ("compact_mode", "format_options.compact_mode.enabled"),
    ("max_summary_length", "format_options.max_summary_length.value"),
];

/// fields of a loop alias bound to an element of `alerts`
const ALERT_FIELDS: &[(&str, &str)] = &[
    ("status", "status"),
    ("startsAt", "starts_at"),
    ("endsAt", "ends_at"),
    ("generatorURL", "generator_url"),
    ("labels", "labels"),
    ("annotations", "annotations"),
];

const LOOP_FIELDS: &[&str] = &["index", "index0", "first", "last"];

const KEYWORDS: &[&str] = &[
    "and", "or", "not", "in", "is", "true", "false", "True", "False", "none", "None",
];

/// Result of translating a dialect template.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Translation {
    /// native template source
    pub text: String,
    /// dialect names left untranslated, in order of first appearance
    pub unresolved: Vec<String>,
}

/// a lexical scope opened by a `for` tag
#[derive(Debug, Default)]
struct Scope {
    /// aliases bound to an element of `alerts`
    alert_aliases: Vec<String>,
    /// any other names bound by the loop
    locals: Vec<String>,
}

#[derive(Debug, Default)]
struct Translator {
    scopes: Vec<Scope>,
    /// names introduced by `set` at top level
    globals: Vec<String>,
    unresolved: Vec<String>,
}

/// Translates dialect source into native tera syntax.
pub fn translate(source: &str) -> Translation {
    let mut translator = Translator::default();

    let text = TAG
        .replace_all(source, |caps: &Captures| translator.tag(caps))
        .into_owned();

    Translation { text, unresolved: translator.unresolved }
}

impl Translator {
    fn tag(&mut self, caps: &Captures) -> String {
        let original = caps[0].to_string();

        if let Some(expr) = caps.get(2) {
            let (left, right) = (&caps[1], &caps[3]);
            return match self.output(expr.as_str().trim()) {
                Ok(native) => format!("{{{{{left} {native} {right}}}}}"),
                Err(name) => self.unresolved(name, original),
            };
        }

        if let Some(statement) = caps.get(5) {
            let (left, right) = (&caps[4], &caps[6]);
            return match self.statement(statement.as_str().trim()) {
                Ok(native) => format!("{{%{left} {native} {right}%}}"),
                Err(name) => self.unresolved(name, original),
            };
        }

        // comment
        original
    }

    fn unresolved(&mut self, name: String, original: String) -> String {
        if !self.unresolved.contains(&name) {
            self.unresolved.push(name);
        }
        original
    }

    /// translates the expression of a `{{ }}` tag
    fn output(&self, expr: &str) -> Result<String, String> {
        if let Some(call) = FORMAT_CALL.captures(expr) {
            let argument = self.output_path(&call[2])?;
            return Ok(format!("{argument} | {}(platform=platform)", &call[1]));
        }

        if TOKEN.find(expr).map(|m| m.as_str()) == Some(expr) {
            return self.output_path(expr);
        }

        self.expression(expr)
    }

    /// a bare path inside `{{ }}`; missing label and annotation keys render empty
    fn output_path(&self, path: &str) -> Result<String, String> {
        let native = self.path(path).ok_or_else(|| path.to_string())?;

        if self.is_map_key(path) {
            Ok(format!("{native} | default(value=\"\")"))
        } else {
            Ok(native)
        }
    }

    fn statement(&mut self, statement: &str) -> Result<String, String> {
        let keyword = statement.split_whitespace().next().unwrap_or_default();

        match keyword {
            "if" | "elif" => {
                let condition = statement[keyword.len()..].trim();
                Ok(format!("{keyword} {}", self.expression(condition)?))
            }
            "for" => self.open_loop(statement),
            "endfor" => {
                self.scopes.pop();
                Ok(statement.to_string())
            }
            "set" => self.set(statement),
            _ => Ok(statement.to_string()),
        }
    }

    fn open_loop(&mut self, statement: &str) -> Result<String, String> {
        let Some(caps) = FOR_LOOP.captures(statement) else {
            return Ok(statement.to_string());
        };

        let targets: Vec<String> = caps[1].split(',').map(|name| name.trim().to_string()).collect();
        let iterable = caps[2].trim();
        let native = self.expression(iterable)?;

        let mut scope = Scope::default();
        if iterable == "alerts" && targets.len() == 1 {
            scope.alert_aliases = targets.clone();
        } else {
            scope.locals = targets.clone();
        }
        self.scopes.push(scope);

        Ok(format!("for {} in {native}", targets.join(", ")))
    }

    fn set(&mut self, statement: &str) -> Result<String, String> {
        let Some((target, value)) = statement["set".len()..].split_once('=') else {
            return Ok(statement.to_string());
        };

        let target = target.trim().to_string();
        let native = self.expression(value.trim())?;

        match self.scopes.last_mut() {
            Some(scope) => scope.locals.push(target.clone()),
            None => self.globals.push(target.clone()),
        }

        Ok(format!("set {target} = {native}"))
    }

    /// rewrites every name in an expression, keeping literals, keywords, filter
    /// names, keyword argument names and function names
    fn expression(&self, expr: &str) -> Result<String, String> {
        let mut out = String::with_capacity(expr.len());
        let mut last = 0;

        for token in TOKEN.find_iter(expr) {
            out.push_str(&expr[last..token.start()]);
            last = token.end();

            let text = token.as_str();
            let before = expr[..token.start()].trim_end();
            let after = expr[token.end()..].trim_start();

            let verbatim = text.starts_with(['"', '\''])
                || text.starts_with(|c: char| c.is_ascii_digit())
                || KEYWORDS.contains(&text)
                || before.ends_with('|')
                || (after.starts_with('=') && !after.starts_with("=="))
                || after.starts_with('(');

            if verbatim {
                out.push_str(text);
            } else {
                out.push_str(&self.path(text).ok_or_else(|| text.to_string())?);
                // filters fail on missing label and annotation keys
                if after.starts_with('|') && self.is_map_key(text) {
                    out.push_str(" | default(value=\"\")");
                }
            }
        }

        out.push_str(&expr[last..]);
        Ok(out)
    }

    fn path(&self, path: &str) -> Option<String> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };

        if self.is_alert_alias(head) {
            let Some(rest) = rest else {
                return Some(head.to_string());
            };
            let (field, key) = match rest.split_once('.') {
                Some((field, key)) => (field, Some(key)),
                None => (rest, None),
            };
            let native = ALERT_FIELDS
                .iter()
                .find(|(dialect, _)| *dialect == field)
                .map(|(_, native)| *native)?;

            return match key {
                None => Some(format!("{head}.{native}")),
                Some(key) if native == "labels" || native == "annotations" => {
                    Some(format!("{head}.{native}.{key}"))
                }
                Some(_) => None,
            };
        }

        if head == "loop" {
            return match rest {
                Some(field) if LOOP_FIELDS.contains(&field) => Some(path.to_string()),
                _ => None,
            };
        }

        if self.is_local(head) {
            return Some(path.to_string());
        }

        if rest.is_some() {
            return None;
        }

        VARIABLES
            .iter()
            .find(|(dialect, _)| *dialect == head)
            .map(|(_, native)| native.to_string())
    }

    fn is_alert_alias(&self, name: &str) -> bool {
        self.scopes
            .iter()
            .any(|scope| scope.alert_aliases.iter().any(|alias| alias == name))
    }

    fn is_local(&self, name: &str) -> bool {
        self.globals.iter().any(|local| local == name)
            || self
                .scopes
                .iter()
                .any(|scope| scope.locals.iter().any(|local| local == name))
    }

    fn is_map_key(&self, path: &str) -> bool {
        let mut segments = path.split('.');
        match (segments.next(), segments.next(), segments.next()) {
            (Some(head), Some("labels" | "annotations"), Some(_)) => self.is_alert_alias(head),
            _ => false,
        }
    }
}
