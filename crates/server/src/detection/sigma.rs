//! Evaluation of a Sigma detection tree against one flattened log event.
//!
//! A detection object holds named selections (field matchers, with the
//! `contains` / `startswith` / `endswith` / `re` modifiers) plus a
//! `condition` expression combining them with `and` / `or` / `not` and
//! parentheses. String comparisons are case-insensitive except `re`.

use std::collections::HashMap;

use serde_json::Value;
use shared_types::DetectionEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    Regex,
}

fn parse_field_spec(spec: &str) -> Result<(&str, Modifier), String> {
    match spec.split_once('|') {
        None => Ok((spec, Modifier::Equals)),
        Some((field, "contains")) => Ok((field, Modifier::Contains)),
        Some((field, "startswith")) => Ok((field, Modifier::StartsWith)),
        Some((field, "endswith")) => Ok((field, Modifier::EndsWith)),
        Some((field, "re")) => Ok((field, Modifier::Regex)),
        Some((_, modifier)) => Err(format!("unsupported field modifier: {modifier}")),
    }
}

/// Resolve a field against the flattened event. The three flat fields are
/// addressed directly; everything else is a (dotted) path into metadata.
fn resolve_field(event: &DetectionEvent, field: &str) -> Option<Value> {
    match field {
        "message" => Some(Value::String(event.message.clone())),
        "level" => Some(Value::String(event.level.clone())),
        "service" => Some(Value::String(event.service.clone())),
        _ => {
            let mut current = event.metadata.as_ref()?;
            for segment in field.split('.') {
                current = current.get(segment)?;
            }
            Some(current.clone())
        }
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn match_value(actual: &Value, modifier: Modifier, expected: &Value) -> Result<bool, String> {
    let actual_str = value_to_string(actual);
    let expected_str = value_to_string(expected);

    Ok(match modifier {
        Modifier::Equals => actual_str.eq_ignore_ascii_case(&expected_str),
        Modifier::Contains => actual_str
            .to_lowercase()
            .contains(&expected_str.to_lowercase()),
        Modifier::StartsWith => actual_str
            .to_lowercase()
            .starts_with(&expected_str.to_lowercase()),
        Modifier::EndsWith => actual_str
            .to_lowercase()
            .ends_with(&expected_str.to_lowercase()),
        Modifier::Regex => regex::Regex::new(&expected_str)
            .map_err(|e| format!("invalid regex {expected_str:?}: {e}"))?
            .is_match(&actual_str),
    })
}

/// A selection matches when every field matcher matches. A list value is
/// an OR over its entries.
fn evaluate_selection(selection: &Value, event: &DetectionEvent) -> Result<bool, String> {
    let Some(fields) = selection.as_object() else {
        return Err("selection must be an object".to_string());
    };

    for (spec, expected) in fields {
        let (field, modifier) = parse_field_spec(spec)?;
        let Some(actual) = resolve_field(event, field) else {
            return Ok(false);
        };

        let matched = match expected {
            Value::Array(options) => {
                let mut any = false;
                for option in options {
                    if match_value(&actual, modifier, option)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            other => match_value(&actual, modifier, other)?,
        };

        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

// --- Condition expression ---

#[derive(Debug, Clone, PartialEq)]
enum Token {
    And,
    Or,
    Not,
    LParen,
    RParen,
    Ident(String),
}

fn tokenize(input: &str) -> Vec<Token> {
    let spaced = input.replace('(', " ( ").replace(')', " ) ");
    spaced
        .split_whitespace()
        .map(|word| match word {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "(" => Token::LParen,
            ")" => Token::RParen,
            ident => Token::Ident(ident.to_string()),
        })
        .collect()
}

struct ConditionParser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    selections: &'a HashMap<String, bool>,
}

impl<'a> ConditionParser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    // or-expression binds loosest: or := and ("or" and)*
    fn parse_or(&mut self) -> Result<bool, String> {
        let mut result = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let rhs = self.parse_and()?;
            result = result || rhs;
        }
        Ok(result)
    }

    fn parse_and(&mut self) -> Result<bool, String> {
        let mut result = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            let rhs = self.parse_unary()?;
            result = result && rhs;
        }
        Ok(result)
    }

    fn parse_unary(&mut self) -> Result<bool, String> {
        match self.advance() {
            Some(Token::Not) => Ok(!self.parse_unary()?),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err("unbalanced parentheses in condition".to_string()),
                }
            }
            Some(Token::Ident(name)) => self
                .selections
                .get(&name)
                .copied()
                .ok_or_else(|| format!("condition references unknown selection: {name}")),
            Some(token) => Err(format!("unexpected token in condition: {token:?}")),
            None => Err("unexpected end of condition".to_string()),
        }
    }
}

fn evaluate_condition(condition: &str, selections: &HashMap<String, bool>) -> Result<bool, String> {
    let mut parser = ConditionParser {
        tokens: tokenize(condition),
        pos: 0,
        selections,
    };
    let result = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err("trailing tokens in condition".to_string());
    }
    Ok(result)
}

/// Evaluate a full detection tree against one event.
pub fn evaluate_detection(detection: &Value, event: &DetectionEvent) -> Result<bool, String> {
    let Some(tree) = detection.as_object() else {
        return Err("detection must be an object".to_string());
    };

    let mut selections = HashMap::new();
    for (name, selection) in tree {
        if name == "condition" {
            continue;
        }
        selections.insert(name.clone(), evaluate_selection(selection, event)?);
    }
    if selections.is_empty() {
        return Err("detection has no selections".to_string());
    }

    match tree.get("condition").and_then(Value::as_str) {
        Some(condition) => evaluate_condition(condition, &selections),
        // Without an explicit condition, every selection must match.
        None => Ok(selections.values().all(|&v| v)),
    }
}
