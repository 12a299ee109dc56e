// src/template.rs

//! Command templates with `{name}` placeholders.
//!
//! `{{` and `}}` produce literal braces, so shell snippets like
//! `awk '{{print $1}}'` survive rendering.

use crate::errors::{ProbebenchError, Result};
use crate::sweep::ParameterSet;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// A parsed command template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    text: String,
    segments: Vec<Segment>,
}

impl CommandTemplate {
    pub fn parse(text: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') | None => {
                                return Err(ProbebenchError::Template(format!(
                                    "unclosed '{{' in command template: {text}"
                                )));
                            }
                            Some(other) => name.push(other),
                        }
                    }
                    if name.trim().is_empty() {
                        return Err(ProbebenchError::Template(format!(
                            "empty placeholder in command template: {text}"
                        )));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(name.trim().to_string()));
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => {
                    return Err(ProbebenchError::Template(format!(
                        "single '}}' in command template: {text}"
                    )));
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            text: text.to_string(),
            segments,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Referenced placeholder names, first occurrence order, no duplicates.
    pub fn fields(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for seg in &self.segments {
            if let Segment::Field(name) = seg {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
        }
        out
    }

    pub fn render(&self, params: &ParameterSet) -> Result<String> {
        let mut out = String::with_capacity(self.text.len());
        for seg in &self.segments {
            match seg {
                Segment::Literal(s) => out.push_str(s),
                Segment::Field(name) => {
                    let value = params.get(name).ok_or_else(|| {
                        ProbebenchError::Template(format!(
                            "no value for '{{{name}}}' in command template: {}",
                            self.text
                        ))
                    })?;
                    out.push_str(&value.to_string());
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::ParamValue;

    fn params(pairs: &[(&str, ParamValue)]) -> ParameterSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn renders_placeholders() {
        let t = CommandTemplate::parse("fio --bs={bs} --iodepth={depth} --name={bs}").unwrap();
        assert_eq!(t.fields(), vec!["bs", "depth"]);
        let out = t
            .render(&params(&[("bs", "4k".into()), ("depth", ParamValue::Int(8))]))
            .unwrap();
        assert_eq!(out, "fio --bs=4k --iodepth=8 --name=4k");
    }

    #[test]
    fn doubled_braces_are_literal() {
        let t = CommandTemplate::parse("awk '{{print $1}}' {file}").unwrap();
        assert_eq!(t.fields(), vec!["file"]);
        let out = t.render(&params(&[("file", "x.txt".into())])).unwrap();
        assert_eq!(out, "awk '{print $1}' x.txt");
    }

    #[test]
    fn missing_value_is_an_error() {
        let t = CommandTemplate::parse("run {n}").unwrap();
        let err = t.render(&ParameterSet::new()).unwrap_err();
        assert!(err.to_string().contains("{n}"), "{err}");
    }

    #[test]
    fn malformed_templates_are_rejected() {
        assert!(CommandTemplate::parse("a {b").is_err());
        assert!(CommandTemplate::parse("a }").is_err());
        assert!(CommandTemplate::parse("a {}").is_err());
    }
}
