//! Alias templates: `{group}` placeholders filled from named regex captures.
//!
//! `{{` and `}}` stand for literal braces. A template is parsed once, when the
//! recipe is loaded; rendering fails when a referenced group did not take part
//! in the match.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Group(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AliasTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl AliasTemplate {
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();
        while let Some((offset, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut group = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, g)) if g.is_alphanumeric() || g == '_' => group.push(g),
                            Some((at, g)) => {
                                return Err(template_error(format!("unexpected '{}' in placeholder", g), at));
                            }
                            None => return Err(template_error("unclosed placeholder".into(), offset)),
                        }
                    }
                    if group.is_empty() || group.starts_with(|g: char| g.is_ascii_digit()) {
                        return Err(template_error("placeholders must name a capture group".into(), offset));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Group(group));
                }
                '}' => return Err(template_error("single '}' outside a placeholder".into(), offset)),
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Group(g) => Some(g.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Fails when the template names a group the regex does not define.
    pub fn check_against(&self, regex: &Regex) -> Result<()> {
        let defined: Vec<&str> = regex.capture_names().flatten().collect();
        match self.groups().find(|g| !defined.contains(g)) {
            Some(missing) => Err(ExtractError::Config(format!(
                "alias template '{}' references group '{}' which '{}' does not define",
                self.source,
                missing,
                regex.as_str()
            ))),
            None => Ok(()),
        }
    }

    pub fn render(&self, captures: &Captures<'_>) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(l) => out.push_str(l),
                Segment::Group(g) => match captures.name(g) {
                    Some(m) => out.push_str(m.as_str()),
                    None => return Err(ExtractError::Substitution { group: g.clone() }),
                },
            }
        }
        Ok(out)
    }

    /// Searches `name` with `regex`. `None` when nothing matches, otherwise
    /// the rendered alias or the substitution failure.
    pub fn substitute(&self, regex: &Regex, name: &str) -> Option<Result<String>> {
        regex.captures(name).map(|captures| self.render(&captures))
    }
}

fn template_error(message: String, offset: usize) -> ExtractError {
    ExtractError::Template { message, offset }
}

impl TryFrom<String> for AliasTemplate {
    type Error = ExtractError;
    fn try_from(source: String) -> Result<Self> {
        AliasTemplate::parse(&source)
    }
}

impl From<AliasTemplate> for String {
    fn from(template: AliasTemplate) -> Self {
        template.source
    }
}
