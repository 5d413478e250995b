//! Compound CSS selectors: `tag`, `*`, `#id`, `.class`, `[attr]` and
//! `[attr="value"]`, in any combination without combinators. This is the
//! subset the scanner generates and that mapping responses refer to.

use crate::dom::document::{Document, NodeId};
use crate::dom::error::SelectorError;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selector {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<AttrMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrMatch {
    pub name: String,
    pub value: Option<String>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let source = input.trim();
        if source.is_empty() {
            return Err(SelectorError::Empty);
        }

        let chars: Vec<char> = source.chars().collect();
        let mut pos = 0;
        let mut selector = Selector::default();

        let unsupported = |at: usize| SelectorError::Unsupported {
            selector: source.to_string(),
            position: chars[..at].iter().map(|c| c.len_utf8()).sum(),
        };

        if chars[0] == '*' {
            pos = 1;
        } else if is_ident_start(chars[0]) {
            let (tag, next) = read_ident(&chars, 0);
            selector.tag = Some(tag.to_ascii_lowercase());
            pos = next;
        }

        while pos < chars.len() {
            match chars[pos] {
                '#' => {
                    let (id, next) = read_ident(&chars, pos + 1);
                    if id.is_empty() {
                        return Err(unsupported(pos));
                    }
                    selector.id = Some(id);
                    pos = next;
                }
                '.' => {
                    let (class, next) = read_ident(&chars, pos + 1);
                    if class.is_empty() {
                        return Err(unsupported(pos));
                    }
                    selector.classes.push(class);
                    pos = next;
                }
                '[' => {
                    let (attr, next) = read_attr(&chars, pos + 1)
                        .ok_or_else(|| SelectorError::Unterminated(source.to_string()))?;
                    if attr.name.is_empty() {
                        return Err(unsupported(pos));
                    }
                    selector.attrs.push(attr);
                    pos = next;
                }
                _ => return Err(unsupported(pos)),
            }
        }

        Ok(selector)
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(el) = doc.element(node) else {
            return false;
        };

        if let Some(tag) = &self.tag {
            if el.tag != *tag {
                return false;
            }
        }

        if let Some(id) = &self.id {
            if el.attr("id") != Some(id.as_str()) {
                return false;
            }
        }

        if !self.classes.is_empty() {
            let class_list: Vec<&str> = el.attr("class").unwrap_or("").split_whitespace().collect();
            if !self.classes.iter().all(|c| class_list.contains(&c.as_str())) {
                return false;
            }
        }

        self.attrs.iter().all(|a| match (&a.value, el.attr(&a.name)) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(expected), Some(actual)) => expected == actual,
        })
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '-' || c == '\\' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || !c.is_ascii()
}

fn read_ident(chars: &[char], mut pos: usize) -> (String, usize) {
    let mut out = String::new();
    while pos < chars.len() {
        let c = chars[pos];
        if c == '\\' && pos + 1 < chars.len() {
            out.push(chars[pos + 1]);
            pos += 2;
        } else if is_ident_char(c) {
            out.push(c);
            pos += 1;
        } else {
            break;
        }
    }
    (out, pos)
}

fn read_attr(chars: &[char], mut pos: usize) -> Option<(AttrMatch, usize)> {
    let skip_ws = |mut p: usize| {
        while p < chars.len() && chars[p].is_whitespace() {
            p += 1;
        }
        p
    };

    pos = skip_ws(pos);
    let (name, next) = read_ident(chars, pos);
    pos = skip_ws(next);

    match chars.get(pos)? {
        ']' => Some((AttrMatch { name, value: None }, pos + 1)),
        '=' => {
            pos = skip_ws(pos + 1);
            let (value, next) = match chars.get(pos)? {
                q @ ('"' | '\'') => read_quoted(chars, pos + 1, *q)?,
                _ => read_ident(chars, pos),
            };
            pos = skip_ws(next);
            if chars.get(pos)? != &']' {
                return None;
            }
            Some((
                AttrMatch {
                    name,
                    value: Some(value),
                },
                pos + 1,
            ))
        }
        _ => None,
    }
}

fn read_quoted(chars: &[char], mut pos: usize, quote: char) -> Option<(String, usize)> {
    let mut out = String::new();
    while pos < chars.len() {
        let c = chars[pos];
        if c == '\\' && pos + 1 < chars.len() {
            out.push(chars[pos + 1]);
            pos += 2;
        } else if c == quote {
            return Some((out, pos + 1));
        } else {
            out.push(c);
            pos += 1;
        }
    }
    None
}

/// True when `value` can follow `#` without escaping.
pub fn is_plain_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if first.is_ascii_digit() {
        return false;
    }
    if first == '-' && value.chars().nth(1).is_none_or(|c| c.is_ascii_digit()) {
        return false;
    }
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Quote a value for use inside `[attr="…"]`.
pub fn quote_attr_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

pub fn query_selector_all(doc: &Document, selector: &Selector) -> Vec<NodeId> {
    doc.elements()
        .into_iter()
        .filter(|&id| selector.matches(doc, id))
        .collect()
}

/// First element in document order matching `selector`.
pub fn query_selector(doc: &Document, selector: &str) -> Result<Option<NodeId>, SelectorError> {
    let parsed = Selector::parse(selector)?;
    Ok(doc
        .elements()
        .into_iter()
        .find(|&id| parsed.matches(doc, id)))
}
