//! HTML Serialization
//!
//! Turns a subtree of the arena into markup and reads that markup back.
//! The parser understands what the serializer writes (plus comments and a
//! doctype, which it skips); it is not a general-purpose HTML parser.
//!
//! # Attribute mapping
//!
//! | Node field  | Markup                                   |
//! |-------------|------------------------------------------|
//! | properties  | lowercase attribute; `true` is bare, `false`/`null` omitted |
//! | classes     | `class="a b"`                            |
//! | style       | `style="font-size: 12px;"` (camelCase keys become kebab-case) |
//! | dataset     | `data-user-id="7"` (camelCase keys become kebab-case) |

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{FluxelError, Result};

use super::node::{Node, NodeData, NodeId};

const VOID_ELEMENTS: [&str; 13] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str())
}

// ----------------------------------------------------------------------------
// Serializer
// ----------------------------------------------------------------------------

pub(crate) fn serialize(nodes: &HashMap<NodeId, Node>, id: NodeId, out: &mut String) {
    let Some(node) = nodes.get(&id) else {
        return;
    };
    let el = match &node.data {
        NodeData::Text(text) => {
            escape_text(text, out);
            return;
        }
        NodeData::Element(el) => el,
    };

    out.push('<');
    out.push_str(&el.tag);

    for (name, value) in &el.properties {
        let rendered = match value {
            Value::Null | Value::Bool(false) => continue,
            Value::Bool(true) => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        };
        out.push(' ');
        out.push_str(&name.to_ascii_lowercase());
        if let Some(rendered) = rendered {
            push_attribute_value(&rendered, out);
        }
    }

    if !el.classes.is_empty() {
        let joined = el.classes.iter().map(String::as_str).collect::<Vec<_>>().join(" ");
        out.push_str(" class");
        push_attribute_value(&joined, out);
    }

    if !el.style.is_empty() {
        let declarations = el
            .style
            .iter()
            .map(|(k, v)| format!("{}: {};", kebab_case(k), v))
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(" style");
        push_attribute_value(&declarations, out);
    }

    for (key, value) in &el.dataset {
        out.push_str(" data-");
        out.push_str(&kebab_case(key));
        push_attribute_value(value, out);
    }

    out.push('>');
    if is_void(&el.tag) {
        return;
    }
    for child in &el.children {
        serialize(nodes, *child, out);
    }
    out.push_str("</");
    out.push_str(&el.tag);
    out.push('>');
}

fn push_attribute_value(value: &str, out: &mut String) {
    out.push_str("=\"");
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out.push('"');
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

/// `userId` -> `user-id`.
pub(crate) fn kebab_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// `user-id` -> `userId`.
pub(crate) fn data_key(attr: &str) -> String {
    let mut out = String::with_capacity(attr.len());
    let mut upper = false;
    for c in attr.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Split a `style` attribute into camelCase declarations.
pub(crate) fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (key, value) = decl.split_once(':')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let key = if key.starts_with("--") {
                key.to_string()
            } else {
                data_key(key)
            };
            Some((key, value.trim().to_string()))
        })
        .collect()
}

// ----------------------------------------------------------------------------
// Parser
// ----------------------------------------------------------------------------

/// A parsed node before it is placed in a document.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Parsed {
    Element {
        tag: String,
        /// `None` for a bare attribute.
        attributes: Vec<(String, Option<String>)>,
        children: Vec<Parsed>,
    },
    Text(String),
}

pub(crate) fn parse(markup: &str) -> Result<Vec<Parsed>> {
    let mut parser = Parser { src: markup, pos: 0 };
    let nodes = parser.parse_nodes(None)?;
    if parser.pos < markup.len() {
        return Err(parser.error("unexpected closing tag"));
    }
    Ok(nodes)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn error(&self, message: &str) -> FluxelError {
        FluxelError::Markup {
            offset: self.pos,
            message: message.to_string(),
        }
    }

    fn eat(&mut self, prefix: &str) -> bool {
        if self.rest().starts_with(prefix) {
            self.pos += prefix.len();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn skip_past(&mut self, terminator: &str) -> Result<()> {
        match self.rest().find(terminator) {
            Some(idx) => {
                self.pos += idx + terminator.len();
                Ok(())
            }
            None => Err(self.error(&format!("missing '{terminator}'"))),
        }
    }

    /// Parse siblings until the closing tag of `parent` (consumed) or EOF.
    fn parse_nodes(&mut self, parent: Option<&str>) -> Result<Vec<Parsed>> {
        let mut nodes = Vec::new();
        loop {
            if self.pos >= self.src.len() {
                return match parent {
                    Some(tag) => Err(self.error(&format!("unclosed <{tag}>"))),
                    None => Ok(nodes),
                };
            }

            if self.eat("<!--") {
                self.skip_past("-->")?;
            } else if self.rest().starts_with("<!") {
                self.skip_past(">")?;
            } else if self.rest().starts_with("</") {
                let Some(tag) = parent else {
                    return Ok(nodes);
                };
                self.pos += 2;
                let name = self.parse_name();
                if !name.eq_ignore_ascii_case(tag) {
                    return Err(self.error(&format!("expected </{tag}>, found </{name}>")));
                }
                self.skip_whitespace();
                if !self.eat(">") {
                    return Err(self.error("expected '>'"));
                }
                return Ok(nodes);
            } else if self.rest().starts_with('<') {
                nodes.push(self.parse_element()?);
            } else {
                let end = self.rest().find('<').unwrap_or(self.rest().len());
                let raw = &self.rest()[..end];
                self.pos += end;
                nodes.push(Parsed::Text(unescape(raw)));
            }
        }
    }

    fn parse_name(&mut self) -> &'a str {
        let rest = self.rest();
        let end = rest
            .find(|c: char| c.is_whitespace() || matches!(c, '>' | '/' | '='))
            .unwrap_or(rest.len());
        self.pos += end;
        &rest[..end]
    }

    fn parse_element(&mut self) -> Result<Parsed> {
        self.pos += 1;
        let tag = self.parse_name().to_string();
        if tag.is_empty() {
            return Err(self.error("expected tag name"));
        }

        let mut attributes = Vec::new();
        loop {
            self.skip_whitespace();
            if self.eat("/>") {
                return Ok(Parsed::Element {
                    tag,
                    attributes,
                    children: Vec::new(),
                });
            }
            if self.eat(">") {
                break;
            }
            if self.pos >= self.src.len() {
                return Err(self.error(&format!("unterminated <{tag}>")));
            }

            let name = self.parse_name().to_ascii_lowercase();
            if name.is_empty() {
                return Err(self.error("expected attribute name"));
            }
            self.skip_whitespace();
            let value = if self.eat("=") {
                self.skip_whitespace();
                Some(self.parse_attribute_value()?)
            } else {
                None
            };
            attributes.push((name, value));
        }

        let children = if is_void(&tag) {
            Vec::new()
        } else {
            self.parse_nodes(Some(&tag))?
        };
        Ok(Parsed::Element {
            tag,
            attributes,
            children,
        })
    }

    fn parse_attribute_value(&mut self) -> Result<String> {
        let quote = match self.rest().chars().next() {
            Some(q @ ('"' | '\'')) => q,
            _ => {
                let rest = self.rest();
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == '>')
                    .unwrap_or(rest.len());
                self.pos += end;
                return Ok(unescape(&rest[..end]));
            }
        };

        self.pos += 1;
        let rest = self.rest();
        let Some(end) = rest.find(quote) else {
            return Err(self.error("unterminated attribute value"));
        };
        self.pos += end + 1;
        Ok(unescape(&rest[..end]))
    }
}

/// Decode the named and numeric character references the serializer and
/// common markup use. Unknown references are kept verbatim.
fn unescape(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        rest = &rest[idx..];

        let decoded = rest.find(';').and_then(|end| {
            let entity = &rest[1..end];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" | "#39" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            };
            c.map(|c| (c, end))
        });

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use serde_json::json;

    #[test]
    fn serializes_fields_in_order() {
        let doc = Document::new();
        let div = doc.create_element("div");
        doc.set_property(div, "id", json!("app")).unwrap();
        doc.set_property(div, "hidden", json!(false)).unwrap();
        doc.set_property(div, "draggable", json!(true)).unwrap();
        doc.set_classes(div, ["a", "b"]).unwrap();
        doc.set_style(div, "fontSize", Some("12px")).unwrap();
        doc.set_data(div, "userId", "7").unwrap();
        let text = doc.create_text("1 < 2 & \"q\"");
        doc.append_child(div, text).unwrap();

        assert_eq!(
            doc.outer_html(div).unwrap(),
            "<div id=\"app\" draggable class=\"a b\" style=\"font-size: 12px;\" \
             data-user-id=\"7\">1 &lt; 2 &amp; \"q\"</div>"
        );
    }

    #[test]
    fn void_elements_have_no_closing_tag() {
        let doc = Document::new();
        let input = doc.create_element("input");
        doc.set_property(input, "value", json!("x")).unwrap();
        assert_eq!(doc.outer_html(input).unwrap(), "<input value=\"x\">");
    }

    #[test]
    fn parses_serialized_markup() {
        let parsed = parse(
            "<!DOCTYPE html><div id=\"a\" hidden data-x-y='1'><!-- c --><br>t&amp;u<i/></div>",
        )
        .unwrap();

        assert_eq!(
            parsed,
            vec![Parsed::Element {
                tag: "div".into(),
                attributes: vec![
                    ("id".into(), Some("a".into())),
                    ("hidden".into(), None),
                    ("data-x-y".into(), Some("1".into())),
                ],
                children: vec![
                    Parsed::Element {
                        tag: "br".into(),
                        attributes: vec![],
                        children: vec![],
                    },
                    Parsed::Text("t&u".into()),
                    Parsed::Element {
                        tag: "i".into(),
                        attributes: vec![],
                        children: vec![],
                    },
                ],
            }]
        );
    }

    #[test]
    fn mismatched_tags_are_rejected() {
        assert!(matches!(
            parse("<div><span></div>"),
            Err(FluxelError::Markup { .. })
        ));
        assert!(matches!(parse("<div>"), Err(FluxelError::Markup { .. })));
        assert!(matches!(parse("</p>"), Err(FluxelError::Markup { .. })));
    }

    #[test]
    fn parse_html_maps_attributes_back() {
        let doc = Document::new();
        let roots = doc
            .parse_html("<p class=\"x y\" style=\"font-size: 2px;\" data-user-id=\"3\" title=\"t\">hi</p>")
            .unwrap();
        let p = roots[0];

        assert_eq!(doc.classes(p), vec!["x", "y"]);
        assert_eq!(doc.style(p, "fontSize").as_deref(), Some("2px"));
        assert_eq!(doc.data(p, "userId").as_deref(), Some("3"));
        assert_eq!(doc.property(p, "title"), Some(json!("t")));
        assert_eq!(doc.text_content(p), "hi");
        assert_eq!(doc.elements_created(), 0);
    }

    #[test]
    fn unescape_handles_numeric_and_unknown_references() {
        assert_eq!(unescape("&#65;&#x42;&nope;&"), "AB&nope;&");
    }
}
