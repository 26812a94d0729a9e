//! Expected-type explanations for the node under the cursor.

use serde::Serialize;

use crate::data::Data;
use crate::position::{Position, Range};
use crate::trace::{trace_data_path, trace_expected_type, ExpectedType};
use crate::typespec::{BlockSpec, TypeResolver, TypeSpec};

/// How many levels of a type are rendered before eliding with ` ... `.
const MAX_DISPLAY_DEPTH: usize = 4;

/// Rendered pieces shorter than this are joined onto one line.
const JOIN_BELOW: usize = 30;

const INDENT: &str = "    ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hover {
    pub range: Range,
    pub text: String,
}

/// Explain the type expected at `pos`, or `None` when nothing is there.
pub fn hover(
    data: &Data,
    spec: &TypeSpec,
    resolver: &dyn TypeResolver,
    pos: Position,
) -> Option<Hover> {
    let trace = trace_data_path(data, pos)?;
    let walked = trace_expected_type(&trace.steps, spec, resolver);

    let range = if walked.failed {
        trace.range_after(walked.safe_steps)
    } else {
        trace.target()
    };
    let rendered = match walked.expected {
        ExpectedType::Unit => "#unit".to_owned(),
        ExpectedType::Spec(spec) => display_type(spec, resolver),
        ExpectedType::Block(block) => render(block_lines(block, resolver, MAX_DISPLAY_DEPTH)),
    };
    Some(Hover {
        range,
        text: format!("TYPEOF(<~>{}): {rendered}", walked.path),
    })
}

// ──────────────────────────────────────────────
// Type rendering
// ──────────────────────────────────────────────

struct Line {
    indent: usize,
    text: String,
}

impl Line {
    fn new(text: impl Into<String>) -> Self {
        Line {
            indent: 0,
            text: text.into(),
        }
    }
}

/// Compact rendering of a type, e.g. `{ a: #int, b: #string[] }`.
pub fn display_type(spec: &TypeSpec, resolver: &dyn TypeResolver) -> String {
    render(type_lines(spec, resolver, MAX_DISPLAY_DEPTH))
}

fn render(lines: Vec<Line>) -> String {
    lines
        .iter()
        .map(|line| format!("{}{}", INDENT.repeat(line.indent), line.text))
        .collect::<Vec<_>>()
        .join("\n")
}

fn prefix(lines: &mut [Line], text: &str) {
    if let Some(first) = lines.first_mut() {
        first.text.insert_str(0, text);
    }
}

fn type_lines(spec: &TypeSpec, resolver: &dyn TypeResolver, depth: usize) -> Vec<Line> {
    if depth == 0 {
        return vec![Line::new(" ... ")];
    }
    match spec {
        TypeSpec::Primitive(kind) => vec![Line::new(format!("#{kind}"))],
        TypeSpec::Block(block) => block_lines(block, resolver, depth),
        TypeSpec::Enum(variants) => {
            let mut inner = Vec::new();
            for (tag, payload) in variants {
                let mut lines = match payload {
                    Some(block) => block_lines(block, resolver, depth),
                    None => vec![Line::new("#unit")],
                };
                prefix(&mut lines, &format!("{tag}: "));
                inner.extend(lines);
            }
            bracketed("#enum {", inner, "}")
        }
        TypeSpec::Ref(name) => {
            let mut lines = match resolver.resolve(name) {
                Ok(target) => type_lines(target, resolver, depth - 1),
                Err(_) => vec![Line::new(" ~ missing ~ ")],
            };
            prefix(&mut lines, &format!("@{name} "));
            lines
        }
        TypeSpec::Missing => vec![Line::new(" ~ missing ~ ")],
    }
}

fn block_lines(block: &BlockSpec, resolver: &dyn TypeResolver, depth: usize) -> Vec<Line> {
    match block {
        BlockSpec::Dict(fields) => {
            let mut inner = Vec::new();
            for (key, field) in fields {
                let mut lines = type_lines(field, resolver, depth - 1);
                prefix(&mut lines, &format!("{key}: "));
                inner.extend(lines);
            }
            bracketed("{", inner, "}")
        }
        BlockSpec::Array(element) => {
            let mut lines = type_lines(element, resolver, depth - 1);
            if let Some(last) = lines.last_mut() {
                last.text.push_str("[]");
            }
            lines
        }
        BlockSpec::Tuple(elements) => {
            let inner = elements
                .iter()
                .flat_map(|e| type_lines(e, resolver, depth - 1))
                .collect();
            bracketed("#tuple (", inner, ")")
        }
        BlockSpec::Record(value) => {
            bracketed("#record { _:", type_lines(value, resolver, depth - 1), "}")
        }
    }
}

fn bracketed(open: &str, mut inner: Vec<Line>, close: &str) -> Vec<Line> {
    let total = open.len() + close.len() + inner.iter().map(|l| l.text.len()).sum::<usize>();
    if total < JOIN_BELOW {
        let middle: Vec<&str> = inner.iter().map(|l| l.text.as_str()).collect();
        return vec![Line::new(format!("{open} {} {close}", middle.join(", ")))];
    }
    for line in &mut inner {
        line.indent += 1;
    }
    let mut lines = Vec::with_capacity(inner.len() + 2);
    lines.push(Line::new(open));
    lines.extend(inner);
    lines.push(Line::new(close));
    lines
}
