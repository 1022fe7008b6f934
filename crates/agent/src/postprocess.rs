//! Unused-rule post-processing for validated ASP programs.
//!
//! Rules whose head predicates are never consumed (no body mentions them,
//! they are not shown, and they are not facts) are commented out. Nothing is
//! deleted. Commenting a rule can orphan the rules that fed it, so the pass
//! repeats until no more lines change; the result is a fixpoint and running
//! the transform again leaves it untouched.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex_lite::Regex;

const COMMENT: char = '%';
const DIRECTIVE: char = '#';
const IMPLIES: &str = ":-";

/// `name(args)` with no nested parentheses inside the argument list.
static PREDICATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z_]\w*)\(([^()]*)\)").expect("Invalid regex"));

/// `#show name/arity`, possibly several per line.
static SHOW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#show\s+([A-Za-z_]\w*)\s*/\s*(\d+)").expect("Invalid regex")
});

/// Output of [`comment_unused_rules`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostProcessed {
    pub program: String,
    /// `name/arity` of every predicate whose defining rules were commented out
    pub unused: BTreeSet<String>,
}

impl PostProcessed {
    pub fn commented_rules(&self) -> usize {
        self.unused.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Blank,
    /// Comments and directives, kept verbatim
    Passthrough(String),
    /// `text` is emitted; `code` is the same statement with comments removed
    Statement { text: String, code: String },
}

/// Comment out rules that define only unused predicates.
pub fn comment_unused_rules(program: &str) -> PostProcessed {
    let mut lines = logical_lines(program);

    let shown: BTreeSet<String> = lines
        .iter()
        .filter_map(|l| match l {
            Line::Passthrough(text) => Some(shown_predicates(text)),
            _ => None,
        })
        .flatten()
        .collect();

    let mut unused_total = BTreeSet::new();
    loop {
        let unused = unused_predicates(&lines, &shown);
        let mut changed = false;
        for line in lines.iter_mut() {
            if let Line::Statement { text, code } = line {
                let heads = predicates(head_of(code));
                if !heads.is_empty() && heads.iter().all(|p| unused.contains(p)) {
                    unused_total.extend(heads);
                    *line = Line::Passthrough(format!("{COMMENT} {text}"));
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }

    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    for line in &lines {
        out.push(match line {
            Line::Blank => "",
            Line::Passthrough(text) | Line::Statement { text, .. } => text,
        });
    }
    let mut program_out = out.join("\n");
    if program.ends_with('\n') {
        program_out.push('\n');
    }

    PostProcessed {
        program: program_out,
        unused: unused_total,
    }
}

fn unused_predicates(lines: &[Line], shown: &BTreeSet<String>) -> BTreeSet<String> {
    let mut heads = BTreeSet::new();
    let mut bodies = BTreeSet::new();
    let mut facts = BTreeSet::new();

    for line in lines {
        let Line::Statement { code, .. } = line else { continue };
        match code.split_once(IMPLIES) {
            Some((head, body)) => {
                heads.extend(predicates(head));
                bodies.extend(predicates(body));
            }
            None => {
                let found = predicates(code);
                heads.extend(found.iter().cloned());
                facts.extend(found);
            }
        }
    }

    heads
        .into_iter()
        .filter(|p| !bodies.contains(p) && !shown.contains(p) && !facts.contains(p))
        .collect()
}

fn head_of(statement: &str) -> &str {
    statement.split_once(IMPLIES).map_or(statement, |(head, _)| head)
}

/// Group physical lines into logical ones, joining rules split across lines.
fn logical_lines(program: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut pending: Vec<&str> = Vec::new();
    let mut pending_code: Vec<&str> = Vec::new();

    fn flush(pending: &mut Vec<&str>, pending_code: &mut Vec<&str>, lines: &mut Vec<Line>) {
        if !pending.is_empty() {
            lines.push(Line::Statement {
                text: pending.join(" "),
                code: pending_code.join(" "),
            });
            pending.clear();
            pending_code.clear();
        }
    }

    for raw in program.lines() {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            flush(&mut pending, &mut pending_code, &mut lines);
            lines.push(Line::Blank);
        } else if trimmed.starts_with(COMMENT) || trimmed.starts_with(DIRECTIVE) {
            lines.push(Line::Passthrough(raw.to_string()));
        } else {
            let code = code_part(trimmed).trim_end();
            pending.push(trimmed);
            pending_code.push(code);
            if code.ends_with('.') {
                flush(&mut pending, &mut pending_code, &mut lines);
            }
        }
    }
    flush(&mut pending, &mut pending_code, &mut lines);
    lines
}

/// The text before a trailing line comment, ignoring `%` inside strings.
fn code_part(line: &str) -> &str {
    let mut in_string = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_string = !in_string,
            COMMENT if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}

/// Every `name/arity` a line makes visible through `#show` directives.
fn shown_predicates(line: &str) -> Vec<String> {
    SHOW.captures_iter(code_part(line))
        .map(|caps| format!("{}/{}", &caps[1], &caps[2]))
        .collect()
}

/// Every `name(args)` occurrence without nested parentheses, as `name/arity`.
fn predicates(text: &str) -> BTreeSet<String> {
    PREDICATE
        .captures_iter(text)
        .map(|caps| {
            let arity = caps[2].split(',').filter(|a| !a.trim().is_empty()).count();
            format!("{}/{}", &caps[1], arity)
        })
        .collect()
}
