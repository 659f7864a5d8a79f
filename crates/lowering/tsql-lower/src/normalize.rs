//! Canonical spacing for embedded source text
//!
//! Every query, condition and default that lands in the AST goes through
//! [`normalize`], so equal statements compare equal regardless of how the
//! source was laid out.

use regex::Captures;

/// Canonicalize a source fragment
///
/// Comparison and arithmetic operators get one space on each side, `IS NULL`
/// and `IS NOT NULL` are respelled, and trailing semicolons are dropped.
/// Commas are followed by one space; space before a comma is kept as is, so
/// `a ,b` becomes `a , b`. `ISNULL(` calls are left alone and whitespace runs
/// collapse. Applying it twice gives the same result as once.
#[must_use]
pub fn normalize(text: &str) -> String {
    let joined = regex!(r"<\s+>").replace_all(text, "<>");
    let joined = regex!(r"!\s+=").replace_all(&joined, "!=");
    let padded = regex!(r"<>|!=|<=|>=|==|!<|!>|[<>=+\-*/]").replace_all(&joined, " $0 ");
    let not_null = regex!(r"(?i)\bIS\s*NOT\s*NULL\b").replace_all(&padded, "IS NOT NULL");
    let null = regex!(r"(?i)\bIS\s*NULL\b(\s*\()?").replace_all(&not_null, |caps: &Captures<'_>| {
        if caps.get(1).is_some() {
            caps[0].to_string()
        } else {
            "IS NULL".to_string()
        }
    });
    let commas = null.replace(',', ", ");
    let collapsed = regex!(r"\s+").replace_all(&commas, " ");

    collapsed
        .trim()
        .trim_end_matches(|ch: char| ch == ';' || ch.is_whitespace())
        .to_string()
}

/// Collapse every whitespace run to one space and trim
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Data type text without layout: `DECIMAL ( 18 , 2 )` becomes `DECIMAL(18,2)`
///
/// Spaces between words survive (`DOUBLE PRECISION`).
#[must_use]
pub fn compact_type(text: &str) -> String {
    let collapsed = collapse_whitespace(text);
    regex!(r"\s*([(),])\s*")
        .replace_all(&collapsed, "$1")
        .into_owned()
}

/// `@`-variables referenced by a condition
///
/// `ISNULL(` calls and `IS [NOT] NULL` tests are removed first so they can
/// never glue onto a name; `@@` system variables are skipped.
#[must_use]
pub fn referenced_variables(text: &str) -> Vec<String> {
    let cleaned = regex!(r"(?i)\bISNULL\s*\(").replace_all(text, "(");
    let cleaned = regex!(r"(?i)\bIS\s+NOT\s+NULL\b").replace_all(&cleaned, " ");
    let cleaned = regex!(r"(?i)\bIS\s+NULL\b").replace_all(&cleaned, " ");

    let mut names: Vec<String> = Vec::new();
    for found in regex!(r"@@?\w+").find_iter(&cleaned) {
        let name = found.as_str();
        if name.starts_with("@@") || names.iter().any(|known| known == name) {
            continue;
        }
        names.push(name.to_string());
    }
    names
}
