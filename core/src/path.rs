//! Path template resolution.
//!
//! Templates such as `/{index}/_doc/{id}` are filled from a call scope layered
//! over the client's default scope. Longer templates are tried first, so the
//! most specific template whose placeholders can all be filled wins.

use std::cmp::Reverse;

use crate::error::ApiError;
use crate::scope::Scope;

/// Pick the longest template that fully resolves and return the filled path.
///
/// Candidates are ordered by descending character length; the sort is stable,
/// so equally long templates keep their declared order. Evaluation stops at the
/// first candidate with no unresolved placeholder.
pub fn resolve(templates: &[String], call: &Scope, defaults: &Scope) -> Result<String, ApiError> {
    let mut candidates: Vec<&String> = templates.iter().collect();
    candidates.sort_by_key(|t| Reverse(t.chars().count()));

    candidates
        .into_iter()
        .find_map(|template| fill(template, |name| call.get(name).or_else(|| defaults.get(name))))
        .ok_or_else(|| ApiError::PathResolution {
            templates: templates.to_vec(),
            scope: defaults.merged(call),
        })
}

/// Substitute every `{name}` in `template`. Returns `None` if any placeholder
/// has no value.
fn fill<'a>(template: &str, lookup: impl Fn(&str) -> Option<&'a str>) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}')?;
        out.push_str(lookup(&after[..close])?);
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Some(out)
}
