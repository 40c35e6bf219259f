//! String based constraints: `sh:minLength`, `sh:maxLength`, `sh:pattern`, `sh:languageIn`
//! and `sh:uniqueLang`.
//!
//! Lengths and patterns apply to the lexical form of IRIs and literals. Blank nodes have no
//! lexical form and fail them. A pattern rejected by its limits is skipped.

use oxrdf::{Graph, Term};

use super::{check_focus, check_values, property_result};
use crate::graph::lexical_form;
use crate::model::{ConstraintSet, NodeShape, PropertyShape};
use crate::report::{ResultDetail, ValidationResult};

/// Checks one value.
pub fn check(constraints: &ConstraintSet, value: &Term) -> Vec<ResultDetail> {
    let mut failures = Vec::new();
    let lexical = lexical_form(value);
    let length = lexical.map(|s| s.chars().count());
    let length_u64 = length.map(|l| u64::try_from(l).unwrap_or(u64::MAX));
    if let Some(min) = constraints
        .min_length
        .filter(|min| length_u64.is_none_or(|l| l < *min))
    {
        failures.push(ResultDetail::MinLength {
            min,
            actual: length,
        });
    }
    if let Some(max) = constraints
        .max_length
        .filter(|max| length_u64.is_none_or(|l| l > *max))
    {
        failures.push(ResultDetail::MaxLength {
            max,
            actual: length,
        });
    }
    for pattern in &constraints.patterns {
        let matched = match lexical {
            Some(text) => pattern.is_match(text),
            None => pattern.rejection().is_none().then_some(false),
        };
        if matched == Some(false) {
            failures.push(ResultDetail::Pattern {
                pattern: pattern.as_str().to_owned(),
                flags: pattern.flags().map(ToOwned::to_owned),
            });
        }
    }
    if let Some(ranges) = &constraints.language_in {
        let language = match value {
            Term::Literal(l) => l.language(),
            _ => None,
        };
        if !language.is_some_and(|tag| ranges.iter().any(|range| lang_matches(tag, range))) {
            failures.push(ResultDetail::LanguageIn {
                languages: ranges.clone(),
            });
        }
    }
    failures
}

/// SPARQL `langMatches` with basic filtering.
fn lang_matches(tag: &str, range: &str) -> bool {
    if range == "*" {
        return !tag.is_empty();
    }
    tag.len() >= range.len()
        && tag.is_char_boundary(range.len())
        && tag[..range.len()].eq_ignore_ascii_case(range)
        && (tag.len() == range.len() || tag[range.len()..].starts_with('-'))
}

fn applies(constraints: &ConstraintSet) -> bool {
    constraints.min_length.is_some()
        || constraints.max_length.is_some()
        || !constraints.patterns.is_empty()
        || constraints.language_in.is_some()
}

/// Languages used by more than one value, in order of first use.
fn duplicated_languages(values: &[Term]) -> Vec<String> {
    let mut seen = Vec::<(String, usize)>::new();
    for value in values {
        if let Term::Literal(literal) = value {
            if let Some(language) = literal.language() {
                let language = language.to_ascii_lowercase();
                match seen.iter_mut().find(|(l, _)| *l == language) {
                    Some((_, count)) => *count += 1,
                    None => seen.push((language, 1)),
                }
            }
        }
    }
    seen.into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(language, _)| language)
        .collect()
}

pub fn validate_property(
    graph: &Graph,
    focus: &Term,
    shape: &PropertyShape,
) -> Vec<ValidationResult> {
    let mut results = if applies(&shape.constraints) {
        check_values(graph, focus, shape, |value| check(&shape.constraints, value))
    } else {
        Vec::new()
    };
    if shape.constraints.unique_lang {
        let values = shape.values(graph, focus);
        results.extend(duplicated_languages(&values).into_iter().map(|language| {
            property_result(shape, focus, None, ResultDetail::UniqueLang { language })
        }));
    }
    results
}

pub fn validate_node(_graph: &Graph, focus: &Term, shape: &NodeShape) -> Vec<ValidationResult> {
    if !applies(&shape.constraints) {
        return Vec::new();
    }
    check_focus(focus, shape, |value| check(&shape.constraints, value))
}
