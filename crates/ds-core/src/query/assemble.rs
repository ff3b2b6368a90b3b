//! Query assembler: combines the base query with compiled filters.
//!
//! Root clauses go straight into the top-level `bool.filter`. All clauses of
//! one nesting path share a single `nested` wrapper, so they must match the
//! same nested object rather than any object each.

use super::filter::{CompiledFilters, NestingPath};
use super::Query;

/// Free-text phrase-prefix query, or match-all without text.
pub fn base_query(text: Option<&str>, text_fields: &[String]) -> Query {
    match text {
        Some(text) => Query::MultiMatch {
            query: text.to_string(),
            fields: text_fields.to_vec(),
        },
        None => Query::MatchAll,
    }
}

/// Wrap `base` in a boolean query carrying `filters`. Without filters the
/// base query is returned untouched.
pub fn assemble(base: Query, filters: &CompiledFilters) -> Query {
    if filters.is_empty() {
        return base;
    }

    let mut filter = Vec::new();
    for (path, clauses) in &filters.clauses {
        if clauses.is_empty() {
            continue;
        }
        match path {
            NestingPath::Root => filter.extend(clauses.iter().cloned()),
            NestingPath::Nested(path) => filter.push(Query::Nested {
                path: path.clone(),
                query: Box::new(Query::Bool {
                    must: Vec::new(),
                    filter: clauses.clone(),
                }),
            }),
        }
    }

    Query::Bool {
        must: vec![base],
        filter,
    }
}
