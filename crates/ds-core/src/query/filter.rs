//! Filter clause compiler.
//!
//! A [`FilterSpec`] is built once per search surface from its keywords,
//! keyword mapping and raw-field set. At request time [`FilterSpec::compile`]
//! is a pure map read: every keyword present in the request becomes one
//! `match` clause, grouped by the nesting path of its backend field.
//! Geo fields add a polygon clause at the root when their parameter holds a
//! JSON list of at least three points; anything else is ignored.

use super::Query;
use crate::types::Params;
use serde_json::Value;
use std::collections::BTreeSet;

/// Separator between a nested document path and its fields.
pub const PATH_SEPARATOR: char = '.';

/// Suffix selecting the non-analysed variant of a field.
pub const RAW_SUFFIX: &str = ".raw";

/// Fewest points that make a polygon.
pub const MIN_POLYGON_POINTS: usize = 3;

/// Where a clause is evaluated: the document root or a nested document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NestingPath {
    Root,
    Nested(String),
}

/// One recognised filter parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterField {
    pub parameter: String,
    /// Backend field, already carrying the `.raw` suffix when applicable.
    pub field: String,
    pub nested_path: Option<String>,
    /// True when the parameter went through the keyword mapping.
    pub mapped: bool,
}

/// A parameter whose value is a polygon to match the point at `field` against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoField {
    pub parameter: String,
    pub field: String,
    /// Backend query name, e.g. `geo_polygon`.
    pub kind: String,
}

/// A clause applied to every request of a surface.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedFilter {
    pub field: String,
    pub value: Value,
}

/// A mapped filter parameter as the caller supplied it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoedFilter {
    pub parameter: String,
    pub value: String,
}

/// Compiler output: clauses grouped by nesting path, plus the echoed filters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilters {
    /// Root first, then nested paths in order of first appearance.
    pub clauses: Vec<(NestingPath, Vec<Query>)>,
    pub echoed: Vec<EchoedFilter>,
}

impl CompiledFilters {
    pub fn clause_count(&self) -> usize {
        self.clauses.iter().map(|(_, c)| c.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.clause_count() == 0
    }

    fn push(&mut self, path: NestingPath, clause: Query) {
        match self.clauses.iter_mut().find(|(p, _)| *p == path) {
            Some((_, list)) => list.push(clause),
            None => self.clauses.push((path, vec![clause])),
        }
    }
}

/// Static table of `{parameter → field, nested path}` for one surface.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterSpec {
    fields: Vec<FilterField>,
    geo: Vec<GeoField>,
    fixed: Vec<FixedFilter>,
}

impl FilterSpec {
    /// Build the table. `mapping` yields the backend field for a parameter;
    /// a mapped field containing a separator lives in the nested document
    /// named by its first segment.
    pub fn new<'a>(
        keywords: impl IntoIterator<Item = &'a str>,
        mapping: impl Fn(&str) -> Option<&'a str>,
        raw_fields: &BTreeSet<String>,
        fixed: Vec<FixedFilter>,
    ) -> Self {
        let fields = keywords
            .into_iter()
            .map(|parameter| {
                let (field, nested_path, mapped) = match mapping(parameter) {
                    Some(target) => {
                        let nested = target
                            .split_once(PATH_SEPARATOR)
                            .map(|(path, _)| path.to_string());
                        (target, nested, true)
                    }
                    None => (parameter, None, false),
                };
                FilterField {
                    parameter: parameter.to_string(),
                    field: term_field(field, raw_fields),
                    nested_path,
                    mapped,
                }
            })
            .collect();
        Self {
            fields,
            geo: Vec::new(),
            fixed,
        }
    }

    pub fn with_geo_fields(mut self, geo: Vec<GeoField>) -> Self {
        self.geo = geo;
        self
    }

    pub fn geo_fields(&self) -> &[GeoField] {
        &self.geo
    }

    pub fn fields(&self) -> &[FilterField] {
        &self.fields
    }

    pub fn field(&self, parameter: &str) -> Option<&FilterField> {
        self.fields.iter().find(|f| f.parameter == parameter)
    }

    /// Compile the filters of one request.
    ///
    /// Absent parameters are skipped; an empty string is a real value and
    /// matches empty-valued documents. Fixed filters always land under root.
    pub fn compile(&self, params: &Params) -> CompiledFilters {
        let mut out = CompiledFilters {
            clauses: vec![(NestingPath::Root, Vec::new())],
            echoed: Vec::new(),
        };

        for spec in &self.fields {
            let Some(value) = params.get(&spec.parameter) else {
                continue;
            };
            if spec.mapped {
                out.echoed.push(EchoedFilter {
                    parameter: spec.parameter.clone(),
                    value: value.to_string(),
                });
            }
            let path = match &spec.nested_path {
                Some(p) => NestingPath::Nested(p.clone()),
                None => NestingPath::Root,
            };
            out.push(path, Query::match_value(spec.field.clone(), value));
        }

        for geo in &self.geo {
            let Some(points) = params.get(&geo.parameter).and_then(polygon_points) else {
                continue;
            };
            out.push(
                NestingPath::Root,
                Query::Geo {
                    kind: geo.kind.clone(),
                    field: geo.field.clone(),
                    points,
                },
            );
        }

        for fixed in &self.fixed {
            out.push(NestingPath::Root, Query::match_value(fixed.field.clone(), fixed.value.clone()));
        }
        out
    }
}

/// Points of a polygon parameter: a JSON array with at least
/// [`MIN_POLYGON_POINTS`] entries. Malformed JSON and shorter lists give
/// `None`.
pub fn polygon_points(raw: &str) -> Option<Vec<Value>> {
    match serde_json::from_str(raw) {
        Ok(Value::Array(points)) if points.len() >= MIN_POLYGON_POINTS => Some(points),
        _ => None,
    }
}

/// Field name to query: `<field>.raw` for value-preserving fields.
pub fn term_field(field: &str, raw_fields: &BTreeSet<String>) -> String {
    if raw_fields.contains(field) {
        format!("{field}{RAW_SUFFIX}")
    } else {
        field.to_string()
    }
}
