//! Domain-specific assertion macros for dataselectie harnesses.
//!
//! These wrap `pretty_assertions` and add failure messages that say which
//! pipeline guarantee broke: nested grouping, the search window, export row
//! order or error classification.

// ---------------------------------------------------------------------------
// Query documents
// ---------------------------------------------------------------------------

/// Assert that no nested path is wrapped more than once in a query tree.
///
/// ```rust
/// assert_single_nested_per_path!(compiled.document.query);
/// ```
#[macro_export]
macro_rules! assert_single_nested_per_path {
    ($query:expr) => {{
        let query: &ds_core::query::Query = &$query;
        let counts = query.nested_paths();
        for (path, n) in &counts {
            if *n > 1 {
                panic!(
                    "assert_single_nested_per_path! failed: path {:?} wrapped {} times.\n  query: {}",
                    path,
                    n,
                    query.to_json()
                );
            }
        }
    }};
}

/// Assert that a document asks for no row past the search window. `from`
/// itself may lie beyond it; `size` must then be zero.
#[macro_export]
macro_rules! assert_window_within {
    ($doc:expr, $max:expr) => {{
        let doc: &ds_core::query::QueryDocument = &$doc;
        let max: u64 = $max;
        let from = doc.from.unwrap_or(0);
        let size = doc.size.unwrap_or(0);
        if size > max.saturating_sub(from) {
            panic!(
                "assert_window_within! failed: from {} + size {} exceeds window {}",
                from, size, max
            );
        }
    }};
}

// ---------------------------------------------------------------------------
// Export streams
// ---------------------------------------------------------------------------

/// Assert that the first export row is the header and no other row is.
///
/// ```rust
/// let rows: Vec<ExportRow> = stream.try_collect().await?;
/// assert_header_first!(rows);
/// ```
#[macro_export]
macro_rules! assert_header_first {
    ($rows:expr) => {{
        let rows: &[ds_core::export::ExportRow] = &$rows;
        match rows.first() {
            Some(first) if first.is_header() => {}
            Some(first) => panic!("assert_header_first! failed: first row is data: {:?}", first.values()),
            None => panic!("assert_header_first! failed: export produced no rows"),
        }
        if let Some(pos) = rows.iter().skip(1).position(|r| r.is_header()) {
            panic!("assert_header_first! failed: second header at row {}", pos + 1);
        }
    }};
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Assert that a pipeline result failed with a client (4xx-class) error.
#[macro_export]
macro_rules! assert_client_error {
    ($result:expr) => {{
        match $result {
            Err(e) => {
                let err: ds_core::Error = e.into();
                if !err.is_client_error() {
                    panic!("assert_client_error! failed: {} is not a client error ({:?})", err, err);
                }
            }
            Ok(v) => panic!("assert_client_error! failed: expected an error, got {:?}", v),
        }
    }};
}
