//! Streaming export engine.
//!
//! [`ExportEngine::start`] opens a cursor over the full match set and returns
//! a lazy, finite, non-restartable stream of [`ExportRow`]s: first the header,
//! then one row per matched record. The cursor is consumed in fixed-size
//! batches with exactly one record-store lookup per non-empty batch; at most
//! one batch is held in memory and the next batch is only pulled once the
//! previous one has been fully yielded.
//!
//! Dropping the stream drops the cursor, which releases it. A failure ends
//! the stream after yielding the error; rows already yielded stand.

use crate::backend::{ExportCursor, RecordStore, SearchBackend};
use crate::error::{Error, Result};
use crate::hydrate::{merge_row, SourceFields};
use crate::query::{compile_export, QueryDocument};
use crate::surface::SearchSurface;
use crate::types::{Hit, Params, Record};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// One item of an export stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportRow {
    /// Display labels only, always first.
    Header(Vec<String>),
    Data(Vec<String>),
}

impl ExportRow {
    pub fn values(&self) -> &[String] {
        match self {
            ExportRow::Header(v) | ExportRow::Data(v) => v,
        }
    }

    pub fn is_header(&self) -> bool {
        matches!(self, ExportRow::Header(_))
    }
}

#[derive(Clone)]
pub struct ExportEngine {
    backend: Arc<dyn SearchBackend>,
    store: Arc<dyn RecordStore>,
    batch_size: usize,
}

impl ExportEngine {
    pub fn new(backend: Arc<dyn SearchBackend>, store: Arc<dyn RecordStore>, batch_size: usize) -> Self {
        Self {
            backend,
            store,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Compile the export query, open the cursor and return the row stream.
    ///
    /// Failing to open the cursor is reported here, before any row exists.
    pub async fn start(
        &self,
        surface: Arc<SearchSurface>,
        params: &Params,
    ) -> Result<impl Stream<Item = Result<ExportRow>> + Send + 'static> {
        let compiled = compile_export(surface.as_ref(), params);
        let cursor = self
            .backend
            .open_cursor(&surface.index, &compiled.document, self.batch_size)
            .await
            .inspect_err(|e| tracing::error!(surface = %surface.name, error = %e, "could not open export cursor"))?;

        tracing::debug!(surface = %surface.name, batch_size = self.batch_size, "export started");
        let state = ExportState {
            store: Arc::clone(&self.store),
            surface,
            batch_size: self.batch_size,
            stage: Stage::Header,
            cursor: Some(cursor),
            pending: VecDeque::new(),
            ready: VecDeque::new(),
            last_batch: false,
            batches: 0,
        };
        Ok(futures::stream::try_unfold(state, ExportState::step))
    }

    /// Document the export would run, for inspection.
    pub fn document(surface: &SearchSurface, params: &Params) -> QueryDocument {
        compile_export(surface, params).document
    }
}

// ---------------------------------------------------------------------------
// Stream state machine
// ---------------------------------------------------------------------------

enum Stage {
    Header,
    Rows,
    Done,
}

struct ExportState {
    store: Arc<dyn RecordStore>,
    surface: Arc<SearchSurface>,
    batch_size: usize,
    stage: Stage,
    cursor: Option<Box<dyn ExportCursor>>,
    /// Hits pulled from the cursor but not yet batched.
    pending: VecDeque<Hit>,
    /// Rows of the current batch not yet yielded.
    ready: VecDeque<Vec<String>>,
    last_batch: bool,
    batches: usize,
}

impl ExportState {
    async fn step(mut self) -> Result<Option<(ExportRow, Self)>> {
        loop {
            match self.stage {
                Stage::Header => {
                    self.stage = Stage::Rows;
                    let header = ExportRow::Header(self.surface.export_headers());
                    return Ok(Some((header, self)));
                }
                Stage::Done => return Ok(None),
                Stage::Rows => {
                    if let Some(row) = self.ready.pop_front() {
                        return Ok(Some((ExportRow::Data(row), self)));
                    }
                    if self.last_batch {
                        self.finish().await?;
                        return Ok(None);
                    }
                    self.load_batch().await?;
                }
            }
        }
    }

    /// Pull the next batch from the cursor and hydrate it with one lookup.
    async fn load_batch(&mut self) -> Result<()> {
        let Some(cursor) = self.cursor.as_mut() else {
            self.last_batch = true;
            return Ok(());
        };

        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            if self.pending.is_empty() {
                let page = cursor.next_page().await?;
                if page.is_empty() {
                    break;
                }
                self.pending.extend(page);
            }
            if let Some(hit) = self.pending.pop_front() {
                batch.push(hit);
            }
        }

        if batch.len() < self.batch_size {
            self.last_batch = true;
        }
        if batch.is_empty() {
            return Ok(());
        }

        self.batches += 1;
        let ids: Vec<String> = batch.iter().map(|h| h.id.clone()).collect();
        let records = self.store.find_by_ids(&self.surface.model, &ids, &[]).await?;
        let mut by_id: HashMap<String, Record> = records.into_iter().map(|r| (r.id.clone(), r)).collect();

        for hit in &batch {
            // Identifiers without a record are skipped.
            let Some(record) = by_id.remove(&hit.id) else {
                continue;
            };
            let row = merge_row(&record, Some(hit), SourceFields::All);
            let values = self
                .surface
                .export_columns
                .iter()
                .map(|c| row.get(&c.field).cloned().unwrap_or_default())
                .collect();
            self.ready.push_back(values);
        }

        tracing::debug!(
            surface = %self.surface.name,
            batch = self.batches,
            hits = batch.len(),
            rows = self.ready.len(),
            "export batch hydrated"
        );
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        self.stage = Stage::Done;
        if let Some(cursor) = self.cursor.take() {
            cursor.close().await?;
        }
        tracing::debug!(surface = %self.surface.name, batches = self.batches, "export finished");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CSV encoding
// ---------------------------------------------------------------------------

/// Encodes export rows as CSV lines terminated by `\r\n`.
pub struct CsvEncoder {
    builder: csv::WriterBuilder,
}

impl CsvEncoder {
    pub fn new(delimiter: char) -> Result<Self> {
        let delimiter = u8::try_from(delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| Error::Encode(format!("delimiter {delimiter:?} is not a single ASCII character")))?;
        let mut builder = csv::WriterBuilder::new();
        builder
            .delimiter(delimiter)
            .terminator(csv::Terminator::CRLF)
            .has_headers(false);
        Ok(Self { builder })
    }

    pub fn encode(&self, row: &ExportRow) -> Result<Bytes> {
        let mut writer = self.builder.from_writer(Vec::with_capacity(256));
        writer
            .write_record(row.values())
            .map_err(|e| Error::Encode(e.to_string()))?;
        let buf = writer.into_inner().map_err(|e| Error::Encode(e.to_string()))?;
        Ok(Bytes::from(buf))
    }
}

/// Turn a row stream into a stream of CSV chunks, one line per chunk.
pub fn encode_csv<S>(rows: S, delimiter: char) -> Result<impl Stream<Item = Result<Bytes>> + Send + 'static>
where
    S: Stream<Item = Result<ExportRow>> + Send + 'static,
{
    let encoder = CsvEncoder::new(delimiter)?;
    Ok(rows.map(move |row| row.and_then(|r| encoder.encode(&r))))
}
