//! LanceDB-backed chunk index.
//!
//! Rows are keyed by chunk id; `upsert` goes through `merge_insert` so
//! re-indexing overwrites instead of duplicating. Queries return rows by
//! ascending L2 distance.

use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray, UInt32Array};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::Connection;
use std::path::Path;
use std::sync::Arc;

use docqa_core::error::{Error, Result};
use docqa_core::traits::{ensure_aligned, VectorIndex};
use docqa_core::types::{ChunkId, ChunkMetadata, QueryResult};

pub mod schema;
pub mod table;

use schema::build_chunk_schema;
use table::{open_db, table_exists};

pub struct LanceVectorIndex {
    db: Connection,
    table_name: String,
    dim: usize,
}

impl LanceVectorIndex {
    pub async fn open(db_path: &Path, table_name: &str, dim: usize) -> Result<Self> {
        let db = open_db(db_path).await.map_err(Error::operation)?;
        Ok(Self { db, table_name: table_name.to_string(), dim })
    }

    async fn exists(&self) -> Result<bool> {
        table_exists(&self.db, &self.table_name).await.map_err(Error::operation)
    }

    fn to_record_batch(
        &self,
        ids: &[ChunkId],
        texts: &[String],
        metadatas: &[ChunkMetadata],
        vectors: &[Vec<f32>],
    ) -> Result<RecordBatch> {
        if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != self.dim) {
            return Err(Error::InvalidInput(format!("vector {i} has dimension {} (index expects {})", v.len(), self.dim)));
        }
        let dim = i32::try_from(self.dim).map_err(Error::operation)?;
        let rows: Vec<Option<Vec<Option<f32>>>> =
            vectors.iter().map(|v| Some(v.iter().copied().map(Some).collect())).collect();
        RecordBatch::try_new(
            build_chunk_schema(dim),
            vec![
                Arc::new(StringArray::from(ids.to_vec())),
                Arc::new(StringArray::from_iter_values(metadatas.iter().map(|m| m.doc_id.as_str()))),
                Arc::new(StringArray::from_iter_values(metadatas.iter().map(|m| m.title.as_str()))),
                Arc::new(StringArray::from_iter_values(metadatas.iter().map(|m| m.source.as_str()))),
                Arc::new(UInt32Array::from(metadatas.iter().map(|m| m.page).collect::<Vec<_>>())),
                Arc::new(UInt32Array::from(metadatas.iter().map(|m| m.section).collect::<Vec<_>>())),
                Arc::new(StringArray::from(texts.to_vec())),
                Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(rows, dim)),
            ],
        )
        .map_err(Error::operation)
    }
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| Error::Operation(format!("column '{name}' missing or of unexpected type")))
}

fn append_rows(batch: &RecordBatch, out: &mut QueryResult) -> Result<()> {
    let ids = column::<StringArray>(batch, "id")?;
    let doc_ids = column::<StringArray>(batch, "doc_id")?;
    let titles = column::<StringArray>(batch, "title")?;
    let sources = column::<StringArray>(batch, "source")?;
    let pages = column::<UInt32Array>(batch, "page")?;
    let sections = column::<UInt32Array>(batch, "section")?;
    let texts = column::<StringArray>(batch, "text")?;
    let distances = column::<Float32Array>(batch, "_distance")?;
    for i in 0..batch.num_rows() {
        out.ids.push(ids.value(i).to_string());
        out.documents.push(texts.value(i).to_string());
        out.metadatas.push(ChunkMetadata {
            doc_id: doc_ids.value(i).to_string(),
            title: titles.value(i).to_string(),
            source: sources.value(i).to_string(),
            page: pages.is_valid(i).then(|| pages.value(i)),
            section: sections.value(i),
        });
        out.distances.push(distances.value(i));
    }
    Ok(())
}

#[async_trait]
impl VectorIndex for LanceVectorIndex {
    fn name(&self) -> &str {
        &self.table_name
    }

    async fn upsert(
        &self,
        ids: &[ChunkId],
        texts: &[String],
        metadatas: &[ChunkMetadata],
        vectors: &[Vec<f32>],
    ) -> Result<()> {
        ensure_aligned(ids, texts, metadatas, vectors)?;
        if ids.is_empty() {
            return Ok(());
        }
        let batch = self.to_record_batch(ids, texts, metadatas, vectors)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        if self.exists().await? {
            let table = self.db.open_table(&self.table_name).execute().await.map_err(Error::operation)?;
            // Upsert behavior via merge_insert: id is unique
            let mut mi = table.merge_insert(&["id"]);
            mi.when_matched_update_all(None).when_not_matched_insert_all();
            let _ = mi.execute(reader).await.map_err(Error::operation)?;
        } else {
            self.db.create_table(&self.table_name, reader).execute().await.map_err(Error::operation)?;
            tracing::info!(table = %self.table_name, dim = self.dim, "created table");
        }
        tracing::debug!(table = %self.table_name, rows = ids.len(), "upserted");
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<QueryResult> {
        if !self.exists().await? {
            return Err(Error::IndexNotFound(self.table_name.clone()));
        }
        let table = self.db.open_table(&self.table_name).execute().await.map_err(Error::operation)?;
        let mut out = QueryResult::default();
        if k == 0 || table.count_rows(None).await.map_err(Error::operation)? == 0 {
            return Ok(out);
        }
        let mut stream = table
            .vector_search(vector.to_vec())
            .map_err(Error::operation)?
            .limit(k)
            .execute()
            .await
            .map_err(Error::operation)?;
        while let Some(batch) = stream.try_next().await.map_err(Error::operation)? {
            append_rows(&batch, &mut out)?;
        }
        Ok(out)
    }

    async fn count(&self) -> Result<usize> {
        if !self.exists().await? {
            return Ok(0);
        }
        let table = self.db.open_table(&self.table_name).execute().await.map_err(Error::operation)?;
        table.count_rows(None).await.map_err(Error::operation)
    }
}
