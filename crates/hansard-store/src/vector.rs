//! LanceDB-backed vector index for moment and chunk embeddings
//!
//! Two tables share one schema; the vector column dimension is fixed when a
//! table is first created, from the first batch written to it. Upserts are
//! idempotent by id; a whole transcript's rows can be replaced atomically by
//! deleting on `transcript_id` before the add.

use std::sync::Arc;

use arrow_array::types::Float32Type;
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use tracing::info;

use crate::error::StoreError;

/// Table holding one embedding per extracted moment
pub const MOMENTS_TABLE: &str = "moment_embeddings";
/// Table holding one embedding per RAG chunk
pub const CHUNKS_TABLE: &str = "chunk_embeddings";

/// Rows are written to LanceDB in batches of at most this size
const UPSERT_BATCH_SIZE: usize = 1000;

/// One row of the vector index
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub transcript_id: String,
    pub speaker: Option<String>,
    pub topic: Option<String>,
    pub text: String,
    pub chunk_index: i32,
    pub section_title: Option<String>,
    pub subsection_title: Option<String>,
    pub word_count: i32,
    pub virality_score: Option<f32>,
    pub embedding: Vec<f32>,
}

/// One search hit with its metadata columns
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub transcript_id: String,
    pub speaker: Option<String>,
    pub topic: Option<String>,
    pub text: String,
    pub chunk_index: i32,
    pub section_title: Option<String>,
    pub subsection_title: Option<String>,
    pub word_count: i32,
    pub virality_score: Option<f32>,
    /// Similarity in [0, 1], derived from the cosine distance
    pub score: f32,
}

/// Vector index rooted at a LanceDB URI (local path or s3://)
#[derive(Debug, Clone)]
pub struct VectorIndex(String);

impl VectorIndex {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    async fn connect(&self) -> Result<lancedb::Connection, StoreError> {
        Ok(lancedb::connect(&self.0).execute().await?)
    }

    fn schema(dim: i32) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("transcript_id", DataType::Utf8, false),
            Field::new("speaker", DataType::Utf8, true),
            Field::new("topic", DataType::Utf8, true),
            Field::new("text", DataType::Utf8, false),
            Field::new("chunk_index", DataType::Int32, false),
            Field::new("section_title", DataType::Utf8, true),
            Field::new("subsection_title", DataType::Utf8, true),
            Field::new("word_count", DataType::Int32, false),
            Field::new("virality_score", DataType::Float32, true),
            Field::new(
                "vector",
                DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim),
                false,
            ),
        ]))
    }

    fn to_batch(records: &[VectorRecord], dim: i32) -> Result<RecordBatch, StoreError> {
        let schema = Self::schema(dim);

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let transcript_ids: Vec<&str> = records.iter().map(|r| r.transcript_id.as_str()).collect();
        let speakers: Vec<Option<&str>> = records.iter().map(|r| r.speaker.as_deref()).collect();
        let topics: Vec<Option<&str>> = records.iter().map(|r| r.topic.as_deref()).collect();
        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        let chunk_indices: Vec<i32> = records.iter().map(|r| r.chunk_index).collect();
        let section_titles: Vec<Option<&str>> =
            records.iter().map(|r| r.section_title.as_deref()).collect();
        let subsection_titles: Vec<Option<&str>> =
            records.iter().map(|r| r.subsection_title.as_deref()).collect();
        let word_counts: Vec<i32> = records.iter().map(|r| r.word_count).collect();
        let virality_scores: Vec<Option<f32>> =
            records.iter().map(|r| r.virality_score).collect();

        let embedding_lists: Vec<Option<Vec<Option<f32>>>> = records
            .iter()
            .map(|r| Some(r.embedding.iter().copied().map(Some).collect()))
            .collect();
        let vector_array =
            FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(embedding_lists, dim);

        Ok(RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(transcript_ids)),
                Arc::new(StringArray::from(speakers)),
                Arc::new(StringArray::from(topics)),
                Arc::new(StringArray::from(texts)),
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(StringArray::from(section_titles)),
                Arc::new(StringArray::from(subsection_titles)),
                Arc::new(Int32Array::from(word_counts)),
                Arc::new(Float32Array::from(virality_scores)),
                Arc::new(vector_array) as Arc<dyn Array>,
            ],
        )?)
    }

    async fn open_or_create(
        &self,
        conn: &lancedb::Connection,
        table_name: &str,
        dim: i32,
    ) -> Result<lancedb::Table, StoreError> {
        match conn.open_table(table_name).execute().await {
            Ok(t) => Ok(t),
            Err(_) => {
                info!("Creating {} table ({}-dim)", table_name, dim);
                Ok(conn
                    .create_empty_table(table_name, Self::schema(dim))
                    .execute()
                    .await?)
            }
        }
    }

    /// Replace all rows for a transcript with the given records.
    ///
    /// Idempotent: rerunning with the same records yields the same table
    /// contents. Records whose embedding length differs from the first
    /// record's are rejected as an invalid batch.
    pub async fn replace_transcript(
        &self,
        table_name: &str,
        transcript_id: &str,
        records: &[VectorRecord],
    ) -> Result<usize, StoreError> {
        let conn = self.connect().await?;

        let Some(first) = records.first() else {
            // nothing to write; still clear any stale rows
            if let Ok(table) = conn.open_table(table_name).execute().await {
                table
                    .delete(&format!("transcript_id = '{}'", escape(transcript_id)))
                    .await?;
            }
            return Ok(0);
        };

        let dim = i32::try_from(first.embedding.len())
            .map_err(|_| StoreError::InvalidBatch("embedding too large".into()))?;
        if dim == 0 {
            return Err(StoreError::InvalidBatch("zero-dimension embedding".into()));
        }
        if let Some(bad) = records.iter().find(|r| r.embedding.len() != first.embedding.len()) {
            return Err(StoreError::InvalidBatch(format!(
                "mixed embedding dimensions in one batch ({} vs {})",
                bad.embedding.len(),
                first.embedding.len()
            )));
        }

        let table = self.open_or_create(&conn, table_name, dim).await?;
        table
            .delete(&format!("transcript_id = '{}'", escape(transcript_id)))
            .await?;

        for chunk in records.chunks(UPSERT_BATCH_SIZE) {
            let batch = Self::to_batch(chunk, dim)?;
            let schema = batch.schema();
            let batches = RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema);
            table.add(Box::new(batches)).execute().await?;
        }

        info!(
            transcript_id,
            table = table_name,
            rows = records.len(),
            "Replaced vector rows"
        );
        Ok(records.len())
    }

    /// Nearest-neighbour search with an optional metadata filter expression
    pub async fn search(
        &self,
        table_name: &str,
        query: &[f32],
        top_k: usize,
        filter: Option<String>,
    ) -> Result<Vec<VectorHit>, StoreError> {
        let conn = self.connect().await?;
        let table = match conn.open_table(table_name).execute().await {
            Ok(t) => t,
            // no table yet means nothing was ever indexed
            Err(_) => return Ok(Vec::new()),
        };

        let mut search = table.vector_search(query.to_vec())?;
        if let Some(f) = filter {
            search = search.only_if(f);
        }
        let batches: Vec<RecordBatch> = search
            .limit(top_k)
            .execute()
            .await?
            .try_collect()
            .await?;

        parse_hits(&batches)
    }

    /// Filter expression matching one transcript's rows
    #[must_use]
    pub fn transcript_filter(transcript_id: &str) -> String {
        format!("transcript_id = '{}'", escape(transcript_id))
    }
}

fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

/// Convert a cosine distance into a [0, 1] similarity score
fn similarity_from_distance(distance: f32) -> f32 {
    (1.0 - distance / 2.0).clamp(0.0, 1.0)
}

fn parse_hits(batches: &[RecordBatch]) -> Result<Vec<VectorHit>, StoreError> {
    let mut hits = Vec::new();

    for batch in batches {
        if batch.num_rows() == 0 {
            continue;
        }

        let distances = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

        let string_col = |name: &str| -> Option<&StringArray> {
            batch
                .column_by_name(name)
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        };
        let int_col = |name: &str| -> Option<&Int32Array> {
            batch
                .column_by_name(name)
                .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
        };

        let ids = string_col("id")
            .ok_or_else(|| StoreError::InvalidBatch("missing id column".into()))?;
        let transcript_ids = string_col("transcript_id")
            .ok_or_else(|| StoreError::InvalidBatch("missing transcript_id column".into()))?;
        let texts = string_col("text")
            .ok_or_else(|| StoreError::InvalidBatch("missing text column".into()))?;
        let chunk_indices = int_col("chunk_index")
            .ok_or_else(|| StoreError::InvalidBatch("missing chunk_index column".into()))?;
        let word_counts = int_col("word_count")
            .ok_or_else(|| StoreError::InvalidBatch("missing word_count column".into()))?;
        let speakers = string_col("speaker");
        let topics = string_col("topic");
        let section_titles = string_col("section_title");
        let subsection_titles = string_col("subsection_title");
        let virality_scores = batch
            .column_by_name("virality_score")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

        let opt_string = |col: Option<&StringArray>, i: usize| -> Option<String> {
            col.and_then(|c| {
                if c.is_null(i) {
                    None
                } else {
                    Some(c.value(i).to_string())
                }
            })
        };

        for i in 0..batch.num_rows() {
            let distance = distances.map_or(0.0, |d| d.value(i));
            hits.push(VectorHit {
                id: ids.value(i).to_string(),
                transcript_id: transcript_ids.value(i).to_string(),
                speaker: opt_string(speakers, i),
                topic: opt_string(topics, i),
                text: texts.value(i).to_string(),
                chunk_index: chunk_indices.value(i),
                section_title: opt_string(section_titles, i),
                subsection_title: opt_string(subsection_titles, i),
                word_count: word_counts.value(i),
                virality_score: virality_scores.and_then(|v| {
                    if v.is_null(i) {
                        None
                    } else {
                        Some(v.value(i))
                    }
                }),
                score: similarity_from_distance(distance),
            });
        }
    }

    // batches arrive ordered per-batch; enforce a global descending order
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_maps_distance_range() {
        assert!((similarity_from_distance(0.0) - 1.0).abs() < f32::EPSILON);
        assert!((similarity_from_distance(2.0) - 0.0).abs() < f32::EPSILON);
        assert!((similarity_from_distance(1.0) - 0.5).abs() < f32::EPSILON);
        // out-of-range distances clamp instead of escaping [0, 1]
        assert_eq!(similarity_from_distance(4.0), 0.0);
        assert_eq!(similarity_from_distance(-1.0), 1.0);
    }

    #[test]
    fn filter_escapes_quotes() {
        assert_eq!(
            VectorIndex::transcript_filter("it's"),
            "transcript_id = 'it''s'"
        );
    }

    #[test]
    fn to_batch_builds_rows() {
        let rec = |id: &str, emb: Vec<f32>| VectorRecord {
            id: id.to_string(),
            transcript_id: "t1".to_string(),
            speaker: None,
            topic: None,
            text: "hello".to_string(),
            chunk_index: 0,
            section_title: None,
            subsection_title: None,
            word_count: 1,
            virality_score: None,
            embedding: emb,
        };
        let batch = VectorIndex::to_batch(&[rec("a", vec![0.1, 0.2]), rec("b", vec![0.3, 0.4])], 2);
        assert!(batch.is_ok());
        assert_eq!(batch.unwrap().num_rows(), 2);
    }
}
