//! Qdrant-backed vector index.
//!
//! Implements [`VectorIndex`] over the [qdrant-client](https://docs.rs/qdrant-client)
//! gRPC API. Collections are created with named vectors (`dense` cosine,
//! optional `sparse`, optional `rerank` multi-vector with the max-sim
//! comparator) and a keyword payload index on `ownerId`.

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_output::VectorsOptions;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, Condition, CreateCollectionBuilder,
    CreateFieldIndexCollectionBuilder, DeletePointsBuilder, Distance, FieldType, Filter, Fusion,
    GetPointsBuilder, MultiVectorComparator, MultiVectorConfigBuilder, NamedVectors, PointId,
    PointStruct, PrefetchQueryBuilder, Query, QueryPointsBuilder, SearchParamsBuilder,
    SparseVectorParamsBuilder, SparseVectorsConfigBuilder, UpsertPointsBuilder,
    Value as QdrantValue, Vector, VectorInput, VectorParamsBuilder, VectorsConfigBuilder,
};
use qdrant_client::{Payload, Qdrant};
use tracing::debug;

use passage_core::{PassageError, Result, SparseVector};

use crate::store::{VectorIndex, DENSE_VECTOR, RERANK_VECTOR, SPARSE_VECTOR};
use crate::types::{CollectionSpec, PointFilter, ScoredPoint, VectorPoint};

/// HNSW search width for dense queries.
const HNSW_EF: u64 = 128;

/// A [`VectorIndex`] backed by [Qdrant](https://qdrant.tech/).
pub struct QdrantVectorIndex {
    client: Qdrant,
}

impl QdrantVectorIndex {
    /// Connect to the given gRPC URL, optionally with an API key.
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self> {
        let mut builder = Qdrant::from_url(url);
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        let client = builder.build().map_err(Self::map_err)?;
        Ok(Self { client })
    }

    pub fn from_client(client: Qdrant) -> Self {
        Self { client }
    }

    fn map_err(e: qdrant_client::QdrantError) -> PassageError {
        PassageError::VectorIndex {
            backend: "qdrant".into(),
            message: e.to_string(),
        }
    }

    fn filter(filter: &PointFilter) -> Filter {
        Filter::must(
            filter
                .must
                .iter()
                .map(|(key, value)| Condition::matches(key.clone(), value.clone())),
        )
    }

    fn point_struct(point: VectorPoint) -> PointStruct {
        let mut vectors = NamedVectors::default().add_vector(DENSE_VECTOR, point.dense);
        if let Some(sparse) = point.sparse {
            vectors = vectors.add_vector(
                SPARSE_VECTOR,
                Vector::new_sparse(sparse.indices, sparse.values),
            );
        }
        if let Some(matrix) = point.rerank {
            vectors = vectors.add_vector(RERANK_VECTOR, Vector::new_multi(matrix));
        }
        let payload = Payload::try_from(serde_json::Value::Object(point.payload))
            .unwrap_or_default();
        PointStruct::new(point.id, vectors, payload)
    }

    fn scored(point: qdrant_client::qdrant::ScoredPoint) -> ScoredPoint {
        ScoredPoint {
            id: point_id_string(point.id.as_ref()),
            score: point.score,
            payload: payload_to_json(&point.payload),
        }
    }
}

fn point_id_string(id: Option<&PointId>) -> String {
    id.and_then(|pid| match &pid.point_id_options {
        Some(PointIdOptions::Uuid(s)) => Some(s.clone()),
        Some(PointIdOptions::Num(n)) => Some(n.to_string()),
        None => None,
    })
    .unwrap_or_default()
}

fn payload_to_json(payload: &HashMap<String, QdrantValue>) -> serde_json::Map<String, serde_json::Value> {
    payload
        .iter()
        .map(|(k, v)| (k.clone(), qdrant_value_to_json(v)))
        .collect()
}

fn qdrant_value_to_json(value: &QdrantValue) -> serde_json::Value {
    match &value.kind {
        Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(*b),
        Some(Kind::IntegerValue(i)) => serde_json::Value::from(*i),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(*d)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Some(Kind::StringValue(s)) => serde_json::Value::String(s.clone()),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.iter().map(qdrant_value_to_json).collect())
        }
        Some(Kind::StructValue(map)) => serde_json::Value::Object(
            map.fields
                .iter()
                .map(|(k, v)| (k.clone(), qdrant_value_to_json(v)))
                .collect(),
        ),
    }
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    async fn ensure_collection(&self, name: &str, spec: &CollectionSpec) -> Result<()> {
        if self
            .client
            .collection_exists(name)
            .await
            .map_err(Self::map_err)?
        {
            return Ok(());
        }

        let mut vectors_config = VectorsConfigBuilder::default();
        vectors_config.add_named_vector_params(
            DENSE_VECTOR,
            VectorParamsBuilder::new(spec.dense_dim as u64, Distance::Cosine),
        );
        if let Some(rerank_dim) = spec.rerank_dim {
            vectors_config.add_named_vector_params(
                RERANK_VECTOR,
                VectorParamsBuilder::new(rerank_dim as u64, Distance::Cosine)
                    .multivector_config(MultiVectorConfigBuilder::new(
                        MultiVectorComparator::MaxSim,
                    )),
            );
        }

        let mut builder = CreateCollectionBuilder::new(name).vectors_config(vectors_config);
        if spec.sparse {
            let mut sparse_config = SparseVectorsConfigBuilder::default();
            sparse_config
                .add_named_vector_params(SPARSE_VECTOR, SparseVectorParamsBuilder::default());
            builder = builder.sparse_vectors_config(sparse_config);
        }
        self.client
            .create_collection(builder)
            .await
            .map_err(Self::map_err)?;

        // Tenant filtering happens on every query; index the keyword up front.
        self.client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                name,
                "ownerId",
                FieldType::Keyword,
            ))
            .await
            .map_err(Self::map_err)?;

        debug!(collection = name, dim = spec.dense_dim, "created qdrant collection");
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.client
            .collection_exists(name)
            .await
            .map_err(Self::map_err)
    }

    async fn upsert(&self, name: &str, points: Vec<VectorPoint>) -> Result<()> {
        let Some(first) = points.first() else {
            return Ok(());
        };
        self.ensure_collection(name, &first.spec()).await?;

        let structs: Vec<PointStruct> = points.into_iter().map(Self::point_struct).collect();
        let count = structs.len();
        self.client
            .upsert_points(UpsertPointsBuilder::new(name, structs).wait(true))
            .await
            .map_err(Self::map_err)?;
        debug!(collection = name, count, "upserted points");
        Ok(())
    }

    async fn dense_query(
        &self,
        name: &str,
        vector: &[f32],
        limit: usize,
        filter: &PointFilter,
    ) -> Result<Vec<ScoredPoint>> {
        let request = QueryPointsBuilder::new(name)
            .query(Query::new_nearest(vector.to_vec()))
            .using(DENSE_VECTOR)
            .filter(Self::filter(filter))
            .limit(limit as u64)
            .params(
                SearchParamsBuilder::default()
                    .hnsw_ef(HNSW_EF)
                    .indexed_only(true)
                    .exact(false),
            )
            .with_payload(true);
        let response = self.client.query(request).await.map_err(Self::map_err)?;
        Ok(response.result.into_iter().map(Self::scored).collect())
    }

    async fn hybrid_query(
        &self,
        name: &str,
        dense: &[f32],
        sparse: &SparseVector,
        limit: usize,
        filter: &PointFilter,
    ) -> Result<Vec<ScoredPoint>> {
        let prefetch_limit = (limit * 2) as u64;
        let qdrant_filter = Self::filter(filter);

        let dense_prefetch = PrefetchQueryBuilder::default()
            .query(Query::new_nearest(dense.to_vec()))
            .using(DENSE_VECTOR)
            .filter(qdrant_filter.clone())
            .limit(prefetch_limit);
        let sparse_prefetch = PrefetchQueryBuilder::default()
            .query(Query::new_nearest(VectorInput::new_sparse(
                sparse.indices.clone(),
                sparse.values.clone(),
            )))
            .using(SPARSE_VECTOR)
            .filter(qdrant_filter)
            .limit(prefetch_limit);

        let request = QueryPointsBuilder::new(name)
            .add_prefetch(dense_prefetch)
            .add_prefetch(sparse_prefetch)
            .query(Query::new_fusion(Fusion::Rrf))
            .limit(limit as u64)
            .with_payload(true);
        let response = self.client.query(request).await.map_err(Self::map_err)?;
        Ok(response.result.into_iter().map(Self::scored).collect())
    }

    async fn rerank(
        &self,
        name: &str,
        query_matrix: &[Vec<f32>],
        candidate_ids: &[String],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        if candidate_ids.is_empty() {
            return Ok(Vec::new());
        }
        let candidates = Filter::must([Condition::has_id(
            candidate_ids.iter().map(|id| PointId::from(id.clone())),
        )]);
        let request = QueryPointsBuilder::new(name)
            .query(Query::new_nearest(VectorInput::new_multi(
                query_matrix.to_vec(),
            )))
            .using(RERANK_VECTOR)
            .filter(candidates)
            .limit(limit as u64)
            .with_payload(true);
        let response = self.client.query(request).await.map_err(Self::map_err)?;
        Ok(response.result.into_iter().map(Self::scored).collect())
    }

    async fn delete_by_filter(&self, name: &str, filter: &PointFilter) -> Result<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(name)
                    .points(Self::filter(filter))
                    .wait(true),
            )
            .await
            .map_err(Self::map_err)?;
        debug!(collection = name, "deleted points by filter");
        Ok(())
    }

    async fn retrieve(&self, name: &str, ids: &[String]) -> Result<Vec<VectorPoint>> {
        let point_ids: Vec<PointId> = ids.iter().map(|id| PointId::from(id.clone())).collect();
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(name, point_ids)
                    .with_vectors(true)
                    .with_payload(true),
            )
            .await
            .map_err(Self::map_err)?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|point| {
                let dense = point.vectors.as_ref().and_then(|vs| {
                    match vs.vectors_options.as_ref()? {
                        VectorsOptions::Vectors(named) => {
                            named.vectors.get(DENSE_VECTOR).map(|v| v.data.clone())
                        }
                        VectorsOptions::Vector(v) => Some(v.data.clone()),
                    }
                })?;
                Some(VectorPoint {
                    id: point_id_string(point.id.as_ref()),
                    dense,
                    // Sparse and rerank vectors are write-mostly; callers of
                    // retrieve only consume the dense vector.
                    sparse: None,
                    rerank: None,
                    payload: payload_to_json(&point.payload),
                })
            })
            .collect())
    }
}
