//! Retrieval over the three knowledge indexes.

use crate::context::ContextCaps;
use crate::embeddings::EmbeddingProvider;
use crate::index::{FlatIndex, VectorIndex};
use crate::normalize::normalize;
use qna_core::{AppConfig, AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Which knowledge base a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Main support knowledge base
    Main,
    /// User agreement
    User,
    /// Platform placement conditions
    Conditions,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::User => "user",
            Self::Conditions => "conditions",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document returned for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    /// 0-based similarity rank within its index
    pub rank: usize,
    pub score: f32,
    pub source: IndexKind,
    pub page_content: String,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Results of one query against all three indexes.
#[derive(Debug, Clone, Default)]
pub struct RetrievalSet {
    pub main: Vec<RetrievedDocument>,
    pub user: Vec<RetrievedDocument>,
    pub conditions: Vec<RetrievedDocument>,
}

/// Embeds queries and looks them up in the main, user and conditions
/// indexes.
#[derive(Clone)]
pub struct MultiIndexRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    main: Arc<dyn VectorIndex>,
    user: Arc<dyn VectorIndex>,
    conditions: Arc<dyn VectorIndex>,
}

impl MultiIndexRetriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        main: Arc<dyn VectorIndex>,
        user: Arc<dyn VectorIndex>,
        conditions: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            embedder,
            main,
            user,
            conditions,
        }
    }

    /// Load the three flat indexes named in the `indexes` config section.
    pub fn from_config(config: &AppConfig, embedder: Arc<dyn EmbeddingProvider>) -> AppResult<Self> {
        let load = |kind: IndexKind, path: &Path| -> AppResult<Arc<dyn VectorIndex>> {
            let index = FlatIndex::load(kind.as_str(), &config.resolve_path(path))?;
            if index.dimensions() != embedder.dimensions() {
                return Err(AppError::Knowledge(format!(
                    "Index '{}' has {} dimensions but the encoder produces {}",
                    kind,
                    index.dimensions(),
                    embedder.dimensions()
                )));
            }
            Ok(Arc::new(index))
        };

        let main = load(IndexKind::Main, &config.indexes.main)?;
        let user = load(IndexKind::User, &config.indexes.user)?;
        let conditions = load(IndexKind::Conditions, &config.indexes.conditions)?;

        Ok(Self::new(embedder, main, user, conditions))
    }

    fn index(&self, kind: IndexKind) -> &Arc<dyn VectorIndex> {
        match kind {
            IndexKind::Main => &self.main,
            IndexKind::User => &self.user,
            IndexKind::Conditions => &self.conditions,
        }
    }

    /// Up to `k` documents from one index, most similar first.
    pub async fn search(
        &self,
        kind: IndexKind,
        query: &str,
        k: usize,
    ) -> AppResult<Vec<RetrievedDocument>> {
        let embedding = self.embed_query(query).await?;
        self.lookup(kind, &embedding, k)
    }

    /// Look the query up in all three indexes, each truncated to its own cap.
    ///
    /// The query is embedded once; results are not ranked across indexes.
    pub async fn search_all(&self, query: &str, caps: ContextCaps) -> AppResult<RetrievalSet> {
        let start = Instant::now();
        let embedding = self.embed_query(query).await?;

        let (main, user, conditions) = futures::try_join!(
            async { self.lookup(IndexKind::Main, &embedding, caps.main) },
            async { self.lookup(IndexKind::User, &embedding, caps.user) },
            async { self.lookup(IndexKind::Conditions, &embedding, caps.conditions) },
        )?;

        tracing::info!(
            "Retrieved {} main, {} user, {} conditions documents in {:.3}s",
            main.len(),
            user.len(),
            conditions.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(RetrievalSet {
            main,
            user,
            conditions,
        })
    }

    async fn embed_query(&self, query: &str) -> AppResult<Vec<f32>> {
        // A query made only of digits or punctuation normalizes to "" and is
        // still embedded and answered
        let normalized = normalize(query);
        tracing::debug!("Normalized query: {}", normalized);
        self.embedder.embed(&normalized).await
    }

    fn lookup(
        &self,
        kind: IndexKind,
        embedding: &[f32],
        k: usize,
    ) -> AppResult<Vec<RetrievedDocument>> {
        let results = self.index(kind).search(embedding, k)?;

        if let Some((_, top)) = results.first() {
            tracing::debug!("Index '{}': {} hits, top score {:.3}", kind, results.len(), top);
        }

        Ok(results
            .into_iter()
            .take(k)
            .enumerate()
            .map(|(rank, (doc, score))| RetrievedDocument {
                rank,
                score,
                source: kind,
                page_content: doc.page_content,
                metadata: doc.metadata,
            })
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::embeddings::MockProvider;
    use crate::index::IndexedDocument;

    pub(crate) const DIMS: usize = 256;

    pub(crate) async fn build_index(
        embedder: &MockProvider,
        name: &str,
        field: &str,
        rows: &[(&str, &str)],
    ) -> Arc<dyn VectorIndex> {
        let mut documents = Vec::new();
        for (i, (text, value)) in rows.iter().enumerate() {
            let mut metadata = BTreeMap::new();
            metadata.insert(
                field.to_string(),
                serde_json::Value::String(value.to_string()),
            );
            documents.push(IndexedDocument {
                id: format!("{}-{}", name, i),
                page_content: text.to_string(),
                metadata,
                embedding: embedder.embed(&normalize(text)).await.unwrap(),
            });
        }
        Arc::new(FlatIndex::new(name, DIMS, documents).unwrap())
    }

    pub(crate) async fn sample_retriever() -> MultiIndexRetriever {
        let embedder = MockProvider::new(DIMS);

        let main = build_index(
            &embedder,
            "main",
            "Ответ из БЗ",
            &[
                ("Как изменить пароль", "Пароль меняется в настройках профиля."),
                ("Как загрузить видео", "Нажмите кнопку загрузки."),
                ("Как удалить канал", "Канал удаляется в студии."),
                ("Как включить монетизацию", "Подайте заявку в студии."),
                ("Забыл пароль от аккаунта", "Воспользуйтесь восстановлением пароля."),
            ],
        )
        .await;
        let user = build_index(
            &embedder,
            "user",
            "sum_text",
            &[
                ("Пользователь обязан хранить пароль", "Пароль хранит пользователь."),
                ("Запрещенный контент", "Контент удаляется."),
            ],
        )
        .await;
        let conditions = build_index(
            &embedder,
            "conditions",
            "sum_text",
            &[
                ("Размещение видео", "Видео должно соответствовать правилам."),
                ("Смена пароля администратора", "Администратор меняет пароль."),
            ],
        )
        .await;

        MultiIndexRetriever::new(Arc::new(embedder), main, user, conditions)
    }

    #[tokio::test]
    async fn test_search_ranks_and_bounds() {
        let retriever = sample_retriever().await;
        let docs = retriever
            .search(IndexKind::Main, "Как изменить пароль?", 3)
            .await
            .unwrap();

        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].page_content, "Как изменить пароль");
        assert!(docs.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(
            docs.iter().map(|d| d.rank).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!(docs.iter().all(|d| d.source == IndexKind::Main));
    }

    #[tokio::test]
    async fn test_search_k_larger_than_index() {
        let retriever = sample_retriever().await;
        let docs = retriever
            .search(IndexKind::User, "пароль", 10)
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[tokio::test]
    async fn test_search_all_respects_caps() {
        let retriever = sample_retriever().await;
        let set = retriever
            .search_all("Как изменить пароль?", ContextCaps::default())
            .await
            .unwrap();

        assert_eq!(set.main.len(), 3);
        assert_eq!(set.user.len(), 1);
        assert_eq!(set.conditions.len(), 1);
        assert_eq!(set.user[0].source, IndexKind::User);
        assert_eq!(set.conditions[0].source, IndexKind::Conditions);
    }

    #[tokio::test]
    async fn test_from_config_checks_dimensions() {
        let temp = tempfile::TempDir::new().unwrap();
        let embedder = MockProvider::new(DIMS);
        let index = FlatIndex::new(
            "x",
            2,
            vec![IndexedDocument {
                id: "1".to_string(),
                page_content: "a".to_string(),
                metadata: BTreeMap::new(),
                embedding: vec![1.0, 0.0],
            }],
        )
        .unwrap();

        let mut config = AppConfig::default();
        config.workspace = temp.path().to_path_buf();
        for path in [
            &config.indexes.main,
            &config.indexes.user,
            &config.indexes.conditions,
        ] {
            index.save(&temp.path().join(path)).unwrap();
        }

        let result = MultiIndexRetriever::from_config(&config, Arc::new(embedder));
        assert!(result.is_err());

        let ok = MultiIndexRetriever::from_config(&config, Arc::new(MockProvider::new(2)));
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn test_query_without_words_still_retrieves() {
        let retriever = sample_retriever().await;
        let set = retriever
            .search_all("123?", ContextCaps::default())
            .await
            .unwrap();

        assert_eq!(set.main.len(), 3);
        assert_eq!(set.user.len(), 1);
        assert_eq!(set.conditions.len(), 1);
        // Zero similarity everywhere keeps index order
        assert_eq!(set.main[0].page_content, "Как изменить пароль");
    }
}
