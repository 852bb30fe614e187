//! Tantivy wrapper for BM25 keyword search over routable items.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::Value as _;
use tantivy::schema::*;
use tantivy::tokenizer::{
    AsciiFoldingFilter, LowerCaser, RemoveLongFilter, SimpleTokenizer, TextAnalyzer,
};
use tantivy::{doc, Index, IndexReader, ReloadPolicy, TantivyDocument, TantivyError, Term};

use crate::error::RetrievalError;

/// A keyword-search hit with its BM25 score and the stored fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordHit {
    /// Full item identifier (e.g. `git.commit`).
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Category label (stored, not scored by default).
    pub category: String,
    /// Routing keywords.
    pub keywords: Vec<String>,
    /// Intent labels.
    pub intents: Vec<String>,
    /// Row metadata carried from the source table (`Null` when absent).
    pub metadata: Value,
    /// BM25 relevance score.
    pub score: f32,
}

/// One document to index, scoped to the table its row lives in.
#[derive(Debug, Clone)]
pub struct KeywordDoc {
    /// Source table name.
    pub table: String,
    /// Full item identifier.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Category label.
    pub category: String,
    /// Routing keywords.
    pub keywords: Vec<String>,
    /// Intent labels.
    pub intents: Vec<String>,
    /// Row metadata (`Null` stores nothing).
    pub metadata: Value,
}

/// Per-field query boosts: identifier is the strongest signal, then intent
/// labels, then routing keywords; description is baseline. Category is
/// stored for filtering but excluded from default scoring.
const NAME_FIELD_BOOST: f32 = 5.0;
const INTENTS_FIELD_BOOST: f32 = 4.0;
const KEYWORDS_FIELD_BOOST: f32 = 3.0;
const DESCRIPTION_FIELD_BOOST: f32 = 1.0;

const UPSERT_HEAP_BYTES: usize = 50_000_000;
const BULK_HEAP_BYTES: usize = 100_000_000;

/// BM25 keyword index over routable items, persisted under
/// `<base>/keyword_index/`. One index serves every table in the store;
/// documents carry their table name and queries filter on it.
#[derive(Clone)]
pub struct KeywordIndex {
    index: Index,
    reader: IndexReader,
    /// Item identifier field, tokenized for scoring.
    pub tool_name: Field,
    /// Untokenized `<table>/<identifier>` key; Term operations (upsert
    /// dedupe, delete, exact get) key on this, since `tool_name` is split
    /// on dots.
    name_raw: Field,
    /// Untokenized source-table field, for scoping queries.
    table: Field,
    /// Free-text description field.
    pub description: Field,
    /// Category field (stored only).
    pub category: Field,
    /// Routing-keywords field.
    pub keywords: Field,
    /// Intent-labels field.
    pub intents: Field,
    /// Serialized row metadata (stored only).
    metadata: Field,
}

fn scoped_key(table: &str, name: &str) -> String {
    format!("{table}/{name}")
}

impl KeywordIndex {
    /// Open the index under `base`, creating it when absent. A corrupted
    /// index directory is wiped and recreated rather than failing the open.
    pub fn open<P: AsRef<Path>>(base: P) -> Result<Self, RetrievalError> {
        let index_path = base.as_ref().join("keyword_index");
        std::fs::create_dir_all(&index_path)?;

        let index = if index_path.join("meta.json").exists() {
            match Index::open_in_dir(&index_path) {
                Ok(idx) => idx,
                Err(e) => {
                    log::warn!("keyword index unreadable ({e}), recreating");
                    std::fs::remove_dir_all(&index_path)?;
                    std::fs::create_dir_all(&index_path)?;
                    Self::create_new_index(&index_path)?
                }
            }
        } else {
            Self::create_new_index(&index_path)?
        };

        // The tokenizer must be registered on every open, not just at create.
        let code_tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(40))
            .filter(LowerCaser)
            .filter(AsciiFoldingFilter)
            .build();
        index
            .tokenizers()
            .register("code_tokenizer", code_tokenizer);

        let schema = index.schema();
        let field = |name: &str| {
            schema
                .get_field(name)
                .map_err(|_| RetrievalError::General(format!("keyword index missing field {name}")))
        };
        let tool_name = field("tool_name")?;
        let name_raw = field("name_raw")?;
        let table = field("table")?;
        let description = field("description")?;
        let category = field("category")?;
        let keywords = field("keywords")?;
        let intents = field("intents")?;
        let metadata = field("metadata")?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            reader,
            tool_name,
            name_raw,
            table,
            description,
            category,
            keywords,
            intents,
            metadata,
        })
    }

    fn create_new_index(path: &Path) -> Result<Index, TantivyError> {
        let mut schema_builder = Schema::builder();

        // Positions are indexed so quoted phrase queries work.
        let text_options = TextOptions::default()
            .set_indexing_options(
                TextFieldIndexing::default()
                    .set_tokenizer("code_tokenizer")
                    .set_index_option(IndexRecordOption::WithFreqsAndPositions),
            )
            .set_stored();

        schema_builder.add_text_field("tool_name", text_options.clone());
        schema_builder.add_text_field("name_raw", STRING);
        schema_builder.add_text_field("table", STRING | STORED);
        schema_builder.add_text_field("description", text_options.clone());
        schema_builder.add_text_field("category", text_options.clone());
        schema_builder.add_text_field("keywords", text_options.clone());
        schema_builder.add_text_field("intents", text_options);
        schema_builder.add_text_field("metadata", STORED);

        Index::create_in_dir(path, schema_builder.build())
    }

    /// Add or replace a single document, keyed by table and identifier.
    pub fn upsert(&self, item: &KeywordDoc) -> Result<(), RetrievalError> {
        let mut writer = self.index.writer(UPSERT_HEAP_BYTES)?;
        self.write_doc(&mut writer, item)?;
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    /// Add or replace many documents in one writer session.
    pub fn bulk_upsert<I>(&self, items: I) -> Result<(), RetrievalError>
    where
        I: IntoIterator<Item = KeywordDoc>,
    {
        let mut writer = self.index.writer(BULK_HEAP_BYTES)?;
        for item in items {
            self.write_doc(&mut writer, &item)?;
        }
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    fn write_doc(
        &self,
        writer: &mut tantivy::IndexWriter,
        item: &KeywordDoc,
    ) -> Result<(), RetrievalError> {
        let key = scoped_key(&item.table, &item.name);
        writer.delete_term(Term::from_field_text(self.name_raw, &key));
        writer.add_document(doc!(
            self.tool_name => item.name.as_str(),
            self.name_raw => key,
            self.table => item.table.as_str(),
            self.description => item.description.as_str(),
            self.category => item.category.as_str(),
            self.keywords => item.keywords.join(" "),
            self.intents => item.intents.join(" "),
            self.metadata => if item.metadata.is_null() {
                String::new()
            } else {
                item.metadata.to_string()
            }
        ))?;
        Ok(())
    }

    /// Remove a table's documents by identifier.
    pub fn delete(&self, table: &str, names: &[String]) -> Result<(), RetrievalError> {
        if names.is_empty() {
            return Ok(());
        }
        let mut writer: tantivy::IndexWriter = self.index.writer(UPSERT_HEAP_BYTES)?;
        for name in names {
            writer.delete_term(Term::from_field_text(self.name_raw, &scoped_key(table, name)));
        }
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    /// Remove every document written for a table.
    pub fn delete_table(&self, table: &str) -> Result<(), RetrievalError> {
        let mut writer: tantivy::IndexWriter = self.index.writer(UPSERT_HEAP_BYTES)?;
        writer.delete_term(Term::from_field_text(self.table, table));
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    /// BM25 search with per-field boosts; top-`limit` hits, score descending.
    /// `table` restricts hits to documents from that table.
    pub fn search(
        &self,
        query_str: &str,
        limit: usize,
        table: Option<&str>,
    ) -> Result<Vec<KeywordHit>, RetrievalError> {
        if query_str.trim().is_empty() || limit == 0 {
            return Ok(vec![]);
        }
        let searcher = self.reader.searcher();

        let mut query_parser = QueryParser::for_index(
            &self.index,
            vec![self.tool_name, self.intents, self.keywords, self.description],
        );
        query_parser.set_field_boost(self.tool_name, NAME_FIELD_BOOST);
        query_parser.set_field_boost(self.intents, INTENTS_FIELD_BOOST);
        query_parser.set_field_boost(self.keywords, KEYWORDS_FIELD_BOOST);
        query_parser.set_field_boost(self.description, DESCRIPTION_FIELD_BOOST);

        let parsed = query_parser
            .parse_query(query_str)
            .map_err(|e| RetrievalError::General(format!("query parse error: {e}")))?;
        let query: Box<dyn Query> = match table {
            Some(table) => {
                let scope = TermQuery::new(
                    Term::from_field_text(self.table, table),
                    IndexRecordOption::Basic,
                );
                Box::new(BooleanQuery::new(vec![
                    (Occur::Must, parsed),
                    (Occur::Must, Box::new(scope)),
                ]))
            }
            None => parsed,
        };

        let top_docs = searcher.search(&query, &TopDocs::with_limit(limit))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            results.push(self.hit_from_doc(&doc, score));
        }
        Ok(results)
    }

    /// Fetch a single document by table and exact identifier.
    pub fn get(&self, table: &str, name: &str) -> Result<Option<KeywordHit>, RetrievalError> {
        let searcher = self.reader.searcher();
        let term = Term::from_field_text(self.name_raw, &scoped_key(table, name));
        let term_query = TermQuery::new(term, IndexRecordOption::Basic);

        let top_docs = searcher.search(&term_query, &TopDocs::with_limit(1))?;
        if let Some((score, doc_address)) = top_docs.first() {
            let doc: TantivyDocument = searcher.doc(*doc_address)?;
            Ok(Some(self.hit_from_doc(&doc, *score)))
        } else {
            Ok(None)
        }
    }

    /// Number of live documents.
    pub fn count(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Whether an index directory already exists under `base`.
    pub fn exists<P: AsRef<Path>>(base: P) -> bool {
        base.as_ref()
            .join("keyword_index")
            .join("meta.json")
            .exists()
    }

    fn hit_from_doc(&self, doc: &TantivyDocument, score: f32) -> KeywordHit {
        let text = |field: Field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };
        let tokens = |field: Field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        };
        let metadata = doc
            .get_first(self.metadata)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or(Value::Null);
        KeywordHit {
            name: text(self.tool_name),
            description: text(self.description),
            category: text(self.category),
            keywords: tokens(self.keywords),
            intents: tokens(self.intents),
            metadata,
            score,
        }
    }
}
