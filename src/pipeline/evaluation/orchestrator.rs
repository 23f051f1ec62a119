//! Release evaluation orchestrator.
//!
//! Drives the two pipeline stages for one release: vectorize (extract →
//! chunk → anonymize → index) and evaluate (snapshot → retrieve → batch
//! model call → persist → summary). Pure pipeline logic with trait-based
//! DI; stage sequencing and state transitions live in the runtime worker.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;
use uuid::Uuid;

use super::llm::LlmClient;
use super::parse::{fallback_verdict, parse_verdict, BranchVerdict};
use super::prompt::{
    build_branch_prompt, build_summary_prompt, EVALUATION_SYSTEM_PROMPT, SUMMARY_SYSTEM_PROMPT,
};
use super::EvaluationError;
use crate::config::PipelineConfig;
use crate::db::repository;
use crate::models::{BranchContext, DocumentRelease};
use crate::pipeline::anonymize::{ChunkAnonymizer, EntityMapping};
use crate::pipeline::index::types::{EmbeddingModel, VectorIndex};
use crate::pipeline::ingest::chunker::ReleaseChunker;
use crate::pipeline::ingest::extract::TextExtractor;
use crate::pipeline::ingest::IngestError;
use crate::pipeline::retrieval::{criterion_query, ContextRetriever, RetrievalParams};
use crate::pipeline::snapshot;

/// Outcome of the vectorize stage.
#[derive(Debug, Clone)]
pub struct VectorizeOutcome {
    pub chunk_count: usize,
    pub anonymized_count: usize,
}

/// Outcome of the evaluate stage.
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub branch_count: usize,
    pub fallback_count: usize,
    pub summary: String,
}

/// One branch's evaluation flowing through the stage as an owned value:
/// built from the snapshot, enriched with a prompt, merged back into the
/// applied tree only at persistence.
struct BranchEvaluation {
    applied_branch_id: Uuid,
    title: String,
    prompt: String,
}

pub struct ReleaseEvaluator {
    extractor: Arc<dyn TextExtractor>,
    embedder: Arc<dyn EmbeddingModel>,
    index: Arc<dyn VectorIndex>,
    llm: Arc<dyn LlmClient>,
    /// Known institution names for the deny-list recognizer.
    institution_names: Vec<String>,
    config: PipelineConfig,
}

impl ReleaseEvaluator {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<dyn EmbeddingModel>,
        index: Arc<dyn VectorIndex>,
        llm: Arc<dyn LlmClient>,
        institution_names: Vec<String>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            extractor,
            embedder,
            index,
            llm,
            institution_names,
            config,
        }
    }

    /// Stage 1: extract text, chunk, anonymize, add to the vector index.
    ///
    /// Extraction failures are fatal for the run; index writes are retried
    /// with backoff before giving up. The session mapping is persisted on
    /// the release so the evaluate stage (a separate task, possibly a
    /// separate worker) can pick it up.
    pub fn vectorize(
        &self,
        conn: &Connection,
        release_id: &Uuid,
    ) -> Result<VectorizeOutcome, EvaluationError> {
        let release = self.load_release(conn, release_id)?;

        let text = self.extractor.extract(Path::new(&release.file_path))?;
        let chunker = ReleaseChunker::new(self.config.max_chunk_chars);
        let mut chunks = chunker.chunk(&text, &release.source_id());
        if chunks.is_empty() {
            return Err(IngestError::EmptyText.into());
        }

        // One anonymizer per run: placeholder numbering is scoped to this
        // release and must not leak across concurrent pipelines.
        let mut anonymizer =
            ChunkAnonymizer::new(self.institution_names.clone(), EntityMapping::new());
        anonymizer.anonymize_chunks(&mut chunks);
        let anonymized_count = chunks.iter().filter(|c| c.anonymized).count();
        let mapping = anonymizer.into_mapping();
        repository::update_release_mapping(conn, release_id, &mapping.to_json()?)?;

        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts)?;

        with_retries(
            self.config.index_retries,
            self.config.retry_backoff,
            |e| matches!(e, EvaluationError::Index(_)),
            || {
                self.index
                    .add_documents(&chunks, &embeddings)
                    .map_err(EvaluationError::from)
            },
        )?;

        tracing::info!(
            release_id = %release_id,
            chunks = chunks.len(),
            anonymized = anonymized_count,
            "Release vectorized"
        );

        Ok(VectorizeOutcome {
            chunk_count: chunks.len(),
            anonymized_count,
        })
    }

    /// Stage 2: build the applied tree, retrieve context per branch, invoke
    /// the model once for the whole batch, persist results, generate the
    /// release summary.
    ///
    /// `progress` is called with (completed, total) as criteria are
    /// processed.
    pub fn evaluate(
        &self,
        conn: &Connection,
        release_id: &Uuid,
        progress: &dyn Fn(usize, usize),
    ) -> Result<EvaluationReport, EvaluationError> {
        let release = self.load_release(conn, release_id)?;
        let mapping_json = release.entity_mapping.clone().unwrap_or_else(|| "{}".to_string());

        let tree = snapshot::build_applied_tree(conn, release_id, &release.document_id)?;
        let contexts = snapshot::branch_contexts(conn, &tree)?;
        let total = contexts.len();
        progress(0, total);

        let evaluations = self.build_evaluations(&release, &contexts)?;

        let prompts: Vec<String> = evaluations.iter().map(|e| e.prompt.clone()).collect();
        let responses = with_retries(
            self.config.batch_retries,
            self.config.retry_backoff,
            EvaluationError::is_transport,
            || self.llm.invoke_batch(&prompts, EVALUATION_SYSTEM_PROMPT),
        )?;

        let mut fallback_count = 0;
        let mut scored: Vec<(String, BranchVerdict)> = Vec::with_capacity(evaluations.len());

        for (completed, (evaluation, raw)) in
            evaluations.iter().zip(responses.iter()).enumerate()
        {
            let verdict = match parse_verdict(raw) {
                Ok(verdict) => verdict,
                Err(e) => {
                    // A malformed response fails this item only; the rest of
                    // the batch keeps its model-provided results.
                    fallback_count += 1;
                    tracing::warn!(
                        applied_branch_id = %evaluation.applied_branch_id,
                        error = %e,
                        "Unparseable model response, substituting fallback result"
                    );
                    fallback_verdict()
                }
            };

            repository::write_branch_result(
                conn,
                &evaluation.applied_branch_id,
                &verdict.feedback,
                verdict.fulfilled,
                verdict.score,
                &mapping_json,
            )?;
            scored.push((evaluation.title.clone(), verdict));
            progress(completed + 1, total);
        }

        let summary = self.generate_summary(&scored)?;
        let old_description = release.description.clone();
        repository::update_release_description(conn, release_id, &summary)?;
        repository::audit::record(
            conn,
            "update",
            "document_releases",
            &release_id.to_string(),
            Some(&serde_json::json!({ "description": old_description })),
        );

        tracing::info!(
            release_id = %release_id,
            branches = total,
            fallbacks = fallback_count,
            "Release evaluated"
        );

        Ok(EvaluationReport {
            branch_count: total,
            fallback_count,
            summary,
        })
    }

    fn load_release(
        &self,
        conn: &Connection,
        release_id: &Uuid,
    ) -> Result<DocumentRelease, EvaluationError> {
        repository::get_release(conn, release_id)?
            .ok_or(EvaluationError::ReleaseNotFound(*release_id))
    }

    /// Retrieve context and build one evaluation request per branch.
    fn build_evaluations(
        &self,
        release: &DocumentRelease,
        contexts: &[BranchContext],
    ) -> Result<Vec<BranchEvaluation>, EvaluationError> {
        let retriever = ContextRetriever::new(
            self.embedder.as_ref(),
            self.index.as_ref(),
            RetrievalParams {
                top_k: self.config.retrieval_top_k,
                neighbor_margin: self.config.neighbor_margin,
            },
        );
        let source_id = release.source_id();

        let mut evaluations = Vec::with_capacity(contexts.len());
        for context in contexts {
            let query = criterion_query(&context.title, &context.description, &context.taxonomy_title);
            let excerpts = with_retries(
                self.config.index_retries,
                self.config.retry_backoff,
                |e| matches!(e, EvaluationError::Index(_)),
                || retriever.retrieve(&query, &source_id).map_err(EvaluationError::from),
            )?;

            evaluations.push(BranchEvaluation {
                applied_branch_id: context.applied_branch_id,
                title: context.title.clone(),
                prompt: build_branch_prompt(context, &excerpts),
            });
        }
        Ok(evaluations)
    }

    /// Short, adjective-free one-paragraph summary from the top-2 and
    /// bottom-2 scoring branches, stored as the release description.
    fn generate_summary(
        &self,
        scored: &[(String, BranchVerdict)],
    ) -> Result<String, EvaluationError> {
        let mut ranked: Vec<&(String, BranchVerdict)> = scored.iter().collect();
        ranked.sort_by(|a, b| {
            b.1.score
                .partial_cmp(&a.1.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let top: Vec<(String, f64, String)> = ranked
            .iter()
            .take(2)
            .map(|(title, v)| (title.clone(), v.score, v.feedback.clone()))
            .collect();
        let bottom: Vec<(String, f64, String)> = ranked
            .iter()
            .skip(top.len())
            .rev()
            .take(2)
            .map(|(title, v)| (title.clone(), v.score, v.feedback.clone()))
            .collect();

        let prompt = build_summary_prompt(&top, &bottom);
        let summary = with_retries(
            self.config.batch_retries,
            self.config.retry_backoff,
            EvaluationError::is_transport,
            || self.llm.invoke(&prompt, SUMMARY_SYSTEM_PROMPT),
        )?;

        Ok(summary.trim().to_string())
    }
}

/// Run `f`, retrying up to `retries` times (after the initial attempt) when
/// `is_retryable` says so, sleeping `backoff` between attempts.
fn with_retries<T>(
    retries: u32,
    backoff: Duration,
    is_retryable: impl Fn(&EvaluationError) -> bool,
    mut f: impl FnMut() -> Result<T, EvaluationError>,
) -> Result<T, EvaluationError> {
    let mut attempt = 0;
    loop {
        match f() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < retries && is_retryable(&e) => {
                attempt += 1;
                tracing::warn!(attempt, max = retries, error = %e, "Retryable failure, backing off");
                std::thread::sleep(backoff);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::pipeline::evaluation::llm::MockLlmClient;
    use crate::pipeline::index::{InMemoryVectorIndex, TermHashEmbedder};
    use crate::pipeline::ingest::extract::PlainTextExtractor;
    use crate::testutil::{seed_compliance_tree, seed_release};

    const RELEASE_TEXT: &str = "Quarterly report of Banco Alfa, registered 12.345.678/0001-90.\n\n\
        The Tier 1 capital ratio stands at 14.2% as of the reference date.\n\n\
        The leverage ratio is 6.1%, above the regulatory minimum.\n\n\
        Contact compliance@bancoalfa.com.br for questions.";

    fn verdict_json(feedback: &str, fulfilled: bool, score: f64) -> String {
        serde_json::to_string(&BranchVerdict {
            feedback: feedback.into(),
            fulfilled,
            score,
        })
        .unwrap()
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            retry_backoff: Duration::from_millis(1),
            ..PipelineConfig::default()
        }
    }

    fn evaluator(llm: MockLlmClient) -> ReleaseEvaluator {
        ReleaseEvaluator::new(
            Arc::new(PlainTextExtractor),
            Arc::new(TermHashEmbedder::new()),
            Arc::new(InMemoryVectorIndex::new()),
            Arc::new(llm),
            vec!["Banco Alfa".into()],
            fast_config(),
        )
    }

    /// Seed tree + release with an on-disk text file; returns (conn, release id, tempdir guard).
    fn seeded_with_file(
        dir: &tempfile::TempDir,
    ) -> (rusqlite::Connection, Uuid) {
        let conn = open_memory_database().unwrap();
        let (document, _, _, _) = seed_compliance_tree(&conn);
        let file = dir.path().join("release.txt");
        std::fs::write(&file, RELEASE_TEXT).unwrap();
        let release = seed_release(&conn, &document.id, file.to_str().unwrap());
        (conn, release.id)
    }

    #[test]
    fn vectorize_chunks_anonymizes_and_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let (conn, release_id) = seeded_with_file(&dir);
        let evaluator = evaluator(MockLlmClient::new(vec![]));

        let outcome = evaluator.vectorize(&conn, &release_id).unwrap();
        assert!(outcome.chunk_count >= 1);
        assert_eq!(outcome.anonymized_count, outcome.chunk_count);

        // Mapping persisted for the evaluate stage.
        let release = repository::get_release(&conn, &release_id).unwrap().unwrap();
        let mapping = release.entity_mapping.unwrap();
        assert!(mapping.contains("<TAX_ID_1>"));
        assert!(mapping.contains("<INSTITUTION_1>"));
    }

    #[test]
    fn vectorize_missing_file_is_fatal_ingest_error() {
        let conn = open_memory_database().unwrap();
        let (document, _, _, _) = seed_compliance_tree(&conn);
        let release = seed_release(&conn, &document.id, "/nonexistent/release.txt");
        let evaluator = evaluator(MockLlmClient::new(vec![]));

        let result = evaluator.vectorize(&conn, &release.id);
        assert!(matches!(
            result,
            Err(EvaluationError::Ingest(IngestError::MissingFile(_)))
        ));
    }

    #[test]
    fn vectorize_unknown_release_errors() {
        let conn = open_memory_database().unwrap();
        let evaluator = evaluator(MockLlmClient::new(vec![]));
        let result = evaluator.vectorize(&conn, &Uuid::new_v4());
        assert!(matches!(result, Err(EvaluationError::ReleaseNotFound(_))));
    }

    #[test]
    fn evaluate_scores_every_branch_and_sets_description() {
        let dir = tempfile::tempdir().unwrap();
        let (conn, release_id) = seeded_with_file(&dir);
        // 2 branch verdicts + 1 summary response.
        let llm = MockLlmClient::new(vec![
            verdict_json("The Tier 1 ratio of 14.2% is stated.", true, 9.0),
            verdict_json("The leverage ratio of 6.1% is stated.", true, 8.0),
            "Both ratios were disclosed. No criterion was missed.".into(),
        ]);
        let evaluator = evaluator(llm);

        evaluator.vectorize(&conn, &release_id).unwrap();
        let report = evaluator.evaluate(&conn, &release_id, &|_, _| {}).unwrap();

        assert_eq!(report.branch_count, 2);
        assert_eq!(report.fallback_count, 0);

        let tree = repository::get_applied_tree(&conn, &release_id).unwrap();
        assert_eq!(tree.typifications.len(), 1);
        assert_eq!(tree.taxonomies.len(), 1);
        assert_eq!(tree.branches.len(), 2);
        for branch in &tree.branches {
            assert!(branch.is_scored());
            let score = branch.score.unwrap();
            assert!((0.0..=10.0).contains(&score));
            assert!(branch.entity_mapping.as_ref().unwrap().contains("TAX_ID"));
        }

        let release = repository::get_release(&conn, &release_id).unwrap().unwrap();
        assert_eq!(
            release.description.as_deref(),
            Some("Both ratios were disclosed. No criterion was missed.")
        );
    }

    #[test]
    fn unparseable_item_gets_fallback_others_keep_results() {
        let dir = tempfile::tempdir().unwrap();
        let (conn, release_id) = seeded_with_file(&dir);
        let llm = MockLlmClient::new(vec![
            "I cannot answer in JSON, sorry.".into(),
            verdict_json("The leverage ratio is stated.", true, 8.0),
            "One criterion was met, one produced no feedback.".into(),
        ]);
        let evaluator = evaluator(llm);

        evaluator.vectorize(&conn, &release_id).unwrap();
        let report = evaluator.evaluate(&conn, &release_id, &|_, _| {}).unwrap();

        assert_eq!(report.branch_count, 2);
        assert_eq!(report.fallback_count, 1);

        let tree = repository::get_applied_tree(&conn, &release_id).unwrap();
        let fallbacks: Vec<_> = tree
            .branches
            .iter()
            .filter(|b| b.feedback.as_deref() == Some("Could not generate feedback for this criterion."))
            .collect();
        assert_eq!(fallbacks.len(), 1);
        assert_eq!(fallbacks[0].fulfilled, Some(false));

        let real: Vec<_> = tree
            .branches
            .iter()
            .filter(|b| b.fulfilled == Some(true))
            .collect();
        assert_eq!(real.len(), 1);
    }

    #[test]
    fn one_bad_item_of_five_leaves_four_model_results() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_memory_database().unwrap();
        let (document, _, taxonomy, _) = seed_compliance_tree(&conn);

        // Grow the taxonomy to five branches total.
        for title in ["LCR published", "NSFR published", "Own funds published"] {
            crate::db::repository::tree::insert_branch(
                &conn,
                &crate::models::Branch {
                    id: Uuid::new_v4(),
                    taxonomy_id: taxonomy.id,
                    title: title.into(),
                    description: "The release states the figure.".into(),
                },
            )
            .unwrap();
        }
        let file = dir.path().join("release.txt");
        std::fs::write(&file, RELEASE_TEXT).unwrap();
        let release = seed_release(&conn, &document.id, file.to_str().unwrap());

        // Third response is garbage; the other four parse.
        let llm = MockLlmClient::new(vec![
            verdict_json("Stated.", true, 9.0),
            verdict_json("Stated.", true, 8.0),
            "not json".into(),
            verdict_json("Stated.", true, 6.0),
            verdict_json("Not found.", false, 1.0),
            "Four criteria evaluated, one produced no feedback.".into(),
        ]);
        let evaluator = evaluator(llm);

        evaluator.vectorize(&conn, &release.id).unwrap();
        let report = evaluator.evaluate(&conn, &release.id, &|_, _| {}).unwrap();

        assert_eq!(report.branch_count, 5);
        assert_eq!(report.fallback_count, 1);

        let tree = repository::get_applied_tree(&conn, &release.id).unwrap();
        assert_eq!(tree.branches.len(), 5);
        let model_results = tree
            .branches
            .iter()
            .filter(|b| b.feedback.as_deref() != Some("Could not generate feedback for this criterion."))
            .count();
        assert_eq!(model_results, 4);
    }

    #[test]
    fn batch_transport_errors_retried_then_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let (conn, release_id) = seeded_with_file(&dir);
        // 2 transport failures, then the batch and summary succeed.
        let llm = MockLlmClient::new(vec![
            verdict_json("Stated.", true, 7.0),
            verdict_json("Stated.", true, 6.0),
            "Both criteria were met.".into(),
        ])
        .failing_first(2);
        let evaluator = evaluator(llm);

        evaluator.vectorize(&conn, &release_id).unwrap();
        let report = evaluator.evaluate(&conn, &release_id, &|_, _| {}).unwrap();
        assert_eq!(report.branch_count, 2);
    }

    #[test]
    fn exhausted_transport_retries_fail_the_stage() {
        let dir = tempfile::tempdir().unwrap();
        let (conn, release_id) = seeded_with_file(&dir);
        // More failures than 1 initial + 3 retries.
        let llm = MockLlmClient::new(vec![verdict_json("x", true, 5.0)]).failing_first(10);
        let evaluator = evaluator(llm);

        evaluator.vectorize(&conn, &release_id).unwrap();
        let result = evaluator.evaluate(&conn, &release_id, &|_, _| {});
        assert!(matches!(result, Err(ref e) if e.is_transport()));
    }

    #[test]
    fn progress_counts_up_to_total() {
        let dir = tempfile::tempdir().unwrap();
        let (conn, release_id) = seeded_with_file(&dir);
        let llm = MockLlmClient::new(vec![
            verdict_json("a", true, 5.0),
            verdict_json("b", false, 2.0),
            "Summary.".into(),
        ]);
        let evaluator = evaluator(llm);
        evaluator.vectorize(&conn, &release_id).unwrap();

        let seen = std::sync::Mutex::new(Vec::new());
        evaluator
            .evaluate(&conn, &release_id, &|done, total| {
                seen.lock().unwrap().push((done, total));
            })
            .unwrap();

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.first(), Some(&(0, 2)));
        assert_eq!(seen.last(), Some(&(2, 2)));
    }

    #[test]
    fn retry_helper_respects_predicate() {
        let mut calls = 0;
        let result: Result<(), _> = with_retries(
            3,
            Duration::from_millis(1),
            |_| false,
            || {
                calls += 1;
                Err(EvaluationError::ResponseParsing("no".into()))
            },
        );
        assert!(result.is_err());
        assert_eq!(calls, 1, "non-retryable errors must not be retried");
    }
}
