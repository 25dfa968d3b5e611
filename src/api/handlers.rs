//! API request handlers

use serde_json::Value;

use super::models::{
    AnalyzeRequest, ApiError, ChaptersRequest, CognitiveLoadRequest, ExplainRequest, TranslateRequest,
    TranslateResponse, WikipediaQuery,
};
use super::server::AppState;
use crate::analysis::AnalysisReport;
use crate::chapters::ChapterOutcome;
use crate::cognitive::{combine_segments, compute_load, CentralityMap, LoadOptions};
use crate::enrich::{Explainer, Translator};
use crate::error::AnalyzerError;
use crate::llm::TargetLanguage;
use crate::store::{Artifact, JobStore};
use crate::types::{transcript_duration, validate_segments, CognitiveLoadSeries, TranscriptSegment};

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Handle health check requests
pub async fn health_check(state: &AppState) -> Value {
    let llm_available = state.analyzer.language_model().await.is_available().await;
    serde_json::json!({
        "status": "healthy",
        "service": "lecture-lens",
        "version": env!("CARGO_PKG_VERSION"),
        "llm_available": llm_available,
        "timestamp": chrono::Utc::now().to_rfc3339()
    })
}

/// Chapters for an inline transcript
pub async fn generate_chapters(state: &AppState, request: ChaptersRequest) -> ApiResult<ChapterOutcome> {
    let segments = validate_segments(request.segments)?;
    let duration = request.duration.unwrap_or_else(|| transcript_duration(&segments));
    if !duration.is_finite() || duration < 0.0 {
        return Err(ApiError::bad_request(format!("invalid duration {}", duration)));
    }

    let language = TargetLanguage::resolve(request.language.as_deref(), None);
    Ok(state.analyzer.chapters(&segments, duration, &language).await)
}

/// Load curve for a stored job or for inline transcript and graph.
/// Results for a stored job are saved back as its `cognitive_load` artifact.
pub async fn cognitive_load(state: &AppState, request: CognitiveLoadRequest) -> ApiResult<CognitiveLoadSeries> {
    let store = state.analyzer.store();
    let config = &state.analyzer.config().cognitive_load;

    let (transcript, graph, str_data) = match &request.job_id {
        Some(job_id) => {
            let transcript = match request.transcript {
                Some(transcript) => transcript,
                None => store.load(job_id, Artifact::Transcript).await?,
            };
            let graph = match request.graph {
                Some(graph) => graph,
                None => store.load(job_id, Artifact::Graph).await?,
            };
            let str_data = match request.str_data {
                Some(str_data) => str_data,
                None => optional_artifact(store, job_id, Artifact::StrData).await?,
            };
            (transcript, graph, str_data)
        }
        None => {
            let transcript = request
                .transcript
                .ok_or_else(|| ApiError::bad_request("either job_id or transcript is required"))?;
            (transcript, request.graph.unwrap_or_default(), request.str_data.unwrap_or_default())
        }
    };

    let transcript = validate_segments(transcript)?;
    let str_data = validate_segments(str_data)?;

    let mut centrality = CentralityMap::from_graph(&graph);
    if let Some(seed) = &request.seed {
        centrality = centrality.with_seed(seed, config.seed_top_n);
    }

    let options = LoadOptions {
        window_size: request.window_size.unwrap_or(config.window_size),
        segment_start: request.segment_start.unwrap_or(0.0),
        segment_end: request.segment_end.unwrap_or(0.0),
    };

    let combined = combine_segments(&[&transcript, &str_data]);
    options.check(&combined).map_err(ApiError::bad_request)?;
    let series = compute_load(&combined, &centrality, &options);

    if let Some(job_id) = &request.job_id {
        if !options.is_segment_mode() {
            store.save(job_id, Artifact::CognitiveLoad, &series).await?;
        }
    }
    Ok(series)
}

async fn optional_artifact(
    store: &JobStore,
    job_id: &str,
    artifact: Artifact,
) -> ApiResult<Vec<TranscriptSegment>> {
    match store.load(job_id, artifact).await {
        Ok(segments) => Ok(segments),
        Err(AnalyzerError::ArtifactNotFound { .. }) => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Run the full pipeline on a media file already on the server
pub async fn analyze(state: &AppState, request: AnalyzeRequest) -> ApiResult<AnalysisReport> {
    Ok(state
        .analyzer
        .analyze(&request.job_id, &request.video_path, request.language.as_deref())
        .await?)
}

/// Raw artifact document for a job
pub async fn get_artifact(state: &AppState, job_id: &str, artifact: &str) -> ApiResult<Value> {
    let artifact: Artifact = artifact
        .parse()
        .map_err(|e: String| ApiError::bad_request(e))?;
    Ok(state.analyzer.store().load(job_id, artifact).await?)
}

/// Plain-language explanation of a time range
pub async fn explain(state: &AppState, request: ExplainRequest) -> ApiResult<Value> {
    if !(request.start.is_finite() && request.end.is_finite()) || request.end <= request.start {
        return Err(ApiError::bad_request("end must be after start"));
    }

    let segments: Vec<TranscriptSegment> = match (request.segments, &request.job_id) {
        (Some(segments), _) => validate_segments(segments)?,
        (None, Some(job_id)) => state.analyzer.store().load(job_id, Artifact::Transcript).await?,
        (None, None) => return Err(ApiError::bad_request("either job_id or segments is required")),
    };

    let language = TargetLanguage::resolve(request.language.as_deref(), None);
    let llm = state.analyzer.language_model().await;
    let explanation = Explainer::new(llm.as_ref())
        .explain(&segments, request.start, request.end, &language)
        .await?;

    Ok(serde_json::json!({
        "start": request.start,
        "end": request.end,
        "explanation": explanation
    }))
}

/// Translate one text or a batch
pub async fn translate(state: &AppState, request: TranslateRequest) -> ApiResult<TranslateResponse> {
    let target = TargetLanguage::new(request.target);
    let llm = state.analyzer.language_model().await;
    let translator = Translator::new(llm.as_ref());

    match (request.text, request.texts) {
        (Some(text), None) => Ok(TranslateResponse::One {
            translation: translator.translate(&text, &target).await,
        }),
        (None, Some(texts)) => Ok(TranslateResponse::Many {
            translations: translator.translate_batch(&texts, &target).await,
        }),
        _ => Err(ApiError::bad_request("provide exactly one of text or texts")),
    }
}

/// Encyclopedia summary for a term
pub async fn wikipedia(state: &AppState, query: WikipediaQuery) -> ApiResult<Value> {
    if query.q.trim().is_empty() {
        return Err(ApiError::bad_request("q must not be empty"));
    }
    let summary = state
        .wikipedia
        .summary(&query.q, &query.lang, query.sentences.max(1))
        .await;
    Ok(serde_json::json!({ "query": query.q, "summary": summary }))
}

