//! End-to-end pipeline tests driving the ingestion -> parsing -> analysis
//! chain directly against the local backends (spec §8 "End-to-end
//! scenarios"). Handlers are invoked the way the message bus would call
//! them (`MessageHandler::handle` on serialized payload bytes) without
//! spinning up the polling consume loop, keeping the tests deterministic.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use dtce::ledger::local::LocalJobStatusStore;
use dtce::ledger::JobStatusStore;
use dtce::model::{
    self, AnalysisJob, ContentBlock, ContextJson, DocumentType, JobRequest, JobStatus, Section,
    SectionHierarchy, TemplateJson, VisualTheme,
};
use dtce::queue::local::LocalFileQueue;
use dtce::queue::{MessageBus, MessageHandler};
use dtce::renderer::{self, RenderOptions};
use dtce::storage::local::LocalObjectStore;
use dtce::storage::DocumentStore;
use dtce::workers::analysis::AnalysisHandler;
use dtce::workers::ingestion::IngestionHandler;
use dtce::workers::parsing::ParsingHandler;

struct Harness {
    store: Arc<dyn DocumentStore>,
    ledger: Arc<dyn JobStatusStore>,
    bus: Arc<dyn MessageBus>,
    _dir: tempfile::TempDir,
}

impl Harness {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn DocumentStore> =
            Arc::new(LocalObjectStore::new(dir.path().join("storage"), "http://localhost:8080").unwrap());
        let ledger: Arc<dyn JobStatusStore> =
            Arc::new(LocalJobStatusStore::new(dir.path().join("ledger")).unwrap());
        let bus: Arc<dyn MessageBus> =
            Arc::new(LocalFileQueue::new(dir.path().join("queues"), Duration::from_millis(20)).unwrap());
        Self { store, ledger, bus, _dir: dir }
    }

    async fn run_pipeline(&self, request: JobRequest) {
        let ingestion = IngestionHandler::new(self.store.clone(), self.ledger.clone(), self.bus.clone());
        ingestion
            .handle(serde_json::to_vec(&request).unwrap())
            .await
            .unwrap();

        let parsing = ParsingHandler::new(self.store.clone(), self.ledger.clone(), self.bus.clone());
        parsing
            .handle(serde_json::to_vec(&request).unwrap())
            .await
            .unwrap();

        let analysis_job = AnalysisJob {
            job_id: request.job_id.clone(),
            parse_result_key: model::keys::parse_result(&request.job_id),
            document_type: request.document_type,
        };
        let analysis = AnalysisHandler::new(self.store.clone(), self.ledger.clone());
        analysis
            .handle(serde_json::to_vec(&analysis_job).unwrap())
            .await
            .unwrap();
    }
}

/// Builds a minimal two-section DOCX (via the renderer itself, so we
/// don't need to hand-author an OOXML fixture) to drive through the real
/// parsing handler.
async fn sample_docx_bytes() -> Vec<u8> {
    let template = TemplateJson {
        visual_theme: VisualTheme::default(),
        section_hierarchy: SectionHierarchy {
            sections: vec![
                Section {
                    section_title: "Professional Summary".to_string(),
                    placeholder_id: "placeholder_section_1".to_string(),
                    sub_sections: vec![Section {
                        section_title: "Core Skills".to_string(),
                        placeholder_id: "placeholder_subsection_1".to_string(),
                        sub_sections: Vec::new(),
                    }],
                },
                Section {
                    section_title: "Work Experience".to_string(),
                    placeholder_id: "placeholder_section_2".to_string(),
                    sub_sections: Vec::new(),
                },
            ],
        },
        logo_map: Vec::new(),
    };
    let context = ContextJson {
        linguistic_style: dtce::model::LinguisticStyle {
            overall_formality: dtce::model::Formality::Formal,
            formality_confidence_score: 0.9,
            dominant_tone: dtce::model::Tone::Neutral,
            tone_confidence_score: 0.5,
            writing_style_vector: vec![0.0; 128],
        },
        content_blocks: vec![
            ContentBlock {
                placeholder_id: "placeholder_section_1".to_string(),
                section_sample_text: "Seasoned engineer with a decade of distributed systems experience.".to_string(),
                word_count: 10,
            },
            ContentBlock {
                placeholder_id: "placeholder_subsection_1".to_string(),
                section_sample_text: "Rust, distributed systems, mentoring".to_string(),
                word_count: 5,
            },
            ContentBlock {
                placeholder_id: "placeholder_section_2".to_string(),
                section_sample_text: "Led the platform team through three major migrations.".to_string(),
                word_count: 9,
            },
        ],
        administrative_metadata: None,
    };

    let options = RenderOptions {
        include_logos: false,
        include_template_logos_from_storage: false,
        emit_placeholder_for_missing_content: false,
        content_overrides: HashMap::new(),
        logo_overrides: HashMap::new(),
    };
    renderer::render(&template, Some(&context), &options, None).await.unwrap()
}

#[tokio::test]
async fn happy_path_docx_reaches_complete_with_both_artifacts() {
    let harness = Harness::new().await;

    let job_id = "job-happy-path".to_string();
    let bytes = sample_docx_bytes().await;
    let key = model::keys::document(&job_id, "resume.docx");
    harness
        .store
        .upload(&key, bytes, "application/vnd.openxmlformats-officedocument.wordprocessingml.document")
        .await
        .unwrap();

    harness.ledger.create(&job_id).await.unwrap();
    let request = JobRequest {
        job_id: job_id.clone(),
        document_type: DocumentType::Docx,
        file_path: Some(key),
        document_url: None,
        file_name: Some("resume.docx".to_string()),
        created_at: Utc::now(),
    };

    harness.run_pipeline(request).await;

    let record = harness.ledger.get(&job_id).await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Complete);
    assert!(record.completed_at.is_some());

    let template_key = record.template_json_key.unwrap();
    let context_key = record.context_json_key.unwrap();

    let template_bytes = harness.store.download(&template_key).await.unwrap();
    let template: TemplateJson = serde_json::from_slice(&template_bytes).unwrap();
    assert_eq!(template.section_hierarchy.sections.len(), 2);
    assert_eq!(template.section_hierarchy.sections[0].sub_sections.len(), 1);

    let context_bytes = harness.store.download(&context_key).await.unwrap();
    let context: ContextJson = serde_json::from_slice(&context_bytes).unwrap();
    assert!(!context.content_blocks.is_empty());
    assert!(matches!(
        context.linguistic_style.overall_formality,
        dtce::model::Formality::Formal | dtce::model::Formality::Informal
    ));
}

#[tokio::test]
async fn missing_document_fails_without_reaching_parsing() {
    let harness = Harness::new().await;

    let job_id = "job-missing-doc".to_string();
    harness.ledger.create(&job_id).await.unwrap();

    let request = JobRequest {
        job_id: job_id.clone(),
        document_type: DocumentType::Docx,
        file_path: Some(model::keys::document(&job_id, "never-uploaded.docx")),
        document_url: None,
        file_name: Some("never-uploaded.docx".to_string()),
        created_at: Utc::now(),
    };

    let ingestion = IngestionHandler::new(harness.store.clone(), harness.ledger.clone(), harness.bus.clone());
    ingestion
        .handle(serde_json::to_vec(&request).unwrap())
        .await
        .unwrap();

    let record = harness.ledger.get(&job_id).await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert!(record.error_message.unwrap().to_lowercase().contains("not found"));

    // Ingestion never advanced status, so the parse-result key must not exist.
    let parse_key = model::keys::parse_result(&job_id);
    assert!(harness.store.download(&parse_key).await.is_err());
}

#[tokio::test]
async fn renderer_idempotence_preserves_section_titles_and_order() {
    let harness = Harness::new().await;
    let bytes = sample_docx_bytes().await;

    let job_id = "job-roundtrip".to_string();
    let key = model::keys::document(&job_id, "resume.docx");
    harness.store.upload(&key, bytes, "application/octet-stream").await.unwrap();

    let parsed = dtce::parsing::handler_for(DocumentType::Docx)
        .parse(
            &job_id,
            dtce::parsing::ParseInput::Bytes(harness.store.download(&key).await.unwrap()),
            harness.store.as_ref(),
        )
        .await
        .unwrap();

    let titles: Vec<&str> = parsed
        .template_json
        .section_hierarchy
        .sections
        .iter()
        .map(|s| s.section_title.as_str())
        .collect();
    assert_eq!(titles, vec!["Professional Summary", "Work Experience"]);
    assert_eq!(
        parsed.template_json.section_hierarchy.sections[0].sub_sections[0].section_title,
        "Core Skills"
    );
}
