//! Voxcase CLI: ingest voice evidence and run the analysis pipeline.
//!
//! Usage:
//!   cargo run -p voxcase-evidence -- --ingest capture.webm --owner U1 [--issue ISSUE-7] [--mime audio/webm]
//!   cargo run -p voxcase-evidence -- --analyze <recording-id>
//!   cargo run -p voxcase-evidence -- --show <recording-id>
//!   cargo run -p voxcase-evidence -- --list --owner U1
//!
//! Uses placeholder analysis backends unless VOXCASE_STT_API_KEY /
//! VOXCASE_EMOTION_API_URL are configured.

use std::sync::Arc;
use tracing::info;
use voxcase_analysis::{create_best_emotion, create_best_transcription, ComposedAnalyzer};
use voxcase_evidence::{
    blob_store_for, AnalysisPipeline, EvidenceConfig, IngestRequest, Ingestor, RecordingFilter,
    RecordingStore,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let mut ingest_path: Option<String> = None;
    let mut analyze_id: Option<String> = None;
    let mut show_id: Option<String> = None;
    let mut list = false;
    let mut owner: Option<String> = None;
    let mut issue: Option<String> = None;
    let mut mime = "audio/webm".to_string();

    while let Some(a) = args.next() {
        match a.as_str() {
            "--ingest" => ingest_path = args.next(),
            "--analyze" => analyze_id = args.next(),
            "--show" => show_id = args.next(),
            "--list" => list = true,
            "--owner" => owner = args.next(),
            "--issue" => issue = args.next(),
            "--mime" => {
                if let Some(m) = args.next() {
                    mime = m;
                }
            }
            _ => {}
        }
    }

    if ingest_path.is_none() && analyze_id.is_none() && show_id.is_none() && !list {
        eprintln!("Voxcase — Voice Evidence Pipeline");
        eprintln!("  --ingest <file> --owner <id>   Upload an audio file as a PENDING recording");
        eprintln!("  --issue <id>                   Associate the upload with an issue (case)");
        eprintln!("  --mime <type>                  Declared MIME type (default audio/webm)");
        eprintln!("  --analyze <recording-id>       Run transcription + emotion analysis");
        eprintln!("  --show <recording-id>          Print a recording's analysis state");
        eprintln!("  --list --owner <id>            List recordings, newest first");
        eprintln!();
        eprintln!("Set VOXCASE_STT_API_KEY for real transcription (else placeholder).");
        eprintln!("Evidence DB: VOXCASE_STORAGE_PATH or ./data → data/voxcase/evidence.sqlite");
        return Ok(());
    }

    let config = EvidenceConfig::from_env();
    let store = Arc::new(RecordingStore::open_default()?);
    let blobs = blob_store_for(&config.storage_provider)?;
    let transcription: Arc<dyn voxcase_analysis::TranscriptionBackend> =
        Arc::from(create_best_transcription()?);
    let emotion: Arc<dyn voxcase_analysis::EmotionBackend> = Arc::from(create_best_emotion()?);
    let analyzer = Arc::new(ComposedAnalyzer::new(transcription.clone(), emotion));
    let pipeline = AnalysisPipeline::new(
        Arc::clone(&store),
        Arc::clone(&blobs),
        transcription,
        analyzer,
        config.clone(),
    );

    if let Some(path) = ingest_path {
        let owner = owner.ok_or("--ingest requires --owner <id>")?;
        let bytes = std::fs::read(&path)?;
        let filename = std::path::Path::new(&path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let ingestor = Ingestor::new(store, blobs, config);
        let summary = ingestor.ingest(IngestRequest {
            bytes,
            mime_type: mime,
            filename,
            owner_id: owner,
            issue_id: issue,
            duration_secs: None,
            captured_at_ms: None,
            location: None,
            notes: None,
            tags: vec![],
        })?;
        info!(
            "ingested {} ({} bytes, ~{:.0}s, state {})",
            summary.id, summary.size_bytes, summary.duration_secs, summary.state
        );
        println!("{}", summary.id);
        return Ok(());
    }

    if let Some(id) = analyze_id {
        let summary = pipeline.analyze(&id).await?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if let Some(id) = show_id {
        let summary = pipeline.get(&id)?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let filter = RecordingFilter {
        owner_id: owner,
        issue_id: issue,
        ..Default::default()
    };
    for summary in pipeline.list(&filter)? {
        println!(
            "{}  {}  {:>9}  {}{}",
            summary.id,
            summary.state,
            summary.size_bytes,
            summary.filename,
            if summary.is_emergency { "  [EMERGENCY]" } else { "" }
        );
    }
    Ok(())
}
