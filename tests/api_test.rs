use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;
use url::Url;

use video_dubber::config::{CorsConfig, ResponseMode};
use video_dubber::fetch::yt_dlp::YtDlpFetcher;
use video_dubber::fetch::AudioFetcher;
use video_dubber::output::ArtifactStore;
use video_dubber::pipeline::{DubPipeline, PipelineSettings};
use video_dubber::server::{create_router, AppState};
use video_dubber::synthesize::{Synthesizer, VoiceMap, VoicePolicy};
use video_dubber::transcribe::{Transcriber, Transcript};
use video_dubber::translate::Translator;
use video_dubber::DubError;

const SOURCE_AUDIO: &[u8] = b"ID3 source clip";
const DUBBED_AUDIO: &[u8] = b"ID3 dubbed clip";

struct FakeFetcher;

#[async_trait::async_trait]
impl AudioFetcher for FakeFetcher {
    async fn fetch(&self, _url: &Url, workspace: &Path) -> Result<PathBuf, DubError> {
        let path = workspace.join("input.mp3");
        tokio::fs::write(&path, SOURCE_AUDIO)
            .await
            .map_err(|e| DubError::Download(e.to_string()))?;
        Ok(path)
    }

    fn fetcher_name(&self) -> &'static str {
        "fake"
    }
}

struct FakeTranscriber;

#[async_trait::async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _audio_path: &Path) -> Result<Transcript, DubError> {
        Ok(Transcript::from_text("What a wonderful day!"))
    }
}

struct FakeTranslator;

#[async_trait::async_trait]
impl Translator for FakeTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, DubError> {
        Ok(format!("({}) {}", target_language, text))
    }
}

#[derive(Default)]
struct CountingSynthesizer {
    calls: AtomicUsize,
    voices: std::sync::Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl Synthesizer for CountingSynthesizer {
    async fn synthesize(&self, _text: &str, voice: &str, output_path: &Path) -> Result<(), DubError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.voices.lock().unwrap().push(voice.to_string());
        tokio::fs::write(output_path, DUBBED_AUDIO)
            .await
            .map_err(|e| DubError::Synthesis(e.to_string()))
    }

    fn backend_name(&self) -> &'static str {
        "counting"
    }
}

struct TestApp {
    router: Router,
    synthesizer: Arc<CountingSynthesizer>,
    output_dir: tempfile::TempDir,
    _work_dir: tempfile::TempDir,
}

fn build_app(
    fetcher: Arc<dyn AudioFetcher>,
    policy: VoicePolicy,
    response_mode: ResponseMode,
) -> TestApp {
    let work_dir = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();
    let synthesizer = Arc::new(CountingSynthesizer::default());

    let pipeline = DubPipeline::new(
        fetcher,
        Arc::new(FakeTranscriber),
        Arc::new(FakeTranslator),
        synthesizer.clone(),
        VoiceMap::new(policy, "hi-IN-SwaraNeural"),
        PipelineSettings::uniform(work_dir.path(), Duration::from_secs(5)),
    );

    let state = AppState {
        pipeline: Arc::new(pipeline),
        artifacts: Arc::new(ArtifactStore::new(output_dir.path(), "http://dub.test")),
        response_mode,
    };

    TestApp {
        router: create_router(state, &CorsConfig::default()),
        synthesizer,
        output_dir,
        _work_dir: work_dir,
    }
}

fn default_app(policy: VoicePolicy, response_mode: ResponseMode) -> TestApp {
    build_app(Arc::new(FakeFetcher), policy, response_mode)
}

fn dub_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/dub")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn given_running_server_when_health_check_then_returns_running_status() {
    let app = default_app(VoicePolicy::Strict, ResponseMode::Json);

    let response = app
        .router
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let json = json_body(response).await;
    assert_eq!(json["status"], "Backend Running Successfully!");
}

#[tokio::test]
async fn given_english_target_when_dubbing_in_json_mode_then_returns_servable_audio_url() {
    let app = default_app(VoicePolicy::Strict, ResponseMode::Json);

    let response = app
        .router
        .clone()
        .oneshot(dub_request(
            r#"{"video_url": "https://youtu.be/short-clip", "target_language": "English"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "success");
    let audio_url = json["audio_url"].as_str().unwrap();
    assert!(audio_url.starts_with("http://dub.test/audio/dubbed_"));
    assert!(audio_url.ends_with(".mp3"));

    let published: Vec<_> = std::fs::read_dir(app.output_dir.path()).unwrap().collect();
    assert_eq!(published.len(), 1);

    let path = audio_url.trim_start_matches("http://dub.test");
    let download = app
        .router
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(download.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(download.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(!bytes.is_empty());
    assert_eq!(&bytes[..], DUBBED_AUDIO);
    assert_ne!(&bytes[..], SOURCE_AUDIO);

    assert_eq!(
        *app.synthesizer.voices.lock().unwrap(),
        vec!["en-US-JennyNeural".to_string()]
    );
}

#[tokio::test]
async fn given_binary_mode_when_dubbing_then_returns_mp3_attachment() {
    let app = default_app(VoicePolicy::Strict, ResponseMode::Binary);

    let response = app
        .router
        .oneshot(dub_request(r#"{"url": "https://youtu.be/clip", "language": "hindi"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"dubbed_audio.mp3\""
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], DUBBED_AUDIO);
    assert_eq!(std::fs::read_dir(app.output_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn given_strict_policy_when_language_unknown_then_rejects_without_synthesis() {
    let app = default_app(VoicePolicy::Strict, ResponseMode::Json);

    let response = app
        .router
        .oneshot(dub_request(
            r#"{"video_url": "https://youtu.be/clip", "target_language": "klingon"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "Language not supported");
    assert_eq!(json["stage"], "synthesis");
    assert_eq!(app.synthesizer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn given_lenient_policy_when_language_unknown_then_uses_default_voice() {
    let app = default_app(VoicePolicy::Lenient, ResponseMode::Json);

    let response = app
        .router
        .oneshot(dub_request(
            r#"{"video_url": "https://youtu.be/clip", "target_language": "klingon"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "success");
    assert_eq!(
        *app.synthesizer.voices.lock().unwrap(),
        vec!["hi-IN-SwaraNeural".to_string()]
    );
}

#[tokio::test]
async fn given_malformed_url_when_dubbing_then_reports_download_stage() {
    let app = build_app(
        Arc::new(YtDlpFetcher::default()),
        VoicePolicy::Strict,
        ResponseMode::Json,
    );

    let response = app
        .router
        .oneshot(dub_request(
            r#"{"video_url": "not-a-url", "target_language": "english"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = json_body(response).await;
    assert_eq!(json["stage"], "download");
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("Audio download failed"));
    assert_eq!(app.synthesizer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn given_missing_fields_when_dubbing_then_returns_bad_request() {
    let app = default_app(VoicePolicy::Strict, ResponseMode::Json);

    let response = app
        .router
        .oneshot(dub_request(r#"{"video_url": "https://youtu.be/clip"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert!(json["error"].as_str().unwrap().starts_with("Invalid request"));
    assert!(json.get("stage").is_none());
}

#[tokio::test]
async fn given_request_id_header_when_calling_then_it_is_echoed() {
    let app = default_app(VoicePolicy::Strict, ResponseMode::Json);

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-42");
}
