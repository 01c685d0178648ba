use anyhow::Context;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

pub mod workspace;

use crate::config::{Config, PipelineConfig};
use crate::fetch::yt_dlp::YtDlpFetcher;
use crate::fetch::{parse_source_url, AudioFetcher};
use crate::synthesize::edge_tts::EdgeTtsSynthesizer;
use crate::synthesize::{Synthesizer, VoiceMap};
use crate::transcribe::openai::OpenAiTranscriber;
use crate::transcribe::{Transcriber, Transcript};
use crate::translate::openai::OpenAiTranslator;
use crate::translate::Translator;
use crate::utils::normalize_language;
use crate::{DubError, Stage};

use workspace::JobWorkspace;

/// File name of the synthesized audio inside the workspace
const OUTPUT_FILE: &str = "dubbed.mp3";

/// A single dubbing job as received at ingress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DubRequest {
    /// Source video URL
    pub url: String,

    /// Lowercased target language tag
    pub target_language: String,
}

impl DubRequest {
    pub fn new(url: impl Into<String>, target_language: &str) -> Self {
        Self {
            url: url.into().trim().to_string(),
            target_language: normalize_language(target_language),
        }
    }
}

/// Lifecycle of one dub job
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    Fetching,
    Transcribing,
    Translating,
    Synthesizing,
    Done,
    Failed { stage: Stage, reason: String },
}

impl PipelineState {
    fn entering(stage: Stage) -> Self {
        match stage {
            Stage::Download => PipelineState::Fetching,
            Stage::Transcription => PipelineState::Transcribing,
            Stage::Translation => PipelineState::Translating,
            Stage::Synthesis => PipelineState::Synthesizing,
        }
    }

    /// Short human readable label, used by the CLI spinner
    pub fn describe(&self) -> String {
        match self {
            PipelineState::Fetching => "Downloading audio...".to_string(),
            PipelineState::Transcribing => "Transcribing...".to_string(),
            PipelineState::Translating => "Translating...".to_string(),
            PipelineState::Synthesizing => "Synthesizing speech...".to_string(),
            PipelineState::Done => "Done".to_string(),
            PipelineState::Failed { stage, reason } => format!("Failed at {}: {}", stage, reason),
        }
    }
}

/// Timeouts and filesystem roots for pipeline runs
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub work_root: PathBuf,
    pub download_timeout: Duration,
    pub transcription_timeout: Duration,
    pub translation_timeout: Duration,
    pub synthesis_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        let timeouts = &config.timeouts;
        Self {
            work_root: config.work_dir.clone().unwrap_or_else(std::env::temp_dir),
            download_timeout: timeouts.for_stage(Stage::Download),
            transcription_timeout: timeouts.for_stage(Stage::Transcription),
            translation_timeout: timeouts.for_stage(Stage::Translation),
            synthesis_timeout: timeouts.for_stage(Stage::Synthesis),
        }
    }

    /// Same timeout for every stage
    pub fn uniform(work_root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            work_root: work_root.into(),
            download_timeout: timeout,
            transcription_timeout: timeout,
            translation_timeout: timeout,
            synthesis_timeout: timeout,
        }
    }

    fn timeout_for(&self, stage: Stage) -> Duration {
        match stage {
            Stage::Download => self.download_timeout,
            Stage::Transcription => self.transcription_timeout,
            Stage::Translation => self.translation_timeout,
            Stage::Synthesis => self.synthesis_timeout,
        }
    }
}

/// Result of a successful run.
///
/// Owns the job workspace: the audio file is only valid while this value is alive.
#[derive(Debug)]
pub struct DubbedAudio {
    workspace: JobWorkspace,
    path: PathBuf,
    voice: String,
    transcript: Transcript,
    translation: String,
    completed_at: DateTime<Utc>,
}

impl DubbedAudio {
    pub fn job_id(&self) -> Uuid {
        self.workspace.job_id()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn translation(&self) -> &str {
        &self.translation
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    pub async fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

/// Fetch -> transcribe -> translate -> synthesize, one request at a time
pub struct DubPipeline {
    fetcher: Arc<dyn AudioFetcher>,
    transcriber: Arc<dyn Transcriber>,
    translator: Arc<dyn Translator>,
    synthesizer: Arc<dyn Synthesizer>,
    voices: VoiceMap,
    settings: PipelineSettings,
}

impl DubPipeline {
    pub fn new(
        fetcher: Arc<dyn AudioFetcher>,
        transcriber: Arc<dyn Transcriber>,
        translator: Arc<dyn Translator>,
        synthesizer: Arc<dyn Synthesizer>,
        voices: VoiceMap,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            fetcher,
            transcriber,
            translator,
            synthesizer,
            voices,
            settings,
        }
    }

    /// Build the production pipeline: yt-dlp, OpenAI and edge-tts
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.openai.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        let fetcher = YtDlpFetcher::new(config.tools.yt_dlp.clone());
        let synthesizer = EdgeTtsSynthesizer::new(config.tools.edge_tts.clone());

        tracing::info!(
            fetcher = fetcher.fetcher_name(),
            synthesizer = synthesizer.backend_name(),
            transcription_model = %config.openai.transcription_model,
            translation_model = %config.openai.translation_model,
            voice_policy = %config.pipeline.voice_policy,
            "Dub pipeline configured"
        );

        if config.openai.api_key.is_none() {
            tracing::warn!("OPENAI_API_KEY is not set; transcription and translation will fail");
        }

        Ok(Self::new(
            Arc::new(fetcher),
            Arc::new(OpenAiTranscriber::new(
                client.clone(),
                &config.openai,
                config.retry.clone(),
            )),
            Arc::new(OpenAiTranslator::new(client, &config.openai)),
            Arc::new(synthesizer),
            VoiceMap::new(config.pipeline.voice_policy, config.pipeline.default_voice.clone()),
            PipelineSettings::from_config(&config.pipeline),
        ))
    }

    pub async fn run(&self, request: &DubRequest) -> Result<DubbedAudio, DubError> {
        self.run_with_observer(request, &|_| {}).await
    }

    /// Run one job, reporting every state transition to `observer`
    pub async fn run_with_observer(
        &self,
        request: &DubRequest,
        observer: &(dyn Fn(&PipelineState) + Send + Sync),
    ) -> Result<DubbedAudio, DubError> {
        let job_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "dub",
            job_id = %job_id,
            language = %request.target_language
        );

        async move {
            let started = Instant::now();
            let result = self.execute(job_id, request, observer).await;

            match &result {
                Ok(dubbed) => tracing::info!(
                    voice = %dubbed.voice(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Dub completed"
                ),
                Err(err) => tracing::warn!(
                    stage = err.stage().map(|s| s.as_str()).unwrap_or("none"),
                    error = %err,
                    "Dub failed"
                ),
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        job_id: Uuid,
        request: &DubRequest,
        observer: &(dyn Fn(&PipelineState) + Send + Sync),
    ) -> Result<DubbedAudio, DubError> {
        // Strict policy rejects before any external call
        let voice = self.voices.resolve(&request.target_language).map_err(|err| {
            observer(&PipelineState::Failed {
                stage: Stage::Synthesis,
                reason: err.to_string(),
            });
            err
        })?;

        let workspace = JobWorkspace::create(&self.settings.work_root, job_id)
            .map_err(|e| DubError::Internal(format!("cannot create workspace: {}", e)))?;

        let audio_path = self
            .run_stage(Stage::Download, observer, async {
                let url = parse_source_url(&request.url)?;
                self.fetcher.fetch(&url, workspace.path()).await
            })
            .await?;

        let transcript = self
            .run_stage(
                Stage::Transcription,
                observer,
                self.transcriber.transcribe(&audio_path),
            )
            .await?;

        let translation = self
            .run_stage(
                Stage::Translation,
                observer,
                self.translator.translate(&transcript.text, &request.target_language),
            )
            .await?;

        let output_path = workspace.file(OUTPUT_FILE);
        self.run_stage(Stage::Synthesis, observer, async {
            self.synthesizer
                .synthesize(&translation, &voice, &output_path)
                .await?;
            ensure_audio(&output_path).await
        })
        .await?;

        observer(&PipelineState::Done);

        Ok(DubbedAudio {
            workspace,
            path: output_path,
            voice,
            transcript,
            translation,
            completed_at: Utc::now(),
        })
    }

    /// Run one stage under its timeout, attributing any failure to `stage`
    async fn run_stage<T, F>(
        &self,
        stage: Stage,
        observer: &(dyn Fn(&PipelineState) + Send + Sync),
        work: F,
    ) -> Result<T, DubError>
    where
        F: Future<Output = Result<T, DubError>>,
    {
        observer(&PipelineState::entering(stage));
        tracing::info!(stage = stage.as_str(), "Stage started");

        let limit = self.settings.timeout_for(stage);
        let started = Instant::now();

        let result = match tokio::time::timeout(limit, work).await {
            Ok(result) => result,
            Err(_) => Err(DubError::for_stage(
                stage,
                format!("timed out after {:?}", limit),
            )),
        };

        match &result {
            Ok(_) => tracing::debug!(
                stage = stage.as_str(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Stage finished"
            ),
            Err(err) => observer(&PipelineState::Failed {
                stage,
                reason: err.to_string(),
            }),
        }

        result
    }
}

/// The synthesizer must leave a non-empty file behind
async fn ensure_audio(path: &Path) -> Result<(), DubError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(DubError::Synthesis("synthesized audio is empty".to_string())),
        Err(_) => Err(DubError::Synthesis("no audio was produced".to_string())),
    }
}
