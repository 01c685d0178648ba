use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::Synthesizer;
use crate::DubError;

/// Speech synthesizer backed by the `edge-tts` command line tool
pub struct EdgeTtsSynthesizer {
    edge_tts_path: String,
}

impl EdgeTtsSynthesizer {
    pub fn new(edge_tts_path: impl Into<String>) -> Self {
        Self {
            edge_tts_path: edge_tts_path.into(),
        }
    }
}

#[async_trait]
impl Synthesizer for EdgeTtsSynthesizer {
    async fn synthesize(&self, text: &str, voice: &str, output_path: &Path) -> Result<(), DubError> {
        if text.trim().is_empty() {
            return Err(DubError::Synthesis("nothing to synthesize".to_string()));
        }

        // Long transcripts go through a file rather than argv
        let text_path = output_path.with_extension("txt");
        tokio::fs::write(&text_path, text)
            .await
            .map_err(|e| DubError::Synthesis(format!("cannot write text file: {}", e)))?;

        tracing::debug!(voice = %voice, chars = text.len(), "Running edge-tts");

        let output = Command::new(&self.edge_tts_path)
            .arg("--voice")
            .arg(voice)
            .arg("--file")
            .arg(&text_path)
            .arg("--write-media")
            .arg(output_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| DubError::Synthesis(format!("cannot run {}: {}", self.edge_tts_path, e)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(DubError::Synthesis(format!(
                "edge-tts exited with {}: {}",
                output.status,
                error.trim()
            )));
        }

        let size = tokio::fs::metadata(output_path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if size == 0 {
            return Err(DubError::Synthesis("edge-tts produced no audio".to_string()));
        }

        tracing::info!(voice = %voice, bytes = size, "Speech synthesis completed");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "edge-tts"
    }
}
