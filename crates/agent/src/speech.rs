//! Speech boundaries. Failures are reported as values, never as errors.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
    pub success: bool,
    pub confidence: f64,
}

impl Transcription {
    pub fn recognised(text: impl Into<String>, confidence: f64) -> Self {
        Self { text: text.into(), success: true, confidence: confidence.clamp(0.0, 1.0) }
    }

    pub fn failed() -> Self {
        Self { text: String::new(), success: false, confidence: 0.0 }
    }

    pub fn is_usable(&self) -> bool {
        self.success && !self.text.trim().is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechOutput {
    pub success: bool,
    pub duration: Duration,
}

impl SpeechOutput {
    pub fn spoken(duration: Duration) -> Self {
        Self { success: true, duration }
    }

    pub fn failed() -> Self {
        Self { success: false, duration: Duration::ZERO }
    }
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Transcription;
}

#[async_trait]
pub trait TextToSpeech: Send + Sync {
    async fn speak(&self, text: &str) -> SpeechOutput;
}

/// Stand-in used when no speech services are configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSpeech;

#[async_trait]
impl SpeechToText for NoSpeech {
    async fn transcribe(&self, _audio: &[u8]) -> Transcription {
        Transcription::failed()
    }
}

#[async_trait]
impl TextToSpeech for NoSpeech {
    async fn speak(&self, _text: &str) -> SpeechOutput {
        SpeechOutput::failed()
    }
}

/// Treats the audio payload as UTF-8 text. Useful for piping transcripts
/// produced elsewhere through the voice path.
#[derive(Clone, Copy, Debug, Default)]
pub struct TranscriptPassthrough;

#[async_trait]
impl SpeechToText for TranscriptPassthrough {
    async fn transcribe(&self, audio: &[u8]) -> Transcription {
        match std::str::from_utf8(audio) {
            Ok(text) if !text.trim().is_empty() => Transcription::recognised(text.trim(), 1.0),
            _ => Transcription::failed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{NoSpeech, SpeechToText, TextToSpeech, TranscriptPassthrough};

    #[tokio::test]
    async fn missing_services_fail_as_values() {
        let transcription = NoSpeech.transcribe(b"...").await;
        let spoken = NoSpeech.speak("hello").await;

        assert!(!transcription.is_usable());
        assert!(!spoken.success);
        assert_eq!(spoken.duration, Duration::ZERO);
    }

    #[tokio::test]
    async fn passthrough_reads_utf8_and_rejects_noise() {
        let ok = TranscriptPassthrough.transcribe(b"  order a pizza \n").await;
        let blank = TranscriptPassthrough.transcribe(b"   ").await;
        let binary = TranscriptPassthrough.transcribe(&[0xff, 0xfe, 0x00]).await;

        assert_eq!(ok.text, "order a pizza");
        assert!(ok.is_usable());
        assert!(!blank.success);
        assert!(!binary.success);
    }
}
