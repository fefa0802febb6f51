//! # Artifact generation
//! Turns the selected item into a newsreel: a three-part script from the
//! text cascade, then narration, a title card and stock footage from the
//! voice, image and video cascades.
//!
//! The script is mandatory. Without it there is nothing to narrate, so a
//! script failure aborts generation. The media stages are optional: their
//! failures are attached to the outcome and the partial newsreel is kept.

use serde::{Deserialize, Serialize};

use crate::cascade::{CascadeSuccess, ProviderCascade};
use crate::error::{CascadeError, GenerationError, StageError};
use crate::model::CandidateItem;
use crate::providers::{Artifact, GenerationRequest};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptStyle {
    #[default]
    #[serde(rename = "newsreel_1940s", alias = "1940s newsreel")]
    Newsreel1940s,
    Comedic,
}

impl ScriptStyle {
    fn persona(self) -> &'static str {
        match self {
            ScriptStyle::Newsreel1940s => {
                "You are a 1940s newsreel announcer. Dramatic, theatrical, rapid-fire delivery."
            }
            ScriptStyle::Comedic => {
                "You are a comedy news host. Light, playful, quick punchlines."
            }
        }
    }

    fn visual_style(self) -> &'static str {
        match self {
            ScriptStyle::Newsreel1940s => "black and white vintage newsreel still, film grain",
            ScriptStyle::Comedic => "bright cartoonish editorial illustration",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub style: ScriptStyle,
    pub hook: String,
    pub body: String,
    pub sign_off: String,
}

impl Script {
    /// Narration text in reading order.
    pub fn full_text(&self) -> String {
        [self.hook.trim(), self.body.trim(), self.sign_off.trim()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Which provider served which stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageProvider {
    pub stage: String,
    pub provider: String,
}

/// The generated artifact. Media parts are absent when their stage failed
/// or has no configured providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Newsreel {
    pub item_id: String,
    pub script: Script,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narration: Option<Artifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual: Option<Artifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footage: Option<Artifact>,
    pub providers: Vec<StageProvider>,
}

#[derive(Debug)]
pub struct GenerationOutcome {
    pub newsreel: Newsreel,
    /// Media stages that exhausted their cascades.
    pub errors: Vec<StageError>,
}

impl GenerationOutcome {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Clone)]
pub struct ArtifactGenerator {
    text: ProviderCascade,
    voice: ProviderCascade,
    image: ProviderCascade,
    video: ProviderCascade,
    style: ScriptStyle,
}

impl ArtifactGenerator {
    pub fn new(
        text: ProviderCascade,
        voice: ProviderCascade,
        image: ProviderCascade,
        video: ProviderCascade,
    ) -> Self {
        Self {
            text,
            voice,
            image,
            video,
            style: ScriptStyle::default(),
        }
    }

    pub fn with_style(mut self, style: ScriptStyle) -> Self {
        self.style = style;
        self
    }

    pub fn style(&self) -> ScriptStyle {
        self.style
    }

    pub async fn generate(&self, item: &CandidateItem) -> Result<GenerationOutcome, GenerationError> {
        let mut providers = Vec::new();
        let script = self.write_script(item, &mut providers).await?;

        let mut newsreel = Newsreel {
            item_id: item.id.clone(),
            script,
            narration: None,
            visual: None,
            footage: None,
            providers,
        };
        let mut errors = Vec::new();

        let narration_req = GenerationRequest::prompt(newsreel.script.full_text());
        newsreel.narration = self
            .media_stage("narration", &self.voice, &narration_req, &mut newsreel.providers, &mut errors)
            .await;

        let visual_req = GenerationRequest::prompt(format!(
            "{}: {}",
            self.style.visual_style(),
            item.title
        ))
        .with_negative("text, watermark, logo");
        newsreel.visual = self
            .media_stage("visual", &self.image, &visual_req, &mut newsreel.providers, &mut errors)
            .await;

        let keywords = extract_keywords(&newsreel.script.body);
        if !keywords.is_empty() {
            let footage_req = GenerationRequest::prompt(keywords.join(" "));
            newsreel.footage = self
                .media_stage("footage", &self.video, &footage_req, &mut newsreel.providers, &mut errors)
                .await;
        }

        Ok(GenerationOutcome { newsreel, errors })
    }

    async fn write_script(
        &self,
        item: &CandidateItem,
        providers: &mut Vec<StageProvider>,
    ) -> Result<Script, GenerationError> {
        let story = item.analysis_text();
        let persona = self.style.persona();

        let hook = self
            .text_stage(
                "script.hook",
                GenerationRequest::prompt(format!(
                    "Write a one-sentence opening line for this weird news story.\n\n{story}"
                ))
                .with_system(persona)
                .with_max_tokens(100),
                providers,
            )
            .await?;

        let body = self
            .text_stage(
                "script.body",
                GenerationRequest::prompt(format!(
                    "Write a 45-second script for this weird news story. \
                     Continue from this opening: {hook}\n\n{story}"
                ))
                .with_system(persona)
                .with_max_tokens(500),
                providers,
            )
            .await?;

        let sign_off = self
            .text_stage(
                "script.sign_off",
                GenerationRequest::prompt(
                    "Write a one-sentence sign-off asking viewers to follow for more weird news.",
                )
                .with_system(persona)
                .with_max_tokens(60),
                providers,
            )
            .await?;

        Ok(Script {
            style: self.style,
            hook,
            body,
            sign_off,
        })
    }

    async fn text_stage(
        &self,
        stage: &str,
        req: GenerationRequest,
        providers: &mut Vec<StageProvider>,
    ) -> Result<String, GenerationError> {
        let fail = |source: CascadeError| GenerationError::ArtifactGenerationFailed {
            stage: stage.to_string(),
            source,
        };
        let ok = self.text.invoke(&req).await.map_err(fail)?;
        let text = match ok.artifact.as_text() {
            Some(t) => t.trim().to_string(),
            None => {
                return Err(fail(CascadeError::AllProvidersExhausted {
                    capability: self.text.capability(),
                    failures: vec![crate::error::ProviderFailure {
                        provider: ok.provider,
                        reason: "returned a non-text artifact".into(),
                    }],
                    attempts: ok.attempts,
                }))
            }
        };
        tracing::info!(stage, provider = %ok.provider, "script stage done");
        providers.push(StageProvider {
            stage: stage.to_string(),
            provider: ok.provider,
        });
        Ok(text)
    }

    async fn media_stage(
        &self,
        stage: &str,
        cascade: &ProviderCascade,
        req: &GenerationRequest,
        providers: &mut Vec<StageProvider>,
        errors: &mut Vec<StageError>,
    ) -> Option<Artifact> {
        if cascade.is_empty() {
            tracing::debug!(stage, "no providers configured; skipping stage");
            return None;
        }
        match cascade.invoke(req).await {
            Ok(CascadeSuccess {
                artifact, provider, ..
            }) => {
                tracing::info!(stage, %provider, "media stage done");
                providers.push(StageProvider {
                    stage: stage.to_string(),
                    provider,
                });
                Some(artifact)
            }
            Err(e) => {
                tracing::warn!(stage, error = %e, "media stage failed; keeping partial newsreel");
                let mut se = StageError::from(&e);
                se.message = format!("{stage}: {}", se.message);
                errors.push(se);
                None
            }
        }
    }
}

const STOP_WORDS: &[&str] = &["and", "the", "in", "on", "at", "to", "for", "of", "with", "a", "an"];

/// Search keywords for stock footage: lowercase words minus stop words and
/// punctuation, at most five. Breaking-news scripts get period flavour words.
pub fn extract_keywords(content: &str) -> Vec<String> {
    let mut words: Vec<String> = content
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(&w.as_str()))
        .collect();

    if content.contains("FLASH!") || content.contains("BREAKING") {
        words.extend(["newsreel", "vintage", "news"].map(String::from));
    }
    words.truncate(5);
    words
}
