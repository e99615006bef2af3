use docket_core::provider::{GenerationRequest, TaskClass};
use docket_core::settings::BackendSettings;

/// Sampling parameters for one task class.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelProfile {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Model selection per task class. Every stage shares temperature and token cap;
/// only the model differs.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelProfiles {
    scorer: ModelProfile,
    content: ModelProfile,
    analyzer: ModelProfile,
}

impl ModelProfiles {
    pub fn from_settings(backend: &BackendSettings) -> Self {
        let profile = |task: TaskClass| ModelProfile {
            model: backend.models.for_task(task).to_string(),
            temperature: backend.temperature,
            max_tokens: backend.max_tokens,
        };
        Self {
            scorer: profile(TaskClass::Scorer),
            content: profile(TaskClass::Content),
            analyzer: profile(TaskClass::Analyzer),
        }
    }

    pub fn profile(&self, task: TaskClass) -> &ModelProfile {
        match task {
            TaskClass::Scorer => &self.scorer,
            TaskClass::Content => &self.content,
            TaskClass::Analyzer => &self.analyzer,
        }
    }

    pub fn request(&self, task: TaskClass, prompt: impl Into<String>) -> GenerationRequest {
        let profile = self.profile(task);
        GenerationRequest {
            model: profile.model.clone(),
            prompt: prompt.into(),
            temperature: profile.temperature,
            max_tokens: profile.max_tokens,
        }
    }
}

impl Default for ModelProfiles {
    fn default() -> Self {
        Self::from_settings(&BackendSettings::default())
    }
}
