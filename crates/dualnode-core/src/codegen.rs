//! Code-generation collaborator.
//!
//! Turns a natural-language prompt into device code for the LED actuator
//! station. The collaborator is external and may fail; its contract is the
//! [`CodeGenerator`] trait, with a production implementation speaking the
//! OpenAI-compatible chat-completions protocol.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::AiConfig;
use crate::error::{CoreError, Result};

/// Fixed hardware context sent with every generation request.
///
/// Describes the actuator station's LED pin mapping and the code shape the
/// firmware interpreter accepts (direct `gpio_set_level` calls only).
pub const LED_PIN_CONTEXT: &str = r#"You are an expert in ESP32 microcontroller programming.

AVAILABLE HARDWARE:
- ESP32 NodeMCU-32S with 10 colored LEDs connected:
- GPIO 4:  LED 0 - GREEN
- GPIO 5:  LED 1 - YELLOW
- GPIO 12: LED 2 - RED
- GPIO 13: LED 3 - BLUE
- GPIO 14: LED 4 - ORANGE
- GPIO 15: LED 5 - ORANGE
- GPIO 16: LED 6 - BLUE
- GPIO 17: LED 7 - RED
- GPIO 18: LED 8 - YELLOW
- GPIO 19: LED 9 - GREEN

RULES:
1. Use ONLY direct gpio_set_level(PIN, STATE) calls
2. NO arrays, variables, or for/while loops
3. Write each gpio_set_level() on its own line with the literal GPIO number
4. Use vTaskDelay(ms / portTICK_PERIOD_MS) for delays
5. NO includes, setup, or loop functions
6. Only directly executable code
7. At most 30 lines of code
8. Only use GPIOs 4, 5, 12, 13, 14, 15, 16, 17, 18, 19
9. Effects must be short (3 seconds total at most)
10. Individual delays of at most 500ms
11. For wave effects do 1-2 passes, never infinite loops"#;

/// Prompt-to-code collaborator contract.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    /// Generate device code for the given prompt.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Ai`] with a human-readable message on any
    /// collaborator failure.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Chat-completions response, reduced to the fields we read.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// [`CodeGenerator`] backed by an OpenAI-compatible chat-completions API.
pub struct ChatCompletionsGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl ChatCompletionsGenerator {
    /// Build a generator from the collaborator configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &AiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| CoreError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl CodeGenerator for ChatCompletionsGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(CoreError::Ai(
                "no API key configured; set ai.api_key in the coordinator configuration".to_string(),
            ));
        }

        debug!(model = %self.model, "requesting code generation");
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": LED_PIN_CONTEXT },
                { "role": "user", "content": prompt }
            ],
            "temperature": 0.3,
            "max_tokens": 1000
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::Ai(format!("collaborator unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CoreError::Ai(format!(
                "collaborator answered with status {status}: {detail}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Ai(format!("malformed collaborator response: {e}")))?;

        let code = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| CoreError::Ai("collaborator returned no code".to_string()))?;

        info!(chars = code.len(), "code generated");
        Ok(code)
    }
}
