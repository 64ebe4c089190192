use super::{ClaudeClient, LLMError, OpenAIClient, LLM};
use crate::config::{
    LLMConfig, DEFAULT_ANTHROPIC_MODEL, DEFAULT_MAX_TOKENS, DEFAULT_OLLAMA_MODEL,
    DEFAULT_OLLAMA_URL, DEFAULT_OPENAI_MODEL, DEFAULT_OPENAI_URL, DEFAULT_OPENROUTER_URL,
};

/// LLM Provider configuration.
#[derive(Debug, Clone)]
pub enum Provider {
    /// OpenAI-compatible endpoint (default, most universal)
    OpenAI {
        base_url: Option<String>,
        api_key: Option<String>,
        model: Option<String>,
        max_tokens: u32,
    },
    /// Anthropic Claude
    Anthropic {
        api_key: Option<String>,
        model: Option<String>,
        api_url: Option<String>,
        api_version: Option<String>,
        max_tokens: u32,
    },
    /// Local Ollama instance
    Ollama {
        base_url: Option<String>,
        model: String,
        max_tokens: u32,
    },
}

impl Default for Provider {
    fn default() -> Self {
        Provider::OpenAI {
            base_url: None,
            api_key: None,
            model: None,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl Provider {
    /// Creates a provider from LLMConfig.
    ///
    /// Unknown provider names are rejected rather than treated as OpenAI.
    pub fn from_config(config: &LLMConfig) -> Result<Self, LLMError> {
        let provider = match config.provider.as_str() {
            "anthropic" | "claude" => Provider::Anthropic {
                api_key: config.api_key_or_env(),
                model: config.model.clone(),
                api_url: config.base_url.clone(),
                api_version: config.api_version.clone(),
                max_tokens: config.max_tokens,
            },
            "ollama" => Provider::Ollama {
                base_url: config.base_url.clone(),
                model: config.model_or_default(),
                max_tokens: config.max_tokens,
            },
            "openrouter" => Provider::OpenAI {
                base_url: Some(config.base_url_or_default()),
                api_key: config.api_key_or_env(),
                model: config.model.clone(),
                max_tokens: config.max_tokens,
            },
            "openai" => Provider::OpenAI {
                base_url: config.base_url.clone(),
                api_key: config.api_key_or_env(),
                model: config.model.clone(),
                max_tokens: config.max_tokens,
            },
            other => return Err(LLMError::UnknownProvider(other.to_string())),
        };
        Ok(provider)
    }

    /// Creates an LLM client from the provider configuration.
    pub fn build(self) -> Result<Box<dyn LLM>, LLMError> {
        match self {
            Provider::OpenAI {
                base_url,
                api_key,
                model,
                max_tokens,
            } => {
                let base = base_url
                    .or_else(|| std::env::var("DEEPDIVE_LLM_BASE_URL").ok())
                    .or_else(|| std::env::var("OPENAI_BASE_URL").ok())
                    .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string());

                let key = api_key
                    .or_else(|| std::env::var("DEEPDIVE_LLM_API_KEY").ok())
                    .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                    .unwrap_or_default();

                let mdl = model
                    .or_else(|| std::env::var("DEEPDIVE_LLM_MODEL").ok())
                    .or_else(|| std::env::var("OPENAI_MODEL").ok())
                    .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());

                Ok(Box::new(
                    OpenAIClient::new(base, key, mdl).with_max_tokens(max_tokens),
                ))
            }

            Provider::Anthropic {
                api_key,
                model,
                api_url,
                api_version,
                max_tokens,
            } => {
                let key = api_key
                    .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
                    .ok_or(LLMError::MissingApiKey)?;

                let mdl = model
                    .or_else(|| std::env::var("ANTHROPIC_MODEL").ok())
                    .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string());

                let mut client = ClaudeClient::new(key)
                    .with_model(mdl)
                    .with_max_tokens(max_tokens);
                if let Some(url) = api_url {
                    client = client.with_api_url(url);
                }
                if let Some(version) = api_version {
                    client = client.with_api_version(version);
                }
                Ok(Box::new(client))
            }

            Provider::Ollama {
                base_url,
                model,
                max_tokens,
            } => {
                let base = base_url
                    .or_else(|| {
                        std::env::var("OLLAMA_HOST")
                            .ok()
                            .map(|h| format!("{}/v1", h.trim_end_matches('/')))
                    })
                    .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());

                Ok(Box::new(
                    OpenAIClient::new(base, "", model).with_max_tokens(max_tokens),
                ))
            }
        }
    }

    /// Auto-detect provider from environment variables and build it.
    pub fn from_env() -> Result<Box<dyn LLM>, LLMError> {
        Self::detect(|key| std::env::var(key).ok())?.build()
    }

    /// Picks a provider from environment-style variables read through `env`.
    ///
    /// Detection order:
    /// 1. DEEPDIVE_LLM_PROVIDER explicitly set
    /// 2. DEEPDIVE_LLM_BASE_URL set → OpenAI-compatible
    /// 3. ANTHROPIC_API_KEY set → Anthropic
    /// 4. OPENAI_API_KEY set → OpenAI
    /// 5. OPENROUTER_API_KEY set → OpenRouter
    /// 6. OLLAMA_HOST set → Ollama
    /// 7. Default to OpenAI-compatible (works with local servers too)
    pub fn detect(env: impl Fn(&str) -> Option<String>) -> Result<Self, LLMError> {
        let model = env("DEEPDIVE_LLM_MODEL");

        if let Some(provider) = env("DEEPDIVE_LLM_PROVIDER") {
            let config = LLMConfig {
                provider: provider.to_lowercase(),
                model,
                base_url: env("DEEPDIVE_LLM_BASE_URL"),
                api_key: env("DEEPDIVE_LLM_API_KEY"),
                ..LLMConfig::default()
            };
            return Provider::from_config(&config);
        }

        if let Some(base_url) = env("DEEPDIVE_LLM_BASE_URL") {
            return Ok(Provider::OpenAI {
                base_url: Some(base_url),
                api_key: env("DEEPDIVE_LLM_API_KEY"),
                model,
                max_tokens: DEFAULT_MAX_TOKENS,
            });
        }

        if let Some(key) = env("ANTHROPIC_API_KEY") {
            return Ok(Provider::Anthropic {
                api_key: Some(key),
                model: model.or_else(|| env("ANTHROPIC_MODEL")),
                api_url: None,
                api_version: None,
                max_tokens: DEFAULT_MAX_TOKENS,
            });
        }

        if let Some(key) = env("OPENAI_API_KEY") {
            return Ok(Provider::OpenAI {
                base_url: None,
                api_key: Some(key),
                model: model.or_else(|| env("OPENAI_MODEL")),
                max_tokens: DEFAULT_MAX_TOKENS,
            });
        }

        if let Some(key) = env("OPENROUTER_API_KEY") {
            return Ok(Provider::OpenAI {
                base_url: Some(DEFAULT_OPENROUTER_URL.to_string()),
                api_key: Some(key),
                model,
                max_tokens: DEFAULT_MAX_TOKENS,
            });
        }

        if let Some(host) = env("OLLAMA_HOST") {
            return Ok(Provider::Ollama {
                base_url: Some(format!("{}/v1", host.trim_end_matches('/'))),
                model: model
                    .or_else(|| env("OLLAMA_MODEL"))
                    .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
                max_tokens: DEFAULT_MAX_TOKENS,
            });
        }

        Ok(Provider::OpenAI {
            base_url: None,
            api_key: None,
            model,
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_provider() {
        let provider = Provider::default();
        assert!(matches!(provider, Provider::OpenAI { .. }));
    }

    #[test]
    fn test_ollama_provider_build() {
        let provider = Provider::Ollama {
            base_url: None,
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            max_tokens: 1024,
        };
        let llm = provider.build().unwrap();
        assert_eq!(llm.model(), DEFAULT_OLLAMA_MODEL);
    }

    #[test]
    fn test_openai_provider_build() {
        let provider = Provider::OpenAI {
            base_url: Some("http://localhost:8080/v1".to_string()),
            api_key: Some("test".to_string()),
            model: Some("local-model".to_string()),
            max_tokens: 1024,
        };
        let llm = provider.build().unwrap();
        assert_eq!(llm.model(), "local-model");
    }

    #[test]
    fn test_anthropic_with_key_builds() {
        let provider = Provider::Anthropic {
            api_key: Some("k".to_string()),
            model: Some("claude-test".to_string()),
            api_url: None,
            api_version: None,
            max_tokens: 1024,
        };
        assert_eq!(provider.build().unwrap().model(), "claude-test");
    }

    #[test]
    fn test_from_config() {
        let config = LLMConfig {
            provider: "ollama".to_string(),
            model: Some("qwen2.5".to_string()),
            ..LLMConfig::default()
        };

        let provider = Provider::from_config(&config).unwrap();
        assert!(matches!(provider, Provider::Ollama { model, .. } if model == "qwen2.5"));
    }

    #[test]
    fn test_openrouter_uses_its_base_url() {
        let config = LLMConfig {
            provider: "openrouter".to_string(),
            api_key: Some("k".to_string()),
            ..LLMConfig::default()
        };

        let provider = Provider::from_config(&config).unwrap();
        assert!(matches!(
            provider,
            Provider::OpenAI { base_url: Some(url), .. } if url == DEFAULT_OPENROUTER_URL
        ));
    }
}
