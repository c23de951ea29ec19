pub mod chat;

pub const DEVELOPMENT_MODEL: &str = "gpt-3.5-turbo";
pub const PRODUCTION_MODEL: &str = "gpt-4";

#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
}

/// Default chat model for a deployment environment. Anything other than
/// `production` counts as development.
pub fn model_for_environment(environment: &str) -> &'static str {
    if environment.eq_ignore_ascii_case("production") {
        PRODUCTION_MODEL
    } else {
        DEVELOPMENT_MODEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_uses_the_larger_model() {
        assert_eq!(model_for_environment("production"), "gpt-4");
        assert_eq!(model_for_environment("PRODUCTION"), "gpt-4");
        assert_eq!(model_for_environment("development"), "gpt-3.5-turbo");
        assert_eq!(model_for_environment("staging"), "gpt-3.5-turbo");
    }
}
