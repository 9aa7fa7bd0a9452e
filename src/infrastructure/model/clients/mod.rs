mod anthropic;
mod base;
mod openai;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;
