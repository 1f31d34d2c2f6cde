pub mod llm;

pub use llm::{GeminiProvider, LLMProvider, Message, MockLLMProvider};
