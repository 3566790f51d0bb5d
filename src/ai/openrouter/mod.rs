pub mod deriver;
pub mod types;

pub use deriver::{parse_prompt_map, OpenRouterPromptDeriver};
