//! 意图识别：类别、两级识别器、LLM prompt 与解析

pub mod classifier;
pub mod llm;
pub mod types;

pub use classifier::{ClassifierSettings, IntentClassifier, FILENAME_ENTITY};
pub use types::{DetectedIntent, IntentCategory};
