mod client;
pub mod dto;

pub use client::{FoodRecognizer, HttpRecognizer};
pub use dto::{DetectedFood, RecognitionOutcome};
