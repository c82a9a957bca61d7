//! Feature extraction building blocks shared by the modality pipelines

pub mod mfcc;
pub mod tokenizer;

pub use mfcc::{Mfcc, MfccConfig};
pub use tokenizer::{SequenceTokenizer, SEQUENCE_LENGTH};
