pub mod decode;
pub mod erb;
pub mod spectrum;
