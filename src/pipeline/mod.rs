pub mod builder;
pub mod classifier;
pub mod defaults;
pub mod runtime;
#[cfg(feature = "onnx")]
pub mod silero;
pub mod traits;
pub mod worker;
