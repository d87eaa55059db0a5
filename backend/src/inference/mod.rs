pub mod model;
pub mod onnx;
pub mod preprocess;
