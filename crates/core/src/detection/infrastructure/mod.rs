pub mod execution_provider;
pub mod onnx_landmark_detector;
pub mod scripted_landmark_detector;
pub mod skip_frame_detector;
