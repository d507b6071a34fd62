use thiserror::Error;

/// A pose observation that cannot be used for feature extraction.
///
/// Returned before the frame reaches any extractor state, so a rejected frame
/// behaves as if it had never arrived.
#[derive(Error, Debug)]
pub enum InvalidFrameError {
    #[error("No pose detected in frame")]
    NoPoseDetected,
    #[error("Expected {expected} landmarks, got {actual}")]
    LandmarkCount { expected: usize, actual: usize },
    #[error("Landmark {index} has a non-finite coordinate")]
    NonFiniteCoordinate { index: usize },
    #[error("Landmark {index} lies outside the accepted coordinate range")]
    CoordinateOutOfRange { index: usize },
    #[error("Landmark array has an odd number of values ({values})")]
    OddCoordinateCount { values: usize },
    #[error("Invalid frame dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("Invalid timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
    #[error("Malformed pose payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Model has not been trained")]
    ModelNotTrained,
    #[error("Insufficient training data: need at least {needed} samples, got {got}")]
    InsufficientData { needed: usize, got: usize },
    #[error("Training set contains no labeled samples")]
    NoLabeledSamples,
    #[error("Training failed: {0}")]
    Training(String),
    #[error("Invalid classifier configuration: {0}")]
    InvalidConfig(String),
    #[error("Prediction count {predicted} does not match label count {actual}")]
    LengthMismatch { predicted: usize, actual: usize },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    InvalidFrame(#[from] InvalidFrameError),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("Empty message line")]
    Empty,
    #[error("Message line has no payload")]
    MissingPayload,
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),
    #[error("Invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
}
