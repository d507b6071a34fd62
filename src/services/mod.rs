// Pipeline stages and the classifiers behind them

pub mod alert_policy;
pub mod batch_feature_service;
pub mod cluster_classifier;
pub mod feature_extractor;
pub mod feature_scaler;
pub mod label_propagation;
pub mod model_evaluation;
pub mod movement_classifier;
pub mod pipeline;
pub mod stream_router;
pub mod tree_classifier;

pub use alert_policy::AlertPolicy;
pub use batch_feature_service::{BatchFeatureOutput, BatchFeatureRow, BatchFeatureService, RejectedRow};
pub use cluster_classifier::{ClusterClassifier, ClusterConfig, ClusterModelSnapshot, ClusterSummary};
pub use feature_extractor::{ExtractorConfig, ExtractorState, ExtractorStats, FeatureExtractor, FrameRateMode};
pub use feature_scaler::FeatureScaler;
pub use label_propagation::{LabelPropagationClassifier, PropagationConfig, PropagationSummary};
pub use model_evaluation::{evaluate, evaluate_classifier, split_train_test};
pub use movement_classifier::{MovementClassifier, RuleBasedClassifier, RuleThresholds, TrainingState};
pub use pipeline::{FallDetectionPipeline, PipelineOutput};
pub use stream_router::{StreamOutput, StreamRouter, DEFAULT_STREAM};
pub use tree_classifier::{TreeClassifier, TreeConfig, TreeSummary};
