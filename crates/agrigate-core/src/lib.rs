pub mod artifact;
pub mod classify;
pub mod config;
pub mod domain;
pub mod features;
pub mod request;

pub use artifact::{ArtifactId, ArtifactKind, ArtifactSource, FetchError};
pub use classify::{ThresholdTable, classify};
pub use config::{ConfigError, GatewayConfig};
pub use domain::{Confidence, Domain, DomainParseError, OutputKind, ValidRange};
pub use features::{
    CropRecommendation, EncoderBinding, FeatureSpec, FieldKind, FieldSpec, FieldValue, InputLayout,
};
pub use request::{DomainInput, DomainRequest, Estimate, TensorInput};
