/// The 1-D convolutional classifier: topology, batching, training and
/// evaluation. Everything that touches burn lives under this module.
///
/// ```text
///  Partition (ndarray)
///        │  batch::features_tensor / targets_tensor
///        ▼
///   ┌────────────┐     ┌──────────────┐
///   │  training   │ ──► │  checkpoint   │  best val_loss → <name>.mpk
///   └────────────┘     └──────────────┘
///        │                    │ reload
///        ▼                    ▼
///   ┌──────────────────────────┐
///   │        evaluation         │  loss / accuracy / predicted classes
///   └──────────────────────────┘
/// ```

pub mod batch;
pub mod checkpoint;
pub mod evaluation;
pub mod model;
pub mod training;

/// Backend used for inference and checkpoint reloads.
pub type InferenceBackend = burn::backend::NdArray;

/// Backend used while fitting.
pub type TrainingBackend = burn::backend::Autodiff<InferenceBackend>;
