/// Data layer: scene types, loading, tabulation, filtering and preprocessing.
///
/// Architecture:
/// ```text
///  .mat / .npy  (cube + ground truth)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → SpectralCube / GroundTruth
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │  PixelTable   │  (H*W) rows × bands + class   ──► export (.parquet)
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  class != 0 → LabeledSet
///   └──────────┘
///        │
///        ▼
///   ┌────────────┐
///   │ preprocess  │  min-max scale, one-hot, train/test split
///   └────────────┘
/// ```

pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
pub mod preprocess;
