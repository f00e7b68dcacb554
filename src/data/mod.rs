/// Data layer: core types, loading, and filtering.
///
/// Architecture:
/// ```text
///  <category>.parquet / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  RecordLoader → RecordSet (parallel arrays)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  included class codes, first-N cap
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │    model      │  Partition ×3 → DatasetBundle
///   └──────────────┘
/// ```

pub mod loader;
pub mod model;
pub mod filter;
