//! Prepares uploaded fonts for delivery on the web.
//!
//! A [`FontStore`] keeps each uploaded font as an untouched original plus a
//! working copy. [`FontEntity`] applies repairs, hinting and subsetting to
//! the working copy and exports it, regenerating derived files only when the
//! font has changed.

mod cache;
mod config;
mod entity;
mod error;
mod id;
mod lease;
mod metrics;
mod names;
mod pipeline;
mod storage;
mod subset;
mod tools;

pub use cache::DerivedFormat;
pub use config::{Config, StorageConfig, TimeoutConfig, ToolConfig, ToolsConfig};
pub use entity::{ExportFormat, FontEntity, FontProperties};
pub use error::{Error, ErrorKind};
pub use id::FontId;
pub use metrics::{MetricsNormalizer, MetricsStrategy};
pub use names::{parse_names, rebuild_names, FontNames, NameRepairer, NameSource, ParsedName};
pub use pipeline::{create, delete, process, Created, Deleted, Fix, ProcessRequest, Processed};
pub use storage::FontStore;
pub use subset::{parse_range, SubsetSelector};
pub use tools::{HintMethod, ToolKind, Toolbox};
