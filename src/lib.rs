pub mod cancel;
pub mod config;
pub mod core;
pub mod extract;
pub mod scanner;

pub use crate::cancel::CancellationToken;
pub use crate::config::{RunConfig, Settings};
pub use crate::core::ClusterError;
pub use crate::core::descriptor::{DescriptorSet, Metric};
pub use crate::core::engine::{Assignment, ClusterOptions, ClusterSession, ClusteringEngine};
pub use crate::core::report::ClusterReport;
pub use crate::core::table::{Cluster, ClusterId, ClusterTable};
pub use crate::extract::Detector;
