pub mod aggregate;
pub mod catalogue;
pub mod config;
pub mod evaluation;
pub mod formats;
pub mod partition;
pub mod record;
pub mod report;
pub mod runner;

pub use aggregate::{AggregateError, AggregateOptions, AggregateSummary, GroupKey, aggregate};
pub use catalogue::{BenchmarkSet, Descriptor, Heuristic};
pub use config::{Config, ConfigError, Normalization};
pub use formats::ParseError;
pub use record::{ExperimentRecord, FailureTag, Status, TrailingScalar};
pub use runner::{Launcher, Plan, Runner, ToolFlags};
