pub mod avl;
pub mod cli;
pub mod experiment;
pub mod parse;
pub mod reference;
pub mod visuals;

pub use avl::AvlTree;
pub use experiment::{Entry, ExperimentConfig, ExperimentError};
pub use parse::{load, write_rows, Case, MeasurementRow, Operation, ParseError};
pub use reference::{compute_reference_curve, ComputationError, ReferenceCurves};
pub use visuals::chart::{render, AxisMode, ChartConfig, RenderError};
