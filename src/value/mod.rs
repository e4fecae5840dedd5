//! The time-series value hierarchy: scalar, bundle, set, list and
//! reference shapes, each with an output half that a node writes to and
//! an input half that a node reads from.
//!
//! Dispatch across shapes stays on two small, non-generic traits
//! (`TsOutput`, `TsInput`); typed access to a concrete shape goes through
//! `as_any`/`as_any_mut` downcasting rather than a deep generic trait
//! hierarchy, so a `Vec<OutputHandle>` of mixed shapes can live in one
//! builder table.

pub mod delta;
pub mod input;
pub mod output;

pub use delta::SetDelta;
pub use input::{
    resolve_input_path, BundleInput, InputHandle, InputHeader, ListInput, ReferenceInput, ScalarInput, SetInput,
    TsInput,
};
pub use output::{
    resolve_output_path, BundleOutput, ListOutput, OutputHandle, OutputHeader, ReferenceOutput, ScalarOutput,
    SetOutput, TsOutput,
};
