//! Remote notebook job submission and output resolution.

pub mod resolver;
pub mod submitter;

pub use resolver::{OutputLocation, OutputResolver};
pub use submitter::{JobSettings, JobSubmitter};
