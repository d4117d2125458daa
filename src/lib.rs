pub mod checker;
pub mod dataset;
pub mod error;
pub mod exec;
pub mod fixtures;
pub mod harness;
pub mod history;
pub mod normalize;
pub mod rapl;
pub mod schema;
pub mod session;
pub mod source;

pub use error::{BenchError, Result};

/// Which build of the program under evaluation an operation targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Variant {
    /// The original, unoptimized program (iteration 0).
    #[default]
    Baseline,
    /// The most recently compiled rewrite.
    Candidate,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Baseline => "baseline",
            Variant::Candidate => "candidate",
        }
    }
}
