//! plinkq-geno: PLINK 2 genotype and sidecar I/O for plinkq.
//!
//! Provides the PGEN decoder session (probe/populate header context
//! plus per-thread readers), the .pvar/.bim and .psam/.fam metadata
//! parsers, the precomputed sample-subset descriptor, and the aligned
//! buffer primitives they share.

pub mod aligned;
pub mod error;
pub mod pgen;
pub mod psam;
pub mod pvar;
pub mod subset;

pub use error::{PlinkError, Result};
pub use pgen::{PgenFileInfo, PgenReader};
pub use psam::SampleInfo;
pub use pvar::{VariantColumns, VariantIndex, VariantRange};
pub use subset::{SampleSelector, SampleSubset};
