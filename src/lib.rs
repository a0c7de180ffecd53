mod dense;
pub mod dimred;
mod error;
mod utils;

pub use dimred::vbpca::{
    Hyperpriors, PosteriorState, SharedVBPCA, VBPCABuilder, ACTIVE_COMPONENT_RATIO, VBPCA,
};
pub use error::{Degeneracy, Factor, VbpcaError};
pub use utils::AllFinite;
pub use utils::ColumnNorms;
pub use utils::SymmetricInverse;
