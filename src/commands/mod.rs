pub mod common;
pub mod denovo;
pub mod dnarna;

pub use denovo::{run_denovo, DenovoArgs};
pub use dnarna::{run_dnarna, DnaRnaArgs};
