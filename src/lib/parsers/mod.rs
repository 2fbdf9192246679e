pub mod editing_db;
pub mod genes;
pub mod repeats;
pub mod snps;
pub mod vcf;

pub use editing_db::{import_editing_database, read_known_editing_sites};
pub use genes::read_gene_annotations;
pub use repeats::read_repeat_regions;
pub use snps::KnownSnpReader;
pub use vcf::VariantReader;
