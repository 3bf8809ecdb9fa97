pub mod digest;
pub mod identity;
pub mod schema;
pub mod size;

pub use digest::DigestStage;
pub use identity::IdentityStage;
pub use schema::SchemaStage;
pub use size::SizeStage;
