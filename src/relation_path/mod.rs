pub mod naming;
pub mod resolver;

pub use naming::NamingTemplates;
pub use resolver::{resolve, resolve_batch, BatchPath, JoinPath, JoinStep, SOURCE_ALIAS};
