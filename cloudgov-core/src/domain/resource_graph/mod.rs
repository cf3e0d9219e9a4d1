//! Resource Graph domain: query inputs, results, errors and collaborator traits

pub mod errors;
pub mod traits;
pub mod value_objects;

pub use errors::{QueryValidationError, RemoteApiError, ResourceGraphError};
pub use traits::{CredentialResolver, ResourceGraphClient};
pub use value_objects::*;
