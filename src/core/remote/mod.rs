pub mod manifest;
pub mod source;

pub use manifest::{is_plain_file_name, ModManifest, VersionDescriptor};
pub use source::{HttpRemote, RemoteBody, RemoteSource};
