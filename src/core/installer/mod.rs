pub mod archive;

pub use archive::install;
