pub mod experiment;
pub mod lpn;
pub mod recovery;
