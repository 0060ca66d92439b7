pub mod compress;

pub use compress::Codec;
