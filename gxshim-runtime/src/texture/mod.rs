pub mod cache;
pub mod decode;
pub mod formats;
pub mod loader;

pub use cache::{TextureCache, TextureKey};
pub use decode::decode;
pub use formats::{size, Palette, TextureFormat, TlutFormat};
pub use loader::{ImageKey, ImageSource, ImageStore, TokenTable};
