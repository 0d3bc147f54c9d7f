pub mod cache;
pub mod hints;
pub mod loader;
pub mod network;
pub mod preload;

pub use cache::{CacheStats, ImageCache};
pub use hints::PreloadHints;
pub use loader::{DecodedImage, FsImageLoader, ImageLoader};
pub use network::{
    ConnectionInfo, EffectiveType, ImageQuality, NetworkAdapter, NetworkConditions, NetworkPolicy,
};
pub use preload::{plan, PreloadRequest, PreloadScheduler, PreloadStats};
