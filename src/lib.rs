/// Channel packing, slice assembly and texture-array construction
pub mod bake;
/// Error definitions
pub mod error;
/// Writing built arrays to disk (PNG slices, DDS containers)
pub mod export;
/// JSON profile manifests for offline baking
#[cfg(feature = "json")]
pub mod manifest;
/// Profiles: layer registry, global layers, settings and dirty tracking
pub mod profile;
/// Application-owned registry of profiles and terrain bindings
pub mod service;
/// Host terrain reconciliation, shader binding and native-path fallback
pub mod surface;
/// CPU-side textures, mip chains and texture arrays
pub mod texture;

#[cfg(feature = "arc")]
pub type Rc<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub type Rc<T> = std::rc::Rc<T>;
