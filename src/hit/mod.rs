//! Collision-side model: collider and zone trees

pub mod camera;
pub mod flatten;
pub mod object;

pub use camera::{CameraControl, CAMERA_WORDS};
pub use flatten::{flatten, unflatten, FlatEntry, FlatLinks, NO_LINK};
pub use object::{CollisionTrees, HitId, HitKind, HitObject, HitTree};
