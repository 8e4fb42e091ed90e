//! Mesh primitives and vertex-buffer batching

pub mod vertex;
pub mod batch;
pub mod vertex_batch;

pub use vertex::{Triangle, Vertex};
pub use batch::{DisplayCommand, Mesh, TriangleBatch};
pub use vertex_batch::{batch_triangles, LoadPlan, VertexBatch, VERTEX_BUFFER_SIZE};
