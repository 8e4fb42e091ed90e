//! Vertex-buffer batching
//!
//! The microcode draws triangles out of a 32-slot vertex buffer, so a
//! triangle list is cut into batches whose distinct vertices fit the buffer.
//! Packing is greedy and order preserving: existing compiled assets depend on
//! exactly this cut, so a smarter packer would change the output bytes.

use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;

use super::vertex::{Triangle, Vertex};

/// Number of slots in the hardware vertex buffer.
pub const VERTEX_BUFFER_SIZE: usize = 32;

/// Triangles sharing one load of the vertex buffer.
#[derive(Clone, Debug, Default)]
pub struct VertexBatch {
    pub triangles: Vec<Triangle>,
    pub vertices: HashSet<Vertex>,
}

impl VertexBatch {
    fn new() -> Self {
        Self {
            triangles: Vec::with_capacity(VERTEX_BUFFER_SIZE / 2),
            vertices: HashSet::with_capacity(VERTEX_BUFFER_SIZE * 2),
        }
    }

    /// Add a triangle if its new vertices still fit; otherwise leave the batch untouched.
    fn try_add(&mut self, triangle: &Triangle) -> bool {
        let mut added: Vec<Vertex> = Vec::with_capacity(3);
        for v in &triangle.vertices {
            if self.vertices.insert(*v) {
                added.push(*v);
            }
        }

        if self.vertices.len() > VERTEX_BUFFER_SIZE {
            for v in &added {
                self.vertices.remove(v);
            }
            return false;
        }

        self.triangles.push(*triangle);
        true
    }
}

/// Split a triangle list into batches of at most [`VERTEX_BUFFER_SIZE`] distinct vertices.
pub fn batch_triangles(triangles: &[Triangle]) -> Vec<VertexBatch> {
    let mut batches = Vec::new();
    if triangles.is_empty() {
        return batches;
    }

    let mut batch = VertexBatch::new();
    let mut i = 0;
    while i < triangles.len() {
        if batch.try_add(&triangles[i]) {
            i += 1;
        } else {
            batches.push(std::mem::replace(&mut batch, VertexBatch::new()));
        }
    }
    batches.push(batch);
    batches
}

/// How one batch is loaded: contiguous runs of the global vertex table, and
/// the buffer slot each vertex lands in.
#[derive(Clone, Debug)]
pub struct LoadPlan {
    /// Inclusive global index ranges, one load command each.
    pub runs: Vec<RangeInclusive<usize>>,
    /// Buffer slot of each loaded vertex, in run order.
    pub slots: HashMap<Vertex, u8>,
}

impl LoadPlan {
    /// Build the plan from a batch and the global vertex table.
    ///
    /// `index_of` must resolve every batch vertex; `table` maps global index
    /// back to its vertex.
    pub fn new(batch: &VertexBatch, index_of: impl Fn(&Vertex) -> usize, table: &[Vertex]) -> Self {
        let mut indices: Vec<usize> = batch.vertices.iter().map(index_of).collect();
        indices.sort_unstable();

        let runs = merge_runs(&indices);

        let mut slots = HashMap::with_capacity(indices.len());
        let mut next = 0u8;
        for run in &runs {
            for i in run.clone() {
                slots.insert(table[i], next);
                next += 1;
            }
        }

        Self { runs, slots }
    }

    /// Slot of a vertex in the loaded buffer.
    pub fn slot(&self, v: &Vertex) -> u8 {
        self.slots[v]
    }
}

/// Merge sorted indices into maximal contiguous inclusive ranges.
pub fn merge_runs(sorted: &[usize]) -> Vec<RangeInclusive<usize>> {
    let mut runs: Vec<RangeInclusive<usize>> = Vec::new();
    for &i in sorted {
        match runs.last_mut() {
            Some(run) if i == *run.end() => {}
            Some(run) if i == *run.end() + 1 => *run = *run.start()..=i,
            _ => runs.push(i..=i),
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Strip of triangles where each new triangle introduces one new vertex.
    fn strip(n: usize) -> Vec<Triangle> {
        let v = |i: usize| Vertex::at(i as i16, (i % 2) as i16, 0);
        (0..n).map(|i| Triangle::new(v(i), v(i + 1), v(i + 2))).collect()
    }

    /// Triangles that never share a vertex.
    fn disjoint(n: usize) -> Vec<Triangle> {
        let v = |i: usize| Vertex::at(i as i16, 7, 7);
        (0..n).map(|i| Triangle::new(v(3 * i), v(3 * i + 1), v(3 * i + 2))).collect()
    }

    fn assert_batching_invariant(input: &[Triangle], batches: &[VertexBatch]) {
        for batch in batches {
            assert!(batch.vertices.len() <= VERTEX_BUFFER_SIZE);
            let used: HashSet<Vertex> = batch.triangles.iter().flat_map(|t| t.vertices).collect();
            assert_eq!(used, batch.vertices);
        }
        let concatenated: Vec<Triangle> = batches.iter().flat_map(|b| b.triangles.iter().copied()).collect();
        assert_eq!(concatenated, input);
    }

    #[test]
    fn test_empty_input_has_no_batches() {
        assert!(batch_triangles(&[]).is_empty());
    }

    #[test]
    fn test_strip_fills_buffer_greedily() {
        let input = strip(40);
        let batches = batch_triangles(&input);

        assert_batching_invariant(&input, &batches);
        // 30 triangles use vertices 0..=31, the 31st would need a 33rd vertex
        assert_eq!(batches[0].triangles.len(), 30);
        assert_eq!(batches[0].vertices.len(), 32);
        assert_eq!(batches[1].triangles.len(), 10);
    }

    #[test]
    fn test_disjoint_triangles_roll_back_partial_adds() {
        let input = disjoint(25);
        let batches = batch_triangles(&input);

        assert_batching_invariant(&input, &batches);
        // 10 triangles = 30 vertices; the 11th would make 33
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].vertices.len(), 30);
        assert_eq!(batches[2].triangles.len(), 5);
    }

    #[test]
    fn test_merge_runs() {
        assert_eq!(merge_runs(&[2, 3, 4, 7, 9, 10]), vec![2..=4, 7..=7, 9..=10]);
        assert!(merge_runs(&[]).is_empty());
    }

    #[test]
    fn test_load_plan_slots_follow_run_order() {
        let a = Vertex::at(0, 0, 0);
        let b = Vertex::at(1, 0, 0);
        let c = Vertex::at(2, 0, 0);
        let d = Vertex::at(3, 0, 0);
        let table = vec![a, b, c, d];
        let index: HashMap<Vertex, usize> = table.iter().enumerate().map(|(i, v)| (*v, i)).collect();

        let batches = batch_triangles(&[Triangle::new(d, a, b)]);
        let plan = LoadPlan::new(&batches[0], |v| index[v], &table);

        assert_eq!(plan.runs, vec![0..=1, 3..=3]);
        assert_eq!(plan.slot(&a), 0);
        assert_eq!(plan.slot(&b), 1);
        assert_eq!(plan.slot(&d), 2);
    }
}
