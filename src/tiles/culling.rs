use super::{CHUNK_SIZE, TILE_SIZE};

/// Visible world rectangle in pixels (y up).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Frustum {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Frustum {
    /// Whether the chunk at tile-space `origin` overlaps this rectangle.
    pub fn contains_chunk(&self, origin: (i32, i32)) -> bool {
        chunk_intersects(origin, self.left, self.right, self.top, self.bottom)
    }
}

/// Axis-aligned overlap test between a chunk's pixel bounds and the given
/// edges. Intervals are closed: a chunk touching an edge is visible.
pub fn chunk_intersects(origin: (i32, i32), left: f32, right: f32, top: f32, bottom: f32) -> bool {
    let span = CHUNK_SIZE as f32 * TILE_SIZE;
    let chunk_left = origin.0 as f32 * TILE_SIZE;
    let chunk_bottom = origin.1 as f32 * TILE_SIZE;
    let chunk_right = chunk_left + span;
    let chunk_top = chunk_bottom + span;

    !(chunk_right < left || chunk_left > right || chunk_top < bottom || chunk_bottom > top)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPAN: f32 = CHUNK_SIZE as f32 * TILE_SIZE;

    #[test]
    fn chunk_left_of_frustum_is_hidden() {
        // Chunk (0,0) spans x in [0, SPAN].
        assert!(!chunk_intersects((0, 0), SPAN + 0.5, SPAN + 100.0, 100.0, -100.0));
    }

    #[test]
    fn touching_edge_counts_as_visible() {
        assert!(chunk_intersects((0, 0), SPAN, SPAN + 100.0, 100.0, -100.0));
        assert!(chunk_intersects((0, 0), -100.0, 0.0, 100.0, -100.0));
    }

    #[test]
    fn one_pixel_overlap_is_visible() {
        assert!(chunk_intersects((0, 0), SPAN - 1.0, SPAN + 100.0, 100.0, -100.0));
    }

    #[test]
    fn vertical_separation_hides() {
        assert!(!chunk_intersects((0, 0), 0.0, 10.0, -1.0, -100.0));
        assert!(!chunk_intersects((0, 0), 0.0, 10.0, 1000.0, SPAN + 1.0));
    }

    #[test]
    fn negative_chunks_use_their_own_bounds() {
        let f = Frustum { top: -1.0, right: -1.0, bottom: -SPAN, left: -SPAN };
        assert!(f.contains_chunk((-CHUNK_SIZE, -CHUNK_SIZE)));
        assert!(!f.contains_chunk((CHUNK_SIZE, CHUNK_SIZE)));
    }
}
