use imageproc::rect::Rect;

/// A bounding box as stored in the manifest: `(x1, y1, x2, y2)` with the
/// right and bottom edges exclusive.
pub type BoundingBox = (i32, i32, i32, i32);

/// Clips a bounding box to an image of the given dimensions. Returns `None`
/// when nothing of the box lies inside the image.
pub fn clip_bbox(bbox: &BoundingBox, (width, height): (u32, u32)) -> Option<Rect> {
    let (x1, y1, x2, y2) = *bbox;
    let left = x1.max(0);
    let top = y1.max(0);
    let right = x2.min(width.min(i32::MAX as u32) as i32);
    let bottom = y2.min(height.min(i32::MAX as u32) as i32);

    if right <= left || bottom <= top {
        return None;
    }

    Some(Rect::at(left, top).of_size((right - left) as u32, (bottom - top) as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_inside_image_is_unchanged() {
        let rect = clip_bbox(&(10, 20, 30, 40), (100, 100)).unwrap();
        assert_eq!(rect, Rect::at(10, 20).of_size(20, 20));
    }

    #[test]
    fn box_over_edge_is_trimmed() {
        let rect = clip_bbox(&(90, -5, 110, 15), (100, 100)).unwrap();
        assert_eq!(rect, Rect::at(90, 0).of_size(10, 15));
    }

    #[test]
    fn box_outside_image_is_empty() {
        assert_eq!(clip_bbox(&(120, 10, 140, 30), (100, 100)), None);
        assert_eq!(clip_bbox(&(-40, -40, -20, -20), (100, 100)), None);
        assert_eq!(clip_bbox(&(80, 100, 100, 120), (100, 100)), None);
    }

    #[test]
    fn degenerate_box_is_empty() {
        assert_eq!(clip_bbox(&(10, 10, 10, 30), (100, 100)), None);
    }
}
