use opencv::core::{Rect, Size};

use super::{BoxXyxy, Detection};
use crate::config::PipelineConfig;

/// Keeps detections of the plate class whose confidence reaches the
/// threshold, in input order.
pub fn filter_detections(detections: &[Detection], config: &PipelineConfig) -> Vec<Detection> {
    detections
        .iter()
        .filter(|d| {
            d.class_id == config.expected_class_id && d.confidence >= config.confidence_threshold
        })
        .copied()
        .collect()
}

/// Region to crop for a box: the box grown by `padding` on every side and
/// clamped to the frame. `None` when nothing of it lies inside the frame.
pub fn crop_rect(bbox: &BoxXyxy, padding: i32, frame: Size) -> Option<Rect> {
    let x1 = bbox.x1.saturating_sub(padding).max(0);
    let y1 = bbox.y1.saturating_sub(padding).max(0);
    let x2 = bbox.x2.saturating_add(padding).min(frame.width);
    let y2 = bbox.y2.saturating_add(padding).min(frame.height);

    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(class_id: i32, confidence: f32) -> Detection {
        Detection::new(class_id, confidence, BoxXyxy::new(10, 10, 50, 30))
    }

    #[test]
    fn keeps_plate_class_above_threshold() {
        let config = PipelineConfig::default();
        let detections = vec![
            detection(0, 0.9),
            detection(1, 0.9),
            detection(0, 0.25),
            detection(0, 0.2499),
            detection(0, f32::NAN),
            detection(0, 0.5),
        ];
        let kept = filter_detections(&detections, &config);
        let confidences: Vec<f32> = kept.iter().map(|d| d.confidence).collect();
        assert_eq!(confidences, vec![0.9, 0.25, 0.5]);
    }

    #[test]
    fn pads_box_inside_frame() {
        let rect = crop_rect(&BoxXyxy::new(100, 50, 200, 90), 5, Size::new(640, 480));
        assert_eq!(rect, Some(Rect::new(95, 45, 110, 50)));
    }

    #[test]
    fn clamps_to_frame_edges() {
        let rect = crop_rect(&BoxXyxy::new(2, 1, 638, 478), 5, Size::new(640, 480));
        assert_eq!(rect, Some(Rect::new(0, 0, 640, 480)));
    }

    #[test]
    fn box_outside_frame_has_no_crop() {
        let frame = Size::new(640, 480);
        assert_eq!(crop_rect(&BoxXyxy::new(700, 10, 760, 40), 5, frame), None);
        assert_eq!(crop_rect(&BoxXyxy::new(-80, -60, -10, -10), 5, frame), None);
        assert_eq!(crop_rect(&BoxXyxy::new(10, 10, 50, 30), 5, Size::new(0, 0)), None);
    }

    #[test]
    fn inverted_box_has_no_crop() {
        let rect = crop_rect(&BoxXyxy::new(300, 200, 100, 100), 5, Size::new(640, 480));
        assert_eq!(rect, None);
    }

    #[test]
    fn extreme_coordinates_do_not_overflow() {
        let rect = crop_rect(
            &BoxXyxy::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX),
            5,
            Size::new(64, 48),
        );
        assert_eq!(rect, Some(Rect::new(0, 0, 64, 48)));
    }
}
