use crate::Vec2;

/// Label the tracker accepts; everything else is ignored.
pub const PERSON_LABEL: &str = "person";

/// Axis-aligned box in normalized (0..1) detection space, top-left origin.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn area(&self) -> f32 {
        self.w * self.h
    }
}

/// One detector output for a processed frame.
#[derive(Clone, Debug, PartialEq)]
pub struct RawDetection {
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl RawDetection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }

    /// Person detection centred on `center` with the given box size.
    pub fn person(center: Vec2, w: f32, h: f32, confidence: f32) -> Self {
        Self::new(
            PERSON_LABEL,
            confidence,
            BoundingBox::new(center.x - w / 2.0, center.y - h / 2.0, w, h),
        )
    }

    pub fn is_person(&self) -> bool {
        self.label == PERSON_LABEL
    }

    /// Detector noise check: finite values, positive size, confidence in [0, 1].
    pub fn is_well_formed(&self) -> bool {
        let b = &self.bbox;
        [b.x, b.y, b.w, b.h, self.confidence]
            .iter()
            .all(|v| v.is_finite())
            && b.w > 0.0
            && b.h > 0.0
            && (0.0..=1.0).contains(&self.confidence)
    }
}
