use opencv::core::Point;
use opencv::core::Scalar;
use opencv::core::Size;
use opencv::imgproc::get_text_size;
use opencv::imgproc::put_text;
use opencv::imgproc::rectangle_points;
use opencv::imgproc::FONT_HERSHEY_SIMPLEX;
use opencv::imgproc::LINE_8;
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::BoxXyxy;

const PLATE_FONT_SCALE: f64 = 0.8;
const OWNER_FONT_SCALE: f64 = 0.6;
const TEXT_THICKNESS: i32 = 2;
const BOX_THICKNESS: i32 = 2;
const PLATE_RIBBON_HEIGHT: i32 = 40;

/// Filled label area and the baseline origin of the text drawn on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ribbon {
    pub top_left: Point,
    pub bottom_right: Point,
    pub text_origin: Point,
}

/// Ribbon above the box holding the plate text. Boxes touching the top of
/// the image get the ribbon inside their top edge instead.
pub fn plate_ribbon(bbox: &BoxXyxy, text: Size) -> Ribbon {
    let right = bbox.x1.saturating_add(text.width).saturating_add(20);
    let text_x = bbox.x1.saturating_add(5);
    let above = bbox.y1.saturating_sub(PLATE_RIBBON_HEIGHT);
    if above < 0 {
        return Ribbon {
            top_left: Point::new(bbox.x1, bbox.y1),
            bottom_right: Point::new(right, bbox.y1.saturating_add(PLATE_RIBBON_HEIGHT)),
            text_origin: Point::new(text_x, bbox.y1.saturating_add(30)),
        };
    }
    Ribbon {
        top_left: Point::new(bbox.x1, above),
        bottom_right: Point::new(right, bbox.y1),
        text_origin: Point::new(text_x, bbox.y1.saturating_sub(10)),
    }
}

/// Ribbon below the box holding the owner text.
pub fn owner_ribbon(bbox: &BoxXyxy, text: Size) -> Ribbon {
    let below = bbox.y2.saturating_add(text.height);
    Ribbon {
        top_left: Point::new(bbox.x1, bbox.y2.saturating_add(5)),
        bottom_right: Point::new(
            bbox.x1.saturating_add(text.width).saturating_add(10),
            below.saturating_add(20),
        ),
        text_origin: Point::new(bbox.x1.saturating_add(5), below.saturating_add(10)),
    }
}

/// Box limited to one image size beyond each edge, so drawing never sees
/// coordinates OpenCV cannot handle. Boxes already in that range are
/// returned unchanged.
pub fn bound_to_canvas(bbox: &BoxXyxy, canvas: Size) -> BoxXyxy {
    let clamp_x = |v: i32| v.clamp(-canvas.width, canvas.width.saturating_mul(2));
    let clamp_y = |v: i32| v.clamp(-canvas.height, canvas.height.saturating_mul(2));
    BoxXyxy::new(clamp_x(bbox.x1), clamp_y(bbox.y1), clamp_x(bbox.x2), clamp_y(bbox.y2))
}

/// Drops diacritical marks so the text can be drawn with Hershey fonts.
/// Display only.
pub fn strip_diacritics(text: &str) -> String {
    text.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            'Đ' => 'D',
            'đ' => 'd',
            other => other,
        })
        .collect()
}

/// Draws plate boxes and their labels. Colors are BGR.
pub struct BoundingBoxRender {
    box_color: Scalar,
    plate_color: Scalar,
    owner_color: Scalar,
    text_color: Scalar,
}

impl Default for BoundingBoxRender {
    fn default() -> Self {
        Self {
            box_color: Scalar::new(0.0, 255.0, 0.0, 0.0),
            plate_color: Scalar::new(0.0, 255.0, 0.0, 0.0),
            owner_color: Scalar::new(255.0, 180.0, 0.0, 0.0),
            text_color: Scalar::new(0.0, 0.0, 0.0, 0.0),
        }
    }
}

impl BoundingBoxRender {
    pub fn draw_plate(
        &self,
        image: &mut Mat,
        bbox: &BoxXyxy,
        plate: &str,
        owner: Option<&str>,
    ) -> opencv::Result<()> {
        let bbox = &bound_to_canvas(bbox, Size::new(image.cols(), image.rows()));
        rectangle_points(
            image,
            Point::new(bbox.x1, bbox.y1),
            Point::new(bbox.x2, bbox.y2),
            self.box_color,
            BOX_THICKNESS,
            LINE_8,
            0,
        )?;

        let mut baseline = 0;
        let plate_size = get_text_size(
            plate,
            FONT_HERSHEY_SIMPLEX,
            PLATE_FONT_SCALE,
            TEXT_THICKNESS,
            &mut baseline,
        )?;
        let ribbon = plate_ribbon(bbox, plate_size);
        self.draw_ribbon(image, &ribbon, self.plate_color, plate, PLATE_FONT_SCALE)?;

        if let Some(owner) = owner {
            let owner = strip_diacritics(owner);
            let owner_size = get_text_size(
                &owner,
                FONT_HERSHEY_SIMPLEX,
                OWNER_FONT_SCALE,
                TEXT_THICKNESS,
                &mut baseline,
            )?;
            let ribbon = owner_ribbon(bbox, owner_size);
            self.draw_ribbon(image, &ribbon, self.owner_color, &owner, OWNER_FONT_SCALE)?;
        }
        Ok(())
    }

    fn draw_ribbon(
        &self,
        image: &mut Mat,
        ribbon: &Ribbon,
        color: Scalar,
        text: &str,
        scale: f64,
    ) -> opencv::Result<()> {
        rectangle_points(image, ribbon.top_left, ribbon.bottom_right, color, -1, LINE_8, 0)?;
        put_text(
            image,
            text,
            ribbon.text_origin,
            FONT_HERSHEY_SIMPLEX,
            scale,
            self.text_color,
            TEXT_THICKNESS,
            LINE_8,
            false,
        )
    }
}
