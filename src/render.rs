use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{
        draw_filled_rect_mut, draw_hollow_circle_mut, draw_hollow_rect_mut,
        draw_line_segment_mut,
    },
    rect::Rect,
};
use logging_timer::time;

use crate::{
    image_utils::{BLACK_RGB, WHITE_RGB},
    layout::{
        question_label, SheetLayout, TemplateOptions, HEADER_FONT_PX, QUESTION_FONT_PX,
        SUBTITLE_FONT_PX, TITLE_FONT_PX,
    },
    typeface::Typeface,
};

/// Stroke width of an empty bubble outline.
pub const BUBBLE_OUTLINE_WIDTH: i32 = 2;
const REFERENCE_MARK_SIZE: i32 = 15;

/// Draws a blank sheet. Bubbles are outlines only so any marking method can
/// fill them in.
#[time]
pub fn render_sheet(
    layout: &SheetLayout,
    options: &TemplateOptions,
    typeface: &Typeface,
) -> RgbImage {
    let (width, height) = (options.page_size.width, options.page_size.height);
    let mut canvas = RgbImage::from_pixel(width, height, WHITE_RGB);
    let margin = options.margin as i32;
    let diameter = options.bubble_diameter as i32;

    let (title_width, _) = typeface.text_size(TITLE_FONT_PX, &options.title);
    typeface.draw_text_mut(
        &mut canvas,
        BLACK_RGB,
        (width as i32 - title_width) / 2,
        margin / 2,
        TITLE_FONT_PX,
        &options.title,
    );

    for headers in &layout.column_headers {
        for header in headers {
            let (letter_width, letter_height) =
                typeface.text_size(HEADER_FONT_PX, header.choice.as_str());
            let text_x = header.bubble_left + (diameter - letter_width) / 2;
            typeface.draw_text_mut(
                &mut canvas,
                BLACK_RGB,
                text_x,
                header.y,
                HEADER_FONT_PX,
                header.choice.as_str(),
            );

            let line_x = (header.bubble_left + diameter / 2) as f32;
            let line_start = (header.y + letter_height + 2) as f32;
            let line_end = layout.top - 5.0;
            if line_end > line_start {
                draw_line_segment_mut(
                    &mut canvas,
                    (line_x, line_start),
                    (line_x, line_end),
                    BLACK_RGB,
                );
            }
        }
    }

    for question in &layout.questions {
        typeface.draw_text_mut(
            &mut canvas,
            BLACK_RGB,
            question.question_pos.0 as i32,
            question.question_pos.1 as i32,
            QUESTION_FONT_PX,
            &question_label(question.question),
        );

        for bubble in &question.bubbles {
            draw_bubble_outline_mut(&mut canvas, bubble.center, diameter / 2, BLACK_RGB);
        }
    }

    if options.reference_marks {
        draw_reference_marks_mut(&mut canvas, margin);
    }

    let (subtitle_width, _) = typeface.text_size(SUBTITLE_FONT_PX, &options.subtitle);
    let subtitle_x = (width as i32 - subtitle_width) / 2;
    typeface.draw_text_mut(
        &mut canvas,
        BLACK_RGB,
        subtitle_x,
        height as i32 - margin - 40,
        SUBTITLE_FONT_PX,
        &options.subtitle,
    );
    typeface.draw_text_mut(
        &mut canvas,
        BLACK_RGB,
        subtitle_x,
        height as i32 - margin - 15,
        SUBTITLE_FONT_PX,
        &options.footer,
    );

    canvas
}

fn draw_bubble_outline_mut(canvas: &mut RgbImage, center: (i32, i32), radius: i32, color: Rgb<u8>) {
    for inset in 0..BUBBLE_OUTLINE_WIDTH {
        if radius - inset > 0 {
            draw_hollow_circle_mut(canvas, center, radius - inset, color);
        }
    }
}

/// Draws an axis-aligned stroke of the given width starting at `start`.
fn draw_stroke_mut(
    canvas: &mut RgbImage,
    start: (i32, i32),
    end: (i32, i32),
    width: u32,
    color: Rgb<u8>,
) {
    let left = start.0.min(end.0);
    let top = start.1.min(end.1);
    let (rect_width, rect_height) = if start.1 == end.1 {
        ((start.0 - end.0).unsigned_abs() + 1, width)
    } else {
        (width, (start.1 - end.1).unsigned_abs() + 1)
    };
    draw_filled_rect_mut(
        canvas,
        Rect::at(left, top).of_size(rect_width, rect_height),
        color,
    );
}

/// Draws the corner and side alignment marks. Nothing reads them back yet.
fn draw_reference_marks_mut(canvas: &mut RgbImage, margin: i32) {
    let (w, h) = (canvas.width() as i32, canvas.height() as i32);
    let size = REFERENCE_MARK_SIZE;

    // top left: cross
    draw_stroke_mut(canvas, (margin, margin), (margin + size, margin), 3, BLACK_RGB);
    draw_stroke_mut(canvas, (margin, margin), (margin, margin + size), 3, BLACK_RGB);

    // top right: L
    draw_stroke_mut(canvas, (w - margin - size, margin), (w - margin, margin), 3, BLACK_RGB);
    draw_stroke_mut(canvas, (w - margin, margin), (w - margin, margin + size), 3, BLACK_RGB);

    // bottom left: square
    for inset in 0..3 {
        draw_hollow_rect_mut(
            canvas,
            Rect::at(margin + inset, h - margin - size + inset)
                .of_size((size - 2 * inset + 1) as u32, (size - 2 * inset + 1) as u32),
            BLACK_RGB,
        );
    }

    // bottom right: circle
    let radius = size / 2;
    for inset in 0..3 {
        draw_hollow_circle_mut(
            canvas,
            (w - margin - radius, h - margin - radius),
            radius - inset,
            BLACK_RGB,
        );
    }

    let header_height = crate::layout::HEADER_HEIGHT as i32;
    for i in 0..3 {
        let y = margin + header_height + (h - 2 * margin - header_height) * (i + 1) / 4;
        draw_stroke_mut(canvas, (margin - 15, y), (margin - 5, y), 2, BLACK_RGB);
        draw_stroke_mut(canvas, (w - margin + 5, y), (w - margin + 15, y), 2, BLACK_RGB);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::compute_layout;

    fn render(options: &TemplateOptions) -> (SheetLayout, RgbImage) {
        let layout = compute_layout(options, &Typeface::Bitmap).unwrap();
        let image = render_sheet(&layout, options, &Typeface::Bitmap);
        (layout, image)
    }

    #[test]
    fn renders_page_at_configured_size() {
        let options = TemplateOptions {
            question_count: 5,
            ..TemplateOptions::default()
        };
        let (_, image) = render(&options);
        assert_eq!(image.dimensions(), (1240, 877));
    }

    #[test]
    fn bubbles_are_drawn_as_unfilled_outlines() {
        let options = TemplateOptions {
            question_count: 5,
            ..TemplateOptions::default()
        };
        let (layout, image) = render(&options);

        for bubble in layout.questions.iter().flat_map(|q| q.bubbles.iter()) {
            let (cx, cy) = bubble.center;
            let (x1, _, x2, _) = bubble.bbox;
            assert_eq!(*image.get_pixel(cx as u32, cy as u32), WHITE_RGB);
            assert_eq!(*image.get_pixel(x1 as u32, cy as u32), BLACK_RGB);
            assert_eq!(*image.get_pixel(x2 as u32, cy as u32), BLACK_RGB);
        }
    }

    #[test]
    fn reference_marks_are_optional() {
        let with_marks = TemplateOptions {
            question_count: 3,
            ..TemplateOptions::default()
        };
        let without_marks = TemplateOptions {
            reference_marks: false,
            ..with_marks.clone()
        };

        let (_, marked) = render(&with_marks);
        let (_, plain) = render(&without_marks);

        assert_eq!(*marked.get_pixel(51, 51), BLACK_RGB);
        assert_eq!(*plain.get_pixel(51, 51), WHITE_RGB);
    }
}
