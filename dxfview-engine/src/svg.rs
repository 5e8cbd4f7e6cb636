use std::f64::consts::TAU;
use std::fmt::Write as _;

use dxfview_core::geometry::{Point2, Vector2};

use crate::view::{Canvas, StrokeStyle};

const ARC_MIN_SEGMENTS: usize = 8;

/// 以 SVG 文本为输出的画布，用于服务端预览与命令行渲染。
#[derive(Debug, Clone)]
pub struct SvgCanvas {
    width: f64,
    height: f64,
    background: Option<String>,
    elements: Vec<String>,
    path: String,
    has_current_point: bool,
}

impl SvgCanvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            background: Some("#ffffff".to_string()),
            elements: Vec::new(),
            path: String::new(),
            has_current_point: false,
        }
    }

    pub fn with_background(mut self, background: Option<&str>) -> Self {
        self.background = background.map(str::to_string);
        self
    }

    /// 已描边的元素数量。
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// 生成完整的 SVG 文档。
    pub fn finish(self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = fmt_num(self.width),
            h = fmt_num(self.height),
        );
        if let Some(background) = &self.background {
            let _ = writeln!(
                out,
                r#"<rect width="100%" height="100%" fill="{background}"/>"#
            );
        }
        for element in &self.elements {
            out.push_str(element);
            out.push('\n');
        }
        out.push_str("</svg>\n");
        out
    }

    fn push_command(&mut self, command: char, point: Point2) {
        if !self.path.is_empty() {
            self.path.push(' ');
        }
        let _ = write!(
            self.path,
            "{command}{} {}",
            fmt_num(point.x()),
            fmt_num(point.y())
        );
    }
}

impl Canvas for SvgCanvas {
    fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    fn clear(&mut self) {
        self.elements.clear();
        self.begin_path();
    }

    fn begin_path(&mut self) {
        self.path.clear();
        self.has_current_point = false;
    }

    fn move_to(&mut self, point: Point2) {
        self.push_command('M', point);
        self.has_current_point = true;
    }

    fn line_to(&mut self, point: Point2) {
        if self.has_current_point {
            self.push_command('L', point);
        } else {
            self.move_to(point);
        }
    }

    fn arc(&mut self, center: Point2, radius: f64, start: f64, end: f64, anticlockwise: bool) {
        if !(radius.is_finite() && radius > f64::EPSILON) {
            return;
        }
        for point in sample_arc(center, radius, start, end, anticlockwise) {
            self.line_to(point);
        }
    }

    fn close_path(&mut self) {
        if self.has_current_point {
            self.path.push_str(" Z");
        }
    }

    fn stroke(&mut self, style: StrokeStyle) {
        if self.path.is_empty() {
            return;
        }
        self.elements.push(format!(
            r#"<path d="{}" fill="none" stroke="{}" stroke-width="{}"/>"#,
            self.path,
            style.color,
            fmt_num(style.width)
        ));
    }
}

/// 按每段不超过 1/64 圈采样圆弧。起止角相同视为整圆。
fn sample_arc(center: Point2, radius: f64, start: f64, end: f64, anticlockwise: bool) -> Vec<Point2> {
    let (start, end) = angle_range(start, end, !anticlockwise);
    let span = end - start;
    let segments = ((span.abs() / (TAU / 64.0)).ceil() as usize).max(ARC_MIN_SEGMENTS);
    (0..=segments)
        .map(|i| {
            let angle = start + span * (i as f64 / segments as f64);
            center.translate(Vector2::new(radius * angle.cos(), radius * angle.sin()))
        })
        .collect()
}

fn angle_range(start: f64, end: f64, increasing: bool) -> (f64, f64) {
    let start = start.rem_euclid(TAU);
    let end = end.rem_euclid(TAU);
    if increasing {
        if (end - start).abs() < 1e-9 {
            (start, start + TAU)
        } else if end < start {
            (start, end + TAU)
        } else {
            (start, end)
        }
    } else if (start - end).abs() < 1e-9 {
        (start + TAU, start)
    } else if start < end {
        (start + TAU, end)
    } else {
        (start, end)
    }
}

fn fmt_num(value: f64) -> String {
    let text = format!("{value:.3}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" { "0".to_string() } else { text.to_string() }
}
