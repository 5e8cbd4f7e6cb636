use std::f64::consts::TAU;

use dxfview_core::document::{Document, Entity, EntityKind};
use dxfview_core::geometry::{Bounds2D, Point2, Vector2};
use glam::DVec2;
use serde::{Deserialize, Serialize};

/// 适配画布时留出的边距比例。
pub const FIT_MARGIN: f64 = 0.9;
pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 4.0;
/// 滚轮每单位 `delta_y` 对应的缩放增量（向下滚动缩小）。
pub const WHEEL_ZOOM_STEP: f64 = 0.01;

/// 包围盒只统计各块内多段线的顶点；没有顶点时返回 ±∞ 哨兵值。
pub fn compute_bounding_box(document: &Document) -> Bounds2D {
    let mut bounds = Bounds2D::empty();
    for block in document.blocks() {
        for polyline in block.entities.iter().filter_map(Entity::as_polyline) {
            for vertex in &polyline.vertices {
                bounds.include_point(vertex.position);
            }
        }
    }
    bounds
}

/// 将世界坐标适配到画布的缩放与中心。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitTransform {
    pub scale: f64,
    pub world_center: Point2,
}

impl FitTransform {
    /// 包围盒为空时缩放为 1、以原点为中心；单轴退化时由另一轴决定缩放。
    pub fn fit(bounds: &Bounds2D, width: f64, height: f64) -> Self {
        if bounds.is_empty() {
            return Self {
                scale: 1.0,
                world_center: Point2::default(),
            };
        }

        let axis_scale = |canvas: f64, extent: f64| {
            (extent > f64::EPSILON && extent.is_finite()).then(|| canvas / extent)
        };
        let scale = match (
            axis_scale(width, bounds.width()),
            axis_scale(height, bounds.height()),
        ) {
            (Some(sx), Some(sy)) => sx.min(sy) * FIT_MARGIN,
            (Some(s), None) | (None, Some(s)) => s * FIT_MARGIN,
            (None, None) => 1.0,
        };

        Self {
            scale,
            world_center: bounds.center(),
        }
    }

    /// 相对画布中心的屏幕偏移，Y 轴向下。
    #[inline]
    pub fn offset(&self, point: Point2) -> DVec2 {
        let delta = (point.as_vec2() - self.world_center.as_vec2()) * self.scale;
        DVec2::new(delta.x, -delta.y)
    }
}

impl Default for FitTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            world_center: Point2::default(),
        }
    }
}

/// 用户交互产生的视图状态：缩放与平移。反序列化同样经过 [`ViewTransform::new`] 夹紧缩放。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "ViewRepr", into = "ViewRepr")]
pub struct ViewTransform {
    zoom: f64,
    pan: Vector2,
}

#[derive(Serialize, Deserialize)]
#[serde(default)]
struct ViewRepr {
    zoom: f64,
    pan: Vector2,
}

impl Default for ViewRepr {
    fn default() -> Self {
        ViewTransform::default().into()
    }
}

impl From<ViewRepr> for ViewTransform {
    fn from(repr: ViewRepr) -> Self {
        ViewTransform::new(repr.zoom, repr.pan)
    }
}

impl From<ViewTransform> for ViewRepr {
    fn from(view: ViewTransform) -> Self {
        Self {
            zoom: view.zoom,
            pan: view.pan,
        }
    }
}

impl ViewTransform {
    pub fn new(zoom: f64, pan: Vector2) -> Self {
        let mut view = Self::default();
        view.set_zoom(zoom);
        view.apply_drag(pan.x(), pan.y());
        view
    }

    #[inline]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    #[inline]
    pub fn pan(&self) -> Vector2 {
        self.pan
    }

    /// 非有限值被忽略，其余夹到 [`MIN_ZOOM`, `MAX_ZOOM`]。
    pub fn set_zoom(&mut self, zoom: f64) {
        if zoom.is_finite() {
            self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        }
    }

    /// 滚轮事件：`zoom += -WHEEL_ZOOM_STEP * delta_y`。
    pub fn apply_wheel(&mut self, delta_y: f64) {
        self.set_zoom(self.zoom - WHEEL_ZOOM_STEP * delta_y);
    }

    /// 拖拽事件，按屏幕像素累加平移量。
    pub fn apply_drag(&mut self, dx: f64, dy: f64) {
        if dx.is_finite() && dy.is_finite() {
            self.pan = Vector2::from(self.pan.as_vec2() + DVec2::new(dx, dy));
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: Vector2::new(0.0, 0.0),
        }
    }
}

/// 适配变换与视图变换组合后的世界到屏幕投影。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    fit: FitTransform,
    view: ViewTransform,
    canvas_center: DVec2,
}

impl Projection {
    pub fn new(bounds: &Bounds2D, view: ViewTransform, width: f64, height: f64) -> Self {
        Self {
            fit: FitTransform::fit(bounds, width, height),
            view,
            canvas_center: DVec2::new(width * 0.5, height * 0.5),
        }
    }

    pub fn for_document(document: &Document, view: ViewTransform, width: f64, height: f64) -> Self {
        Self::new(&compute_bounding_box(document), view, width, height)
    }

    #[inline]
    pub fn fit(&self) -> FitTransform {
        self.fit
    }

    /// 世界长度到像素长度的比例。
    #[inline]
    pub fn scale(&self) -> f64 {
        self.fit.scale * self.view.zoom
    }

    /// `canvas_center + pan + zoom * fit(point)`
    pub fn to_screen(&self, point: Point2) -> Point2 {
        let screen =
            self.canvas_center + self.view.pan.as_vec2() + self.fit.offset(point) * self.view.zoom;
        Point2::from_vec(screen)
    }
}

/// 描边样式，颜色按实体类别区分。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub color: &'static str,
    pub width: f64,
}

impl StrokeStyle {
    pub fn for_kind(kind: EntityKind) -> Self {
        let color = match kind {
            EntityKind::Line => "#000000",
            EntityKind::Circle | EntityKind::Arc => "#1f4fd1",
            EntityKind::Polyline => "#1a7f37",
            EntityKind::Insert => "#888888",
        };
        Self { color, width: 1.0 }
    }
}

/// 类 Canvas2D 的绘制目标，坐标为屏幕像素（Y 轴向下）。
pub trait Canvas {
    fn size(&self) -> (f64, f64);
    fn clear(&mut self);
    fn begin_path(&mut self);
    fn move_to(&mut self, point: Point2);
    fn line_to(&mut self, point: Point2);
    /// 角度为屏幕坐标系下的弧度；`anticlockwise` 为真时角度递减。
    fn arc(&mut self, center: Point2, radius: f64, start: f64, end: f64, anticlockwise: bool);
    fn close_path(&mut self);
    fn stroke(&mut self, style: StrokeStyle);
}

/// 绘制整张图纸：先画块内实体，再画顶层实体。INSERT 不展开。
///
/// 返回实际描边的实体数量。
pub fn render<C>(document: &Document, view: &ViewTransform, canvas: &mut C) -> usize
where
    C: Canvas + ?Sized,
{
    let (width, height) = canvas.size();
    let projection = Projection::for_document(document, *view, width, height);
    canvas.clear();

    let mut drawn = 0;
    let block_entities = document.blocks().flat_map(|block| block.entities.iter());
    for entity in block_entities.chain(document.entities()) {
        if draw_entity(entity, &projection, &mut *canvas) {
            drawn += 1;
        }
    }
    drawn
}

fn draw_entity<C>(entity: &Entity, projection: &Projection, canvas: &mut C) -> bool
where
    C: Canvas + ?Sized,
{
    match entity {
        Entity::Line(line) => {
            canvas.begin_path();
            canvas.move_to(projection.to_screen(line.start));
            canvas.line_to(projection.to_screen(line.end));
        }
        Entity::Circle(circle) => {
            canvas.begin_path();
            canvas.arc(
                projection.to_screen(circle.center),
                circle.radius * projection.scale(),
                0.0,
                TAU,
                false,
            );
        }
        Entity::Arc(arc) => {
            // Y 轴翻转后世界角度取反，逆时针方向随之变为角度递减
            canvas.begin_path();
            canvas.arc(
                projection.to_screen(arc.center),
                arc.radius * projection.scale(),
                -arc.start_angle,
                -arc.end_angle,
                true,
            );
        }
        Entity::Polyline(polyline) => {
            let mut vertices = polyline.vertices.iter();
            let Some(first) = vertices.next() else {
                return false;
            };
            canvas.begin_path();
            canvas.move_to(projection.to_screen(first.position));
            for vertex in vertices {
                canvas.line_to(projection.to_screen(vertex.position));
            }
            if polyline.is_closed {
                canvas.close_path();
            }
        }
        Entity::Insert(_) => return false,
    }
    canvas.stroke(StrokeStyle::for_kind(entity.kind()));
    true
}
