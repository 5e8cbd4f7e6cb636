pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示；序列化为 `{x, y}`，与浏览器端约定一致。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    #[serde(from = "PointRepr", into = "PointRepr")]
    pub struct Point2(pub DVec2);

    #[derive(Serialize, Deserialize)]
    struct PointRepr {
        x: f64,
        y: f64,
    }

    impl From<PointRepr> for Point2 {
        fn from(value: PointRepr) -> Self {
            Self::new(value.x, value.y)
        }
    }

    impl From<Point2> for PointRepr {
        fn from(value: Point2) -> Self {
            Self {
                x: value.x(),
                y: value.y(),
            }
        }
    }

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }
    }

    impl Default for Point2 {
        fn default() -> Self {
            Self(DVec2::ZERO)
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量，用于平移量等增量。
    #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 轴对齐边界框。空框以 +∞/−∞ 作为哨兵值。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        pub fn include_point(&mut self, point: Point2) {
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        #[inline]
        pub fn width(&self) -> f64 {
            self.max.x() - self.min.x()
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.max.y() - self.min.y()
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            let center = (self.min.as_vec2() + self.max.as_vec2()) * 0.5;
            Point2::from_vec(center)
        }
    }

    impl Default for Bounds2D {
        fn default() -> Self {
            Self::empty()
        }
    }
}

pub mod document {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Serialize};

    use crate::geometry::Point2;

    pub const DEFAULT_LAYER: &str = "0";

    fn default_layer() -> String {
        DEFAULT_LAYER.to_string()
    }

    fn default_scale() -> f64 {
        1.0
    }

    /// 实体类别，与 DXF 实体名称一一对应（大写）。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "UPPERCASE")]
    pub enum EntityKind {
        Line,
        Circle,
        Arc,
        Polyline,
        Insert,
    }

    /// 图元。JSON 形式以 `type` 字段区分类别，例如 `{"type": "LINE", ...}`。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type", rename_all = "UPPERCASE")]
    pub enum Entity {
        Line(Line),
        Circle(Circle),
        Arc(Arc),
        Polyline(Polyline),
        Insert(Insert),
    }

    impl Entity {
        #[inline]
        pub fn kind(&self) -> EntityKind {
            match self {
                Entity::Line(_) => EntityKind::Line,
                Entity::Circle(_) => EntityKind::Circle,
                Entity::Arc(_) => EntityKind::Arc,
                Entity::Polyline(_) => EntityKind::Polyline,
                Entity::Insert(_) => EntityKind::Insert,
            }
        }

        #[inline]
        pub fn layer_name(&self) -> &str {
            match self {
                Entity::Line(line) => &line.layer,
                Entity::Circle(circle) => &circle.layer,
                Entity::Arc(arc) => &arc.layer,
                Entity::Polyline(polyline) => &polyline.layer,
                Entity::Insert(insert) => &insert.layer,
            }
        }

        #[inline]
        pub fn as_polyline(&self) -> Option<&Polyline> {
            match self {
                Entity::Polyline(polyline) => Some(polyline),
                _ => None,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
        #[serde(default = "default_layer")]
        pub layer: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Circle {
        pub center: Point2,
        pub radius: f64,
        #[serde(default = "default_layer")]
        pub layer: String,
    }

    /// 圆弧实体，角度以弧度形式储存，遵循数学正方向。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Arc {
        pub center: Point2,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
        #[serde(default = "default_layer")]
        pub layer: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<PolylineVertex>,
        /// 闭合标记，JSON 中沿用 `shape` 字段名。
        #[serde(rename = "shape", default)]
        pub is_closed: bool,
        #[serde(default = "default_layer")]
        pub layer: String,
    }

    impl Polyline {
        #[inline]
        pub fn vertex_count(&self) -> usize {
            self.vertices.len()
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    #[serde(from = "VertexRepr", into = "VertexRepr")]
    pub struct PolylineVertex {
        pub position: Point2,
        pub bulge: f64,
    }

    #[derive(Serialize, Deserialize)]
    struct VertexRepr {
        x: f64,
        y: f64,
        #[serde(default, skip_serializing_if = "is_zero")]
        bulge: f64,
    }

    fn is_zero(value: &f64) -> bool {
        *value == 0.0
    }

    impl From<VertexRepr> for PolylineVertex {
        fn from(value: VertexRepr) -> Self {
            Self::with_bulge(Point2::new(value.x, value.y), value.bulge)
        }
    }

    impl From<PolylineVertex> for VertexRepr {
        fn from(value: PolylineVertex) -> Self {
            Self {
                x: value.position.x(),
                y: value.position.y(),
                bulge: value.bulge,
            }
        }
    }

    impl PolylineVertex {
        #[inline]
        pub fn new(position: Point2) -> Self {
            Self {
                position,
                bulge: 0.0,
            }
        }

        #[inline]
        pub fn with_bulge(position: Point2, bulge: f64) -> Self {
            Self { position, bulge }
        }
    }

    /// 块参照（INSERT），旋转角以度为单位，与 DXF 组码 50 保持一致。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Insert {
        pub name: String,
        pub position: Point2,
        #[serde(default = "default_scale")]
        pub x_scale: f64,
        #[serde(default = "default_scale")]
        pub y_scale: f64,
        #[serde(default)]
        pub rotation: f64,
        #[serde(default = "default_layer")]
        pub layer: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Block {
        pub name: String,
        #[serde(default)]
        pub position: Point2,
        #[serde(default = "default_layer")]
        pub layer: String,
        #[serde(default)]
        pub entities: Vec<Entity>,
    }

    impl Block {
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                position: Point2::default(),
                layer: default_layer(),
                entities: Vec::new(),
            }
        }
    }

    /// 解析后的图纸：顶层实体列表 + 以名称索引的块定义。
    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Document {
        #[serde(default)]
        entities: Vec<Entity>,
        #[serde(default)]
        blocks: BTreeMap<String, Block>,
    }

    impl Document {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_entity(&mut self, entity: Entity) {
            self.entities.push(entity);
        }

        pub fn add_line(&mut self, start: Point2, end: Point2, layer: impl Into<String>) {
            self.entities.push(Entity::Line(Line {
                start,
                end,
                layer: layer.into(),
            }));
        }

        pub fn add_circle(&mut self, center: Point2, radius: f64, layer: impl Into<String>) {
            self.entities.push(Entity::Circle(Circle {
                center,
                radius: radius.abs(),
                layer: layer.into(),
            }));
        }

        pub fn add_polyline<I>(&mut self, points: I, is_closed: bool, layer: impl Into<String>)
        where
            I: IntoIterator<Item = Point2>,
        {
            self.entities
                .push(Entity::Polyline(make_polyline(points, is_closed, layer)));
        }

        /// 以名称登记块定义，同名时覆盖旧定义。
        pub fn add_block(&mut self, block: Block) {
            self.blocks.insert(block.name.clone(), block);
        }

        #[inline]
        pub fn entities(&self) -> impl Iterator<Item = &Entity> {
            self.entities.iter()
        }

        #[inline]
        pub fn retain_entities<F>(&mut self, keep: F)
        where
            F: FnMut(&Entity) -> bool,
        {
            self.entities.retain(keep);
        }

        #[inline]
        pub fn block(&self, name: &str) -> Option<&Block> {
            self.blocks.get(name)
        }

        #[inline]
        pub fn blocks(&self) -> impl Iterator<Item = &Block> {
            self.blocks.values()
        }

        #[inline]
        pub fn blocks_mut(&mut self) -> impl Iterator<Item = &mut Block> {
            self.blocks.values_mut()
        }

        /// 依次返回各块内及顶层的多段线，块在前。
        pub fn polylines(&self) -> impl Iterator<Item = &Polyline> {
            self.blocks
                .values()
                .flat_map(|block| block.entities.iter())
                .chain(self.entities.iter())
                .filter_map(Entity::as_polyline)
        }
    }

    pub fn make_polyline<I>(points: I, is_closed: bool, layer: impl Into<String>) -> Polyline
    where
        I: IntoIterator<Item = Point2>,
    {
        Polyline {
            vertices: points.into_iter().map(PolylineVertex::new).collect(),
            is_closed,
            layer: layer.into(),
        }
    }

}
