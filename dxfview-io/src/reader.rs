use std::str::FromStr;

use dxfview_core::{
    document::{Arc, Block, Circle, Document, Entity, Insert, Line, Polyline, PolylineVertex},
    geometry::Point2,
};
use tracing::debug;

use crate::IoError;

const CLOSED_FLAG: i16 = 0x01;
/// 样条拟合控制点（VERTEX 组码 70 = 16），不属于可见几何。
const VERTEX_SPLINE_FRAME: i16 = 0x10;
/// 3D 多边形网格 / 多面网格。
const POLYLINE_MESH_FLAGS: i16 = 0x10 | 0x40;

#[derive(Debug)]
pub(crate) struct DxfError {
    message: String,
}

impl DxfError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<DxfError> for IoError {
    fn from(err: DxfError) -> Self {
        IoError::InvalidDocument(err.message)
    }
}

/// 模型空间与图纸空间（`*Paper_Space0` 等）是布局容器而不是可浏览的块；
/// `*U7`、`*D3` 这类匿名块照常保留。R12 的 `$MODEL_SPACE` 写法一并识别。
fn is_layout_block(name: &str) -> bool {
    let Some(rest) = name.strip_prefix(['*', '$']) else {
        return false;
    };
    let rest = rest.to_ascii_lowercase();
    rest == "model_space" || rest.starts_with("paper_space")
}

/// 一条实体记录：组码 0 的类型名以及直到下一个组码 0 之前的全部组。
#[derive(Debug)]
struct Record {
    kind: String,
    pairs: Vec<(i32, String)>,
}

impl Record {
    fn values(&self, code: i32) -> impl Iterator<Item = &str> {
        self.pairs
            .iter()
            .filter(move |(c, _)| *c == code)
            .map(|(_, value)| value.as_str())
    }

    fn single(&self, code: i32, what: &str) -> Result<Option<&str>, DxfError> {
        let mut values = self.values(code);
        let first = values.next();
        if values.next().is_some() {
            return Err(DxfError::new(format!(
                "{} 的{what}（组码 {code}）出现重复值",
                self.kind
            )));
        }
        Ok(first)
    }

    fn parse<T: FromStr>(&self, code: i32, raw: &str, what: &str) -> Result<T, DxfError> {
        raw.trim().parse::<T>().map_err(|_| {
            DxfError::new(format!(
                "{} 的{what}（组码 {code}）解析失败（值：\"{raw}\"）",
                self.kind
            ))
        })
    }

    fn missing(&self, code: i32, what: &str) -> DxfError {
        DxfError::new(format!("{} 缺少{what}（组码 {code}）", self.kind))
    }

    fn number(&self, code: i32, what: &str) -> Result<Option<f64>, DxfError> {
        self.single(code, what)?
            .map(|raw| self.parse(code, raw, what))
            .transpose()
    }

    fn required(&self, code: i32, what: &str) -> Result<f64, DxfError> {
        self.number(code, what)?
            .ok_or_else(|| self.missing(code, what))
    }

    /// 二维点：X 在 `x_code`，Y 在 `x_code + 10`。
    fn point(&self, x_code: i32, what: &str) -> Result<Point2, DxfError> {
        let x = self.required(x_code, &format!("{what} X"))?;
        let y = self.required(x_code + 10, &format!("{what} Y"))?;
        Ok(Point2::new(x, y))
    }

    fn name(&self) -> Result<String, DxfError> {
        self.single(2, "名称")?
            .map(|name| name.trim().to_string())
            .ok_or_else(|| self.missing(2, "名称"))
    }

    fn flags(&self) -> Result<i16, DxfError> {
        Ok(self
            .single(70, "标志")?
            .map(|raw| self.parse::<i16>(70, raw, "标志"))
            .transpose()?
            .unwrap_or(0))
    }

    fn layer(&self) -> String {
        self.values(8)
            .last()
            .map(|layer| layer.trim().to_string())
            .unwrap_or_else(|| "0".to_string())
    }
}

pub(crate) struct DxfParser<'a> {
    pairs: PairStream<'a>,
}

impl<'a> DxfParser<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Self {
            pairs: PairStream::new(source),
        }
    }

    pub(crate) fn parse(mut self) -> Result<Document, DxfError> {
        let mut document = Document::new();
        while let Some((code, value)) = self.pairs.next_pair()? {
            if code != 0 {
                return Err(DxfError::new(format!(
                    "第 {} 行出现组码 {code}，期望 0（SECTION/EOF）",
                    self.pairs.line_number
                )));
            }
            match value.trim() {
                "SECTION" => {
                    let header = self.read_body("SECTION".to_string())?;
                    match header.name()?.as_str() {
                        "ENTITIES" => self.read_entities(&mut document)?,
                        "BLOCKS" => self.read_blocks(&mut document)?,
                        other => {
                            debug!(section = other, "跳过段");
                            self.skip_section()?;
                        }
                    }
                }
                "EOF" => break,
                unexpected => {
                    return Err(DxfError::new(format!(
                        "意外的标记 {unexpected}，期望 SECTION 或 EOF"
                    )));
                }
            }
        }
        Ok(document)
    }

    fn next_record(&mut self, context: &str) -> Result<Record, DxfError> {
        match self.pairs.next_pair()? {
            Some((0, value)) => self.read_body(value.trim().to_string()),
            Some((code, _)) => Err(DxfError::new(format!(
                "{context}遇到组码 {code}（期望 0 表示实体起始）"
            ))),
            None => Err(DxfError::new(format!("{context}提前结束"))),
        }
    }

    /// 组码 0 已被读取，收集其后直到下一个组码 0 的所有组。
    fn read_body(&mut self, kind: String) -> Result<Record, DxfError> {
        let mut pairs = Vec::new();
        loop {
            match self.pairs.next_pair()? {
                Some((0, value)) => {
                    self.pairs.put_back((0, value));
                    break;
                }
                Some(pair) => pairs.push(pair),
                None => break,
            }
        }
        Ok(Record { kind, pairs })
    }

    /// 下一条记录是否为 `kind`，不消耗任何输入。
    fn next_is(&mut self, kind: &str) -> Result<bool, DxfError> {
        match self.pairs.next_pair()? {
            Some(pair) => {
                let hit = pair.0 == 0 && pair.1.trim() == kind;
                self.pairs.put_back(pair);
                Ok(hit)
            }
            None => Ok(false),
        }
    }

    fn skip_section(&mut self) -> Result<(), DxfError> {
        loop {
            match self.pairs.next_pair()? {
                Some((0, value)) if value.trim() == "ENDSEC" => return Ok(()),
                Some(_) => {}
                None => return Err(DxfError::new("SECTION 未找到 ENDSEC 终止标记")),
            }
        }
    }

    fn read_entities(&mut self, document: &mut Document) -> Result<(), DxfError> {
        loop {
            let record = self.next_record("ENTITIES 段")?;
            if record.kind == "ENDSEC" {
                return Ok(());
            }
            if let Some(entity) = self.entity_from(record)? {
                document.add_entity(entity);
            }
        }
    }

    fn read_blocks(&mut self, document: &mut Document) -> Result<(), DxfError> {
        loop {
            let record = self.next_record("BLOCKS 段")?;
            match record.kind.as_str() {
                "ENDSEC" => return Ok(()),
                "BLOCK" => {
                    if let Some(block) = self.read_block(record)? {
                        document.add_block(block);
                    }
                }
                other => debug!(kind = other, "BLOCKS 段忽略块外记录"),
            }
        }
    }

    fn read_block(&mut self, header: Record) -> Result<Option<Block>, DxfError> {
        let name = header.name()?;
        let layout = is_layout_block(&name);
        let mut entities = Vec::new();
        loop {
            let record = self.next_record("BLOCK 定义")?;
            if record.kind == "ENDBLK" {
                break;
            }
            if !layout {
                if let Some(entity) = self.entity_from(record)? {
                    entities.push(entity);
                }
            }
        }

        if layout {
            debug!(block = %name, "跳过布局块");
            return Ok(None);
        }
        let mut block = Block::new(name);
        block.position = Point2::new(
            header.number(10, "基点 X")?.unwrap_or(0.0),
            header.number(20, "基点 Y")?.unwrap_or(0.0),
        );
        block.layer = header.layer();
        block.entities = entities;
        Ok(Some(block))
    }

    /// 将记录转换为实体；不支持的类型记录日志后返回 `None`。
    fn entity_from(&mut self, record: Record) -> Result<Option<Entity>, DxfError> {
        let entity = match record.kind.as_str() {
            "LINE" => Entity::Line(Line {
                start: record.point(10, "起点")?,
                end: record.point(11, "终点")?,
                layer: record.layer(),
            }),
            "CIRCLE" => Entity::Circle(Circle {
                center: record.point(10, "圆心")?,
                radius: record.required(40, "半径")?,
                layer: record.layer(),
            }),
            "ARC" => Entity::Arc(Arc {
                center: record.point(10, "圆心")?,
                radius: record.required(40, "半径")?,
                start_angle: record.required(50, "起始角")?.to_radians(),
                end_angle: record.required(51, "终止角")?.to_radians(),
                layer: record.layer(),
            }),
            "LWPOLYLINE" => lightweight_polyline(&record)?,
            "POLYLINE" => return self.legacy_polyline(&record),
            "INSERT" => self.insert(&record)?,
            other => {
                debug!(kind = other, "跳过不支持的实体");
                return Ok(None);
            }
        };
        Ok(Some(entity))
    }

    /// 旧式 POLYLINE：头部之后跟随 VERTEX 记录，以 SEQEND 结束。
    /// 网格类 POLYLINE 不表达二维路径，顶点读完后整体丢弃。
    fn legacy_polyline(&mut self, header: &Record) -> Result<Option<Entity>, DxfError> {
        let flags = header.flags()?;
        let mesh = flags & POLYLINE_MESH_FLAGS != 0;

        let mut vertices = Vec::new();
        while self.next_is("VERTEX")? {
            let vertex = self.next_record("POLYLINE")?;
            if mesh || vertex.flags()? & VERTEX_SPLINE_FRAME != 0 {
                continue;
            }
            let bulge = vertex.number(42, "bulge")?.unwrap_or(0.0);
            vertices.push(PolylineVertex::with_bulge(vertex.point(10, "顶点")?, bulge));
        }
        if self.next_is("SEQEND")? {
            self.next_record("POLYLINE")?;
        }

        if mesh {
            debug!(flags, "跳过网格类 POLYLINE");
            return Ok(None);
        }
        if vertices.is_empty() {
            return Err(DxfError::new("POLYLINE 未解析到任何顶点"));
        }
        Ok(Some(Entity::Polyline(Polyline {
            vertices,
            is_closed: flags & CLOSED_FLAG != 0,
            layer: header.layer(),
        })))
    }

    fn insert(&mut self, record: &Record) -> Result<Entity, DxfError> {
        let name = record.name()?;
        let position = record.point(10, "插入点")?;
        let x_scale = record.number(41, "X 缩放")?.unwrap_or(1.0);
        let y_scale = record.number(42, "Y 缩放")?.unwrap_or(x_scale);
        let rotation = record.number(50, "旋转角")?.unwrap_or(0.0);

        // 属性（ATTRIB ... SEQEND）不参与浏览。
        while self.next_is("ATTRIB")? {
            self.next_record("INSERT")?;
        }
        if self.next_is("SEQEND")? {
            self.next_record("INSERT")?;
        }

        Ok(Entity::Insert(Insert {
            name,
            position,
            x_scale,
            y_scale,
            rotation,
            layer: record.layer(),
        }))
    }
}

/// LWPOLYLINE 的顶点由按顺序出现的 10/20 组给出，42 作用于最近的顶点。
fn lightweight_polyline(record: &Record) -> Result<Entity, DxfError> {
    let mut vertices: Vec<PolylineVertex> = Vec::new();
    let mut pending_x: Option<f64> = None;
    for (code, raw) in &record.pairs {
        match *code {
            10 => {
                let x = record.parse(10, raw, "顶点 X")?;
                if pending_x.replace(x).is_some() {
                    return Err(record.missing(20, "顶点 Y"));
                }
            }
            20 => {
                let x = pending_x.take().ok_or_else(|| record.missing(10, "顶点 X"))?;
                let y = record.parse(20, raw, "顶点 Y")?;
                vertices.push(PolylineVertex::new(Point2::new(x, y)));
            }
            42 => {
                let bulge = record.parse(42, raw, "bulge")?;
                vertices
                    .last_mut()
                    .ok_or_else(|| DxfError::new("LWPOLYLINE 在首个顶点之前出现 bulge（组码 42）"))?
                    .bulge = bulge;
            }
            _ => {}
        }
    }

    if pending_x.is_some() {
        return Err(record.missing(20, "顶点 Y"));
    }
    if vertices.is_empty() {
        return Err(DxfError::new("LWPOLYLINE 未解析到任何顶点"));
    }
    Ok(Entity::Polyline(Polyline {
        vertices,
        is_closed: record.flags()? & CLOSED_FLAG != 0,
        layer: record.layer(),
    }))
}

/// 逐组读取（组码, 值），支持回退一组。
struct PairStream<'a> {
    lines: std::str::Lines<'a>,
    pushed_back: Option<(i32, String)>,
    line_number: usize,
}

impl<'a> PairStream<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lines: source.trim_start_matches('\u{feff}').lines(),
            pushed_back: None,
            line_number: 0,
        }
    }

    fn next_line(&mut self) -> Option<&'a str> {
        let line = self.lines.next()?;
        self.line_number += 1;
        Some(line)
    }

    /// 注释组（999）与组码位置上的空行被丢弃。
    fn next_pair(&mut self) -> Result<Option<(i32, String)>, DxfError> {
        if let Some(pair) = self.pushed_back.take() {
            return Ok(Some(pair));
        }

        loop {
            let Some(code_line) = self.next_line() else {
                return Ok(None);
            };
            let code_text = code_line.trim();
            if code_text.is_empty() {
                continue;
            }
            let code = code_text.parse::<i32>().map_err(|_| {
                DxfError::new(format!(
                    "第 {} 行的组码 \"{code_text}\" 无法解析为整数",
                    self.line_number
                ))
            })?;
            let Some(value_line) = self.next_line() else {
                return Err(DxfError::new(format!(
                    "文件在第 {} 行结束，组码 {code} 缺少值行",
                    self.line_number
                )));
            };
            if code != 999 {
                return Ok(Some((code, value_line.trim_end_matches('\r').to_string())));
            }
        }
    }

    fn put_back(&mut self, pair: (i32, String)) {
        debug_assert!(self.pushed_back.is_none(), "只能回退一组");
        self.pushed_back = Some(pair);
    }
}
