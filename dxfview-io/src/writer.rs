use std::fmt::Write as _;

use dxfview_core::document::{Document, Polyline};

use crate::IoError;

/// R12 文本格式的 DXF 写出器，只生成 HEADER 与 ENTITIES 两个段。
///
/// 多段线以 `POLYLINE` / `VERTEX` / `SEQEND` 序列输出，兼容性优于 `LWPOLYLINE`，
/// 无需写出句柄与 TABLES 段。
pub struct DxfWriter {
    out: String,
    entity_count: usize,
}

impl DxfWriter {
    pub fn new() -> Self {
        let mut writer = Self {
            out: String::new(),
            entity_count: 0,
        };
        writer.pair(0, "SECTION");
        writer.pair(2, "HEADER");
        writer.pair(9, "$ACADVER");
        writer.pair(1, "AC1009");
        writer.pair(0, "ENDSEC");
        writer.pair(0, "SECTION");
        writer.pair(2, "ENTITIES");
        writer
    }

    /// 依次写出所有块内与顶层的多段线，其余实体不输出。
    pub fn write_polylines(&mut self, document: &Document) -> Result<usize, IoError> {
        let mut written = 0;
        for polyline in document.polylines() {
            self.write_polyline(polyline)?;
            written += 1;
        }
        Ok(written)
    }

    pub fn write_polyline(&mut self, polyline: &Polyline) -> Result<(), IoError> {
        if polyline.vertices.is_empty() {
            return Err(IoError::InvalidDocument(format!(
                "图层 {} 上的多段线没有顶点",
                polyline.layer
            )));
        }
        if let Some(index) = polyline
            .vertices
            .iter()
            .position(|vertex| !vertex.position.is_finite() || !vertex.bulge.is_finite())
        {
            return Err(IoError::InvalidDocument(format!(
                "多段线第 {index} 个顶点包含非有限数值"
            )));
        }

        let layer = layer_or_default(&polyline.layer);
        self.pair(0, "POLYLINE");
        self.pair(8, layer);
        self.pair(66, 1);
        self.pair(10, 0.0);
        self.pair(20, 0.0);
        self.pair(30, 0.0);
        self.pair(70, if polyline.is_closed { 1 } else { 0 });
        for vertex in &polyline.vertices {
            self.pair(0, "VERTEX");
            self.pair(8, layer);
            self.pair(10, vertex.position.x());
            self.pair(20, vertex.position.y());
            self.pair(30, 0.0);
            if vertex.bulge != 0.0 {
                self.pair(42, vertex.bulge);
            }
        }
        self.pair(0, "SEQEND");
        self.pair(8, layer);
        self.entity_count += 1;
        Ok(())
    }

    #[inline]
    pub fn entity_count(&self) -> usize {
        self.entity_count
    }

    /// 闭合 ENTITIES 段并输出完整文本。
    pub fn finish(mut self) -> String {
        self.pair(0, "ENDSEC");
        self.pair(0, "EOF");
        self.out
    }

    fn pair(&mut self, code: i32, value: impl std::fmt::Display) {
        // 写入 String 不会失败
        let _ = write!(self.out, "{code:>3}\r\n{value}\r\n");
    }
}

impl Default for DxfWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn layer_or_default(layer: &str) -> &str {
    let trimmed = layer.trim();
    if trimmed.is_empty() { "0" } else { trimmed }
}

#[cfg(test)]
mod tests {
    use dxfview_core::document::{PolylineVertex, make_polyline};
    use dxfview_core::geometry::Point2;

    use super::*;

    #[test]
    fn empty_document_produces_minimal_file() {
        let text = DxfWriter::new().finish();
        assert!(text.starts_with("  0\r\nSECTION\r\n  2\r\nHEADER\r\n"));
        assert!(text.ends_with("  0\r\nENDSEC\r\n  0\r\nEOF\r\n"));
    }

    #[test]
    fn closed_polyline_writes_flag_and_vertices_in_order() {
        let mut writer = DxfWriter::new();
        let polyline = make_polyline(
            [Point2::new(0.0, 0.0), Point2::new(10.5, 0.0)],
            true,
            "",
        );
        writer.write_polyline(&polyline).expect("write polyline");
        assert_eq!(writer.entity_count(), 1);
        let text = writer.finish();
        assert!(text.contains(" 70\r\n1\r\n"));
        let first = text.find(" 10\r\n0\r\n").expect("first vertex x");
        let second = text.find(" 10\r\n10.5\r\n").expect("second vertex x");
        assert!(first < second);
        assert!(text.contains("  8\r\n0\r\n"), "空图层名应回退为 0");
    }

    #[test]
    fn non_finite_vertex_is_rejected() {
        let mut writer = DxfWriter::new();
        let mut polyline = make_polyline([Point2::new(0.0, 0.0)], false, "0");
        polyline
            .vertices
            .push(PolylineVertex::new(Point2::new(f64::NAN, 1.0)));
        let err = writer.write_polyline(&polyline).unwrap_err();
        assert!(matches!(err, IoError::InvalidDocument(_)));
    }
}
