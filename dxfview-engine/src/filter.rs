use dxfview_core::document::{Block, Document, Entity, EntityKind};
use tracing::trace;

/// 顶层实体的过滤规则。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOptions {
    /// 保留的顶层实体类别；为空表示全部保留。
    pub top_level_kinds: Vec<EntityKind>,
}

impl FilterOptions {
    pub fn new(top_level_kinds: impl Into<Vec<EntityKind>>) -> Self {
        Self {
            top_level_kinds: top_level_kinds.into(),
        }
    }

    /// 不过滤顶层实体，只精简块。
    pub fn keep_all_top_level() -> Self {
        Self {
            top_level_kinds: Vec::new(),
        }
    }

    #[inline]
    fn keeps(&self, kind: EntityKind) -> bool {
        self.top_level_kinds.is_empty() || self.top_level_kinds.contains(&kind)
    }
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self::new([EntityKind::Insert])
    }
}

/// 单次过滤的统计，用于日志。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterSummary {
    pub blocks: usize,
    pub emptied_blocks: usize,
    pub removed_block_entities: usize,
    pub removed_top_level: usize,
}

/// 原地精简文档：
/// 1. 每个块只保留顶点数最多的多段线（并列时取先出现者），没有多段线的块清空；
/// 2. 顶层实体只保留 `options` 指定的类别。
pub fn filter_document(document: &mut Document, options: &FilterOptions) -> FilterSummary {
    let mut summary = FilterSummary::default();
    for block in document.blocks_mut() {
        let before = block.entities.len();
        reduce_block(block);
        summary.blocks += 1;
        summary.removed_block_entities += before - block.entities.len();
        if block.entities.is_empty() {
            summary.emptied_blocks += 1;
            trace!(block = %block.name, "块内没有多段线，已清空");
        }
    }

    let before = document.entities().count();
    document.retain_entities(|entity| options.keeps(entity.kind()));
    summary.removed_top_level = before - document.entities().count();
    summary
}

/// 将块的实体替换为其中最大的多段线；没有多段线时替换为空列表。
pub fn reduce_block(block: &mut Block) {
    let entities = std::mem::take(&mut block.entities);
    block.entities = largest_polyline(entities).into_iter().collect();
}

/// 按顶点数取最大的多段线。并列时保留先出现者。
pub fn largest_polyline<I>(entities: I) -> Option<Entity>
where
    I: IntoIterator<Item = Entity>,
{
    entities
        .into_iter()
        .filter(|entity| entity.kind() == EntityKind::Polyline)
        .fold(None, |best: Option<Entity>, candidate| match best {
            Some(current) if vertex_count(&current) >= vertex_count(&candidate) => Some(current),
            _ => Some(candidate),
        })
}

fn vertex_count(entity: &Entity) -> usize {
    entity.as_polyline().map_or(0, |polyline| polyline.vertex_count())
}

#[cfg(test)]
mod tests {
    use dxfview_core::document::{Circle, Insert, Line, make_polyline};
    use dxfview_core::geometry::Point2;

    use super::*;

    fn polyline_with(count: usize, layer: &str) -> Entity {
        let points = (0..count).map(|i| Point2::new(i as f64, 0.0));
        Entity::Polyline(make_polyline(points, false, layer))
    }

    fn line() -> Entity {
        Entity::Line(Line {
            start: Point2::new(0.0, 0.0),
            end: Point2::new(1.0, 1.0),
            layer: "0".into(),
        })
    }

    fn insert(name: &str) -> Entity {
        Entity::Insert(Insert {
            name: name.into(),
            position: Point2::new(0.0, 0.0),
            x_scale: 1.0,
            y_scale: 1.0,
            rotation: 0.0,
            layer: "0".into(),
        })
    }

    fn document_with_block(entities: Vec<Entity>) -> Document {
        let mut document = Document::new();
        let mut block = Block::new("B");
        block.entities = entities;
        document.add_block(block);
        document
    }

    fn block_layers(document: &Document) -> Vec<String> {
        document
            .block("B")
            .unwrap()
            .entities
            .iter()
            .map(|entity| entity.layer_name().to_string())
            .collect()
    }

    #[test]
    fn block_keeps_polyline_with_most_vertices() {
        let mut document = document_with_block(vec![
            polyline_with(3, "three"),
            line(),
            polyline_with(7, "seven"),
            polyline_with(5, "five"),
        ]);
        let summary = filter_document(&mut document, &FilterOptions::default());
        assert_eq!(block_layers(&document), vec!["seven"]);
        assert_eq!(summary.removed_block_entities, 3);
        assert_eq!(summary.emptied_blocks, 0);
    }

    #[test]
    fn ties_keep_the_first_polyline() {
        let mut document = document_with_block(vec![
            polyline_with(4, "first"),
            polyline_with(4, "second"),
        ]);
        filter_document(&mut document, &FilterOptions::default());
        assert_eq!(block_layers(&document), vec!["first"]);
    }

    #[test]
    fn single_polyline_block_is_stable_across_repeated_filtering() {
        let mut document = document_with_block(vec![polyline_with(6, "only")]);
        filter_document(&mut document, &FilterOptions::default());
        let once = document.clone();
        filter_document(&mut document, &FilterOptions::default());
        assert_eq!(document, once);
        assert_eq!(block_layers(&document), vec!["only"]);
    }

    #[test]
    fn block_without_polylines_is_emptied() {
        let mut document = document_with_block(vec![
            line(),
            Entity::Circle(Circle {
                center: Point2::new(0.0, 0.0),
                radius: 1.0,
                layer: "0".into(),
            }),
        ]);
        let summary = filter_document(&mut document, &FilterOptions::default());
        assert!(document.block("B").unwrap().entities.is_empty());
        assert_eq!(summary.emptied_blocks, 1);
    }

    #[test]
    fn top_level_keeps_only_configured_kinds() {
        let mut document = Document::new();
        document.add_entity(line());
        document.add_entity(insert("A"));
        document.add_entity(polyline_with(2, "p"));
        document.add_entity(insert("B"));

        let summary = filter_document(&mut document, &FilterOptions::default());
        let kinds: Vec<_> = document.entities().map(Entity::kind).collect();
        assert_eq!(kinds, vec![EntityKind::Insert, EntityKind::Insert]);
        assert_eq!(summary.removed_top_level, 2);
    }

    #[test]
    fn empty_kind_list_keeps_every_top_level_entity() {
        let mut document = Document::new();
        document.add_entity(line());
        document.add_entity(insert("A"));
        filter_document(&mut document, &FilterOptions::keep_all_top_level());
        assert_eq!(document.entities().count(), 2);
    }

    #[test]
    fn largest_polyline_ignores_other_kinds() {
        assert!(largest_polyline(vec![line(), insert("X")]).is_none());
    }
}
