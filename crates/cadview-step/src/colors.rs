//! Recovering part colors from STEP presentation styles.
//!
//! Every `STYLED_ITEM` names a geometry item and a list of styles. The styles
//! are walked down to a colour, and the item is walked up through its shape
//! representation to the product that owns it.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use cadview_ir::{ColorEntry, ColorMap, Rgb};

use crate::entities::{is_relevant, Entity, EntityIndex};
use crate::error::Result;
use crate::parser::StepFile;
use crate::reader::{read_step, read_step_from_buffer};

/// Maximum number of references followed from one starting entity.
const MAX_HOPS: usize = 32;

/// Counters collected while extracting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    /// Records that could not be parsed.
    pub skipped_records: usize,
    /// Styled items seen.
    pub styled_items: usize,
    /// Styled items that produced an entry.
    pub resolved: usize,
    /// Styled items whose style chain holds no colour.
    pub missing_color: usize,
    /// Styled items whose item could not be traced to a product.
    pub missing_part: usize,
}

/// Result of color extraction.
#[derive(Debug, Clone, Default)]
pub struct ColorExtraction {
    /// Part name → color, in first-resolution order.
    pub colors: ColorMap,
    /// Extraction counters.
    pub stats: ExtractionStats,
    /// Authoring tool named in the `FILE_NAME` header.
    pub originating_system: Option<String>,
}

/// Extract part colors from a STEP file on disk.
pub fn extract_colors_from_file(path: impl AsRef<Path>) -> Result<ColorExtraction> {
    let path = path.as_ref();
    log::debug!("extracting colors from {}", path.display());
    let file = read_step(path, is_relevant)?;
    Ok(extract_from_step(&file))
}

/// Extract part colors from STEP text.
///
/// Only unreadable input is an error. Records that do not parse are skipped.
pub fn extract_colors(data: &[u8]) -> Result<ColorExtraction> {
    let file = read_step_from_buffer(data, is_relevant)?;
    Ok(extract_from_step(&file))
}

fn extract_from_step(file: &StepFile) -> ColorExtraction {
    let originating_system = file.originating_system().map(str::to_owned);
    if let Some(system) = &originating_system {
        log::debug!("STEP file written by {system}");
    }
    ColorExtraction {
        originating_system,
        ..extract_from_index(&EntityIndex::from_file(file), file.skipped)
    }
}

fn extract_from_index(index: &EntityIndex, skipped: usize) -> ColorExtraction {
    let mut resolver = ColorResolver::new(index);
    let mut out = ColorExtraction::default();
    out.stats.skipped_records = skipped;

    for (id, entity) in index.iter() {
        let Entity::StyledItem { styles, item } = entity else {
            continue;
        };
        out.stats.styled_items += 1;

        let Some((color_name, color)) = resolver.color_of_styles(styles) else {
            log::debug!("styled item #{id}: no colour in style chain");
            out.stats.missing_color += 1;
            continue;
        };
        let Some(part_name) = resolver.part_name_of_item(*item) else {
            log::debug!("styled item #{id}: item #{item} has no owning product");
            out.stats.missing_part += 1;
            continue;
        };

        out.stats.resolved += 1;
        out.colors.insert(ColorEntry {
            part_name,
            color_name,
            color,
        });
    }

    log::debug!(
        "styled items: {} resolved, {} without colour, {} without part, {} records skipped",
        out.stats.resolved,
        out.stats.missing_color,
        out.stats.missing_part,
        out.stats.skipped_records,
    );
    out
}

/// Colour of a `DRAUGHTING_PRE_DEFINED_COLOUR` by name.
pub fn predefined_colour(name: &str) -> Option<Rgb> {
    let rgb = match name.to_ascii_lowercase().as_str() {
        "red" => Rgb::new(1.0, 0.0, 0.0),
        "green" => Rgb::new(0.0, 1.0, 0.0),
        "blue" => Rgb::new(0.0, 0.0, 1.0),
        "yellow" => Rgb::new(1.0, 1.0, 0.0),
        "magenta" => Rgb::new(1.0, 0.0, 1.0),
        "cyan" => Rgb::new(0.0, 1.0, 1.0),
        "black" => Rgb::new(0.0, 0.0, 0.0),
        "white" => Rgb::new(1.0, 1.0, 1.0),
        _ => return None,
    };
    Some(rgb)
}

/// Walks style chains and product chains over an [`EntityIndex`].
struct ColorResolver<'a> {
    index: &'a EntityIndex,
    /// Geometry item → shape representations listing it.
    containing_reps: HashMap<u64, Vec<u64>>,
    /// Representation → product definition shape.
    definitions: HashMap<u64, u64>,
    /// Representation → representations related to it, either direction.
    related: HashMap<u64, Vec<u64>>,
    /// Mapped representation → representation maps using it.
    maps: HashMap<u64, Vec<u64>>,
    /// Representation map → mapped items using it.
    mapped_items: HashMap<u64, Vec<u64>>,
    color_memo: HashMap<u64, Option<(String, Rgb)>>,
    name_memo: HashMap<u64, Option<String>>,
}

impl<'a> ColorResolver<'a> {
    fn new(index: &'a EntityIndex) -> Self {
        let mut containing_reps: HashMap<u64, Vec<u64>> = HashMap::new();
        let mut definitions = HashMap::new();
        let mut related: HashMap<u64, Vec<u64>> = HashMap::new();
        let mut maps: HashMap<u64, Vec<u64>> = HashMap::new();
        let mut mapped_items: HashMap<u64, Vec<u64>> = HashMap::new();

        for (id, entity) in index.iter() {
            match entity {
                Entity::ShapeRepresentation { items, .. } => {
                    for item in items {
                        containing_reps.entry(*item).or_default().push(id);
                    }
                }
                Entity::ShapeDefinitionRepresentation {
                    definition,
                    representation,
                } => {
                    definitions.entry(*representation).or_insert(*definition);
                }
                Entity::RepresentationRelationship { rep_1, rep_2 } => {
                    related.entry(*rep_1).or_default().push(*rep_2);
                    related.entry(*rep_2).or_default().push(*rep_1);
                }
                Entity::RepresentationMap {
                    mapped_representation,
                } => {
                    maps.entry(*mapped_representation).or_default().push(id);
                }
                Entity::MappedItem { source } => {
                    mapped_items.entry(*source).or_default().push(id);
                }
                _ => {}
            }
        }

        // Advanced B-rep representations are tried first
        for reps in containing_reps.values_mut() {
            reps.sort_by_key(|rep| !index_is_advanced_brep(index, *rep));
        }

        Self {
            index,
            containing_reps,
            definitions,
            related,
            maps,
            mapped_items,
            color_memo: HashMap::new(),
            name_memo: HashMap::new(),
        }
    }

    /// First colour reachable from the styles, in reference order.
    fn color_of_styles(&mut self, styles: &[u64]) -> Option<(String, Rgb)> {
        styles.iter().find_map(|style| self.color_from(*style))
    }

    fn color_from(&mut self, start: u64) -> Option<(String, Rgb)> {
        if let Some(memo) = self.color_memo.get(&start) {
            return memo.clone();
        }

        let mut visited = HashSet::new();
        let mut stack = vec![(start, 0usize)];
        let mut found = None;
        while let Some((id, depth)) = stack.pop() {
            if depth > MAX_HOPS || !visited.insert(id) {
                continue;
            }
            match self.index.get(id) {
                Some(Entity::ColourRgb { name, rgb }) => {
                    found = Some((name.clone(), *rgb));
                    break;
                }
                Some(Entity::PredefinedColour { name }) => {
                    if let Some(rgb) = predefined_colour(name) {
                        found = Some((name.clone(), rgb));
                        break;
                    }
                }
                Some(Entity::StyleLink { refs }) => {
                    stack.extend(refs.iter().rev().map(|r| (*r, depth + 1)));
                }
                _ => {}
            }
        }

        self.color_memo.insert(start, found.clone());
        found
    }

    /// Product name owning a geometry item.
    fn part_name_of_item(&mut self, item: u64) -> Option<String> {
        let mut reps = self.containing_reps.get(&item).cloned().unwrap_or_default();
        if reps.is_empty() && matches!(self.index.get(item), Some(Entity::ShapeRepresentation { .. })) {
            reps.push(item);
        }
        reps.into_iter().find_map(|rep| self.part_name_of_rep(rep))
    }

    /// Breadth-first search from a representation to one with a product.
    ///
    /// Direct definitions are checked before relationship and mapped-item
    /// neighbours.
    fn part_name_of_rep(&mut self, start: u64) -> Option<String> {
        if let Some(memo) = self.name_memo.get(&start) {
            return memo.clone();
        }

        let mut visited = HashSet::new();
        let mut queue = std::collections::VecDeque::from([(start, 0usize)]);
        let mut found = None;
        while let Some((rep, depth)) = queue.pop_front() {
            if depth > MAX_HOPS || !visited.insert(rep) {
                continue;
            }
            if let Some(name) = self.definitions.get(&rep).and_then(|pds| self.product_name(*pds)) {
                found = Some(name);
                break;
            }
            for other in self.related.get(&rep).into_iter().flatten() {
                queue.push_back((*other, depth + 1));
            }
            for map in self.maps.get(&rep).into_iter().flatten() {
                for mapped in self.mapped_items.get(map).into_iter().flatten() {
                    for parent in self.containing_reps.get(mapped).into_iter().flatten() {
                        queue.push_back((*parent, depth + 1));
                    }
                }
            }
        }

        self.name_memo.insert(start, found.clone());
        found
    }

    /// Name of the product behind a product definition shape.
    ///
    /// Falls back to the product id, then to the product definition id.
    fn product_name(&self, pds: u64) -> Option<String> {
        let Some(Entity::ProductDefinitionShape { definition }) = self.index.get(pds) else {
            return None;
        };
        let Some(Entity::ProductDefinition { id: pd_id, formation }) = self.index.get(*definition) else {
            return None;
        };
        let product = formation
            .and_then(|f| match self.index.get(f) {
                Some(Entity::ProductDefinitionFormation { product }) => Some(*product),
                _ => None,
            })
            .and_then(|p| match self.index.get(p) {
                Some(Entity::Product { id, name }) => Some((id.as_str(), name.as_str())),
                _ => None,
            });

        let (id, name) = product.unwrap_or(("", ""));
        [name, id, pd_id.as_str()]
            .into_iter()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_string)
    }
}

fn index_is_advanced_brep(index: &EntityIndex, rep: u64) -> bool {
    matches!(
        index.get(rep),
        Some(Entity::ShapeRepresentation {
            advanced_brep: true,
            ..
        })
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepError;

    fn step(data: &str) -> String {
        format!(
            "ISO-10303-21;\nHEADER;\nFILE_DESCRIPTION((''),'2;1');\n\
             FILE_NAME('box.step','',(''),(''),'','','');\n\
             FILE_SCHEMA(('AUTOMOTIVE_DESIGN'));\nENDSEC;\nDATA;\n{data}ENDSEC;\nEND-ISO-10303-21;\n"
        )
    }

    /// Product chain for `name` owning brep `base + 6` through an ABSR.
    fn part(base: u64, name: &str) -> String {
        format!(
            "#{p} = PRODUCT('{name}','{name}','',(#1));\n\
             #{f} = PRODUCT_DEFINITION_FORMATION('','',#{p});\n\
             #{d} = PRODUCT_DEFINITION('design','',#{f},#2);\n\
             #{s} = PRODUCT_DEFINITION_SHAPE('','',#{d});\n\
             #{sdr} = SHAPE_DEFINITION_REPRESENTATION(#{s},#{r});\n\
             #{r} = ADVANCED_BREP_SHAPE_REPRESENTATION('',(#{b},#3),#4);\n\
             #{b} = MANIFOLD_SOLID_BREP('',#5);\n",
            p = base,
            f = base + 1,
            d = base + 2,
            s = base + 3,
            sdr = base + 4,
            r = base + 5,
            b = base + 6,
        )
    }

    /// Style chain ending in `colour`, with the assignment at `base + 6`.
    fn style(base: u64, colour: &str) -> String {
        format!(
            "#{c} = {colour};\n\
             #{fasc} = FILL_AREA_STYLE_COLOUR('',#{c});\n\
             #{fas} = FILL_AREA_STYLE('',(#{fasc}));\n\
             #{ssfa} = SURFACE_STYLE_FILL_AREA(#{fas});\n\
             #{sss} = SURFACE_SIDE_STYLE('',(#{ssfa}));\n\
             #{ssu} = SURFACE_STYLE_USAGE(.BOTH.,#{sss});\n\
             #{psa} = PRESENTATION_STYLE_ASSIGNMENT((#{ssu}));\n",
            c = base,
            fasc = base + 1,
            fas = base + 2,
            ssfa = base + 3,
            sss = base + 4,
            ssu = base + 5,
            psa = base + 6,
        )
    }

    #[test]
    fn test_base_and_lid() {
        let data = step(&format!(
            "{}{}{}{}#300 = STYLED_ITEM('color',(#206),#106);\n#301 = STYLED_ITEM('color',(#216),#126);\n",
            part(100, "Base"),
            part(120, "Lid"),
            style(200, "COLOUR_RGB('',1.,0.,0.)"),
            style(210, "COLOUR_RGB('blue',0.,0.,1.)"),
        ));
        let result = extract_colors(data.as_bytes()).unwrap();
        assert_eq!(result.colors.len(), 2);

        let base = result.colors.get("Base").unwrap();
        assert_eq!(base.color, Rgb::new(1.0, 0.0, 0.0));
        assert_eq!(base.color_name, "");
        let lid = result.colors.get("Lid").unwrap();
        assert_eq!(lid.color, Rgb::new(0.0, 0.0, 1.0));
        assert_eq!(lid.color_name, "blue");

        let doc = result.colors.to_document();
        assert_eq!(doc.objects["Base"], "color_1.000_0.000_0.000");
        assert_eq!(doc.objects["Lid"], "blue");
        assert_eq!(result.stats.resolved, 2);
    }

    #[test]
    fn test_deeply_nested_record_skipped() {
        let data = step(&format!(
            "{}{}#91 = STYLED_ITEM('',{};\n#300 = STYLED_ITEM('',(#206),#106);\n",
            part(100, "Base"),
            style(200, "COLOUR_RGB('red',1.,0.,0.)"),
            "(".repeat(20_000),
        ));
        let result = extract_colors(data.as_bytes()).unwrap();
        assert_eq!(result.stats.skipped_records, 1);
        assert_eq!(result.colors.get("Base").unwrap().color_name, "red");
    }

    #[test]
    fn test_originating_system() {
        let data = step(&format!(
            "{}{}#300 = STYLED_ITEM('',(#206),#106);\n",
            part(100, "Base"),
            style(200, "COLOUR_RGB('red',1.,0.,0.)"),
        ))
        .replace("'','','');", "'','FreeCAD 0.21','');");
        let result = extract_colors(data.as_bytes()).unwrap();
        assert_eq!(result.originating_system.as_deref(), Some("FreeCAD 0.21"));
        assert_eq!(extract_colors(step("").as_bytes()).unwrap().originating_system, None);
    }

    #[test]
    fn test_fan_in_shared_colour() {
        let data = step(&format!(
            "{}{}{}{}\
             #300 = STYLED_ITEM('',(#206),#106);\n\
             #301 = STYLED_ITEM('',(#206),#126);\n\
             #302 = OVER_RIDING_STYLED_ITEM('',(#206),#146,#300);\n",
            part(100, "A"),
            part(120, "B"),
            part(140, "C"),
            style(200, "COLOUR_RGB('steel',0.5,0.5,0.5)"),
        ));
        let result = extract_colors(data.as_bytes()).unwrap();
        let names: Vec<_> = result.colors.iter().map(|e| e.part_name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert!(result.colors.iter().all(|e| e.color_name == "steel"));
        approx::assert_relative_eq!(result.colors.get("C").unwrap().color.g, 0.5);
    }

    #[test]
    fn test_last_write_wins() {
        let data = step(&format!(
            "{}{}{}#300 = STYLED_ITEM('',(#206),#106);\n#301 = STYLED_ITEM('',(#216),#106);\n",
            part(100, "Base"),
            style(200, "COLOUR_RGB('red',1.,0.,0.)"),
            style(210, "COLOUR_RGB('green',0.,1.,0.)"),
        ));
        let result = extract_colors(data.as_bytes()).unwrap();
        assert_eq!(result.colors.len(), 1);
        assert_eq!(result.colors.get("Base").unwrap().color_name, "green");
    }

    #[test]
    fn test_predefined_colour() {
        let data = step(&format!(
            "{}{}#300 = STYLED_ITEM('',(#206),#106);\n",
            part(100, "Knob"),
            style(200, "DRAUGHTING_PRE_DEFINED_COLOUR('yellow')"),
        ));
        let result = extract_colors(data.as_bytes()).unwrap();
        let knob = result.colors.get("Knob").unwrap();
        assert_eq!(knob.color, Rgb::new(1.0, 1.0, 0.0));
        assert_eq!(knob.color_name, "yellow");
    }

    #[test]
    fn test_relationship_fallback() {
        let data = step(&format!(
            "{}\
             #40 = PRODUCT('Cover','Cover','',(#1));\n\
             #41 = PRODUCT_DEFINITION_FORMATION_WITH_SPECIFIED_SOURCE('','',#40,.NOT_KNOWN.);\n\
             #42 = PRODUCT_DEFINITION('design','',#41,#2);\n\
             #43 = PRODUCT_DEFINITION_SHAPE('','',#42);\n\
             #44 = SHAPE_DEFINITION_REPRESENTATION(#43,#45);\n\
             #45 = SHAPE_REPRESENTATION('',(#7),#4);\n\
             #46 = ADVANCED_BREP_SHAPE_REPRESENTATION('',(#47),#4);\n\
             #47 = MANIFOLD_SOLID_BREP('',#5);\n\
             #48 = (REPRESENTATION_RELATIONSHIP('','',#46,#45)\n\
                    REPRESENTATION_RELATIONSHIP_WITH_TRANSFORMATION(#9)\n\
                    SHAPE_REPRESENTATION_RELATIONSHIP());\n\
             #49 = STYLED_ITEM('',(#206),#47);\n",
            style(200, "COLOUR_RGB('red',1.,0.,0.)"),
        ));
        let result = extract_colors(data.as_bytes()).unwrap();
        assert!(result.colors.get("Cover").is_some());
    }

    #[test]
    fn test_mapped_item_fallback_and_id_name() {
        let data = step(&format!(
            "{}\
             #50 = PRODUCT('Bolt','','',(#1));\n\
             #51 = PRODUCT_DEFINITION_FORMATION('','',#50);\n\
             #52 = PRODUCT_DEFINITION('bolt_def','',#51,#2);\n\
             #53 = PRODUCT_DEFINITION_SHAPE('','',#52);\n\
             #54 = SHAPE_DEFINITION_REPRESENTATION(#53,#55);\n\
             #55 = SHAPE_REPRESENTATION('',(#58),#4);\n\
             #56 = ADVANCED_BREP_SHAPE_REPRESENTATION('',(#59),#4);\n\
             #57 = REPRESENTATION_MAP(#6,#56);\n\
             #58 = MAPPED_ITEM('',#57,#6);\n\
             #59 = MANIFOLD_SOLID_BREP('',#5);\n\
             #60 = STYLED_ITEM('',(#206),#59);\n",
            style(200, "COLOUR_RGB('red',1.,0.,0.)"),
        ));
        let result = extract_colors(data.as_bytes()).unwrap();
        assert!(result.colors.get("Bolt").is_some());
    }

    #[test]
    fn test_cycles_and_dangling_refs_are_ignored() {
        let data = step(&format!(
            "{}{}\
             #300 = STYLED_ITEM('',(#206),#106);\n\
             #80 = PRESENTATION_STYLE_ASSIGNMENT((#81));\n\
             #81 = SURFACE_STYLE_USAGE(.BOTH.,#80);\n\
             #82 = STYLED_ITEM('',(#80),#106);\n\
             #83 = STYLED_ITEM('',(#206),#999);\n",
            part(100, "Base"),
            style(200, "COLOUR_RGB('red',1.,0.,0.)"),
        ));
        let result = extract_colors(data.as_bytes()).unwrap();
        assert_eq!(result.colors.get("Base").unwrap().color_name, "red");
        assert_eq!(
            result.stats,
            ExtractionStats {
                skipped_records: 0,
                styled_items: 3,
                resolved: 1,
                missing_color: 1,
                missing_part: 1,
            }
        );
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let data = step(&format!(
            "{}{}\
             #90 = COLOUR_RGB('x',1.0,,);\n\
             #91 = STYLED_ITEM('',(#206),#106;\n\
             #300 = STYLED_ITEM('',(#206),#106);\n",
            part(100, "Base"),
            style(200, "COLOUR_RGB('red',1.,0.,0.)"),
        ));
        let result = extract_colors(data.as_bytes()).unwrap();
        assert_eq!(result.colors.len(), 1);
        assert_eq!(result.stats.skipped_records, 2);
    }

    #[test]
    fn test_not_step_is_fatal() {
        assert!(matches!(extract_colors(b"{\"asset\":{}}"), Err(StepError::MissingSignature)));
    }

    #[test]
    fn test_extract_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("part.stp");
        let data = step(&format!(
            "{}{}#300 = STYLED_ITEM('',(#206),#106);\n",
            part(100, "Base"),
            style(200, "COLOUR_RGB('red',1.,0.,0.)"),
        ));
        std::fs::write(&path, data).unwrap();
        let result = extract_colors_from_file(&path).unwrap();
        assert_eq!(result.colors.len(), 1);
    }
}
