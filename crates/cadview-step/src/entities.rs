//! Typed view of the STEP entities involved in part coloring.
//!
//! Each relevant record is classified once into an [`Entity`] variant holding
//! only the numeric references and values needed to walk from a styled item to
//! its color and to its product name. Everything else is dropped.

use indexmap::IndexMap;

use cadview_ir::Rgb;

use crate::parser::{StepEntity, StepFile, StepRecord, StepValue};
use crate::reader::RecordKind;

/// Entity types that carry a style chain down to a colour.
const STYLE_LINK_TYPES: &[&str] = &[
    "PRESENTATION_STYLE_ASSIGNMENT",
    "PRESENTATION_STYLE_BY_CONTEXT",
    "SURFACE_STYLE_USAGE",
    "SURFACE_SIDE_STYLE",
    "SURFACE_STYLE_FILL_AREA",
    "FILL_AREA_STYLE",
    "FILL_AREA_STYLE_COLOUR",
    "SURFACE_STYLE_RENDERING",
    "SURFACE_STYLE_RENDERING_WITH_PROPERTIES",
    "CURVE_STYLE",
];

/// Shape representation types whose item lists hold geometry.
const SHAPE_REPRESENTATION_TYPES: &[&str] = &[
    "ADVANCED_BREP_SHAPE_REPRESENTATION",
    "SHAPE_REPRESENTATION",
    "MANIFOLD_SURFACE_SHAPE_REPRESENTATION",
    "FACETED_BREP_SHAPE_REPRESENTATION",
    "GEOMETRICALLY_BOUNDED_SURFACE_SHAPE_REPRESENTATION",
    "GEOMETRICALLY_BOUNDED_WIREFRAME_SHAPE_REPRESENTATION",
    "TESSELLATED_SHAPE_REPRESENTATION",
];

const OTHER_TYPES: &[&str] = &[
    "STYLED_ITEM",
    "OVER_RIDING_STYLED_ITEM",
    "COLOUR_RGB",
    "DRAUGHTING_PRE_DEFINED_COLOUR",
    "SHAPE_DEFINITION_REPRESENTATION",
    "PRODUCT_DEFINITION_SHAPE",
    "PRODUCT_DEFINITION",
    "PRODUCT_DEFINITION_FORMATION",
    "PRODUCT_DEFINITION_FORMATION_WITH_SPECIFIED_SOURCE",
    "PRODUCT",
    "SHAPE_REPRESENTATION_RELATIONSHIP",
    "REPRESENTATION_RELATIONSHIP",
    "REPRESENTATION_MAP",
    "MAPPED_ITEM",
];

/// Whether a raw record may classify into an [`Entity`].
///
/// Complex instances are always kept: their parts are only known after
/// parsing.
pub fn is_relevant(kind: RecordKind<'_>) -> bool {
    match kind {
        RecordKind::Complex => true,
        RecordKind::Simple(name) => {
            let upper = name.to_ascii_uppercase();
            let upper = upper.as_str();
            STYLE_LINK_TYPES.contains(&upper)
                || SHAPE_REPRESENTATION_TYPES.contains(&upper)
                || OTHER_TYPES.contains(&upper)
        }
    }
}

/// A classified entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    /// `STYLED_ITEM` / `OVER_RIDING_STYLED_ITEM`: styles applied to a geometry item.
    StyledItem {
        /// Presentation style assignments.
        styles: Vec<u64>,
        /// The styled geometry item.
        item: u64,
    },
    /// An intermediate style entity; references are followed in order.
    StyleLink {
        /// Every reference in the arguments.
        refs: Vec<u64>,
    },
    /// `COLOUR_RGB`.
    ColourRgb {
        /// Colour name (often empty).
        name: String,
        /// The color.
        rgb: Rgb,
    },
    /// `DRAUGHTING_PRE_DEFINED_COLOUR`.
    PredefinedColour {
        /// Colour name, lowercase.
        name: String,
    },
    /// A shape representation and its items.
    ShapeRepresentation {
        /// Geometry items (the context reference is excluded).
        items: Vec<u64>,
        /// True for `ADVANCED_BREP_SHAPE_REPRESENTATION`.
        advanced_brep: bool,
    },
    /// `SHAPE_DEFINITION_REPRESENTATION`.
    ShapeDefinitionRepresentation {
        /// The product definition shape.
        definition: u64,
        /// The used representation.
        representation: u64,
    },
    /// `PRODUCT_DEFINITION_SHAPE`.
    ProductDefinitionShape {
        /// The product definition.
        definition: u64,
    },
    /// `PRODUCT_DEFINITION`.
    ProductDefinition {
        /// The `id` attribute.
        id: String,
        /// The formation.
        formation: Option<u64>,
    },
    /// `PRODUCT_DEFINITION_FORMATION` (with or without specified source).
    ProductDefinitionFormation {
        /// The product.
        product: u64,
    },
    /// `PRODUCT`.
    Product {
        /// The `id` attribute.
        id: String,
        /// The `name` attribute.
        name: String,
    },
    /// `(SHAPE_)REPRESENTATION_RELATIONSHIP`, simple or in a complex instance.
    RepresentationRelationship {
        /// First representation.
        rep_1: u64,
        /// Second representation.
        rep_2: u64,
    },
    /// `REPRESENTATION_MAP`.
    RepresentationMap {
        /// The mapped representation.
        mapped_representation: u64,
    },
    /// `MAPPED_ITEM`.
    MappedItem {
        /// The representation map used as source.
        source: u64,
    },
}

fn string_arg(e: &StepEntity, i: usize) -> Option<String> {
    e.arg(i).and_then(StepValue::as_string).map(str::to_string)
}

fn ref_arg(e: &StepEntity, i: usize) -> Option<u64> {
    e.arg(i).and_then(StepValue::as_entity_ref)
}

fn list_refs(e: &StepEntity, i: usize) -> Vec<u64> {
    let mut out = Vec::new();
    if let Some(v) = e.arg(i) {
        v.collect_refs(&mut out);
    }
    out
}

/// Classify one simple entity (or one part of a complex instance).
///
/// Returns `None` for irrelevant types and for records missing required
/// attributes.
pub fn classify(e: &StepEntity) -> Option<Entity> {
    let t = e.type_name.as_str();
    if STYLE_LINK_TYPES.contains(&t) {
        let refs = e.refs();
        return (!refs.is_empty()).then_some(Entity::StyleLink { refs });
    }
    if SHAPE_REPRESENTATION_TYPES.contains(&t) {
        return Some(Entity::ShapeRepresentation {
            items: list_refs(e, 1),
            advanced_brep: t == "ADVANCED_BREP_SHAPE_REPRESENTATION",
        });
    }
    match t {
        "STYLED_ITEM" | "OVER_RIDING_STYLED_ITEM" => Some(Entity::StyledItem {
            styles: list_refs(e, 1),
            item: ref_arg(e, 2)?,
        }),
        "COLOUR_RGB" => {
            let r = e.arg(1)?.as_real()?;
            let g = e.arg(2)?.as_real()?;
            let b = e.arg(3)?.as_real()?;
            Some(Entity::ColourRgb {
                name: string_arg(e, 0).unwrap_or_default(),
                rgb: Rgb::new(r as f32, g as f32, b as f32),
            })
        }
        "DRAUGHTING_PRE_DEFINED_COLOUR" => Some(Entity::PredefinedColour {
            name: string_arg(e, 0)?.to_lowercase(),
        }),
        "SHAPE_DEFINITION_REPRESENTATION" => Some(Entity::ShapeDefinitionRepresentation {
            definition: ref_arg(e, 0)?,
            representation: ref_arg(e, 1)?,
        }),
        "PRODUCT_DEFINITION_SHAPE" => Some(Entity::ProductDefinitionShape {
            definition: ref_arg(e, 2)?,
        }),
        "PRODUCT_DEFINITION" => Some(Entity::ProductDefinition {
            id: string_arg(e, 0).unwrap_or_default(),
            formation: ref_arg(e, 2),
        }),
        "PRODUCT_DEFINITION_FORMATION" | "PRODUCT_DEFINITION_FORMATION_WITH_SPECIFIED_SOURCE" => {
            Some(Entity::ProductDefinitionFormation {
                product: ref_arg(e, 2)?,
            })
        }
        "PRODUCT" => Some(Entity::Product {
            id: string_arg(e, 0).unwrap_or_default(),
            name: string_arg(e, 1).unwrap_or_default(),
        }),
        "SHAPE_REPRESENTATION_RELATIONSHIP" | "REPRESENTATION_RELATIONSHIP" => {
            Some(Entity::RepresentationRelationship {
                rep_1: ref_arg(e, 2)?,
                rep_2: ref_arg(e, 3)?,
            })
        }
        "REPRESENTATION_MAP" => Some(Entity::RepresentationMap {
            mapped_representation: ref_arg(e, 1)?,
        }),
        "MAPPED_ITEM" => Some(Entity::MappedItem {
            source: ref_arg(e, 1)?,
        }),
        _ => None,
    }
}

/// Classify a record; for complex instances the first classifiable part wins.
pub fn classify_record(record: &StepRecord) -> Option<Entity> {
    record.parts().iter().find_map(classify)
}

/// Id → [`Entity`] index in file order.
#[derive(Debug, Clone, Default)]
pub struct EntityIndex {
    entities: IndexMap<u64, Entity>,
}

impl EntityIndex {
    /// Classify every record of a parsed file.
    pub fn from_file(file: &StepFile) -> Self {
        let entities = file
            .records
            .values()
            .filter_map(|r| classify_record(r).map(|e| (r.id(), e)))
            .collect();
        Self { entities }
    }

    /// Entity by id.
    pub fn get(&self, id: u64) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Number of classified entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True if nothing was classified.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// All entities in file order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &Entity)> {
        self.entities.iter().map(|(id, e)| (*id, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn classify_text(text: &str) -> Option<Entity> {
        classify_record(&Parser::parse_record(text.as_bytes(), 1).unwrap())
    }

    #[test]
    fn test_relevance_filter() {
        assert!(is_relevant(RecordKind::Simple("STYLED_ITEM")));
        assert!(is_relevant(RecordKind::Simple("colour_rgb")));
        assert!(is_relevant(RecordKind::Complex));
        assert!(!is_relevant(RecordKind::Simple("CARTESIAN_POINT")));
    }

    #[test]
    fn test_classify_styles_and_colours() {
        assert_eq!(
            classify_text("#1 = STYLED_ITEM('color',(#2),#3)"),
            Some(Entity::StyledItem { styles: vec![2], item: 3 })
        );
        assert_eq!(
            classify_text("#1 = SURFACE_STYLE_USAGE(.BOTH.,#4)"),
            Some(Entity::StyleLink { refs: vec![4] })
        );
        assert_eq!(
            classify_text("#1 = COLOUR_RGB('',1,0.5,0.)"),
            Some(Entity::ColourRgb {
                name: String::new(),
                rgb: Rgb::new(1.0, 0.5, 0.0)
            })
        );
        assert_eq!(
            classify_text("#1 = DRAUGHTING_PRE_DEFINED_COLOUR('Red')"),
            Some(Entity::PredefinedColour { name: "red".into() })
        );
    }

    #[test]
    fn test_classify_product_chain() {
        assert_eq!(
            classify_text("#1 = ADVANCED_BREP_SHAPE_REPRESENTATION('',(#2,#3),#9)"),
            Some(Entity::ShapeRepresentation { items: vec![2, 3], advanced_brep: true })
        );
        assert_eq!(
            classify_text("#1 = PRODUCT_DEFINITION('design','',#2,#3)"),
            Some(Entity::ProductDefinition { id: "design".into(), formation: Some(2) })
        );
        assert_eq!(
            classify_text("#1 = PRODUCT('Base','Base','',(#4))"),
            Some(Entity::Product { id: "Base".into(), name: "Base".into() })
        );
    }

    #[test]
    fn test_classify_complex_relationship() {
        let e = classify_text(
            "#1 = (REPRESENTATION_RELATIONSHIP('','',#5,#6) \
             REPRESENTATION_RELATIONSHIP_WITH_TRANSFORMATION(#7) \
             SHAPE_REPRESENTATION_RELATIONSHIP())",
        );
        assert_eq!(e, Some(Entity::RepresentationRelationship { rep_1: 5, rep_2: 6 }));
    }

    #[test]
    fn test_incomplete_records_not_classified() {
        assert_eq!(classify_text("#1 = STYLED_ITEM('',(#2),$)"), None);
        assert_eq!(classify_text("#1 = COLOUR_RGB('',1.0,$,0.0)"), None);
        assert_eq!(classify_text("#1 = CARTESIAN_POINT('',(0.,0.,0.))"), None);
    }
}
