use crate::error::Converter;
use crate::record::{integer_bit_width, Record, RecordDataType, RecordName};
use crate::{Error, Result};
use roxmltree::{Document, Node};
use tracing::debug;

/// Point set descriptors extracted from the XML section of an E57 file.
///
/// Produced once when the file is opened and read-only afterwards.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    /// All point sets of the file, in document order.
    pub point_sets: Vec<PointSet>,
}

/// Descriptor of one compressed vector of point records.
#[derive(Clone, Debug)]
pub struct PointSet {
    /// Physical file offset of the compressed vector section header.
    pub file_offset: u64,

    /// Number of point records in the section.
    pub record_count: u64,

    /// One component per byte stream, in stream order.
    pub components: Vec<Record>,
}

impl Schema {
    /// Parses the XML descriptor of an E57 file.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).xml_err("Failed to parse XML data")?;
        let data3d = document
            .descendants()
            .find(|n| n.has_tag_name("data3D"))
            .xml_err("Cannot find 'data3D' tag in XML document")?;

        let mut point_sets = Vec::new();
        for node in data3d.children() {
            if node.has_tag_name("vectorChild") && node.attribute("type") == Some("Structure") {
                point_sets.push(point_set_from_node(&node)?);
            }
        }

        debug!(point_sets = point_sets.len(), "parsed XML schema");
        Ok(Self { point_sets })
    }
}

fn point_set_from_node(node: &Node) -> Result<PointSet> {
    let points = node
        .children()
        .find(|n| n.has_tag_name("points") && n.attribute("type") == Some("CompressedVector"))
        .xml_err("Cannot find 'points' tag inside 'vectorChild'")?;
    let file_offset = points
        .attribute("fileOffset")
        .xml_err("Cannot find 'fileOffset' attribute in 'points' tag")?
        .parse::<u64>()
        .attr_err("Cannot parse 'fileOffset' attribute value as u64")?;
    let record_count = points
        .attribute("recordCount")
        .xml_err("Cannot find 'recordCount' attribute in 'points' tag")?
        .parse::<u64>()
        .attr_err("Cannot parse 'recordCount' attribute value as u64")?;

    let prototype = points
        .children()
        .find(|n| n.has_tag_name("prototype") && n.attribute("type") == Some("Structure"))
        .xml_err("Cannot find 'prototype' child in 'points' tag")?;
    let mut components = Vec::new();
    for n in prototype.children() {
        if !n.is_element() {
            continue;
        }
        let name = RecordName::from_tag_name(n.tag_name().name())?;
        let data_type = data_type_from_node(&n)?;
        components.push(Record { name, data_type });
    }

    debug!(
        file_offset,
        record_count,
        components = components.len(),
        "parsed point set"
    );
    Ok(PointSet {
        file_offset,
        record_count,
        components,
    })
}

fn data_type_from_node(node: &Node) -> Result<RecordDataType> {
    let tag = node.tag_name().name();
    let type_string = node
        .attribute("type")
        .xml_err(format!("Missing 'type' attribute for prototype tag '{tag}'"))?;
    Ok(match type_string {
        "Float" => {
            let min = opt_f64(node, "minimum")?.unwrap_or(f64::MIN);
            let max = opt_f64(node, "maximum")?.unwrap_or(f64::MAX);
            match node.attribute("precision") {
                None | Some("double") => RecordDataType::Double { min, max },
                Some("single") => RecordDataType::Single { min, max },
                Some(precision) => {
                    return Err(Error::UnknownAttribute {
                        reason: format!(
                            "Precision '{precision}' of prototype tag '{tag}' is unknown"
                        ),
                    })
                }
            }
        }
        "Integer" => {
            let (min, max) = integer_bounds(node)?;
            let bit_width = integer_bit_width(min, max)?;
            RecordDataType::Integer {
                min,
                max,
                bit_width,
            }
        }
        "ScaledInteger" => {
            let (min, max) = integer_bounds(node)?;
            let bit_width = integer_bit_width(min, max)?;
            let scale = opt_f64(node, "scale")?.unwrap_or(1.0);
            let offset = opt_f64(node, "offset")?.unwrap_or(0.0);
            RecordDataType::ScaledInteger {
                min,
                max,
                scale,
                offset,
                bit_width,
            }
        }
        _ => {
            return Err(Error::BadComponentType {
                reason: format!("Unknown type '{type_string}' of prototype tag '{tag}'"),
            })
        }
    })
}

fn integer_bounds(node: &Node) -> Result<(i64, i64)> {
    let min = opt_i64(node, "minimum")?.unwrap_or(0);
    let max = opt_i64(node, "maximum")?.unwrap_or(0);
    Ok((min, max))
}

fn opt_f64(node: &Node, name: &str) -> Result<Option<f64>> {
    node.attribute(name)
        .map(|value| {
            value
                .parse::<f64>()
                .attr_err(format!("Cannot parse '{name}' attribute value as f64"))
        })
        .transpose()
}

fn opt_i64(node: &Node, name: &str) -> Result<Option<i64>> {
    node.attribute(name)
        .map(|value| {
            value
                .parse::<i64>()
                .attr_err(format!("Cannot parse '{name}' attribute value as i64"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(prototype: &str) -> String {
        format!(
            "<e57Root type=\"Structure\">\
             <data3D type=\"Vector\">\
             <vectorChild type=\"Structure\">\
             <points type=\"CompressedVector\" fileOffset=\"48\" recordCount=\"10\">\
             <prototype type=\"Structure\">{prototype}</prototype>\
             </points>\
             </vectorChild>\
             </data3D>\
             </e57Root>"
        )
    }

    #[test]
    fn parses_a_cartesian_prototype() {
        let xml = wrap(
            "<cartesianX type=\"ScaledInteger\" minimum=\"-1000\" maximum=\"1000\" \
             scale=\"0.001\" offset=\"0\"/>\
             <cartesianY type=\"Float\" precision=\"single\" minimum=\"0\" maximum=\"1\"/>\
             <cartesianZ type=\"Float\"/>\
             <cartesianInvalidState type=\"Integer\" minimum=\"0\" maximum=\"2\"/>",
        );
        let schema = Schema::from_xml(&xml).unwrap();
        assert_eq!(schema.point_sets.len(), 1);

        let point_set = &schema.point_sets[0];
        assert_eq!(point_set.file_offset, 48);
        assert_eq!(point_set.record_count, 10);
        assert_eq!(point_set.components.len(), 4);
        assert_eq!(point_set.components[0].name, RecordName::CartesianX);
        assert_eq!(
            point_set.components[0].data_type,
            RecordDataType::ScaledInteger {
                min: -1000,
                max: 1000,
                scale: 0.001,
                offset: 0.0,
                bit_width: 11,
            }
        );
        assert!(matches!(
            point_set.components[1].data_type,
            RecordDataType::Single { .. }
        ));
        assert!(matches!(
            point_set.components[2].data_type,
            RecordDataType::Double { .. }
        ));
        assert_eq!(
            point_set.components[3].data_type,
            RecordDataType::Integer {
                min: 0,
                max: 2,
                bit_width: 2,
            }
        );
    }

    #[test]
    fn integer_bounds_default_to_zero() {
        let xml = wrap("<rowIndex type=\"Integer\"/>");
        let schema = Schema::from_xml(&xml).unwrap();
        assert_eq!(
            schema.point_sets[0].components[0].data_type,
            RecordDataType::Integer {
                min: 0,
                max: 0,
                bit_width: 0,
            }
        );
    }

    #[test]
    fn rejects_unknown_precisions() {
        for precision in ["singe", "half", ""] {
            let xml = wrap(&format!(
                "<cartesianX type=\"Float\" precision=\"{precision}\"/>"
            ));
            assert!(matches!(
                Schema::from_xml(&xml),
                Err(Error::UnknownAttribute { .. })
            ));
        }
    }

    #[test]
    fn rejects_unknown_types_and_tags() {
        let xml = wrap("<cartesianX type=\"Complex\"/>");
        assert!(matches!(
            Schema::from_xml(&xml),
            Err(Error::BadComponentType { .. })
        ));

        let xml = wrap("<cartesianW type=\"Float\"/>");
        assert!(matches!(
            Schema::from_xml(&xml),
            Err(Error::BadComponentType { .. })
        ));
    }

    #[test]
    fn rejects_malformed_attributes() {
        let xml = wrap("<cartesianX type=\"Integer\" minimum=\"abc\"/>");
        assert!(matches!(
            Schema::from_xml(&xml),
            Err(Error::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn rejects_documents_without_point_data() {
        assert!(matches!(
            Schema::from_xml("<e57Root type=\"Structure\"/>"),
            Err(Error::InvalidXml { .. })
        ));
        assert!(matches!(
            Schema::from_xml("not xml at all"),
            Err(Error::InvalidXml { .. })
        ));
    }
}
