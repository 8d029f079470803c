// Reading the sections from a GeoJSON feature collection.

use geojson::{GeoJson, JsonObject, Value};
use snafu::prelude::*;

use crate::elsec::config_reader::SectionSource;
use crate::elsec::*;

fn to_point(position: &[f64]) -> Point {
    match position {
        [lon, lat, ..] => Point::new(*lon, *lat),
        // Kept as a non-finite point: the geometry is reported as invalid later.
        _ => Point::new(f64::NAN, f64::NAN),
    }
}

// The rings are closed if the file does not repeat the first position.
fn to_ring(positions: &[Vec<f64>]) -> Ring {
    let mut ring: Ring = positions.iter().map(|p| to_point(p)).collect();
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
        if first != last {
            ring.push(first);
        }
    }
    ring
}

fn to_polygon(rings: &[Vec<Vec<f64>>]) -> Vec<Ring> {
    rings.iter().map(|r| to_ring(r)).collect()
}

fn to_geometry(value: &Value) -> Option<Geometry> {
    match value {
        Value::Polygon(rings) => Some(Geometry::Polygon(to_polygon(rings))),
        Value::MultiPolygon(polygons) => Some(Geometry::MultiPolygon(
            polygons.iter().map(|p| to_polygon(p)).collect(),
        )),
        _ => None,
    }
}

fn read_id(props: &JsonObject, key: &str) -> Option<u32> {
    match props.get(key) {
        Some(JSValue::Number(n)) => n.as_u64().and_then(|x| u32::try_from(x).ok()),
        Some(JSValue::String(s)) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

fn read_count(value: &JSValue) -> Option<u64> {
    match value {
        JSValue::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|x| *x >= 0.0 && x.fract() == 0.0)
                .map(|x| x as u64)
        }),
        JSValue::String(s) if !s.trim().is_empty() => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// The vote columns carried by the properties of a section.
///
/// Every property that reads as a count is a column, except the identifiers.
fn read_metadata(props: &JsonObject, source: &SectionSource) -> VoteColumns {
    let skipped = [
        source.id_property(),
        source.district_property(),
        source.municipality_property(),
    ];
    props
        .iter()
        .filter(|(k, _)| !skipped.contains(&k.as_str()))
        .filter_map(|(k, v)| read_count(v).map(|c| (k.clone(), c)))
        .collect()
}

pub fn read_sections(path: &str, source: &SectionSource) -> ElsecResult<Vec<Section>> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let geojson = contents
        .parse::<GeoJson>()
        .context(ParsingGeoJsonSnafu { path })?;
    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return NotAFeatureCollectionSnafu { path }.fail(),
    };

    let empty = JsonObject::new();
    let mut res: Vec<Section> = Vec::new();
    for (index, feature) in collection.features.iter().enumerate() {
        let props = feature.properties.as_ref().unwrap_or(&empty);
        let id = read_id(props, source.id_property()).context(MissingPropertySnafu {
            path,
            index,
            property: source.id_property(),
        })?;
        let district_id =
            read_id(props, source.district_property()).context(MissingPropertySnafu {
                path,
                index,
                property: source.district_property(),
            })?;
        let municipality = match props.get(source.municipality_property()) {
            Some(JSValue::String(s)) => s.clone(),
            Some(JSValue::Number(n)) => n.to_string(),
            _ => String::new(),
        };

        let geometry = feature.geometry.as_ref().and_then(|g| to_geometry(&g.value));
        if geometry.is_none() {
            warn!(
                "read_sections: {}: section {} has no polygon, no record can be located in it",
                path, id
            );
        }

        res.push(Section {
            id,
            district_id,
            municipality,
            geometry,
            metadata: read_metadata(props, source),
        });
    }
    info!("read_sections: {} sections from {}", res.len(), path);
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_sections() {
        let path = format!("{}/grid_example/sections.geojson", test_data_dir());
        let sections = read_sections(&path, &SectionSource::new("sections.geojson")).unwrap();
        assert_eq!(sections.len(), 5);

        let s1 = &sections[0];
        assert_eq!(s1.id, 1);
        assert_eq!(s1.district_id, 10);
        assert_eq!(s1.municipality, "Centro");
        match &s1.geometry {
            Some(Geometry::Polygon(rings)) => {
                assert_eq!(rings[0].len(), 5);
                assert_eq!(rings[0][0], rings[0][4]);
            }
            g => panic!("unexpected geometry {:?}", g),
        }

        assert!(matches!(
            &sections[2].geometry,
            Some(Geometry::MultiPolygon(ps)) if ps.len() == 2
        ));
        assert_eq!(sections[4].geometry, None);
    }

    #[test]
    fn metadata_and_string_ids() {
        let path = format!("{}/metadata_example/sections.geojson", test_data_dir());
        let mut source = SectionSource::new("sections.geojson");
        source.id_property = Some("SECCION".to_string());
        source.district_property = Some("DISTRITO".to_string());
        let sections = read_sections(&path, &source).unwrap();
        assert_eq!(sections[0].id, 101);
        assert_eq!(sections[0].district_id, 3);
        assert_eq!(sections[0].metadata.get("PAN"), 120);
        assert_eq!(sections[0].metadata.get("TOTAL_VOTES"), 260);
        assert!(!sections[0].metadata.contains("SECCION"));
        assert!(!sections[0].metadata.contains("NOMBRE"));
    }

    #[test]
    fn short_positions() {
        let ring = to_ring(&[vec![0.0, 0.0], vec![1.0], vec![1.0, 1.0]]);
        assert_eq!(ring.len(), 4);
        assert!(!ring[1].is_finite());
    }
}
