//! Geo operands → `$near`, `$geoWithin` and `$geoIntersects` filters.
//!
//! Operands arrive as JSON documents. Shapes:
//! - near: `{center: {x, y}, maxDistance?, minDistance?, spherical?}`
//! - circle: `{center: {x, y}, radius}`
//! - box: `{p1: {x, y}, p2: {x, y}}`
//! - polygon: `[[x, y], ...]` or `[{x, y}, ...]`, at least 3 points
//! - geometry: GeoJSON `{type, coordinates}` or `{type: "GeometryCollection", geometries}`
//!
//! An operand whose keys are all `$` operators is used verbatim.

use super::errors::PipelineGeneratorError;
use crate::operator::OperatorKind;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
enum Point {
    Pair([f64; 2]),
    Xy { x: f64, y: f64 },
}

impl Point {
    fn to_json(self) -> Value {
        match self {
            Point::Pair([x, y]) | Point::Xy { x, y } => json!([x, y]),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Near {
    center: Point,
    max_distance: Option<f64>,
    min_distance: Option<f64>,
    #[serde(default)]
    spherical: bool,
}

#[derive(Debug, Deserialize)]
struct Circle {
    center: Point,
    radius: f64,
}

#[derive(Debug, Deserialize)]
struct GeoBox {
    p1: Point,
    p2: Point,
}

const MIN_POLYGON_POINTS: usize = 3;

fn invalid(field: &str, reason: impl Into<String>) -> PipelineGeneratorError {
    PipelineGeneratorError::GeoOperand {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn parse<T: DeserializeOwned>(field: &str, operand: &Value) -> Result<T, PipelineGeneratorError> {
    serde_json::from_value(operand.clone()).map_err(|e| invalid(field, e.to_string()))
}

fn is_operator_document(operand: &Value) -> bool {
    match operand {
        Value::Object(map) => !map.is_empty() && map.keys().all(|k| k.starts_with('$')),
        _ => false,
    }
}

/// Filter document for a geo operator on `column`.
pub fn build_geo_filter(
    field: &str,
    column: &str,
    operator: OperatorKind,
    operand: &Value,
) -> Result<Value, PipelineGeneratorError> {
    if is_operator_document(operand) {
        return Ok(json!({ column: operand }));
    }

    let condition = match operator {
        OperatorKind::Near | OperatorKind::NearSphere => {
            let near: Near = parse(field, operand)?;
            let key = if operator == OperatorKind::NearSphere || near.spherical {
                "$nearSphere"
            } else {
                "$near"
            };
            let mut doc = serde_json::Map::new();
            doc.insert(key.to_string(), near.center.to_json());
            if let Some(max) = near.max_distance {
                doc.insert("$maxDistance".to_string(), json!(max));
            }
            if let Some(min) = near.min_distance {
                doc.insert("$minDistance".to_string(), json!(min));
            }
            Value::Object(doc)
        }
        OperatorKind::WithinCircle | OperatorKind::WithinSphere => {
            let circle: Circle = parse(field, operand)?;
            let key = if operator == OperatorKind::WithinSphere {
                "$centerSphere"
            } else {
                "$center"
            };
            json!({ "$geoWithin": { key: [circle.center.to_json(), circle.radius] } })
        }
        OperatorKind::WithinBox => {
            let geo_box: GeoBox = parse(field, operand)?;
            json!({ "$geoWithin": { "$box": [geo_box.p1.to_json(), geo_box.p2.to_json()] } })
        }
        OperatorKind::WithinPolygon => {
            let points: Vec<Point> = parse(field, operand)?;
            if points.len() < MIN_POLYGON_POINTS {
                return Err(invalid(field, "a polygon needs at least 3 points"));
            }
            let points: Vec<Value> = points.into_iter().map(Point::to_json).collect();
            json!({ "$geoWithin": { "$polygon": points } })
        }
        OperatorKind::GeoWithin => {
            json!({ "$geoWithin": { "$geometry": normalize_geometry(field, operand)? } })
        }
        OperatorKind::Intersects => {
            json!({ "$geoIntersects": { "$geometry": normalize_geometry(field, operand)? } })
        }
        other => {
            return Err(PipelineGeneratorError::UnsupportedOperand {
                field: field.to_string(),
                operator: other.to_string(),
            })
        }
    };
    Ok(json!({ column: condition }))
}

/// Canonical GeoJSON: short type aliases expanded, polygon rings closed.
fn normalize_geometry(field: &str, geometry: &Value) -> Result<Value, PipelineGeneratorError> {
    let map = geometry
        .as_object()
        .ok_or_else(|| invalid(field, "geometry must be a GeoJSON object"))?;
    let kind = map
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(field, "geometry has no `type`"))?;
    let kind = match kind {
        "Line" => "LineString",
        "MultiLine" => "MultiLineString",
        other => other,
    };

    if kind == "GeometryCollection" {
        let members = map
            .get("geometries")
            .and_then(Value::as_array)
            .ok_or_else(|| invalid(field, "GeometryCollection has no `geometries`"))?;
        let geometries = members
            .iter()
            .map(|g| normalize_geometry(field, g))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(json!({ "type": kind, "geometries": geometries }));
    }

    let coordinates = map
        .get("coordinates")
        .ok_or_else(|| invalid(field, format!("{} has no `coordinates`", kind)))?;
    let coordinates = match kind {
        "Polygon" => close_polygon(coordinates),
        "MultiPolygon" => match coordinates {
            Value::Array(polygons) => Value::Array(polygons.iter().map(close_polygon).collect()),
            other => other.clone(),
        },
        "Point" | "LineString" | "MultiPoint" | "MultiLineString" => coordinates.clone(),
        other => return Err(invalid(field, format!("unknown geometry type `{}`", other))),
    };
    Ok(json!({ "type": kind, "coordinates": coordinates }))
}

fn close_polygon(rings: &Value) -> Value {
    match rings {
        Value::Array(rings) => Value::Array(rings.iter().map(close_ring).collect()),
        other => other.clone(),
    }
}

fn close_ring(ring: &Value) -> Value {
    match ring {
        Value::Array(points) => {
            let mut points = points.clone();
            if let (Some(first), Some(last)) = (points.first(), points.last()) {
                if first != last {
                    points.push(first.clone());
                }
            }
            Value::Array(points)
        }
        other => other.clone(),
    }
}
