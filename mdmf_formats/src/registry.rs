//! Closed registry of the type names that may appear in `[Name] { .. }`
//! object literals and `[Name] [ .. ]` list literals.
//!
//! Each constructible type carries a table of field names and typed setters;
//! anything not listed here is rejected by the value parser.

use glam::Vec3;
use serde::Serialize;

use crate::autofield::Autofield;
use crate::level::{Sector, SectorBoundary, SectorTransform};
use crate::value::{Value, ValueKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum TypeName {
    Sector,
    SectorBoundary,
    SectorTransform,
    Vector3,
    Vector3Int,
    Quaternion,
    Autofield,
    Float,
    Int,
}

impl TypeName {
    pub const ALL: [TypeName; 9] = [
        TypeName::Sector,
        TypeName::SectorBoundary,
        TypeName::SectorTransform,
        TypeName::Vector3,
        TypeName::Vector3Int,
        TypeName::Quaternion,
        TypeName::Autofield,
        TypeName::Float,
        TypeName::Int,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TypeName::Sector => "Sector",
            TypeName::SectorBoundary => "SectorBoundary",
            TypeName::SectorTransform => "SectorTransform",
            TypeName::Vector3 => "Vector3",
            TypeName::Vector3Int => "Vector3Int",
            TypeName::Quaternion => "Quaternion",
            TypeName::Autofield => "Autofield",
            TypeName::Float => "float",
            TypeName::Int => "int",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.name() == name)
    }

    /// Types that can be built with the `[Name] { field: value }` form.
    pub fn is_object(self) -> bool {
        matches!(
            self,
            TypeName::Sector | TypeName::SectorBoundary | TypeName::SectorTransform
        )
    }

    /// Fit a parsed value to this type when it is used as a list element.
    /// Integral numbers are accepted where an `int` is expected.
    pub fn coerce(self, value: Value) -> Result<Value, Value> {
        match (self, value) {
            (TypeName::Sector, value @ Value::Object(Object::Sector(_)))
            | (TypeName::SectorBoundary, value @ Value::Object(Object::SectorBoundary(_)))
            | (TypeName::SectorTransform, value @ Value::Object(Object::SectorTransform(_)))
            | (TypeName::Vector3, value @ Value::Vector3(_))
            | (TypeName::Vector3Int, value @ Value::IntVector3(_))
            | (TypeName::Quaternion, value @ Value::Orientation(_))
            | (TypeName::Autofield, value @ Value::Autofield(_))
            | (TypeName::Float, value @ Value::Number(_))
            | (TypeName::Int, value @ Value::Identifier(_)) => Ok(value),
            (TypeName::Int, value @ Value::Number(_)) => match value.as_integer() {
                Some(id) => Ok(Value::Identifier(id)),
                None => Err(value),
            },
            (_, value) => Err(value),
        }
    }
}

/// A constructed `[Name] { .. }` object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Object {
    Sector(Box<Sector>),
    SectorBoundary(SectorBoundary),
    SectorTransform(SectorTransform),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    Unknown,
    Mismatch { expected: &'static str, found: ValueKind },
}

struct FieldSpec<T> {
    name: &'static str,
    expects: &'static str,
    assign: fn(&mut T, Value) -> Result<(), Value>,
}

const SECTOR_FIELDS: &[FieldSpec<Sector>] = &[
    FieldSpec {
        name: "Boundary",
        expects: "SectorBoundary",
        assign: |sector, value| match value {
            Value::Object(Object::SectorBoundary(boundary)) => {
                sector.boundary = boundary;
                Ok(())
            }
            other => Err(other),
        },
    },
    FieldSpec {
        name: "Transform",
        expects: "SectorTransform",
        assign: |sector, value| match value {
            Value::Object(Object::SectorTransform(transform)) => {
                sector.transform = transform;
                Ok(())
            }
            other => Err(other),
        },
    },
    FieldSpec {
        name: "CellFloor",
        expects: "number",
        assign: |sector, value| match value {
            Value::Number(floor) => {
                sector.cell_floor = floor as f32;
                Ok(())
            }
            other => Err(other),
        },
    },
    FieldSpec {
        name: "CellHeight",
        expects: "number",
        assign: |sector, value| match value {
            Value::Number(height) => {
                sector.cell_height = height as f32;
                Ok(())
            }
            other => Err(other),
        },
    },
    FieldSpec {
        name: "SectorId",
        expects: "integer id",
        assign: |sector, value| match value.as_integer() {
            Some(id) => {
                sector.sector_id = id;
                Ok(())
            }
            None => Err(value),
        },
    },
    FieldSpec {
        name: "Tags",
        expects: "autofield",
        assign: |sector, value| match value {
            Value::Autofield(tags) => {
                sector.tags = tags;
                Ok(())
            }
            other => Err(other),
        },
    },
];

const BOUNDARY_FIELDS: &[FieldSpec<SectorBoundary>] = &[
    FieldSpec {
        name: "Kernel",
        expects: "Vector3",
        assign: |boundary, value| match value {
            Value::Vector3(kernel) => {
                boundary.kernel = kernel;
                Ok(())
            }
            other => Err(other),
        },
    },
    FieldSpec {
        name: "Vertices",
        expects: "[Vector3] list",
        assign: |boundary, value| match value {
            Value::List(list) if list.element == TypeName::Vector3 => {
                boundary.vertices = list.into_vectors();
                Ok(())
            }
            other => Err(other),
        },
    },
    FieldSpec {
        name: "Triangles",
        expects: "[Autofield] list",
        assign: |boundary, value| match value {
            Value::List(list) if list.element == TypeName::Autofield => {
                boundary.triangles = list.into_autofields();
                Ok(())
            }
            other => Err(other),
        },
    },
];

const TRANSFORM_FIELDS: &[FieldSpec<SectorTransform>] = &[
    FieldSpec {
        name: "Position",
        expects: "Vector3",
        assign: |transform, value| match value {
            Value::Vector3(position) => {
                transform.position = position;
                Ok(())
            }
            other => Err(other),
        },
    },
    FieldSpec {
        name: "Rotation",
        expects: "orientation",
        assign: |transform, value| match value {
            Value::Orientation(rotation) => {
                transform.rotation = rotation;
                Ok(())
            }
            other => Err(other),
        },
    },
    FieldSpec {
        name: "Scale",
        expects: "Vector3",
        assign: |transform, value| match value {
            Value::Vector3(scale) => {
                transform.scale = scale;
                Ok(())
            }
            other => Err(other),
        },
    },
];

fn assign_field<T>(
    table: &[FieldSpec<T>],
    target: &mut T,
    field: &str,
    value: Value,
) -> Result<(), FieldError> {
    let spec = table
        .iter()
        .find(|spec| spec.name == field)
        .ok_or(FieldError::Unknown)?;
    (spec.assign)(target, value).map_err(|rejected| FieldError::Mismatch {
        expected: spec.expects,
        found: rejected.kind(),
    })
}

impl Object {
    /// Default-construct an object of the given type, or `None` for types
    /// that only exist as literals or list elements.
    pub fn new(type_name: TypeName) -> Option<Self> {
        if !type_name.is_object() {
            return None;
        }
        match type_name {
            TypeName::Sector => Some(Object::Sector(Box::default())),
            TypeName::SectorBoundary => Some(Object::SectorBoundary(SectorBoundary::default())),
            TypeName::SectorTransform => {
                Some(Object::SectorTransform(SectorTransform::default()))
            }
            _ => None,
        }
    }

    pub fn type_name(&self) -> TypeName {
        match self {
            Object::Sector(_) => TypeName::Sector,
            Object::SectorBoundary(_) => TypeName::SectorBoundary,
            Object::SectorTransform(_) => TypeName::SectorTransform,
        }
    }

    pub fn set_field(&mut self, field: &str, value: Value) -> Result<(), FieldError> {
        match self {
            Object::Sector(sector) => assign_field(SECTOR_FIELDS, sector, field, value),
            Object::SectorBoundary(boundary) => {
                assign_field(BOUNDARY_FIELDS, boundary, field, value)
            }
            Object::SectorTransform(transform) => {
                assign_field(TRANSFORM_FIELDS, transform, field, value)
            }
        }
    }
}

/// A `[Name] [ .. ]` list; every item has already been coerced to `element`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct List {
    pub element: TypeName,
    pub items: Vec<Value>,
}

impl List {
    pub fn new(element: TypeName) -> Self {
        Self {
            element,
            items: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vectors(self) -> Vec<Vec3> {
        self.items
            .into_iter()
            .filter_map(|item| match item {
                Value::Vector3(vector) => Some(vector),
                _ => None,
            })
            .collect()
    }

    pub fn into_autofields(self) -> Vec<Autofield> {
        self.items
            .into_iter()
            .filter_map(|item| match item {
                Value::Autofield(field) => Some(field),
                _ => None,
            })
            .collect()
    }

    pub fn numbers(&self) -> Vec<f64> {
        self.items
            .iter()
            .filter_map(|item| match item {
                Value::Number(value) => Some(*value),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_resolve() {
        for ty in TypeName::ALL {
            assert_eq!(TypeName::from_name(ty.name()), Some(ty));
        }
        assert_eq!(TypeName::from_name("Actor"), None);
        assert!(TypeName::Sector.is_object());
        assert!(!TypeName::Vector3.is_object());
        for ty in TypeName::ALL {
            assert_eq!(Object::new(ty).is_some(), ty.is_object(), "{}", ty.name());
        }
    }

    #[test]
    fn setters_check_field_names_and_kinds() {
        let mut object = Object::new(TypeName::SectorTransform).expect("constructible");
        object
            .set_field("Position", Value::Vector3(Vec3::new(1.0, 2.0, 3.0)))
            .expect("position");
        assert_eq!(
            object.set_field("Heading", Value::Number(1.0)),
            Err(FieldError::Unknown)
        );
        assert_eq!(
            object.set_field("Scale", Value::Number(2.0)),
            Err(FieldError::Mismatch {
                expected: "Vector3",
                found: ValueKind::Number,
            })
        );
        let Object::SectorTransform(transform) = object else {
            panic!("expected transform");
        };
        assert_eq!(transform.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(transform.scale, Vec3::ONE);
    }

    #[test]
    fn sector_id_accepts_identifiers_and_integral_numbers() {
        let mut object = Object::new(TypeName::Sector).expect("constructible");
        object
            .set_field("SectorId", Value::Identifier(9))
            .expect("identifier id");
        object
            .set_field("SectorId", Value::Number(12.0))
            .expect("integral number id");
        assert!(object.set_field("SectorId", Value::Number(1.5)).is_err());
        let Object::Sector(sector) = object else {
            panic!("expected sector");
        };
        assert_eq!(sector.sector_id, 12);
    }

    #[test]
    fn int_lists_coerce_integral_numbers() {
        assert_eq!(
            TypeName::Int.coerce(Value::Number(3.0)),
            Ok(Value::Identifier(3))
        );
        assert!(TypeName::Int.coerce(Value::Number(3.5)).is_err());
        assert!(TypeName::Vector3.coerce(Value::Number(1.0)).is_err());
    }
}
