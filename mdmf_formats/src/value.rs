//! Recursive-descent parser for MDMF value literals.
//!
//! A value starts at some token of an already tokenized line and may span
//! the rest of it. Parsing reports the index of the last token consumed so
//! callers can decide what trailing tokens mean.

use std::collections::BTreeSet;
use std::fmt;

use glam::{IVec3, Quat, Vec3};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::autofield::{Autofield, FieldTag};
use crate::error::{LoadError, Result};
use crate::orientation::quat_from_euler_degrees;
use crate::registry::{FieldError, List, Object, TypeName};
use crate::tokenize::{CLOSE_AUTOFIELD, OPEN_AUTOFIELD};

static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)$").expect("number pattern compiles")
});
static TYPE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][0-9A-Za-z_]*$").expect("type name pattern compiles"));

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Number(f64),
    Identifier(i32),
    Vector3(Vec3),
    IntVector3(IVec3),
    Orientation(Quat),
    Autofield(Autofield),
    Object(Object),
    List(List),
}

/// Discriminant of a [`Value`]; an autofield holds at most one value per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValueKind {
    Number,
    Identifier,
    Vector3,
    IntVector3,
    Orientation,
    Autofield,
    Object(TypeName),
    List(TypeName),
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Number => f.write_str("number"),
            ValueKind::Identifier => f.write_str("identifier"),
            ValueKind::Vector3 => f.write_str("Vector3"),
            ValueKind::IntVector3 => f.write_str("integer vector"),
            ValueKind::Orientation => f.write_str("orientation"),
            ValueKind::Autofield => f.write_str("autofield"),
            ValueKind::Object(ty) => write!(f, "{} object", ty.name()),
            ValueKind::List(ty) => write!(f, "[{}] list", ty.name()),
        }
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Number(_) => ValueKind::Number,
            Value::Identifier(_) => ValueKind::Identifier,
            Value::Vector3(_) => ValueKind::Vector3,
            Value::IntVector3(_) => ValueKind::IntVector3,
            Value::Orientation(_) => ValueKind::Orientation,
            Value::Autofield(_) => ValueKind::Autofield,
            Value::Object(object) => ValueKind::Object(object.type_name()),
            Value::List(list) => ValueKind::List(list.element),
        }
    }

    /// Identifiers, and numbers with no fractional part that fit in an `i32`.
    pub fn as_integer(&self) -> Option<i32> {
        match *self {
            Value::Identifier(id) => Some(id),
            Value::Number(value) => integral(value),
            _ => None,
        }
    }
}

fn integral(value: f64) -> Option<i32> {
    let in_range = value >= f64::from(i32::MIN) && value <= f64::from(i32::MAX);
    (value.fract() == 0.0 && in_range).then_some(value as i32)
}

/// Parse one value starting at `tokens[start]`. Returns the value and the
/// index of the last token it consumed.
pub fn parse_value(tokens: &[String], start: usize, line: usize) -> Result<(Value, usize)> {
    ValueParser { tokens, line }.parse(start)
}

struct ValueParser<'a> {
    tokens: &'a [String],
    line: usize,
}

impl<'a> ValueParser<'a> {
    fn error(&self, message: impl Into<String>) -> LoadError {
        LoadError::value(self.line, message)
    }

    fn token(&self, index: usize) -> Result<&'a str> {
        self.tokens
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| self.error("unexpected end of line while reading a value"))
    }

    fn expect(&self, index: usize, wanted: &str) -> Result<()> {
        let found = self.token(index)?;
        if found != wanted {
            return Err(self.error(format!("expected '{wanted}', found '{found}'")));
        }
        Ok(())
    }

    fn parse(&self, start: usize) -> Result<(Value, usize)> {
        let head = self.token(start)?;
        match head {
            "[" => self.parse_named(start),
            OPEN_AUTOFIELD => self.parse_autofield(start),
            "<" => {
                let (xyz, last) = self.parse_triple(start)?;
                Ok((Value::Vector3(Vec3::from(xyz.map(|n| n as f32))), last))
            }
            "%" => {
                let (xyz, last) = self.parse_triple(start + 1)?;
                let mut ints = [0; 3];
                for (slot, n) in ints.iter_mut().zip(xyz) {
                    *slot = integral(n).ok_or_else(|| {
                        self.error(format!("integer vector component {n} is not an integer"))
                    })?;
                }
                Ok((Value::IntVector3(IVec3::from_array(ints)), last))
            }
            "$" => {
                let (xyz, last) = self.parse_triple(start + 1)?;
                let degrees = xyz.map(|n| n as f32);
                Ok((Value::Orientation(quat_from_euler_degrees(degrees)), last))
            }
            tag if tag.starts_with('#') => Err(self.error(format!(
                "tag '{tag}' may only appear inside an autofield"
            ))),
            id if id.starts_with('@') => {
                let parsed = id[1..]
                    .parse::<i32>()
                    .map_err(|_| self.error(format!("malformed identifier '{id}'")))?;
                Ok((Value::Identifier(parsed), start))
            }
            number if NUMBER.is_match(number) => Ok((Value::Number(self.number(number)?), start)),
            other => Err(self.error(format!("unrecognized value token '{other}'"))),
        }
    }

    fn number(&self, token: &str) -> Result<f64> {
        if !NUMBER.is_match(token) {
            return Err(self.error(format!("expected a number, found '{token}'")));
        }
        token
            .parse::<f64>()
            .map_err(|_| self.error(format!("malformed number '{token}'")))
    }

    /// `< a , b , c >` starting at `start`.
    fn parse_triple(&self, start: usize) -> Result<([f64; 3], usize)> {
        self.expect(start, "<")?;
        let mut out = [0.0; 3];
        for (slot, value) in out.iter_mut().enumerate() {
            let at = start + 1 + slot * 2;
            *value = self.number(self.token(at)?)?;
            self.expect(at + 1, if slot == 2 { ">" } else { "," })?;
        }
        Ok((out, start + 6))
    }

    /// Index of the token closing the bracket opened at `open_at`.
    fn find_close(&self, open_at: usize, open: &str, close: &str) -> Result<usize> {
        let mut depth = 0usize;
        for (index, token) in self.tokens.iter().enumerate().skip(open_at) {
            if token == open {
                depth += 1;
            } else if token == close {
                depth -= 1;
                if depth == 0 {
                    return Ok(index);
                }
            }
        }
        Err(self.error(format!("unterminated '{open}'")))
    }

    /// After an entry ending at `last`, step over a separating comma. A
    /// trailing comma before the closing token is accepted.
    fn after_entry(&self, last: usize, close: usize) -> Result<usize> {
        let next = last + 1;
        if next > close {
            return Err(self.error("value runs past its closing bracket"));
        }
        if next == close {
            return Ok(close);
        }
        match self.token(next)? {
            "," => Ok(next + 1),
            other => Err(self.error(format!("expected ',' between entries, found '{other}'"))),
        }
    }

    fn parse_named(&self, start: usize) -> Result<(Value, usize)> {
        let name = self.token(start + 1)?;
        if !TYPE_NAME.is_match(name) {
            return Err(self.error(format!("malformed type name '{name}'")));
        }
        self.expect(start + 2, "]")?;
        let type_name =
            TypeName::from_name(name).ok_or_else(|| self.error(format!("unknown type '{name}'")))?;
        match self.token(start + 3)? {
            "{" => self.parse_object(type_name, start + 3),
            "[" => self.parse_list(type_name, start + 3),
            other => Err(self.error(format!(
                "expected '{{' or '[' after [{name}], found '{other}'"
            ))),
        }
    }

    fn parse_object(&self, type_name: TypeName, open: usize) -> Result<(Value, usize)> {
        let mut object = Object::new(type_name).ok_or_else(|| {
            self.error(format!(
                "type '{}' cannot be constructed as an object",
                type_name.name()
            ))
        })?;
        let close = self.find_close(open, "{", "}")?;
        let mut seen = BTreeSet::new();
        let mut cursor = open + 1;
        while cursor < close {
            let field = self.token(cursor)?;
            self.expect(cursor + 1, ":")?;
            let (value, last) = self.parse(cursor + 2)?;
            if !seen.insert(field) {
                return Err(self.error(format!(
                    "field '{field}' set twice on {}",
                    type_name.name()
                )));
            }
            object
                .set_field(field, value)
                .map_err(|err| match err {
                    FieldError::Unknown => self.error(format!(
                        "unknown field '{field}' on {}",
                        type_name.name()
                    )),
                    FieldError::Mismatch { expected, found } => self.error(format!(
                        "field '{field}' on {} expects {expected}, found {found}",
                        type_name.name()
                    )),
                })?;
            cursor = self.after_entry(last, close)?;
        }
        Ok((Value::Object(object), close))
    }

    fn parse_list(&self, element: TypeName, open: usize) -> Result<(Value, usize)> {
        let close = self.find_close(open, "[", "]")?;
        let mut list = List::new(element);
        let mut cursor = open + 1;
        while cursor < close {
            let (value, last) = self.parse(cursor)?;
            let item = element.coerce(value).map_err(|rejected| {
                self.error(format!(
                    "[{}] list cannot hold a {}",
                    element.name(),
                    rejected.kind()
                ))
            })?;
            list.items.push(item);
            cursor = self.after_entry(last, close)?;
        }
        Ok((Value::List(list), close))
    }

    fn parse_autofield(&self, open: usize) -> Result<(Value, usize)> {
        let close = self.find_close(open, OPEN_AUTOFIELD, CLOSE_AUTOFIELD)?;
        let mut field = Autofield::new();
        let mut cursor = open + 1;
        while cursor < close {
            let token = self.token(cursor)?;
            let last = if let Some(name) = token.strip_prefix('#') {
                let tag = FieldTag::from_name(name)
                    .ok_or_else(|| self.error(format!("unknown tag '{token}'")))?;
                field.add_tag(tag);
                cursor
            } else {
                let (value, last) = self.parse(cursor)?;
                field.insert(value).map_err(|rejected| {
                    self.error(format!(
                        "autofield already holds a {} value",
                        rejected.kind()
                    ))
                })?;
                last
            };
            cursor = self.after_entry(last, close)?;
        }
        Ok((Value::Autofield(field), close))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize::{MacroTable, preprocess_line};

    fn parse(line: &str) -> Result<(Value, usize)> {
        let tokens = preprocess_line(line, &MacroTable::new());
        parse_value(&tokens, 0, 7)
    }

    fn parse_all(line: &str) -> Value {
        let tokens = preprocess_line(line, &MacroTable::new());
        let (value, last) = parse_value(&tokens, 0, 7).expect("value parses");
        assert_eq!(last + 1, tokens.len(), "value should consume the line");
        value
    }

    #[test]
    fn identifier_followed_by_autofield() {
        let tokens = preprocess_line("@3 {: <1,2,3>, #NoWall :}", &MacroTable::new());
        let (id, last) = parse_value(&tokens, 0, 1).expect("identifier");
        assert_eq!(id, Value::Identifier(3));
        assert_eq!(last, 0);

        let (field, last) = parse_value(&tokens, last + 1, 1).expect("autofield");
        assert_eq!(last + 1, tokens.len());
        let Value::Autofield(field) = field else {
            panic!("expected autofield, got {field:?}");
        };
        assert!(field.has_tag(FieldTag::NoWall));
        assert_eq!(field.tags().len(), 1);
        assert_eq!(field.vector3(), Some(Vec3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn scalar_literals() {
        assert_eq!(parse_all("-2.5"), Value::Number(-2.5));
        assert_eq!(parse_all(".5"), Value::Number(0.5));
        assert_eq!(parse_all("+4"), Value::Number(4.0));
        assert_eq!(parse_all("@-1"), Value::Identifier(-1));
        assert_eq!(
            parse_all("%<1, -2, 3>"),
            Value::IntVector3(IVec3::new(1, -2, 3))
        );
        assert!(parse("1.2.3").is_err());
        assert!(parse("%<1.5,0,0>").is_err());
        assert!(parse("@door").is_err());
    }

    #[test]
    fn orientation_is_converted_from_degrees() {
        let Value::Orientation(rotation) = parse_all("$<0, 90, 0>") else {
            panic!("expected orientation");
        };
        let turned = rotation * Vec3::X;
        assert!((turned - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5);
    }

    #[test]
    fn bare_tag_and_unknown_tokens_are_rejected() {
        let err = parse("#NoWall").unwrap_err();
        assert!(matches!(err, LoadError::Value { line: 7, .. }), "{err}");
        let err = parse("door").unwrap_err();
        assert!(err.to_string().contains("'door'"), "{err}");
        let err = parse("{: #Sparkly :}").unwrap_err();
        assert!(err.to_string().contains("unknown tag"), "{err}");
    }

    #[test]
    fn autofield_rejects_two_values_of_one_kind() {
        let err = parse("{: 1, 2 :}").unwrap_err();
        assert!(err.to_string().contains("already holds a number"), "{err}");
        let Value::Autofield(field) = parse_all("{: 1, @2, {: #TopWall :}, :}") else {
            panic!("expected autofield");
        };
        assert_eq!(field.number(), Some(1.0));
        assert_eq!(field.identifier(), Some(2));
        assert!(field.get(ValueKind::Autofield).is_some());
    }

    #[test]
    fn builds_nested_sector_object() {
        let line = "[Sector]{ SectorId: @4, CellFloor: -1, CellHeight: 3, \
            Transform: [SectorTransform]{ Position: <1,0,0>, Rotation: $<0,0,0> }, \
            Boundary: [SectorBoundary]{ Kernel: <0.5,0.5,0>, \
              Vertices: [Vector3][<0,0,0>, <1,0,0>, <0,1,0>], \
              Triangles: [Autofield][{: %<0,1,2>, @9, #NoWall :}] }, \
            Tags: {: #NoCeiling :} }";
        let Value::Object(Object::Sector(sector)) = parse_all(line) else {
            panic!("expected sector");
        };
        assert_eq!(sector.sector_id, 4);
        assert_eq!(sector.cell_floor, -1.0);
        assert_eq!(sector.ceiling(), 2.0);
        assert_eq!(sector.transform.position, Vec3::X);
        assert_eq!(sector.transform.scale, Vec3::ONE);
        assert_eq!(sector.boundary.vertices.len(), 3);
        let triangle = &sector.boundary.triangles[0];
        assert_eq!(triangle.int_vector3(), Some(IVec3::new(0, 1, 2)));
        assert_eq!(triangle.identifier(), Some(9));
        assert!(sector.tags.has_tag(FieldTag::NoCeiling));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let Value::Object(Object::Sector(sector)) = parse_all("[Sector]{}") else {
            panic!("expected sector");
        };
        assert_eq!(*sector, crate::level::Sector::default());
    }

    #[test]
    fn object_errors_name_the_problem() {
        let err = parse("[Actor]{}").unwrap_err();
        assert!(err.to_string().contains("unknown type 'Actor'"), "{err}");
        let err = parse("[Sector]{ Colour: 1 }").unwrap_err();
        assert!(err.to_string().contains("unknown field 'Colour'"), "{err}");
        let err = parse("[Sector]{ CellFloor: <0,0,0> }").unwrap_err();
        assert!(err.to_string().contains("expects number"), "{err}");
        let err = parse("[Sector]{ CellFloor: 1, CellFloor: 2 }").unwrap_err();
        assert!(err.to_string().contains("set twice"), "{err}");
        let err = parse("[Vector3]{}").unwrap_err();
        assert!(err.to_string().contains("cannot be constructed"), "{err}");
        let err = parse("[Sector]{ CellFloor: 1").unwrap_err();
        assert!(err.to_string().contains("unterminated"), "{err}");
    }

    #[test]
    fn lists_check_element_types() {
        let Value::List(list) = parse_all("[float][1, 2.5, -3]") else {
            panic!("expected list");
        };
        assert_eq!(list.numbers(), vec![1.0, 2.5, -3.0]);
        let Value::List(ids) = parse_all("[int][@1, 2]") else {
            panic!("expected list");
        };
        assert_eq!(ids.items, vec![Value::Identifier(1), Value::Identifier(2)]);
        let err = parse("[Vector3][<0,0,0>, 4]").unwrap_err();
        assert!(err.to_string().contains("cannot hold a number"), "{err}");
    }

    #[test]
    fn stops_at_the_end_of_the_value() {
        let (value, last) = parse("<1,2,3> trailing").expect("vector");
        assert_eq!(value, Value::Vector3(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(last, 6);
    }
}
