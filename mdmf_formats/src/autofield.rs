use std::collections::BTreeSet;

use glam::{IVec3, Quat, Vec3};
use serde::Serialize;

use crate::value::{Value, ValueKind};

/// Semantic markers that may appear as `#Name` inside an autofield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum FieldTag {
    NoWall,
    BottomWall,
    TopWall,
    HoleWall,
    NoCollision,
    NoCeiling,
    NoFloor,
    ActorPasses,
    ActorTouches,
    TriggerOnce,
    TriggerMultiple,
    TriggerForwardOnly,
}

impl FieldTag {
    pub const ALL: [FieldTag; 12] = [
        FieldTag::NoWall,
        FieldTag::BottomWall,
        FieldTag::TopWall,
        FieldTag::HoleWall,
        FieldTag::NoCollision,
        FieldTag::NoCeiling,
        FieldTag::NoFloor,
        FieldTag::ActorPasses,
        FieldTag::ActorTouches,
        FieldTag::TriggerOnce,
        FieldTag::TriggerMultiple,
        FieldTag::TriggerForwardOnly,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FieldTag::NoWall => "NoWall",
            FieldTag::BottomWall => "BottomWall",
            FieldTag::TopWall => "TopWall",
            FieldTag::HoleWall => "HoleWall",
            FieldTag::NoCollision => "NoCollision",
            FieldTag::NoCeiling => "NoCeiling",
            FieldTag::NoFloor => "NoFloor",
            FieldTag::ActorPasses => "ActorPasses",
            FieldTag::ActorTouches => "ActorTouches",
            FieldTag::TriggerOnce => "TriggerOnce",
            FieldTag::TriggerMultiple => "TriggerMultiple",
            FieldTag::TriggerForwardOnly => "TriggerForwardOnly",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.name() == name)
    }
}

/// A bag of tags plus at most one value per [`ValueKind`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Autofield {
    tags: BTreeSet<FieldTag>,
    fields: Vec<Value>,
}

impl Autofield {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tag(&mut self, tag: FieldTag) {
        self.tags.insert(tag);
    }

    pub fn has_tag(&self, tag: FieldTag) -> bool {
        self.tags.contains(&tag)
    }

    pub fn tags(&self) -> &BTreeSet<FieldTag> {
        &self.tags
    }

    /// Store a value under its kind. A second value of the same kind is
    /// rejected and handed back.
    pub fn insert(&mut self, value: Value) -> Result<(), Value> {
        if self.get(value.kind()).is_some() {
            return Err(value);
        }
        self.fields.push(value);
        Ok(())
    }

    pub fn get(&self, kind: ValueKind) -> Option<&Value> {
        self.fields.iter().find(|value| value.kind() == kind)
    }

    pub fn fields(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.fields.is_empty()
    }

    pub fn number(&self) -> Option<f64> {
        match self.get(ValueKind::Number)? {
            Value::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn identifier(&self) -> Option<i32> {
        match self.get(ValueKind::Identifier)? {
            Value::Identifier(id) => Some(*id),
            _ => None,
        }
    }

    pub fn vector3(&self) -> Option<Vec3> {
        match self.get(ValueKind::Vector3)? {
            Value::Vector3(vector) => Some(*vector),
            _ => None,
        }
    }

    pub fn int_vector3(&self) -> Option<IVec3> {
        match self.get(ValueKind::IntVector3)? {
            Value::IntVector3(vector) => Some(*vector),
            _ => None,
        }
    }

    pub fn orientation(&self) -> Option<Quat> {
        match self.get(ValueKind::Orientation)? {
            Value::Orientation(rotation) => Some(*rotation),
            _ => None,
        }
    }
}
