use crate::entities::entity::SharedEntity;
use crate::entities::identity::Identity;
use crate::entities::property::{Property, PropertyName, PropertyValue};
use crate::net::cursor::ByteCursor;
use crate::net::type_hash::type_hash;
use crate::telemetry::logging;

/// Versions at or above this write type names as 32-bit hashes.
pub const HASH_VERSION: u8 = 0x2a;
pub const LEGACY_VERSION: u8 = 0x29;
pub const DEFAULT_VERSION: u8 = 0x2d;
const END_OF_OBJECT: u32 = 0;

/// One node of the networked object tree.
///
/// `native_type` and `gc_type` are hashed independently in hash mode; the
/// display name is always a C-string. Child and property order is
/// transmitted as-is.
#[derive(Debug)]
pub struct GcObject {
    pub identity: Identity,
    pub version: u8,
    pub native_type: String,
    pub gc_type: String,
    pub name: String,
    children: Vec<SharedEntity>,
    properties: Vec<Property>,
}

impl GcObject {
    pub fn new(native_type: impl Into<String>) -> Self {
        let native_type = native_type.into();
        Self {
            identity: Identity::default(),
            version: DEFAULT_VERSION,
            gc_type: native_type.to_lowercase(),
            native_type,
            name: String::new(),
            children: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn named(native_type: impl Into<String>, name: impl Into<String>) -> Self {
        let mut object = Self::new(native_type);
        object.name = name.into();
        object
    }

    pub fn with_gc_type(mut self, gc_type: impl Into<String>) -> Self {
        self.gc_type = gc_type.into();
        self
    }

    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    pub fn uses_hashes(&self) -> bool {
        self.version >= HASH_VERSION
    }

    pub fn children(&self) -> &[SharedEntity] {
        &self.children
    }

    pub fn add_child(&mut self, child: SharedEntity) {
        self.children.push(child);
    }

    pub fn remove_child(&mut self, child: &SharedEntity) -> bool {
        let before = self.children.len();
        self.children
            .retain(|existing| !std::sync::Arc::ptr_eq(existing, child));
        self.children.len() != before
    }

    pub fn child_by_native_type(&self, native_type: &str) -> Option<SharedEntity> {
        self.children
            .iter()
            .find(|child| {
                child
                    .read()
                    .object()
                    .native_type
                    .eq_ignore_ascii_case(native_type)
            })
            .cloned()
    }

    pub fn child_by_gc_type(&self, gc_type: &str) -> Option<SharedEntity> {
        self.children
            .iter()
            .find(|child| child.read().object().gc_type.eq_ignore_ascii_case(gc_type))
            .cloned()
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn add_property(&mut self, property: Property) {
        self.properties.push(property);
    }

    /// Replaces the value of an existing property in place, keeping its
    /// position, or appends a new one.
    pub fn set_property(&mut self, name: &str, value: impl Into<PropertyValue>) {
        let value = value.into();
        match self
            .properties
            .iter_mut()
            .find(|property| property.name.matches(name))
        {
            Some(property) => property.value = value,
            None => self.properties.push(Property {
                name: PropertyName::from(name),
                value,
            }),
        }
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|property| property.name.matches(name))
            .map(|property| &property.value)
    }

    pub fn write_full_object(&self, cursor: &mut ByteCursor) {
        self.write_node(cursor, 0);
    }

    fn write_node(&self, cursor: &mut ByteCursor, depth: usize) {
        let use_hashes = self.uses_hashes();
        if logging::options().log_object_serialise {
            tracing::trace!(
                "{:indent$}{} id={} native={} gc={} children={} properties={}",
                "",
                self.name,
                self.identity.id,
                self.native_type,
                self.gc_type,
                self.children.len(),
                self.properties.len(),
                indent = depth * 2
            );
        }

        cursor.write_u8(self.version);
        write_type_name(cursor, &self.native_type, use_hashes);
        cursor.write_u32(u32::from(self.identity.id.0));
        cursor.write_cstring(&self.name);

        cursor.write_u32(self.children.len() as u32);
        for child in &self.children {
            child.read().write_full_object_at(cursor, depth + 1);
        }

        write_type_name(cursor, &self.gc_type, use_hashes);
        for property in &self.properties {
            property.write(cursor, use_hashes);
        }
        cursor.write_u32(END_OF_OBJECT);
    }

    pub(crate) fn write_full_object_at(&self, cursor: &mut ByteCursor, depth: usize) {
        self.write_node(cursor, depth);
    }
}

fn write_type_name(cursor: &mut ByteCursor, name: &str, use_hashes: bool) {
    if use_hashes {
        cursor.write_u32(type_hash(name));
    } else {
        cursor.write_cstring(name);
    }
}
