//! Renderable entities and the factory that numbers them.

use std::fmt;
use std::sync::Arc;

use glam::Vec3;

use crate::transform::Transform;

/// Process-unique entity identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(u32);

impl EntityId {
    #[inline]
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One drawable object: shared geometry, a color tint and a transform.
///
/// `G` is the geometry handle type. Dropping an entity only releases its
/// reference; the geometry lives as long as its last holder. Entities are
/// move-only so an identity never appears twice.
#[derive(Debug)]
pub struct Entity<G> {
    id: EntityId,
    pub geometry: Option<Arc<G>>,
    pub color: Vec3,
    pub transform: Transform,
}

impl<G> Entity<G> {
    #[inline]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// An entity without geometry is valid but is never drawn.
    #[inline]
    pub fn is_drawable(&self) -> bool {
        self.geometry.is_some()
    }

    pub fn with_geometry(mut self, geometry: Arc<G>) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }
}

/// Hands out entities with monotonically increasing ids, starting at 0.
#[derive(Debug, Default)]
pub struct EntityFactory {
    next_id: u32,
}

impl EntityFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an entity with no geometry, a white (neutral) tint and an
    /// identity transform.
    ///
    /// # Panics
    ///
    /// Panics if the id space is exhausted; ids are never reused.
    pub fn create<G>(&mut self) -> Entity<G> {
        let id = EntityId(self.next_id);
        self.next_id = self
            .next_id
            .checked_add(1)
            .unwrap_or_else(|| panic!("entity id space exhausted"));
        tracing::trace!("Created entity {}", id);

        Entity {
            id,
            geometry: None,
            color: Vec3::ONE,
            transform: Transform::default(),
        }
    }

    /// Number of entities created so far.
    #[inline]
    pub fn created(&self) -> u32 {
        self.next_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_start_at_zero_and_increase() {
        let mut factory = EntityFactory::new();
        let a: Entity<()> = factory.create();
        let b: Entity<()> = factory.create();
        let c: Entity<()> = factory.create();

        assert_eq!(a.id().value(), 0);
        assert_eq!(b.id().value(), 1);
        assert_eq!(c.id().value(), 2);
        assert_eq!(factory.created(), 3);
    }

    #[test]
    fn test_factories_are_independent() {
        let mut first = EntityFactory::new();
        let mut second = EntityFactory::new();
        let _: Entity<()> = first.create();

        let e: Entity<()> = second.create();
        assert_eq!(e.id().value(), 0);
    }

    #[test]
    fn test_entity_without_geometry_is_not_drawable() {
        let mut factory = EntityFactory::new();
        let e: Entity<u8> = factory.create();
        assert!(!e.is_drawable());

        let e = e.with_geometry(Arc::new(7));
        assert!(e.is_drawable());
    }

    #[test]
    fn test_geometry_shared_between_entities() {
        let mut factory = EntityFactory::new();
        let geometry = Arc::new(String::from("cube"));

        let a = factory.create().with_geometry(geometry.clone());
        let b = factory.create().with_geometry(geometry.clone());
        assert_eq!(Arc::strong_count(&geometry), 3);

        drop(a);
        assert_eq!(Arc::strong_count(&geometry), 2);
        assert_eq!(b.geometry.as_deref().map(String::as_str), Some("cube"));
    }

    #[test]
    fn test_new_entity_has_neutral_tint() {
        let e: Entity<()> = EntityFactory::new().create();
        assert_eq!(e.color, Vec3::ONE);
        assert_eq!(e.transform, Transform::default());
        assert_eq!(e.with_color(Vec3::X).color, Vec3::X);
    }

    #[test]
    fn test_entity_id_display() {
        let mut factory = EntityFactory::new();
        let e: Entity<()> = factory.create();
        assert_eq!(e.id().to_string(), "#0");
    }
}
