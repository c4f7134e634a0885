use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u16);

impl EntityId {
    pub const UNASSIGNED: EntityId = EntityId(0);

    pub fn is_assigned(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Network connection a player is bound to. Also used as the owner of
/// entities the player controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u16);

pub type OwnerId = ConnectionId;

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneId(pub u32);

/// Identity record embedded in every networked node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Identity {
    pub id: EntityId,
    pub owner: Option<OwnerId>,
    pub zone: Option<ZoneId>,
}

impl Identity {
    /// Allocates an id unless one was assigned before. Returns the id the
    /// node ends up with.
    pub fn ensure_id(&mut self, ids: &IdAllocator) -> Result<EntityId, IdExhausted> {
        if !self.id.is_assigned() {
            self.id = ids.allocate()?;
        }
        Ok(self.id)
    }

    pub fn is_owned_by(&self, owner: OwnerId) -> bool {
        self.owner == Some(owner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("entity id space exhausted")]
pub struct IdExhausted;

/// Process-wide entity id source. Ids are handed out once and never reused,
/// so a stale client-side id can never resolve to a different object.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }

    pub fn allocate(&self) -> Result<EntityId, IdExhausted> {
        let next = self
            .next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |value| {
                (value <= u32::from(u16::MAX)).then_some(value + 1)
            })
            .map_err(|_| IdExhausted)?;
        Ok(EntityId(next as u16))
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u32 {
        self.next.load(Ordering::Acquire).saturating_sub(1)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_is_monotonic_from_one() {
        let ids = IdAllocator::new();
        assert_eq!(ids.allocate(), Ok(EntityId(1)));
        assert_eq!(ids.allocate(), Ok(EntityId(2)));
        assert_eq!(ids.issued(), 2);
    }

    #[test]
    fn allocator_stops_at_u16_max() {
        let ids = IdAllocator {
            next: AtomicU32::new(u32::from(u16::MAX)),
        };
        assert_eq!(ids.allocate(), Ok(EntityId(u16::MAX)));
        assert_eq!(ids.allocate(), Err(IdExhausted));
        assert_eq!(ids.allocate(), Err(IdExhausted));
    }

    #[test]
    fn ensure_id_keeps_existing() {
        let ids = IdAllocator::new();
        let mut identity = Identity::default();
        let first = identity.ensure_id(&ids).unwrap();
        let second = identity.ensure_id(&ids).unwrap();
        assert_eq!(first, second);
        assert_eq!(ids.issued(), 1);
    }

    #[test]
    fn allocator_is_unique_across_threads() {
        let ids = std::sync::Arc::new(IdAllocator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = std::sync::Arc::clone(&ids);
                std::thread::spawn(move || {
                    (0..500).map(|_| ids.allocate().unwrap()).collect::<Vec<_>>()
                })
            })
            .collect();
        let mut all: Vec<EntityId> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 2000);
    }
}
