//! Store capability probing.
//!
//! A store declares which optional operations it implements through a
//! [`CapabilitySet`]. At model construction the set is turned into a
//! [`CapabilityTable`]: one slot per capability, each bound either to the
//! store's native implementation or to a locally synthesized default. The
//! table is immutable afterwards and is consumed by exhaustive matching in
//! the [`StoreAdapter`](super::StoreAdapter).

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::error::{ConstructionError, ModelResult};

use super::traits::ObjectStore;

/// An operation a backing store may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Insert a new item.
    Add,
    /// Insert or replace an item. Mandatory.
    Put,
    /// Fetch an item by identity. Mandatory.
    Get,
    /// Load the store's data.
    Load,
    /// Predicate telling whether an item may have children.
    HasChildren,
    /// Fetch the children of an item.
    GetChildren,
    /// Fetch the parents of an item.
    GetParents,
    /// Add a parent to an item's parent field.
    AddParent,
    /// Remove a parent from an item's parent field.
    RemoveParent,
    /// Match items against a query locally.
    QueryEngine,
    /// Query results are live and observable.
    Notify,
    /// The store pushes change/delete/new events.
    Emit,
    /// Tell whether a value is an item of this store.
    IsItem,
}

impl Capability {
    /// The fixed probing order.
    pub const ALL: [Capability; 13] = [
        Capability::Add,
        Capability::Put,
        Capability::Get,
        Capability::Load,
        Capability::HasChildren,
        Capability::GetChildren,
        Capability::GetParents,
        Capability::AddParent,
        Capability::RemoveParent,
        Capability::QueryEngine,
        Capability::Notify,
        Capability::Emit,
        Capability::IsItem,
    ];

    /// The conventional store method name.
    pub fn name(self) -> &'static str {
        match self {
            Capability::Add => "add",
            Capability::Put => "put",
            Capability::Get => "get",
            Capability::Load => "load",
            Capability::HasChildren => "hasChildren",
            Capability::GetChildren => "getChildren",
            Capability::GetParents => "getParents",
            Capability::AddParent => "addParent",
            Capability::RemoveParent => "removeParent",
            Capability::QueryEngine => "queryEngine",
            Capability::Notify => "notify",
            Capability::Emit => "emit",
            Capability::IsItem => "isItem",
        }
    }

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The set of capabilities a store declares.
///
/// Sets combine with `|`:
///
/// ```
/// use horizon_canopy::store::{Capability, CapabilitySet};
///
/// let caps = CapabilitySet::REQUIRED | Capability::Emit;
/// assert!(caps.has(Capability::Get));
/// assert!(!caps.has(Capability::Notify));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilitySet(u16);

impl CapabilitySet {
    /// No capabilities.
    pub const NONE: CapabilitySet = CapabilitySet(0);

    /// The mandatory `get` and `put` pair.
    pub const REQUIRED: CapabilitySet = CapabilitySet((1 << Capability::Get as u16) | (1 << Capability::Put as u16));

    /// Every capability.
    pub const ALL: CapabilitySet = CapabilitySet((1 << Capability::ALL.len()) - 1);

    /// Check if a capability is declared.
    pub fn has(&self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    /// Add a capability.
    pub fn with(mut self, capability: Capability) -> Self {
        self.0 |= capability.bit();
        self
    }

    /// Remove a capability.
    pub fn without(mut self, capability: Capability) -> Self {
        self.0 &= !capability.bit();
        self
    }

    /// Iterate the declared capabilities in probing order.
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(|c| self.has(*c))
    }
}

impl From<Capability> for CapabilitySet {
    fn from(capability: Capability) -> Self {
        CapabilitySet(capability.bit())
    }
}

impl BitOr for CapabilitySet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        CapabilitySet(self.0 | rhs.0)
    }
}

impl BitOr<Capability> for CapabilitySet {
    type Output = Self;

    fn bitor(self, rhs: Capability) -> Self::Output {
        self.with(rhs)
    }
}

impl BitOrAssign<Capability> for CapabilitySet {
    fn bitor_assign(&mut self, rhs: Capability) {
        *self = self.with(rhs);
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(CapabilitySet::NONE, CapabilitySet::with)
    }
}

/// How `add`/`put` reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteHook {
    /// The store is hierarchical and stamps identity and parents itself.
    Passthrough,
    /// Merge directive parents and generate a missing identity before writing.
    StampIdentity,
}

/// Where `add` goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddSlot {
    /// The store's own `add`.
    Native(WriteHook),
    /// No native `add`; use `put`.
    ViaPut,
}

/// Where `load` goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSlot {
    /// The store's own `load`.
    Native,
    /// Nothing to load; settles immediately.
    Immediate,
}

/// Where `hasChildren` goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HasChildrenSlot {
    /// The store's own predicate.
    Native,
    /// Assume every item may have children.
    AssumeYes,
}

/// Where `getChildren` goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildrenSlot {
    /// The store's own `getChildren`.
    Native,
    /// Query `{parent_property: identity}`.
    QueryByParent,
}

/// Where `getParents` goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentsSlot {
    /// The store's own `getParents`.
    Native,
    /// Decode the parent field and `get` each identity.
    ResolveByIdentity,
}

/// Where `addParent`/`removeParent` go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentEditSlot {
    /// The store's own editor.
    Native,
    /// Edit the parent field through the parent-set codec.
    ParentSetCodec,
}

/// Where query matching goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryEngineSlot {
    /// The store's own engine.
    Native,
    /// The built-in field matcher.
    Builtin,
}

/// Where `isItem` goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsItemSlot {
    /// The store's own predicate.
    Native,
    /// Fetch by identity and compare for equality.
    IdentityEquality,
}

/// The single active change-notification mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeChannel {
    /// Push-style change/delete/new events. Takes precedence over `Observable`.
    Evented,
    /// Live, observable query results.
    Observable,
    /// No notifications; callers manage freshness.
    Unmonitored,
}

impl ChangeChannel {
    /// Whether the store reports its own changes.
    pub fn is_monitored(self) -> bool {
        !matches!(self, ChangeChannel::Unmonitored)
    }
}

/// The per-instance capability table, built once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityTable {
    /// `put` write hook. `put` itself is mandatory.
    pub put: WriteHook,
    /// `add` routing.
    pub add: AddSlot,
    /// `load` routing.
    pub load: LoadSlot,
    /// `hasChildren` routing.
    pub has_children: HasChildrenSlot,
    /// `getChildren` routing.
    pub get_children: ChildrenSlot,
    /// `getParents` routing.
    pub get_parents: ParentsSlot,
    /// `addParent` routing.
    pub add_parent: ParentEditSlot,
    /// `removeParent` routing.
    pub remove_parent: ParentEditSlot,
    /// Query matching routing.
    pub query_engine: QueryEngineSlot,
    /// `isItem` routing.
    pub is_item: IsItemSlot,
    /// Active notification mode.
    pub channel: ChangeChannel,
}

impl CapabilityTable {
    /// Probe a store and build its table.
    ///
    /// Fails before anything else is inspected if `get` or `put` is missing.
    pub fn probe(store: &dyn ObjectStore) -> ModelResult<Self> {
        let declared = store.capabilities();
        for required in [Capability::Get, Capability::Put] {
            if !declared.has(required) {
                tracing::error!(target: "horizon_canopy::store", capability = %required, "mandatory capability missing");
                return Err(ConstructionError::MissingCapability(required).into());
            }
        }

        let hook = if store.is_hierarchical() {
            WriteHook::Passthrough
        } else {
            WriteHook::StampIdentity
        };
        let native = |c: Capability| declared.has(c);

        let table = CapabilityTable {
            put: hook,
            add: if native(Capability::Add) {
                AddSlot::Native(hook)
            } else {
                AddSlot::ViaPut
            },
            load: if native(Capability::Load) {
                LoadSlot::Native
            } else {
                LoadSlot::Immediate
            },
            has_children: if native(Capability::HasChildren) {
                HasChildrenSlot::Native
            } else {
                HasChildrenSlot::AssumeYes
            },
            get_children: if native(Capability::GetChildren) {
                ChildrenSlot::Native
            } else {
                ChildrenSlot::QueryByParent
            },
            get_parents: if native(Capability::GetParents) {
                ParentsSlot::Native
            } else {
                ParentsSlot::ResolveByIdentity
            },
            add_parent: if native(Capability::AddParent) {
                ParentEditSlot::Native
            } else {
                ParentEditSlot::ParentSetCodec
            },
            remove_parent: if native(Capability::RemoveParent) {
                ParentEditSlot::Native
            } else {
                ParentEditSlot::ParentSetCodec
            },
            query_engine: if native(Capability::QueryEngine) {
                QueryEngineSlot::Native
            } else {
                QueryEngineSlot::Builtin
            },
            is_item: if native(Capability::IsItem) {
                IsItemSlot::Native
            } else {
                IsItemSlot::IdentityEquality
            },
            channel: if native(Capability::Emit) {
                ChangeChannel::Evented
            } else if native(Capability::Notify) {
                ChangeChannel::Observable
            } else {
                ChangeChannel::Unmonitored
            },
        };

        for capability in Capability::ALL {
            tracing::debug!(
                target: "horizon_canopy::store",
                capability = %capability,
                native = declared.has(capability),
                "probed capability"
            );
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_operations() {
        let caps = CapabilitySet::REQUIRED | Capability::Notify;
        assert!(caps.has(Capability::Get));
        assert!(caps.has(Capability::Put));
        assert!(caps.has(Capability::Notify));
        assert!(!caps.has(Capability::Emit));

        let caps = caps.without(Capability::Get);
        assert!(!caps.has(Capability::Get));
        assert_eq!(caps.iter().collect::<Vec<_>>(), vec![Capability::Put, Capability::Notify]);
    }

    #[test]
    fn test_all_contains_everything() {
        for capability in Capability::ALL {
            assert!(CapabilitySet::ALL.has(capability));
        }
        let collected: CapabilitySet = Capability::ALL.into_iter().collect();
        assert_eq!(collected, CapabilitySet::ALL);
    }

    #[test]
    fn test_names() {
        assert_eq!(Capability::GetChildren.to_string(), "getChildren");
        assert_eq!(Capability::Emit.name(), "emit");
    }
}
