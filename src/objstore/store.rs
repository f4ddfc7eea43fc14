//! C2: the object store — arena-backed, prototype-based multiple
//! inheritance with breadth-first clear-property resolution (spec §4.2).

use std::collections::{HashSet, VecDeque};

use thiserror::Error;

use crate::value::{ErrorCode, ObjId, Var};

use super::object::{Object, ObjFlags, PropPerms, PropSlot, PropSlotValue, VerbSlot};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("invalid object")]
    Invind,
    #[error("property not found")]
    PropNf,
    #[error("verb not found")]
    VerbNf,
    #[error("recursive move")]
    Recmove,
    #[error("permission denied")]
    Perm,
    #[error("invalid argument")]
    Invarg,
}

impl From<StoreError> for ErrorCode {
    fn from(e: StoreError) -> ErrorCode {
        match e {
            StoreError::Invind => ErrorCode::Invind,
            StoreError::PropNf => ErrorCode::PropNF,
            StoreError::VerbNf => ErrorCode::VerbNF,
            StoreError::Recmove => ErrorCode::Recmove,
            StoreError::Perm => ErrorCode::Perm,
            StoreError::Invarg => ErrorCode::Invarg,
        }
    }
}

/// An object store arena keyed by integer id (spec §9 Design Notes: "model
/// the object store as an arena keyed by object id; use ids as weak
/// references").
pub struct ObjectStore {
    slots: Vec<Option<Object>>,
    free_list: Vec<i64>,
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore {
    pub fn new() -> Self {
        ObjectStore {
            slots: Vec::new(),
            free_list: Vec::new(),
        }
    }

    /// Rebuilds a store from a flat set of fully-materialized objects plus
    /// the set of recycled ids, as produced by the textdump reader (C3).
    /// Unlike `create`, this does not re-flatten inherited propdefs: the
    /// caller is expected to hand over objects whose `properties` already
    /// reflect the persisted propdefs/propvals split.
    pub fn rebuild(objects: Vec<Object>, recycled_ids: Vec<i64>) -> ObjectStore {
        let max_id = objects
            .iter()
            .map(|o| o.id.0)
            .chain(recycled_ids.iter().copied())
            .max()
            .map(|m| m + 1)
            .unwrap_or(0);
        let mut slots: Vec<Option<Object>> = vec![None; max_id.max(0) as usize];
        for o in objects {
            let idx = o.id.0 as usize;
            slots[idx] = Some(o);
        }
        ObjectStore {
            slots,
            free_list: recycled_ids,
        }
    }

    /// Iterates every live (non-recycled) object, in ascending id order —
    /// the textdump writer's object enumeration order (spec §4.3).
    pub fn iter_live(&self) -> impl Iterator<Item = &Object> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    pub fn free_ids(&self) -> &[i64] {
        &self.free_list
    }

    fn index(id: ObjId) -> Option<usize> {
        if id.0 < 0 {
            None
        } else {
            Some(id.0 as usize)
        }
    }

    pub fn valid(&self, id: ObjId) -> bool {
        Self::index(id)
            .and_then(|i| self.slots.get(i))
            .and_then(|s| s.as_ref())
            .is_some_and(|o| !o.is_recycled)
    }

    pub fn get(&self, id: ObjId) -> Result<&Object, StoreError> {
        Self::index(id)
            .and_then(|i| self.slots.get(i))
            .and_then(|s| s.as_ref())
            .filter(|o| !o.is_recycled)
            .ok_or(StoreError::Invind)
    }

    pub fn get_mut(&mut self, id: ObjId) -> Result<&mut Object, StoreError> {
        Self::index(id)
            .and_then(|i| self.slots.get_mut(i))
            .and_then(|s| s.as_mut())
            .filter(|o| !o.is_recycled)
            .ok_or(StoreError::Invind)
    }

    pub fn max_object(&self) -> ObjId {
        ObjId(self.slots.len() as i64 - 1)
    }

    /// `create(parents, owner, anon)`: allocates a new id, reusing a
    /// recycled slot if one is free (spec §3.2).
    pub fn create(
        &mut self,
        parents: Vec<ObjId>,
        owner: ObjId,
        name: impl Into<String>,
        anon: bool,
    ) -> Result<ObjId, StoreError> {
        for p in &parents {
            self.get(*p)?;
        }
        let id = if let Some(reused) = self.free_list.pop() {
            ObjId(reused)
        } else {
            let id = ObjId(self.slots.len() as i64);
            self.slots.push(None);
            id
        };
        let mut obj = Object::new(id, name, owner);
        obj.is_anonymous = anon;
        obj.parents = parents.clone();
        self.slots[id.0 as usize] = Some(obj);

        for p in &parents {
            self.get_mut(*p)?.children.push(id);
        }
        // Flatten inherited propdefs as clear slots on the new object, so
        // its own BFS lookup terminates at itself with the correct
        // clear-bit semantics (spec §4.2: "clear_property" model).
        let inherited = self.inherited_propdefs(id)?;
        let obj = self.get_mut(id)?;
        for (name, owner, perms, definer) in inherited {
            obj.properties.push(PropSlot {
                name,
                owner,
                perms,
                value: PropSlotValue::Clear,
                definer,
            });
        }
        Ok(id)
    }

    fn inherited_propdefs(
        &self,
        id: ObjId,
    ) -> Result<Vec<(String, ObjId, PropPerms, ObjId)>, StoreError> {
        let obj = self.get(id)?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut frontier: VecDeque<ObjId> = obj.parents.iter().copied().collect();
        let mut visited = HashSet::new();
        while let Some(x) = frontier.pop_front() {
            if !visited.insert(x) {
                continue;
            }
            let xo = self.get(x)?;
            for p in &xo.properties {
                if seen.insert(p.name.clone()) {
                    out.push((p.name.clone(), p.owner, p.perms, p.definer));
                }
            }
            for parent in &xo.parents {
                if !visited.contains(parent) {
                    frontier.push_back(*parent);
                }
            }
        }
        Ok(out)
    }

    /// `recycle(id)`: clears slots and marks the id reusable. Caller is
    /// responsible for invoking the `recycle` verb beforehand (scheduler
    /// concern, not object-store concern).
    pub fn recycle(&mut self, id: ObjId) -> Result<(), StoreError> {
        let obj = self.get_mut(id)?;
        obj.is_recycled = true;
        obj.flags |= super::object::ObjFlags::RECYCLED;
        let parents = std::mem::take(&mut obj.parents);
        let children = std::mem::take(&mut obj.children);
        let location = obj.location;
        let contents = std::mem::take(&mut obj.contents);
        obj.properties.clear();
        obj.verbs.clear();

        for p in parents {
            if let Ok(po) = self.get_mut(p) {
                po.children.retain(|c| *c != id);
            }
        }
        for c in children {
            if let Ok(co) = self.get_mut(c) {
                co.parents.retain(|p| *p != id);
            }
        }
        if self.valid(location) {
            if let Ok(l) = self.get_mut(location) {
                l.contents.retain(|c| *c != id);
            }
        }
        for c in contents {
            if let Ok(co) = self.get_mut(c) {
                co.location = ObjId::NOTHING;
            }
        }
        self.free_list.push(id.0);
        Ok(())
    }

    pub fn recreate(&mut self, id: ObjId, parents: Vec<ObjId>) -> Result<(), StoreError> {
        for p in &parents {
            self.get(*p)?;
        }
        let obj = self.get_mut(id)?;
        obj.is_recycled = false;
        obj.flags.remove(super::object::ObjFlags::RECYCLED);
        obj.parents = parents.clone();
        obj.properties.clear();
        obj.verbs.clear();
        self.free_list.retain(|f| *f != id.0);
        for p in &parents {
            self.get_mut(*p)?.children.push(id);
        }
        Ok(())
    }

    pub fn chparent(&mut self, id: ObjId, new_parents: Vec<ObjId>) -> Result<(), StoreError> {
        for p in &new_parents {
            self.get(*p)?;
            if self.is_descendant(*p, id)? {
                return Err(StoreError::Recmove);
            }
        }
        let old_parents = self.get(id)?.parents.clone();
        for p in &old_parents {
            if let Ok(po) = self.get_mut(*p) {
                po.children.retain(|c| *c != id);
            }
        }
        self.get_mut(id)?.parents = new_parents.clone();
        for p in &new_parents {
            self.get_mut(*p)?.children.push(id);
        }
        Ok(())
    }

    fn is_descendant(&self, candidate: ObjId, ancestor: ObjId) -> Result<bool, StoreError> {
        if candidate == ancestor {
            return Ok(true);
        }
        let mut visited = HashSet::new();
        let mut frontier = VecDeque::new();
        frontier.push_back(candidate);
        while let Some(x) = frontier.pop_front() {
            if !visited.insert(x) {
                continue;
            }
            if x == ancestor {
                return Ok(true);
            }
            if let Ok(o) = self.get(x) {
                for p in &o.parents {
                    frontier.push_back(*p);
                }
            }
        }
        Ok(false)
    }

    /// `move(what, where)`: validates non-recursion, updates location and
    /// contents lists. `exitfunc`/`enterfunc` dispatch is a scheduler
    /// concern; this only performs the store mutation (spec §4.2).
    pub fn move_object(&mut self, what: ObjId, whither: ObjId) -> Result<ObjId, StoreError> {
        if whither.0 >= 0 {
            if what == whither || self.is_descendant(whither, what)? {
                return Err(StoreError::Recmove);
            }
            self.get(whither)?;
        }
        let old_location = self.get(what)?.location;
        if self.valid(old_location) {
            if let Ok(old) = self.get_mut(old_location) {
                old.contents.retain(|c| *c != what);
            }
        }
        self.get_mut(what)?.location = whither;
        if whither.0 >= 0 {
            self.get_mut(whither)?.contents.push(what);
        }
        Ok(old_location)
    }

    /// Breadth-first, left-to-right, cycle-safe property lookup (spec
    /// §4.2, tested as property 1/2). Returns the index path
    /// `(defining_object, property_index)` of the first object in BFS
    /// order whose own slot for `name` is non-`Clear`.
    pub fn resolve_property(&self, start: ObjId, name: &str) -> Result<(ObjId, Var), StoreError> {
        let mut visited = HashSet::new();
        let mut frontier = VecDeque::new();
        frontier.push_back(start);
        while let Some(x) = frontier.pop_front() {
            if !visited.insert(x) {
                continue;
            }
            let obj = self.get(x)?;
            if let Some(idx) = obj.find_own_property(name) {
                if let PropSlotValue::Value(v) = &obj.properties[idx].value {
                    return Ok((x, v.clone()));
                }
            }
            for p in &obj.parents {
                frontier.push_back(*p);
            }
        }
        Err(StoreError::PropNf)
    }

    /// Property writes attach the value to `o` itself, clearing its
    /// `Clear` bit (spec §4.2).
    pub fn set_property(&mut self, o: ObjId, name: &str, value: Var) -> Result<(), StoreError> {
        let obj = self.get_mut(o)?;
        let idx = obj.find_own_property(name).ok_or(StoreError::PropNf)?;
        obj.properties[idx].value = PropSlotValue::Value(value);
        Ok(())
    }

    /// `clear_property(o, p)`: sets the slot back to `Clear` so reads
    /// traverse ancestors again.
    pub fn clear_property(&mut self, o: ObjId, name: &str) -> Result<(), StoreError> {
        let obj = self.get_mut(o)?;
        let idx = obj.find_own_property(name).ok_or(StoreError::PropNf)?;
        obj.properties[idx].value = PropSlotValue::Clear;
        Ok(())
    }

    /// Defines a new property on `o`, then pushes a `Clear` slot onto
    /// every descendant so their own BFS lookup still terminates locally.
    pub fn define_property(
        &mut self,
        o: ObjId,
        name: &str,
        owner: ObjId,
        perms: PropPerms,
        initial: Var,
    ) -> Result<(), StoreError> {
        {
            let obj = self.get_mut(o)?;
            if obj.find_own_property(name).is_some() {
                return Err(StoreError::Invarg);
            }
            obj.properties.push(PropSlot {
                name: name.to_string(),
                owner,
                perms,
                value: PropSlotValue::Value(initial),
                definer: o,
            });
        }
        let descendants = self.descendants_of(o)?;
        for d in descendants {
            let dobj = self.get_mut(d)?;
            if dobj.find_own_property(name).is_none() {
                dobj.properties.push(PropSlot {
                    name: name.to_string(),
                    owner,
                    perms,
                    value: PropSlotValue::Clear,
                    definer: o,
                });
            }
        }
        Ok(())
    }

    pub fn delete_property(&mut self, o: ObjId, name: &str) -> Result<(), StoreError> {
        {
            let obj = self.get_mut(o)?;
            let idx = obj.find_own_property(name).ok_or(StoreError::PropNf)?;
            obj.properties.remove(idx);
        }
        let descendants = self.descendants_of(o)?;
        for d in descendants {
            if let Ok(dobj) = self.get_mut(d) {
                if let Some(idx) = dobj.find_own_property(name) {
                    dobj.properties.remove(idx);
                }
            }
        }
        Ok(())
    }

    fn descendants_of(&self, o: ObjId) -> Result<Vec<ObjId>, StoreError> {
        let mut visited = HashSet::new();
        let mut frontier = VecDeque::new();
        frontier.push_back(o);
        let mut out = Vec::new();
        while let Some(x) = frontier.pop_front() {
            if !visited.insert(x) {
                continue;
            }
            if x != o {
                out.push(x);
            }
            if let Ok(obj) = self.get(x) {
                for c in &obj.children {
                    frontier.push_back(*c);
                }
            }
        }
        Ok(out)
    }

    /// BFS verb lookup by name; execute-permission checking is left to
    /// the caller (VM dispatch, spec §4.4), since it needs the calling
    /// permissions context which the store does not track.
    pub fn resolve_verb(
        &self,
        start: ObjId,
        name: &str,
    ) -> Result<(ObjId, usize, &VerbSlot), StoreError> {
        let mut visited = HashSet::new();
        let mut frontier = VecDeque::new();
        frontier.push_back(start);
        while let Some(x) = frontier.pop_front() {
            if !visited.insert(x) {
                continue;
            }
            let obj = self.get(x)?;
            if let Some(idx) = obj.find_own_verb_by_name(name) {
                return Ok((x, idx, &obj.verbs[idx]));
            }
            for p in &obj.parents {
                frontier.push_back(*p);
            }
        }
        Err(StoreError::VerbNf)
    }

    pub fn is_wizard(&self, id: ObjId) -> bool {
        self.get(id).map(|o| o.is_wizard()).unwrap_or(false)
    }

    /// Virtual built-in properties (spec §4.2): `name`, `owner`, `location`,
    /// `contents`, `programmer`, `wizard`, `r`, `w`, `f` read straight off
    /// the object record rather than its property map. Returns `None` when
    /// `name` is not one of these, so the caller falls back to the regular
    /// BFS property lookup.
    pub fn get_builtin_property(&self, id: ObjId, name: &str) -> Result<Option<Var>, StoreError> {
        let obj = self.get(id)?;
        Ok(match name {
            "name" => Some(Var::str(obj.name.clone().into_bytes())),
            "owner" => Some(Var::Obj(obj.owner)),
            "location" => Some(Var::Obj(obj.location)),
            "contents" => Some(Var::list(obj.contents.iter().map(|o| Var::Obj(*o)).collect())),
            "programmer" => Some(Var::Bool(obj.flags.contains(ObjFlags::PROGRAMMER))),
            "wizard" => Some(Var::Bool(obj.flags.contains(ObjFlags::WIZARD))),
            "r" => Some(Var::Bool(obj.flags.contains(ObjFlags::READ))),
            "w" => Some(Var::Bool(obj.flags.contains(ObjFlags::WRITE))),
            "f" => Some(Var::Bool(obj.flags.contains(ObjFlags::FERTILE))),
            _ => None,
        })
    }

    /// Writes to a virtual built-in property, if `name` names one.
    /// `location`/`contents` are read-only except via `move` (spec §4.2).
    /// Returns `Ok(false)` when `name` isn't a built-in property name, so
    /// the caller falls back to the regular property-slot write.
    pub fn set_builtin_property(
        &mut self,
        id: ObjId,
        name: &str,
        value: Var,
        perms: ObjId,
    ) -> Result<bool, StoreError> {
        match name {
            "location" | "contents" => Err(StoreError::Perm),
            "name" => {
                let wiz = self.is_wizard(perms);
                let obj = self.get_mut(id)?;
                if obj.owner != perms && !wiz {
                    return Err(StoreError::Perm);
                }
                let Var::Str(s) = value else {
                    return Err(StoreError::Invarg);
                };
                obj.name = String::from_utf8_lossy(&s).into_owned();
                Ok(true)
            }
            "owner" => {
                if !self.is_wizard(perms) {
                    return Err(StoreError::Perm);
                }
                let Var::Obj(o) = value else {
                    return Err(StoreError::Invarg);
                };
                self.get_mut(id)?.owner = o;
                Ok(true)
            }
            "programmer" | "wizard" => {
                if !self.is_wizard(perms) {
                    return Err(StoreError::Perm);
                }
                let Var::Bool(b) = value else {
                    return Err(StoreError::Invarg);
                };
                let flag = if name == "programmer" {
                    ObjFlags::PROGRAMMER
                } else {
                    ObjFlags::WIZARD
                };
                let obj = self.get_mut(id)?;
                obj.flags.set(flag, b);
                Ok(true)
            }
            "r" | "w" | "f" => {
                let wiz = self.is_wizard(perms);
                let owner = self.get(id)?.owner;
                if owner != perms && !wiz {
                    return Err(StoreError::Perm);
                }
                let Var::Bool(b) = value else {
                    return Err(StoreError::Invarg);
                };
                let flag = match name {
                    "r" => ObjFlags::READ,
                    "w" => ObjFlags::WRITE,
                    _ => ObjFlags::FERTILE,
                };
                let obj = self.get_mut(id)?;
                obj.flags.set(flag, b);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Property read permission (spec §7: `E_PERM` on caller without the
    /// `r` bit who is neither the property's owner nor a wizard).
    pub fn check_prop_readable(&self, definer: ObjId, name: &str, perms: ObjId) -> Result<(), StoreError> {
        let obj = self.get(definer)?;
        let idx = obj.find_own_property(name).ok_or(StoreError::PropNf)?;
        let slot = &obj.properties[idx];
        if slot.owner == perms || self.is_wizard(perms) || slot.perms.contains(PropPerms::READ) {
            Ok(())
        } else {
            Err(StoreError::Perm)
        }
    }

    /// Property write permission — same rule, `w` bit instead of `r`.
    pub fn check_prop_writable(&self, definer: ObjId, name: &str, perms: ObjId) -> Result<(), StoreError> {
        let obj = self.get(definer)?;
        let idx = obj.find_own_property(name).ok_or(StoreError::PropNf)?;
        let slot = &obj.properties[idx];
        if slot.owner == perms || self.is_wizard(perms) || slot.perms.contains(PropPerms::WRITE) {
            Ok(())
        } else {
            Err(StoreError::Perm)
        }
    }

    /// Verb execute permission (spec §4.4: "checks execute permission
    /// (owner, WIZARD, or `x` bit)").
    pub fn check_verb_executable(&self, owner: ObjId, verb: &VerbSlot, perms: ObjId) -> Result<(), StoreError> {
        if owner == perms || self.is_wizard(perms) || verb.perms.contains(super::object::VerbPerms::EXEC) {
            Ok(())
        } else {
            Err(StoreError::Perm)
        }
    }

    pub fn add_verb(&mut self, o: ObjId, verb: VerbSlot) -> Result<usize, StoreError> {
        let obj = self.get_mut(o)?;
        obj.verbs.push(verb);
        Ok(obj.verbs.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objstore::object::PropPerms;

    fn add_prop(store: &mut ObjectStore, o: ObjId, name: &str, value: Var) {
        store
            .define_property(o, name, o, PropPerms::all(), value)
            .unwrap();
    }

    #[test]
    fn breadth_first_diamond_resolution() {
        // D{B,C}; B{A}; C{A}; A defines x; B also defines x.
        // O.x should resolve to B.x (first enqueued in BFS order).
        let mut store = ObjectStore::new();
        let a = store.create(vec![], ObjId::NOTHING, "A", false).unwrap();
        add_prop(&mut store, a, "x", Var::Int(1));
        let b = store.create(vec![a], ObjId::NOTHING, "B", false).unwrap();
        store.set_property(b, "x", Var::Int(2)).unwrap();
        let c = store.create(vec![a], ObjId::NOTHING, "C", false).unwrap();
        let d = store
            .create(vec![b, c], ObjId::NOTHING, "D", false)
            .unwrap();

        let (definer, value) = store.resolve_property(d, "x").unwrap();
        assert_eq!(definer, b);
        assert!(value.eq_moo(&Var::Int(2)));
    }

    #[test]
    fn lookup_visits_each_object_once() {
        // A cycle via chparent should not infinite-loop.
        let mut store = ObjectStore::new();
        let a = store.create(vec![], ObjId::NOTHING, "A", false).unwrap();
        let b = store.create(vec![a], ObjId::NOTHING, "B", false).unwrap();
        // Attempting to make `a`'s parent `b` would form a cycle through
        // descendants and must be rejected.
        assert_eq!(store.chparent(a, vec![b]), Err(StoreError::Recmove));
    }

    #[test]
    fn clear_property_reverts_to_inherited() {
        let mut store = ObjectStore::new();
        let parent = store.create(vec![], ObjId::NOTHING, "P", false).unwrap();
        add_prop(&mut store, parent, "color", Var::str("red"));
        let child = store
            .create(vec![parent], ObjId::NOTHING, "C", false)
            .unwrap();

        assert!(store.resolve_property(child, "color").unwrap().1.eq_moo(&Var::str("red")));

        store.set_property(child, "color", Var::str("blue")).unwrap();
        assert!(store
            .resolve_property(parent, "color")
            .unwrap()
            .1
            .eq_moo(&Var::str("red")));
        assert!(store
            .resolve_property(child, "color")
            .unwrap()
            .1
            .eq_moo(&Var::str("blue")));

        store.clear_property(child, "color").unwrap();
        assert!(store
            .resolve_property(child, "color")
            .unwrap()
            .1
            .eq_moo(&Var::str("red")));
    }

    #[test]
    fn recursive_move_rejected() {
        let mut store = ObjectStore::new();
        let a = store.create(vec![], ObjId::NOTHING, "A", false).unwrap();
        let b = store.create(vec![], ObjId::NOTHING, "B", false).unwrap();
        store.move_object(b, a).unwrap();
        assert_eq!(store.move_object(a, b), Err(StoreError::Recmove));
    }
}
