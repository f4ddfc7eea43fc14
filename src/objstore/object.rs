//! The object record and its property/verb slots (spec §3.2).

use crate::value::{ObjId, Var};

bitflags::bitflags! {
    /// Object flag bitset, bit numbers per spec §3.2.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ObjFlags: u32 {
        const USER       = 1 << 0;
        const PROGRAMMER = 1 << 1;
        const WIZARD     = 1 << 2;
        const READ       = 1 << 4;
        const WRITE      = 1 << 5;
        const FERTILE    = 1 << 7;
        const ANONYMOUS  = 1 << 8;
        const INVALID    = 1 << 9;
        const RECYCLED   = 1 << 10;
    }
}

bitflags::bitflags! {
    /// Verb permission bits (r/w/x/d).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VerbPerms: u8 {
        const READ  = 1 << 0;
        const WRITE = 1 << 1;
        const EXEC  = 1 << 2;
        const DEBUG = 1 << 3;
    }
}

bitflags::bitflags! {
    /// Property permission bits (r/w/c — c = chown-on-inherit).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PropPerms: u8 {
        const READ  = 1 << 0;
        const WRITE = 1 << 1;
        const CHOWN = 1 << 2;
    }
}

/// `this|none|any` argument specifier for a verb's dobj/iobj slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgSpec {
    None,
    Any,
    This,
}

/// Preposition specifier for a verb's argspec middle slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrepSpec {
    None,
    Any,
    Other(String),
}

#[derive(Debug, Clone)]
pub struct VerbArgSpec {
    pub dobj: ArgSpec,
    pub prep: PrepSpec,
    pub iobj: ArgSpec,
}

/// A property slot. `Clear` means "inherit from the nearest ancestor
/// defining a non-clear value" (spec §3.2, §4.2, §9).
#[derive(Debug, Clone)]
pub enum PropSlotValue {
    Value(Var),
    Clear,
}

#[derive(Debug, Clone)]
pub struct PropSlot {
    pub name: String,
    pub owner: ObjId,
    pub perms: PropPerms,
    pub value: PropSlotValue,
    /// The object whose `define_property` call introduced this slot.
    /// Distinguishes "defined here" from "inherited, currently non-clear"
    /// for the textdump codec's propdefs/propvals split (spec §4.3).
    pub definer: ObjId,
}

#[derive(Debug, Clone)]
pub struct VerbSlot {
    pub names: Vec<String>,
    pub owner: ObjId,
    pub perms: VerbPerms,
    pub argspec: VerbArgSpec,
    pub source: Vec<String>,
    pub program: Option<crate::compiler::program::Program>,
}

impl VerbSlot {
    pub fn matches_name(&self, name: &str) -> bool {
        // LambdaMOO verb-name wildcard: a trailing `*` marks the point
        // after which the match becomes optional, e.g. "foo*bar" matches
        // "foo", "foob", ..., "foobar".
        self.names.iter().any(|n| verb_name_matches(n, name))
    }
}

fn verb_name_matches(pattern: &str, name: &str) -> bool {
    if let Some(star) = pattern.find('*') {
        let (required, optional) = pattern.split_at(star);
        let optional = &optional[1..];
        if !name.starts_with(required) {
            return false;
        }
        let rest = &name[required.len()..];
        optional.starts_with(rest) || rest.starts_with(optional)
    } else {
        pattern == name
    }
}

#[derive(Debug, Clone)]
pub struct Object {
    pub id: ObjId,
    pub name: String,
    pub owner: ObjId,
    pub parents: Vec<ObjId>,
    pub children: Vec<ObjId>,
    pub location: ObjId,
    pub contents: Vec<ObjId>,
    pub flags: ObjFlags,
    pub properties: Vec<PropSlot>,
    pub verbs: Vec<VerbSlot>,
    pub is_anonymous: bool,
    pub is_recycled: bool,
}

impl Object {
    pub fn new(id: ObjId, name: impl Into<String>, owner: ObjId) -> Self {
        Object {
            id,
            name: name.into(),
            owner,
            parents: Vec::new(),
            children: Vec::new(),
            location: ObjId::NOTHING,
            contents: Vec::new(),
            flags: ObjFlags::empty(),
            properties: Vec::new(),
            verbs: Vec::new(),
            is_anonymous: false,
            is_recycled: false,
        }
    }

    pub fn find_own_property(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name == name)
    }

    pub fn find_own_verb_by_name(&self, name: &str) -> Option<usize> {
        self.verbs.iter().position(|v| v.matches_name(name))
    }

    /// Properties this object itself defined (as opposed to inherited,
    /// possibly-non-clear, slots) — the textdump codec's `propdefs` set
    /// (spec §4.3).
    pub fn own_propdefs(&self) -> impl Iterator<Item = &PropSlot> {
        self.properties.iter().filter(move |p| p.definer == self.id)
    }

    pub fn is_wizard(&self) -> bool {
        self.flags.contains(ObjFlags::WIZARD)
    }
}
