//! Per-connection state and the command-matching trilogy (spec §4.6:
//! "Verb matching order: dobj, player's location, player").

use crate::net::command::ParsedCommand;
use crate::objstore::object::{ArgSpec, PrepSpec, VerbArgSpec};
use crate::objstore::ObjectStore;
use crate::value::ObjId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Unlogged,
    LoggedIn(ObjId),
}

/// Resolves a dobj/iobj phrase against the objects a player could
/// plausibly mean: themselves, their location, and the immediate contents
/// of both. `"me"`/`"here"` are recognized specials; an empty phrase
/// resolves to `ObjId::NOTHING` without searching.
pub fn resolve_object_ref(store: &ObjectStore, player: ObjId, phrase: &str) -> Option<ObjId> {
    if phrase.is_empty() {
        return Some(ObjId::NOTHING);
    }
    if phrase.eq_ignore_ascii_case("me") {
        return Some(player);
    }
    let location = store.get(player).ok().map(|o| o.location).unwrap_or(ObjId::NOTHING);
    if phrase.eq_ignore_ascii_case("here") {
        return Some(location);
    }

    let mut candidates = vec![player, location];
    if let Ok(p) = store.get(player) {
        candidates.extend(p.contents.iter().copied());
    }
    if let Ok(loc) = store.get(location) {
        candidates.extend(loc.contents.iter().copied());
    }

    let phrase_lower = phrase.to_ascii_lowercase();
    let mut prefix_match = None;
    for id in candidates {
        let Ok(obj) = store.get(id) else { continue };
        let name_lower = obj.name.to_ascii_lowercase();
        if name_lower == phrase_lower {
            return Some(id);
        }
        if prefix_match.is_none() && name_lower.starts_with(&phrase_lower) {
            prefix_match = Some(id);
        }
    }
    prefix_match
}

fn argspec_matches(spec: &ArgSpec, resolved: ObjId, search_obj: ObjId) -> bool {
    match spec {
        ArgSpec::None => resolved == ObjId::NOTHING,
        ArgSpec::Any => true,
        ArgSpec::This => resolved == search_obj,
    }
}

fn prep_matches(spec: &PrepSpec, prepstr: &str) -> bool {
    match spec {
        PrepSpec::None => prepstr.is_empty(),
        PrepSpec::Any => true,
        PrepSpec::Other(want) => {
            prepstr.eq_ignore_ascii_case(want)
                || crate::net::command::PREPOSITIONS
                    .iter()
                    .any(|group| group.contains(&want.as_str()) && group.contains(&prepstr))
        }
    }
}

fn argspec_satisfied(spec: &VerbArgSpec, dobj: ObjId, prepstr: &str, iobj: ObjId, search_obj: ObjId) -> bool {
    argspec_matches(&spec.dobj, dobj, search_obj)
        && prep_matches(&spec.prep, prepstr)
        && argspec_matches(&spec.iobj, iobj, search_obj)
}

/// The result of a successful command match: which object's verb to run.
pub struct MatchedVerb {
    pub search_obj: ObjId,
}

/// Tries dobj, then the player's location, then the player — the classic
/// MOO trilogy — returning the first object whose verb table has a verb
/// matching `cmd.verb` with a satisfied argspec.
pub fn match_command_verb(
    store: &ObjectStore,
    player: ObjId,
    dobj: ObjId,
    iobj: ObjId,
    cmd: &ParsedCommand,
) -> Option<MatchedVerb> {
    let location = store.get(player).ok().map(|o| o.location).unwrap_or(ObjId::NOTHING);
    for search_obj in [dobj, location, player] {
        if search_obj == ObjId::NOTHING {
            continue;
        }
        let Ok((_, _, verb)) = store.resolve_verb(search_obj, &cmd.verb) else {
            continue;
        };
        if argspec_satisfied(&verb.argspec, dobj, &cmd.prepstr, iobj, search_obj) {
            return Some(MatchedVerb { search_obj });
        }
    }
    None
}
