//! Object/verb/property block codec (spec §4.3 "Object block", "Verb-code
//! block"). Verb *source* is carried separately in the verb-code section;
//! an object block only carries the verb's name/owner/perms/argspec, so
//! `VerbSlot::source`/`program` are filled in by a second pass
//! (`load.rs`) once the verb-code blocks have been read.

use super::reader::{ReadError, Reader};
use super::writer::Writer;
use crate::objstore::object::{
    ArgSpec, ObjFlags, Object, PrepSpec, PropPerms, PropSlot, PropSlotValue, VerbArgSpec,
    VerbPerms, VerbSlot,
};
use crate::value::ObjId;

fn encode_argspec(a: &ArgSpec) -> i64 {
    match a {
        ArgSpec::None => 0,
        ArgSpec::Any => 1,
        ArgSpec::This => 2,
    }
}

fn decode_argspec(n: i64) -> Result<ArgSpec, ReadError> {
    match n {
        0 => Ok(ArgSpec::None),
        1 => Ok(ArgSpec::Any),
        2 => Ok(ArgSpec::This),
        _ => Err(ReadError::BadObjectHeader(format!("bad argspec {n}"))),
    }
}

fn encode_prep(p: &PrepSpec, w: &mut Writer) {
    match p {
        PrepSpec::None => w.write_line("none"),
        PrepSpec::Any => w.write_line("any"),
        PrepSpec::Other(s) => w.write_line(s),
    }
}

fn decode_prep(r: &mut Reader) -> Result<PrepSpec, ReadError> {
    let s = r.read_line_str()?;
    Ok(match s.as_str() {
        "none" => PrepSpec::None,
        "any" => PrepSpec::Any,
        other => PrepSpec::Other(other.to_string()),
    })
}

pub fn write_verbdef(w: &mut Writer, v: &VerbSlot) {
    w.write_line(v.names.join(" "));
    w.write_obj(v.owner);
    w.write_int(v.perms.bits() as i64);
    w.write_int(encode_argspec(&v.argspec.dobj));
    encode_prep(&v.argspec.prep, w);
    w.write_int(encode_argspec(&v.argspec.iobj));
}

pub fn read_verbdef(r: &mut Reader) -> Result<VerbSlot, ReadError> {
    let names = r
        .read_line_str()?
        .split(' ')
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let owner = r.read_obj()?;
    let perms = VerbPerms::from_bits_truncate(r.read_int()? as u8);
    let dobj = decode_argspec(r.read_int()?)?;
    let prep = decode_prep(r)?;
    let iobj = decode_argspec(r.read_int()?)?;
    Ok(VerbSlot {
        names,
        owner,
        perms,
        argspec: VerbArgSpec { dobj, prep, iobj },
        source: Vec::new(),
        program: None,
    })
}

pub fn write_object(w: &mut Writer, o: &Object) {
    w.write_line(format!("#{}", o.id.0));
    w.write_line(&o.name);
    w.write_int(o.flags.bits() as i64);
    w.write_obj(o.owner);
    w.write_obj(o.location);
    w.write_obj_list(&o.contents);
    w.write_obj_list(&o.parents);
    w.write_obj_list(&o.children);
    w.write_int(o.is_anonymous as i64);

    w.write_int(o.verbs.len() as i64);
    for v in &o.verbs {
        write_verbdef(w, v);
    }

    let own_defs: Vec<&PropSlot> = o.own_propdefs().collect();
    w.write_int(own_defs.len() as i64);
    for p in &own_defs {
        w.write_line(&p.name);
    }

    w.write_int(o.properties.len() as i64);
    for p in &o.properties {
        w.write_line(&p.name);
        w.write_obj(p.owner);
        w.write_obj(p.definer);
        w.write_int(p.perms.bits() as i64);
        match &p.value {
            PropSlotValue::Clear => {
                w.write_int(1);
            }
            PropSlotValue::Value(v) => {
                w.write_int(0);
                w.write_value(v);
            }
        }
    }
}

/// Reads one `#id ... ` object block. Verb `source`/`program` are left
/// empty; the verb-code section fills them in afterwards.
pub fn read_object(r: &mut Reader) -> Result<Object, ReadError> {
    let header = r.read_line_str()?;
    read_object_body(r, &header)
}

/// Body of an object block, given its `#id` header line has already been
/// consumed (the non-anonymous object loop peeks that line first to tell
/// a live object apart from a `#id recycled` marker).
pub fn read_object_body(r: &mut Reader, header: &str) -> Result<Object, ReadError> {
    let id_str = header
        .strip_prefix('#')
        .ok_or_else(|| ReadError::BadObjectHeader(header.to_string()))?;
    let id = ObjId(
        id_str
            .trim()
            .parse()
            .map_err(|_| ReadError::BadObjectHeader(header.to_string()))?,
    );
    let name = r.read_line_str()?;
    let flags = ObjFlags::from_bits_truncate(r.read_int()? as u32);
    let owner = r.read_obj()?;
    let location = r.read_obj()?;
    let contents = r.read_obj_list()?;
    let parents = r.read_obj_list()?;
    let children = r.read_obj_list()?;
    let is_anonymous = r.read_int()? != 0;

    let verb_count = r.read_int()?;
    let mut verbs = Vec::with_capacity(verb_count.max(0) as usize);
    for _ in 0..verb_count {
        verbs.push(read_verbdef(r)?);
    }

    let propdef_count = r.read_int()?;
    let mut own_names = Vec::with_capacity(propdef_count.max(0) as usize);
    for _ in 0..propdef_count {
        own_names.push(r.read_line_str()?);
    }

    let propval_count = r.read_int()?;
    let mut properties = Vec::with_capacity(propval_count.max(0) as usize);
    for _ in 0..propval_count {
        let name = r.read_line_str()?;
        let owner = r.read_obj()?;
        let definer = r.read_obj()?;
        let perms = PropPerms::from_bits_truncate(r.read_int()? as u8);
        let is_clear = r.read_int()? != 0;
        let value = if is_clear {
            PropSlotValue::Clear
        } else {
            PropSlotValue::Value(r.read_value()?)
        };
        properties.push(PropSlot {
            name,
            owner,
            perms,
            value,
            definer,
        });
    }

    let own_here = properties.iter().filter(|p| p.definer == id).count();
    if own_here != own_names.len() {
        return Err(ReadError::BadObjectHeader(format!(
            "#{}: propdefs_count {} does not match {} propval(s) defined here",
            id.0,
            own_names.len(),
            own_here
        )));
    }

    Ok(Object {
        id,
        name,
        owner,
        parents,
        children,
        location,
        contents,
        flags,
        properties,
        verbs,
        is_anonymous,
        is_recycled: false,
    })
}
