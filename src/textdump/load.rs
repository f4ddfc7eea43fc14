//! Top-level textdump load (spec §4.3 "Database file" section order).
//!
//! One deliberate reordering vs. the classic LambdaMOO layout: task
//! sections are placed *after* the object/verb sections rather than
//! before. A suspended task's activation re-resolves its verb's compiled
//! `Program` against the live `ObjectStore` (see `task_codec.rs`), so the
//! store and its verbs must already exist by the time a task record is
//! decoded. Recorded as a format simplification in DESIGN.md.

use super::object_codec::{read_object, read_object_body};
use super::reader::{ReadError, Reader};
use super::task_codec::read_task;
use super::{DbVersion, HEADER_PREFIX};
use crate::compiler::compile_verb;
use crate::objstore::ObjectStore;
use crate::scheduler::queues::Queues;
use crate::scheduler::task::DelayedTask;
use crate::scheduler::Scheduler;
use std::collections::{BinaryHeap, VecDeque};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

pub struct LoadedDatabase {
    pub version: DbVersion,
    pub store: ObjectStore,
    pub scheduler: Scheduler,
}

pub fn read_textdump_file(path: &Path) -> Result<LoadedDatabase, ReadError> {
    let bytes = std::fs::read(path)?;
    read_textdump(&bytes)
}

pub fn read_textdump(bytes: &[u8]) -> Result<LoadedDatabase, ReadError> {
    let mut r = Reader::new(bytes);

    let header = r.read_line_str()?;
    if !header.starts_with(HEADER_PREFIX) {
        return Err(ReadError::BadHeader(header));
    }
    let version = DbVersion::parse_header(&header)?;

    // A player is just an object id; the USER flag on the object record
    // itself is the source of truth, so this list is read and discarded.
    let _players = r.read_obj_list()?;

    let pending_finalizations = r.read_int()?;
    for _ in 0..pending_finalizations {
        let _ = r.read_line_str()?;
    }

    let clocks = r.read_int()?;
    if clocks != 0 {
        warn!(clocks, "ignoring obsolete non-empty clocks section");
        for _ in 0..clocks {
            let _ = r.read_line_str()?;
        }
    }

    let active_connections = r.read_int()?;
    for _ in 0..active_connections {
        let _ = r.read_line_str()?;
    }

    let object_count = r.read_int()?;
    let mut objects = Vec::with_capacity(object_count.max(0) as usize);
    let mut recycled_ids = Vec::new();
    for _ in 0..object_count {
        let peek = r.read_line_str()?;
        let recycled_id = peek
            .strip_prefix('#')
            .and_then(|rest| rest.strip_suffix(" recycled"))
            .map(|idstr| idstr.trim().parse::<i64>());
        match recycled_id {
            Some(Ok(id)) => {
                recycled_ids.push(id);
            }
            Some(Err(_)) => return Err(ReadError::BadObjectHeader(peek)),
            None => objects.push(read_object_body(&mut r, &peek)?),
        }
    }

    // Anonymous objects: a loop of `(count, count objects)` batches
    // terminated by a zero count (spec §4.3 critical invariant — a reader
    // that stops at the first zero never over- or under-reads here).
    loop {
        let batch = r.read_int()?;
        if batch == 0 {
            break;
        }
        for _ in 0..batch {
            let mut o = read_object(&mut r)?;
            o.is_anonymous = true;
            objects.push(o);
        }
    }

    let verb_count = r.read_int()?;
    for _ in 0..verb_count {
        let header = r.read_line_str()?;
        let (objnum, verbindex) = parse_verb_header(&header)?;
        let mut lines = Vec::new();
        loop {
            let line = r.read_line_str()?;
            if line == "." {
                break;
            }
            lines.push(line);
        }
        let obj = objects
            .iter_mut()
            .find(|o| o.id.0 == objnum)
            .ok_or_else(|| ReadError::BadObjectHeader(header.clone()))?;
        let verb = obj
            .verbs
            .get_mut(verbindex)
            .ok_or_else(|| ReadError::BadObjectHeader(header.clone()))?;
        if !lines.is_empty() {
            let program = compile_verb(&lines).map_err(|e| ReadError::Compile(format!("{e:?}")))?;
            verb.program = Some(program);
        }
        verb.source = lines;
    }

    let store = ObjectStore::rebuild(objects, recycled_ids);

    let mut ready: VecDeque<_> = VecDeque::new();
    let mut time_delayed: BinaryHeap<DelayedTask> = BinaryHeap::new();
    let mut max_task_id = 0u64;

    let queued_count = r.read_int()?;
    for _ in 0..queued_count {
        let delay_secs = r.read_float()?;
        match read_task(&mut r, &store)? {
            Some(task) => {
                max_task_id = max_task_id.max(task.id);
                if delay_secs <= 0.0 {
                    ready.push_back(task);
                } else {
                    time_delayed.push(DelayedTask::new(task, Duration::from_secs_f64(delay_secs)));
                }
            }
            None => warn!("dropping queued task whose verb no longer resolves"),
        }
    }

    let mut suspended = std::collections::HashMap::new();
    let suspended_count = r.read_int()?;
    for _ in 0..suspended_count {
        if let Some(task) = read_task(&mut r, &store)? {
            max_task_id = max_task_id.max(task.id);
            suspended.insert(task.id, task);
        } else {
            warn!("dropping suspended task whose verb no longer resolves");
        }
    }

    // Interrupted tasks (a checkpoint taken mid-task) are recovered onto
    // the ready queue — the most useful place to resume work that was
    // actively running when the dump was taken.
    let interrupted_count = r.read_int()?;
    for _ in 0..interrupted_count {
        if let Some(task) = read_task(&mut r, &store)? {
            max_task_id = max_task_id.max(task.id);
            ready.push_back(task);
        }
    }

    let mut queues = Queues::new();
    queues.ready = ready;
    queues.time_delayed = time_delayed;
    queues.suspended = suspended;
    let scheduler = Scheduler::restore(queues, max_task_id + 1);

    info!(version = ?version, objects = store.iter_live().count(), "textdump loaded");

    Ok(LoadedDatabase {
        version,
        store,
        scheduler,
    })
}

fn parse_verb_header(header: &str) -> Result<(i64, usize), ReadError> {
    let rest = header
        .strip_prefix('#')
        .ok_or_else(|| ReadError::BadObjectHeader(header.to_string()))?;
    let (objnum, idx) = rest
        .split_once(':')
        .ok_or_else(|| ReadError::BadObjectHeader(header.to_string()))?;
    let objnum = objnum
        .parse()
        .map_err(|_| ReadError::BadObjectHeader(header.to_string()))?;
    let idx = idx
        .parse()
        .map_err(|_| ReadError::BadObjectHeader(header.to_string()))?;
    Ok((objnum, idx))
}
