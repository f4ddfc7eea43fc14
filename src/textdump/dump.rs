//! Top-level textdump write: the mirror image of `load.rs`, including the
//! atomic `tmp + fsync + rename` write path (spec §4.3/§6 "Write path").

use super::object_codec::write_object;
use super::writer::Writer;
use super::DbVersion;
use crate::objstore::object::ObjFlags;
use crate::objstore::ObjectStore;
use crate::scheduler::task::Task;
use crate::scheduler::Scheduler;
use std::io;
use std::path::Path;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DumpError {
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub fn write_textdump(version: DbVersion, store: &ObjectStore, scheduler: &Scheduler) -> Vec<u8> {
    let mut w = Writer::new();

    w.write_line(version.header_line());

    let players: Vec<_> = store
        .iter_live()
        .filter(|o| o.flags.contains(ObjFlags::USER))
        .map(|o| o.id)
        .collect();
    w.write_obj_list(&players);

    w.write_int(0); // pending finalizations
    w.write_int(0); // clocks (obsolete)
    w.write_int(0); // active connections

    let live: Vec<_> = store.iter_live().filter(|o| !o.is_anonymous).collect();
    let recycled = store.free_ids();
    w.write_int((live.len() + recycled.len()) as i64);
    for id in recycled {
        w.write_line(format!("#{id} recycled"));
    }
    for o in &live {
        write_object(&mut w, o);
    }

    let anon: Vec<_> = store.iter_live().filter(|o| o.is_anonymous).collect();
    if anon.is_empty() {
        w.write_int(0);
    } else {
        w.write_int(anon.len() as i64);
        for o in &anon {
            write_object(&mut w, o);
        }
        w.write_int(0);
    }

    let mut verb_blocks: Vec<(i64, usize, &[String])> = Vec::new();
    for o in live.iter().chain(anon.iter()) {
        for (idx, v) in o.verbs.iter().enumerate() {
            if !v.source.is_empty() {
                verb_blocks.push((o.id.0, idx, &v.source));
            }
        }
    }
    w.write_int(verb_blocks.len() as i64);
    for (objnum, idx, source) in verb_blocks {
        w.write_line(format!("#{objnum}:{idx}"));
        for line in source {
            w.write_line(line);
        }
        w.write_line(".");
    }

    write_task_sections(&mut w, scheduler);

    w.into_bytes()
}

fn write_task_sections(w: &mut Writer, scheduler: &Scheduler) {
    use super::task_codec::write_task;

    let ready: Vec<&Task> = scheduler.queues.ready.iter().collect();
    let delayed: Vec<_> = scheduler.queues.time_delayed.iter().collect();
    w.write_int((ready.len() + delayed.len()) as i64);
    for t in &ready {
        w.write_float(0.0);
        write_task(w, t);
    }
    let now = Instant::now();
    for d in &delayed {
        let delay = d.wake_at.saturating_duration_since(now).as_secs_f64();
        w.write_float(delay.max(0.0));
        write_task(w, &d.task);
    }

    let suspended: Vec<&Task> = scheduler.queues.suspended.values().collect();
    w.write_int(suspended.len() as i64);
    for t in &suspended {
        write_task(w, t);
    }

    // Interrupted tasks: in this synchronous scheduler a checkpoint is
    // only ever taken between `run_one` calls, so nothing is ever
    // mid-task at write time.
    w.write_int(0);
}

pub fn write_textdump_file(
    path: &Path,
    version: DbVersion,
    store: &ObjectStore,
    scheduler: &Scheduler,
) -> Result<(), DumpError> {
    let bytes = write_textdump(version, store, scheduler);
    let tmp_path = path.with_extension("tmp");
    {
        let mut f = std::fs::File::create(&tmp_path)?;
        use std::io::Write;
        f.write_all(&bytes)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
