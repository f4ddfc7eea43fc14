//! The connection driver: a single task owns the `ObjectStore` and
//! `Scheduler` exclusively and serializes all access through one channel,
//! the same single-writer shape the teacher's `ActorRuntime` used for its
//! actor mailbox instead of an `Arc<Mutex<_>>`.

use crate::config::ServerConfig;
use crate::net::command::parse_command;
use crate::net::connection::{match_command_verb, resolve_object_ref, ConnState};
use crate::objstore::ObjectStore;
use crate::scheduler::{Scheduler, ServerOptions, TaskOutcome};
use crate::value::{ObjId, Var};
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{info, warn};

enum ServerEvent {
    Connected { id: u64, out_tx: mpsc::UnboundedSender<Vec<u8>> },
    Line { id: u64, line: String },
    Disconnected { id: u64 },
}

struct ConnectionEntry {
    out_tx: mpsc::UnboundedSender<Vec<u8>>,
    state: ConnState,
}

pub struct Server {
    pub config: ServerConfig,
    pub store: ObjectStore,
    pub scheduler: Scheduler,
    pub builtins: crate::builtins::BuiltinRegistry,
    pending_direct: Vec<(ObjId, Vec<u8>)>,
}

impl Server {
    pub fn new(
        config: ServerConfig,
        store: ObjectStore,
        scheduler: Scheduler,
        builtins: crate::builtins::BuiltinRegistry,
    ) -> Self {
        Server {
            config,
            store,
            scheduler,
            builtins,
            pending_direct: Vec::new(),
        }
    }
}

impl Server {
    pub async fn run(mut self) -> std::io::Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.config.port)).await?;
        info!(port = self.config.port, "listening");

        let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
        let accept_tx = tx.clone();
        tokio::spawn(async move {
            let mut next_id = 1u64;
            loop {
                let Ok((stream, addr)) = listener.accept().await else {
                    break;
                };
                let id = next_id;
                next_id += 1;
                info!(%addr, id, "connection accepted");
                let (out_tx, out_rx) = mpsc::unbounded_channel();
                if accept_tx.send(ServerEvent::Connected { id, out_tx }).is_err() {
                    break;
                }
                tokio::spawn(handle_connection(id, stream, accept_tx.clone(), out_rx));
            }
        });

        let mut connections: HashMap<u64, ConnectionEntry> = HashMap::new();
        let mut player_conn: HashMap<ObjId, u64> = HashMap::new();
        let opts = ServerOptions::read(&self.store);
        let mut checkpoint = tokio::time::interval(Duration::from_secs(self.config.checkpoint_interval_secs.max(1)));
        checkpoint.tick().await;

        loop {
            tokio::select! {
                _ = checkpoint.tick(), if self.config.checkpoint_interval_secs > 0 => {
                    self.checkpoint();
                }
                event = rx.recv() => {
                    match event {
                        Some(ServerEvent::Connected { id, out_tx }) => {
                            connections.insert(id, ConnectionEntry { out_tx, state: ConnState::Unlogged });
                        }
                        Some(ServerEvent::Disconnected { id }) => {
                            if let Some(entry) = connections.remove(&id) {
                                if let ConnState::LoggedIn(player) = entry.state {
                                    player_conn.remove(&player);
                                    self.call_hook_if_present(player, "user_disconnected", &opts);
                                }
                            }
                        }
                        Some(ServerEvent::Line { id, line }) => {
                            self.handle_line(id, &line, &mut connections, &mut player_conn, &opts);
                        }
                        None => break,
                    }
                }
                _ = tokio::time::sleep(Duration::from_millis(20)), if self.scheduler.has_work() => {}
            }

            self.drain_ready(&mut connections, &player_conn);
        }

        Ok(())
    }

    fn handle_line(
        &mut self,
        id: u64,
        line: &str,
        connections: &mut HashMap<u64, ConnectionEntry>,
        player_conn: &mut HashMap<ObjId, u64>,
        opts: &ServerOptions,
    ) {
        let state = connections.get(&id).map(|c| c.state);
        match state {
            None => {}
            Some(ConnState::Unlogged) => {
                let conn_obj = ObjId(-(id as i64));
                let args = vec![Var::Obj(conn_obj), Var::str(line.as_bytes().to_vec())];
                match self.run_to_completion(ObjId::SYSTEM, ObjId::SYSTEM, ObjId::SYSTEM, "do_login_command", args, opts) {
                    Some(Var::Obj(player)) if player != ObjId::NOTHING && self.store.valid(player) => {
                        if let Some(&old_id) = player_conn.get(&player) {
                            if let Some(old) = connections.get_mut(&old_id) {
                                let _ = old.out_tx.send(b"*** Redirecting connection to new port ***\n".to_vec());
                                old.state = ConnState::Unlogged;
                            }
                            player_conn.remove(&player);
                            self.call_hook_if_present(player, "user_reconnected", opts);
                        } else {
                            self.call_hook_if_present(player, "user_connected", opts);
                        }
                        player_conn.insert(player, id);
                        if let Some(entry) = connections.get_mut(&id) {
                            entry.state = ConnState::LoggedIn(player);
                        }
                    }
                    _ => {
                        if let Some(entry) = connections.get(&id) {
                            let _ = entry.out_tx.send(b"*** Login incorrect ***\n".to_vec());
                        }
                    }
                }
            }
            Some(ConnState::LoggedIn(player)) => {
                self.dispatch_command(player, line, opts);
            }
        }
    }

    fn dispatch_command(&mut self, player: ObjId, line: &str, opts: &ServerOptions) {
        let cmd = parse_command(line);
        if cmd.verb.is_empty() {
            return;
        }
        let dobj = resolve_object_ref(&self.store, player, &cmd.dobjstr).unwrap_or(ObjId::NOTHING);
        let iobj = resolve_object_ref(&self.store, player, &cmd.iobjstr).unwrap_or(ObjId::NOTHING);

        let Some(matched) = match_command_verb(&self.store, player, dobj, iobj, &cmd) else {
            self.enqueue_notify(player, b"I don't understand that.\n".to_vec());
            return;
        };

        if let Err(e) = self.scheduler.enqueue_command_call(
            &self.store,
            opts,
            matched.search_obj,
            player,
            &cmd.verb,
            &cmd.argstr,
            dobj,
            &cmd.dobjstr,
            &cmd.prepstr,
            iobj,
            &cmd.iobjstr,
        ) {
            warn!(?e, "failed to enqueue matched command verb");
        }
    }

    /// Runs `this:verb_name(args)` synchronously to completion, draining
    /// the scheduler until that one task (and anything it forked inline)
    /// quiesces. Used for `do_login_command`, which must finish before the
    /// connection's state machine can advance (spec §4.6).
    fn run_to_completion(
        &mut self,
        this: ObjId,
        player: ObjId,
        permissions: ObjId,
        verb_name: &str,
        args: Vec<Var>,
        opts: &ServerOptions,
    ) -> Option<Var> {
        let id = self
            .scheduler
            .enqueue_verb_call(&self.store, opts, this, player, permissions, verb_name, args)
            .ok()?;
        let mut result = None;
        let store = &mut self.store;
        let builtins = &self.builtins;
        self.scheduler.drain(store, builtins, opts, &mut |outcome| {
            if let TaskOutcome::Complete { result: v, .. } = &outcome {
                result = Some(v.clone());
            }
            let _ = id;
        });
        result
    }

    fn checkpoint(&self) {
        let version = crate::textdump::DbVersion::V17;
        match crate::textdump::write_textdump_file(&self.config.database_path, version, &self.store, &self.scheduler) {
            Ok(()) => info!(path = ?self.config.database_path, "checkpoint written"),
            Err(e) => warn!(?e, "checkpoint failed"),
        }
    }

    fn call_hook_if_present(&mut self, player: ObjId, hook: &str, opts: &ServerOptions) {
        if self.store.resolve_verb(ObjId::SYSTEM, hook).is_err() {
            return;
        }
        let _ = self.run_to_completion(ObjId::SYSTEM, player, ObjId::SYSTEM, hook, vec![Var::Obj(player)], opts);
    }

    fn enqueue_notify(&mut self, player: ObjId, text: Vec<u8>) {
        // Direct server messages (parse failures) bypass `notify()`'s
        // task-scoped batching since no task is running to own them.
        self.pending_direct.push((player, text));
    }

    fn drain_ready(&mut self, connections: &mut HashMap<u64, ConnectionEntry>, player_conn: &HashMap<ObjId, u64>) {
        let opts = ServerOptions::read(&self.store);
        let mut budget = 64;
        while budget > 0 {
            let store = &mut self.store;
            let builtins = &self.builtins;
            let Some(outcome) = self.scheduler.run_one(store, builtins, &opts) else {
                break;
            };
            budget -= 1;
            let notifications = match &outcome {
                TaskOutcome::Complete { notifications, .. } => notifications,
                TaskOutcome::Aborted { notifications, .. } => notifications,
                TaskOutcome::StillRunning => continue,
            };
            self.flush_notifications(notifications, connections, player_conn);
            if let TaskOutcome::Aborted { player, traceback, .. } = &outcome {
                if let Some(&id) = player_conn.get(player) {
                    if let Some(entry) = connections.get(&id) {
                        let _ = entry.out_tx.send(format!("{traceback}\n").into_bytes());
                    }
                }
            }
        }
        for (player, text) in std::mem::take(&mut self.pending_direct) {
            if let Some(&id) = player_conn.get(&player) {
                if let Some(entry) = connections.get(&id) {
                    let _ = entry.out_tx.send(text);
                }
            }
        }
        if std::mem::take(&mut self.scheduler.dump_requested) {
            self.checkpoint();
        }
    }

    fn flush_notifications(
        &self,
        notifications: &[(ObjId, Vec<u8>)],
        connections: &HashMap<u64, ConnectionEntry>,
        player_conn: &HashMap<ObjId, u64>,
    ) {
        let mut by_player: HashMap<ObjId, usize> = HashMap::new();
        for (target, bytes) in notifications {
            let total = by_player.entry(*target).or_insert(0);
            *total += bytes.len();
            if *total > self.config.max_queued_output {
                warn!(target = target.0, "dropping notify() output past max_queued_output");
                continue;
            }
            if let Some(&id) = player_conn.get(target) {
                if let Some(entry) = connections.get(&id) {
                    let mut line = bytes.clone();
                    line.push(b'\n');
                    let _ = entry.out_tx.send(line);
                }
            }
        }
    }
}

async fn handle_connection(
    id: u64,
    stream: TcpStream,
    events: mpsc::UnboundedSender<ServerEvent>,
    mut out_rx: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(text)) => {
                        if events.send(ServerEvent::Line { id, line: text }).is_err() {
                            break;
                        }
                    }
                    _ => break,
                }
            }
            out = out_rx.recv() => {
                match out {
                    Some(bytes) => {
                        if write_half.write_all(&bytes).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }
    let _ = events.send(ServerEvent::Disconnected { id });
}
