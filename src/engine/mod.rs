mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;

pub use availability::{merge_overlapping, resolve_day, subtract_ranges};
pub use conflict::{parse_date, parse_time};
pub use error::EngineError;

use std::io;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use ulid::Ulid;

use crate::config::EngineConfig;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                                .record(batch.len() as f64);
                            let flush_start = std::time::Instant::now();
                            let result = flush_batch(&mut wal, &batch);
                            metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                                .record(flush_start.elapsed().as_secs_f64());
                            respond_batch(&mut batch, &result);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                        .record(batch.len() as f64);
                    let flush_start = std::time::Instant::now();
                    let result = flush_batch(&mut wal, &batch);
                    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                        .record(flush_start.elapsed().as_secs_f64());
                    respond_batch(&mut batch, &result);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_batch(
    wal: &mut Wal,
    batch: &[(Event, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let events: Vec<&Event> = batch.iter().map(|(event, _)| event).collect();
    wal.append_batch(&events)
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// The booking core: room catalog, weekly templates, reservation ledger.
///
/// Rooms are independently lockable; a room's write lock is held across
/// conflict-check and insert, which serializes concurrent booking attempts
/// per room (and therefore per room/date).
pub struct Engine {
    rooms: DashMap<Ulid, SharedRoomState>,
    buildings: DashMap<Ulid, Building>,
    users: DashMap<Ulid, UserRecord>,
    /// Unique-email index: email → user id.
    emails: DashMap<String, Ulid>,
    /// Reverse lookup: reservation id → room id.
    reservation_room: DashMap<Ulid, Ulid>,
    /// Building → rooms index for O(1) listing.
    building_rooms: DashMap<Ulid, Vec<Ulid>>,
    wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
}

/// Apply a room-scoped event directly to a RoomState (no locking — caller
/// holds the lock).
fn apply_to_room(room: &mut RoomState, event: &Event, reservation_index: &DashMap<Ulid, Ulid>) {
    match event {
        Event::RoomUpdated { descriptor, .. } => {
            room.descriptor = descriptor.clone();
        }
        Event::RoomRetired { .. } => {
            room.active = false;
        }
        Event::WindowSet {
            id,
            room_id: _,
            weekday,
            open,
            close,
        } => {
            room.set_window(WeeklyWindow {
                id: *id,
                weekday: *weekday,
                open: *open,
                close: *close,
            });
        }
        Event::WindowCleared { weekday, .. } => {
            room.clear_window(*weekday);
        }
        Event::ReservationCreated {
            id,
            room_id,
            tenant_id,
            date,
            range,
            status,
            total_cents,
            notes,
            created_at,
        } => {
            room.insert_reservation(Reservation {
                id: *id,
                room_id: *room_id,
                tenant_id: *tenant_id,
                date: *date,
                range: *range,
                status: *status,
                total_cents: *total_cents,
                notes: notes.clone(),
                created_at: *created_at,
                updated_at: *created_at,
            });
            reservation_index.insert(*id, *room_id);
        }
        Event::ReservationTransitioned { id, status, at, .. } => {
            // Validation happened at mutation time; replay applies blindly.
            if let Some(r) = room.reservation_mut(id) {
                r.status = *status;
                r.updated_at = *at;
            }
        }
        // Building/user/room-creation events are handled at the map level.
        Event::BuildingCreated { .. }
        | Event::UserRegistered { .. }
        | Event::UserDeactivated { .. }
        | Event::RoomCreated { .. } => {}
    }
}

impl Engine {
    /// Open the engine: replay the WAL at `config.wal_path` and spawn the
    /// group-commit writer task.
    pub fn open(config: &EngineConfig, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let events = Wal::replay(&config.wal_path)?;
        let wal = Wal::open(&config.wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            rooms: DashMap::new(),
            buildings: DashMap::new(),
            users: DashMap::new(),
            emails: DashMap::new(),
            reservation_room: DashMap::new(),
            building_rooms: DashMap::new(),
            wal_tx,
            notify,
        };

        // Replay events — we're the sole owner of these Arcs, so try_write
        // always succeeds instantly (no contention). Never use blocking_write
        // here because this may run inside an async context.
        for event in &events {
            match event {
                Event::BuildingCreated { id, owner_id, name } => {
                    engine.buildings.insert(
                        *id,
                        Building {
                            id: *id,
                            owner_id: *owner_id,
                            name: name.clone(),
                        },
                    );
                    engine.building_rooms.entry(*id).or_default();
                }
                Event::UserRegistered {
                    id,
                    name,
                    email,
                    role,
                    tax_id,
                    phone,
                    created_at,
                } => {
                    engine.users.insert(
                        *id,
                        UserRecord {
                            id: *id,
                            name: name.clone(),
                            email: email.clone(),
                            role: *role,
                            tax_id: tax_id.clone(),
                            phone: phone.clone(),
                            active: true,
                            created_at: *created_at,
                        },
                    );
                    engine.emails.insert(email.clone(), *id);
                }
                Event::UserDeactivated { id } => {
                    if let Some(mut user) = engine.users.get_mut(id) {
                        user.active = false;
                    }
                }
                Event::RoomCreated {
                    id,
                    building_id,
                    descriptor,
                } => {
                    let room = RoomState::new(*id, *building_id, descriptor.clone());
                    engine.rooms.insert(*id, Arc::new(RwLock::new(room)));
                    engine.building_rooms.entry(*building_id).or_default().push(*id);
                }
                other => {
                    if let Some(room_id) = event_room_id(other)
                        && let Some(entry) = engine.rooms.get(&room_id)
                    {
                        let room_arc = entry.clone();
                        let mut guard = room_arc.try_write().expect("replay: uncontended write");
                        apply_to_room(&mut guard, other, &engine.reservation_room);
                    }
                }
            }
        }

        let active_rooms = engine
            .rooms
            .iter()
            .filter(|e| e.value().try_read().map(|g| g.active).unwrap_or(false))
            .count();
        metrics::gauge!(crate::observability::ROOMS_ACTIVE).set(active_rooms as f64);

        tracing::info!(
            events = events.len(),
            rooms = engine.rooms.len(),
            buildings = engine.buildings.len(),
            users = engine.users.len(),
            "WAL replay complete"
        );

        Ok(engine)
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn get_room(&self, id: &Ulid) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub fn room_for_reservation(&self, reservation_id: &Ulid) -> Option<Ulid> {
        self.reservation_room.get(reservation_id).map(|e| *e.value())
    }

    /// WAL-append + apply + notify in one call. Eliminates the repeated 3-line pattern.
    pub(super) async fn persist_and_apply(
        &self,
        room_id: Ulid,
        room: &mut RoomState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_room(room, event, &self.reservation_room);
        self.notify.send(room_id, event);
        Ok(())
    }

    /// Lookup reservation → room, get room, acquire write lock.
    pub(super) async fn resolve_reservation_write(
        &self,
        reservation_id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<RoomState>), EngineError> {
        let room_id = self
            .room_for_reservation(reservation_id)
            .ok_or(EngineError::NotFound(*reservation_id))?;
        let room = self
            .get_room(&room_id)
            .ok_or(EngineError::NotFound(room_id))?;
        let guard = room.write_owned().await;
        Ok((room_id, guard))
    }
}

/// Extract the room id from a room-scoped event.
fn event_room_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::WindowSet { room_id, .. }
        | Event::WindowCleared { room_id, .. }
        | Event::ReservationCreated { room_id, .. }
        | Event::ReservationTransitioned { room_id, .. } => Some(*room_id),
        Event::RoomUpdated { id, .. } | Event::RoomRetired { id } => Some(*id),
        Event::BuildingCreated { .. }
        | Event::UserRegistered { .. }
        | Event::UserDeactivated { .. }
        | Event::RoomCreated { .. } => None,
    }
}
