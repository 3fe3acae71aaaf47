use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::mapref::entry::Entry;
use tokio::sync::{oneshot, RwLock};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::conflict::{check_no_conflict, check_within_window, now_ms, validate_range};
use super::{Engine, EngineError, WalCommand};

impl Engine {
    pub async fn create_building(
        &self,
        id: Ulid,
        owner_id: Ulid,
        name: String,
    ) -> Result<(), EngineError> {
        if self.buildings.len() >= MAX_BUILDINGS {
            return Err(EngineError::LimitExceeded("too many buildings"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("building name too long"));
        }
        let owner = self
            .users
            .get(&owner_id)
            .ok_or(EngineError::NotFound(owner_id))?;
        if owner.role != Role::Owner {
            return Err(EngineError::PermissionDenied("buildings belong to owners"));
        }
        drop(owner);

        // Claim the id atomically; a plain contains_key check would let two
        // concurrent calls both pass before either inserts.
        match self.buildings.entry(id) {
            Entry::Occupied(_) => return Err(EngineError::AlreadyExists(id)),
            Entry::Vacant(v) => {
                v.insert(Building {
                    id,
                    owner_id,
                    name: name.clone(),
                });
            }
        }

        let event = Event::BuildingCreated { id, owner_id, name };
        if let Err(e) = self.wal_append(&event).await {
            self.buildings.remove(&id);
            return Err(e);
        }
        self.building_rooms.entry(id).or_default();
        self.notify.send(id, &event);
        Ok(())
    }

    pub async fn register_user(
        &self,
        id: Ulid,
        name: String,
        email: String,
        role: Role,
        tax_id: Option<String>,
        phone: Option<String>,
    ) -> Result<(), EngineError> {
        if self.users.len() >= MAX_USERS {
            return Err(EngineError::LimitExceeded("too many users"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("user name too long"));
        }
        if email.len() > MAX_EMAIL_LEN {
            return Err(EngineError::LimitExceeded("email too long"));
        }
        // Claim the email, then the id, before the WAL await. Entry-based
        // claims keep the unique-email invariant under concurrent
        // registrations; both claims roll back if the append fails.
        match self.emails.entry(email.clone()) {
            Entry::Occupied(holder) => return Err(EngineError::AlreadyExists(*holder.get())),
            Entry::Vacant(v) => {
                v.insert(id);
            }
        }

        let created_at = now_ms();
        match self.users.entry(id) {
            Entry::Occupied(_) => {
                self.emails.remove(&email);
                return Err(EngineError::AlreadyExists(id));
            }
            Entry::Vacant(v) => {
                v.insert(UserRecord {
                    id,
                    name: name.clone(),
                    email: email.clone(),
                    role,
                    tax_id: tax_id.clone(),
                    phone: phone.clone(),
                    active: true,
                    created_at,
                });
            }
        }

        let event = Event::UserRegistered {
            id,
            name,
            email: email.clone(),
            role,
            tax_id,
            phone,
            created_at,
        };
        if let Err(e) = self.wal_append(&event).await {
            self.users.remove(&id);
            self.emails.remove(&email);
            return Err(e);
        }
        Ok(())
    }

    pub async fn deactivate_user(&self, id: Ulid) -> Result<(), EngineError> {
        if !self.users.contains_key(&id) {
            return Err(EngineError::NotFound(id));
        }
        let event = Event::UserDeactivated { id };
        self.wal_append(&event).await?;
        if let Some(mut user) = self.users.get_mut(&id) {
            user.active = false;
        }
        Ok(())
    }

    pub async fn create_room(
        &self,
        id: Ulid,
        building_id: Ulid,
        descriptor: RoomDescriptor,
    ) -> Result<(), EngineError> {
        if self.rooms.len() >= MAX_ROOMS {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        validate_descriptor(&descriptor)?;
        if !self.buildings.contains_key(&building_id) {
            return Err(EngineError::NotFound(building_id));
        }

        let room = RoomState::new(id, building_id, descriptor.clone());
        match self.rooms.entry(id) {
            Entry::Occupied(_) => return Err(EngineError::AlreadyExists(id)),
            Entry::Vacant(v) => {
                v.insert(Arc::new(RwLock::new(room)));
            }
        }

        let event = Event::RoomCreated {
            id,
            building_id,
            descriptor,
        };
        if let Err(e) = self.wal_append(&event).await {
            self.rooms.remove(&id);
            return Err(e);
        }
        self.building_rooms.entry(building_id).or_default().push(id);
        metrics::gauge!(observability::ROOMS_ACTIVE).increment(1.0);
        self.notify.send(id, &event);
        Ok(())
    }

    /// Update descriptive fields only. Identity and building are immutable,
    /// and the ledger is untouched.
    pub async fn update_room(&self, id: Ulid, descriptor: RoomDescriptor) -> Result<(), EngineError> {
        validate_descriptor(&descriptor)?;
        let room = self.get_room(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = room.write().await;

        let event = Event::RoomUpdated { id, descriptor };
        self.persist_and_apply(id, &mut guard, &event).await
    }

    /// Take a room off the market. History is kept; existing reservations can
    /// still be transitioned, but booking and availability stop.
    pub async fn retire_room(&self, id: Ulid) -> Result<(), EngineError> {
        let room = self.get_room(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = room.write().await;
        if !guard.active {
            return Err(EngineError::NotFound(id));
        }

        let event = Event::RoomRetired { id };
        self.persist_and_apply(id, &mut guard, &event).await?;
        metrics::gauge!(observability::ROOMS_ACTIVE).decrement(1.0);
        Ok(())
    }

    /// Upsert the weekly window for one weekday. Replaces any previous window
    /// on that weekday, which keeps the one-active-window-per-weekday
    /// invariant by construction.
    pub async fn set_window(
        &self,
        id: Ulid,
        room_id: Ulid,
        weekday: Weekday,
        open: chrono::NaiveTime,
        close: chrono::NaiveTime,
    ) -> Result<(), EngineError> {
        if open >= close {
            return Err(EngineError::InvalidArgument("open must be before close"));
        }
        let room = self.get_room(&room_id).ok_or(EngineError::NotFound(room_id))?;
        let mut guard = room.write().await;

        let event = Event::WindowSet {
            id,
            room_id,
            weekday,
            open,
            close,
        };
        self.persist_and_apply(room_id, &mut guard, &event).await
    }

    /// Remove the window for one weekday. Idempotent: clearing an unset
    /// weekday is a no-op and writes nothing.
    pub async fn clear_window(&self, room_id: Ulid, weekday: Weekday) -> Result<(), EngineError> {
        let room = self.get_room(&room_id).ok_or(EngineError::NotFound(room_id))?;
        let mut guard = room.write().await;
        if guard.window_for(weekday).is_none() {
            return Ok(());
        }

        let event = Event::WindowCleared { room_id, weekday };
        self.persist_and_apply(room_id, &mut guard, &event).await
    }

    /// Book a room. Validates the range, weekly-window containment, and
    /// overlap against every pending/accepted reservation on the same room
    /// and date; the room's write lock is held across check and insert so
    /// concurrent attempts serialize instead of double-booking.
    ///
    /// Returns the initial status: `Pending`, or `Accepted` when the room
    /// auto-accepts.
    pub async fn create_reservation(
        &self,
        id: Ulid,
        room_id: Ulid,
        actor: Actor,
        date: NaiveDate,
        range: TimeRange,
        notes: Option<String>,
    ) -> Result<ReservationStatus, EngineError> {
        if actor.role != Role::Tenant {
            return Err(EngineError::PermissionDenied("only tenants may book"));
        }
        let tenant = self
            .users
            .get(&actor.id)
            .ok_or(EngineError::NotFound(actor.id))?;
        if !tenant.active || tenant.role != Role::Tenant {
            return Err(EngineError::PermissionDenied("only tenants may book"));
        }
        drop(tenant);

        validate_range(&range)?;
        if let Some(ref n) = notes
            && n.len() > MAX_NOTES_LEN
        {
            return Err(EngineError::LimitExceeded("notes too long"));
        }
        let room = self.get_room(&room_id).ok_or(EngineError::NotFound(room_id))?;
        let mut guard = room.write().await;
        if !guard.active {
            return Err(EngineError::NotFound(room_id));
        }
        if guard.reservations.len() >= MAX_RESERVATIONS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many reservations on room"));
        }

        check_within_window(&guard, date, &range)?;
        if let Err(e) = check_no_conflict(&guard, date, &range) {
            metrics::counter!(observability::RESERVATION_CONFLICTS_TOTAL).increment(1);
            return Err(e);
        }

        let status = if guard.descriptor.auto_accept {
            ReservationStatus::Accepted
        } else {
            ReservationStatus::Pending
        };
        let total_cents =
            guard.descriptor.price_cents_per_hour * range.duration_minutes() / 60;

        // Claim the id in the reverse index; rolled back if the append fails.
        match self.reservation_room.entry(id) {
            Entry::Occupied(_) => return Err(EngineError::AlreadyExists(id)),
            Entry::Vacant(v) => {
                v.insert(room_id);
            }
        }

        let event = Event::ReservationCreated {
            id,
            room_id,
            tenant_id: actor.id,
            date,
            range,
            status,
            total_cents,
            notes,
            created_at: now_ms(),
        };
        if let Err(e) = self.persist_and_apply(room_id, &mut guard, &event).await {
            self.reservation_room.remove(&id);
            return Err(e);
        }
        metrics::counter!(
            observability::RESERVATIONS_CREATED_TOTAL,
            "status" => observability::status_label(status)
        )
        .increment(1);
        Ok(status)
    }

    /// Move a reservation through its lifecycle.
    ///
    /// Authorization: only the reserving tenant may cancel; only the room's
    /// building owner may accept or decline. The transition table is then
    /// enforced: `pending → accepted | declined | cancelled`,
    /// `accepted → cancelled`, terminal states absorb.
    pub async fn transition_reservation(
        &self,
        id: Ulid,
        new_status: ReservationStatus,
        actor: Actor,
    ) -> Result<(), EngineError> {
        let (room_id, mut guard) = self.resolve_reservation_write(&id).await?;
        let reservation = guard.reservation(&id).ok_or(EngineError::NotFound(id))?;
        let current = reservation.status;

        match new_status {
            ReservationStatus::Cancelled => {
                if reservation.tenant_id != actor.id {
                    return Err(EngineError::PermissionDenied(
                        "only the reserving tenant may cancel",
                    ));
                }
            }
            ReservationStatus::Accepted | ReservationStatus::Declined => {
                let building = self
                    .buildings
                    .get(&guard.building_id)
                    .ok_or(EngineError::NotFound(guard.building_id))?;
                if building.owner_id != actor.id {
                    return Err(EngineError::PermissionDenied(
                        "only the building owner may decide a request",
                    ));
                }
            }
            ReservationStatus::Pending => {
                return Err(EngineError::InvalidState {
                    from: current,
                    to: new_status,
                });
            }
        }

        if !current.can_transition_to(new_status) {
            return Err(EngineError::InvalidState {
                from: current,
                to: new_status,
            });
        }

        let event = Event::ReservationTransitioned {
            id,
            room_id,
            status: new_status,
            at: now_ms(),
        };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        metrics::counter!(
            observability::RESERVATION_TRANSITIONS_TOTAL,
            "status" => observability::status_label(new_status)
        )
        .increment(1);
        Ok(())
    }

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();

        for entry in self.buildings.iter() {
            let b = entry.value();
            events.push(Event::BuildingCreated {
                id: b.id,
                owner_id: b.owner_id,
                name: b.name.clone(),
            });
        }

        for entry in self.users.iter() {
            let u = entry.value();
            events.push(Event::UserRegistered {
                id: u.id,
                name: u.name.clone(),
                email: u.email.clone(),
                role: u.role,
                tax_id: u.tax_id.clone(),
                phone: u.phone.clone(),
                created_at: u.created_at,
            });
            if !u.active {
                events.push(Event::UserDeactivated { id: u.id });
            }
        }

        // Snapshot the Arcs first, then await each room's read lock. A
        // booking in flight holds its room's write lock across the WAL
        // append, so compaction must wait for it, not assume no contention.
        let rooms: Vec<_> = self.rooms.iter().map(|e| e.value().clone()).collect();
        for room_arc in rooms {
            let guard = room_arc.read().await;

            events.push(Event::RoomCreated {
                id: guard.id,
                building_id: guard.building_id,
                descriptor: guard.descriptor.clone(),
            });
            if !guard.active {
                events.push(Event::RoomRetired { id: guard.id });
            }
            for w in &guard.windows {
                events.push(Event::WindowSet {
                    id: w.id,
                    room_id: guard.id,
                    weekday: w.weekday,
                    open: w.open,
                    close: w.close,
                });
            }
            for r in &guard.reservations {
                events.push(Event::ReservationCreated {
                    id: r.id,
                    room_id: r.room_id,
                    tenant_id: r.tenant_id,
                    date: r.date,
                    range: r.range,
                    status: r.status,
                    total_cents: r.total_cents,
                    notes: r.notes.clone(),
                    created_at: r.created_at,
                });
                // Re-applying the creation resets updated_at; restate it when
                // the reservation has moved since creation.
                if r.updated_at != r.created_at {
                    events.push(Event::ReservationTransitioned {
                        id: r.id,
                        room_id: r.room_id,
                        status: r.status,
                        at: r.updated_at,
                    });
                }
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

fn validate_descriptor(descriptor: &RoomDescriptor) -> Result<(), EngineError> {
    if descriptor.name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("room name too long"));
    }
    if descriptor.category.len() > MAX_CATEGORY_LEN {
        return Err(EngineError::LimitExceeded("category too long"));
    }
    if descriptor.capacity == 0 {
        return Err(EngineError::InvalidArgument("capacity must be positive"));
    }
    if descriptor.price_cents_per_hour < 0 {
        return Err(EngineError::InvalidArgument("price must not be negative"));
    }
    Ok(())
}
