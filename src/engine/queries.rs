use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;

use super::availability::resolve_day;
use super::{Engine, EngineError};

impl Engine {
    /// The Availability Resolver: effective open slots for a room on one
    /// date. Pure read; may run while writers are queued (slightly stale
    /// results are re-validated at booking time).
    pub async fn day_availability(
        &self,
        room_id: Ulid,
        date: NaiveDate,
    ) -> Result<Vec<TimeRange>, EngineError> {
        let room = self.get_room(&room_id).ok_or(EngineError::NotFound(room_id))?;
        let guard = room.read().await;
        if !guard.active {
            return Err(EngineError::NotFound(room_id));
        }
        Ok(resolve_day(&guard, date))
    }

    pub fn get_building(&self, id: &Ulid) -> Option<Building> {
        self.buildings.get(id).map(|e| e.value().clone())
    }

    pub fn list_buildings(&self) -> Vec<Building> {
        self.buildings.iter().map(|e| e.value().clone()).collect()
    }

    pub fn get_user(&self, id: &Ulid) -> Option<UserRecord> {
        self.users.get(id).map(|e| e.value().clone())
    }

    pub fn user_by_email(&self, email: &str) -> Option<UserRecord> {
        let id = *self.emails.get(email)?.value();
        self.get_user(&id)
    }

    pub async fn get_room_info(&self, id: Ulid) -> Result<RoomInfo, EngineError> {
        let room = self.get_room(&id).ok_or(EngineError::NotFound(id))?;
        let guard = room.read().await;
        Ok(RoomInfo {
            id: guard.id,
            building_id: guard.building_id,
            descriptor: guard.descriptor.clone(),
            active: guard.active,
        })
    }

    /// Rooms of one building, retired ones included.
    pub async fn rooms_in_building(&self, building_id: Ulid) -> Result<Vec<RoomInfo>, EngineError> {
        if !self.buildings.contains_key(&building_id) {
            return Err(EngineError::NotFound(building_id));
        }
        let ids = self
            .building_rooms
            .get(&building_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();

        let mut infos = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(room) = self.get_room(&id) {
                let guard = room.read().await;
                infos.push(RoomInfo {
                    id: guard.id,
                    building_id: guard.building_id,
                    descriptor: guard.descriptor.clone(),
                    active: guard.active,
                });
            }
        }
        Ok(infos)
    }

    /// Weekly template of a room, in weekday order.
    pub async fn get_windows(&self, room_id: Ulid) -> Result<Vec<WeeklyWindow>, EngineError> {
        let room = self.get_room(&room_id).ok_or(EngineError::NotFound(room_id))?;
        let guard = room.read().await;
        let mut windows = guard.windows.clone();
        windows.sort_by_key(|w| w.weekday);
        Ok(windows)
    }

    pub async fn get_reservation(&self, id: Ulid) -> Result<Reservation, EngineError> {
        let room_id = self
            .room_for_reservation(&id)
            .ok_or(EngineError::NotFound(id))?;
        let room = self.get_room(&room_id).ok_or(EngineError::NotFound(room_id))?;
        let guard = room.read().await;
        guard
            .reservation(&id)
            .cloned()
            .ok_or(EngineError::NotFound(id))
    }

    /// Ledger of one room; `date` narrows to a single day.
    pub async fn reservations_for_room(
        &self,
        room_id: Ulid,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Reservation>, EngineError> {
        let room = self.get_room(&room_id).ok_or(EngineError::NotFound(room_id))?;
        let guard = room.read().await;
        Ok(match date {
            Some(d) => guard.reservations_on(d).to_vec(),
            None => guard.reservations.clone(),
        })
    }

    /// Every reservation a tenant has made, across all rooms.
    pub async fn reservations_for_tenant(&self, tenant_id: Ulid) -> Vec<Reservation> {
        let rooms: Vec<_> = self.rooms.iter().map(|e| e.value().clone()).collect();
        let mut result = Vec::new();
        for room in rooms {
            let guard = room.read().await;
            result.extend(
                guard
                    .reservations
                    .iter()
                    .filter(|r| r.tenant_id == tenant_id)
                    .cloned(),
            );
        }
        result.sort_by_key(|r| (r.date, r.range.start));
        result
    }
}
