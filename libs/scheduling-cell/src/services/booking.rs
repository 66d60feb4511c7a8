// libs/scheduling-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use realtime_cell::{EventKind, RealtimeHub, Topic};
use shared_config::AppConfig;
use shared_database::{Collection, DocumentStore, Filter};

use crate::models::{
    BookSessionRequest, CreateRoomRequest, Room, SchedulingError, SessionSearchQuery,
    SessionStatus, Slot, TherapySession, UpdateRoomRequest, UpdateSessionRequest,
};
use crate::services::locks::RoomLocks;
use crate::services::validator::{can_book_room, validate_slots};

/// Rooms, their weekly slots, and the therapy sessions booked against them.
pub struct SchedulingService {
    rooms: Arc<dyn Collection<Room>>,
    sessions: Arc<dyn Collection<TherapySession>>,
    locks: RoomLocks,
    hub: Arc<RealtimeHub>,
    offset: FixedOffset,
}

impl SchedulingService {
    pub fn new(store: &DocumentStore, hub: Arc<RealtimeHub>, config: &AppConfig) -> Self {
        let offset = FixedOffset::east_opt(config.clinic_utc_offset_minutes * 60).unwrap_or_else(|| {
            warn!(
                "CLINIC_UTC_OFFSET_MINUTES={} is out of range, using UTC",
                config.clinic_utc_offset_minutes
            );
            Utc.fix()
        });

        Self {
            rooms: store.collection::<Room>(),
            sessions: store.collection::<TherapySession>(),
            locks: RoomLocks::new(),
            hub,
            offset,
        }
    }

    pub fn clinic_offset(&self) -> FixedOffset {
        self.offset
    }

    // ==========================================================================
    // ROOMS
    // ==========================================================================

    pub async fn create_room(&self, request: CreateRoomRequest) -> Result<Room, SchedulingError> {
        if request.name.trim().is_empty() {
            return Err(SchedulingError::ValidationError("Room name is required".to_string()));
        }
        if request.room_type.trim().is_empty() {
            return Err(SchedulingError::ValidationError("Room type is required".to_string()));
        }
        validate_slots(&request.slots)?;

        let capacity = request.capacity.unwrap_or(1);
        if capacity < 1 {
            return Err(SchedulingError::ValidationError("Capacity must be at least 1".to_string()));
        }

        let now = Utc::now();
        let room = Room {
            id: Uuid::new_v4(),
            name: request.name.trim().to_string(),
            room_type: request.room_type.trim().to_string(),
            capacity,
            is_available: request.is_available.unwrap_or(true),
            slots: request.slots,
            created_at: now,
            updated_at: now,
        };

        let room = self.rooms.insert(room).await?;
        info!("Room {} ({}) created with {} slots", room.name, room.id, room.slots.len());
        Ok(room)
    }

    pub async fn list_rooms(&self) -> Result<Vec<Room>, SchedulingError> {
        let mut rooms = self.rooms.all().await?;
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rooms)
    }

    pub async fn get_room(&self, room_id: Uuid) -> Result<Room, SchedulingError> {
        self.rooms.get(room_id).await?.ok_or(SchedulingError::RoomNotFound)
    }

    pub async fn update_room(
        &self,
        room_id: Uuid,
        request: UpdateRoomRequest,
    ) -> Result<Room, SchedulingError> {
        let _guard = self.locks.acquire(room_id).await;
        let mut room = self.get_room(room_id).await?;

        if let Some(name) = request.name {
            if name.trim().is_empty() {
                return Err(SchedulingError::ValidationError("Room name is required".to_string()));
            }
            room.name = name.trim().to_string();
        }
        if let Some(room_type) = request.room_type {
            room.room_type = room_type.trim().to_string();
        }
        if let Some(capacity) = request.capacity {
            if capacity < 1 {
                return Err(SchedulingError::ValidationError("Capacity must be at least 1".to_string()));
            }
            room.capacity = capacity;
        }
        if let Some(is_available) = request.is_available {
            room.is_available = is_available;
        }
        if let Some(slots) = request.slots {
            validate_slots(&slots)?;
            room.slots = slots;
        }
        room.updated_at = Utc::now();

        let room = self.rooms.update(room).await?;
        info!("Room {} updated", room.id);
        Ok(room)
    }

    /// Deletes a room that has no scheduled or ongoing sessions.
    pub async fn delete_room(&self, room_id: Uuid) -> Result<(), SchedulingError> {
        let guard = self.locks.acquire(room_id).await;
        self.get_room(room_id).await?;

        let active = self
            .room_sessions(room_id)
            .await?
            .into_iter()
            .any(|s| matches!(s.status, SessionStatus::Scheduled | SessionStatus::Ongoing));
        if active {
            return Err(SchedulingError::RoomInUse);
        }

        self.rooms.delete(room_id).await?;
        drop(guard);
        self.locks.forget(room_id);

        info!("Room {} deleted", room_id);
        Ok(())
    }

    // ==========================================================================
    // AVAILABILITY & BOOKING
    // ==========================================================================

    /// Read-only booking check.
    pub async fn check_availability(
        &self,
        room_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Slot, SchedulingError> {
        let room = self.get_room(room_id).await?;
        let existing = self.room_sessions(room_id).await?;
        can_book_room(&room, start, end, &existing, self.offset)
    }

    /// Books a session. The capacity check and the insert run under the
    /// room's lock, so concurrent requests for the last unit of capacity
    /// cannot both succeed.
    #[instrument(skip(self, request), fields(room_id = %request.room_id))]
    pub async fn book_session(
        &self,
        request: BookSessionRequest,
        booked_by: Uuid,
    ) -> Result<TherapySession, SchedulingError> {
        if request.therapy_type.trim().is_empty() {
            return Err(SchedulingError::ValidationError("Therapy type is required".to_string()));
        }

        let session = {
            let _guard = self.locks.acquire(request.room_id).await;

            let room = self.get_room(request.room_id).await?;
            let existing = self.room_sessions(room.id).await?;
            let slot = can_book_room(&room, request.start_time, request.end_time, &existing, self.offset)?;
            debug!("Booking fits slot {}-{} of room {}", slot.start_time, slot.end_time, room.name);

            let now = Utc::now();
            let session = TherapySession {
                id: Uuid::new_v4(),
                patient_id: request.patient_id,
                practitioner_id: request.practitioner_id,
                room_id: room.id,
                therapy_type: request.therapy_type.trim().to_string(),
                start_time: request.start_time,
                end_time: request.end_time,
                status: SessionStatus::Scheduled,
                notes: request.notes,
                appointment_id: request.appointment_id,
                booked_by,
                created_at: now,
                updated_at: now,
            };
            self.sessions.insert(session).await?
        };

        info!(
            "Session {} booked in room {} from {} to {}",
            session.id, session.room_id, session.start_time, session.end_time
        );
        self.publish(EventKind::SessionCreated, &session).await;
        Ok(session)
    }

    // ==========================================================================
    // SESSIONS
    // ==========================================================================

    pub async fn list_sessions(
        &self,
        query: &SessionSearchQuery,
    ) -> Result<Vec<TherapySession>, SchedulingError> {
        let mut filter = Filter::new();
        if let Some(room_id) = query.room_id {
            filter = filter.eq("room_id", room_id);
        }
        if let Some(patient_id) = query.patient_id {
            filter = filter.eq("patient_id", patient_id);
        }
        if let Some(practitioner_id) = query.practitioner_id {
            filter = filter.eq("practitioner_id", practitioner_id);
        }
        if let Some(status) = query.status {
            filter = filter.eq("status", status);
        }

        let mut sessions = self.sessions.find(&filter).await?;
        sessions.sort_by_key(|s| s.start_time);
        Ok(sessions)
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<TherapySession, SchedulingError> {
        self.sessions.get(session_id).await?.ok_or(SchedulingError::SessionNotFound)
    }

    /// Scheduled sessions starting within `[from, until)`.
    pub async fn sessions_starting_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<TherapySession>, SchedulingError> {
        let filter = Filter::new().eq("status", SessionStatus::Scheduled);
        Ok(self
            .sessions
            .find(&filter)
            .await?
            .into_iter()
            .filter(|s| s.start_time >= from && s.start_time < until)
            .collect())
    }

    pub async fn update_session(
        &self,
        session_id: Uuid,
        request: UpdateSessionRequest,
    ) -> Result<TherapySession, SchedulingError> {
        let current = self.get_session(session_id).await?;
        let _guard = self.locks.acquire(current.room_id).await;

        // re-read under the lock
        let mut session = self.get_session(session_id).await?;

        if let Some(next) = request.status {
            if next != session.status {
                if !session.status.can_transition_to(next) {
                    return Err(SchedulingError::InvalidStatusTransition { from: session.status, to: next });
                }
                debug!("Session {} {} -> {}", session.id, session.status, next);
                session.status = next;
            }
        }

        if request.start_time.is_some() || request.end_time.is_some() {
            if session.status != SessionStatus::Scheduled {
                return Err(SchedulingError::ValidationError(
                    "Only scheduled sessions can be moved".to_string(),
                ));
            }
            let start = request.start_time.unwrap_or(session.start_time);
            let end = request.end_time.unwrap_or(session.end_time);

            let room = self.get_room(session.room_id).await?;
            let others: Vec<TherapySession> = self
                .room_sessions(room.id)
                .await?
                .into_iter()
                .filter(|s| s.id != session.id)
                .collect();
            can_book_room(&room, start, end, &others, self.offset)?;

            session.start_time = start;
            session.end_time = end;
        }

        if let Some(notes) = request.notes {
            session.notes = Some(notes);
        }
        session.updated_at = Utc::now();

        let session = self.sessions.update(session).await?;
        self.publish(EventKind::SessionUpdated, &session).await;
        Ok(session)
    }

    pub async fn delete_session(&self, session_id: Uuid) -> Result<(), SchedulingError> {
        let session = self.get_session(session_id).await?;
        if !self.sessions.delete(session_id).await? {
            return Err(SchedulingError::SessionNotFound);
        }

        info!("Session {} deleted", session_id);
        self.publish(EventKind::SessionDeleted, &session).await;
        Ok(())
    }

    async fn room_sessions(&self, room_id: Uuid) -> Result<Vec<TherapySession>, SchedulingError> {
        Ok(self.sessions.find(&Filter::new().eq("room_id", room_id)).await?)
    }

    async fn publish(&self, event: EventKind, session: &TherapySession) {
        self.hub.publish(Topic::Session(session.id), event, session).await;
        self.hub.publish(Topic::Room(session.room_id), event, session).await;
    }
}
