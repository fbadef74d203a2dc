//! Board snapshots: what the simulating peer sends every tick and how the
//! observing peer loads it

use tracing::warn;

use crate::net::protocol::{BoardUpdate, ObjectModel};

use super::{MatchStatus, MouseState, Pitch};

/// Serialize every body plus the local pointer
pub fn build_board_update(
    pitch: &Pitch,
    mouse: MouseState,
    status: Option<MatchStatus>,
) -> BoardUpdate {
    let objects = pitch
        .bodies()
        .iter()
        .map(|b| ObjectModel {
            id: b.id,
            pos: b.position.into(),
            velocity: b.velocity.into(),
        })
        .collect();

    BoardUpdate {
        mouse: mouse.into(),
        objects,
        status,
    }
}

/// Overwrite body kinematics by id. Unknown ids are skipped; the count of
/// skipped entries is returned.
pub fn apply_board_update(pitch: &mut Pitch, update: &BoardUpdate) -> usize {
    let mut unknown = 0;
    for object in &update.objects {
        if !pitch.load_body(object.id, object.pos.into(), object.velocity.into()) {
            warn!(body_id = object.id, "Snapshot references an unknown body");
            unknown += 1;
        }
    }
    unknown
}

/// Running totals for snapshot traffic
#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotStats {
    pub sent: u64,
    pub received: u64,
    pub skipped_objects: u64,
}

impl SnapshotStats {
    pub fn record_sent(&mut self) {
        self.sent += 1;
    }

    pub fn record_received(&mut self, skipped: usize) {
        self.received += 1;
        self.skipped_objects += skipped as u64;
    }
}
