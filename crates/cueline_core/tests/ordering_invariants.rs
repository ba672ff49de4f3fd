use cueline_core::db::open_db_in_memory;
use cueline_core::{
    PlaylistId, SqliteTrackRepository, Track, TrackId, TrackRepository, TrackService, TrackUpdate,
};
use uuid::Uuid;

fn setup() -> rusqlite::Connection {
    open_db_in_memory().unwrap()
}

fn service(conn: &rusqlite::Connection) -> TrackService<SqliteTrackRepository<'_>> {
    TrackService::new(SqliteTrackRepository::try_new(conn).unwrap())
}

fn add(
    service: &TrackService<SqliteTrackRepository<'_>>,
    playlist: Option<PlaylistId>,
    title: &str,
) -> Track {
    service.create_track(playlist, title).unwrap()
}

fn playlist_order(
    service: &TrackService<SqliteTrackRepository<'_>>,
    playlist: Option<PlaylistId>,
) -> Vec<(TrackId, i64)> {
    service
        .list_tracks(playlist)
        .unwrap()
        .into_iter()
        .map(|track| (track.uuid, track.sort_order.expect("active track has slot")))
        .collect()
}

fn assert_dense(
    service: &TrackService<SqliteTrackRepository<'_>>,
    playlist: Option<PlaylistId>,
) {
    let order = playlist_order(service, playlist);
    for (index, (id, sort_order)) in order.iter().enumerate() {
        assert_eq!(
            *sort_order, index as i64,
            "track {id} holds slot {sort_order}, expected {index}"
        );
    }
}

#[test]
fn create_appends_at_end_of_each_playlist() {
    let conn = setup();
    let service = service(&conn);
    let playlist = Some(Uuid::new_v4());
    let other = Some(Uuid::new_v4());

    let a = add(&service, playlist, "A");
    let b = add(&service, playlist, "B");
    let unfiled = add(&service, None, "Unfiled");
    let elsewhere = add(&service, other, "Elsewhere");

    assert_eq!(a.sort_order, Some(0));
    assert_eq!(b.sort_order, Some(1));
    assert_eq!(unfiled.sort_order, Some(0));
    assert_eq!(elsewhere.sort_order, Some(0));
}

#[test]
fn reorder_down_shifts_only_the_passed_range() {
    let conn = setup();
    let service = service(&conn);
    let playlist = Some(Uuid::new_v4());

    let a = add(&service, playlist, "A");
    let b = add(&service, playlist, "B");
    let c = add(&service, playlist, "C");
    let d = add(&service, playlist, "D");

    service.reorder_track(a.uuid, 2).unwrap();

    let order = playlist_order(&service, playlist);
    assert_eq!(
        order,
        vec![(b.uuid, 0), (c.uuid, 1), (a.uuid, 2), (d.uuid, 3)]
    );
}

#[test]
fn reorder_up_shifts_only_the_passed_range() {
    let conn = setup();
    let service = service(&conn);
    let playlist = Some(Uuid::new_v4());

    let a = add(&service, playlist, "A");
    let b = add(&service, playlist, "B");
    let c = add(&service, playlist, "C");
    let d = add(&service, playlist, "D");

    service.reorder_track(d.uuid, 1).unwrap();

    let order = playlist_order(&service, playlist);
    assert_eq!(
        order,
        vec![(a.uuid, 0), (d.uuid, 1), (b.uuid, 2), (c.uuid, 3)]
    );
}

#[test]
fn move_to_other_playlist_appends_and_compacts_departure() {
    let conn = setup();
    let service = service(&conn);
    let from = Some(Uuid::new_v4());
    let to = Some(Uuid::new_v4());

    let a = add(&service, from, "A");
    let b = add(&service, from, "B");
    let c = add(&service, from, "C");
    let x = add(&service, to, "X");
    let y = add(&service, to, "Y");

    let moved = service.move_track(b.uuid, to).unwrap();

    assert_eq!(moved.playlist_uuid, to);
    assert_eq!(moved.sort_order, Some(2));

    let departure = playlist_order(&service, from);
    assert_eq!(departure, vec![(a.uuid, 0), (c.uuid, 1)]);

    let arrival = playlist_order(&service, to);
    assert_eq!(arrival, vec![(x.uuid, 0), (y.uuid, 1), (b.uuid, 2)]);
}

#[test]
fn move_to_unfiled_queue_behaves_like_any_other_group() {
    let conn = setup();
    let service = service(&conn);
    let from = Some(Uuid::new_v4());

    let a = add(&service, from, "A");
    let b = add(&service, from, "B");
    let queued = add(&service, None, "Queued");

    let moved = service.move_track(a.uuid, None).unwrap();
    assert_eq!(moved.playlist_uuid, None);
    assert_eq!(moved.sort_order, Some(1));

    assert_eq!(playlist_order(&service, from), vec![(b.uuid, 0)]);
    assert_eq!(
        playlist_order(&service, None),
        vec![(queued.uuid, 0), (moved.uuid, 1)]
    );
}

#[test]
fn delete_compacts_and_restore_appends_at_current_end() {
    let conn = setup();
    let service = service(&conn);
    let playlist = Some(Uuid::new_v4());

    let a = add(&service, playlist, "A");
    let b = add(&service, playlist, "B");
    let c = add(&service, playlist, "C");
    let d = add(&service, playlist, "D");

    service.remove_track(b.uuid).unwrap();

    let after_delete = playlist_order(&service, playlist);
    assert_eq!(
        after_delete,
        vec![(a.uuid, 0), (c.uuid, 1), (d.uuid, 2)]
    );

    // The playlist keeps evolving while B is tombstoned.
    let e = add(&service, playlist, "E");
    assert_eq!(e.sort_order, Some(3));

    // Restore appends at the new end, not at B's original slot 1.
    let restored = service.restore_track(b.uuid).unwrap();
    assert_eq!(restored.sort_order, Some(4));
    assert_dense(&service, playlist);
}

#[test]
fn walkthrough_reorder_delete_create_keeps_dense_order() {
    let conn = setup();
    let service = service(&conn);
    let playlist = Some(Uuid::new_v4());

    let a = add(&service, playlist, "A");
    let b = add(&service, playlist, "B");
    let c = add(&service, playlist, "C");
    let d = add(&service, playlist, "D");

    service.reorder_track(a.uuid, 2).unwrap();
    assert_eq!(
        playlist_order(&service, playlist),
        vec![(b.uuid, 0), (c.uuid, 1), (a.uuid, 2), (d.uuid, 3)]
    );

    service.remove_track(c.uuid).unwrap();
    assert_eq!(
        playlist_order(&service, playlist),
        vec![(b.uuid, 0), (a.uuid, 1), (d.uuid, 2)]
    );

    let e = add(&service, playlist, "E");
    assert_eq!(e.sort_order, Some(3));
    assert_dense(&service, playlist);
}

#[test]
fn mixed_event_sequence_keeps_every_playlist_dense() {
    let conn = setup();
    let service = service(&conn);
    let first = Some(Uuid::new_v4());
    let second = Some(Uuid::new_v4());

    let a = add(&service, first, "A");
    let b = add(&service, first, "B");
    let c = add(&service, first, "C");
    let d = add(&service, second, "D");
    let e = add(&service, second, "E");
    let f = add(&service, None, "F");

    service.reorder_track(c.uuid, 0).unwrap();
    service.move_track(a.uuid, second).unwrap();
    service.remove_track(d.uuid).unwrap();
    service.move_track(f.uuid, first).unwrap();
    service.restore_track(d.uuid).unwrap();
    service.reorder_track(e.uuid, 2).unwrap();
    service.remove_track(b.uuid).unwrap();

    assert_dense(&service, first);
    assert_dense(&service, second);
    assert_dense(&service, None);

    // Every active track is accounted for exactly once.
    let total = service.list_tracks(first).unwrap().len()
        + service.list_tracks(second).unwrap().len()
        + service.list_tracks(None).unwrap().len();
    assert_eq!(total, 5);
}

#[test]
fn reorder_and_move_in_one_update_appends_to_new_playlist() {
    let conn = setup();
    let repo = SqliteTrackRepository::try_new(&conn).unwrap();
    let from = Some(Uuid::new_v4());
    let to = Some(Uuid::new_v4());

    let a = repo.create_track(&Track::new(from, "A")).unwrap();
    let b = repo.create_track(&Track::new(from, "B")).unwrap();
    let c = repo.create_track(&Track::new(from, "C")).unwrap();
    let x = repo.create_track(&Track::new(to, "X")).unwrap();
    let y = repo.create_track(&Track::new(to, "Y")).unwrap();

    // Names both a target index and a new playlist: the playlist move takes
    // precedence and the requested index is ignored.
    let mut update = TrackUpdate::new(b.uuid);
    update.playlist = Some(to);
    update.sort_order = Some(0);
    let moved = repo.update_track(&update).unwrap();

    assert_eq!(moved.playlist_uuid, to);
    assert_eq!(moved.sort_order, Some(2));

    let departure: Vec<_> = repo
        .list_tracks(from, false)
        .unwrap()
        .into_iter()
        .map(|track| (track.uuid, track.sort_order))
        .collect();
    assert_eq!(
        departure,
        vec![(a.uuid, Some(0)), (c.uuid, Some(1))]
    );

    let arrival: Vec<_> = repo
        .list_tracks(to, false)
        .unwrap()
        .into_iter()
        .map(|track| (track.uuid, track.sort_order))
        .collect();
    assert_eq!(
        arrival,
        vec![(x.uuid, Some(0)), (y.uuid, Some(1)), (b.uuid, Some(2))]
    );
}

#[test]
fn reorder_request_on_tombstoned_track_is_dropped() {
    let conn = setup();
    let repo = SqliteTrackRepository::try_new(&conn).unwrap();
    let playlist = Some(Uuid::new_v4());

    let a = repo.create_track(&Track::new(playlist, "A")).unwrap();
    let b = repo.create_track(&Track::new(playlist, "B")).unwrap();
    repo.soft_delete_track(a.uuid).unwrap();

    // The tombstoned row has no slot; there is nothing to reconcile, so the
    // request is dropped while the rename still applies.
    let mut update = TrackUpdate::new(a.uuid);
    update.title = Some("A, renamed".to_string());
    update.sort_order = Some(1);
    let updated = repo.update_track(&update).unwrap();

    assert_eq!(updated.title, "A, renamed");
    assert_eq!(updated.sort_order, None);
    assert!(updated.is_deleted);

    let active: Vec<_> = repo
        .list_tracks(playlist, false)
        .unwrap()
        .into_iter()
        .map(|track| (track.uuid, track.sort_order))
        .collect();
    assert_eq!(active, vec![(b.uuid, Some(0))]);
}

#[test]
fn moving_a_tombstoned_track_retargets_its_restore() {
    let conn = setup();
    let repo = SqliteTrackRepository::try_new(&conn).unwrap();
    let from = Some(Uuid::new_v4());
    let to = Some(Uuid::new_v4());

    let a = repo.create_track(&Track::new(from, "A")).unwrap();
    let x = repo.create_track(&Track::new(to, "X")).unwrap();
    repo.soft_delete_track(a.uuid).unwrap();

    let mut update = TrackUpdate::new(a.uuid);
    update.playlist = Some(to);
    let moved = repo.update_track(&update).unwrap();

    // Still tombstoned, still without a slot; no playlist was disturbed.
    assert!(moved.is_deleted);
    assert_eq!(moved.playlist_uuid, to);
    assert_eq!(moved.sort_order, None);
    assert!(repo.list_tracks(from, false).unwrap().is_empty());

    let restored = repo.restore_track(a.uuid).unwrap();
    assert_eq!(restored.playlist_uuid, to);
    assert_eq!(restored.sort_order, Some(1));

    let arrival: Vec<_> = repo
        .list_tracks(to, false)
        .unwrap()
        .into_iter()
        .map(|track| (track.uuid, track.sort_order))
        .collect();
    assert_eq!(arrival, vec![(x.uuid, Some(0)), (a.uuid, Some(1))]);
}

#[test]
fn failed_move_rolls_back_both_playlists() {
    let conn = setup();
    let from = Some(Uuid::new_v4());
    let to = Some(Uuid::new_v4());

    let (a, b, x) = {
        let repo = SqliteTrackRepository::try_new(&conn).unwrap();
        let a = repo.create_track(&Track::new(from, "A")).unwrap();
        let b = repo.create_track(&Track::new(from, "B")).unwrap();
        let x = repo.create_track(&Track::new(to, "X")).unwrap();
        (a, b, x)
    };

    // Fail the arrival append: the mover's slot assignment is the only
    // update that writes it a non-NULL sort_order during the move.
    conn.execute_batch(&format!(
        "CREATE TRIGGER tracks_fail_append_test
         BEFORE UPDATE OF sort_order ON tracks
         WHEN NEW.uuid = '{}' AND NEW.sort_order IS NOT NULL
         BEGIN
             SELECT RAISE(ABORT, 'forced append failure');
         END;",
        a.uuid
    ))
    .unwrap();

    let repo = SqliteTrackRepository::try_new(&conn).unwrap();
    let mut update = TrackUpdate::new(a.uuid);
    update.playlist = Some(to);
    assert!(repo.update_track(&update).is_err());

    // The whole event rolled back: departure still holds A at slot 0.
    let departure: Vec<_> = repo
        .list_tracks(from, false)
        .unwrap()
        .into_iter()
        .map(|track| (track.uuid, track.sort_order))
        .collect();
    assert_eq!(
        departure,
        vec![(a.uuid, Some(0)), (b.uuid, Some(1))]
    );

    let arrival: Vec<_> = repo
        .list_tracks(to, false)
        .unwrap()
        .into_iter()
        .map(|track| (track.uuid, track.sort_order))
        .collect();
    assert_eq!(arrival, vec![(x.uuid, Some(0))]);
}
