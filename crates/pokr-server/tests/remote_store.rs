use std::time::Duration;

use tokio::net::TcpListener;

use pokr_common::patch::{Patch, Precondition};
use pokr_common::remote::RemoteStore;
use pokr_common::room::{Participant, ParticipantId, Room, Vote};
use pokr_common::room_code::RoomCode;
use pokr_common::store::{RoomStore, StoreError};

async fn start_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(pokr_server::serve(listener, pokr_server::new_state(8)));
    addr.to_string()
}

fn code() -> RoomCode {
    RoomCode::parse("AB12CD").unwrap()
}

#[tokio::test]
async fn test_remote_get_set_patch() {
    let addr = start_server().await;
    let store = RemoteStore::connect(&addr).await.unwrap();

    assert_eq!(store.get(&code()).await.unwrap(), None);

    let alice = ParticipantId::new("alice");
    let mut room = Room::new();
    room.participants
        .insert(alice.clone(), Participant::joined("Alice"));
    store.set(&code(), room).await.unwrap();

    store
        .patch(&code(), Patch::new().vote(alice.clone(), Some(Vote::Points(5))))
        .await
        .unwrap();

    let room = store.get(&code()).await.unwrap().unwrap();
    assert_eq!(room.vote_of(&alice), Some(Vote::Points(5)));
    assert!(!room.revealed);
}

#[tokio::test]
async fn test_remote_errors_map_back() {
    let addr = start_server().await;
    let store = RemoteStore::connect(&addr).await.unwrap();

    let err = store
        .patch(&code(), Patch::new().revealed(true))
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::NotFound(code()));

    store.set(&code(), Room::new()).await.unwrap();
    let err = store
        .patch(
            &code(),
            Patch::new().revealed(false).when(Precondition::Revealed(true)),
        )
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::PreconditionFailed(code()));
}

#[tokio::test]
async fn test_remote_subscription_sees_other_clients() {
    let addr = start_server().await;
    let watcher = RemoteStore::connect(&addr).await.unwrap();
    let writer = RemoteStore::connect(&addr).await.unwrap();

    let mut sub = watcher.subscribe(&code()).await.unwrap();
    assert_eq!(sub.next().await, Some(None));

    writer
        .patch(
            &code(),
            Patch::new()
                .participant(ParticipantId::new("bob"), Participant::joined("Bob"))
                .upsert(),
        )
        .await
        .unwrap();

    let room = tokio::time::timeout(Duration::from_secs(2), sub.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(room.participants.len(), 1);

    sub.cancel();
    assert_eq!(sub.next().await, None);
}

#[tokio::test]
async fn test_undrained_subscription_does_not_stall_replies() {
    let addr = start_server().await;
    let store = RemoteStore::connect(&addr).await.unwrap();
    let alice = ParticipantId::new("alice");

    // Never read while writing: pushed snapshots pile up on this connection.
    let mut sub = store.subscribe(&code()).await.unwrap();
    for points in 0..200 {
        tokio::time::timeout(
            Duration::from_secs(2),
            store.patch(
                &code(),
                Patch::new().vote(alice.clone(), Some(Vote::Points(points))).upsert(),
            ),
        )
        .await
        .expect("reply stalled behind undrained snapshots")
        .unwrap();
    }

    // The feed still converges on the latest state.
    loop {
        let room = tokio::time::timeout(Duration::from_secs(2), sub.next())
            .await
            .unwrap()
            .unwrap();
        if room.and_then(|r| r.vote_of(&alice)) == Some(Vote::Points(199)) {
            break;
        }
    }
}
