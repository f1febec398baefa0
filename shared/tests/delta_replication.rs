use std::cell::RefCell;
use std::rc::Rc;

use dobj_shared::{
    record, replica, AnyObject, Backing, ByteReader, ByteWriter, DMap, DObject, DSet, HostType,
    ObjectState, Path, PeerId, Queue, Value,
};

record! {
    pub struct ChatMessage {
        1 => text: String,
    }
}

replica! {
    pub struct Room {
        1 => name: Value<String>,
        2 => players: DSet<String>,
        3 => scores: DMap<String, u32>,
        4 => chat: Queue<ChatMessage, ChatMessage>,
    }
}

fn room_path() -> Path {
    Path::root().child(5, "rooms", "lobby")
}

/// Pipe every delta the host emits into a frame log.
fn tap_frames(object: &dyn AnyObject, peer: PeerId) -> Rc<RefCell<Vec<Vec<u8>>>> {
    let frames = Rc::new(RefCell::new(Vec::new()));
    let sink_frames = frames.clone();
    object.core().channel().add_sink(
        peer,
        Rc::new(move |payload: &[u8]| {
            sink_frames.borrow_mut().push(payload.to_vec());
        }),
    );
    frames
}

fn apply_frames(target: &mut dyn AnyObject, frames: &Rc<RefCell<Vec<Vec<u8>>>>) {
    for frame in frames.borrow_mut().drain(..) {
        let mut reader = ByteReader::new(&frame);
        target.client_decode(&mut reader).unwrap();
        assert!(reader.is_empty(), "decode consumed the whole frame");
    }
}

#[test]
fn sync_then_deltas_converge_replicas() {
    let host = DObject::<Room>::new(room_path(), Backing::Server, HostType::Server);
    let remote = DObject::<Room>::new(room_path(), Backing::Server, HostType::Client);
    let frames = tap_frames(&*host.borrow(), PeerId(1));

    host.borrow_mut()
        .replica_mut()
        .name
        .set(String::from("Lobby"));

    // Initial sync carries the pre-subscription state.
    let mut writer = ByteWriter::new();
    host.borrow().encode_sync(&mut writer);
    let sync = writer.to_bytes();
    frames.borrow_mut().clear();
    let mut reader = ByteReader::new(&sync);
    remote.borrow_mut().client_decode(&mut reader).unwrap();

    assert_eq!(remote.borrow().core().state(), ObjectState::Active);
    assert_eq!(remote.borrow().replica().name.get(), "Lobby");

    // Subsequent deltas converge the replica.
    {
        let mut host_mut = host.borrow_mut();
        let room = host_mut.replica_mut();
        room.players.add(String::from("alice"));
        room.players.add(String::from("bob"));
        room.players.remove(&String::from("alice"));
        room.scores.set(String::from("bob"), 7);
        room.name.set(String::from("Lobby II"));
    }
    apply_frames(&mut *remote.borrow_mut(), &frames);

    let remote_ref = remote.borrow();
    let room = remote_ref.replica();
    assert!(!room.players.contains(&String::from("alice")));
    assert!(room.players.contains(&String::from("bob")));
    assert_eq!(room.players.len(), 1);
    assert_eq!(room.scores.get(&String::from("bob")), Some(&7));
    assert_eq!(room.name.get(), "Lobby II");
}

#[test]
fn set_events_fire_in_mutation_order() {
    let host = DObject::<Room>::new(room_path(), Backing::Server, HostType::Server);
    let remote = DObject::<Room>::new(room_path(), Backing::Server, HostType::Client);
    let frames = tap_frames(&*host.borrow(), PeerId(1));

    let events = Rc::new(RefCell::new(Vec::new()));
    {
        let mut remote_mut = remote.borrow_mut();
        let added_log = events.clone();
        remote_mut.replica_mut().players.on_added(move |player| {
            added_log.borrow_mut().push(format!("added {}", player));
        });
        let removed_log = events.clone();
        remote_mut.replica_mut().players.on_removed(move |player| {
            removed_log.borrow_mut().push(format!("removed {}", player));
        });
    }

    {
        let mut host_mut = host.borrow_mut();
        let room = host_mut.replica_mut();
        room.players.add(String::from("alice"));
        room.players.add(String::from("bob"));
        room.players.remove(&String::from("alice"));
    }
    apply_frames(&mut *remote.borrow_mut(), &frames);

    assert_eq!(
        *events.borrow(),
        vec!["added alice", "added bob", "removed alice"]
    );
}

#[test]
fn equal_map_set_is_a_no_op() {
    let host = DObject::<Room>::new(room_path(), Backing::Server, HostType::Server);
    let remote = DObject::<Room>::new(room_path(), Backing::Server, HostType::Client);
    let frames = tap_frames(&*host.borrow(), PeerId(1));

    let set_count = Rc::new(RefCell::new(0));
    {
        let counter = set_count.clone();
        remote
            .borrow_mut()
            .replica_mut()
            .scores
            .on_set(move |_| *counter.borrow_mut() += 1);
    }

    {
        let mut host_mut = host.borrow_mut();
        assert!(host_mut.replica_mut().scores.set(String::from("alice"), 7));
        assert!(!host_mut.replica_mut().scores.set(String::from("alice"), 7));
    }
    // Only one delta was emitted.
    assert_eq!(frames.borrow().len(), 1);
    let frame = frames.borrow()[0].clone();

    // Even a duplicated frame on the wire fires only one event.
    for _ in 0..2 {
        let mut reader = ByteReader::new(&frame);
        remote.borrow_mut().client_decode(&mut reader).unwrap();
    }
    assert_eq!(*set_count.borrow(), 1);
}

#[test]
fn duplicate_set_add_fires_nothing() {
    let host = DObject::<Room>::new(room_path(), Backing::Server, HostType::Server);
    let frames = tap_frames(&*host.borrow(), PeerId(1));

    assert!(host.borrow_mut().replica_mut().players.add(String::from("alice")));
    assert!(!host.borrow_mut().replica_mut().players.add(String::from("alice")));
    assert!(!host.borrow_mut().replica_mut().players.remove(&String::from("bob")));
    assert_eq!(frames.borrow().len(), 1);
}

#[test]
fn sync_diffs_against_prior_state() {
    let host = DObject::<Room>::new(room_path(), Backing::Server, HostType::Server);
    let remote = DObject::<Room>::new(room_path(), Backing::Server, HostType::Client);

    // Remote holds stale state from an earlier life of the object.
    {
        let stale = DObject::<Room>::new(room_path(), Backing::Server, HostType::Server);
        {
            let mut stale_mut = stale.borrow_mut();
            let room = stale_mut.replica_mut();
            room.players.add(String::from("alice"));
            room.players.add(String::from("carol"));
            room.scores.set(String::from("alice"), 1);
            room.scores.set(String::from("carol"), 3);
            room.name.set(String::from("Old"));
        }
        let mut writer = ByteWriter::new();
        stale.borrow().encode_sync(&mut writer);
        let bytes = writer.to_bytes();
        let mut reader = ByteReader::new(&bytes);
        remote.borrow_mut().client_decode(&mut reader).unwrap();
    }

    // Fresh server state: carol gone, bob new, alice's score unchanged.
    {
        let mut host_mut = host.borrow_mut();
        let room = host_mut.replica_mut();
        room.players.add(String::from("alice"));
        room.players.add(String::from("bob"));
        room.scores.set(String::from("alice"), 1);
        room.scores.set(String::from("bob"), 9);
        room.name.set(String::from("New"));
    }

    let events = Rc::new(RefCell::new(Vec::new()));
    {
        let mut remote_mut = remote.borrow_mut();
        let log = events.clone();
        remote_mut.replica_mut().players.on_added(move |player| {
            log.borrow_mut().push(format!("+{}", player));
        });
        let log = events.clone();
        remote_mut.replica_mut().players.on_removed(move |player| {
            log.borrow_mut().push(format!("-{}", player));
        });
        let log = events.clone();
        remote_mut.replica_mut().scores.on_set(move |(player, score)| {
            log.borrow_mut().push(format!("={}:{}", player, score));
        });
        let log = events.clone();
        remote_mut.replica_mut().scores.on_removed(move |player| {
            log.borrow_mut().push(format!("x{}", player));
        });
    }

    let mut writer = ByteWriter::new();
    host.borrow().encode_sync(&mut writer);
    let bytes = writer.to_bytes();
    let mut reader = ByteReader::new(&bytes);
    remote.borrow_mut().client_decode(&mut reader).unwrap();

    let fired = events.borrow().clone();
    assert!(fired.contains(&String::from("-carol")));
    assert!(fired.contains(&String::from("+bob")));
    assert!(fired.contains(&String::from("xcarol")));
    assert!(fired.contains(&String::from("=bob:9")));
    // Unchanged entries fire nothing.
    assert!(!fired.contains(&String::from("+alice")));
    assert!(!fired.contains(&String::from("=alice:1")));

    let remote_ref = remote.borrow();
    assert_eq!(remote_ref.replica().name.get(), "New");
    assert_eq!(remote_ref.replica().players.len(), 2);
    assert_eq!(remote_ref.replica().scores.len(), 2);
}

#[test]
fn delta_before_sync_applies_but_state_stays_resolving() {
    let host = DObject::<Room>::new(room_path(), Backing::Server, HostType::Server);
    let remote = DObject::<Room>::new(room_path(), Backing::Server, HostType::Client);
    let frames = tap_frames(&*host.borrow(), PeerId(1));

    host.borrow_mut()
        .replica_mut()
        .name
        .set(String::from("Early"));
    apply_frames(&mut *remote.borrow_mut(), &frames);

    assert_eq!(remote.borrow().core().state(), ObjectState::Resolving);
    assert_eq!(remote.borrow().replica().name.get(), "Early");

    let mut writer = ByteWriter::new();
    host.borrow().encode_sync(&mut writer);
    let bytes = writer.to_bytes();
    let mut reader = ByteReader::new(&bytes);
    remote.borrow_mut().client_decode(&mut reader).unwrap();
    assert_eq!(remote.borrow().core().state(), ObjectState::Active);
}

#[test]
fn queue_posts_reach_the_host_and_broadcasts_return() {
    let host = DObject::<Room>::new(room_path(), Backing::Server, HostType::Server);
    let remote = DObject::<Room>::new(room_path(), Backing::Server, HostType::Client);

    // Upstream: client post → host decode_post.
    let upstream = tap_frames(&*remote.borrow(), PeerId(1));
    let posted = Rc::new(RefCell::new(Vec::new()));
    {
        let log = posted.clone();
        host.borrow_mut()
            .replica_mut()
            .chat
            .on_posted(move |(from, message)| {
                log.borrow_mut().push((*from, message.text.clone()));
            });
    }

    remote.borrow_mut().replica_mut().chat.post(ChatMessage {
        text: String::from("hello"),
    });
    for frame in upstream.borrow_mut().drain(..) {
        let mut reader = ByteReader::new(&frame);
        host.borrow_mut()
            .decode_post(PeerId(9), &mut reader)
            .unwrap();
    }
    assert_eq!(*posted.borrow(), vec![(PeerId(9), String::from("hello"))]);

    // Downstream: host broadcast → client on_received.
    let downstream = tap_frames(&*host.borrow(), PeerId(9));
    let received = Rc::new(RefCell::new(Vec::new()));
    {
        let log = received.clone();
        remote
            .borrow_mut()
            .replica_mut()
            .chat
            .on_received(move |message| log.borrow_mut().push(message.text.clone()));
    }
    host.borrow_mut().replica_mut().chat.broadcast(ChatMessage {
        text: String::from("welcome"),
    });
    apply_frames(&mut *remote.borrow_mut(), &downstream);
    assert_eq!(*received.borrow(), vec![String::from("welcome")]);
}

#[test]
#[should_panic(expected = "write authority")]
fn client_mutation_of_server_backed_object_panics() {
    let remote = DObject::<Room>::new(room_path(), Backing::Server, HostType::Client);
    remote
        .borrow_mut()
        .replica_mut()
        .name
        .set(String::from("nope"));
}

#[test]
#[should_panic(expected = "client-only")]
fn server_side_post_panics() {
    let host = DObject::<Room>::new(room_path(), Backing::Server, HostType::Server);
    host.borrow_mut().replica_mut().chat.post(ChatMessage {
        text: String::from("nope"),
    });
}

#[test]
fn unknown_field_delta_is_skipped() {
    use dobj_shared::{field_tag, MessageType, Serde, WireType};

    let remote = DObject::<Room>::new(room_path(), Backing::Server, HostType::Client);

    let mut writer = ByteWriter::new();
    MessageType::ValueChange.ser(&mut writer);
    writer.write_var_u32(field_tag(99, WireType::VarInt));
    writer.write_var_u32(42);
    let bytes = writer.to_bytes();

    let mut reader = ByteReader::new(&bytes);
    remote.borrow_mut().client_decode(&mut reader).unwrap();
    assert!(reader.is_empty());
}
