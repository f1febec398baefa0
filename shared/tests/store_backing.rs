use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;

use dobj_shared::{
    doc_key, record, replica, store_record, Backing, DMap, DObject, DSet, HostType, MemoryStore,
    Path, PeerId, Queue, StoreBinding, Value,
};

record! {
    pub struct Ping {
        1 => text: String,
    }
}

record! {
    pub struct Badge {
        1 => label: String,
        2 => tier: u8,
    }
}

store_record! {
    Badge {
        1 => label,
        2 => tier,
    }
}

replica! {
    pub struct Profile {
        1 => display_name: Value<String>,
        2 => friends: DSet<String>,
        3 => settings: DMap<String, String>,
        4 => pings: Queue<Ping, Ping>,
        5 => badge: Value<Badge>,
    }
}

fn store_backed_profile() -> (Rc<RefCell<DObject<Profile>>>, Rc<MemoryStore>, String) {
    let path = Path::root().child(7, "profiles", "alice");
    let object = DObject::<Profile>::new(path.clone(), Backing::Store, HostType::Client);
    let store = Rc::new(MemoryStore::new());
    let key = doc_key(&path);
    object.borrow().core().channel().set_store(StoreBinding {
        sink: store.clone(),
        doc_key: key.clone(),
    });
    (object, store, key)
}

#[test]
fn client_is_the_writer_for_store_backed_objects() {
    let (object, _store, _key) = store_backed_profile();
    // No panic: the client holds write authority here.
    object
        .borrow_mut()
        .replica_mut()
        .display_name
        .set(String::from("Alice"));
    assert_eq!(object.borrow().replica().display_name.get(), "Alice");
}

#[test]
fn value_writes_through_under_name_dollar_id() {
    let (object, store, key) = store_backed_profile();
    assert_eq!(key, "profiles$7/alice");

    object
        .borrow_mut()
        .replica_mut()
        .display_name
        .set(String::from("Alice"));
    assert_eq!(store.get(&key, "display_name$1"), Some(json!("Alice")));
}

#[test]
fn set_elements_write_as_membership_fields() {
    let (object, store, key) = store_backed_profile();

    object
        .borrow_mut()
        .replica_mut()
        .friends
        .add(String::from("bob"));
    assert_eq!(store.get(&key, "friends$2.bob"), Some(json!(true)));

    object
        .borrow_mut()
        .replica_mut()
        .friends
        .remove(&String::from("bob"));
    assert_eq!(store.get(&key, "friends$2.bob"), None);
}

#[test]
fn map_entries_write_under_their_key() {
    let (object, store, key) = store_backed_profile();

    object
        .borrow_mut()
        .replica_mut()
        .settings
        .set(String::from("theme"), String::from("dark"));
    assert_eq!(store.get(&key, "settings$3.theme"), Some(json!("dark")));

    object
        .borrow_mut()
        .replica_mut()
        .settings
        .remove(&String::from("theme"));
    assert_eq!(store.get(&key, "settings$3.theme"), None);
}

#[test]
fn record_values_write_as_nested_dictionaries() {
    let (object, store, key) = store_backed_profile();

    object.borrow_mut().replica_mut().badge.set(Badge {
        label: String::from("gold"),
        tier: 3,
    });
    assert_eq!(
        store.get(&key, "badge$5"),
        Some(json!({ "label$1": "gold", "tier$2": 3 }))
    );
}

#[test]
fn local_listeners_fire_on_store_backed_mutation() {
    let (object, _store, _key) = store_backed_profile();

    let changes = Rc::new(RefCell::new(Vec::new()));
    {
        let log = changes.clone();
        object
            .borrow_mut()
            .replica_mut()
            .display_name
            .on_change(move |name| log.borrow_mut().push(name.clone()));
    }

    object
        .borrow_mut()
        .replica_mut()
        .display_name
        .set(String::from("Alice"));
    assert_eq!(*changes.borrow(), vec![String::from("Alice")]);
}

#[test]
fn post_on_a_store_backed_queue_fires_locally() {
    let (object, _store, _key) = store_backed_profile();

    let posted = Rc::new(RefCell::new(Vec::new()));
    {
        let log = posted.clone();
        object
            .borrow_mut()
            .replica_mut()
            .pings
            .on_posted(move |(from, ping)| {
                log.borrow_mut().push((*from, ping.text.clone()));
            });
    }

    object.borrow_mut().replica_mut().pings.post(Ping {
        text: String::from("hi"),
    });
    assert_eq!(*posted.borrow(), vec![(PeerId::LOCAL, String::from("hi"))]);
}
