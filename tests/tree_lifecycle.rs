//! Black-box end-to-end coverage of the patch -> synchronize -> watcher
//! cascade, driven entirely through the public `Tree` API.

use std::any::Any;
use std::sync::{Arc, Mutex};

use livetree::object::{ObjectTypeBuilder, TypedObject};
use livetree::Tree;
use serde_json::{json, Value};

struct Person {
    name: Mutex<String>,
    age: Mutex<i64>,
    created: Mutex<bool>,
    created_children: Mutex<bool>,
    created_tree: Mutex<bool>,
    destroyed: Mutex<bool>,
    updates: Mutex<Vec<(String, Value)>>,
}

impl Person {
    fn new() -> Self {
        Self {
            name: Mutex::new(String::new()),
            age: Mutex::new(0),
            created: Mutex::new(false),
            created_children: Mutex::new(false),
            created_tree: Mutex::new(false),
            destroyed: Mutex::new(false),
            updates: Mutex::new(Vec::new()),
        }
    }
}

impl TypedObject for Person {
    fn created(&self) {
        *self.created.lock().unwrap() = true;
    }
    fn created_children(&self) {
        *self.created_children.lock().unwrap() = true;
    }
    fn created_tree(&self) {
        *self.created_tree.lock().unwrap() = true;
    }
    fn destroyed(&self) {
        *self.destroyed.lock().unwrap() = true;
    }
    fn updated(&self, field: &str, value: &Value) {
        self.updates
            .lock()
            .unwrap()
            .push((field.to_string(), value.clone()));
    }
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

fn person_type() -> livetree::ObjectType {
    ObjectTypeBuilder::<Person>::new("Person")
        .field("name", |p: &Person, v: &Value| {
            if let Some(s) = v.as_str() {
                *p.name.lock().unwrap() = s.to_string();
            }
        })
        .field("age", |p: &Person, v: &Value| {
            if let Some(n) = v.as_i64() {
                *p.age.lock().unwrap() = n;
            }
        })
        .build(|_node| Person::new())
}

#[test]
fn binds_object_and_runs_created_cascade() {
    let tree = Tree::new("t1");
    tree.add_type(person_type());

    tree.set(json!({
        "people": {
            "alice": {"object": "Person", "name": "Alice", "age": 30}
        }
    }));
    tree.created();

    let alice = tree.get("people/alice").into_iter().next().unwrap();
    let person = livetree::node::object_as::<Person>(&alice).unwrap();

    assert_eq!(*person.name.lock().unwrap(), "Alice");
    assert_eq!(*person.age.lock().unwrap(), 30);
    assert!(*person.created.lock().unwrap());
    assert!(*person.created_tree.lock().unwrap());
}

#[test]
fn field_update_calls_updated_without_rebinding() {
    let tree = Tree::new("t2");
    tree.add_type(person_type());

    tree.set(json!({"p": {"object": "Person", "name": "Bob", "age": 20}}));
    let p = tree.get("p").into_iter().next().unwrap();
    let person = livetree::node::object_as::<Person>(&p).unwrap();
    *person.created.lock().unwrap() = false;

    tree.set(json!({"p": {"age": 21}}));

    assert!(!*person.created.lock().unwrap(), "re-patching a field must not rebind the object");
    assert_eq!(*person.age.lock().unwrap(), 21);
    assert!(person
        .updates
        .lock()
        .unwrap()
        .iter()
        .any(|(k, v)| k == "age" && v == &json!(21)));
}

#[test]
fn retyping_destroys_the_old_object_and_binds_a_new_one() {
    struct Ghost;
    impl TypedObject for Ghost {
        fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    let tree = Tree::new("t3");
    tree.add_type(person_type());
    tree.add_type(ObjectTypeBuilder::<Ghost>::new("Ghost").build(|_| Ghost));

    tree.set(json!({"p": {"object": "Person", "name": "Carl"}}));
    let p = tree.get("p").into_iter().next().unwrap();
    let person = livetree::node::object_as::<Person>(&p).unwrap();

    tree.set(json!({"p": {"object": "Ghost"}}));

    assert!(*person.destroyed.lock().unwrap());
    assert!(livetree::node::object_as::<Ghost>(&p).is_some());
}

#[test]
fn sequence_truncation_destroys_trailing_objects() {
    let tree = Tree::new("t4");
    tree.add_type(person_type());

    tree.set(json!({"roster": [
        {"object": "Person", "name": "A"},
        {"object": "Person", "name": "B"},
        {"object": "Person", "name": "C"},
    ]}));

    let b = tree.get("roster/1").into_iter().next().unwrap();
    let b_person = livetree::node::object_as::<Person>(&b).unwrap();
    let c = tree.get("roster/2").into_iter().next().unwrap();
    let c_person = livetree::node::object_as::<Person>(&c).unwrap();

    tree.set(json!({"roster": [{"name": "A"}]}));

    assert_eq!(tree.get("roster").len(), 1);
    assert!(*b_person.destroyed.lock().unwrap());
    assert!(*c_person.destroyed.lock().unwrap());
}

#[test]
fn watch_accumulates_and_resets_deltas_per_consumer() {
    let tree = Tree::new("t5");

    let initial = tree.watch("consumer-a");
    assert_eq!(initial, json!({}));

    tree.set(json!({"x": 1}));
    tree.set(json!({"y": 2}));

    let delta_a = tree.watch("consumer-a");
    assert_eq!(delta_a, json!({"x": 1, "y": 2}));
    assert_eq!(tree.watch("consumer-a"), json!({}));

    // A consumer that starts watching after the patches landed sees a
    // snapshot of current state the first time, not the deltas leading up
    // to it.
    let snapshot_b = tree.watch("consumer-b");
    assert_eq!(snapshot_b, json!({"x": 1, "y": 2}));
}

#[test]
fn query_projects_requested_paths_only() {
    let tree = Tree::new("t6");
    tree.set(json!({
        "a": {"b": 1, "c": 2},
        "d": 3,
    }));

    let result = tree.query(&json!({"a": {"b": null}, "d": null})).unwrap();
    assert_eq!(result, json!({"a": {"b": 1}, "d": 3}));
}

#[test]
fn clear_destroys_all_bound_objects() {
    let tree = Tree::new("t7");
    tree.add_type(person_type());

    tree.set(json!({"p": {"object": "Person", "name": "Dana"}}));
    let p = tree.get("p").into_iter().next().unwrap();
    let person = livetree::node::object_as::<Person>(&p).unwrap();

    tree.clear();

    assert!(*person.destroyed.lock().unwrap());
    assert_eq!(tree.value(), json!({}));
}
