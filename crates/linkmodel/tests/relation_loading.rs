mod common;

use common::{LABEL, POST, PROFILE, link_tag, new_post, save, seed_tags};
use linkmodel::prelude::*;
use linkmodel::{RelationValue, load_related};
use linkmodel_memory::MemoryConnection;

fn names(value: RelationValue) -> Vec<String> {
    let RelationValue::Many(rows) = value else {
        panic!("expected a collection");
    };
    rows.iter()
        .filter_map(|r| r.get("name").and_then(Value::as_str).map(str::to_string))
        .collect()
}

#[test]
fn direct_relation_is_ordered() {
    let conn = MemoryConnection::new();
    let post = new_post(&conn, "hello");
    let other = new_post(&conn, "other");
    for (owner, name) in [(&post, "zeta"), (&post, "alpha"), (&other, "beta")] {
        save(
            &conn,
            &LABEL,
            &[("post_id", owner.get("id").cloned().unwrap()), ("name", Value::from(name))],
        );
    }

    let labels = load_related(&conn, &post, POST.relation("labels").unwrap()).unwrap();
    assert_eq!(names(labels), vec!["alpha", "zeta"]);
}

#[test]
fn junction_relation_goes_through_link_rows() {
    let conn = MemoryConnection::new();
    seed_tags(&conn, &[3, 1, 2]);
    let post = new_post(&conn, "hello");
    link_tag(&conn, &post, 3);
    link_tag(&conn, &post, 1);

    let tags = conn.related(&post, POST.relation("tags").unwrap()).unwrap();
    assert_eq!(names(tags), vec!["tag-01", "tag-03"]);
}

#[test]
fn to_one_relation_yields_single_record() {
    let conn = MemoryConnection::new();
    let post = new_post(&conn, "hello");
    save(
        &conn,
        &PROFILE,
        &[("id", Value::BigInt(1)), ("post_id", post.get("id").cloned().unwrap())],
    );

    let profile = load_related(&conn, &post, POST.relation("profile").unwrap()).unwrap();
    let record = profile.into_single("post.profile").unwrap().unwrap();
    assert_eq!(record.get("id"), Some(&Value::BigInt(1)));

    let unsaved = Record::new(&POST);
    let nothing = load_related(&conn, &unsaved, POST.relation("profile").unwrap()).unwrap();
    assert!(matches!(nothing, RelationValue::One(None)));
}

#[test]
fn repeated_junction_rows_load_each_target_once() {
    let conn = MemoryConnection::new();
    seed_tags(&conn, &[1, 2]);
    let post = new_post(&conn, "hello");
    link_tag(&conn, &post, 2);
    link_tag(&conn, &post, 2);

    let tags = load_related(&conn, &post, POST.relation("tags").unwrap()).unwrap();
    assert_eq!(names(tags), vec!["tag-02"]);
}
