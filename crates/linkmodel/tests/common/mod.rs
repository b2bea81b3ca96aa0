//! Shared blog schema for the integration tests.

#![allow(dead_code)]

use linkmodel_memory::MemoryConnection;
use linkmodel::prelude::*;

fn profile_info() -> &'static EntityInfo {
    &PROFILE
}

fn author_info() -> &'static EntityInfo {
    &AUTHOR
}

fn editor_info() -> &'static EntityInfo {
    &EDITOR
}

fn tag_info() -> &'static EntityInfo {
    &TAG
}

fn post_tag_info() -> &'static EntityInfo {
    &POST_TAG
}

fn label_info() -> &'static EntityInfo {
    &LABEL
}

fn shop_tag_info() -> &'static EntityInfo {
    &SHOP_TAG
}

pub static PROFILE: EntityInfo =
    EntityInfo::new("profile", &["id"], &["id", "post_id", "bio", "website"]);
pub static AUTHOR: EntityInfo = EntityInfo::new("author", &["id"], &["id", "name"]);
pub static EDITOR: EntityInfo = EntityInfo::new("editor", &["id"], &["id", "name"]);
pub static TAG: EntityInfo = EntityInfo::new("tag", &["id"], &["id", "name"]);
pub static POST_TAG: EntityInfo = EntityInfo::new("post_tag", &[], &["post_id", "tag_id"]);
pub static LABEL: EntityInfo =
    EntityInfo::new("label", &["id"], &["id", "post_id", "name"]).auto_increment(true);

static POST_RELATIONS: [RelationshipInfo; 5] = [
    RelationshipInfo::new("profile", profile_info, RelationshipKind::OneToOne)
        .link(&[("post_id", "id")]),
    RelationshipInfo::new("author", author_info, RelationshipKind::ManyToOne)
        .link(&[("id", "author_id")]),
    RelationshipInfo::new("editor", editor_info, RelationshipKind::ManyToOne)
        .link(&[("id", "editor_id")]),
    RelationshipInfo::new("tags", tag_info, RelationshipKind::ManyToMany)
        .link(&[("id", "tag_id")])
        .via(LinkTableInfo::new(post_tag_info, &[("post_id", "id")]))
        .order_by("name"),
    RelationshipInfo::new("labels", label_info, RelationshipKind::OneToMany)
        .link(&[("post_id", "id")])
        .order_by("name"),
];

pub static POST: EntityInfo =
    EntityInfo::new("post", &["id"], &["id", "author_id", "editor_id", "title"])
        .auto_increment(true)
        .relations(&POST_RELATIONS);

/// Owner with a composite key; its links carry both key columns.
pub static SHOP_TAG: EntityInfo =
    EntityInfo::new("shop_tag", &[], &["region", "code", "tag_id"]);

static SHOP_RELATIONS: [RelationshipInfo; 1] = [RelationshipInfo::new(
    "tags",
    tag_info,
    RelationshipKind::ManyToMany,
)
.link(&[("id", "tag_id")])
.via(LinkTableInfo::new(
    shop_tag_info,
    &[("region", "region"), ("code", "code")],
))];

pub static SHOP: EntityInfo =
    EntityInfo::new("shop", &["region", "code"], &["region", "code", "name"])
        .relations(&SHOP_RELATIONS);

/// Composite key: batched iteration falls back to offsets.
pub static EVENT: EntityInfo =
    EntityInfo::new("event", &["stream", "seq"], &["stream", "seq", "payload"]);

/// Integer key supplied by the caller.
pub static ITEM: EntityInfo = EntityInfo::new("item", &["id"], &["id", "name"]);

pub fn save(conn: &MemoryConnection, info: &'static EntityInfo, pairs: &[(&str, Value)]) -> Record {
    let mut record = Record::from_pairs(info, pairs.iter().cloned()).unwrap();
    conn.save(&mut record).unwrap();
    record
}

pub fn seed_tags(conn: &MemoryConnection, ids: &[i64]) {
    for id in ids {
        save(
            conn,
            &TAG,
            &[("id", Value::BigInt(*id)), ("name", Value::from(format!("tag-{id:02}")))],
        );
    }
}

pub fn seed_items(conn: &MemoryConnection, ids: &[i64]) {
    for id in ids {
        save(
            conn,
            &ITEM,
            &[("id", Value::BigInt(*id)), ("name", Value::from(format!("item-{id}")))],
        );
    }
}

pub fn new_post(conn: &MemoryConnection, title: &str) -> Record {
    save(conn, &POST, &[("title", Value::from(title))])
}

pub fn link_tag(conn: &MemoryConnection, post: &Record, tag: i64) {
    save(
        conn,
        &POST_TAG,
        &[("post_id", post.get("id").cloned().unwrap()), ("tag_id", Value::BigInt(tag))],
    );
}

pub fn stored_tags(conn: &MemoryConnection) -> Vec<i64> {
    let mut ids: Vec<i64> = conn
        .rows(&POST_TAG)
        .iter()
        .filter_map(|r| r.get("tag_id").and_then(Value::as_i64))
        .collect();
    ids.sort_unstable();
    ids
}

pub fn ids(rows: &[Record], attribute: &str) -> Vec<i64> {
    rows.iter()
        .filter_map(|r| r.get(attribute).and_then(Value::as_i64))
        .collect()
}

pub fn new_shop(conn: &MemoryConnection, region: &str, code: &str) -> Record {
    save(
        conn,
        &SHOP,
        &[("region", Value::from(region)), ("code", Value::from(code))],
    )
}

pub fn link_shop_tag(conn: &MemoryConnection, region: &str, code: &str, tag: i64) {
    save(
        conn,
        &SHOP_TAG,
        &[
            ("region", Value::from(region)),
            ("code", Value::from(code)),
            ("tag_id", Value::BigInt(tag)),
        ],
    );
}

/// Stored shop links as `(region, code, tag)`, sorted.
pub fn stored_shop_tags(conn: &MemoryConnection) -> Vec<(String, String, i64)> {
    let mut links: Vec<(String, String, i64)> = conn
        .rows(&SHOP_TAG)
        .iter()
        .filter_map(|r| {
            Some((
                r.get("region")?.as_str()?.to_string(),
                r.get("code")?.as_str()?.to_string(),
                r.get("tag_id")?.as_i64()?,
            ))
        })
        .collect();
    links.sort();
    links
}
