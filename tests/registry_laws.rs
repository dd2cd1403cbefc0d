//! Mapping and extension registry laws against the public API.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use upgrade_router::extensions::{Extension, ExtensionConfig, ExtensionDescriptor, ExtensionRegistry};
use upgrade_router::{PathSpec, UpgradeFactory};

mod common;
use common::{tag_of, tagged};

fn spec(raw: &str) -> PathSpec {
    PathSpec::parse(raw).unwrap()
}

#[test]
fn test_parse_is_deterministic() {
    for raw in [
        "/a/b",
        "/a/*",
        "*.json",
        "/",
        "regex|^/rooms/(?<room>[a-z]+)$",
        "^/v[0-9]+/feed",
        "uri-template|/users/{id}/inbox",
    ] {
        let first = PathSpec::parse(raw).unwrap();
        let second = PathSpec::parse(raw).unwrap();
        assert_eq!(first, second, "{raw}");
        assert_eq!(PathSpec::parse(&first.to_string()).unwrap(), first, "{raw}");
    }
}

#[test]
fn test_exact_beats_prefix() {
    let factory = UpgradeFactory::new();
    factory.add_mapping("/a/*", tagged(401)).unwrap();
    factory.add_mapping("/a/b", tagged(402)).unwrap();
    assert_eq!(tag_of(&factory.get_match("/a/b").unwrap()), 402);
    assert_eq!(tag_of(&factory.get_match("/a/c").unwrap()), 401);
}

#[test]
fn test_replace_keeps_latest_creator() {
    let factory = UpgradeFactory::new();
    factory.add_mapping("/same", tagged(401)).unwrap();
    factory.add_mapping("/same", tagged(402)).unwrap();

    assert_eq!(factory.mappings().len(), 1);
    assert_eq!(tag_of(&factory.get_match("/same").unwrap()), 402);
    let registration = factory.get_mapping(&spec("/same")).unwrap();
    assert_eq!(tag_of(&registration.creator), 402);
}

#[test]
fn test_persistence_across_cycles() {
    let factory = UpgradeFactory::new();
    factory.add_mapping("/durable", tagged(401)).unwrap();

    factory.start().unwrap();
    factory.stop().unwrap();
    factory.start().unwrap();
    assert!(factory.get_mapping(&spec("/durable")).is_some());

    factory.add_mapping("/ephemeral", tagged(402)).unwrap();
    assert!(factory.get_match("/ephemeral").is_some());
    factory.begin_stop().unwrap();
    assert!(factory.get_mapping(&spec("/ephemeral")).is_none());
    assert!(factory.get_mapping(&spec("/durable")).is_some());
}

#[test]
fn test_longer_literal_wins_within_pattern_groups() {
    let factory = UpgradeFactory::new();
    factory.add_mapping("uri-template|/u/{a}/x", tagged(401)).unwrap();
    factory.add_mapping("uri-template|/{p}/{a}/x", tagged(402)).unwrap();
    factory.add_mapping("^/room/123.*$", tagged(403)).unwrap();
    factory
        .add_mapping("^/room/(?P<identifier>[0-9]+)$", tagged(404))
        .unwrap();

    assert_eq!(tag_of(&factory.get_match("/u/1/x").unwrap()), 401);
    assert_eq!(tag_of(&factory.get_match("/w/1/x").unwrap()), 402);
    assert_eq!(tag_of(&factory.get_match("/room/123").unwrap()), 403);
    assert_eq!(tag_of(&factory.get_match("/room/9").unwrap()), 404);
}

struct Named(&'static str);

impl Extension for Named {
    fn name(&self) -> &str {
        self.0
    }

    fn negotiated(&self) -> ExtensionConfig {
        ExtensionConfig::new(self.0)
    }
}

#[test]
fn test_extension_order_follows_offers() {
    let registry = ExtensionRegistry::new();
    registry.register_descriptor(ExtensionDescriptor::new("a", |_: &ExtensionConfig| {
        Ok(Box::new(Named("a")) as Box<dyn Extension>)
    }));
    registry.register_descriptor(ExtensionDescriptor::new("b", |_: &ExtensionConfig| {
        Ok(Box::new(Named("b")) as Box<dyn Extension>)
    }));

    let offers: Vec<_> = ["b", "x", "a"].into_iter().map(ExtensionConfig::new).collect();
    let chain: Vec<_> = registry
        .resolve(&offers)
        .iter()
        .map(|unit| unit.name().to_string())
        .collect();
    assert_eq!(chain, ["b", "a"]);
}

#[test]
fn test_negative_lookups() {
    let factory = UpgradeFactory::new();
    assert!(!factory.remove_mapping(&spec("/missing")));
    assert!(factory.mappings().is_empty());
    assert!(factory.get_match("/anything").is_none());
}

#[test]
fn test_chat_scenario() {
    let factory = UpgradeFactory::new();
    factory.add_mapping("/chat/*", tagged(401)).unwrap();
    factory.add_mapping("/chat/admin", tagged(402)).unwrap();

    assert_eq!(tag_of(&factory.get_match("/chat/admin").unwrap()), 402);
    assert_eq!(tag_of(&factory.get_match("/chat/room1").unwrap()), 401);
    assert!(factory.get_match("/other").is_none());
}

#[test]
fn test_readers_see_whole_snapshots_during_writes() {
    let factory = Arc::new(UpgradeFactory::new());
    factory.add_mapping("/chat/*", tagged(401)).unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let factory = factory.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut lookups = 0u64;
                while !done.load(Ordering::Relaxed) {
                    let creator = factory.get_match("/chat/admin").unwrap();
                    let tag = tag_of(&creator);
                    assert!(tag == 401 || tag == 402, "unexpected creator {tag}");
                    lookups += 1;
                }
                lookups
            })
        })
        .collect();

    for round in 0..500 {
        if round % 2 == 0 {
            factory.add_mapping("/chat/admin", tagged(402)).unwrap();
        } else {
            factory.remove_mapping(&spec("/chat/admin"));
        }
        factory
            .add_mapping(format!("/room/{round}"), tagged(403))
            .unwrap();
    }
    done.store(true, Ordering::Relaxed);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
    assert_eq!(factory.mappings().len(), 501);
}
