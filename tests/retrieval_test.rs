mod helpers;

use helpers::test_engine;
use mnemo::config::SimilarityConfig;
use mnemo::engine::StoreOptions;
use mnemo::similarity::similarity;
use mnemo::store::compound::CompoundStep;
use mnemo::store::retrieval::MatchKind;
use serde_json::json;

#[test]
fn fuzzy_fallback_matches_reworded_query() {
    let engine = test_engine();
    let stored = engine
        .store(
            "find_item",
            &json!({"itemName": "black leather wallet", "room": "study"}),
            json!({"location": "shelf"}),
            StoreOptions::default(),
        )
        .unwrap()
        .unwrap();

    let hit = engine
        .lookup(
            "find_item",
            &json!({"itemName": "leather wallet", "room": "study"}),
            None,
            0.8,
        )
        .unwrap();
    assert_eq!(hit.kind, MatchKind::Fuzzy);
    assert_eq!(hit.unit.id, stored.id);
    // fuzzy hits are annotated with their score
    assert!(hit.score.unwrap() > 0.7);
}

#[test]
fn sub_floor_string_pairs_never_surface_as_fuzzy_hits() {
    // the scorer clamps below-floor strings to zero...
    let cfg = SimilarityConfig::default();
    let s = similarity(&cfg, &json!("b-2"), &json!("x-9"));
    assert_eq!(s, 0.0);

    // ...so a stored unit whose only difference is a distant string never
    // comes back through the fuzzy path
    let engine = test_engine();
    engine
        .store(
            "find_item",
            &json!({"itemName": "b-2", "exactMatch": true}),
            json!({"location": "desk"}),
            StoreOptions::default(),
        )
        .unwrap()
        .unwrap();

    assert!(engine
        .lookup(
            "find_item",
            &json!({"itemName": "x-9", "exactMatch": true}),
            None,
            0.8,
        )
        .is_none());
}

#[test]
fn sensitive_values_do_not_fuzzy_match() {
    let engine = test_engine();
    engine
        .store(
            "find_item",
            &json!({"itemName": "passport holder", "room": "bedroom"}),
            json!({"location": "drawer"}),
            StoreOptions::default(),
        )
        .unwrap()
        .unwrap();

    // no shared core keyword with the sensitive stored value
    assert!(engine
        .lookup(
            "find_item",
            &json!({"itemName": "password notes", "room": "bedroom"}),
            None,
            0.8,
        )
        .is_none());
}

#[test]
fn compound_context_serves_its_sub_queries() {
    let engine = test_engine();
    let steps = vec![
        CompoundStep {
            tool: "query_contact".to_string(),
            parameters: json!({"search": "王小明"}),
            result: json!({"phone": "13800000000"}),
        },
        CompoundStep {
            tool: "estimate_time".to_string(),
            parameters: json!({"origin": "A", "destination": "B"}),
            result: json!({"minutes": 25}),
        },
    ];
    let compound = engine
        .store_compound("ctx-100", &steps, vec![])
        .unwrap()
        .unwrap();

    // the exact sub-query comes back via the context-match path
    let hit = engine
        .lookup(
            "query_contact",
            &json!({"search": "王小明"}),
            Some("ctx-100"),
            0.6,
        )
        .unwrap();
    assert_eq!(hit.kind, MatchKind::ContextStep);
    assert_eq!(hit.unit.id, compound.id);

    // the other step matches too
    let hit = engine
        .lookup(
            "estimate_time",
            &json!({"origin": "A", "destination": "B"}),
            Some("ctx-100"),
            0.6,
        )
        .unwrap();
    assert_eq!(hit.unit.id, compound.id);

    // without the context id the compound is invisible
    assert!(engine
        .lookup("query_contact", &json!({"search": "王小明"}), None, 0.6)
        .is_none());
}

#[test]
fn context_key_parameters_bridge_reworded_sub_queries() {
    let engine = test_engine();
    let steps = vec![CompoundStep {
        tool: "estimate_time".to_string(),
        parameters: json!({"origin": "家", "destination": "公司"}),
        result: json!({"minutes": 40}),
    }];
    let compound = engine
        .store_compound("ctx-101", &steps, vec![])
        .unwrap()
        .unwrap();

    // same origin/destination pair with extra options — still the same trip
    let hit = engine
        .lookup(
            "estimate_time",
            &json!({"origin": "家", "destination": "公司", "avoidTolls": true}),
            Some("ctx-101"),
            0.6,
        )
        .unwrap();
    assert_eq!(hit.unit.id, compound.id);
}

#[test]
fn lookup_prefers_exact_over_context_and_fuzzy() {
    let engine = test_engine();
    let params = json!({"search": "王小明"});

    // a standalone unit in the same context as a compound
    let standalone = engine
        .store(
            "query_contact",
            &params,
            json!({"phone": "138"}),
            StoreOptions {
                context_id: Some("ctx-102".to_string()),
                ..StoreOptions::default()
            },
        )
        .unwrap()
        .unwrap();
    engine
        .store_compound(
            "ctx-102",
            &[CompoundStep {
                tool: "query_contact".to_string(),
                parameters: params.clone(),
                result: json!({"phone": "138"}),
            }],
            vec![],
        )
        .unwrap()
        .unwrap();

    let hit = engine
        .lookup("query_contact", &params, Some("ctx-102"), 0.6)
        .unwrap();
    assert_eq!(hit.kind, MatchKind::Exact);
    assert_eq!(hit.unit.id, standalone.id);
}

#[test]
fn repeated_hits_accumulate_usage() {
    let engine = test_engine();
    let params = json!({"itemName": "钥匙", "exactMatch": true});
    let stored = engine
        .store("find_item", &params, json!({"location": "门口"}), StoreOptions::default())
        .unwrap()
        .unwrap();

    for _ in 0..3 {
        engine.lookup("find_item", &params, None, 0.8).unwrap();
    }

    let unit = engine.get(&stored.id).unwrap().unwrap();
    assert_eq!(unit.access_count, 4); // creation + 3 hits
    assert_eq!(unit.hit_count, 3);
    assert!(unit.last_accessed.is_some());
}
